//! DamagePayload — неизменяемый-на-выстрел пакет урона
//!
//! Архитектура:
//! - Value type, копируется на каждый выстрел/применение
//! - Physical и energy трекаются раздельно через весь pipeline (см. health.rs)
//! - Крит бросается при СОЗДАНИИ payload из crit stats оружия
//!   (снаряды дополнительно бросают крит per-hit — см. projectile.rs)
//!
//! Множители по слоям — `LayerScale(Option<f32>)`: None = «не задан, берём 1.0»,
//! Some(0.0) — честный ноль («это оружие не вредит корпусу»). Заменяет
//! конвенцию «0 значит unset» из старых прототипов, которая не позволяла
//! сконфигурировать настоящий ноль.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Опциональный множитель урона по слою
///
/// `factor()` разворачивает None в 1.0. Отрицательные значения зажимаются
/// в ноль при создании.
#[derive(Debug, Clone, Copy, Default, PartialEq, Reflect)]
pub struct LayerScale(pub Option<f32>);

impl LayerScale {
    pub const UNSET: Self = Self(None);

    pub fn new(value: f32) -> Self {
        Self(Some(value.max(0.0)))
    }

    pub fn factor(&self) -> f32 {
        self.0.unwrap_or(1.0)
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

/// Тип статус-эффекта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum StatusEffectKind {
    /// Горение (плазма)
    Burn,
    /// Коррозия брони
    Corrosion,
    /// Ионный сбой систем
    IonDisrupt,
    /// Замедление
    Slow,
}

/// Статус-эффект, заявленный оружием
///
/// Декларируется и переносится через pipeline, но ядром НЕ исполняется:
/// события `DamageDealt` несут список дальше как extension point
/// (подписчик-система эффектов вне scope ядра).
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct StatusEffect {
    pub kind: StatusEffectKind,
    /// Длительность (секунды)
    pub duration: f32,
    /// Урон за тик эффекта
    pub tick_damage: f32,
    /// Множитель скорости движения цели
    pub movement_multiplier: f32,
    pub can_stack: bool,
    pub max_stacks: u32,
}

/// Пакет урона одного применения
///
/// Инвариант: после создания все величины неотрицательны,
/// penetration в [0,1]. Pipeline дополнительно зажимает intake
/// доли перед умножением (health.rs).
#[derive(Debug, Clone, Default, Reflect)]
pub struct DamagePayload {
    /// Кинетический урон
    pub physical_damage: f32,
    /// Энергетический урон
    pub energy_damage: f32,

    /// Доля урона, проходящая МИМО щита целиком, [0,1]
    pub shield_penetration: f32,
    /// Линейно снижает resistance брони, [0,1] (не flat bypass как у щита)
    pub armor_penetration: f32,

    pub shield_multiplier: LayerScale,
    pub armor_multiplier: LayerScale,
    pub hull_multiplier: LayerScale,

    // === Crit bookkeeping ===
    pub is_critical: bool,
    pub hit_weakpoint: bool,
    pub weakpoint_multiplier: f32,

    /// Заявленные статус-эффекты (extension point, ядром не исполняются)
    pub applied_effects: Vec<StatusEffect>,

    // === Physics feedback ===
    /// Величина импульса knockback
    pub impact_force: f32,
    /// Направление полёта снаряда/луча
    pub damage_direction: Vec3,

    /// Доля нанесённого урона, возвращаемая источнику как hull
    /// (extension point — ядром не исполняется, см. DESIGN.md)
    pub lifesteal_percent: f32,

    // === Metadata (read-only для pipeline) ===
    /// Владелец выстрела (kill credit); может быть уже уничтожен
    pub source: Option<Entity>,
    pub hit_point: Vec3,
    pub hit_normal: Vec3,
}

impl DamagePayload {
    pub fn new(physical: f32, energy: f32) -> Self {
        Self {
            physical_damage: physical.max(0.0),
            energy_damage: energy.max(0.0),
            weakpoint_multiplier: 1.0,
            ..Default::default()
        }
    }

    /// Суммарный «сырой» урон (для логов/HUD, не для pipeline)
    pub fn total_raw(&self) -> f32 {
        self.physical_damage + self.energy_damage
    }

    /// Масштабирует обе компоненты урона (pierce decay, explosion falloff)
    pub fn scale_damage(&mut self, factor: f32) {
        let factor = factor.max(0.0);
        self.physical_damage *= factor;
        self.energy_damage *= factor;
    }

    /// Заполняет контактные metadata перед применением
    pub fn with_hit(mut self, point: Vec3, normal: Vec3, direction: Vec3) -> Self {
        self.hit_point = point;
        self.hit_normal = normal;
        self.damage_direction = direction;
        self
    }

    /// Бросок крита: uniform draw ≤ chance → урон × multiplier
    ///
    /// Возвращает true при крите. Второй крит поверх первого не бросается.
    pub fn roll_crit(&mut self, rng: &mut ChaCha8Rng, chance: f32, multiplier: f32) -> bool {
        if self.is_critical || chance <= 0.0 {
            return false;
        }
        if rng.gen::<f32>() <= chance.min(1.0) {
            self.is_critical = true;
            self.scale_damage(multiplier.max(0.0));
            return true;
        }
        false
    }

    /// Отметить попадание в weakpoint и применить его множитель
    pub fn mark_weakpoint(&mut self, multiplier: f32) {
        self.hit_weakpoint = true;
        self.weakpoint_multiplier = multiplier.max(0.0);
        self.scale_damage(self.weakpoint_multiplier);
    }
}

/// Шаблон payload в конфигурации оружия
///
/// Immutable данные оружия; `instantiate` создаёт рабочий DamagePayload
/// на конкретный выстрел (clamping происходит здесь).
#[derive(Debug, Clone, Default, PartialEq, Reflect)]
pub struct PayloadSpec {
    pub physical: f32,
    pub energy: f32,
    pub shield_penetration: f32,
    pub armor_penetration: f32,
    pub shield_multiplier: LayerScale,
    pub armor_multiplier: LayerScale,
    pub hull_multiplier: LayerScale,
    pub impact_force: f32,
    pub lifesteal_percent: f32,
    pub effects: Vec<StatusEffect>,
}

impl PayloadSpec {
    pub fn kinetic(physical: f32) -> Self {
        Self {
            physical,
            ..Default::default()
        }
    }

    pub fn energy(energy: f32) -> Self {
        Self {
            energy,
            ..Default::default()
        }
    }

    pub fn instantiate(&self, source: Option<Entity>, direction: Vec3) -> DamagePayload {
        DamagePayload {
            physical_damage: self.physical.max(0.0),
            energy_damage: self.energy.max(0.0),
            shield_penetration: self.shield_penetration.clamp(0.0, 1.0),
            armor_penetration: self.armor_penetration.clamp(0.0, 1.0),
            shield_multiplier: self.shield_multiplier,
            armor_multiplier: self.armor_multiplier,
            hull_multiplier: self.hull_multiplier,
            is_critical: false,
            hit_weakpoint: false,
            weakpoint_multiplier: 1.0,
            applied_effects: self.effects.clone(),
            impact_force: self.impact_force.max(0.0),
            damage_direction: direction,
            lifesteal_percent: self.lifesteal_percent.clamp(0.0, 1.0),
            source,
            hit_point: Vec3::ZERO,
            hit_normal: Vec3::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_layer_scale_unset_defaults_to_one() {
        assert_eq!(LayerScale::UNSET.factor(), 1.0);
        assert!(!LayerScale::UNSET.is_set());
    }

    #[test]
    fn test_layer_scale_explicit_zero_stays_zero() {
        // Настоящий ноль конфигурируем, в отличие от «0 значит unset»
        let scale = LayerScale::new(0.0);
        assert_eq!(scale.factor(), 0.0);
        assert!(scale.is_set());
    }

    #[test]
    fn test_layer_scale_negative_clamped() {
        assert_eq!(LayerScale::new(-2.0).factor(), 0.0);
    }

    #[test]
    fn test_payload_new_clamps_negative_damage() {
        let payload = DamagePayload::new(-10.0, 5.0);
        assert_eq!(payload.physical_damage, 0.0);
        assert_eq!(payload.energy_damage, 5.0);
    }

    #[test]
    fn test_scale_damage() {
        let mut payload = DamagePayload::new(100.0, 40.0);
        payload.scale_damage(0.75);
        assert!((payload.physical_damage - 75.0).abs() < 1e-5);
        assert!((payload.energy_damage - 30.0).abs() < 1e-5);
    }

    #[test]
    fn test_instantiate_clamps_penetration() {
        let spec = PayloadSpec {
            physical: 10.0,
            shield_penetration: 1.5,
            armor_penetration: -0.5,
            ..Default::default()
        };
        let payload = spec.instantiate(None, Vec3::X);
        assert_eq!(payload.shield_penetration, 1.0);
        assert_eq!(payload.armor_penetration, 0.0);
    }

    #[test]
    fn test_crit_roll_certain() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut payload = DamagePayload::new(100.0, 0.0);
        assert!(payload.roll_crit(&mut rng, 1.0, 2.0));
        assert!(payload.is_critical);
        assert!((payload.physical_damage - 200.0).abs() < 1e-4);
    }

    #[test]
    fn test_crit_roll_never() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut payload = DamagePayload::new(100.0, 0.0);
        assert!(!payload.roll_crit(&mut rng, 0.0, 2.0));
        assert!(!payload.is_critical);
        assert_eq!(payload.physical_damage, 100.0);
    }

    #[test]
    fn test_crit_does_not_stack() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut payload = DamagePayload::new(100.0, 0.0);
        payload.roll_crit(&mut rng, 1.0, 2.0);
        // Повторный бросок не удваивает ещё раз
        assert!(!payload.roll_crit(&mut rng, 1.0, 2.0));
        assert!((payload.physical_damage - 200.0).abs() < 1e-4);
    }

    #[test]
    fn test_weakpoint_scales_damage() {
        let mut payload = DamagePayload::new(50.0, 50.0);
        payload.mark_weakpoint(3.0);
        assert!(payload.hit_weakpoint);
        assert!((payload.physical_damage - 150.0).abs() < 1e-4);
        assert!((payload.energy_damage - 150.0).abs() < 1e-4);
    }
}
