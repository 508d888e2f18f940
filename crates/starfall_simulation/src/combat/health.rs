//! LayeredHealth — трёхслойный pipeline урона (Shield → Armor → Hull)
//!
//! Архитектура:
//! - Компонент владеет тремя пулами + intake/regen конфигурацией
//! - Вход: `DamageEvent` (один event = одно атомарное применение payload)
//! - Выход: `DamageDealt`, `HealthChanged`, `EntityDied` (смерть строго один раз)
//! - Regen щита: countdown после урона, затем ramp — pattern как у
//!   перезарядки энергощита
//!
//! Слои:
//! 1. Щит: flat bypass через shield_penetration; physical дополнительно
//!    масштабируется shield_physical_intake, energy идёт в щит полностью.
//!    Пробой → overflow доля исходного (не-bypass) урона уходит дальше.
//! 2. Броня: penetration ЛИНЕЙНО снижает resistance (не bypass);
//!    пробой → overflow уже-сниженных величин.
//! 3. Корпус: physical × hull_multiplier + energy × hull_energy_intake.
//!
//! Деление на ноль в overflow-ratio защищено: нулевой знаменатель = нет overflow.

use bevy::prelude::*;
use crate::combat::payload::{DamagePayload, StatusEffect};
use crate::components::PhysicsBody;
use crate::logger;
use crate::profiles::ShipStats;

/// Задержка уборки обломков после смерти (секунды)
pub const WRECK_DESPAWN_DELAY: f32 = 5.0;

// ============================================================================
// Events
// ============================================================================

/// Событие: применить payload к цели (входной канал pipeline)
#[derive(Event, Debug, Clone)]
pub struct DamageEvent {
    pub target: Entity,
    pub payload: DamagePayload,
}

/// Событие: урон нанесён (для UI, звуков, lifesteal/status подписчиков)
///
/// Несёт payload-метаданные дальше как extension point:
/// `effects` и `lifesteal_percent` ядром не исполняются.
#[derive(Event, Debug, Clone)]
pub struct DamageDealt {
    pub attacker: Option<Entity>,
    pub target: Entity,
    pub report: DamageReport,
    pub effects: Vec<StatusEffect>,
    pub lifesteal_percent: f32,
    pub target_died: bool,
}

/// Событие: пулы изменились (HUD binding)
#[derive(Event, Debug, Clone)]
pub struct HealthChanged {
    pub entity: Entity,
    pub shield: f32,
    pub armor: f32,
    pub hull: f32,
}

/// Событие: entity умер (hull == 0). Строго один раз на entity.
#[derive(Event, Debug, Clone)]
pub struct EntityDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
}

/// Компонент-маркер: entity мертв (hull == 0)
///
/// После смерти никакие мутации здоровья не валидны; системы фильтруют
/// по Without<Dead>. Деспавн отложен — обломки убирает DespawnAfter.
#[derive(Component, Debug, Default)]
pub struct Dead;

/// Компонент: деспавн entity после countdown
#[derive(Component, Debug)]
pub struct DespawnAfter {
    /// Оставшееся время (секунды)
    pub remaining: f32,
}

// ============================================================================
// LayeredHealth
// ============================================================================

/// Сколько урона поглотил каждый слой за одно применение
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DamageReport {
    pub shield_damage: f32,
    pub armor_damage: f32,
    pub hull_damage: f32,
}

impl DamageReport {
    pub fn total(&self) -> f32 {
        self.shield_damage + self.armor_damage + self.hull_damage
    }
}

/// Трёхслойное здоровье корабля
///
/// Инварианты: 0 ≤ shield ≤ max_shield, 0 ≤ armor ≤ max_armor,
/// 0 ≤ hull ≤ max_hull. Intake-доли зажимаются в [0,1] при каждом
/// использовании (конфигурация может быть кривой — не падаем).
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct LayeredHealth {
    pub shield: f32,
    pub max_shield: f32,
    pub armor: f32,
    pub max_armor: f32,
    pub hull: f32,
    pub max_hull: f32,

    /// Восстановление щита (единиц/сек) после задержки
    pub shield_regen_rate: f32,
    /// Задержка regen после последнего урона (секунды)
    pub shield_regen_delay: f32,
    /// Доля physical урона, которую щит принимает на себя, [0,1]
    pub shield_physical_intake: f32,
    /// Доля урона, которую пропускает броня (1 - resistance), [0,1]
    pub armor_damage_intake: f32,
    /// Доля energy урона, доходящая до корпуса, [0,1]
    pub hull_energy_intake: f32,

    /// Countdown до начала regen (выставляется при уроне)
    pub regen_timer: f32,
}

impl Default for LayeredHealth {
    fn default() -> Self {
        Self::from_stats(&ShipStats::corvette())
    }
}

impl LayeredHealth {
    pub fn new(max_shield: f32, max_armor: f32, max_hull: f32) -> Self {
        Self {
            shield: max_shield,
            max_shield,
            armor: max_armor,
            max_armor,
            hull: max_hull,
            max_hull,
            shield_regen_rate: 10.0,
            shield_regen_delay: 3.0,
            shield_physical_intake: 1.0,
            armor_damage_intake: 0.5,
            hull_energy_intake: 1.0,
            regen_timer: 0.0,
        }
    }

    /// Создать из профиля «ship stats» (все пулы на максимуме)
    pub fn from_stats(stats: &ShipStats) -> Self {
        Self {
            shield: stats.max_shield,
            max_shield: stats.max_shield,
            armor: stats.max_armor,
            max_armor: stats.max_armor,
            hull: stats.max_hull,
            max_hull: stats.max_hull,
            shield_regen_rate: stats.shield_regen_rate,
            shield_regen_delay: stats.shield_regen_delay,
            shield_physical_intake: stats.shield_physical_intake,
            armor_damage_intake: stats.armor_damage_intake,
            hull_energy_intake: stats.hull_energy_intake,
            regen_timer: 0.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hull > 0.0
    }

    /// Доля корпуса, [0,1]; 0 при невалидном max
    pub fn health_percent(&self) -> f32 {
        if self.max_hull <= 0.0 {
            return 0.0;
        }
        (self.hull / self.max_hull).clamp(0.0, 1.0)
    }

    pub fn shield_percent(&self) -> f32 {
        if self.max_shield <= 0.0 {
            return 0.0;
        }
        (self.shield / self.max_shield).clamp(0.0, 1.0)
    }

    /// Починка корпуса (clamp к максимуму)
    pub fn repair(&mut self, amount: f32) {
        self.hull = (self.hull + amount.max(0.0)).min(self.max_hull);
    }

    pub fn restore_shield(&mut self, amount: f32) {
        self.shield = (self.shield + amount.max(0.0)).min(self.max_shield);
    }

    pub fn restore_armor(&mut self, amount: f32) {
        self.armor = (self.armor + amount.max(0.0)).min(self.max_armor);
    }

    /// Применить payload: Shield → Armor → Hull
    ///
    /// Детерминированное, атомарное применение; сбрасывает regen countdown.
    /// Knockback здесь НЕ применяется (это делает apply_damage system,
    /// у компонента нет доступа к PhysicsBody).
    pub fn take_damage(&mut self, payload: &DamagePayload) -> DamageReport {
        let mut report = DamageReport::default();

        let mut physical = payload.physical_damage.max(0.0);
        let mut energy = payload.energy_damage.max(0.0);

        // --- Shield stage ---
        if self.shield > 0.0 {
            let penetration = payload.shield_penetration.clamp(0.0, 1.0);
            let physical_through = physical * penetration;
            let energy_through = energy * penetration;

            // Physical масштабируется intake; energy против щита — full intake
            let intake = self.shield_physical_intake.clamp(0.0, 1.0);
            let shielded_physical = (physical - physical_through) * intake;
            let shielded_energy = energy - energy_through;

            let total = (shielded_physical + shielded_energy)
                * payload.shield_multiplier.factor();

            if total <= self.shield {
                self.shield -= total;
                report.shield_damage = total;
                physical = physical_through;
                energy = energy_through;
            } else {
                // Пробой: недогашенная доля исходного (не-bypass) урона
                // уходит в броню
                let overflow = if total > 0.0 {
                    (total - self.shield) / total
                } else {
                    0.0
                };
                report.shield_damage = self.shield;
                self.shield = 0.0;
                physical = physical_through + overflow * (physical - physical_through);
                energy = energy_through + overflow * (energy - energy_through);
            }
        }

        // --- Armor stage ---
        if self.armor > 0.0 && (physical > 0.0 || energy > 0.0) {
            let base_resistance = 1.0 - self.armor_damage_intake.clamp(0.0, 1.0);
            let effective_resistance =
                base_resistance * (1.0 - payload.armor_penetration.clamp(0.0, 1.0));
            let effective_intake = 1.0 - effective_resistance;

            let reduced_physical = physical * effective_intake;
            let reduced_energy = energy * effective_intake;
            let total =
                (reduced_physical + reduced_energy) * payload.armor_multiplier.factor();

            if total <= self.armor {
                self.armor -= total;
                report.armor_damage = total;
                physical = 0.0;
                energy = 0.0;
            } else {
                // Пробой брони: overflow УЖЕ сниженных величин, не исходных
                let overflow = if total > 0.0 {
                    (total - self.armor) / total
                } else {
                    0.0
                };
                report.armor_damage = self.armor;
                self.armor = 0.0;
                physical = reduced_physical * overflow;
                energy = reduced_energy * overflow;
            }
        }

        // --- Hull stage ---
        if physical > 0.0 || energy > 0.0 {
            let hull_damage = physical * payload.hull_multiplier.factor()
                + energy * self.hull_energy_intake.clamp(0.0, 1.0);
            report.hull_damage = hull_damage.min(self.hull);
            self.hull = (self.hull - hull_damage).max(0.0);
        }

        // Regen прерывается и ждёт заново
        self.regen_timer = self.shield_regen_delay;

        report
    }

    /// Тик regen щита. Возвращает true если щит изменился.
    ///
    /// Countdown съедает начало delta; остаток идёт в ramp (частичный тик
    /// на границе delay не теряется).
    pub fn tick_regen(&mut self, delta: f32) -> bool {
        let mut remaining = delta;

        if self.regen_timer > 0.0 {
            let waited = self.regen_timer.min(remaining);
            self.regen_timer -= waited;
            remaining -= waited;
        }

        if remaining > 0.0 && self.shield < self.max_shield && self.shield_regen_rate > 0.0 {
            self.shield = (self.shield + self.shield_regen_rate * remaining).min(self.max_shield);
            return true;
        }

        false
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Система: применение DamageEvent к LayeredHealth
///
/// 1. Knockback импульс (если есть PhysicsBody и impact_force > 0)
/// 2. Трёхслойное разрешение take_damage
/// 3. DamageDealt + HealthChanged события
/// 4. EntityDied ровно один раз (мертвые цели пропускаются)
pub fn apply_damage(
    mut damage_events: EventReader<DamageEvent>,
    mut dealt_events: EventWriter<DamageDealt>,
    mut changed_events: EventWriter<HealthChanged>,
    mut died_events: EventWriter<EntityDied>,
    mut targets: Query<(&Transform, &mut LayeredHealth, Option<&mut PhysicsBody>), Without<Dead>>,
) {
    for event in damage_events.read() {
        let Ok((transform, mut health, body)) = targets.get_mut(event.target) else {
            // Цель уничтожена/мертва между выстрелом и применением — silently drop
            continue;
        };

        // Несколько событий за тик: после смертельного — дальше не применяем
        if !health.is_alive() {
            continue;
        }

        let payload = &event.payload;

        // Knockback: от точки попадания наружу
        if payload.impact_force > 0.0 {
            if let Some(mut body) = body {
                let push = (transform.translation - payload.hit_point).normalize_or_zero();
                if push != Vec3::ZERO {
                    body.apply_impulse(push * payload.impact_force);
                }
            }
        }

        let report = health.take_damage(payload);
        let died = !health.is_alive();

        dealt_events.write(DamageDealt {
            attacker: payload.source,
            target: event.target,
            report,
            effects: payload.applied_effects.clone(),
            lifesteal_percent: payload.lifesteal_percent,
            target_died: died,
        });

        changed_events.write(HealthChanged {
            entity: event.target,
            shield: health.shield,
            armor: health.armor,
            hull: health.hull,
        });

        if died {
            died_events.write(EntityDied {
                entity: event.target,
                killer: payload.source,
            });

            logger::log_info(&format!(
                "Entity {:?} destroyed by {:?}",
                event.target, payload.source
            ));
        }
    }
}

/// Система: обработка смерти корабля
///
/// Гасит velocity, ставит Dead + DespawnAfter. Оружие/regen мертвых
/// отфильтровываются по Without<Dead>.
pub fn handle_ship_death(
    mut commands: Commands,
    mut death_events: EventReader<EntityDied>,
    mut bodies: Query<&mut PhysicsBody>,
) {
    for event in death_events.read() {
        if let Ok(mut body) = bodies.get_mut(event.entity) {
            body.velocity = Vec3::ZERO;
        }

        if let Ok(mut entity_commands) = commands.get_entity(event.entity) {
            entity_commands.insert((
                Dead,
                DespawnAfter {
                    remaining: WRECK_DESPAWN_DELAY,
                },
            ));
        }
    }
}

/// Система: regen щита
///
/// Ждёт shield_regen_delay непрерывного времени с последнего урона,
/// затем растёт на shield_regen_rate/сек до максимума. Любой урон
/// перезапускает ожидание (take_damage выставляет regen_timer).
pub fn regenerate_shields(
    mut query: Query<(Entity, &mut LayeredHealth), Without<Dead>>,
    mut changed_events: EventWriter<HealthChanged>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for (entity, mut health) in query.iter_mut() {
        if health.tick_regen(delta) {
            changed_events.write(HealthChanged {
                entity,
                shield: health.shield,
                armor: health.armor,
                hull: health.hull,
            });
        }
    }
}

/// Система: уборка entity с истёкшим DespawnAfter
pub fn despawn_after_timeout(
    mut commands: Commands,
    mut query: Query<(Entity, &mut DespawnAfter)>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for (entity, mut despawn) in query.iter_mut() {
        despawn.remaining -= delta;
        if despawn.remaining <= 0.0 {
            if let Ok(mut entity_commands) = commands.get_entity(entity) {
                entity_commands.despawn();
            }
        }
    }
}
