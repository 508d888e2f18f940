//! Weapon system — trigger/charge/ammo state machine
//!
//! Архитектура:
//! - WeaponData: immutable конфигурация (presets как pulse_cannon())
//! - WeaponState: mutable runtime (cooldown, charge, ammo, burst)
//! - Порядок за тик: targeting → ammo/heat → charge → fire evaluation
//!   (CombatPlugin chain, см. combat/mod.rs)
//!
//! Все таймеры — countdown поля, тикаются fixed delta. Никакого
//! wall-clock и абсолютных «next_fire_time» меток.
//!
//! Failure semantics: выстрел, не прошедший precondition (cooldown,
//! ammo, charge) — тихий no-op, не ошибка.

use bevy::prelude::*;

use crate::combat::health::{DamageEvent, Dead, LayeredHealth};
use crate::combat::hitscan::{self, HitscanShot};
use crate::combat::payload::PayloadSpec;
use crate::combat::projectile::{self, ProjectileSpec, SmartProjectile};
use crate::combat::targeting::{aim_direction, TargetTracker};
use crate::components::{AimReticle, CollisionBody, Ship};
use crate::layers::{LAYER_ASTEROIDS, LAYER_DEBRIS, LAYER_SHIPS};
use crate::logger;
use crate::spatial::SpatialIndex;
use crate::DeterministicRng;

/// Множитель fire rate в начале spool-up (ramp 30% → 100%)
pub const SPOOL_MIN_RATE_FRACTION: f32 = 0.3;

// ============================================================================
// Configuration enums
// ============================================================================

/// Режим спуска
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum TriggerMode {
    /// Один выстрел на нажатие (edge)
    #[default]
    SemiAuto,
    /// Очередь пока зажат, rate-limited
    FullAuto,
    /// Накопление заряда, поведение по ChargeStyle
    ChargeToFire,
}

/// Подстиль ChargeToFire
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum ChargeStyle {
    /// Автовыстрел + сброс при полном заряде
    AutoRelease,
    /// Выстрел на отпускание; hold_indefinitely=false → автовыстрел
    /// при полном заряде даже без отпускания
    HoldAndRelease { hold_indefinitely: bool },
    /// Раскрутка: стреляет ВО ВРЕМЯ зарядки, rate растёт 30%→100%
    SpoolUp,
}

impl Default for ChargeStyle {
    fn default() -> Self {
        Self::AutoRelease
    }
}

/// Система боезапаса (ортогональна режиму спуска)
#[derive(Debug, Clone, PartialEq, Reflect)]
pub enum AmmoSystem {
    /// Магазин: конечный счёт, авто-перезарядка на нуле
    Magazine { max_ammo: u32, reload_time: f32 },
    /// Теплосток: нагрев за выстрел, охлаждение в простое,
    /// перегрев → lockout на penalty_time, после — heat=0
    HeatSink {
        max_heat: f32,
        heat_per_shot: f32,
        cool_rate: f32,
        penalty_time: f32,
    },
    /// Без ограничений
    Infinite,
}

impl Default for AmmoSystem {
    fn default() -> Self {
        Self::Infinite
    }
}

/// Способ поражения
#[derive(Debug, Clone, PartialEq, Reflect)]
pub enum FiringMethod {
    /// Мгновенный ray walk (pierce/ricochet внутри тика)
    Hitscan {
        max_distance: f32,
        /// Сквозь сколько damageable целей луч проходит дальше
        pierce_count: u32,
        /// Отскоков от ricochet-поверхностей (астероиды)
        ricochet_count: u32,
    },
    /// Спавн SmartProjectile per shot/pellet
    Projectile(ProjectileSpec),
}

impl Default for FiringMethod {
    fn default() -> Self {
        Self::Hitscan {
            max_distance: 500.0,
            pierce_count: 0,
            ricochet_count: 0,
        }
    }
}

/// Очередь: count выстрелов через delay, с lock на время серии
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct BurstConfig {
    pub count: u32,
    pub delay: f32,
}

// ============================================================================
// WeaponData
// ============================================================================

/// Immutable конфигурация оружия
///
/// Presets внизу (pulse_cannon и т.д.) — канонические наборы
/// параметров для тестов и headless демо.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct WeaponData {
    pub name: String,

    pub trigger_mode: TriggerMode,
    pub charge_style: ChargeStyle,
    /// Время полного заряда/раскрутки (секунды)
    pub charge_time: f32,

    /// Базовый fire rate (выстрелов/сек)
    pub fire_rate: f32,
    pub ammo: AmmoSystem,
    pub method: FiringMethod,
    pub burst: Option<BurstConfig>,

    /// Снарядов на выстрел (дробовой конус)
    pub pellets: u32,
    /// Полуугол разброса pellets (градусы)
    pub spread_deg: f32,

    pub payload: PayloadSpec,
    pub crit_chance: f32,
    pub crit_multiplier: f32,

    // === Targeting ===
    pub max_lock_distance: f32,
    /// 1 = обычная пушка с aim-assist; >1 = рой (missiles)
    pub max_lock_targets: usize,
    /// Полуугол конуса aim-assist (градусы)
    pub assist_cone_deg: f32,
    /// Время удержания в primary до захвата (секунды)
    pub lock_on_time: f32,
    /// Снаряды этого оружия самонаводятся на захваченные цели
    pub is_homing: bool,

    /// Вынос точки спавна снаряда перед кораблём (метры)
    pub muzzle_offset: f32,
}

impl Default for WeaponData {
    fn default() -> Self {
        Self {
            name: "weapon".to_string(),
            trigger_mode: TriggerMode::default(),
            charge_style: ChargeStyle::default(),
            charge_time: 1.0,
            fire_rate: 2.0,
            ammo: AmmoSystem::Infinite,
            method: FiringMethod::default(),
            burst: None,
            pellets: 1,
            spread_deg: 0.0,
            payload: PayloadSpec::default(),
            crit_chance: 0.0,
            crit_multiplier: 2.0,
            max_lock_distance: 300.0,
            max_lock_targets: 1,
            assist_cone_deg: 15.0,
            lock_on_time: 1.0,
            is_homing: false,
            muzzle_offset: 3.0,
        }
    }
}

impl WeaponData {
    /// Скорость снаряда для lead prediction (None = hitscan, мгновенно)
    pub fn projectile_speed(&self) -> Option<f32> {
        match &self.method {
            FiringMethod::Hitscan { .. } => None,
            FiringMethod::Projectile(spec) => Some(spec.speed),
        }
    }

    // === Presets ===

    /// Импульсная пушка: full-auto hitscan на теплостоке
    pub fn pulse_cannon() -> Self {
        Self {
            name: "pulse_cannon".to_string(),
            trigger_mode: TriggerMode::FullAuto,
            fire_rate: 5.0,
            ammo: AmmoSystem::HeatSink {
                max_heat: 100.0,
                heat_per_shot: 8.0,
                cool_rate: 15.0,
                penalty_time: 2.5,
            },
            method: FiringMethod::Hitscan {
                max_distance: 400.0,
                pierce_count: 0,
                ricochet_count: 0,
            },
            payload: PayloadSpec::energy(12.0),
            crit_chance: 0.05,
            crit_multiplier: 2.0,
            ..Default::default()
        }
    }

    /// Автопушка: full-auto кинетические снаряды, магазин
    pub fn autocannon() -> Self {
        Self {
            name: "autocannon".to_string(),
            trigger_mode: TriggerMode::FullAuto,
            fire_rate: 8.0,
            ammo: AmmoSystem::Magazine {
                max_ammo: 40,
                reload_time: 2.0,
            },
            method: FiringMethod::Projectile(ProjectileSpec {
                speed: 180.0,
                lifetime: 3.0,
                ..Default::default()
            }),
            payload: PayloadSpec {
                physical: 8.0,
                impact_force: 40.0,
                ..Default::default()
            },
            crit_chance: 0.1,
            crit_multiplier: 1.5,
            ..Default::default()
        }
    }

    /// Ракетная установка: semi-auto рой самонаводящихся ракет
    pub fn missile_launcher() -> Self {
        Self {
            name: "missile_launcher".to_string(),
            trigger_mode: TriggerMode::SemiAuto,
            fire_rate: 0.5,
            ammo: AmmoSystem::Magazine {
                max_ammo: 6,
                reload_time: 4.0,
            },
            method: FiringMethod::Projectile(ProjectileSpec {
                speed: 60.0,
                lifetime: 8.0,
                turn_speed_deg: 90.0,
                proximity_radius: 4.0,
                explosion: Some(projectile::ExplosionSpec {
                    radius: 10.0,
                    force: 300.0,
                }),
                ..Default::default()
            }),
            burst: Some(BurstConfig {
                count: 4,
                delay: 0.15,
            }),
            payload: PayloadSpec {
                physical: 30.0,
                energy: 10.0,
                impact_force: 150.0,
                ..Default::default()
            },
            max_lock_targets: 4,
            assist_cone_deg: 30.0,
            lock_on_time: 1.5,
            is_homing: true,
            ..Default::default()
        }
    }

    /// Рельсотрон: заряд с удержанием, пробивающий hitscan
    pub fn railgun() -> Self {
        Self {
            name: "railgun".to_string(),
            trigger_mode: TriggerMode::ChargeToFire,
            charge_style: ChargeStyle::HoldAndRelease {
                hold_indefinitely: true,
            },
            charge_time: 1.5,
            fire_rate: 1.0,
            ammo: AmmoSystem::Magazine {
                max_ammo: 5,
                reload_time: 3.0,
            },
            method: FiringMethod::Hitscan {
                max_distance: 800.0,
                pierce_count: 2,
                ricochet_count: 0,
            },
            payload: PayloadSpec {
                physical: 80.0,
                shield_penetration: 0.3,
                armor_penetration: 0.5,
                impact_force: 400.0,
                ..Default::default()
            },
            crit_chance: 0.15,
            crit_multiplier: 2.5,
            ..Default::default()
        }
    }

    /// Вулкан: spool-up теплосток, стреляет во время раскрутки
    pub fn rotary_cannon() -> Self {
        Self {
            name: "rotary_cannon".to_string(),
            trigger_mode: TriggerMode::ChargeToFire,
            charge_style: ChargeStyle::SpoolUp,
            charge_time: 2.0,
            fire_rate: 12.0,
            ammo: AmmoSystem::HeatSink {
                max_heat: 200.0,
                heat_per_shot: 3.0,
                cool_rate: 25.0,
                penalty_time: 3.0,
            },
            method: FiringMethod::Projectile(ProjectileSpec {
                speed: 220.0,
                lifetime: 2.0,
                ..Default::default()
            }),
            payload: PayloadSpec::kinetic(4.0),
            spread_deg: 2.0,
            ..Default::default()
        }
    }
}

// ============================================================================
// WeaponState
// ============================================================================

/// Состояние серии burst
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct BurstState {
    /// Выстрелов осталось после начального
    pub remaining: u32,
    /// Countdown до следующего выстрела серии
    pub delay_timer: f32,
}

/// Runtime состояние оружия
///
/// Хост дергает pull_trigger()/release_trigger(); системы читают
/// edge-флаги и тикают таймеры.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(TargetTracker)]
pub struct WeaponState {
    pub trigger_held: bool,
    /// Edge: нажатие с прошлого тика (SemiAuto)
    pub pressed_edge: bool,
    /// Edge: отпускание с прошлого тика (HoldAndRelease)
    pub released_edge: bool,

    /// Countdown до готовности следующего выстрела
    pub cooldown_timer: f32,
    /// Накопленный заряд, [0, charge_time]
    pub charge: f32,

    /// Патронов в магазине (для Magazine)
    pub ammo: u32,
    pub reloading: bool,
    pub reload_timer: f32,

    /// Накопленный нагрев (для HeatSink)
    pub heat: f32,
    pub overheated: bool,
    pub overheat_timer: f32,

    pub burst: Option<BurstState>,

    /// Round-robin по захваченным целям (рой ракет)
    pub next_lock_index: usize,
}

impl WeaponState {
    /// Начальное состояние под конфигурацию (полный магазин, холодный)
    pub fn for_weapon(weapon: &WeaponData) -> Self {
        let ammo = match &weapon.ammo {
            AmmoSystem::Magazine { max_ammo, .. } => *max_ammo,
            _ => 0,
        };
        Self {
            ammo,
            ..Default::default()
        }
    }

    pub fn pull_trigger(&mut self) {
        if !self.trigger_held {
            self.pressed_edge = true;
        }
        self.trigger_held = true;
    }

    pub fn release_trigger(&mut self) {
        if self.trigger_held {
            self.released_edge = true;
        }
        self.trigger_held = false;
    }

    /// Боезапас позволяет выстрел?
    pub fn has_ammo(&self, weapon: &WeaponData) -> bool {
        match &weapon.ammo {
            AmmoSystem::Magazine { .. } => self.ammo > 0 && !self.reloading,
            AmmoSystem::HeatSink { .. } => !self.overheated,
            AmmoSystem::Infinite => true,
        }
    }

    pub fn is_fully_charged(&self, weapon: &WeaponData) -> bool {
        weapon.charge_time <= 0.0 || self.charge >= weapon.charge_time
    }

    /// Доля заряда [0,1] (HUD)
    pub fn charge_percent(&self, weapon: &WeaponData) -> f32 {
        if weapon.charge_time <= 0.0 {
            return 1.0;
        }
        (self.charge / weapon.charge_time).clamp(0.0, 1.0)
    }

    /// Доля нагрева [0,1] (HUD)
    pub fn heat_percent(&self, weapon: &WeaponData) -> f32 {
        match &weapon.ammo {
            AmmoSystem::HeatSink { max_heat, .. } if *max_heat > 0.0 => {
                (self.heat / max_heat).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Доля боезапаса [0,1] (HUD)
    pub fn ammo_percent(&self, weapon: &WeaponData) -> f32 {
        match &weapon.ammo {
            AmmoSystem::Magazine { max_ammo, .. } if *max_ammo > 0 => {
                self.ammo as f32 / *max_ammo as f32
            }
            AmmoSystem::Magazine { .. } => 0.0,
            _ => 1.0,
        }
    }

    /// Эффективный fire rate: SpoolUp масштабирует 30%→100% по заряду
    pub fn effective_fire_rate(&self, weapon: &WeaponData) -> f32 {
        match (weapon.trigger_mode, weapon.charge_style) {
            (TriggerMode::ChargeToFire, ChargeStyle::SpoolUp) => {
                let progress = self.charge_percent(weapon);
                weapon.fire_rate
                    * (SPOOL_MIN_RATE_FRACTION + (1.0 - SPOOL_MIN_RATE_FRACTION) * progress)
            }
            _ => weapon.fire_rate,
        }
    }

    /// Preconditions TryFire: не в burst lock, не в cooldown, есть боезапас
    ///
    /// Charge-условия проверяет вызывающий (зависят от стиля).
    pub fn can_fire(&self, weapon: &WeaponData) -> bool {
        self.burst.is_none() && self.cooldown_timer <= 0.0 && self.has_ammo(weapon)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event: оружие произвело выстрел (для VFX/аудио слоя хоста)
#[derive(Event, Debug, Clone)]
pub struct WeaponFired {
    pub shooter: Entity,
    pub weapon_name: String,
    pub origin: Vec3,
    pub direction: Vec3,
    /// Цель самонаведения, если выстрел был по захвату
    pub homing_target: Option<Entity>,
}

// ============================================================================
// Systems
// ============================================================================

/// Система: боезапас и тепло
///
/// - Magazine: авто-перезарядка при нуле, тик reload countdown
/// - HeatSink: охлаждение в простое; overheat lockout countdown,
///   по истечении heat сбрасывается в 0
pub fn update_ammo_systems(
    mut weapons: Query<(Entity, &WeaponData, &mut WeaponState), Without<Dead>>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for (entity, weapon, mut state) in weapons.iter_mut() {
        state.cooldown_timer = (state.cooldown_timer - delta).max(0.0);

        match &weapon.ammo {
            AmmoSystem::Magazine {
                max_ammo,
                reload_time,
            } => {
                if state.reloading {
                    state.reload_timer -= delta;
                    if state.reload_timer <= 0.0 {
                        state.reloading = false;
                        state.ammo = *max_ammo;
                        logger::log_info(&format!(
                            "{:?} {} reloaded ({} rounds)",
                            entity, weapon.name, max_ammo
                        ));
                    }
                } else if state.ammo == 0 {
                    state.reloading = true;
                    state.reload_timer = *reload_time;
                    logger::log_info(&format!(
                        "{:?} {} reloading ({:.1}s)",
                        entity, weapon.name, reload_time
                    ));
                }
            }
            AmmoSystem::HeatSink { cool_rate, .. } => {
                if state.overheated {
                    state.overheat_timer -= delta;
                    if state.overheat_timer <= 0.0 {
                        state.overheated = false;
                        state.heat = 0.0;
                        logger::log_info(&format!(
                            "{:?} {} cooled down",
                            entity, weapon.name
                        ));
                    }
                } else if state.heat > 0.0 {
                    // Охлаждение только в простое: зажатый триггер,
                    // активная серия или свежий выстрел (cooldown)
                    // считаются стрельбой
                    let idle = !state.trigger_held
                        && state.burst.is_none()
                        && state.cooldown_timer <= 0.0;
                    if idle {
                        state.heat = (state.heat - cool_rate * delta).max(0.0);
                    }
                }
            }
            AmmoSystem::Infinite => {}
        }
    }
}

/// Система: накопление заряда (ChargeToFire)
///
/// HoldAndRelease: заряд НЕ сбрасывается пока released_edge не
/// обработан fire-системой (иначе edge терял бы заряд).
pub fn update_weapon_charge(
    mut weapons: Query<(&WeaponData, &mut WeaponState), Without<Dead>>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for (weapon, mut state) in weapons.iter_mut() {
        if weapon.trigger_mode != TriggerMode::ChargeToFire {
            continue;
        }

        if state.trigger_held {
            state.charge = (state.charge + delta).min(weapon.charge_time.max(0.0));
        } else {
            match weapon.charge_style {
                ChargeStyle::HoldAndRelease { .. } if state.released_edge => {
                    // Заряд доживает до fire evaluation этого тика
                }
                _ => {
                    state.charge = 0.0;
                }
            }
        }
    }
}

/// Система: оценка условий выстрела и сам выстрел
///
/// Работает после targeting/ammo/charge. Burst lock тикается здесь же:
/// серия продолжается независимо от триггера, обрывается на пустом
/// магазине.
pub fn evaluate_weapon_fire(
    mut commands: Commands,
    index: Res<SpatialIndex>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
    mut shooters: Query<
        (
            Entity,
            &Transform,
            &AimReticle,
            &WeaponData,
            &mut WeaponState,
            &TargetTracker,
        ),
        (With<Ship>, Without<Dead>),
    >,
    damageable: Query<(), (With<LayeredHealth>, Without<Dead>)>,
    mut fired_events: EventWriter<WeaponFired>,
    mut damage_events: EventWriter<DamageEvent>,
) {
    let delta = time.delta_secs();

    for (entity, transform, reticle, weapon, mut state, tracker) in shooters.iter_mut() {
        let (aim, homing_target) = aim_direction(transform, reticle, weapon, tracker);

        // --- Burst continuation (lock активен) ---
        if let Some(mut burst) = state.burst {
            burst.delay_timer -= delta;
            if burst.delay_timer <= 0.0 {
                if state.has_ammo(weapon) && burst.remaining > 0 {
                    fire_shot(
                        &mut commands,
                        &index,
                        &mut rng.0,
                        entity,
                        transform,
                        weapon,
                        &mut state,
                        tracker,
                        aim,
                        homing_target,
                        &damageable,
                        &mut fired_events,
                        &mut damage_events,
                    );
                    burst.remaining -= 1;
                    burst.delay_timer = weapon.burst.map_or(0.0, |b| b.delay);
                }
                if burst.remaining == 0 || !state.has_ammo(weapon) {
                    state.burst = None;
                } else {
                    state.burst = Some(burst);
                }
            } else {
                state.burst = Some(burst);
            }
            state.pressed_edge = false;
            state.released_edge = false;
            continue;
        }

        // --- Trigger evaluation ---
        let mut fire = false;
        let mut reset_charge = false;

        match weapon.trigger_mode {
            TriggerMode::SemiAuto => {
                fire = state.pressed_edge && state.can_fire(weapon);
            }
            TriggerMode::FullAuto => {
                fire = state.trigger_held && state.can_fire(weapon);
            }
            TriggerMode::ChargeToFire => match weapon.charge_style {
                ChargeStyle::AutoRelease => {
                    if state.is_fully_charged(weapon)
                        && state.trigger_held
                        && state.can_fire(weapon)
                    {
                        fire = true;
                        reset_charge = true;
                    }
                }
                ChargeStyle::HoldAndRelease { hold_indefinitely } => {
                    if state.released_edge {
                        fire = state.is_fully_charged(weapon) && state.can_fire(weapon);
                        // Отпускание тратит заряд независимо от исхода
                        reset_charge = true;
                    } else if !hold_indefinitely
                        && state.trigger_held
                        && state.is_fully_charged(weapon)
                        && state.can_fire(weapon)
                    {
                        fire = true;
                        reset_charge = true;
                    }
                }
                ChargeStyle::SpoolUp => {
                    // Стреляет во время раскрутки на ramped rate
                    fire = state.trigger_held
                        && state.can_fire(weapon)
                        && state.effective_fire_rate(weapon) > 0.0;
                }
            },
        }

        if fire {
            let rate = state.effective_fire_rate(weapon);
            if rate > 0.0 {
                state.cooldown_timer = 1.0 / rate;
                fire_shot(
                    &mut commands,
                    &index,
                    &mut rng.0,
                    entity,
                    transform,
                    weapon,
                    &mut state,
                    tracker,
                    aim,
                    homing_target,
                    &damageable,
                    &mut fired_events,
                    &mut damage_events,
                );
                if let Some(burst) = weapon.burst {
                    if burst.count > 1 {
                        state.burst = Some(BurstState {
                            remaining: burst.count - 1,
                            delay_timer: burst.delay,
                        });
                    }
                }
            }
        }

        if reset_charge {
            state.charge = 0.0;
        }
        state.pressed_edge = false;
        state.released_edge = false;
    }
}

/// Один выстрел: расход боезапаса, pellets, hitscan walk или спавн снарядов
#[allow(clippy::too_many_arguments)]
fn fire_shot(
    commands: &mut Commands,
    index: &SpatialIndex,
    rng: &mut rand_chacha::ChaCha8Rng,
    shooter: Entity,
    transform: &Transform,
    weapon: &WeaponData,
    state: &mut WeaponState,
    tracker: &TargetTracker,
    aim: Vec3,
    homing_target: Option<Entity>,
    damageable: &Query<(), (With<LayeredHealth>, Without<Dead>)>,
    fired_events: &mut EventWriter<WeaponFired>,
    damage_events: &mut EventWriter<DamageEvent>,
) {
    // Расход боезапаса
    match &weapon.ammo {
        AmmoSystem::Magazine { .. } => {
            state.ammo = state.ammo.saturating_sub(1);
        }
        AmmoSystem::HeatSink {
            max_heat,
            heat_per_shot,
            penalty_time,
            ..
        } => {
            state.heat += heat_per_shot;
            if state.heat >= *max_heat {
                state.overheated = true;
                state.overheat_timer = *penalty_time;
                logger::log_warning(&format!(
                    "{:?} {} overheated ({:.1}s lockout)",
                    shooter, weapon.name, penalty_time
                ));
            }
        }
        AmmoSystem::Infinite => {}
    }

    let origin = transform.translation + aim * weapon.muzzle_offset;
    let pellets = weapon.pellets.max(1);

    for _ in 0..pellets {
        let direction = if weapon.spread_deg > 0.0 {
            projectile::spread_direction(aim, weapon.spread_deg, rng)
        } else {
            aim
        };

        match &weapon.method {
            FiringMethod::Hitscan {
                max_distance,
                pierce_count,
                ricochet_count,
            } => {
                hitscan::resolve_hitscan(
                    index,
                    HitscanShot {
                        source: shooter,
                        origin,
                        direction,
                        max_distance: *max_distance,
                        pierce_count: *pierce_count,
                        ricochet_count: *ricochet_count,
                        ricochet_mask: LAYER_ASTEROIDS,
                        target_mask: LAYER_SHIPS | LAYER_ASTEROIDS,
                        payload: &weapon.payload,
                        crit_chance: weapon.crit_chance,
                        crit_multiplier: weapon.crit_multiplier,
                    },
                    |e| damageable.contains(e),
                    rng,
                    damage_events,
                );
            }
            FiringMethod::Projectile(spec) => {
                // Round-robin по захваченным целям для роя
                let target = if weapon.is_homing || weapon.max_lock_targets > 1 {
                    pick_homing_target(state, tracker, homing_target)
                } else {
                    None
                };

                let projectile = SmartProjectile::from_spec(
                    spec,
                    weapon.payload.instantiate(Some(shooter), direction),
                    shooter,
                    direction,
                    target,
                    weapon.crit_chance,
                    weapon.crit_multiplier,
                );

                commands.spawn((
                    projectile,
                    Transform::from_translation(origin)
                        .looking_to(Dir3::new(direction).unwrap_or(Dir3::NEG_Z), Vec3::Y),
                    CollisionBody::new(0.3, LAYER_DEBRIS),
                ));
            }
        }
    }

    fired_events.write(WeaponFired {
        shooter,
        weapon_name: weapon.name.clone(),
        origin,
        direction: aim,
        homing_target,
    });
}

/// Следующая захваченная цель по кругу; fallback на aim-assist цель
fn pick_homing_target(
    state: &mut WeaponState,
    tracker: &TargetTracker,
    assist_target: Option<Entity>,
) -> Option<Entity> {
    let locked: Vec<Entity> = tracker
        .tracks
        .iter()
        .filter(|t| t.is_locked)
        .map(|t| t.entity)
        .collect();

    if locked.is_empty() {
        return assist_target;
    }
    let picked = locked[state.next_lock_index % locked.len()];
    state.next_lock_index = state.next_lock_index.wrapping_add(1);
    Some(picked)
}
