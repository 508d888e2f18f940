//! STARFALL Simulation Core
//!
//! ECS-симуляция космического боя на Bevy 0.16:
//! - Слоёное здоровье Shield → Armor → Hull (combat::health)
//! - Оружейный автомат trigger/charge/ammo (combat::weapon)
//! - Lock-on targeting с упреждением (combat::targeting)
//! - Умные снаряды: homing, pierce, ricochet, взрывы (combat::projectile)
//!
//! Хост (рендер, ввод, сеть) снаружи: пишет AimReticle и триггеры,
//! читает события WeaponFired/DamageDealt/HealthChanged/EntityDied.
//!
//! Детерминизм: fixed timestep 60Hz + seeded ChaCha8 RNG — одинаковый
//! seed и последовательность тиков дают идентичный мир.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod combat;
pub mod components;
pub mod layers;
pub mod logger;
pub mod profiles;
pub mod spatial;

// Re-export ядра для удобства
pub use combat::{
    CombatPlugin, DamageDealt, DamageEvent, DamagePayload, DamageReport, Dead, EntityDied,
    HealthChanged, LayeredHealth, LayerScale, PayloadSpec, ProjectileSpec, SmartProjectile,
    TargetTracker, WeaponData, WeaponFired, WeaponState,
};
pub use components::{AimReticle, CollisionBody, PhysicsBody, Ship};
pub use logger::{init_logger, log, log_error, log_info, log_warning};
pub use profiles::{ShipStats, ShipStatsRegistry};
pub use spatial::SpatialIndex;

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            // Детерминистичный RNG (seed по умолчанию)
            .insert_resource(DeterministicRng::new(42))
            .init_resource::<ShipStatsRegistry>()
            .add_plugins(CombatPlugin);
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng(pub ChaCha8Rng);

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    logger::init_logger();
    app.add_plugins(MinimalPlugins)
        .add_plugins(SimulationPlugin)
        .insert_resource(DeterministicRng::new(seed));
    app
}

/// Один детерминированный шаг симуляции
///
/// Двигает Time<Fixed> ровно на один timestep и прогоняет FixedUpdate
/// напрямую — без wall-clock аккумулятора app.update(), который под
/// быстрым циклом пропускал бы тики.
pub fn step_simulation(app: &mut App) {
    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    app.world_mut().resource_mut::<Time<Fixed>>().advance_by(timestep);
    app.world_mut().run_schedule(FixedUpdate);
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
