//! Combat — слоёное здоровье, оружие, снаряды
//!
//! Порядок систем за FixedUpdate тик (strict chain):
//! 1. integrate_velocity — движение кораблей/осколков
//! 2. rebuild_spatial_index — свежий снимок позиций
//! 3. update_targeting — scan/prune/predict/primary
//! 4. update_ammo_systems — reload/cooling/lockout countdown
//! 5. update_weapon_charge — накопление заряда
//! 6. evaluate_weapon_fire — условия спуска + выстрелы
//! 7. update_projectiles — полёт/коллизии/взрывы
//! 8. apply_damage — DamageEvent → LayeredHealth pipeline
//! 9. handle_ship_death — Dead + DespawnAfter
//! 10. regenerate_shields — delay-then-ramp
//! 11. despawn_after_timeout — уборка обломков
//!
//! Targeting строго раньше fire evaluation: выбор primary питает
//! aim direction того же тика.

pub mod health;
pub mod hitscan;
pub mod payload;
pub mod projectile;
pub mod targeting;
pub mod weapon;

pub use health::{
    apply_damage, despawn_after_timeout, handle_ship_death, regenerate_shields, DamageDealt,
    DamageEvent, DamageReport, Dead, DespawnAfter, EntityDied, HealthChanged, LayeredHealth,
};
pub use hitscan::{resolve_hitscan, HitscanShot};
pub use payload::{DamagePayload, LayerScale, PayloadSpec, StatusEffect, StatusEffectKind};
pub use projectile::{
    explode_area, update_projectiles, ExplosionSpec, ProjectileSpec, SecondaryKind,
    SecondarySpawn, SmartProjectile, SpawnReason, SpawnTrigger, PIERCE_DECAY,
};
pub use targeting::{
    aim_direction, update_targeting, TargetTrack, TargetTracker, ACQUISITION_CONE_DEG,
    RETENTION_CONE_DEG,
};
pub use weapon::{
    evaluate_weapon_fire, update_ammo_systems, update_weapon_charge, AmmoSystem, BurstConfig,
    ChargeStyle, FiringMethod, TriggerMode, WeaponData, WeaponFired, WeaponState,
};

use bevy::prelude::*;

use crate::components::physics::integrate_velocity;
use crate::components::{AimReticle, CollisionBody, PhysicsBody, Ship};
use crate::spatial::{rebuild_spatial_index, SpatialIndex};

/// Плагин боевой симуляции: события, ресурсы, chain систем
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpatialIndex>()
            .add_event::<DamageEvent>()
            .add_event::<DamageDealt>()
            .add_event::<HealthChanged>()
            .add_event::<EntityDied>()
            .add_event::<WeaponFired>()
            .register_type::<Ship>()
            .register_type::<AimReticle>()
            .register_type::<PhysicsBody>()
            .register_type::<CollisionBody>()
            .register_type::<LayeredHealth>()
            .register_type::<WeaponData>()
            .register_type::<WeaponState>()
            .register_type::<TargetTracker>()
            .add_systems(
                FixedUpdate,
                (
                    integrate_velocity,
                    rebuild_spatial_index,
                    update_targeting,
                    update_ammo_systems,
                    update_weapon_charge,
                    evaluate_weapon_fire,
                    update_projectiles,
                    apply_damage,
                    handle_ship_death,
                    regenerate_shields,
                    despawn_after_timeout,
                )
                    .chain(),
            );
    }
}
