//! Физические компоненты: PhysicsBody (velocity), CollisionBody (сферический proxy)
//!
//! Архитектура:
//! - Физический движок вне scope: custom velocity integration в FixedUpdate
//! - Импульсы (knockback, взрывы) — мгновенное изменение velocity через массу
//! - Коллизии — сферические proxy, запросы через `crate::spatial::SpatialIndex`
//!
//! Детерминизм: fixed timestep (60Hz), никакого wall-clock в интеграции.

use bevy::prelude::*;
use crate::layers::LAYER_SHIPS;

/// Кинематическое тело: velocity + масса
///
/// Velocity интегрируется в Transform каждый FixedUpdate.
/// Entity без PhysicsBody просто не получает импульсы (no-op по спецификации).
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct PhysicsBody {
    /// Текущая скорость (м/с, world space)
    pub velocity: Vec3,
    /// Масса (кг) — делитель для импульсов
    pub mass: f32,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            mass: 100.0,
        }
    }
}

impl PhysicsBody {
    pub fn new(mass: f32) -> Self {
        Self {
            velocity: Vec3::ZERO,
            mass,
        }
    }

    /// Мгновенный импульс: delta-v = impulse / mass
    ///
    /// Нулевая/отрицательная масса — защита от деления, импульс игнорируется.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.mass > 0.0 {
            self.velocity += impulse / self.mass;
        }
    }
}

/// Сферический collision proxy для SpatialIndex
///
/// Слои см. `crate::layers`.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct CollisionBody {
    /// Радиус сферы (метры)
    pub radius: f32,
    /// Битовая маска слоя
    pub layer: u32,
}

impl Default for CollisionBody {
    fn default() -> Self {
        Self {
            radius: 2.0,
            layer: LAYER_SHIPS,
        }
    }
}

impl CollisionBody {
    pub fn new(radius: f32, layer: u32) -> Self {
        Self { radius, layer }
    }
}

/// Система интеграции velocity → Transform
///
/// Работает для всех PhysicsBody (корабли под knockback, инертные осколки).
/// Запускается ДО rebuild_spatial_index, чтобы queries видели свежие позиции.
pub fn integrate_velocity(
    mut query: Query<(&PhysicsBody, &mut Transform)>,
    time: Res<Time<Fixed>>,
) {
    let delta = time.delta_secs();

    for (body, mut transform) in query.iter_mut() {
        if body.velocity != Vec3::ZERO {
            transform.translation += body.velocity * delta;
        }
    }
}
