//! Базовые компоненты корабля: Ship, AimReticle

use bevy::prelude::*;
use crate::combat::health::LayeredHealth;
use crate::components::physics::{CollisionBody, PhysicsBody};

/// Корабль (игрок, NPC, турель) — базовый компонент боевых entity
///
/// Автоматически добавляет LayeredHealth, PhysicsBody, CollisionBody и AimReticle
/// через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(LayeredHealth, PhysicsBody, CollisionBody, AimReticle)]
pub struct Ship {
    /// Stable ID фракции (для выбора целей: своих не захватываем)
    pub faction_id: u64,
}

/// Точка прицеливания пилота (world space)
///
/// Хост (input layer, AI) пишет сюда каждый тик; weapon системы читают.
/// Если точка вырождена (совпадает с позицией корабля) — aim fallback
/// на forward корабля, см. `combat::targeting::aim_direction`.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct AimReticle {
    pub point: Vec3,
}

impl AimReticle {
    pub fn at(point: Vec3) -> Self {
        Self { point }
    }
}
