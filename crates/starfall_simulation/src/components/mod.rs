//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - ship: базовые характеристики корабля (faction, прицел)
//! - physics: custom velocity integration + сферический collision proxy
//!
//! Боевые компоненты (LayeredHealth, WeaponData, SmartProjectile, TargetTracker)
//! живут в `crate::combat` рядом со своими системами.

pub mod physics;
pub mod ship;

// Re-exports для удобного импорта
pub use physics::*;
pub use ship::*;
