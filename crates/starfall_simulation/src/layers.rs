//! Collision layers (bitmask)
//!
//! Слои для SpatialIndex queries: корабли, снаряды-мишени, рикошет-поверхности.
//! Маски комбинируются через `|`, проверка через `&`.

/// Корабли (damageable targets)
pub const LAYER_SHIPS: u32 = 1 << 0;

/// Астероиды / обломки станций — поверхности для рикошета, не damageable
pub const LAYER_ASTEROIDS: u32 = 1 << 1;

/// Инертные осколки (secondary payload без projectile-типа)
pub const LAYER_DEBRIS: u32 = 1 << 2;

/// Всё сразу (для терминальных raycast)
pub const MASK_ALL: u32 = u32::MAX;
