//! SpatialIndex — снимок коллизионной геометрии для боевых queries
//!
//! Архитектура:
//! - Resource пересобирается каждый тик из (Entity, Transform, CollisionBody)
//! - Queries: overlap_sphere, raycast, segment_hits (для pierce/ricochet walk)
//! - Результаты пишутся в caller-supplied буферы — никаких глобальных пулов
//!
//! Все проверки против сферических proxy: достаточно для proximity fuse,
//! взрывов и lock-on; точная геометрия кораблей вне scope симуляции.

use bevy::prelude::*;
use crate::components::CollisionBody;

/// Одна запись снимка
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub center: Vec3,
    pub radius: f32,
    pub layer: u32,
}

/// Результат raycast/segment query
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub entity: Entity,
    /// Точка контакта на поверхности сферы
    pub point: Vec3,
    /// Нормаль поверхности в точке контакта
    pub normal: Vec3,
    /// Дистанция от origin вдоль луча
    pub distance: f32,
    pub layer: u32,
}

/// Снимок коллизионной геометрии текущего тика
#[derive(Resource, Debug, Default)]
pub struct SpatialIndex {
    entries: Vec<SpatialEntry>,
}

impl SpatialIndex {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Запись конкретного entity в снимке (для falloff расчётов взрыва)
    pub fn entry(&self, entity: Entity) -> Option<SpatialEntry> {
        self.entries.iter().copied().find(|e| e.entity == entity)
    }

    /// Все entity, чьи сферы пересекают сферу (center, radius) на слоях mask
    ///
    /// Результат — в `out` (буфер вызывающего, очищается здесь).
    pub fn overlap_sphere(&self, center: Vec3, radius: f32, mask: u32, out: &mut Vec<Entity>) {
        out.clear();

        for entry in &self.entries {
            if entry.layer & mask == 0 {
                continue;
            }
            let combined = radius + entry.radius;
            if entry.center.distance_squared(center) <= combined * combined {
                out.push(entry.entity);
            }
        }
    }

    /// Ближайшее пересечение луча со сферой на слоях mask
    ///
    /// `exclude` — entity, через которые луч проходит насквозь (стрелок,
    /// уже поражённые pierce-цели).
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: u32,
        exclude: &[Entity],
    ) -> Option<RayHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO || max_distance <= 0.0 {
            return None;
        }

        let mut best: Option<RayHit> = None;

        for entry in &self.entries {
            if entry.layer & mask == 0 || exclude.contains(&entry.entity) {
                continue;
            }
            let Some(hit) = ray_sphere_hit(origin, direction, max_distance, entry) else {
                continue;
            };
            if best.map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        }

        best
    }

    /// Все пересечения отрезка from→to, отсортированные по дистанции
    ///
    /// Используется projectile-walk: pierce проходит несколько целей за тик.
    pub fn segment_hits(
        &self,
        from: Vec3,
        to: Vec3,
        mask: u32,
        exclude: &[Entity],
        out: &mut Vec<RayHit>,
    ) {
        out.clear();

        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return;
        }
        let direction = delta / length;

        for entry in &self.entries {
            if entry.layer & mask == 0 || exclude.contains(&entry.entity) {
                continue;
            }
            if let Some(hit) = ray_sphere_hit(from, direction, length, entry) {
                out.push(hit);
            }
        }

        out.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// Пересечение луча (origin, direction, max) со сферой entry
///
/// Origin внутри сферы считается контактом на t=0 (снаряд заспавнился
/// внутри цели — попадание немедленно).
fn ray_sphere_hit(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    entry: &SpatialEntry,
) -> Option<RayHit> {
    let to_center = entry.center - origin;

    // Origin внутри сферы
    if to_center.length_squared() <= entry.radius * entry.radius {
        let normal = (-to_center).normalize_or_zero();
        let normal = if normal == Vec3::ZERO { -direction } else { normal };
        return Some(RayHit {
            entity: entry.entity,
            point: origin,
            normal,
            distance: 0.0,
            layer: entry.layer,
        });
    }

    // Классическое решение |o + t*d - c|^2 = r^2
    let projection = to_center.dot(direction);
    if projection < 0.0 {
        return None; // сфера позади
    }
    let closest_sq = to_center.length_squared() - projection * projection;
    let radius_sq = entry.radius * entry.radius;
    if closest_sq > radius_sq {
        return None; // луч проходит мимо
    }
    let half_chord = (radius_sq - closest_sq).sqrt();
    let t = projection - half_chord;
    if t < 0.0 || t > max_distance {
        return None;
    }

    let point = origin + direction * t;
    Some(RayHit {
        entity: entry.entity,
        point,
        normal: (point - entry.center).normalize_or_zero(),
        distance: t,
        layer: entry.layer,
    })
}

/// Отражение вектора относительно нормали поверхности
pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    v - 2.0 * v.dot(normal) * normal
}

/// Система: пересборка снимка из текущих позиций
///
/// Запускается первой в combat chain (после интеграции velocity).
pub fn rebuild_spatial_index(
    mut index: ResMut<SpatialIndex>,
    bodies: Query<(Entity, &Transform, &CollisionBody)>,
) {
    index.clear();

    for (entity, transform, body) in bodies.iter() {
        index.insert(SpatialEntry {
            entity,
            center: transform.translation,
            radius: body.radius,
            layer: body.layer,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LAYER_ASTEROIDS, LAYER_SHIPS, MASK_ALL};

    fn index_with(entries: &[(u32, Vec3, f32, u32)]) -> SpatialIndex {
        let mut index = SpatialIndex::default();
        for (id, center, radius, layer) in entries {
            index.insert(SpatialEntry {
                entity: Entity::from_raw(*id),
                center: *center,
                radius: *radius,
                layer: *layer,
            });
        }
        index
    }

    #[test]
    fn test_overlap_sphere_respects_mask() {
        let index = index_with(&[
            (1, Vec3::new(5.0, 0.0, 0.0), 1.0, LAYER_SHIPS),
            (2, Vec3::new(5.0, 2.0, 0.0), 1.0, LAYER_ASTEROIDS),
        ]);

        let mut out = Vec::new();
        index.overlap_sphere(Vec3::ZERO, 10.0, LAYER_SHIPS, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], Entity::from_raw(1));

        index.overlap_sphere(Vec3::ZERO, 10.0, MASK_ALL, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_overlap_sphere_out_of_range() {
        let index = index_with(&[(1, Vec3::new(20.0, 0.0, 0.0), 1.0, LAYER_SHIPS)]);
        let mut out = Vec::new();
        index.overlap_sphere(Vec3::ZERO, 10.0, MASK_ALL, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_raycast_hits_front_surface() {
        let index = index_with(&[(1, Vec3::new(10.0, 0.0, 0.0), 2.0, LAYER_SHIPS)]);
        let hit = index
            .raycast(Vec3::ZERO, Vec3::X, 100.0, MASK_ALL, &[])
            .unwrap();

        assert_eq!(hit.entity, Entity::from_raw(1));
        assert!((hit.distance - 8.0).abs() < 1e-4);
        assert!((hit.point.x - 8.0).abs() < 1e-4);
        // Нормаль смотрит на стрелка
        assert!((hit.normal.x + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_raycast_excludes_entities() {
        let index = index_with(&[
            (1, Vec3::new(5.0, 0.0, 0.0), 1.0, LAYER_SHIPS),
            (2, Vec3::new(10.0, 0.0, 0.0), 1.0, LAYER_SHIPS),
        ]);
        let hit = index
            .raycast(Vec3::ZERO, Vec3::X, 100.0, MASK_ALL, &[Entity::from_raw(1)])
            .unwrap();
        assert_eq!(hit.entity, Entity::from_raw(2));
    }

    #[test]
    fn test_raycast_sphere_behind_is_ignored() {
        let index = index_with(&[(1, Vec3::new(-10.0, 0.0, 0.0), 2.0, LAYER_SHIPS)]);
        assert!(index.raycast(Vec3::ZERO, Vec3::X, 100.0, MASK_ALL, &[]).is_none());
    }

    #[test]
    fn test_raycast_origin_inside_sphere() {
        let index = index_with(&[(1, Vec3::ZERO, 5.0, LAYER_SHIPS)]);
        let hit = index
            .raycast(Vec3::new(1.0, 0.0, 0.0), Vec3::X, 100.0, MASK_ALL, &[])
            .unwrap();
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_segment_hits_sorted_by_distance() {
        let index = index_with(&[
            (2, Vec3::new(20.0, 0.0, 0.0), 1.0, LAYER_SHIPS),
            (1, Vec3::new(10.0, 0.0, 0.0), 1.0, LAYER_SHIPS),
        ]);

        let mut out = Vec::new();
        index.segment_hits(Vec3::ZERO, Vec3::new(50.0, 0.0, 0.0), MASK_ALL, &[], &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].entity, Entity::from_raw(1));
        assert_eq!(out[1].entity, Entity::from_raw(2));
        assert!(out[0].distance < out[1].distance);
    }

    #[test]
    fn test_segment_stops_at_range() {
        let index = index_with(&[(1, Vec3::new(30.0, 0.0, 0.0), 1.0, LAYER_SHIPS)]);
        let mut out = Vec::new();
        index.segment_hits(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), MASK_ALL, &[], &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_reflect() {
        let reflected = reflect(Vec3::new(1.0, -1.0, 0.0), Vec3::Y);
        assert!((reflected - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }
}
