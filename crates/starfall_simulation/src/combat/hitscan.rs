//! Hitscan — мгновенный ray walk с рикошетами и pierce
//!
//! Весь путь луча разрешается внутри одного тика: отскоки от
//! ricochet-поверхностей, проход сквозь до pierce_count целей
//! (per-shot набор поражённых защищает от двойного урона),
//! DamagePayload каждой поражённой цели.

use bevy::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::combat::health::DamageEvent;
use crate::combat::payload::PayloadSpec;
use crate::combat::projectile::PIERCE_DECAY;
use crate::spatial::{self, SpatialIndex};

/// Небольшой вынос точки отскока с поверхности (против повторного
/// контакта с той же сферой на t=0)
const SURFACE_EPSILON: f32 = 0.01;

/// Параметры одного hitscan выстрела
#[derive(Debug, Clone)]
pub struct HitscanShot<'a> {
    pub source: Entity,
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
    pub pierce_count: u32,
    pub ricochet_count: u32,
    /// Слои, от которых луч отскакивает (астероиды)
    pub ricochet_mask: u32,
    /// Слои, которые луч вообще замечает
    pub target_mask: u32,
    pub payload: &'a PayloadSpec,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
}

/// Разрешение hitscan выстрела. Возвращает число поражённых целей.
///
/// Pierce несёт тот же кумулятивный спад урона, что и снаряды
/// (PIERCE_DECAY за каждую пройденную цель). Крит бросается один
/// раз на выстрел при создании payload и через pierce доезжает
/// до всех поражённых целей.
pub fn resolve_hitscan(
    index: &SpatialIndex,
    shot: HitscanShot<'_>,
    is_damageable: impl Fn(Entity) -> bool,
    rng: &mut ChaCha8Rng,
    damage_events: &mut EventWriter<DamageEvent>,
) -> u32 {
    let mut direction = shot.direction.normalize_or_zero();
    if direction == Vec3::ZERO {
        return 0;
    }

    let mut payload = shot.payload.instantiate(Some(shot.source), direction);
    payload.roll_crit(rng, shot.crit_chance, shot.crit_multiplier);
    let mut origin = shot.origin;
    let mut remaining = shot.max_distance;
    let mut pierce_left = shot.pierce_count;
    let mut ricochet_left = shot.ricochet_count;
    let mut exclude = vec![shot.source];
    let mut victims = 0u32;

    while remaining > 0.0 {
        let mask = shot.target_mask | shot.ricochet_mask;
        let Some(hit) = index.raycast(origin, direction, remaining, mask, &exclude) else {
            break;
        };
        remaining -= hit.distance;

        if is_damageable(hit.entity) {
            let applied = payload.clone().with_hit(hit.point, hit.normal, direction);

            damage_events.write(DamageEvent {
                target: hit.entity,
                payload: applied,
            });
            victims += 1;

            if pierce_left == 0 {
                break;
            }
            pierce_left -= 1;
            exclude.push(hit.entity);
            payload.scale_damage(PIERCE_DECAY);
            origin = hit.point;
            continue;
        }

        if hit.layer & shot.ricochet_mask != 0 && ricochet_left > 0 {
            ricochet_left -= 1;
            direction = spatial::reflect(direction, hit.normal).normalize_or_zero();
            if direction == Vec3::ZERO {
                break;
            }
            origin = hit.point + hit.normal * SURFACE_EPSILON;
            continue;
        }

        // Непроходимое препятствие
        break;
    }

    victims
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::event::Events;
    use bevy::ecs::system::SystemState;
    use rand::SeedableRng;

    use crate::layers::{LAYER_ASTEROIDS, LAYER_SHIPS};
    use crate::spatial::SpatialEntry;

    fn run_shot(
        index: &SpatialIndex,
        shot: HitscanShot<'_>,
        damageable: impl Fn(Entity) -> bool,
    ) -> (u32, Vec<DamageEvent>) {
        run_shot_seeded(index, shot, damageable, 1)
    }

    fn run_shot_seeded(
        index: &SpatialIndex,
        shot: HitscanShot<'_>,
        damageable: impl Fn(Entity) -> bool,
        seed: u64,
    ) -> (u32, Vec<DamageEvent>) {
        let mut world = World::new();
        world.init_resource::<Events<DamageEvent>>();
        let mut state: SystemState<EventWriter<DamageEvent>> = SystemState::new(&mut world);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let victims = {
            let mut writer = state.get_mut(&mut world);
            resolve_hitscan(index, shot, damageable, &mut rng, &mut writer)
        };
        state.apply(&mut world);

        let events = world.resource::<Events<DamageEvent>>();
        let collected = events.get_cursor().read(events).cloned().collect();
        (victims, collected)
    }

    fn ship(id: u32, x: f32) -> SpatialEntry {
        SpatialEntry {
            entity: Entity::from_raw(id),
            center: Vec3::new(x, 0.0, 0.0),
            radius: 1.0,
            layer: LAYER_SHIPS,
        }
    }

    fn base_shot(payload: &PayloadSpec) -> HitscanShot<'_> {
        HitscanShot {
            source: Entity::from_raw(100),
            origin: Vec3::ZERO,
            direction: Vec3::X,
            max_distance: 200.0,
            pierce_count: 0,
            ricochet_count: 0,
            ricochet_mask: LAYER_ASTEROIDS,
            target_mask: LAYER_SHIPS | LAYER_ASTEROIDS,
            payload,
            crit_chance: 0.0,
            crit_multiplier: 2.0,
        }
    }

    #[test]
    fn test_single_hit_stops_ray() {
        let mut index = SpatialIndex::default();
        index.insert(ship(1, 10.0));
        index.insert(ship(2, 20.0));

        let payload = PayloadSpec::kinetic(50.0);
        let (victims, events) = run_shot(&index, base_shot(&payload), |_| true);

        assert_eq!(victims, 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, Entity::from_raw(1));
    }

    #[test]
    fn test_pierce_walks_through_with_decay() {
        let mut index = SpatialIndex::default();
        index.insert(ship(1, 10.0));
        index.insert(ship(2, 20.0));
        index.insert(ship(3, 30.0));
        index.insert(ship(4, 40.0));

        let payload = PayloadSpec::kinetic(100.0);
        let mut shot = base_shot(&payload);
        shot.pierce_count = 2;

        let (victims, events) = run_shot(&index, shot, |_| true);

        // 2 pierce = 3 цели максимум, четвёртая не тронута
        assert_eq!(victims, 3);
        assert!((events[0].payload.physical_damage - 100.0).abs() < 1e-3);
        assert!((events[1].payload.physical_damage - 75.0).abs() < 1e-3);
        assert!((events[2].payload.physical_damage - 56.25).abs() < 1e-3);
    }

    #[test]
    fn test_crit_rolled_once_per_shot_shared_by_pierced_targets() {
        let mut index = SpatialIndex::default();
        index.insert(ship(1, 10.0));
        index.insert(ship(2, 20.0));
        index.insert(ship(3, 30.0));

        let payload = PayloadSpec::kinetic(100.0);
        for seed in 0..16 {
            let mut shot = base_shot(&payload);
            shot.pierce_count = 2;
            shot.crit_chance = 0.5;

            let (_, events) = run_shot_seeded(&index, shot, |_| true, seed);
            assert_eq!(events.len(), 3);

            // Один бросок на выстрел: флаг общий для всех целей луча
            let first = events[0].payload.is_critical;
            assert!(events.iter().all(|e| e.payload.is_critical == first));
            // Спад pierce не зависит от исхода крита
            let base = events[0].payload.physical_damage;
            assert!((events[1].payload.physical_damage - base * 0.75).abs() < 1e-3);
            assert!((events[2].payload.physical_damage - base * 0.5625).abs() < 1e-3);
        }
    }

    #[test]
    fn test_guaranteed_crit_scales_before_decay() {
        let mut index = SpatialIndex::default();
        index.insert(ship(1, 10.0));
        index.insert(ship(2, 20.0));

        let payload = PayloadSpec::kinetic(100.0);
        let mut shot = base_shot(&payload);
        shot.pierce_count = 1;
        shot.crit_chance = 1.0;

        let (_, events) = run_shot(&index, shot, |_| true);
        assert!(events[0].payload.is_critical);
        assert!((events[0].payload.physical_damage - 200.0).abs() < 1e-3);
        assert!((events[1].payload.physical_damage - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_shooter_not_hit() {
        let mut index = SpatialIndex::default();
        index.insert(SpatialEntry {
            entity: Entity::from_raw(100),
            center: Vec3::ZERO,
            radius: 2.0,
            layer: LAYER_SHIPS,
        });
        index.insert(ship(1, 10.0));

        let payload = PayloadSpec::kinetic(10.0);
        let (_, events) = run_shot(&index, base_shot(&payload), |_| true);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target, Entity::from_raw(1));
    }

    #[test]
    fn test_ricochet_reflects_into_target() {
        // Астероид на пути, цель на отражённой траектории
        let mut index = SpatialIndex::default();
        index.insert(SpatialEntry {
            entity: Entity::from_raw(50),
            center: Vec3::new(11.0, 0.0, 0.0),
            radius: 1.0,
            layer: LAYER_ASTEROIDS,
        });
        index.insert(SpatialEntry {
            entity: Entity::from_raw(1),
            center: Vec3::new(-20.0, 0.0, 0.0),
            radius: 1.0,
            layer: LAYER_SHIPS,
        });

        let payload = PayloadSpec::kinetic(10.0);
        let mut shot = base_shot(&payload);
        shot.ricochet_count = 1;
        // Астероид не damageable — луч отражается назад в цель за стрелком
        let (victims, events) =
            run_shot(&index, shot, |e| e != Entity::from_raw(50));

        assert_eq!(victims, 1);
        assert_eq!(events[0].target, Entity::from_raw(1));
    }

    #[test]
    fn test_blocked_by_non_damageable_without_ricochet() {
        let mut index = SpatialIndex::default();
        index.insert(SpatialEntry {
            entity: Entity::from_raw(50),
            center: Vec3::new(10.0, 0.0, 0.0),
            radius: 1.0,
            layer: LAYER_ASTEROIDS,
        });
        index.insert(ship(1, 20.0));

        let payload = PayloadSpec::kinetic(10.0);
        let (victims, _) = run_shot(&index, base_shot(&payload), |e| e != Entity::from_raw(50));
        assert_eq!(victims, 0);
    }

    #[test]
    fn test_range_limit() {
        let mut index = SpatialIndex::default();
        index.insert(ship(1, 300.0));

        let payload = PayloadSpec::kinetic(10.0);
        let (victims, _) = run_shot(&index, base_shot(&payload), |_| true);
        assert_eq!(victims, 0);
    }
}
