//! Targeting — lock-on с гистерезисом и lead prediction
//!
//! Архитектура:
//! - TargetTracker на корабле-стрелке, ведёт список TargetTrack
//! - Захват: цель входит в 60° конус от forward → track, lockTimer=0
//! - Удержание: выпадает только за 65° (5° буфер против мерцания
//!   захвата на границе конуса)
//! - Primary: лучшие max_lock_targets по углу к прицелу внутри
//!   assist-конуса; lock timer растёт ТОЛЬКО в primary
//! - Lead prediction: pos + vel * (distance / projectile_speed)
//!
//! Liveness: ссылки на цели слабые, мёртвые/уничтоженные вычищаются
//! каждый тик без ошибок.

use bevy::prelude::*;

use crate::combat::health::{Dead, LayeredHealth};
use crate::combat::weapon::WeaponData;
use crate::components::{AimReticle, PhysicsBody, Ship};
use crate::layers::LAYER_SHIPS;
use crate::spatial::SpatialIndex;

/// Полуугол конуса первичного захвата (градусы, от forward корабля)
pub const ACQUISITION_CONE_DEG: f32 = 60.0;
/// Полуугол удержания цели (гистерезис против ACQUISITION_CONE_DEG)
pub const RETENTION_CONE_DEG: f32 = 65.0;

/// Одна отслеживаемая цель
#[derive(Debug, Clone, Copy, Reflect)]
pub struct TargetTrack {
    pub entity: Entity,
    /// Накопленное время в primary-наборе (секунды)
    pub lock_timer: f32,
    /// lock_timer достиг lock_on_time
    pub is_locked: bool,
    /// В текущем primary-наборе (получает lock progress)
    pub is_primary: bool,
    /// Упреждённая точка прицеливания (world space)
    pub predicted_position: Vec3,
    pub distance: f32,
    /// Угол между направлением прицела и направлением на цель (градусы)
    pub angle_to_aim_deg: f32,
}

impl TargetTrack {
    fn new(entity: Entity, position: Vec3, distance: f32) -> Self {
        Self {
            entity,
            lock_timer: 0.0,
            is_locked: false,
            is_primary: false,
            predicted_position: position,
            distance,
            angle_to_aim_deg: 180.0,
        }
    }
}

/// Список отслеживаемых целей оружия (для HUD и fire систем)
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct TargetTracker {
    pub tracks: Vec<TargetTrack>,
}

impl TargetTracker {
    pub fn locked_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_locked).count()
    }

    pub fn primary(&self) -> Option<&TargetTrack> {
        self.tracks
            .iter()
            .filter(|t| t.is_primary)
            .min_by(|a, b| {
                a.angle_to_aim_deg
                    .partial_cmp(&b.angle_to_aim_deg)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    pub fn track_of(&self, entity: Entity) -> Option<&TargetTrack> {
        self.tracks.iter().find(|t| t.entity == entity)
    }
}

/// Угол между векторами в градусах (0 при вырожденных)
fn angle_deg(a: Vec3, b: Vec3) -> f32 {
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    if a == Vec3::ZERO || b == Vec3::ZERO {
        return 0.0;
    }
    a.angle_between(b).to_degrees()
}

/// Направление прицела: на точку reticle, fallback на forward корабля
fn reticle_direction(transform: &Transform, reticle: &AimReticle) -> Vec3 {
    let dir = (reticle.point - transform.translation).normalize_or_zero();
    if dir == Vec3::ZERO {
        *transform.forward()
    } else {
        dir
    }
}

/// Разрешение направления выстрела
///
/// Без целей — в прицел. С целью и max_lock_targets > 1 (рой) — жёсткий
/// снап на упреждённую позицию: выбор цели всегда выигрывает. С целью и
/// max_lock_targets == 1 — aim-assist: снап только внутри assist-конуса,
/// homing reference только если оружие homing.
pub fn aim_direction(
    transform: &Transform,
    reticle: &AimReticle,
    weapon: &WeaponData,
    tracker: &TargetTracker,
) -> (Vec3, Option<Entity>) {
    let reticle_dir = reticle_direction(transform, reticle);

    let Some(track) = tracker.primary() else {
        return (reticle_dir, None);
    };

    let to_predicted =
        (track.predicted_position - transform.translation).normalize_or_zero();
    if to_predicted == Vec3::ZERO {
        return (reticle_dir, None);
    }

    if weapon.max_lock_targets > 1 {
        // Рой: выбор цели всегда выигрывает у прицела
        return (to_predicted, Some(track.entity));
    }

    if angle_deg(reticle_dir, to_predicted) <= weapon.assist_cone_deg {
        let homing = weapon.is_homing.then_some(track.entity);
        (to_predicted, homing)
    } else {
        // Assist сорвался вне конуса
        (reticle_dir, None)
    }
}

/// Система: scan/prune/predict/select-primary, каждый тик
///
/// Шаги:
/// 1. Prune мёртвых/уничтоженных
/// 2. Scan: новые цели в max_lock_distance И 60° от forward (без cap —
///    cap применяется только на primary-наборе)
/// 3. Prune: дальше max_lock_distance или за 65° от forward
/// 4. Primary: внутри assist-конуса от прицела, сортировка по углу,
///    лучшие max_lock_targets
/// 5. Lock timers: в primary растут, вне — сброс в 0. Упреждение
///    пересчитывается всем независимо от primary.
pub fn update_targeting(
    index: Res<SpatialIndex>,
    time: Res<Time<Fixed>>,
    mut shooters: Query<
        (Entity, &Transform, &AimReticle, &Ship, &WeaponData, &mut TargetTracker),
        Without<Dead>,
    >,
    targets: Query<(&Transform, &PhysicsBody, &Ship), (With<LayeredHealth>, Without<Dead>)>,
) {
    let delta = time.delta_secs();
    let mut scratch: Vec<Entity> = Vec::new();

    for (shooter, transform, reticle, ship, weapon, mut tracker) in shooters.iter_mut() {
        let position = transform.translation;
        let forward = *transform.forward();

        // 1. Liveness prune
        tracker
            .tracks
            .retain(|track| track.entity != shooter && targets.contains(track.entity));

        // 2. Acquisition scan
        index.overlap_sphere(position, weapon.max_lock_distance, LAYER_SHIPS, &mut scratch);
        for &candidate in &scratch {
            if candidate == shooter {
                continue;
            }
            if tracker.tracks.iter().any(|t| t.entity == candidate) {
                continue;
            }
            let Ok((target_transform, _, target_ship)) = targets.get(candidate) else {
                continue;
            };
            // Своих не захватываем
            if target_ship.faction_id == ship.faction_id {
                continue;
            }
            let to_target = target_transform.translation - position;
            if angle_deg(forward, to_target) <= ACQUISITION_CONE_DEG {
                tracker.tracks.push(TargetTrack::new(
                    candidate,
                    target_transform.translation,
                    to_target.length(),
                ));
            }
        }

        // 3. Retention prune (гистерезис)
        let max_distance = weapon.max_lock_distance;
        tracker.tracks.retain(|track| {
            let Ok((target_transform, _, _)) = targets.get(track.entity) else {
                return false;
            };
            let to_target = target_transform.translation - position;
            to_target.length() <= max_distance
                && angle_deg(forward, to_target) <= RETENTION_CONE_DEG
        });

        // 4-5. Predict + primary selection + lock timers
        let aim = reticle_direction(transform, reticle);
        let projectile_speed = weapon.projectile_speed();

        for track in tracker.tracks.iter_mut() {
            let Ok((target_transform, body, _)) = targets.get(track.entity) else {
                continue;
            };
            let target_position = target_transform.translation;
            track.distance = target_position.distance(position);

            // Hitscan мгновенен — упреждение не нужно
            track.predicted_position = match projectile_speed {
                Some(speed) if speed > 0.0 => {
                    target_position + body.velocity * (track.distance / speed)
                }
                _ => target_position,
            };

            track.angle_to_aim_deg =
                angle_deg(aim, track.predicted_position - position);
        }

        let mut order: Vec<usize> = (0..tracker.tracks.len())
            .filter(|&i| tracker.tracks[i].angle_to_aim_deg <= weapon.assist_cone_deg)
            .collect();
        order.sort_by(|&a, &b| {
            tracker.tracks[a]
                .angle_to_aim_deg
                .partial_cmp(&tracker.tracks[b].angle_to_aim_deg)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(weapon.max_lock_targets);

        for (i, track) in tracker.tracks.iter_mut().enumerate() {
            if order.contains(&i) {
                track.is_primary = true;
                track.lock_timer += delta;
                if track.lock_timer >= weapon.lock_on_time {
                    track.is_locked = true;
                }
            } else {
                track.is_primary = false;
                track.lock_timer = 0.0;
                track.is_locked = false;
            }
        }
    }
}
