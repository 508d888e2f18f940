//! SmartProjectile — полёт, homing, pierce/ricochet, взрывы, вторичный спавн
//!
//! Архитектура:
//! - Снаряд сам хранит direction + speed (не читает их из rotation —
//!   Transform только визуализация)
//! - Коллизии: segment walk через SpatialIndex за тик (быстрые снаряды
//!   не проскакивают цели между позициями)
//! - Состояния: Flying → Exploded | Destroyed (pierce исчерпан,
//!   lifetime, неразрушаемое препятствие)
//! - has_exploded / has_spawned_payload — one-way защёлки, действие
//!   никогда не повторяется для одного экземпляра
//!
//! Liveness: homing-цель может быть уничтожена в полёте — снаряд
//! продолжает лететь прямо, без ошибок.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::combat::health::{DamageEvent, Dead, DespawnAfter, LayeredHealth};
use crate::combat::payload::{DamagePayload, PayloadSpec};
use crate::components::{CollisionBody, PhysicsBody};
use crate::layers::{LAYER_ASTEROIDS, LAYER_DEBRIS, LAYER_SHIPS};
use crate::spatial::{self, RayHit, SpatialIndex};
use crate::DeterministicRng;

/// Декремент урона за каждый pierce (кумулятивно мультипликативный)
pub const PIERCE_DECAY: f32 = 0.75;
/// Нижняя граница falloff взрыва
pub const EXPLOSION_FALLOFF_FLOOR: f32 = 0.2;
/// Время жизни инертных осколков вторичного спавна (секунды)
const DEBRIS_LIFETIME: f32 = 5.0;

// ============================================================================
// Configuration
// ============================================================================

/// Площадной взрыв
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct ExplosionSpec {
    pub radius: f32,
    /// Величина исходящего импульса в эпицентре
    pub force: f32,
}

/// Условие вторичного спавна (одно на снаряд)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnTrigger {
    /// Накопленный путь ≥ порога
    OnDistance(f32),
    /// Время жизни ≥ порога
    OnTimer(f32),
    OnImpact,
    OnDeath,
}

/// Почему вызван вторичный спавн (matching против SpawnTrigger)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnReason {
    /// Обычный тик полёта (distance/timer триггеры)
    Flight,
    Impact,
    Death,
}

/// Что спавнится
#[derive(Debug, Clone, PartialEq)]
pub enum SecondaryKind {
    /// Дочерние SmartProjectile (ровно один уровень рекурсии —
    /// их собственный secondary обнуляется при спавне)
    Projectile {
        spec: Box<ProjectileSpec>,
        payload: PayloadSpec,
    },
    /// Инертные осколки: только импульс скорости
    Debris { speed: f32 },
}

/// Вторичный payload снаряда (кассета, mirv)
#[derive(Debug, Clone, PartialEq)]
pub struct SecondarySpawn {
    pub trigger: SpawnTrigger,
    pub count: u32,
    /// Полуугол конуса разлёта вокруг текущего forward (градусы)
    pub spread_deg: f32,
    pub kind: SecondaryKind,
}

/// Баллистическая конфигурация снаряда (immutable, в WeaponData)
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct ProjectileSpec {
    /// Скорость полёта (м/с)
    pub speed: f32,
    /// Время жизни (секунды)
    pub lifetime: f32,
    /// Скорость разворота homing (градусы/сек; 0 = не наводится)
    pub turn_speed_deg: f32,
    /// Радиус дистанционного подрыва (0 = контактный)
    pub proximity_radius: f32,
    /// Сквозь сколько целей проходит дальше
    pub pierce_count: u32,
    /// Отскоков от ricochet-поверхностей
    pub ricochet_count: u32,
    pub explosion: Option<ExplosionSpec>,
    #[reflect(ignore)]
    pub secondary: Option<SecondarySpawn>,
}

impl Default for ProjectileSpec {
    fn default() -> Self {
        Self {
            speed: 100.0,
            lifetime: 5.0,
            turn_speed_deg: 0.0,
            proximity_radius: 0.0,
            pierce_count: 0,
            ricochet_count: 0,
            explosion: None,
            secondary: None,
        }
    }
}

// ============================================================================
// Component
// ============================================================================

/// Живой снаряд в полёте
#[derive(Component, Debug, Clone)]
pub struct SmartProjectile {
    /// Носимый payload; pierce decay мутирует его по ходу
    pub payload: DamagePayload,
    pub owner: Entity,

    pub direction: Vec3,
    pub speed: f32,
    pub turn_speed_deg: f32,
    pub homing_target: Option<Entity>,

    pub lifetime_remaining: f32,
    pub distance_traveled: f32,
    pub time_alive: f32,

    pub pierce_remaining: u32,
    pub ricochet_remaining: u32,
    /// Уже поражённые цели (защита от двойного урона при pierce)
    pub hit_targets: Vec<Entity>,

    pub proximity_radius: f32,
    pub explosion: Option<ExplosionSpec>,
    pub secondary: Option<SecondarySpawn>,

    pub crit_chance: f32,
    pub crit_multiplier: f32,

    // One-way защёлки
    pub has_exploded: bool,
    pub has_spawned_payload: bool,
}

impl SmartProjectile {
    pub fn from_spec(
        spec: &ProjectileSpec,
        payload: DamagePayload,
        owner: Entity,
        direction: Vec3,
        homing_target: Option<Entity>,
        crit_chance: f32,
        crit_multiplier: f32,
    ) -> Self {
        Self {
            payload,
            owner,
            direction: direction.normalize_or_zero(),
            speed: spec.speed,
            turn_speed_deg: spec.turn_speed_deg,
            homing_target,
            lifetime_remaining: spec.lifetime,
            distance_traveled: 0.0,
            time_alive: 0.0,
            pierce_remaining: spec.pierce_count,
            ricochet_remaining: spec.ricochet_count,
            hit_targets: Vec::new(),
            proximity_radius: spec.proximity_radius,
            explosion: spec.explosion,
            secondary: spec.secondary.clone(),
            crit_chance,
            crit_multiplier,
            has_exploded: false,
            has_spawned_payload: false,
        }
    }
}

// ============================================================================
// Geometry helpers
// ============================================================================

/// Доворот вектора к desired не больше чем на max_angle_rad
pub fn rotate_towards(current: Vec3, desired: Vec3, max_angle_rad: f32) -> Vec3 {
    let current_n = current.normalize_or_zero();
    let desired_n = desired.normalize_or_zero();
    if current_n == Vec3::ZERO || desired_n == Vec3::ZERO {
        return current;
    }

    let angle = current_n.angle_between(desired_n);
    if angle <= max_angle_rad {
        return desired_n;
    }

    let axis = current_n.cross(desired_n).normalize_or_zero();
    // Противонаправленные векторы: ось вращения произвольная
    let axis = if axis == Vec3::ZERO {
        current_n.any_orthonormal_vector()
    } else {
        axis
    };
    Quat::from_axis_angle(axis, max_angle_rad) * current_n
}

/// Случайное направление в конусе вокруг direction
pub fn spread_direction(direction: Vec3, spread_deg: f32, rng: &mut ChaCha8Rng) -> Vec3 {
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO || spread_deg <= 0.0 {
        return direction;
    }

    let deflection = rng.gen_range(0.0..spread_deg.to_radians());
    let roll = rng.gen_range(0.0..std::f32::consts::TAU);

    let deflected = Quat::from_axis_angle(dir.any_orthonormal_vector(), deflection) * dir;
    Quat::from_axis_angle(dir, roll) * deflected
}

/// Falloff взрыва: max(0.2, 1 - (d/r)^2)
pub fn explosion_falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return EXPLOSION_FALLOFF_FLOOR;
    }
    let ratio = distance / radius;
    (1.0 - ratio * ratio).max(EXPLOSION_FALLOFF_FLOOR)
}

// ============================================================================
// Explosion
// ============================================================================

/// Площадной взрыв: урон + импульс всем damageable в радиусе
///
/// Falloff масштабирует обе компоненты урона и импульс; крит бросается
/// независимо на каждую цель. Импульс едет через impact_force payload'а
/// (apply_damage толкает от hit_point наружу).
#[allow(clippy::too_many_arguments)]
pub fn explode_area(
    index: &SpatialIndex,
    center: Vec3,
    spec: &ExplosionSpec,
    base_payload: &DamagePayload,
    crit_chance: f32,
    crit_multiplier: f32,
    is_damageable: &impl Fn(Entity) -> bool,
    rng: &mut ChaCha8Rng,
    damage_events: &mut EventWriter<DamageEvent>,
) {
    let mut victims: Vec<Entity> = Vec::new();
    index.overlap_sphere(center, spec.radius, LAYER_SHIPS | LAYER_ASTEROIDS, &mut victims);

    for victim in victims {
        if !is_damageable(victim) {
            continue;
        }
        let Some(entry) = index.entry(victim) else {
            continue;
        };

        let falloff = explosion_falloff(center.distance(entry.center), spec.radius);

        let mut payload = base_payload.clone();
        payload.scale_damage(falloff);
        payload.roll_crit(rng, crit_chance, crit_multiplier);
        payload.impact_force = spec.force * falloff;
        payload.hit_point = center;
        payload.hit_normal = (entry.center - center).normalize_or_zero();
        payload.damage_direction = payload.hit_normal;

        damage_events.write(DamageEvent {
            target: victim,
            payload,
        });
    }
}

// ============================================================================
// Secondary spawn
// ============================================================================

fn trigger_matches(
    trigger: &SpawnTrigger,
    reason: SpawnReason,
    distance_traveled: f32,
    time_alive: f32,
) -> bool {
    match (trigger, reason) {
        (SpawnTrigger::OnDistance(threshold), SpawnReason::Flight) => {
            distance_traveled >= *threshold
        }
        (SpawnTrigger::OnTimer(threshold), SpawnReason::Flight) => time_alive >= *threshold,
        (SpawnTrigger::OnImpact, SpawnReason::Impact) => true,
        (SpawnTrigger::OnDeath, SpawnReason::Death) => true,
        _ => false,
    }
}

/// Вторичный спавн, если условие совпало и защёлка не взведена
///
/// Дочерние снаряды теряют собственный secondary — ровно один
/// уровень рекурсии.
fn try_spawn_secondary(
    commands: &mut Commands,
    projectile: &mut SmartProjectile,
    position: Vec3,
    reason: SpawnReason,
    rng: &mut ChaCha8Rng,
) {
    if projectile.has_spawned_payload {
        return;
    }
    let Some(secondary) = projectile.secondary.clone() else {
        return;
    };
    if !trigger_matches(
        &secondary.trigger,
        reason,
        projectile.distance_traveled,
        projectile.time_alive,
    ) {
        return;
    }

    projectile.has_spawned_payload = true;

    for _ in 0..secondary.count {
        let direction = spread_direction(projectile.direction, secondary.spread_deg, rng);

        match &secondary.kind {
            SecondaryKind::Projectile { spec, payload } => {
                let mut child_spec = (**spec).clone();
                child_spec.secondary = None;

                let child = SmartProjectile::from_spec(
                    &child_spec,
                    payload.instantiate(Some(projectile.owner), direction),
                    projectile.owner,
                    direction,
                    projectile.homing_target,
                    projectile.crit_chance,
                    projectile.crit_multiplier,
                );

                commands.spawn((
                    child,
                    Transform::from_translation(position),
                    CollisionBody::new(0.3, LAYER_DEBRIS),
                ));
            }
            SecondaryKind::Debris { speed } => {
                commands.spawn((
                    Transform::from_translation(position),
                    PhysicsBody {
                        velocity: direction * *speed,
                        mass: 1.0,
                    },
                    CollisionBody::new(0.2, LAYER_DEBRIS),
                    DespawnAfter {
                        remaining: DEBRIS_LIFETIME,
                    },
                ));
            }
        }
    }
}

// ============================================================================
// System
// ============================================================================

/// Система: тик всех снарядов
///
/// За тик: homing доворот → flight-триггеры secondary → proximity fuse →
/// segment walk коллизий (ricochet / pierce / terminal) → движение.
pub fn update_projectiles(
    mut commands: Commands,
    index: Res<SpatialIndex>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
    mut projectiles: Query<(Entity, &mut Transform, &mut SmartProjectile)>,
    targets: Query<&Transform, (With<LayeredHealth>, Without<Dead>, Without<SmartProjectile>)>,
    mut damage_events: EventWriter<DamageEvent>,
) {
    let delta = time.delta_secs();
    let rng = &mut rng.0;
    let mut hits: Vec<RayHit> = Vec::new();
    let mut nearby: Vec<Entity> = Vec::new();

    for (entity, mut transform, mut projectile) in projectiles.iter_mut() {
        projectile.time_alive += delta;
        projectile.lifetime_remaining -= delta;

        // Истечение lifetime — Destroyed, не Exploded
        if projectile.lifetime_remaining <= 0.0 {
            try_spawn_secondary(
                &mut commands,
                &mut projectile,
                transform.translation,
                SpawnReason::Death,
                rng,
            );
            commands.entity(entity).despawn();
            continue;
        }

        // Homing: цель может быть мертва — летим прямо
        if projectile.turn_speed_deg > 0.0 {
            if let Some(target) = projectile.homing_target {
                if let Ok(target_transform) = targets.get(target) {
                    let desired = target_transform.translation - transform.translation;
                    projectile.direction = rotate_towards(
                        projectile.direction,
                        desired,
                        projectile.turn_speed_deg.to_radians() * delta,
                    );
                }
            }
        }

        let from = transform.translation;
        let step = projectile.direction * projectile.speed * delta;
        let to = from + step;
        projectile.distance_traveled += step.length();

        // Distance/timer триггеры вторичного спавна
        try_spawn_secondary(&mut commands, &mut projectile, from, SpawnReason::Flight, rng);

        // Proximity fuse
        if projectile.proximity_radius > 0.0 && !projectile.has_exploded {
            index.overlap_sphere(to, projectile.proximity_radius, LAYER_SHIPS, &mut nearby);
            let fused = nearby.iter().any(|&e| {
                e != projectile.owner
                    && !projectile.hit_targets.contains(&e)
                    && targets.contains(e)
            });
            if fused {
                // Радиус взрыва не меньше радиуса взрывателя
                let spec = projectile.explosion.map_or(
                    ExplosionSpec {
                        radius: projectile.proximity_radius,
                        force: 0.0,
                    },
                    |e| ExplosionSpec {
                        radius: e.radius.max(projectile.proximity_radius),
                        force: e.force,
                    },
                );
                projectile.has_exploded = true;
                explode_area(
                    &index,
                    to,
                    &spec,
                    &projectile.payload,
                    projectile.crit_chance,
                    projectile.crit_multiplier,
                    &|e| targets.contains(e),
                    rng,
                    &mut damage_events,
                );
                try_spawn_secondary(
                    &mut commands,
                    &mut projectile,
                    to,
                    SpawnReason::Death,
                    rng,
                );
                commands.entity(entity).despawn();
                continue;
            }
        }

        // Segment walk: все контакты на пути этого тика, по дистанции
        let mut exclude = projectile.hit_targets.clone();
        exclude.push(projectile.owner);
        index.segment_hits(from, to, LAYER_SHIPS | LAYER_ASTEROIDS, &exclude, &mut hits);

        let mut destroyed = false;
        let mut final_position = to;

        for &hit in hits.iter() {
            // Рикошет проверяется раньше урона/взрыва
            if hit.layer & LAYER_ASTEROIDS != 0
                && !targets.contains(hit.entity)
                && projectile.ricochet_remaining > 0
            {
                projectile.ricochet_remaining -= 1;
                projectile.direction =
                    spatial::reflect(projectile.direction, hit.normal).normalize_or_zero();
                // Остаток пути этого тика после отскока не добираем
                final_position = hit.point + hit.normal * 0.01;
                break;
            }

            if targets.contains(hit.entity) {
                let mut payload = projectile.payload.clone();
                payload.roll_crit(rng, projectile.crit_chance, projectile.crit_multiplier);
                let payload =
                    payload.with_hit(hit.point, hit.normal, projectile.direction);

                damage_events.write(DamageEvent {
                    target: hit.entity,
                    payload,
                });

                try_spawn_secondary(
                    &mut commands,
                    &mut projectile,
                    hit.point,
                    SpawnReason::Impact,
                    rng,
                );

                if projectile.pierce_remaining > 0 {
                    projectile.pierce_remaining -= 1;
                    projectile.hit_targets.push(hit.entity);
                    // Кумулятивный спад урона для следующих целей
                    projectile.payload.scale_damage(PIERCE_DECAY);
                    continue;
                }

                destroyed = true;
                final_position = hit.point;
                break;
            }

            // Неразрушаемое препятствие без рикошета
            destroyed = true;
            final_position = hit.point;
            break;
        }

        if destroyed {
            if let Some(explosion) = projectile.explosion {
                if !projectile.has_exploded {
                    projectile.has_exploded = true;
                    explode_area(
                        &index,
                        final_position,
                        &explosion,
                        &projectile.payload,
                        projectile.crit_chance,
                        projectile.crit_multiplier,
                        &|e| targets.contains(e),
                        rng,
                        &mut damage_events,
                    );
                }
            }
            try_spawn_secondary(
                &mut commands,
                &mut projectile,
                final_position,
                SpawnReason::Death,
                rng,
            );
            commands.entity(entity).despawn();
            continue;
        }

        transform.translation = final_position;
        if projectile.direction != Vec3::ZERO {
            transform.look_to(
                Dir3::new(projectile.direction).unwrap_or(Dir3::NEG_Z),
                Vec3::Y,
            );
        }
    }
}
