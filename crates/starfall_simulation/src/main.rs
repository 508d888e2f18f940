//! Headless симуляция STARFALL
//!
//! Дуэль двух звеньев без рендера: проверка детерминизма и
//! smoke-run боевого pipeline.

use bevy::prelude::*;

use starfall_simulation::combat::health::LayeredHealth;
use starfall_simulation::combat::weapon::{WeaponData, WeaponState};
use starfall_simulation::{
    create_headless_app, step_simulation, AimReticle, CollisionBody, PhysicsBody, Ship,
    ShipStatsRegistry,
};

fn spawn_fighter(
    world: &mut World,
    class: &str,
    faction_id: u64,
    position: Vec3,
    facing: Vec3,
    weapon: WeaponData,
) -> Entity {
    let (health, stats) = {
        let registry = world.resource::<ShipStatsRegistry>();
        let health = registry.health_for(class);
        let stats = registry.get(class).cloned().unwrap_or_default();
        (health, stats)
    };
    let state = WeaponState::for_weapon(&weapon);

    world
        .spawn((
            Ship { faction_id },
            health,
            PhysicsBody::new(stats.mass),
            CollisionBody::new(stats.collision_radius, starfall_simulation::layers::LAYER_SHIPS),
            AimReticle::at(position + facing * 100.0),
            Transform::from_translation(position).looking_to(
                Dir3::new(facing).unwrap_or(Dir3::NEG_Z),
                Vec3::Y,
            ),
            weapon,
            state,
        ))
        .id()
}

fn main() {
    let seed = 42;
    println!("Starting STARFALL headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);
    let world = app.world_mut();

    // Два звена лицом к лицу, триггеры зажаты
    let red = spawn_fighter(
        world,
        "interceptor",
        1,
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::Z,
        WeaponData::pulse_cannon(),
    );
    let blue = spawn_fighter(
        world,
        "corvette",
        2,
        Vec3::new(0.0, 0.0, 120.0),
        Vec3::NEG_Z,
        WeaponData::autocannon(),
    );

    for entity in [red, blue] {
        if let Some(mut state) = world.get_mut::<WeaponState>(entity) {
            state.pull_trigger();
        }
    }

    // 1800 тиков = 30 секунд боя
    for tick in 0..1800 {
        step_simulation(&mut app);

        if tick % 300 == 0 {
            let world = app.world_mut();
            let mut query = world.query::<(Entity, &LayeredHealth)>();
            for (entity, health) in query.iter(world) {
                println!(
                    "Tick {}: {:?} shield={:.0} armor={:.0} hull={:.0}",
                    tick, entity, health.shield, health.armor, health.hull
                );
            }
        }
    }

    let world = app.world_mut();
    let mut query = world.query::<(Entity, &Ship, &LayeredHealth)>();
    for (entity, ship, health) in query.iter(world) {
        println!(
            "Final: {:?} faction={} alive={} hull={:.0}/{:.0}",
            entity,
            ship.faction_id,
            health.is_alive(),
            health.hull,
            health.max_hull
        );
    }
    println!("Simulation complete!");
}
