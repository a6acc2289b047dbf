// Headless flythrough demo
// Plays a tour from a config file (or a random looped tour) through a
// bevy_ecs schedule at the tour's nominal frame time.
//
// Usage: flythrough [tour.toml | tour.json]
//        flythrough --random N

use anyhow::{Context, Result, bail};
use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};
use log::info;
use rand::Rng;

use flythrough::engine::{
    FlythroughConfig, FlythroughManager, FlythroughSettings, FlythroughState, FrameDelta,
    HeightQuery, Heightmap, HeightmapSettings, PlaybackMode, Transform, WaypointDescriptor,
    flythrough_system, start_flythrough,
};

/// Simulated seconds after which the demo gives up.
const MAX_SIM_SECONDS: f32 = 600.0;
/// Looped tours end after this many laps.
const DEMO_LAPS: u32 = 2;
/// Camera height above the terrain for generated tours.
const FLIGHT_CLEARANCE: f32 = 6.0;

// ============================================================================
// TOUR SOURCES
// ============================================================================

enum TourSource {
    File(String),
    Random(usize),
}

fn parse_args() -> Result<TourSource> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(TourSource::Random(6)),
        [flag, count] if flag == "--random" => {
            let count: usize = count
                .parse()
                .with_context(|| format!("invalid waypoint count {count:?}"))?;
            if count == 0 {
                bail!("--random needs at least one waypoint");
            }
            Ok(TourSource::Random(count))
        }
        [path] if !path.starts_with('-') => Ok(TourSource::File(path.clone())),
        _ => bail!("usage: flythrough [tour.toml | tour.json] | --random N"),
    }
}

/// Rolling terrain made of random samples, 200x200 world units around the origin.
fn random_terrain(rng: &mut impl Rng) -> Result<Heightmap> {
    const SIZE: u32 = 32;
    let samples = (0..SIZE * SIZE).map(|_| rng.gen_range(0..=255)).collect();
    let settings = HeightmapSettings {
        min_height: 0.0,
        max_height: 8.0,
        world_width: 200.0,
        world_depth: 200.0,
        world_origin: Vec2::new(-100.0, -100.0),
    };
    Ok(Heightmap::from_samples(samples, SIZE, SIZE, settings)?)
}

/// Waypoints on a jittered ring, each placed a fixed height above the terrain.
fn random_tour(count: usize, rng: &mut impl Rng, terrain: &impl HeightQuery) -> FlythroughConfig {
    let waypoints = (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            let radius = rng.gen_range(40.0..80.0);
            let xz = Vec2::new(angle.cos() * radius, -angle.sin() * radius);
            WaypointDescriptor::at(terrain.ground_position(xz, FLIGHT_CLEARANCE))
                .with_speed(rng.gen_range(6.0..16.0))
                .with_auto_roll(true)
        })
        .collect();

    let defaults = FlythroughSettings::default();
    FlythroughConfig {
        mode: PlaybackMode::Looped,
        auto_roll_max_speed: defaults.auto_roll_max_speed,
        auto_roll_max_angle: defaults.auto_roll_max_angle,
        frame_time: defaults.frame_time,
        rotation_damping: defaults.rotation_damping,
        position_damping: defaults.position_damping,
        waypoints,
    }
}

fn load_tour(source: &TourSource) -> Result<FlythroughConfig> {
    match source {
        TourSource::File(path) => Ok(FlythroughConfig::load(path)?),
        TourSource::Random(count) => {
            let mut rng = rand::thread_rng();
            let terrain = random_terrain(&mut rng)?;
            Ok(random_tour(*count, &mut rng, &terrain))
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> Result<()> {
    env_logger::init();

    let source = parse_args()?;
    let config = load_tour(&source)?;
    let frame_time = config.frame_time;

    let mut manager = FlythroughManager::from_config(&config).context("building flythrough")?;

    let mut world = World::new();
    let camera = world.spawn(Transform::default()).id();
    manager.bind_target(camera);
    world.insert_resource(manager);
    world.insert_resource(FrameDelta::from_secs(frame_time));

    start_flythrough(&mut world, true).context("starting flythrough")?;

    let mut schedule = Schedule::default();
    schedule.add_systems(flythrough_system);

    let mut elapsed = 0.0;
    let mut next_report = 1.0;
    loop {
        schedule.run(&mut world);
        elapsed += frame_time;

        let manager = world.resource::<FlythroughManager>();
        let telemetry = manager.telemetry();
        if elapsed >= next_report {
            next_report += 1.0;
            let pose = world.get::<Transform>(camera).copied().unwrap_or_default();
            info!(
                "t={:>6.2}s seg {:?} {:>5.1}% v={:>5.2} pos=({:.2}, {:.2}, {:.2}) fwd=({:.2}, {:.2}, {:.2})",
                elapsed,
                telemetry.segment_index,
                telemetry.total_distance_pct * 100.0,
                telemetry.velocity,
                pose.position.x,
                pose.position.y,
                pose.position.z,
                pose.forward().x,
                pose.forward().y,
                pose.forward().z,
            );
        }

        if telemetry.state == FlythroughState::Stopped
            || telemetry.laps_completed >= DEMO_LAPS
            || elapsed >= MAX_SIM_SECONDS
        {
            break;
        }
    }

    let telemetry = world.resource::<FlythroughManager>().telemetry();
    let end = world.get::<Transform>(camera).map(|t| t.position).unwrap_or(Vec3::ZERO);
    println!(
        "Flythrough finished: {:.1}s simulated | path {:.2} units | laps {} | final position ({:.2}, {:.2}, {:.2})",
        elapsed, telemetry.total_length, telemetry.laps_completed, end.x, end.y, end.z
    );
    Ok(())
}
