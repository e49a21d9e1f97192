//! Headless demo: crates dropped onto a platform through a sensor zone.
//!
//! Runs the physics thread for about two seconds of wall time while the
//! "render" loop swaps transform buffers once per frame and prints the
//! translated collision events.
//!
//! ```sh
//! cargo run --example falling_crates
//! ```

use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use loam_engine::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut registry = Registry::new();

    let platform = registry.spawn();
    registry.insert(platform, Transform::new(0.0, 400.0))?;
    registry.insert(platform, RigidBody::new_static())?;
    registry.insert(platform, Collider::from_tiles(20, 1))?;

    let zone = registry.spawn();
    registry.insert(zone, Transform::new(0.0, 300.0))?;
    registry.insert(zone, RigidBody::new_static())?;
    registry.insert(zone, Collider::from_tiles(20, 1).sensor())?;

    let mut crates = Vec::new();
    for i in 0..4u32 {
        let entity = registry.spawn();
        let x = 96.0 + i as f32 * 96.0;
        let y = 32.0 - i as f32 * 48.0;
        registry.insert(entity, Transform::new(x, y))?;
        registry.insert(entity, RigidBody::new_dynamic(1.0))?;
        registry.insert(entity, Collider::from_tiles(1, 1))?;
        crates.push(entity);
    }

    let mut system = PhysicsSystem::new(PhysicsWorld::new(DEFAULT_GRAVITY)?);
    system.init(&mut registry);

    let mut processor = EventProcessor::new();
    processor
        .signals_mut()
        .on_collision_begin
        .connect(|e: &CollisionBeginEvent| {
            info!(a = %e.entity_a, b = %e.entity_b, "collision begin");
        });
    processor
        .signals_mut()
        .on_collision_hit
        .connect(|e: &CollisionHitEvent| {
            info!(
                a = %e.entity_a,
                b = %e.entity_b,
                speed_px_s = e.approach_speed,
                "impact"
            );
        });
    processor
        .signals_mut()
        .on_trigger_enter
        .connect(|e: &TriggerEnterEvent| {
            info!(zone = %e.trigger_entity, visitor = %e.other_entity, "entered zone");
        });
    processor
        .signals_mut()
        .on_trigger_exit
        .connect(|e: &TriggerExitEvent| {
            info!(zone = %e.trigger_entity, visitor = %e.other_entity, "left zone");
        });

    let mut thread = PhysicsThread::new(system, registry);
    thread.start();

    // The stand-in render loop: ~60 frames per second for two seconds.
    for _frame in 0..120 {
        std::thread::sleep(Duration::from_millis(16));
        thread.swap_transform_buffers();
        thread.apply_transforms_to_registry();
        thread.with_lock(|sim| processor.process(sim.system.world_mut()));
    }

    thread.with_lock(|sim| {
        for &entity in &crates {
            if let Some(t) = sim.registry.get::<Transform>(entity) {
                info!(%entity, x = t.x, y = t.y, "crate came to rest");
            }
        }
        info!(
            steps = sim.system.total_steps(),
            bodies = sim.system.world().body_count(),
            "simulation summary"
        );
    });

    thread.stop();
    Ok(())
}
