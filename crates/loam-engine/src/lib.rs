//! Loam Engine -- 2D tile-game simulation runtime.
//!
//! This crate builds on [`loam_ecs`] to provide the simulation layer: shared
//! pose components, a name-keyed system schedule, and the rigid-body physics
//! integration (native rapier2d world, fixed-timestep system, dedicated
//! physics thread with a double-buffered transform handoff, and collision
//! event translation).
//!
//! # Quick Start
//!
//! ```
//! use loam_engine::prelude::*;
//!
//! let mut registry = Registry::new();
//! let crate_entity = registry.spawn();
//! registry.insert(crate_entity, Transform::new(100.0, 100.0)).unwrap();
//! registry.insert(crate_entity, RigidBody::new_dynamic(1.0)).unwrap();
//! registry.insert(crate_entity, Collider::from_tiles(1, 1)).unwrap();
//!
//! let world = PhysicsWorld::new(DEFAULT_GRAVITY).expect("world");
//! let mut system = PhysicsSystem::new(world);
//! system.init(&mut registry);
//!
//! // Drive one simulated second.
//! for _ in 0..60 {
//!     system.update(&mut registry, FIXED_TIMESTEP);
//! }
//! assert!(registry.get::<Transform>(crate_entity).unwrap().y > 100.0);
//! ```

#![deny(unsafe_code)]

pub mod components;
pub mod physics;
pub mod schedule;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use loam_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // ECS essentials.
    pub use loam_ecs::prelude::*;

    // Core components.
    pub use crate::components::{Transform, Vec2};

    // Schedule.
    pub use crate::schedule::{Schedule, System};

    // Physics types.
    pub use crate::physics::{
        BodyKind, BufferedTransform, Collider, ColliderShape, CollisionBeginEvent,
        CollisionEndEvent, CollisionFilter, CollisionHitEvent, CollisionSignals, ContactPoint,
        EventProcessor, PhysicsError, PhysicsSystem, PhysicsThread, PhysicsWorld, RigidBody,
        Signal, SimState, TransformBuffer, TriggerEnterEvent, TriggerExitEvent, DEFAULT_GRAVITY,
        DEFAULT_HIT_SPEED_THRESHOLD, FIXED_TIMESTEP, MAX_ACCUMULATOR, PHYSICS_SYSTEM_NAME,
        PIXELS_PER_METER, SUB_STEP_COUNT, TILE_SIZE,
    };
}
