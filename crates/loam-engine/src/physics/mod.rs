//! Rigid-body physics integration.
//!
//! The physics subsystem bridges the component registry and a native rapier2d
//! simulation:
//!
//! - [`world`] owns the rapier pipeline, unit conversions, and collision
//!   filtering, and accumulates the native events each step produces.
//! - [`body`] translates `(Transform, RigidBody, Collider)` component data
//!   into native bodies and shapes, and back.
//! - [`system`] runs the fixed-timestep integration and keeps components and
//!   native bodies in sync through the registry's lifecycle queues.
//! - [`thread`] hosts the integration on a dedicated 60 Hz worker with a
//!   double-buffered transform handoff to the main thread ([`buffer`]).
//! - [`events`] translates native contact/sensor events into domain signals.
//!
//! Unit conventions, applied at this boundary only: 32 pixels per meter,
//! degrees outside / radians inside, bottom-left pixel anchor outside /
//! center of mass inside.

pub mod body;
pub mod buffer;
pub mod components;
pub mod events;
pub mod system;
pub mod thread;
pub mod world;

pub use body::{decode_entity, encode_entity};
pub use buffer::{BufferedTransform, TransformBuffer};
pub use components::{
    BodyKind, Collider, ColliderShape, CollisionFilter, RigidBody, MAX_POLYGON_VERTICES,
    TILE_SIZE,
};
pub use events::{
    CollisionBeginEvent, CollisionEndEvent, CollisionHitEvent, CollisionSignals, ContactPoint,
    EventProcessor, Signal, TriggerEnterEvent, TriggerExitEvent, DEFAULT_HIT_SPEED_THRESHOLD,
};
pub use system::{PhysicsSystem, FIXED_TIMESTEP, MAX_ACCUMULATOR, PHYSICS_SYSTEM_NAME};
pub use thread::{PhysicsThread, SimState};
pub use world::{
    meters_to_pixels, meters_to_pixels_vec2, pixels_to_meters, pixels_to_meters_vec2,
    PhysicsWorld, DEFAULT_GRAVITY, PIXELS_PER_METER, SUB_STEP_COUNT,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the physics subsystem.
///
/// Per-entity and per-event problems are logged and skipped rather than
/// surfaced here; only world construction is fatal.
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    /// The native world could not be constructed.
    #[error("failed to create physics world: {reason}")]
    WorldCreation { reason: String },
}
