//! Loam ECS -- entity-keyed component registry with lifecycle tracking.
//!
//! This crate provides the component store for the Loam runtime. Entities are
//! generational handles; components live in per-type ordered maps so
//! iteration is deterministic. Component types can be *tracked*, which
//! records insertions and removals for systems that shadow components with
//! external resources (the physics integration keeps native rigid bodies in
//! sync this way).
//!
//! # Quick Start
//!
//! ```
//! use loam_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! let mut registry = Registry::new();
//! registry.track::<Position>();
//!
//! let entity = registry.spawn();
//! registry.insert(entity, Position { x: 1.0, y: 2.0 }).unwrap();
//!
//! assert_eq!(registry.drain_added::<Position>(), vec![entity]);
//! assert_eq!(registry.get::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));
//! ```

#![deny(unsafe_code)]

pub mod entity;
pub mod registry;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by registry operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity} is dead (stale or never allocated)")]
    DeadEntity {
        entity: entity::Entity,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{Entities, Entity};
    pub use crate::registry::{Component, Registry};
    pub use crate::EcsError;
}
