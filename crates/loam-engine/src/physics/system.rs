//! Fixed-timestep physics integration.
//!
//! [`PhysicsSystem`] owns the [`PhysicsWorld`] and keeps it in sync with the
//! registry: native bodies are created for `(Transform, RigidBody, Collider)`
//! entities (in bulk at [`PhysicsSystem::init`], then reactively through the
//! registry's lifecycle queues) and destroyed when the `RigidBody` component
//! goes away. Each [`PhysicsSystem::update`] accumulates frame time and
//! advances the world in whole [`FIXED_TIMESTEP`] steps, then writes the
//! resulting poses back into `Transform` components.
//!
//! Oversized frames are clamped to [`MAX_ACCUMULATOR`] and the excess time is
//! discarded outright -- the simulation drops behind real time instead of
//! entering a catch-up death spiral.

use tracing::{debug, info, warn};

use loam_ecs::entity::Entity;
use loam_ecs::registry::Registry;

use crate::components::Transform;
use crate::physics::body;
use crate::physics::components::{Collider, RigidBody};
use crate::physics::world::PhysicsWorld;
use crate::schedule::System;

/// Simulation step length in seconds (60 Hz).
pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;

/// Accumulator ceiling in seconds. Frame time beyond this is discarded.
pub const MAX_ACCUMULATOR: f32 = 0.25;

/// Stable schedule name of the physics system.
pub const PHYSICS_SYSTEM_NAME: &str = "physics";

// ---------------------------------------------------------------------------
// PhysicsSystem
// ---------------------------------------------------------------------------

/// Fixed-timestep integration between the registry and the native world.
pub struct PhysicsSystem {
    world: PhysicsWorld,
    accumulator: f32,
    total_steps: u64,
    /// Entities whose native body was destroyed since the last drain; the
    /// thread driver uses this to purge transform-buffer entries.
    destroyed: Vec<Entity>,
}

impl PhysicsSystem {
    /// Wrap a physics world. Call [`init`](Self::init) once the registry is
    /// populated.
    pub fn new(world: PhysicsWorld) -> Self {
        info!(
            hz = (1.0 / FIXED_TIMESTEP) as u32,
            "physics system created"
        );
        Self {
            world,
            accumulator: 0.0,
            total_steps: 0,
            destroyed: Vec::new(),
        }
    }

    /// Bulk-create bodies for every qualifying entity and start tracking
    /// `RigidBody` lifecycle events for the reactive path.
    pub fn init(&mut self, registry: &mut Registry) {
        registry.track::<RigidBody>();

        let candidates: Vec<Entity> = registry
            .entities_with::<RigidBody>()
            .into_iter()
            .filter(|&e| registry.has::<Collider>(e) && registry.has::<Transform>(e))
            .collect();
        let count = candidates.len();
        for entity in candidates {
            self.create_body(registry, entity);
        }
        info!(count, "created native bodies for existing entities");
    }

    /// Advance the simulation by `dt` seconds of frame time.
    pub fn update(&mut self, registry: &mut Registry, dt: f32) {
        self.process_component_events(registry);

        self.accumulator += dt;
        if self.accumulator > MAX_ACCUMULATOR {
            warn!(
                accumulated = self.accumulator,
                clamp = MAX_ACCUMULATOR,
                "frame time too large, clamping accumulator"
            );
            self.accumulator = MAX_ACCUMULATOR;
        }

        let mut steps = 0u32;
        while self.accumulator >= FIXED_TIMESTEP {
            self.world.step(FIXED_TIMESTEP);
            self.accumulator -= FIXED_TIMESTEP;
            steps += 1;
        }
        self.total_steps += steps as u64;

        if steps > 0 {
            self.sync_transforms(registry);
        }
    }

    /// Create the native body for `entity`.
    ///
    /// Requires all of `Transform`, `RigidBody`, and `Collider`; skips with a
    /// warning otherwise. A second creation attempt for a live handle is a
    /// warned no-op.
    pub fn create_body(&mut self, registry: &mut Registry, entity: Entity) {
        let (transform, rigidbody, collider) = match (
            registry.get::<Transform>(entity),
            registry.get::<RigidBody>(entity),
            registry.get::<Collider>(entity),
        ) {
            (Some(t), Some(r), Some(c)) => (*t, r.clone(), c.clone()),
            _ => {
                warn!(
                    %entity,
                    "cannot create body: entity is missing Transform, RigidBody, or Collider"
                );
                return;
            }
        };

        if rigidbody.has_body() {
            warn!(%entity, "body already exists, skipping creation");
            return;
        }

        let handle = body::create_body(&mut self.world, entity, &transform, &rigidbody, &collider);
        if let Some(stored) = registry.get_mut::<RigidBody>(entity) {
            stored.handle = Some(handle);
        }
        debug!(%entity, kind = ?rigidbody.kind, "created native body");
    }

    /// Destroy the native body of a still-live entity and clear its handle.
    /// No-op when the entity has no `RigidBody` or no handle.
    pub fn destroy_body(&mut self, registry: &mut Registry, entity: Entity) {
        let Some(rigidbody) = registry.get_mut::<RigidBody>(entity) else {
            return;
        };
        let Some(handle) = rigidbody.handle.take() else {
            return;
        };
        body::destroy_body(&mut self.world, Some(handle));
        self.destroyed.push(entity);
        debug!(%entity, "destroyed native body");
    }

    /// Drain the entities whose native body was destroyed since the last
    /// call.
    pub fn take_destroyed(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.destroyed)
    }

    /// The native world.
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Exclusive access to the native world (event draining, gravity).
    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    /// Unspent frame time in seconds.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Fixed steps executed over the system's lifetime.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    // -- internals ----------------------------------------------------------

    /// Drain the registry lifecycle queues: destroy bodies whose `RigidBody`
    /// was removed (the removed component still carries the handle, so this
    /// covers despawned entities), then create bodies for new components.
    fn process_component_events(&mut self, registry: &mut Registry) {
        for (entity, removed) in registry.drain_removed::<RigidBody>() {
            if body::destroy_body(&mut self.world, removed.handle) {
                self.destroyed.push(entity);
                debug!(%entity, "destroyed native body for removed component");
            }
        }

        for entity in registry.drain_added::<RigidBody>() {
            if registry.contains(entity) {
                self.create_body(registry, entity);
            }
        }
    }

    /// Write native poses back into `Transform` components. Static bodies
    /// and entities without a live handle are skipped.
    fn sync_transforms(&mut self, registry: &mut Registry) {
        for entity in registry.entities_with::<RigidBody>() {
            let Some(rigidbody) = registry.get::<RigidBody>(entity) else {
                continue;
            };
            if rigidbody.is_static() {
                continue;
            }
            let Some(handle) = rigidbody.handle else {
                continue;
            };

            let collider = registry.get::<Collider>(entity).cloned();
            let Some(pose) = body::body_anchor_position(&self.world, handle, collider.as_ref())
            else {
                continue;
            };
            if let Some(transform) = registry.get_mut::<Transform>(entity) {
                *transform = pose;
            }
        }
    }
}

impl System for PhysicsSystem {
    fn name(&self) -> &str {
        PHYSICS_SYSTEM_NAME
    }

    fn update(&mut self, registry: &mut Registry, dt: f32) {
        PhysicsSystem::update(self, registry, dt);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Vec2;
    use crate::physics::world::DEFAULT_GRAVITY;

    fn system() -> PhysicsSystem {
        PhysicsSystem::new(PhysicsWorld::new(DEFAULT_GRAVITY).unwrap())
    }

    fn spawn_body(
        registry: &mut Registry,
        rigidbody: RigidBody,
        transform: Transform,
        collider: Collider,
    ) -> Entity {
        let e = registry.spawn();
        registry.insert(e, transform).unwrap();
        registry.insert(e, rigidbody).unwrap();
        registry.insert(e, collider).unwrap();
        e
    }

    #[test]
    fn init_creates_bodies_for_existing_entities() {
        let mut registry = Registry::new();
        let e = spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(0.0, 0.0),
            Collider::new_box(32.0, 32.0),
        );
        let mut system = system();
        system.init(&mut registry);

        assert_eq!(system.world().body_count(), 1);
        assert!(registry.get::<RigidBody>(e).unwrap().has_body());
    }

    #[test]
    fn dynamic_body_falls_and_syncs_transform() {
        let mut registry = Registry::new();
        let e = spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(100.0, 100.0),
            Collider::new_box(32.0, 32.0),
        );
        let mut system = system();
        system.init(&mut registry);

        for _ in 0..30 {
            system.update(&mut registry, FIXED_TIMESTEP);
        }
        let t = registry.get::<Transform>(e).unwrap();
        assert!(t.y > 100.0, "body should fall under +y gravity, y={}", t.y);
        assert!((t.x - 100.0).abs() < 1e-2, "no lateral drift, x={}", t.x);
    }

    #[test]
    fn static_body_transform_never_changes() {
        let mut registry = Registry::new();
        let e = spawn_body(
            &mut registry,
            RigidBody::new_static(),
            Transform::new(50.0, 60.0),
            Collider::new_box(640.0, 32.0),
        );
        let mut system = system();
        system.init(&mut registry);

        for _ in 0..60 {
            system.update(&mut registry, FIXED_TIMESTEP);
        }
        assert_eq!(*registry.get::<Transform>(e).unwrap(), Transform::new(50.0, 60.0));
    }

    #[test]
    fn accumulator_clamp_bounds_step_count() {
        let mut registry = Registry::new();
        spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(0.0, 0.0),
            Collider::new_box(32.0, 32.0),
        );
        let mut system = system();
        system.init(&mut registry);

        system.update(&mut registry, 1.0); // a full second against a 0.25 s clamp
        let max_steps = (MAX_ACCUMULATOR / FIXED_TIMESTEP) as u64;
        assert!(
            system.total_steps() <= max_steps,
            "clamp must bound catch-up work: ran {} steps, cap {}",
            system.total_steps(),
            max_steps
        );
        // The excess is discarded, not carried.
        assert!(system.accumulator() < FIXED_TIMESTEP);
    }

    #[test]
    fn update_smaller_than_timestep_runs_no_step() {
        let mut registry = Registry::new();
        let mut system = system();
        system.init(&mut registry);
        system.update(&mut registry, FIXED_TIMESTEP * 0.25);
        assert_eq!(system.total_steps(), 0);
        system.update(&mut registry, FIXED_TIMESTEP);
        assert_eq!(system.total_steps(), 1);
    }

    #[test]
    fn double_creation_is_a_noop() {
        let mut registry = Registry::new();
        let e = spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(0.0, 0.0),
            Collider::new_box(32.0, 32.0),
        );
        let mut system = system();
        system.init(&mut registry);
        let handle = registry.get::<RigidBody>(e).unwrap().handle;

        system.create_body(&mut registry, e);
        assert_eq!(system.world().body_count(), 1);
        assert_eq!(registry.get::<RigidBody>(e).unwrap().handle, handle);
    }

    #[test]
    fn missing_components_skip_creation() {
        let mut registry = Registry::new();
        let e = registry.spawn();
        registry.insert(e, RigidBody::new_dynamic(1.0)).unwrap();
        // No Transform, no Collider.
        let mut system = system();
        system.init(&mut registry);
        system.create_body(&mut registry, e);
        assert_eq!(system.world().body_count(), 0);
    }

    #[test]
    fn component_insertion_creates_body_reactively() {
        let mut registry = Registry::new();
        let mut system = system();
        system.init(&mut registry);

        let e = spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(0.0, 0.0),
            Collider::new_circle(16.0),
        );
        assert_eq!(system.world().body_count(), 0);
        system.update(&mut registry, FIXED_TIMESTEP);
        assert_eq!(system.world().body_count(), 1);
        assert!(registry.get::<RigidBody>(e).unwrap().has_body());
    }

    #[test]
    fn despawn_destroys_native_body() {
        let mut registry = Registry::new();
        let e = spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(0.0, 0.0),
            Collider::new_box(32.0, 32.0),
        );
        let mut system = system();
        system.init(&mut registry);
        assert_eq!(system.world().body_count(), 1);

        registry.despawn(e);
        system.update(&mut registry, FIXED_TIMESTEP);
        assert_eq!(system.world().body_count(), 0);
    }

    #[test]
    fn explicit_destroy_clears_handle_and_is_repeat_safe() {
        let mut registry = Registry::new();
        let e = spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(0.0, 0.0),
            Collider::new_box(32.0, 32.0),
        );
        let mut system = system();
        system.init(&mut registry);

        system.destroy_body(&mut registry, e);
        assert!(!registry.get::<RigidBody>(e).unwrap().has_body());
        assert_eq!(system.world().body_count(), 0);
        system.destroy_body(&mut registry, e); // repeat: no-op
        assert_eq!(system.world().body_count(), 0);
    }

    #[test]
    fn zero_gravity_body_stays_put_through_sync() {
        let mut registry = Registry::new();
        let e = spawn_body(
            &mut registry,
            RigidBody::new_dynamic(1.0),
            Transform::new(320.0, 640.0),
            Collider::new_box(64.0, 64.0),
        );
        let mut system = PhysicsSystem::new(PhysicsWorld::new(Vec2::ZERO).unwrap());
        system.init(&mut registry);
        system.update(&mut registry, FIXED_TIMESTEP);

        let t = registry.get::<Transform>(e).unwrap();
        assert!((t.x - 320.0).abs() < 1e-2, "x drifted to {}", t.x);
        assert!((t.y - 640.0).abs() < 1e-2, "y drifted to {}", t.y);
    }
}
