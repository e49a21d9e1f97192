//! Native physics world wrapper.
//!
//! [`PhysicsWorld`] owns the rapier2d simulation state and is the single
//! place that touches the pipeline. Each [`PhysicsWorld::step`] advances the
//! simulation by a caller-supplied delta using a fixed number of internal
//! sub-steps and parks the native collision/contact-force events in pending
//! queues for the [`EventProcessor`](crate::physics::events::EventProcessor)
//! to drain.
//!
//! The simulation runs in meters; everything outside this module speaks
//! pixels. The conversion helpers here are the only sanctioned crossing.

use std::collections::HashMap;

use rapier2d::prelude::{
    vector, CCDSolver, ColliderHandle, ColliderSet, CollisionEvent, ContactForceEvent,
    DefaultBroadPhase, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet,
    NarrowPhase, PairFilterContext, PhysicsHooks, PhysicsPipeline, Real, RigidBodyHandle,
    RigidBodySet, SolverFlags, Vector,
};
use rapier2d::crossbeam;
use rapier2d::pipeline::ChannelEventCollector;

use crate::components::Vec2;
use crate::physics::components::CollisionFilter;
use crate::physics::PhysicsError;

/// Pixel-to-meter scale. 32 pixels (one tile) is one meter.
pub const PIXELS_PER_METER: f32 = 32.0;

/// Internal sub-steps per [`PhysicsWorld::step`] call. Callers cannot vary
/// this; sub-stepping is a world policy, not a per-call knob.
pub const SUB_STEP_COUNT: u32 = 4;

/// Default gravity in m/s^2. The runtime uses a y-down pixel space, so
/// positive y pulls toward the bottom of the screen.
pub const DEFAULT_GRAVITY: Vec2 = Vec2::new(0.0, 9.8);

// ---------------------------------------------------------------------------
// Unit conversions
// ---------------------------------------------------------------------------

/// Convert pixels to meters.
#[inline]
pub fn pixels_to_meters(pixels: f32) -> f32 {
    pixels / PIXELS_PER_METER
}

/// Convert meters to pixels.
#[inline]
pub fn meters_to_pixels(meters: f32) -> f32 {
    meters * PIXELS_PER_METER
}

/// Convert a pixel vector to meters.
#[inline]
pub fn pixels_to_meters_vec2(pixels: Vec2) -> Vec2 {
    Vec2::new(pixels.x / PIXELS_PER_METER, pixels.y / PIXELS_PER_METER)
}

/// Convert a meter vector to pixels.
#[inline]
pub fn meters_to_pixels_vec2(meters: Vec2) -> Vec2 {
    Vec2::new(meters.x * PIXELS_PER_METER, meters.y * PIXELS_PER_METER)
}

// ---------------------------------------------------------------------------
// FilterTable
// ---------------------------------------------------------------------------

/// Collision filters per collider, applied through rapier's pair-filter
/// hooks.
///
/// rapier's built-in interaction groups cannot express the positive
/// group-index override (force-collide past a mask veto), so all filtering
/// runs here: both the contact path and the sensor intersection path consult
/// [`CollisionFilter::should_collide`]. Colliders without an entry (never
/// created through the body factory) interact unconditionally.
#[derive(Debug, Default)]
struct FilterTable {
    filters: HashMap<ColliderHandle, CollisionFilter>,
}

impl FilterTable {
    fn should_collide(&self, a: ColliderHandle, b: ColliderHandle) -> bool {
        match (self.filters.get(&a), self.filters.get(&b)) {
            (Some(fa), Some(fb)) => fa.should_collide(fb),
            _ => true,
        }
    }
}

impl PhysicsHooks for FilterTable {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        if self.should_collide(context.collider1, context.collider2) {
            Some(SolverFlags::COMPUTE_IMPULSES)
        } else {
            None
        }
    }

    fn filter_intersection_pair(&self, context: &PairFilterContext) -> bool {
        self.should_collide(context.collider1, context.collider2)
    }
}

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

/// Owner of the native rapier2d simulation.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    filters: FilterTable,
    /// Native begin/end events (contact and sensor) accumulated since the
    /// last drain.
    pending_collisions: Vec<CollisionEvent>,
    /// Native contact-force events accumulated since the last drain.
    pending_contact_forces: Vec<ContactForceEvent>,
    /// Completed `step` calls.
    steps: u64,
}

impl PhysicsWorld {
    /// Create a world with the given gravity in m/s^2.
    ///
    /// rapier world allocation itself cannot fail; the construction-failure
    /// surface required of the native boundary is parameter validation, and
    /// a non-finite gravity vector is rejected here rather than poisoning
    /// every later step.
    pub fn new(gravity: Vec2) -> Result<Self, PhysicsError> {
        if !gravity.x.is_finite() || !gravity.y.is_finite() {
            return Err(PhysicsError::WorldCreation {
                reason: format!("non-finite gravity ({}, {})", gravity.x, gravity.y),
            });
        }
        Ok(Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![gravity.x as Real, gravity.y as Real],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            filters: FilterTable::default(),
            pending_collisions: Vec::new(),
            pending_contact_forces: Vec::new(),
            steps: 0,
        })
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Runs [`SUB_STEP_COUNT`] pipeline steps of `dt / SUB_STEP_COUNT` each.
    /// Native events generated by every sub-step are collected into the
    /// pending queues; nothing is returned directly.
    pub fn step(&mut self, dt: f32) {
        let sub_dt = dt / SUB_STEP_COUNT as f32;
        self.integration_params.dt = sub_dt as Real;

        for _ in 0..SUB_STEP_COUNT {
            let (collision_send, collision_recv) =
                crossbeam::channel::unbounded::<CollisionEvent>();
            let (force_send, force_recv) = crossbeam::channel::unbounded::<ContactForceEvent>();
            let event_handler = ChannelEventCollector::new(collision_send, force_send);

            self.pipeline.step(
                &self.gravity,
                &self.integration_params,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                None, // query pipeline (unused)
                &self.filters,
                &event_handler,
            );

            self.pending_collisions.extend(collision_recv.try_iter());
            self.pending_contact_forces.extend(force_recv.try_iter());
        }

        self.steps += 1;
    }

    /// Replace the global gravity vector (m/s^2). Affects subsequent
    /// integration only; already-integrated velocities keep their history.
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = vector![gravity.x as Real, gravity.y as Real];
    }

    /// Current gravity in m/s^2.
    pub fn gravity(&self) -> Vec2 {
        Vec2::new(self.gravity.x, self.gravity.y)
    }

    /// Whether the native world is live. A constructed world stays valid for
    /// its whole lifetime; this mirrors the native engine's handle-liveness
    /// contract.
    pub fn is_valid(&self) -> bool {
        self.gravity.x.is_finite() && self.gravity.y.is_finite()
    }

    /// Number of native bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of native colliders.
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Completed `step` calls since construction.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Duration of the most recent internal sub-step, in seconds. Contact
    /// forces reported by the native engine are averaged over this window.
    pub fn sub_step_dt(&self) -> f32 {
        self.integration_params.dt
    }

    /// Drain the pending native begin/end events.
    pub fn take_collision_events(&mut self) -> Vec<CollisionEvent> {
        std::mem::take(&mut self.pending_collisions)
    }

    /// Drain the pending native contact-force events.
    pub fn take_contact_force_events(&mut self) -> Vec<ContactForceEvent> {
        std::mem::take(&mut self.pending_contact_forces)
    }

    /// Shared access to the native body set.
    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    /// Exclusive access to the native body set.
    pub fn bodies_mut(&mut self) -> &mut RigidBodySet {
        &mut self.bodies
    }

    /// Shared access to the native collider set.
    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    /// Contact point, normal, and separation (pixels) for a collider pair,
    /// when the narrow phase holds an active manifold for it.
    pub fn contact_snapshot(
        &self,
        a: ColliderHandle,
        b: ColliderHandle,
    ) -> Option<(Vec2, Vec2, f32)> {
        let pair = self.narrow_phase.contact_pair(a, b)?;
        let manifold = pair.manifolds.iter().find(|m| !m.points.is_empty())?;
        let contact = &manifold.points[0];
        let first = self.colliders.get(pair.collider1)?;
        let world_point = first.position() * contact.local_p1;
        Some((
            Vec2::new(
                meters_to_pixels(world_point.x),
                meters_to_pixels(world_point.y),
            ),
            Vec2::new(manifold.data.normal.x, manifold.data.normal.y),
            meters_to_pixels(contact.dist),
        ))
    }

    // -- crate internals (body factory plumbing) ----------------------------

    /// Attach a native collider to a body and register its filter.
    pub(crate) fn attach_collider(
        &mut self,
        collider: rapier2d::prelude::Collider,
        filter: CollisionFilter,
        body: RigidBodyHandle,
    ) -> ColliderHandle {
        let handle = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        self.filters.filters.insert(handle, filter);
        handle
    }

    /// Remove a native body, its colliders, and their filter entries.
    /// Returns `false` when the handle no longer refers to a live body.
    pub(crate) fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        let collider_handles: Vec<ColliderHandle> = match self.bodies.get(handle) {
            Some(body) => body.colliders().to_vec(),
            None => return false,
        };
        for collider in collider_handles {
            self.filters.filters.remove(&collider);
        }
        self.bodies
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true, // remove attached colliders
            )
            .is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
