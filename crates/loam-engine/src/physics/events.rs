//! Translation of native physics events into domain signals.
//!
//! After the world has stepped, [`EventProcessor::process`] drains the
//! pending native events and republishes them as typed domain events:
//!
//! - contact begin/end between two solid shapes,
//! - trigger enter/exit when a sensor shape overlaps a solid one,
//! - hit events for contacts whose approach speed crosses a threshold.
//!
//! Participants are resolved back to entities through the user-data stamped
//! at body creation. A shape that no longer resolves (destroyed the same
//! frame, or never tagged) drops the event -- begin-class failures are
//! warned, end-class ones are routine teardown noise and stay silent.
//!
//! Broadcasting is synchronous: each signal fans out to its subscribers in
//! connection order before `process` returns.

use rapier2d::prelude::{ColliderHandle, CollisionEvent, CollisionEventFlags, ContactForceEvent};
use tracing::{trace, warn};

use loam_ecs::entity::Entity;

use crate::components::Vec2;
use crate::physics::body::decode_entity;
use crate::physics::world::{meters_to_pixels, PhysicsWorld};

/// Default hit-speed threshold in m/s. Contacts approaching slower than this
/// do not produce [`CollisionHitEvent`]s.
pub const DEFAULT_HIT_SPEED_THRESHOLD: f32 = 1.0;

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Synchronous multi-subscriber callback channel.
///
/// Subscribers are invoked in connection order, on the thread that emits.
pub struct Signal<T> {
    slots: Vec<Box<dyn FnMut(&T)>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn connect(&mut self, slot: impl FnMut(&T) + 'static) {
        self.slots.push(Box::new(slot));
    }

    /// Invoke every subscriber with `event`, in connection order.
    pub fn emit(&mut self, event: &T) {
        for slot in &mut self.slots {
            slot(event);
        }
    }

    /// Number of connected subscribers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every subscriber.
    pub fn disconnect_all(&mut self) {
        self.slots.clear();
    }
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Contact geometry attached to a begin event, in pixels. Zeroed when the
/// narrow phase no longer holds a manifold for the pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactPoint {
    /// Contact position in pixels.
    pub position: Vec2,
    /// Contact normal (unit, from the first collider toward the second).
    pub normal: Vec2,
    /// Signed separation in pixels; negative while penetrating.
    pub separation: f32,
}

/// Two solid shapes started touching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBeginEvent {
    pub entity_a: Entity,
    pub entity_b: Entity,
    pub collider_a: ColliderHandle,
    pub collider_b: ColliderHandle,
    pub contact: ContactPoint,
}

/// Two solid shapes stopped touching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEndEvent {
    pub entity_a: Entity,
    pub entity_b: Entity,
    pub collider_a: ColliderHandle,
    pub collider_b: ColliderHandle,
}

/// High-speed contact. Useful for impact sounds and damage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionHitEvent {
    pub entity_a: Entity,
    pub entity_b: Entity,
    pub collider_a: ColliderHandle,
    pub collider_b: ColliderHandle,
    /// Impact point in pixels.
    pub point: Vec2,
    /// Impact normal (unit).
    pub normal: Vec2,
    /// Approach speed at impact, in pixels/second.
    pub approach_speed: f32,
}

/// A shape began overlapping a sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEnterEvent {
    /// Entity owning the sensor shape.
    pub trigger_entity: Entity,
    /// Entity that entered the sensor.
    pub other_entity: Entity,
    pub trigger_collider: ColliderHandle,
    pub other_collider: ColliderHandle,
}

/// A shape stopped overlapping a sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerExitEvent {
    pub trigger_entity: Entity,
    pub other_entity: Entity,
    pub trigger_collider: ColliderHandle,
    pub other_collider: ColliderHandle,
}

// ---------------------------------------------------------------------------
// CollisionSignals
// ---------------------------------------------------------------------------

/// Per-kind signal channels for collision and trigger events.
#[derive(Default)]
pub struct CollisionSignals {
    pub on_collision_begin: Signal<CollisionBeginEvent>,
    pub on_collision_end: Signal<CollisionEndEvent>,
    pub on_collision_hit: Signal<CollisionHitEvent>,
    pub on_trigger_enter: Signal<TriggerEnterEvent>,
    pub on_trigger_exit: Signal<TriggerExitEvent>,
}

impl CollisionSignals {
    /// Drop every subscriber from every channel.
    pub fn disconnect_all(&mut self) {
        self.on_collision_begin.disconnect_all();
        self.on_collision_end.disconnect_all();
        self.on_collision_hit.disconnect_all();
        self.on_trigger_enter.disconnect_all();
        self.on_trigger_exit.disconnect_all();
    }
}

// ---------------------------------------------------------------------------
// EventProcessor
// ---------------------------------------------------------------------------

/// Drains the world's pending native events and broadcasts domain events.
///
/// Two overlapping sensors are an unspecified case; the processor picks the
/// first sensor-flagged collider of the pair as the trigger and publishes a
/// single event.
#[derive(Default)]
pub struct EventProcessor {
    signals: CollisionSignals,
    hit_speed_threshold: f32,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self {
            signals: CollisionSignals::default(),
            hit_speed_threshold: DEFAULT_HIT_SPEED_THRESHOLD,
        }
    }

    /// The signal channels, for subscribing.
    pub fn signals_mut(&mut self) -> &mut CollisionSignals {
        &mut self.signals
    }

    /// Minimum approach speed (m/s) for hit events.
    pub fn hit_speed_threshold(&self) -> f32 {
        self.hit_speed_threshold
    }

    /// Replace the hit-speed threshold (m/s).
    pub fn set_hit_speed_threshold(&mut self, meters_per_second: f32) {
        self.hit_speed_threshold = meters_per_second;
    }

    /// Drain and broadcast everything the world accumulated since the last
    /// call. Logically runs after each step; either thread may call it as
    /// long as it holds the world.
    pub fn process(&mut self, world: &mut PhysicsWorld) {
        let collisions = world.take_collision_events();
        let forces = world.take_contact_force_events();

        for event in collisions {
            match event {
                CollisionEvent::Started(a, b, flags) => {
                    if flags.contains(CollisionEventFlags::SENSOR) {
                        self.sensor_begin(world, a, b);
                    } else {
                        self.contact_begin(world, a, b);
                    }
                }
                CollisionEvent::Stopped(a, b, flags) => {
                    if flags.contains(CollisionEventFlags::SENSOR) {
                        self.sensor_end(world, a, b);
                    } else {
                        self.contact_end(world, a, b);
                    }
                }
            }
        }

        for event in forces {
            self.contact_hit(world, &event);
        }
    }

    // -- contact events -----------------------------------------------------

    fn contact_begin(&mut self, world: &PhysicsWorld, a: ColliderHandle, b: ColliderHandle) {
        let (Some(entity_a), Some(entity_b)) = (resolve(world, a), resolve(world, b)) else {
            warn!("could not resolve entities for contact begin event");
            return;
        };

        let contact = world
            .contact_snapshot(a, b)
            .map(|(position, normal, separation)| ContactPoint {
                position,
                normal,
                separation,
            })
            .unwrap_or_default();

        trace!(%entity_a, %entity_b, "collision begin");
        self.signals.on_collision_begin.emit(&CollisionBeginEvent {
            entity_a,
            entity_b,
            collider_a: a,
            collider_b: b,
            contact,
        });
    }

    fn contact_end(&mut self, world: &PhysicsWorld, a: ColliderHandle, b: ColliderHandle) {
        // Shapes are routinely destroyed the same frame they stop touching;
        // an unresolved end event is dropped without noise.
        let (Some(entity_a), Some(entity_b)) = (resolve(world, a), resolve(world, b)) else {
            return;
        };

        trace!(%entity_a, %entity_b, "collision end");
        self.signals.on_collision_end.emit(&CollisionEndEvent {
            entity_a,
            entity_b,
            collider_a: a,
            collider_b: b,
        });
    }

    fn contact_hit(&mut self, world: &PhysicsWorld, event: &ContactForceEvent) {
        let a = event.collider1;
        let b = event.collider2;
        let (Some(entity_a), Some(entity_b)) = (resolve(world, a), resolve(world, b)) else {
            return;
        };

        // By the time force events are drained the solver has already
        // absorbed the impact, so post-step velocities cannot tell a hard
        // landing from a resting contact. Recover the approach speed from
        // the contact impulse instead: F = m * dv / dt, so
        // dv = F * dt / m_effective. Resting support forces (~m*g) come out
        // around g*dt and sit far below any sensible threshold.
        let Some(effective_mass) = effective_mass(world, a, b) else {
            return;
        };
        let approach = event.total_force_magnitude * world.sub_step_dt() / effective_mass;
        if approach < self.hit_speed_threshold {
            return;
        }
        let normal = event.max_force_direction;

        let point = world
            .contact_snapshot(a, b)
            .map(|(position, _, _)| position)
            .unwrap_or_default();
        let hit = CollisionHitEvent {
            entity_a,
            entity_b,
            collider_a: a,
            collider_b: b,
            point,
            normal: Vec2::new(normal.x, normal.y),
            approach_speed: meters_to_pixels(approach),
        };
        trace!(
            %entity_a,
            %entity_b,
            speed = hit.approach_speed,
            "collision hit"
        );
        self.signals.on_collision_hit.emit(&hit);
    }

    // -- sensor events ------------------------------------------------------

    fn sensor_begin(&mut self, world: &PhysicsWorld, a: ColliderHandle, b: ColliderHandle) {
        let Some((trigger, other)) = classify_sensor(world, a, b) else {
            warn!("could not resolve entities for sensor begin event");
            return;
        };
        let (Some(trigger_entity), Some(other_entity)) =
            (resolve(world, trigger), resolve(world, other))
        else {
            warn!("could not resolve entities for sensor begin event");
            return;
        };

        trace!(%trigger_entity, %other_entity, "trigger enter");
        self.signals.on_trigger_enter.emit(&TriggerEnterEvent {
            trigger_entity,
            other_entity,
            trigger_collider: trigger,
            other_collider: other,
        });
    }

    fn sensor_end(&mut self, world: &PhysicsWorld, a: ColliderHandle, b: ColliderHandle) {
        let Some((trigger, other)) = classify_sensor(world, a, b) else {
            return;
        };
        let (Some(trigger_entity), Some(other_entity)) =
            (resolve(world, trigger), resolve(world, other))
        else {
            return;
        };

        trace!(%trigger_entity, %other_entity, "trigger exit");
        self.signals.on_trigger_exit.emit(&TriggerExitEvent {
            trigger_entity,
            other_entity,
            trigger_collider: trigger,
            other_collider: other,
        });
    }
}

// ---------------------------------------------------------------------------
// Resolution helpers
// ---------------------------------------------------------------------------

/// Map a native shape back to its entity. `None` when the shape is gone or
/// was never tagged.
fn resolve(world: &PhysicsWorld, handle: ColliderHandle) -> Option<Entity> {
    world
        .colliders()
        .get(handle)
        .and_then(|collider| decode_entity(collider.user_data))
}

/// Order a sensor pair as `(trigger, other)`. `None` when either shape is
/// gone or neither is a sensor.
fn classify_sensor(
    world: &PhysicsWorld,
    a: ColliderHandle,
    b: ColliderHandle,
) -> Option<(ColliderHandle, ColliderHandle)> {
    let ca = world.colliders().get(a)?;
    let cb = world.colliders().get(b)?;
    if ca.is_sensor() {
        Some((a, b))
    } else if cb.is_sensor() {
        Some((b, a))
    } else {
        None
    }
}

/// Mass of a collider's parent body, when that body is dynamic.
fn dynamic_mass(world: &PhysicsWorld, handle: ColliderHandle) -> Option<f32> {
    let body = world
        .colliders()
        .get(handle)
        .and_then(|collider| collider.parent())
        .and_then(|parent| world.bodies().get(parent))?;
    if body.is_dynamic() {
        Some(body.mass())
    } else {
        None
    }
}

/// Effective (reduced) mass of a contact pair. Static and kinematic
/// participants count as immovable; a pair with no dynamic participant has
/// no meaningful impact speed and yields `None`.
fn effective_mass(
    world: &PhysicsWorld,
    a: ColliderHandle,
    b: ColliderHandle,
) -> Option<f32> {
    match (dynamic_mass(world, a), dynamic_mass(world, b)) {
        (Some(ma), Some(mb)) if ma > 0.0 && mb > 0.0 => Some(ma * mb / (ma + mb)),
        (Some(m), None) | (None, Some(m)) if m > 0.0 => Some(m),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
