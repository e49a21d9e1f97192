//! Body and shape factory.
//!
//! Stateless translation from `(Transform, RigidBody, Collider)` component
//! data to native rapier bodies. Every call is independent; the factory owns
//! nothing. All unit and convention crossings happen here:
//!
//! - pixels -> meters (positions, velocities, shape dimensions)
//! - degrees -> radians (rotation)
//! - bottom-left anchor -> collider center (position origin)
//!
//! Creating a body and reading it back through [`body_anchor_position`]
//! reproduces the original transform within float rounding.

use rapier2d::prelude::{
    point, vector, ActiveEvents, ActiveHooks, ColliderBuilder, ColliderHandle, Point, Real,
    RigidBodyBuilder, RigidBodyHandle, SharedShape,
};
use tracing::warn;

use loam_ecs::entity::Entity;

use crate::components::{Transform, Vec2};
use crate::physics::components::{
    BodyKind, Collider, ColliderShape, RigidBody, MAX_POLYGON_VERTICES,
};
use crate::physics::world::{
    meters_to_pixels_vec2, pixels_to_meters, pixels_to_meters_vec2, PhysicsWorld,
};

// ---------------------------------------------------------------------------
// Entity <-> user-data encoding
// ---------------------------------------------------------------------------

/// Stamp an entity into a native user-data word.
///
/// The raw id is offset by +1 so that a zero-valued entity is
/// distinguishable from untagged user-data (which is zero). [`decode_entity`]
/// is the only sanctioned inverse.
#[inline]
pub fn encode_entity(entity: Entity) -> u128 {
    entity.to_raw() as u128 + 1
}

/// Recover the entity stamped by [`encode_entity`]. Returns `None` for
/// untagged user-data.
#[inline]
pub fn decode_entity(user_data: u128) -> Option<Entity> {
    if user_data == 0 {
        None
    } else {
        Some(Entity::from_raw((user_data - 1) as u64))
    }
}

// ---------------------------------------------------------------------------
// Anchor <-> center
// ---------------------------------------------------------------------------

/// Pixel offset from the bottom-left anchor to the collider center.
///
/// Boxes shift by half their size, circles by their radius. Polygon vertices
/// are already center-relative, so polygons carry no anchor offset.
pub fn center_offset(collider: &Collider) -> Vec2 {
    match &collider.shape {
        ColliderShape::Box { width, height } => Vec2::new(width * 0.5, height * 0.5),
        ColliderShape::Circle { radius } => Vec2::new(*radius, *radius),
        ColliderShape::Polygon { .. } => Vec2::ZERO,
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Create a native body (with exactly one shape) for `entity`.
///
/// The transform's anchor position is shifted to the collider center, then
/// converted to meters; rotation converts to radians; rigid-body flags and
/// the initial velocity are applied; the entity is stamped into both the
/// body's and the shape's user-data for reverse lookup.
pub fn create_body(
    world: &mut PhysicsWorld,
    entity: Entity,
    transform: &Transform,
    rigidbody: &RigidBody,
    collider: &Collider,
) -> RigidBodyHandle {
    let offset = center_offset(collider);
    let center = pixels_to_meters_vec2(Vec2::new(
        transform.x + offset.x,
        transform.y + offset.y,
    ));
    let linvel = pixels_to_meters_vec2(rigidbody.linear_velocity);

    let mut builder = match rigidbody.kind {
        BodyKind::Static => RigidBodyBuilder::fixed(),
        BodyKind::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
        BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
    }
    .translation(vector![center.x as Real, center.y as Real])
    .rotation(transform.rotation.to_radians() as Real)
    .linvel(vector![linvel.x as Real, linvel.y as Real])
    .angvel(rigidbody.angular_velocity as Real)
    .linear_damping(rigidbody.linear_damping as Real)
    .angular_damping(rigidbody.angular_damping as Real)
    .gravity_scale(rigidbody.gravity_scale as Real)
    .can_sleep(rigidbody.allow_sleep)
    .ccd_enabled(rigidbody.bullet)
    .user_data(encode_entity(entity));
    if rigidbody.fixed_rotation {
        builder = builder.lock_rotations();
    }

    let handle = world.bodies_mut().insert(builder.build());
    attach_shape(world, handle, entity, collider);
    handle
}

/// Convenience: create a body with a plain box collider.
pub fn create_box(
    world: &mut PhysicsWorld,
    entity: Entity,
    transform: &Transform,
    rigidbody: &RigidBody,
    width: f32,
    height: f32,
) -> RigidBodyHandle {
    create_body(
        world,
        entity,
        transform,
        rigidbody,
        &Collider::new_box(width, height),
    )
}

/// Convenience: create a body with a plain circle collider.
pub fn create_circle(
    world: &mut PhysicsWorld,
    entity: Entity,
    transform: &Transform,
    rigidbody: &RigidBody,
    radius: f32,
) -> RigidBodyHandle {
    create_body(
        world,
        entity,
        transform,
        rigidbody,
        &Collider::new_circle(radius),
    )
}

/// Destroy a native body. No-op (returning `false`) on an absent handle or
/// one that no longer refers to a live body, so double destruction is safe.
pub fn destroy_body(world: &mut PhysicsWorld, handle: Option<RigidBodyHandle>) -> bool {
    match handle {
        Some(handle) => world.remove_body(handle),
        None => false,
    }
}

/// Read a body's pose back in domain terms: anchor pixels and degrees.
///
/// This is the exact inverse of the conversion [`create_body`] applies. The
/// collider supplies the center offset; without one the center is reported
/// as-is.
pub fn body_anchor_position(
    world: &PhysicsWorld,
    handle: RigidBodyHandle,
    collider: Option<&Collider>,
) -> Option<Transform> {
    let body = world.bodies().get(handle)?;
    let center = meters_to_pixels_vec2(Vec2::new(body.translation().x, body.translation().y));
    let offset = collider.map(center_offset).unwrap_or(Vec2::ZERO);
    Some(Transform {
        x: center.x - offset.x,
        y: center.y - offset.y,
        rotation: body.rotation().angle().to_degrees(),
    })
}

// ---------------------------------------------------------------------------
// Shape construction
// ---------------------------------------------------------------------------

fn attach_shape(
    world: &mut PhysicsWorld,
    body: RigidBodyHandle,
    entity: Entity,
    collider: &Collider,
) -> ColliderHandle {
    // Polygons bake the local offset into their vertices; box and circle
    // shapes carry it as the collider's local translation.
    let (shape, local_offset) = match &collider.shape {
        ColliderShape::Box { width, height } => (
            SharedShape::cuboid(
                pixels_to_meters(width * 0.5) as Real,
                pixels_to_meters(height * 0.5) as Real,
            ),
            pixels_to_meters_vec2(collider.offset),
        ),
        ColliderShape::Circle { radius } => (
            SharedShape::ball(pixels_to_meters(*radius) as Real),
            pixels_to_meters_vec2(collider.offset),
        ),
        ColliderShape::Polygon { vertices } => {
            (polygon_shape(vertices, collider.offset), Vec2::ZERO)
        }
    };

    let built = ColliderBuilder::new(shape)
        .translation(vector![local_offset.x as Real, local_offset.y as Real])
        .density(collider.density as Real)
        .friction(collider.friction as Real)
        .restitution(collider.restitution as Real)
        .sensor(collider.sensor)
        .active_events(ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS)
        .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR)
        .user_data(encode_entity(entity))
        .build();

    world.attach_collider(built, collider.filter, body)
}

/// Convex hull from center-relative pixel vertices. Degenerate input falls
/// back to a unit (1 m) box instead of failing the whole body creation.
fn polygon_shape(vertices: &[Vec2], offset: Vec2) -> SharedShape {
    if !(3..=MAX_POLYGON_VERTICES).contains(&vertices.len()) {
        warn!(
            count = vertices.len(),
            "polygon collider needs 3..=8 vertices, using unit box"
        );
        return SharedShape::cuboid(0.5, 0.5);
    }

    let points: Vec<Point<Real>> = vertices
        .iter()
        .map(|v| {
            point![
                pixels_to_meters(v.x + offset.x) as Real,
                pixels_to_meters(v.y + offset.y) as Real
            ]
        })
        .collect();

    SharedShape::convex_hull(&points).unwrap_or_else(|| {
        warn!("degenerate polygon hull, using unit box");
        SharedShape::cuboid(0.5, 0.5)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
