//! Physics-facing components.
//!
//! [`RigidBody`] and [`Collider`] describe an entity's physical presence in
//! domain terms (pixels, degrees, tile sizes). The integration system
//! translates them into native rapier bodies and shapes; the `handle` field
//! is the only place the native world leaks back into component data, and it
//! stays `None` until the body actually exists.

use rapier2d::dynamics::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use crate::components::Vec2;

/// Convex polygon colliders are capped at 8 vertices.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Tile edge length in pixels. One tile is exactly one physics meter.
pub const TILE_SIZE: f32 = 32.0;

// ---------------------------------------------------------------------------
// RigidBody
// ---------------------------------------------------------------------------

/// How the native engine treats a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyKind {
    /// Immovable (walls, floors). Never written by transform sync.
    Static,
    /// Script-driven, ignores forces (moving platforms, doors).
    Kinematic,
    /// Fully simulated.
    #[default]
    Dynamic,
}

/// Rigid body descriptor. Attach together with [`Collider`] and
/// [`Transform`](crate::components::Transform) to give an entity physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    /// Body kind.
    pub kind: BodyKind,
    /// Advisory mass in kg. The native engine derives effective mass from
    /// collider density; this field is not fed to the solver.
    pub mass: f32,
    /// Linear velocity damping (0 = none).
    pub linear_damping: f32,
    /// Angular velocity damping (0 = none).
    pub angular_damping: f32,
    /// Gravity multiplier (1 = full gravity, 0 = weightless).
    pub gravity_scale: f32,
    /// Lock rotation entirely (upright characters).
    pub fixed_rotation: bool,
    /// Allow the body to sleep when inactive.
    pub allow_sleep: bool,
    /// Continuous collision detection for fast movers.
    pub bullet: bool,
    /// Initial linear velocity in pixels/second.
    pub linear_velocity: Vec2,
    /// Initial angular velocity in radians/second.
    pub angular_velocity: f32,
    /// Handle of the native body, absent until the integration system
    /// creates one. Never serialized; handles are process-local.
    #[serde(skip)]
    pub handle: Option<RigidBodyHandle>,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            mass: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            fixed_rotation: false,
            allow_sleep: true,
            bullet: false,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            handle: None,
        }
    }
}

impl RigidBody {
    /// A static body (walls, floors).
    pub fn new_static() -> Self {
        Self {
            kind: BodyKind::Static,
            mass: 0.0,
            ..Self::default()
        }
    }

    /// A kinematic body (platforms, doors).
    pub fn new_kinematic() -> Self {
        Self {
            kind: BodyKind::Kinematic,
            mass: 0.0,
            ..Self::default()
        }
    }

    /// A dynamic body with the given advisory mass.
    pub fn new_dynamic(mass: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            mass,
            ..Self::default()
        }
    }

    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    pub fn is_kinematic(&self) -> bool {
        self.kind == BodyKind::Kinematic
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    /// Whether a native body exists for this component.
    pub fn has_body(&self) -> bool {
        self.handle.is_some()
    }
}

// ---------------------------------------------------------------------------
// Collider
// ---------------------------------------------------------------------------

/// Collider geometry, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    /// Axis-aligned rectangle, full width/height in pixels.
    Box { width: f32, height: f32 },
    /// Circle with radius in pixels.
    Circle { radius: f32 },
    /// Convex polygon, 3 to [`MAX_POLYGON_VERTICES`] vertices relative to
    /// the body center, counter-clockwise. Invalid vertex counts degrade to
    /// a unit box at creation time.
    Polygon { vertices: Vec<Vec2> },
}

/// Box2D-style category/mask/group collision filter.
///
/// Two shapes interact when the group rule does not decide first:
/// equal nonzero `group` values force interaction when positive and forbid
/// it when negative; otherwise both category/mask tests must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    /// Category bits of this shape.
    pub category: u16,
    /// Categories this shape accepts contact with.
    pub mask: u16,
    /// Group override index; 0 disables the override.
    pub group: i16,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            category: 0x0001,
            mask: 0xFFFF,
            group: 0,
        }
    }
}

impl CollisionFilter {
    /// Whether shapes carrying `self` and `other` interact.
    pub fn should_collide(&self, other: &CollisionFilter) -> bool {
        if self.group != 0 && self.group == other.group {
            return self.group > 0;
        }
        (self.category & other.mask) != 0 && (other.category & self.mask) != 0
    }
}

/// Collider descriptor, paired with [`RigidBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    /// Shape geometry.
    pub shape: ColliderShape,
    /// Shape offset from the body center, in pixels.
    pub offset: Vec2,
    /// Material density in kg/m^2 (drives native mass).
    pub density: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution (bounciness), 0..=1.
    pub restitution: f32,
    /// Sensor shapes report overlaps but produce no physical response.
    pub sensor: bool,
    /// Collision filtering.
    pub filter: CollisionFilter,
}

impl Default for Collider {
    /// One-tile box collider.
    fn default() -> Self {
        Self {
            shape: ColliderShape::Box {
                width: TILE_SIZE,
                height: TILE_SIZE,
            },
            offset: Vec2::ZERO,
            density: 1.0,
            friction: 0.3,
            restitution: 0.0,
            sensor: false,
            filter: CollisionFilter::default(),
        }
    }
}

impl Collider {
    /// Box collider with full pixel dimensions.
    pub fn new_box(width: f32, height: f32) -> Self {
        Self {
            shape: ColliderShape::Box { width, height },
            ..Self::default()
        }
    }

    /// Circle collider with a pixel radius.
    pub fn new_circle(radius: f32) -> Self {
        Self {
            shape: ColliderShape::Circle { radius },
            ..Self::default()
        }
    }

    /// Convex polygon collider from center-relative pixel vertices.
    pub fn new_polygon(vertices: Vec<Vec2>) -> Self {
        Self {
            shape: ColliderShape::Polygon { vertices },
            ..Self::default()
        }
    }

    /// Box collider sized in whole tiles.
    pub fn from_tiles(width_tiles: u32, height_tiles: u32) -> Self {
        Self::new_box(
            width_tiles as f32 * TILE_SIZE,
            height_tiles as f32 * TILE_SIZE,
        )
    }

    /// Mark the collider as a sensor.
    pub fn sensor(mut self) -> Self {
        self.sensor = true;
        self
    }

    /// Replace the collision filter.
    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Whether a polygon shape has a usable vertex count.
    pub fn polygon_is_valid(&self) -> bool {
        match &self.shape {
            ColliderShape::Polygon { vertices } => {
                (3..=MAX_POLYGON_VERTICES).contains(&vertices.len())
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
