//! Core components shared across subsystems.
//!
//! [`Transform`] is the canonical pose used by rendering, tile logic, and
//! physics alike. It lives in pixel space with the position measured at the
//! sprite's bottom-left anchor and the rotation in degrees; the physics
//! layer converts to and from the native engine's center-of-mass meters at
//! its own boundary.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// Plain 2D vector. Components keep their math types dependency-free; the
/// physics boundary converts to the native engine's vectors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// Zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Pixel-space pose of an entity.
///
/// `x`/`y` locate the bottom-left visual anchor; `rotation` is in degrees.
/// The physics synchronization step writes this component for non-static
/// bodies but does not own it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// Horizontal position in pixels (bottom-left anchor).
    pub x: f32,
    /// Vertical position in pixels (bottom-left anchor).
    pub y: f32,
    /// Rotation in degrees.
    pub rotation: f32,
}

impl Transform {
    pub const fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            rotation: 0.0,
        }
    }

    pub const fn with_rotation(x: f32, y: f32, rotation: f32) -> Self {
        Self { x, y, rotation }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
