//! Double-buffered transform handoff between the physics and main threads.
//!
//! Two map slots hold entity -> pose snapshots. At any instant one slot is
//! the *write* side (populated by the physics thread after each step) and the
//! other the *read* side (consumed by the main thread). [`TransformBuffer::swap_buffers`]
//! flips the roles under a short critical section and clears the fresh write
//! side, so an entity that stops being written (deactivated, destroyed)
//! cannot leak a stale pose into a later frame.
//!
//! Each slot has its own lock and the roles partition the threads: the write
//! slot is only ever touched by the physics thread, the read slot only by
//! the main thread, and the swap briefly holds both. Readers therefore see
//! poses that are at most one-or-more completed steps stale, never torn.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use loam_ecs::entity::Entity;
use loam_ecs::registry::Registry;

use crate::components::Transform;

// ---------------------------------------------------------------------------
// BufferedTransform
// ---------------------------------------------------------------------------

/// Pose snapshot stored per entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

impl From<&Transform> for BufferedTransform {
    fn from(t: &Transform) -> Self {
        Self {
            x: t.x,
            y: t.y,
            rotation: t.rotation,
        }
    }
}

// ---------------------------------------------------------------------------
// TransformBuffer
// ---------------------------------------------------------------------------

/// Two-slot entity -> pose buffer with an atomic role index.
#[derive(Debug, Default)]
pub struct TransformBuffer {
    slots: [Mutex<HashMap<Entity, BufferedTransform>>; 2],
    /// Index of the current write slot (0 or 1).
    write_index: AtomicUsize,
}

impl TransformBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pose in the write slot. Physics-thread side; never contends
    /// with readers, which only touch the other slot.
    pub fn write_transform(&self, entity: Entity, x: f32, y: f32, rotation: f32) {
        let write = self.write_index.load(Ordering::Acquire);
        self.slots[write]
            .lock()
            .insert(entity, BufferedTransform { x, y, rotation });
    }

    /// Swap the read/write roles and clear the new write slot (the side that
    /// was just read). Main-thread side, once per frame.
    pub fn swap_buffers(&self) {
        // Both slot locks are held for the flip and the clear, so no writer
        // or reader can observe a half-swapped state and no post-swap write
        // can be erased by the clear. Fixed 0-then-1 order.
        let mut slot0 = self.slots[0].lock();
        let mut slot1 = self.slots[1].lock();
        let new_write = 1 - self.write_index.load(Ordering::Acquire);
        self.write_index.store(new_write, Ordering::Release);
        if new_write == 0 {
            slot0.clear();
        } else {
            slot1.clear();
        }
    }

    /// Apply the read slot to the registry, overwriting each still-valid
    /// entity's [`Transform`]. Entities despawned since the snapshot are
    /// silently skipped.
    pub fn apply_to_registry(&self, registry: &mut Registry) {
        let read = 1 - self.write_index.load(Ordering::Acquire);
        let snapshot = self.slots[read].lock();
        for (&entity, pose) in snapshot.iter() {
            if !registry.contains(entity) {
                continue;
            }
            if let Some(transform) = registry.get_mut::<Transform>(entity) {
                transform.x = pose.x;
                transform.y = pose.y;
                transform.rotation = pose.rotation;
            }
        }
    }

    /// Purge an entity from both slots. A snapshot may be in flight on the
    /// just-swapped side, so both must be cleaned.
    pub fn remove_entity(&self, entity: Entity) {
        self.slots[0].lock().remove(&entity);
        self.slots[1].lock().remove(&entity);
    }

    /// Empty both slots.
    pub fn clear(&self) {
        self.slots[0].lock().clear();
        self.slots[1].lock().clear();
    }

    /// Pre-size both slots.
    pub fn reserve(&self, capacity: usize) {
        self.slots[0].lock().reserve(capacity);
        self.slots[1].lock().reserve(capacity);
    }

    /// Entries currently in the write slot.
    pub fn write_len(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        self.slots[write].lock().len()
    }

    /// Entries currently in the read slot.
    pub fn read_len(&self) -> usize {
        let read = 1 - self.write_index.load(Ordering::Acquire);
        self.slots[read].lock().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
