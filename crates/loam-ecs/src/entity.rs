//! Entity identifiers and allocation.
//!
//! An [`Entity`] is a 64-bit handle packing a *generation* counter in the
//! high 32 bits and a slot *index* in the low 32 bits. Despawning bumps the
//! slot's generation, so any handle held past the despawn goes stale and is
//! rejected by every registry operation instead of aliasing a newer entity.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`. The raw `u64` form is exposed
/// because the physics layer stamps entities into the native engine's
/// user-data channel and needs a stable round-trippable integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// Build an entity handle from a slot index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// Slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` form.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from its raw `u64` form.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}:{})", self.index(), self.generation())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// Entities (allocator)
// ---------------------------------------------------------------------------

/// Allocates and recycles [`Entity`] handles.
///
/// Freed indices sit in a FIFO queue so recycling is spread across slots
/// rather than hammering one hot index with generation bumps.
#[derive(Debug, Default)]
pub struct Entities {
    /// Current generation per slot.
    generations: Vec<u32>,
    /// Liveness per slot.
    alive: Vec<bool>,
    /// Recyclable slot indices, oldest first.
    free: VecDeque<u32>,
}

impl Entities {
    /// New empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entity, recycling a freed slot when one is available.
    pub fn spawn(&mut self) -> Entity {
        if let Some(index) = self.free.pop_front() {
            // Generation was already bumped when the slot was freed.
            self.alive[index as usize] = true;
            Entity::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            Entity::new(index, 0)
        }
    }

    /// Free an entity, bumping its slot generation so outstanding handles
    /// become stale. Returns `false` for dead or stale handles.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        if idx >= self.generations.len()
            || self.generations[idx] != entity.generation()
            || !self.alive[idx]
        {
            return false;
        }
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free.push_back(entity.index());
        true
    }

    /// Whether `entity` is alive with a current generation.
    pub fn contains(&self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        idx < self.generations.len()
            && self.alive[idx]
            && self.generations[idx] == entity.generation()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Whether no entities are alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
