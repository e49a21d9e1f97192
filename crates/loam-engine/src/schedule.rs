//! Named system registry and single-threaded driver.
//!
//! Systems register under a stable name and run in declaration order. The
//! name doubles as the lookup key -- callers fetch a system by tag rather
//! than by runtime type, so no downcasting is involved in cross-system
//! wiring. This is the single-threaded way to drive the simulation; the
//! physics worker in [`physics::thread`](crate::physics::thread) is the
//! threaded one.

use loam_ecs::registry::Registry;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A simulation system driven by the schedule.
pub trait System {
    /// Stable registry tag, unique within a schedule.
    fn name(&self) -> &str;

    /// Advance the system by `dt` seconds of frame time.
    fn update(&mut self, registry: &mut Registry, dt: f32);
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Runs registered systems in declaration order.
#[derive(Default)]
pub struct Schedule {
    systems: Vec<Box<dyn System>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system. Execution order is registration order.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, system: Box<dyn System>) {
        assert!(
            !self.systems.iter().any(|s| s.name() == system.name()),
            "duplicate system name: {:?}",
            system.name()
        );
        self.systems.push(system);
    }

    /// Run every system once with the given frame delta.
    pub fn run(&mut self, registry: &mut Registry, dt: f32) {
        for system in &mut self.systems {
            system.update(registry, dt);
        }
    }

    /// Look up a system by its tag.
    pub fn system(&self, name: &str) -> Option<&dyn System> {
        self.systems
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    /// Look up a system by its tag, mutably.
    pub fn system_mut(&mut self, name: &str) -> Option<&mut (dyn System + 'static)> {
        self.systems
            .iter_mut()
            .find(|s| s.name() == name)
            .map(|s| s.as_mut())
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether the schedule is empty.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Registered names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
