//! The [`Registry`] owns the entity allocator and all component storage.
//!
//! Components live in per-type ordered maps keyed by [`Entity`], so iteration
//! order is deterministic -- systems that mirror registry contents into an
//! external engine (physics body creation, for one) see the same order on
//! every run.
//!
//! # Lifecycle tracking
//!
//! Systems that shadow components with external resources need to know when a
//! component appears or disappears. Calling [`Registry::track`] for a type
//! starts recording: [`Registry::drain_added`] yields entities whose component
//! was inserted since the last drain, and [`Registry::drain_removed`] yields
//! `(Entity, T)` pairs for removals -- the removed value travels with the
//! event, so a consumer can still reach handles stored inside the component
//! after the entity itself is gone.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::entity::{Entities, Entity};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker bound for component types. Blanket-implemented; any clonable,
/// thread-safe `'static` type qualifies.
pub trait Component: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Component for T {}

// ---------------------------------------------------------------------------
// Typed storage
// ---------------------------------------------------------------------------

struct Store<T: Component> {
    data: BTreeMap<Entity, T>,
    tracked: bool,
    added: Vec<Entity>,
    removed: Vec<(Entity, T)>,
}

impl<T: Component> Store<T> {
    fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            tracked: false,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    fn record_removal(&mut self, entity: Entity, value: T) -> Option<T> {
        if self.tracked {
            self.removed.push((entity, value.clone()));
        }
        Some(value)
    }
}

/// Object-safe view of a [`Store`], used for the despawn sweep across all
/// component types.
trait AnyStore: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn sweep(&mut self, entity: Entity);
}

impl<T: Component> AnyStore for Store<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn sweep(&mut self, entity: Entity) {
        if let Some(value) = self.data.remove(&entity) {
            self.record_removal(entity, value);
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Entity-keyed component store with generational liveness and per-type
/// lifecycle tracking.
#[derive(Default)]
pub struct Registry {
    entities: Entities,
    stores: HashMap<TypeId, Box<dyn AnyStore>>,
}

impl Registry {
    /// New empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -- entities -----------------------------------------------------------

    /// Allocate a new live entity.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.spawn();
        trace!(%entity, "spawned entity");
        entity
    }

    /// Despawn an entity, removing every component it holds. Removals are
    /// recorded for tracked component types. Returns `false` for dead or
    /// stale handles.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.contains(entity) {
            return false;
        }
        for store in self.stores.values_mut() {
            store.sweep(entity);
        }
        self.entities.despawn(entity);
        trace!(%entity, "despawned entity");
        true
    }

    /// Whether `entity` is alive with a current generation.
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -- components ---------------------------------------------------------

    /// Insert a component, replacing and returning any previous value.
    ///
    /// A fresh insertion (no previous value) is recorded as an addition when
    /// the type is tracked; a replacement is not -- the external shadow of
    /// the component already exists.
    pub fn insert<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<Option<T>, EcsError> {
        if !self.entities.contains(entity) {
            return Err(EcsError::DeadEntity { entity });
        }
        let store = self.store_mut::<T>();
        let previous = store.data.insert(entity, value);
        if previous.is_none() && store.tracked {
            store.added.push(entity);
        }
        Ok(previous)
    }

    /// Remove and return a component. Recorded for tracked types.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let store = self.stores.get_mut(&TypeId::of::<T>())?;
        let store = store
            .as_any_mut()
            .downcast_mut::<Store<T>>()
            .expect("store type mismatch");
        let value = store.data.remove(&entity)?;
        store.record_removal(entity, value)
    }

    /// Shared access to a component.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store::<T>()?.data.get(&entity)
    }

    /// Exclusive access to a component.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.stores
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Store<T>>()
            .expect("store type mismatch")
            .data
            .get_mut(&entity)
    }

    /// Whether the entity holds a `T`.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Iterate `(Entity, &T)` in deterministic (entity-ordered) order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.store::<T>()
            .into_iter()
            .flat_map(|store| store.data.iter().map(|(e, v)| (*e, v)))
    }

    /// Entities holding a `T`, in deterministic order.
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.iter::<T>().map(|(e, _)| e).collect()
    }

    /// Number of stored `T` components.
    pub fn count<T: Component>(&self) -> usize {
        self.store::<T>().map_or(0, |s| s.data.len())
    }

    // -- lifecycle tracking -------------------------------------------------

    /// Start recording insertions and removals of `T`. Events before this
    /// call are not recorded.
    pub fn track<T: Component>(&mut self) {
        self.store_mut::<T>().tracked = true;
    }

    /// Drain entities whose `T` was inserted since the last drain.
    ///
    /// Entities may have died since insertion; callers revalidate with
    /// [`Registry::contains`].
    pub fn drain_added<T: Component>(&mut self) -> Vec<Entity> {
        match self.stores.get_mut(&TypeId::of::<T>()) {
            Some(store) => std::mem::take(
                &mut store
                    .as_any_mut()
                    .downcast_mut::<Store<T>>()
                    .expect("store type mismatch")
                    .added,
            ),
            None => Vec::new(),
        }
    }

    /// Drain `(Entity, T)` pairs removed since the last drain (explicit
    /// removals and despawn sweeps alike).
    pub fn drain_removed<T: Component>(&mut self) -> Vec<(Entity, T)> {
        match self.stores.get_mut(&TypeId::of::<T>()) {
            Some(store) => std::mem::take(
                &mut store
                    .as_any_mut()
                    .downcast_mut::<Store<T>>()
                    .expect("store type mismatch")
                    .removed,
            ),
            None => Vec::new(),
        }
    }

    // -- internals ----------------------------------------------------------

    fn store<T: Component>(&self) -> Option<&Store<T>> {
        self.stores
            .get(&TypeId::of::<T>())
            .map(|s| s.as_any().downcast_ref::<Store<T>>().expect("store type mismatch"))
    }

    fn store_mut<T: Component>(&mut self) -> &mut Store<T> {
        self.stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Store::<T>::new()))
            .as_any_mut()
            .downcast_mut::<Store<T>>()
            .expect("store type mismatch")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
