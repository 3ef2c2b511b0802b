//! # Processing Contract
//!
//! A [`Processing`] is the behavior a system runs over a contiguous index
//! range of its own storage. The scheduler calls it from several worker
//! threads at once, each with a disjoint range, so implementations take
//! `&self` and must only touch the components in their [`Chunk`] plus
//! whatever they read through linked systems.
//!
//! Anything outside partitioned storage (a shared drawing surface, a log
//! sink) must be guarded by a lock the processing acquires itself.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Weak};

use super::component::{ComponentData, ComponentHandle};
use super::entity::Entity;
use super::storage::ComponentStorage;
use super::system::{AnySystem, SystemRef};

/// Behavior invoked by a system over one index range.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Chunk, Entity, Processing};
///
/// #[derive(Default)]
/// struct Lifetime(u32);
///
/// struct Expire;
///
/// impl Processing<Lifetime> for Expire {
///     fn run(&self, chunk: Chunk<'_, Lifetime>) -> Vec<Entity> {
///         let mut expired = Vec::new();
///         for component in chunk.components() {
///             let mut life = component.lock();
///             life.0 = life.0.saturating_sub(1);
///             if life.0 == 0 {
///                 expired.push(component.entity());
///             }
///         }
///         expired
///     }
/// }
/// ```
pub trait Processing<C: ComponentData>: Send + Sync + 'static {
    /// Processes `chunk` and returns the entities to remove from the world.
    fn run(&self, chunk: Chunk<'_, C>) -> Vec<Entity>;

    /// Called before the components of `entity` are purged.
    fn on_delete(&self, _entity: Entity) {}
}

impl<C, F> Processing<C> for F
where
    C: ComponentData,
    F: Fn(Chunk<'_, C>) -> Vec<Entity> + Send + Sync + 'static,
{
    fn run(&self, chunk: Chunk<'_, C>) -> Vec<Entity> {
        (self)(chunk)
    }
}

/// Processing that does nothing. For systems that only hold data read by others.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passive;

impl<C: ComponentData> Processing<C> for Passive {
    fn run(&self, _chunk: Chunk<'_, C>) -> Vec<Entity> {
        Vec::new()
    }
}

/// The slice of storage a processing may touch during one call.
pub struct Chunk<'a, C> {
    components: &'a [ComponentHandle<C>],
    range: Range<usize>,
    linked: &'a LinkedSystems,
}

impl<'a, C: ComponentData> Chunk<'a, C> {
    pub(crate) fn new(
        components: &'a [ComponentHandle<C>],
        range: Range<usize>,
        linked: &'a LinkedSystems,
    ) -> Self {
        debug_assert_eq!(components.len(), range.len());
        Self {
            components,
            range,
            linked,
        }
    }

    /// Components in `[from, to)`.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &'a [ComponentHandle<C>] {
        self.components
    }

    /// Index range into the system's full storage.
    #[inline]
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Systems this system has linked to, for cross-kind lookups.
    #[inline]
    #[must_use]
    pub fn linked(&self) -> &'a LinkedSystems {
        self.linked
    }

    /// Number of components in the chunk.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the chunk is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Directed name → system references held by a system.
///
/// References are weak: the world owns its systems, so mutual links never
/// keep each other alive.
#[derive(Default)]
pub struct LinkedSystems {
    systems: BTreeMap<String, Weak<dyn AnySystem>>,
}

impl LinkedSystems {
    pub(crate) fn insert(&mut self, system: &SystemRef) {
        self.systems
            .insert(system.name().to_owned(), Arc::downgrade(system));
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        self.systems.remove(name).is_some()
    }

    /// The linked system named `name`, if linked and still alive.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SystemRef> {
        self.systems.get(name).and_then(Weak::upgrade)
    }

    /// Storage of the linked system `name`, if it holds components of kind `C`.
    #[must_use]
    pub fn storage<C: ComponentData>(&self, name: &str) -> Option<Arc<ComponentStorage<C>>> {
        self.get(name)?
            .storage_any()
            .downcast::<ComponentStorage<C>>()
            .ok()
    }

    /// First component of kind `C` owned by `entity` in the linked system `name`.
    #[must_use]
    pub fn component_for<C: ComponentData>(
        &self,
        name: &str,
        entity: Entity,
    ) -> Option<ComponentHandle<C>> {
        self.storage::<C>(name)?.first_for(entity)
    }

    /// Whether a system named `name` is linked.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.systems.contains_key(name)
    }

    /// Names of linked systems, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.systems.keys().map(String::as_str)
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether there are no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl fmt::Debug for LinkedSystems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.systems.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_exposes_range() {
        let storage: ComponentStorage<u8> = ComponentStorage::new();
        for id in 0..4 {
            storage.create_with(Entity::from_raw(id), 0);
        }
        let linked = LinkedSystems::default();
        let all = storage.all_components();
        let chunk = Chunk::new(&all[1..3], 1..3, &linked);

        assert_eq!(chunk.range(), 1..3);
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.components()[0].entity(), Entity::from_raw(1));
        assert!(chunk.linked().is_empty());
    }

    #[test]
    fn test_closure_processing() {
        let storage: ComponentStorage<u8> = ComponentStorage::new();
        storage.create_with(Entity::from_raw(0), 1);
        storage.create_with(Entity::from_raw(1), 0);
        let linked = LinkedSystems::default();

        let zeroes = |chunk: Chunk<'_, u8>| -> Vec<Entity> {
            chunk
                .components()
                .iter()
                .filter(|c| *c.lock() == 0)
                .map(|c| c.entity())
                .collect()
        };

        let all = storage.all_components();
        let dropped = Processing::run(&zeroes, Chunk::new(&all, 0..2, &linked));
        assert_eq!(dropped, vec![Entity::from_raw(1)]);
    }

    #[test]
    fn test_missing_link_is_none() {
        let linked = LinkedSystems::default();
        assert!(linked.get("position").is_none());
        assert!(linked.storage::<u8>("position").is_none());
        assert!(linked
            .component_for::<u8>("position", Entity::from_raw(0))
            .is_none());
    }
}
