//! # Component Storage
//!
//! Insertion-ordered storage for every component of one kind.
//!
//! The storage guarantees:
//! - Creation appends; existing indices never move on create
//! - Deletion by entity is a stable filter (survivors keep relative order)
//! - Filtering by entity is a linear scan
//!
//! Index positions are the partition key the job scheduler hands to
//! workers, so they must not change while a job touching this storage is
//! executing. Structural mutation takes the write lock; workers hold the
//! read lock for the duration of their chunk.

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::sync::Arc;

use super::component::{Component, ComponentData, ComponentHandle};
use super::entity::Entity;

/// Storage for a single component kind.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentStorage, Entity};
///
/// let storage: ComponentStorage<u32> = ComponentStorage::new();
/// let e = Entity::from_raw(0);
/// storage.create(e);
/// assert_eq!(storage.components_for(e).len(), 1);
/// ```
pub struct ComponentStorage<C> {
    components: RwLock<Vec<ComponentHandle<C>>>,
}

impl<C: ComponentData> ComponentStorage<C> {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: RwLock::new(Vec::new()),
        }
    }

    /// Appends a default component for `entity` and returns it.
    pub fn create(&self, entity: Entity) -> ComponentHandle<C> {
        self.create_with(entity, C::default())
    }

    /// Appends a component with the given data for `entity` and returns it.
    ///
    /// The owner is not checked here; systems reject invalid owners before
    /// reaching storage.
    pub fn create_with(&self, entity: Entity, data: C) -> ComponentHandle<C> {
        let component = Arc::new(Component::new(entity, data));
        self.components.write().push(Arc::clone(&component));
        component
    }

    /// Returns the first component of `entity`, creating one from `data` if none exists.
    ///
    /// The lookup and the append happen under one write lock.
    pub fn first_or_create_with(
        &self,
        entity: Entity,
        data: impl FnOnce() -> C,
    ) -> ComponentHandle<C> {
        let mut components = self.components.write();
        if let Some(existing) = components.iter().find(|c| c.entity() == entity) {
            return Arc::clone(existing);
        }
        let component = Arc::new(Component::new(entity, data()));
        components.push(Arc::clone(&component));
        component
    }

    /// The full backing sequence, in creation order.
    ///
    /// The guard blocks structural mutation until dropped.
    pub fn all_components(&self) -> MappedRwLockReadGuard<'_, [ComponentHandle<C>]> {
        RwLockReadGuard::map(self.components.read(), Vec::as_slice)
    }

    /// All components owned by `entity`, in creation order.
    #[must_use]
    pub fn components_for(&self, entity: Entity) -> Vec<ComponentHandle<C>> {
        self.components
            .read()
            .iter()
            .filter(|c| c.entity() == entity)
            .cloned()
            .collect()
    }

    /// First component owned by `entity`, if any.
    #[must_use]
    pub fn first_for(&self, entity: Entity) -> Option<ComponentHandle<C>> {
        self.components
            .read()
            .iter()
            .find(|c| c.entity() == entity)
            .cloned()
    }

    /// Removes every component owned by `entity`.
    ///
    /// Returns the number of components removed.
    pub fn delete(&self, entity: Entity) -> usize {
        let mut components = self.components.write();
        let before = components.len();
        components.retain(|c| c.entity() != entity);
        before - components.len()
    }

    /// Number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    /// Whether the storage holds no component.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }
}

impl<C: ComponentData> Default for ComponentStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Tag(u8);

    #[test]
    fn test_create_appends_in_order() {
        let storage: ComponentStorage<Tag> = ComponentStorage::new();
        storage.create_with(Entity::from_raw(2), Tag(1));
        storage.create_with(Entity::from_raw(0), Tag(2));

        let all = storage.all_components();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entity(), Entity::from_raw(2));
        assert_eq!(all[1].entity(), Entity::from_raw(0));
    }

    #[test]
    fn test_components_for_filters() {
        let storage: ComponentStorage<Tag> = ComponentStorage::new();
        let a = Entity::from_raw(0);
        let b = Entity::from_raw(1);
        storage.create_with(a, Tag(1));
        storage.create_with(b, Tag(2));
        storage.create_with(a, Tag(3));

        let for_a: Vec<_> = storage.components_for(a).iter().map(|c| c.get()).collect();
        assert_eq!(for_a, vec![Tag(1), Tag(3)]);
        assert!(storage.components_for(Entity::from_raw(9)).is_empty());
        assert_eq!(storage.first_for(b).map(|c| c.get()), Some(Tag(2)));
    }

    #[test]
    fn test_delete_is_stable() {
        let storage: ComponentStorage<Tag> = ComponentStorage::new();
        let a = Entity::from_raw(0);
        let b = Entity::from_raw(1);
        for (owner, tag) in [(a, 1), (b, 2), (a, 3), (b, 4)] {
            storage.create_with(owner, Tag(tag));
        }

        assert_eq!(storage.delete(a), 2);
        let survivors: Vec<_> = storage.all_components().iter().map(|c| c.get()).collect();
        assert_eq!(survivors, vec![Tag(2), Tag(4)]);

        // Unknown owner is a no-op.
        assert_eq!(storage.delete(a), 0);
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_handle_outlives_removal() {
        let storage: ComponentStorage<Tag> = ComponentStorage::new();
        let e = Entity::from_raw(0);
        let handle = storage.create_with(e, Tag(5));
        storage.delete(e);
        assert!(storage.is_empty());
        assert_eq!(handle.get(), Tag(5));
        assert_eq!(handle.lock().0, 5);
    }
}
