//! # Component Records
//!
//! A component is a data record owned by exactly one entity. The owner is
//! fixed at construction. The data sits behind its own lock so worker
//! threads holding disjoint index ranges can write concurrently.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::entity::Entity;

/// How many components of one kind a single entity may own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// At most one. Creating again returns the existing instance.
    #[default]
    One,
    /// Unlimited, e.g. stacked effects.
    Many,
}

/// Marker trait for component data.
///
/// Any `Default + Send + 'static` type qualifies; `Default` supplies the
/// value of a freshly created component.
pub trait ComponentData: Default + Send + 'static {}

impl<T: Default + Send + 'static> ComponentData for T {}

/// A component instance: owner plus data.
pub struct Component<C> {
    entity: Entity,
    data: Mutex<C>,
}

/// Shared handle to a component instance.
///
/// Two handles are the same instance iff [`Arc::ptr_eq`] holds.
pub type ComponentHandle<C> = Arc<Component<C>>;

impl<C: ComponentData> Component<C> {
    /// Creates a component owned by `entity`.
    #[must_use]
    pub fn new(entity: Entity, data: C) -> Self {
        Self {
            entity,
            data: Mutex::new(data),
        }
    }

    /// The owning entity.
    #[inline]
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Whether the owning entity identifier is a usable value.
    #[inline]
    #[must_use]
    pub fn has_valid_entity(&self) -> bool {
        self.entity.is_valid()
    }

    /// Locks the component data.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, C> {
        self.data.lock()
    }

    /// Locks the component data if no one else holds it.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, C>> {
        self.data.try_lock()
    }

    /// Consumes the handle's data if this is the last reference.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.data.into_inner()
    }
}

impl<C: ComponentData + Clone> Component<C> {
    /// Copies the data out.
    #[must_use]
    pub fn get(&self) -> C {
        self.data.lock().clone()
    }
}

impl<C: fmt::Debug> fmt::Debug for Component<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Component");
        dbg.field("entity", &self.entity);
        match self.data.try_lock() {
            Some(data) => dbg.field("data", &*data),
            None => dbg.field("data", &"<locked>"),
        };
        dbg.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Health(i32);

    #[test]
    fn test_owner_is_fixed() {
        let c = Component::new(Entity::from_raw(3), Health(10));
        assert_eq!(c.entity(), Entity::from_raw(3));
        assert!(c.has_valid_entity());
    }

    #[test]
    fn test_lock_mutates() {
        let c = Component::new(Entity::from_raw(0), Health(10));
        c.lock().0 -= 4;
        let held = c.lock();
        assert!(c.try_lock().is_none());
        drop(held);
        assert_eq!(c.get(), Health(6));
        assert_eq!(c.into_inner(), Health(6));
    }

    #[test]
    fn test_quantity_default() {
        assert_eq!(Quantity::default(), Quantity::One);
    }

    #[test]
    fn test_debug_shows_owner() {
        let c = Component::new(Entity::from_raw(1), Health(2));
        let text = format!("{c:?}");
        assert!(text.contains("Entity(1)"));
        assert!(text.contains("Health(2)"));
    }
}
