//! # Systems
//!
//! A system pairs the storage of one component kind with the processing
//! that runs over it, plus named links to other systems.
//!
//! The world stores systems type-erased behind [`AnySystem`] so that jobs
//! can partition and run systems of unrelated component kinds together.
//! Typed access goes through [`System`].

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

use super::component::{ComponentData, ComponentHandle, Quantity};
use super::entity::Entity;
use super::processing::{Chunk, LinkedSystems, Processing};
use super::storage::ComponentStorage;
use crate::error::{EcsError, EcsResult};

/// Shared, type-erased reference to a registered system.
pub type SystemRef = Arc<dyn AnySystem>;

/// Type-erased view of a system, as seen by jobs and the world.
pub trait AnySystem: Send + Sync + 'static {
    /// Name of the system.
    fn name(&self) -> &str;

    /// Whether the scheduler may split this system across workers.
    fn is_multithreadable(&self) -> bool;

    /// Number of components in storage.
    fn component_count(&self) -> usize;

    /// Runs processing over storage indices `[from, to)`.
    ///
    /// Returns the entities flagged for removal.
    fn process(&self, from: usize, to: usize) -> Vec<Entity>;

    /// Runs the delete hook, then purges every component of `entity`.
    fn delete(&self, entity: Entity);

    /// Adds a directed link to `other`, keyed by its name.
    fn link(&self, other: &SystemRef);

    /// Removes the link named `name`. Returns whether it existed.
    fn unlink(&self, name: &str) -> bool;

    /// Names of linked systems.
    fn linked_names(&self) -> Vec<String>;

    /// Logs the system's content at debug level.
    fn debug(&self);

    /// The component storage, for downcasting to `ComponentStorage<C>`.
    fn storage_any(&self) -> Arc<dyn Any + Send + Sync>;

    /// The system itself, for downcasting to `System<C, P>`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A system over component kind `C` driven by processing `P`.
pub struct System<C, P> {
    name: String,
    quantity: Quantity,
    multithreadable: AtomicBool,
    storage: Arc<ComponentStorage<C>>,
    processing: RwLock<P>,
    linked: RwLock<LinkedSystems>,
}

impl<C: ComponentData, P: Processing<C>> System<C, P> {
    /// Creates a multithreadable system with empty storage.
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: Quantity, processing: P) -> Self {
        Self {
            name: name.into(),
            quantity,
            multithreadable: AtomicBool::new(true),
            storage: Arc::new(ComponentStorage::new()),
            processing: RwLock::new(processing),
            linked: RwLock::new(LinkedSystems::default()),
        }
    }

    /// Builder-style variant of [`System::set_multithreadable`].
    #[must_use]
    pub fn multithreadable(self, flag: bool) -> Self {
        self.set_multithreadable(flag);
        self
    }

    /// Sets whether the scheduler may split this system across workers.
    pub fn set_multithreadable(&self, flag: bool) {
        self.multithreadable.store(flag, Ordering::Relaxed);
    }

    /// The quantity policy of this system's component kind.
    #[must_use]
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Creates a default component for `entity`, honoring the quantity policy.
    ///
    /// Under [`Quantity::One`] an existing component is returned unchanged.
    ///
    /// Liveness is not checked: a component created here for a deleted
    /// entity outlives it and passes to whoever reuses the identifier. Use
    /// [`World::create_component`](crate::World::create_component) when the
    /// entity may be dead.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] for [`Entity::INVALID`].
    pub fn create(&self, entity: Entity) -> EcsResult<ComponentHandle<C>> {
        self.create_with(entity, C::default())
    }

    /// Like [`System::create`], with explicit initial data.
    ///
    /// Under [`Quantity::One`], `data` is discarded if the entity already
    /// owns a component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] for [`Entity::INVALID`].
    pub fn create_with(&self, entity: Entity, data: C) -> EcsResult<ComponentHandle<C>> {
        if !entity.is_valid() {
            return Err(EcsError::InvalidEntity(entity));
        }
        Ok(match self.quantity {
            Quantity::One => self.storage.first_or_create_with(entity, || data),
            Quantity::Many => self.storage.create_with(entity, data),
        })
    }

    /// First component owned by `entity`, or `None`.
    #[must_use]
    pub fn component_for(&self, entity: Entity) -> Option<ComponentHandle<C>> {
        self.storage.first_for(entity)
    }

    /// Every component owned by `entity`.
    #[must_use]
    pub fn all_components_for(&self, entity: Entity) -> Vec<ComponentHandle<C>> {
        self.storage.components_for(entity)
    }

    /// Every component in storage, in insertion order.
    ///
    /// Holds the storage read lock; creating or deleting components on this
    /// system blocks until the guard is dropped.
    pub fn components(&self) -> MappedRwLockReadGuard<'_, [ComponentHandle<C>]> {
        self.storage.all_components()
    }

    /// The component storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<ComponentStorage<C>> {
        &self.storage
    }

    /// Shared access to the processing.
    pub fn processing(&self) -> RwLockReadGuard<'_, P> {
        self.processing.read()
    }

    /// Hands configuration to the processing after construction.
    ///
    /// Blocks while a job is running this system.
    pub fn configure<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.processing.write())
    }
}

impl<C: ComponentData, P: Processing<C>> AnySystem for System<C, P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_multithreadable(&self) -> bool {
        self.multithreadable.load(Ordering::Relaxed)
    }

    fn component_count(&self) -> usize {
        self.storage.len()
    }

    fn process(&self, from: usize, to: usize) -> Vec<Entity> {
        let components = self.storage.all_components();
        let to = to.min(components.len());
        let from = from.min(to);

        let linked = self.linked.read();
        let chunk = Chunk::new(&components[from..to], from..to, &linked);
        self.processing.read().run(chunk)
    }

    fn delete(&self, entity: Entity) {
        self.processing.read().on_delete(entity);
        let removed = self.storage.delete(entity);
        tracing::trace!(system = %self.name, %entity, removed, "purged components");
    }

    fn link(&self, other: &SystemRef) {
        self.linked.write().insert(other);
    }

    fn unlink(&self, name: &str) -> bool {
        self.linked.write().remove(name)
    }

    fn linked_names(&self) -> Vec<String> {
        self.linked.read().names().map(str::to_owned).collect()
    }

    fn debug(&self) {
        let components = self.storage.all_components();
        tracing::debug!(
            system = %self.name,
            count = components.len(),
            multithreadable = self.is_multithreadable(),
            linked = ?self.linked_names(),
            "system"
        );
        for component in components.iter() {
            tracing::debug!(system = %self.name, owner = %component.entity(), "component");
        }
    }

    fn storage_any(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.storage) as Arc<dyn Any + Send + Sync>
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<C, P> fmt::Debug for System<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("quantity", &self.quantity)
            .field("multithreadable", &self.multithreadable.load(Ordering::Relaxed))
            .field("linked", &*self.linked.read())
            .finish_non_exhaustive()
    }
}
