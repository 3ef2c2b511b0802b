//! # ECS World
//!
//! The root owner of entities, systems and jobs.
//!
//! A frame is one call to [`World::run`]: jobs execute in registration
//! order and every entity a job flags for removal is deleted before the
//! next job starts.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::component::{ComponentData, ComponentHandle, Quantity};
use super::entity::{Entity, EntityAllocator};
use super::processing::Processing;
use super::system::{AnySystem, System, SystemRef};
use crate::config::EcsConfig;
use crate::error::{EcsError, EcsResult};
use crate::sched::{Job, JobOptions};

/// The ECS World - container for all simulation state.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Chunk, Entity, Quantity, World};
///
/// let mut world = World::new();
/// let decay = |chunk: Chunk<'_, u32>| -> Vec<Entity> {
///     chunk
///         .components()
///         .iter()
///         .filter(|c| {
///             let mut ttl = c.lock();
///             *ttl = ttl.saturating_sub(1);
///             *ttl == 0
///         })
///         .map(|c| c.entity())
///         .collect()
/// };
/// let ttl = world.register_system::<u32, _>("ttl", Quantity::One, decay)?;
/// world.add_job("logic", &["ttl"], 2)?;
///
/// let e = world.create_entity();
/// ttl.create_with(e, 1)?;
/// world.run()?;
/// assert!(!world.is_alive(e));
/// # Ok::<(), tessera_core::EcsError>(())
/// ```
pub struct World {
    /// Identifier allocator, owned by this world only.
    allocator: EntityAllocator,
    /// Live entities in creation order.
    entities: Vec<Entity>,
    /// Registered systems by name.
    systems: BTreeMap<String, SystemRef>,
    /// Jobs in registration order, which is also run order.
    jobs: Vec<Job>,
    /// Defaults for jobs and worker threads.
    config: EcsConfig,
}

impl World {
    /// Creates an empty world with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EcsConfig::default())
    }

    /// Creates an empty world.
    #[must_use]
    pub fn with_config(config: EcsConfig) -> Self {
        Self {
            allocator: EntityAllocator::new(),
            entities: Vec::new(),
            systems: BTreeMap::new(),
            jobs: Vec::new(),
            config,
        }
    }

    /// The configuration this world was built with.
    #[must_use]
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity, reusing a freed identifier if available.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.create();
        self.entities.push(entity);
        entity
    }

    /// Live entities in creation order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Checks if an entity is alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_valid(entity)
    }

    /// The entity allocator.
    #[must_use]
    pub fn allocator(&self) -> &EntityAllocator {
        &self.allocator
    }

    /// Deletes an entity and every component attached to it.
    ///
    /// Each system's delete hook runs before its storage is purged. Unknown
    /// or already deleted entities are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DoubleFree`] if the allocator is corrupted.
    pub fn delete(&mut self, entity: Entity) -> EcsResult<()> {
        if !self.allocator.is_valid(entity) {
            return Ok(());
        }

        for system in self.systems.values() {
            system.delete(entity);
        }
        self.allocator.free(entity)?;

        if let Some(position) = self.entities.iter().position(|e| *e == entity) {
            self.entities.remove(position);
        }
        tracing::trace!(%entity, "entity deleted");
        Ok(())
    }

    /// Deletes every live entity.
    ///
    /// # Errors
    ///
    /// Propagates [`World::delete`] errors.
    pub fn clear(&mut self) -> EcsResult<()> {
        while let Some(&entity) = self.entities.first() {
            self.delete(entity)?;
        }
        Ok(())
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Returns the system `name`, creating it if it does not exist.
    ///
    /// When the system already exists, `quantity` and `processing` are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemKindMismatch`] if `name` is registered with
    /// other component or processing types.
    pub fn register_system<C, P>(
        &mut self,
        name: &str,
        quantity: Quantity,
        processing: P,
    ) -> EcsResult<Arc<System<C, P>>>
    where
        C: ComponentData,
        P: Processing<C>,
    {
        if self.systems.contains_key(name) {
            return self.system_as(name);
        }
        self.insert_system(System::new(name, quantity, processing))
    }

    /// Registers a system built by the caller, or returns the existing one
    /// with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemKindMismatch`] if the name is registered
    /// with other component or processing types.
    pub fn insert_system<C, P>(&mut self, system: System<C, P>) -> EcsResult<Arc<System<C, P>>>
    where
        C: ComponentData,
        P: Processing<C>,
    {
        let name = system.name().to_owned();
        if self.systems.contains_key(&name) {
            return self.system_as(&name);
        }

        let system = Arc::new(system);
        self.systems.insert(name, Arc::clone(&system) as SystemRef);
        Ok(system)
    }

    /// Looks up a system by name.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if no system has that name.
    pub fn system(&self, name: &str) -> EcsResult<SystemRef> {
        self.systems
            .get(name)
            .cloned()
            .ok_or_else(|| EcsError::UnknownSystem(name.to_owned()))
    }

    /// Looks up a system by name with its concrete types.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownSystem`] if no system has that name.
    /// - [`EcsError::SystemKindMismatch`] if the types differ.
    pub fn system_as<C, P>(&self, name: &str) -> EcsResult<Arc<System<C, P>>>
    where
        C: ComponentData,
        P: Processing<C>,
    {
        self.system(name)?
            .into_any()
            .downcast::<System<C, P>>()
            .map_err(|_| EcsError::SystemKindMismatch {
                name: name.to_owned(),
            })
    }

    /// Creates a default component of `system` for a live entity.
    ///
    /// Under [`Quantity::One`] an existing component is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] for [`Entity::INVALID`].
    /// - [`EcsError::DeadEntity`] if `entity` is not alive in this world.
    pub fn create_component<C, P>(
        &self,
        system: &System<C, P>,
        entity: Entity,
    ) -> EcsResult<ComponentHandle<C>>
    where
        C: ComponentData,
        P: Processing<C>,
    {
        self.create_component_with(system, entity, C::default())
    }

    /// Like [`World::create_component`], with explicit initial data.
    ///
    /// # Errors
    ///
    /// As [`World::create_component`].
    pub fn create_component_with<C, P>(
        &self,
        system: &System<C, P>,
        entity: Entity,
        data: C,
    ) -> EcsResult<ComponentHandle<C>>
    where
        C: ComponentData,
        P: Processing<C>,
    {
        if entity.is_valid() && !self.allocator.is_valid(entity) {
            return Err(EcsError::DeadEntity(entity));
        }
        system.create_with(entity, data)
    }

    /// Registered systems, sorted by name.
    pub fn systems(&self) -> impl Iterator<Item = &SystemRef> {
        self.systems.values()
    }

    /// Links system `from` to system `to` so `from` can look `to` up while
    /// processing. Links are directed.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if either name is unregistered.
    pub fn link(&self, from: &str, to: &str) -> EcsResult<()> {
        let target = self.system(to)?;
        self.system(from)?.link(&target);
        Ok(())
    }

    /// Removes the link from `from` to `to`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `from` is unregistered.
    pub fn unlink(&self, from: &str, to: &str) -> EcsResult<bool> {
        Ok(self.system(from)?.unlink(to))
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Creates a job running the named systems with `thread_count` workers.
    ///
    /// Does nothing if a job with this name exists. A thread count of zero
    /// is clamped to one.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownSystem`] if a system name is unregistered.
    /// - [`EcsError::WorkerSpawn`] if a worker thread cannot be spawned.
    pub fn add_job<S: AsRef<str>>(
        &mut self,
        name: &str,
        system_names: &[S],
        thread_count: usize,
    ) -> EcsResult<()> {
        if self.jobs.iter().any(|job| job.name() == name) {
            return Ok(());
        }

        let systems = system_names
            .iter()
            .map(|system| self.system(system.as_ref()))
            .collect::<EcsResult<Vec<_>>>()?;

        let options = JobOptions {
            seed: self.config.rng_seed ^ self.jobs.len() as u64,
            thread_name_prefix: self.config.thread_name_prefix.clone(),
        };
        let job = Job::with_options(name, systems, thread_count, &options)?;
        self.jobs.push(job);
        Ok(())
    }

    /// Like [`World::add_job`] with the configured default thread count.
    ///
    /// # Errors
    ///
    /// As [`World::add_job`].
    pub fn add_job_default<S: AsRef<str>>(&mut self, name: &str, system_names: &[S]) -> EcsResult<()> {
        let threads = self.config.default_thread_count;
        self.add_job(name, system_names, threads)
    }

    /// Creates every job listed in the configuration, in file order.
    ///
    /// Call after all referenced systems are registered.
    ///
    /// # Errors
    ///
    /// As [`World::add_job`].
    pub fn apply_job_config(&mut self) -> EcsResult<()> {
        let jobs = self.config.jobs.clone();
        for job in &jobs {
            let threads = self.config.threads_for(job);
            self.add_job(&job.name, &job.systems, threads)?;
        }
        Ok(())
    }

    /// Looks up a job by name.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownJob`] if no job has that name.
    pub fn job(&self, name: &str) -> EcsResult<&Job> {
        self.jobs
            .iter()
            .find(|job| job.name() == name)
            .ok_or_else(|| EcsError::UnknownJob(name.to_owned()))
    }

    /// Looks up a job by name for direct execution.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownJob`] if no job has that name.
    pub fn job_mut(&mut self, name: &str) -> EcsResult<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|job| job.name() == name)
            .ok_or_else(|| EcsError::UnknownJob(name.to_owned()))
    }

    /// Jobs in run order.
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Advances one frame.
    ///
    /// Each job executes in registration order; its drop list is deleted
    /// before the next job starts.
    ///
    /// # Errors
    ///
    /// Stops at the first job that fails. A job whose chunks panicked still
    /// has its drop list drained before the error is returned.
    pub fn run(&mut self) -> EcsResult<()> {
        for index in 0..self.jobs.len() {
            let result = self.jobs[index].execute();
            let dropped = self.jobs[index].dropped().to_vec();

            for entity in dropped {
                self.delete(entity)?;
            }
            result?;
        }
        Ok(())
    }

    /// Stops every job's workers.
    pub fn stop(&self) {
        for job in &self.jobs {
            job.stop();
        }
    }

    /// Logs the world content at debug level.
    pub fn debug(&self) {
        tracing::debug!(
            live = ?self.entities,
            free = ?self.allocator.free_pool(),
            "entities"
        );
        for system in self.systems.values() {
            system.debug();
        }
        for job in &self.jobs {
            tracing::debug!(?job, "job");
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("systems", &self.systems.keys().collect::<Vec<_>>())
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}
