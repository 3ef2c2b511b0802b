//! # Error Types
//!
//! All errors that can be surfaced by the ECS runtime and its scheduler.
//!
//! Lookup misses inside processing code are not errors: they come back as
//! `None`. Everything here is either allocator corruption, a configuration
//! bug in the composing code, or a failure reported by a worker pool.

use crate::ecs::Entity;
use thiserror::Error;

/// Errors that can occur in the ECS runtime.
#[derive(Error, Debug)]
pub enum EcsError {
    /// The identifier is already sitting in the free pool.
    ///
    /// This means the allocator has been corrupted and is not recoverable.
    #[error("double free of {0}: identifier already in the free pool")]
    DoubleFree(Entity),

    /// The identifier was never issued by this allocator.
    #[error("unknown entity: {0}")]
    UnknownEntity(Entity),

    /// The invalid sentinel cannot own components.
    #[error("{0} is not a valid component owner")]
    InvalidEntity(Entity),

    /// The entity was deleted or never created by this world.
    #[error("{0} is not alive")]
    DeadEntity(Entity),

    /// No system is registered under this name.
    #[error("unknown system: {0}")]
    UnknownSystem(String),

    /// No job is registered under this name.
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// A system exists under this name but with other component or processing types.
    #[error("system '{name}' is registered with different component or processing types")]
    SystemKindMismatch {
        /// Name of the offending system.
        name: String,
    },

    /// The job was stopped and its workers have exited.
    #[error("job '{0}' is stopped")]
    JobStopped(String),

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker for job '{job}': {source}")]
    WorkerSpawn {
        /// Job the worker belonged to.
        job: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// One or more chunks panicked while the job was executing.
    #[error("job '{job}': processing panicked in {systems:?}")]
    ProcessingPanicked {
        /// Job that was executing.
        job: String,
        /// Systems whose chunks panicked, in worker order.
        systems: Vec<String>,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
