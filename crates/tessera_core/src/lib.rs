//! # TESSERA Core
//!
//! Entity Component System runtime with a parallel job scheduler:
//! - Dense entity identifiers, reused after deletion
//! - One insertion-ordered storage per component kind
//! - Jobs that split systems across fixed worker pools, one frame at a time
//!
//! ## Architecture Rules
//!
//! 1. **Structural mutation between jobs** - Entities flagged during a job are
//!    deleted after its barrier, before the next job starts
//! 2. **Disjoint ranges** - Workers never share a component index in one frame
//! 3. **No hidden globals** - Each [`World`] owns its allocator, systems and jobs
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{Chunk, Entity, Quantity, World};
//!
//! #[derive(Clone, Default)]
//! struct Health(i32);
//!
//! let poison = |chunk: Chunk<'_, Health>| -> Vec<Entity> {
//!     chunk
//!         .components()
//!         .iter()
//!         .filter_map(|c| {
//!             let mut health = c.lock();
//!             health.0 -= 1;
//!             (health.0 <= 0).then_some(c.entity())
//!         })
//!         .collect()
//! };
//!
//! let mut world = World::new();
//! let health = world.register_system::<Health, _>("health", Quantity::One, poison)?;
//! world.add_job("logic", &["health"], 4)?;
//!
//! for hp in 1..=3 {
//!     let e = world.create_entity();
//!     world.create_component_with(&health, e, Health(hp))?;
//! }
//!
//! world.run()?;
//! assert_eq!(world.entity_count(), 2);
//! # Ok::<(), tessera_core::EcsError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod sched;

pub use config::{EcsConfig, JobConfig, DEFAULT_THREAD_COUNT};
pub use ecs::{
    AnySystem, Chunk, Component, ComponentData, ComponentHandle, ComponentStorage, Entity,
    EntityAllocator, LinkedSystems, Passive, Processing, Quantity, System, SystemRef, World,
};
pub use error::{EcsError, EcsResult};
pub use sched::{Job, JobOptions, WorkPlan};
