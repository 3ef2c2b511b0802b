//! # Entity Component System
//!
//! Storage and behavior for entities, components and systems.
//!
//! ## Design Philosophy
//!
//! - Identifiers are dense and reused; each world owns its allocator
//! - One storage per component kind, insertion-ordered
//! - A system binds one storage to one processing
//! - Structural mutation happens between jobs, never during one

mod component;
mod entity;
mod processing;
mod storage;
mod system;
mod world;

pub use component::{Component, ComponentData, ComponentHandle, Quantity};
pub use entity::{Entity, EntityAllocator};
pub use processing::{Chunk, LinkedSystems, Passive, Processing};
pub use storage::ComponentStorage;
pub use system::{AnySystem, System, SystemRef};
pub use world::World;
