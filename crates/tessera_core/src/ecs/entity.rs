//! # Entity Management
//!
//! Entities are plain identifiers drawn from a dense integer space.
//! Freed identifiers go back to a pool and are handed out again before
//! any new identifier is minted.

use std::fmt;

use crate::error::{EcsError, EcsResult};

/// Opaque identifier for an entity.
///
/// An entity carries no data. The reserved [`Entity::INVALID`] value never
/// names a live entity and may not carry components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Null/invalid entity.
    pub const INVALID: Self = Self(u32::MAX);

    /// Creates an entity from a raw identifier (mainly for testing).
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Checks if this identifier is a usable value.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Entity({})", self.0)
        } else {
            f.write_str("Entity(INVALID)")
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity #{}", self.0)
    }
}

/// Issues and recycles entity identifiers.
///
/// Each [`World`](crate::World) owns exactly one allocator, so independent
/// worlds never share identifier state.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Next identifier to mint when the pool is empty.
    next_id: u32,
    /// Freed identifiers, reused LIFO.
    free_ids: Vec<u32>,
    /// Liveness per minted identifier.
    alive: Vec<bool>,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues an identifier, reusing a freed one if available.
    ///
    /// # Panics
    ///
    /// Panics if the identifier space is exhausted.
    pub fn create(&mut self) -> Entity {
        if let Some(id) = self.free_ids.pop() {
            self.alive[id as usize] = true;
            return Entity(id);
        }

        let id = self.next_id;
        assert!(id != u32::MAX, "entity identifier space exhausted");
        self.next_id += 1;
        self.alive.push(true);
        Entity(id)
    }

    /// Returns an identifier to the free pool.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DoubleFree`] if the identifier is already in the pool.
    ///   This indicates allocator corruption and must be treated as fatal.
    /// - [`EcsError::UnknownEntity`] if the identifier was never issued here.
    pub fn free(&mut self, entity: Entity) -> EcsResult<()> {
        let Some(alive) = self.alive.get_mut(entity.0 as usize) else {
            return Err(EcsError::UnknownEntity(entity));
        };
        if !*alive {
            return Err(EcsError::DoubleFree(entity));
        }

        *alive = false;
        self.free_ids.push(entity.0);
        Ok(())
    }

    /// Checks if an identifier is currently issued.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.alive.get(entity.0 as usize).copied().unwrap_or(false)
    }

    /// Number of identifiers currently issued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.len() - self.free_ids.len()
    }

    /// Whether no identifier is currently issued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers waiting for reuse, next-to-be-reused last.
    #[must_use]
    pub fn free_pool(&self) -> &[u32] {
        &self.free_ids
    }
}
