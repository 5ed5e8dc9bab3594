//! Generational `(slot, generation)` handles, backing every pool-owned object.
//!
//! `Musician ↔ Performer ↔ Instrument ↔ Task` no longer form a pointer graph:
//! each is a row in a [`thunderdome::Arena`] and every external reference is a
//! typed handle wrapping a `thunderdome::Index`. A handle into a freed slot
//! simply fails to resolve (`Error::InvalidHandle`); it never aliases whatever
//! got reinserted into that slot afterwards, because `thunderdome` bumps the
//! slot's generation on every remove/insert cycle.

use std::marker::PhantomData;
use thunderdome::Index;

/// A typed wrapper around an arena [`Index`], tagged with the kind of object it refers to.
pub struct Handle<T> {
    index: Index,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: Index) -> Self {
        Self { index, _marker: PhantomData }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handle").field(&self.index).finish()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

/// Marker types naming what a [`Handle`] points at.
pub struct InstrumentTag;
pub struct PerformerTag;
pub struct TaskTag;

pub type InstrumentHandle = Handle<InstrumentTag>;
pub type PerformerHandle = Handle<PerformerTag>;
pub type TaskHandle = Handle<TaskTag>;

/// A typed arena pool: owns records of `T`, hands out [`Handle<Tag>`]s.
pub struct Pool<T, Tag> {
    arena: thunderdome::Arena<T>,
    _marker: PhantomData<fn() -> Tag>,
}

impl<T, Tag> Pool<T, Tag> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { arena: thunderdome::Arena::with_capacity(capacity), _marker: PhantomData }
    }

    pub fn insert(&mut self, value: T) -> Handle<Tag> {
        Handle::new(self.arena.insert(value))
    }

    pub fn remove(&mut self, handle: Handle<Tag>) -> Option<T> {
        self.arena.remove(handle.index)
    }

    pub fn get(&self, handle: Handle<Tag>) -> Option<&T> {
        self.arena.get(handle.index)
    }

    pub fn get_mut(&mut self, handle: Handle<Tag>) -> Option<&mut T> {
        self.arena.get_mut(handle.index)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<Tag>, &T)> {
        self.arena.iter().map(|(index, value)| (Handle::new(index), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<Tag>, &mut T)> {
        self.arena.iter_mut().map(|(index, value)| (Handle::new(index), value))
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle<Tag>> + '_ {
        self.arena.iter().map(|(index, _)| Handle::new(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_fails_after_removal() {
        let mut pool: Pool<u32, InstrumentTag> = Pool::with_capacity(4);
        let a = pool.insert(10);
        pool.remove(a);
        let b = pool.insert(20);
        assert_ne!(a, b, "reinserted slot must carry a new generation");
        assert!(pool.get(a).is_none());
        assert_eq!(pool.get(b).copied(), Some(20));
    }
}
