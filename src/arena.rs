//! Per-kind arenas indexed by small `Copy` ID newtypes.
//!
//! Every IR entity (function, basic block, instruction, argument, global
//! value, struct type, type alias) lives in one `Arena<T>` owned by the
//! `Module` that created it. The ID a caller holds is just an index into
//! that arena, so "upward" parent links can be plain IDs instead of
//! reference-counted handles: they go stale the moment their slot's arena
//! is dropped, which is exactly the non-owning back-reference the data
//! model calls for.

use std::fmt;
use std::marker::PhantomData;

/// A stable index into an [`Arena<T>`].
///
/// Two `Id`s are equal iff they index the same slot, so `Id` doubles as
/// the identity-comparison key the spec requires for arguments,
/// instructions, blocks, functions and globals: distinct entities never
/// compare equal even when their contents happen to coincide.
pub struct Id<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(index: u32) -> Self {
        Id { index, _marker: PhantomData }
    }

    /// A placeholder used only during the two-phase construction of a
    /// cyclic pair (e.g. a function and its entry block, each needing
    /// the other's `Id` before either is pushed). Never stored past the
    /// statement that overwrites it, and never looked up.
    pub(crate) fn dangling() -> Self {
        Id::new(u32::MAX)
    }

    /// The raw slot index, exposed for printers that want a stable,
    /// human-readable fallback name (e.g. `%v12`) when an entity carries
    /// none of its own.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self { *self }
}
impl<T> Copy for Id<T> {}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool { self.index == other.index }
}
impl<T> Eq for Id<T> {}
impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.index.hash(state) }
}
impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// An append-only store of `T`, indexed by [`Id<T>`].
///
/// Entities are never removed from the arena itself (removing an
/// instruction from a basic block is modeled by dropping its ID from the
/// block's instruction list, not by freeing the arena slot), so `Id`s
/// stay valid for the lifetime of the owning `Module`.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena { slots: Vec::new() }
    }
}

impl<T> Arena<T> {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, value: T) -> Id<T> {
        let index = u32::try_from(self.slots.len()).expect("arena overflow");
        self.slots.push(value);
        Id::new(index)
    }

    #[must_use]
    pub fn len(&self) -> usize { self.slots.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
}

impl<T> std::ops::Index<Id<T>> for Arena<T> {
    type Output = T;
    fn index(&self, id: Id<T>) -> &T {
        &self.slots[id.index as usize]
    }
}

impl<T> std::ops::IndexMut<Id<T>> for Arena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.slots[id.index as usize]
    }
}
