//! Storage abstraction
//!
//! Backends expose transactions over named, ordered byte-key stores. The
//! query layer only talks to these traits, so any ordered transactional
//! key-value engine can sit underneath.
//!
//! Contract shared by every backend:
//! - Every operation checks the transaction's cancellation token first.
//! - Mutations on a read-only transaction fail with `AERO_READ_ONLY`.
//! - Get/Delete on an absent key fail with `AERO_KEY_NOT_FOUND`.
//! - After commit or rollback, every operation fails with
//!   `AERO_TX_DISCARDED`.
//! - Sequences are strictly increasing per store, starting at 1.

pub mod cancel;
pub mod cursor;
pub mod memory;

pub use cancel::CancellationToken;
pub use cursor::{CursorIterator, RawCursor};
pub use memory::MemoryEngine;

use crate::errors::{DbError, DbResult};

/// A pluggable transactional key-value engine
pub trait Engine: Send + Sync {
    /// Starts a transaction bound to `cancel`
    fn begin(&self, cancel: CancellationToken, writable: bool) -> DbResult<Box<dyn Transaction>>;
}

/// A backend transaction
pub trait Transaction {
    /// Opens an existing store
    fn get_store(&self, name: &[u8]) -> DbResult<Box<dyn Store>>;

    /// Creates an empty store
    fn create_store(&self, name: &[u8]) -> DbResult<()>;

    /// Drops a store and everything in it
    fn drop_store(&self, name: &[u8]) -> DbResult<()>;

    /// Makes every write of this transaction visible to later transactions
    fn commit(&self) -> DbResult<()>;

    /// Discards every write. Always succeeds.
    fn rollback(&self) -> DbResult<()>;

    fn is_writable(&self) -> bool;
}

/// An ordered namespace of byte keys
pub trait Store {
    fn put(&self, key: &[u8], value: &[u8]) -> DbResult<()>;

    fn get(&self, key: &[u8]) -> DbResult<Vec<u8>>;

    fn delete(&self, key: &[u8]) -> DbResult<()>;

    /// Removes every key. The store stays usable and keeps its sequence.
    fn truncate(&self) -> DbResult<()>;

    /// Returns the next value of the store's monotonic sequence
    fn next_sequence(&self) -> DbResult<u64>;

    fn iterator(&self, opts: IteratorOptions) -> DbResult<Box<dyn StoreIterator>>;
}

/// Iterator construction options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IteratorOptions {
    pub reverse: bool,
}

impl IteratorOptions {
    pub fn forward() -> Self {
        Self { reverse: false }
    }

    pub fn reverse() -> Self {
        Self { reverse: true }
    }
}

/// Key/value pair under an iterator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<'a> {
    key: &'a [u8],
    value: &'a [u8],
}

impl<'a> Item<'a> {
    pub fn new(key: &'a [u8], value: &'a [u8]) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// Copies the value out of the iterator's buffer
    pub fn value_copy(&self) -> Vec<u8> {
        self.value.to_vec()
    }
}

/// Ordered cursor over a store.
///
/// An iterator is either positioned on an item, exhausted, or errored. An
/// errored iterator stays invalid until closed; `err()` reports why.
pub trait StoreIterator {
    /// Positions on the first key >= pivot (forward) or the last key
    /// <= pivot (reverse). An empty pivot means the start (or end).
    fn seek(&mut self, pivot: &[u8]);

    fn valid(&self) -> bool;

    fn next(&mut self);

    fn err(&self) -> Option<&DbError>;

    fn item(&self) -> Option<Item<'_>>;

    /// Releases the iterator. Idempotent; never affects the store.
    fn close(&mut self) -> DbResult<()>;
}

/// Returns the first error recorded by an iterator
pub fn iterator_error(it: &dyn StoreIterator) -> DbResult<()> {
    match it.err() {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}
