//! FIFO item stores consumed by the batch extractor.
//!
//! The extractor never owns storage. It talks to a [`Store`]: something that
//! can hand out up to N items from the front and take single items back. The
//! store must tolerate concurrent `batch`/`put` calls from overlapping
//! extraction cycles; the consumer does not serialize access for it.
//!
//! # Exhaustion vs. faults
//!
//! [`StoreError::NoMoreElements`] is the clean "nothing left right now"
//! signal. It ends a probe loop without being reported as a failure. Every
//! other variant is a fault, and the caller must preserve any items it has
//! already popped.
//!
//! # Module Structure
//!
//! - [`memory`]: In-process [`MemoryStore`] used by the binary and tests

pub mod memory;

use std::fmt;

use thiserror::Error;

pub use memory::MemoryStore;

/// Errors reported by a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store is currently empty.
    #[error("the store has no more elements")]
    NoMoreElements,

    /// The store has been closed and accepts no further operations.
    #[error("the store is already closed")]
    AlreadyClosed,

    /// Any other storage failure.
    #[error("store fault: {0}")]
    Fault(String),
}

impl StoreError {
    /// Returns true for the clean exhaustion signal.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, StoreError::NoMoreElements)
    }
}

/// A `put` that the store refused, carrying the item back to the caller.
///
/// Mirrors `tokio::sync::mpsc::error::SendError`: ownership of the item is
/// returned so a failed revert can never silently drop it.
pub struct Rejected<T> {
    /// The item that was not stored.
    pub item: T,
    /// Why the store refused it.
    pub error: StoreError,
}

impl<T> Rejected<T> {
    /// Creates a rejection for `item`.
    pub fn new(item: T, error: StoreError) -> Self {
        Rejected { item, error }
    }

    /// Returns the item, discarding the error.
    pub fn into_item(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store rejected item: {}", self.error)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// An ordered FIFO store of pending items.
pub trait Store<T>: Send + Sync {
    /// Appends one item to the back of the store.
    ///
    /// On failure the item is handed back inside [`Rejected`].
    fn put(&self, item: T) -> Result<(), Rejected<T>>;

    /// Pops up to `max` items from the front, preserving order.
    ///
    /// Returns [`StoreError::NoMoreElements`] when the store is empty. Never
    /// blocks waiting for new items.
    fn batch(&self, max: usize) -> Result<Vec<T>, StoreError>;

    /// Returns true once the store has been closed.
    fn is_done(&self) -> bool;

    /// Pops the single front item.
    fn get(&self) -> Result<T, StoreError> {
        self.batch(1)?
            .into_iter()
            .next()
            .ok_or(StoreError::NoMoreElements)
    }
}
