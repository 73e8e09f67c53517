//! Extraction errors.
//!
//! An extraction that fails part-way has usually popped items already. Those
//! items must never be dropped, so the failure type carries them back to the
//! caller, split by whether the predicate has vouched for them.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Boxed predicate error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why an extraction stopped early.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The store failed with something other than exhaustion.
    #[error("failed to take {requested} items from the store: {source}")]
    Store {
        requested: usize,
        #[source]
        source: StoreError,
    },

    /// The burst predicate could not reach a verdict.
    #[error("burst predicate failed: {0}")]
    Predicate(#[source] BoxError),

    /// Rejected items could not all be pushed back onto the store.
    #[error("failed to revert {stranded} items to the store: {source}")]
    Revert {
        stranded: usize,
        #[source]
        source: StoreError,
    },
}

/// A failed extraction together with every item it had popped.
///
/// - `packaged`: items the predicate accepted as a whole. They are safe to
///   hand to a handler.
/// - `unresolved`: items that were popped but never vouched for, or that could
///   not be reverted to the store. Callers should treat them as dirty.
pub struct ExtractFailure<T> {
    /// What went wrong.
    pub error: ExtractError,
    /// Items confirmed not to burst, in FIFO order.
    pub packaged: Vec<T>,
    /// Items that are neither confirmed nor back in the store, in FIFO order.
    pub unresolved: Vec<T>,
}

impl<T> ExtractFailure<T> {
    pub(crate) fn new(error: ExtractError, packaged: Vec<T>, unresolved: Vec<T>) -> Self {
        ExtractFailure {
            error,
            packaged,
            unresolved,
        }
    }

    /// Total number of items carried by this failure.
    pub fn item_count(&self) -> usize {
        self.packaged.len() + self.unresolved.len()
    }

    /// Splits the failure into its error, packaged items and unresolved items.
    pub fn into_parts(self) -> (ExtractError, Vec<T>, Vec<T>) {
        (self.error, self.packaged, self.unresolved)
    }
}

impl<T> fmt::Debug for ExtractFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractFailure")
            .field("error", &self.error)
            .field("packaged", &self.packaged.len())
            .field("unresolved", &self.unresolved.len())
            .finish()
    }
}

impl<T> fmt::Display for ExtractFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for ExtractFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}
