//! Items extracted but not confirmed handled.

use parking_lot::Mutex;

/// Append-only accumulation of dirty items, shared by a consumer's cycles.
///
/// No deduplication: an item appended twice is returned twice.
#[derive(Debug)]
pub struct DirtySet<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for DirtySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DirtySet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        DirtySet {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Appends a batch of items. Empty batches are ignored.
    pub fn append(&self, mut batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }
        self.items.lock().append(&mut batch);
    }

    /// Number of dirty items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if no item has been marked dirty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Returns a copy of the dirty items.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.lock().clone()
    }

    /// Moves every dirty item out, leaving the set empty.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}
