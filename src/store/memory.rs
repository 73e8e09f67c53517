//! In-process FIFO store.
//!
//! A `VecDeque` behind a mutex plus a cancellation token that marks closure.
//! Nothing is persisted; closing the store hands the remaining items back to
//! the caller.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::{Rejected, Store, StoreError};

/// Thread-safe in-memory FIFO store.
#[derive(Debug)]
pub struct MemoryStore<T> {
    items: Mutex<VecDeque<T>>,
    closed: CancellationToken,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryStore<T> {
    /// Creates an empty, open store.
    pub fn new() -> Self {
        MemoryStore {
            items: Mutex::new(VecDeque::new()),
            closed: CancellationToken::new(),
        }
    }

    /// Creates an open store pre-filled with `items` in iteration order.
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        MemoryStore {
            items: Mutex::new(items.into_iter().collect()),
            closed: CancellationToken::new(),
        }
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Closes the store and returns everything still queued, front first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyClosed`] if the store was closed before.
    pub fn close(&self) -> Result<Vec<T>, StoreError> {
        let mut items = self.items.lock();
        if self.closed.is_cancelled() {
            return Err(StoreError::AlreadyClosed);
        }
        self.closed.cancel();
        Ok(items.drain(..).collect())
    }

    /// Resolves once the store has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Returns a copy of the queued items without removing them.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.lock().iter().cloned().collect()
    }
}

impl<T: Send> Store<T> for MemoryStore<T> {
    fn put(&self, item: T) -> Result<(), Rejected<T>> {
        let mut items = self.items.lock();
        if self.closed.is_cancelled() {
            return Err(Rejected::new(item, StoreError::AlreadyClosed));
        }
        items.push_back(item);
        Ok(())
    }

    fn batch(&self, max: usize) -> Result<Vec<T>, StoreError> {
        let mut items = self.items.lock();
        if self.closed.is_cancelled() {
            return Err(StoreError::AlreadyClosed);
        }
        if items.is_empty() {
            return Err(StoreError::NoMoreElements);
        }
        let take = max.min(items.len());
        Ok(items.drain(..take).collect())
    }

    fn is_done(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl<T> FromIterator<T> for MemoryStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_takes_front_in_order() {
        let store = MemoryStore::from_items(1..=5);

        assert_eq!(store.batch(2), Ok(vec![1, 2]));
        assert_eq!(store.batch(10), Ok(vec![3, 4, 5]));
        assert_eq!(store.batch(1), Err(StoreError::NoMoreElements));
    }

    #[test]
    fn put_appends_to_back() {
        let store = MemoryStore::from_items([1, 2]);
        store.put(3).unwrap();

        assert_eq!(store.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn zero_sized_batch_on_non_empty_store_is_empty() {
        let store = MemoryStore::from_items([1]);

        assert_eq!(store.batch(0), Ok(vec![]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn close_returns_remaining_and_rejects_further_use() {
        let store = MemoryStore::from_items(["a", "b"]);

        assert_eq!(store.close(), Ok(vec!["a", "b"]));
        assert!(store.is_done());
        assert!(store.is_empty());
        assert_eq!(store.close(), Err(StoreError::AlreadyClosed));
        assert_eq!(store.batch(1), Err(StoreError::AlreadyClosed));

        let rejected = store.put("c").unwrap_err();
        assert_eq!(rejected.item, "c");
        assert_eq!(rejected.error, StoreError::AlreadyClosed);
    }

    #[tokio::test]
    async fn closed_future_resolves_after_close() {
        let store = std::sync::Arc::new(MemoryStore::<u8>::new());
        let waiter = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.closed().await })
        };

        store.close().unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("closed() should resolve")
            .unwrap();
    }

    #[test]
    fn concurrent_puts_and_batches_lose_nothing() {
        let store = std::sync::Arc::new(MemoryStore::new());

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.put(p * 1000 + i).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut drained = Vec::new();
        while let Ok(mut got) = store.batch(64) {
            drained.append(&mut got);
        }
        drained.sort_unstable();

        let mut expected: Vec<_> = (0..4)
            .flat_map(|p| (0..250).map(move |i| p * 1000 + i))
            .collect();
        expected.sort_unstable();
        assert_eq!(drained, expected);
    }
}
