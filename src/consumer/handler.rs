//! Batch handler trait.
//!
//! The handler is where an extracted batch leaves this crate: a network call,
//! a bulk insert, a downstream queue. It receives the batch by reference so
//! the consumer keeps ownership and can move the items to the dirty set if
//! the handler fails.

use std::fmt;
use std::future::Future;

/// Consumes one extracted batch.
///
/// # Example
///
/// ```ignore
/// struct Upload { client: Client }
///
/// impl Handler<Record> for Upload {
///     type Error = UploadError;
///
///     async fn handle(&self, batch: &[Record]) -> Result<(), Self::Error> {
///         self.client.bulk_insert(batch).await
///     }
/// }
/// ```
pub trait Handler<T>: Send + Sync + 'static {
    /// The error returned when the batch was not handled. Only displayed in
    /// logs; the batch itself is what gets preserved.
    type Error: fmt::Display + Send;

    /// Handles `batch`. Any error sends the whole batch to the dirty set.
    fn handle(&self, batch: &[T]) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Handler built from a synchronous closure. See [`handler_fn`].
#[derive(Debug, Clone, Copy)]
pub struct HandlerFn<F>(F);

/// Wraps a closure `Fn(&[T]) -> Result<(), E>` as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn(f)
}

impl<T, F, E> Handler<T> for HandlerFn<F>
where
    F: Fn(&[T]) -> Result<(), E> + Send + Sync + 'static,
    E: fmt::Display + Send,
{
    type Error = E;

    fn handle(&self, batch: &[T]) -> impl Future<Output = Result<(), Self::Error>> + Send {
        std::future::ready((self.0)(batch))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn closure_handler_sees_batch() {
        let seen = Arc::new(AtomicUsize::new(0));
        let handler = {
            let seen = Arc::clone(&seen);
            handler_fn(move |batch: &[u32]| {
                seen.fetch_add(batch.len(), Ordering::SeqCst);
                Ok::<_, String>(())
            })
        };

        handler.handle(&[1u32, 2, 3]).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn closure_handler_error_is_returned() {
        let handler = handler_fn(|batch: &[u32]| {
            if batch.is_empty() {
                Ok(())
            } else {
                Err(format!("rejected {} items", batch.len()))
            }
        });

        let err = handler.handle(&[9u32, 9]).await.unwrap_err();

        assert_eq!(err, "rejected 2 items");
    }
}
