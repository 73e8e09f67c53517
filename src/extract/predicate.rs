//! Burst predicates: deciding whether a candidate batch exceeds capacity.
//!
//! A predicate answers one question about an ordered candidate batch: would
//! handing it over "burst" some external limit? The extractor relies on the
//! answer being monotonic in batch length. If a batch bursts, the same batch
//! with more items appended must burst too. A non-monotonic predicate does not
//! break memory safety or lose items, but the extracted batch is then only
//! guaranteed non-bursting, not maximal.

use std::convert::Infallible;

/// Decides whether an ordered candidate batch would burst.
///
/// # Example
///
/// ```
/// use std::convert::Infallible;
/// use burst_batch::extract::BurstPredicate;
///
/// struct AtMost(usize);
///
/// impl BurstPredicate<u32> for AtMost {
///     type Error = Infallible;
///
///     fn evaluate(&self, batch: &[u32]) -> Result<bool, Self::Error> {
///         Ok(batch.len() > self.0)
///     }
/// }
///
/// assert_eq!(AtMost(2).evaluate(&[1, 2, 3]), Ok(true));
/// ```
pub trait BurstPredicate<T>: Send + Sync {
    /// The error returned when the predicate cannot reach a verdict.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns `Ok(true)` if `batch` would burst.
    fn evaluate(&self, batch: &[T]) -> Result<bool, Self::Error>;
}

impl<T, P> BurstPredicate<T> for &P
where
    P: BurstPredicate<T> + ?Sized,
{
    type Error = P::Error;

    fn evaluate(&self, batch: &[T]) -> Result<bool, Self::Error> {
        (**self).evaluate(batch)
    }
}

/// Predicate built from a closure. See [`burst_fn`].
#[derive(Debug, Clone, Copy)]
pub struct BurstFn<F>(F);

/// Wraps a closure `Fn(&[T]) -> Result<bool, E>` as a [`BurstPredicate`].
pub fn burst_fn<F>(f: F) -> BurstFn<F> {
    BurstFn(f)
}

impl<T, F, E> BurstPredicate<T> for BurstFn<F>
where
    F: Fn(&[T]) -> Result<bool, E> + Send + Sync,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn evaluate(&self, batch: &[T]) -> Result<bool, Self::Error> {
        (self.0)(batch)
    }
}

/// Bursts once the summed weight of a batch exceeds a capacity.
///
/// A batch whose weight equals the capacity exactly does not burst.
#[derive(Debug, Clone, Copy)]
pub struct WeightLimit<F> {
    capacity: u64,
    weigh: F,
}

impl<F> WeightLimit<F> {
    /// Creates a limit of `capacity` with the per-item weight function `weigh`.
    pub fn new(capacity: u64, weigh: F) -> Self {
        WeightLimit { capacity, weigh }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl<T, F> BurstPredicate<T> for WeightLimit<F>
where
    F: Fn(&T) -> u64 + Send + Sync,
{
    type Error = Infallible;

    fn evaluate(&self, batch: &[T]) -> Result<bool, Self::Error> {
        let weight = batch
            .iter()
            .fold(0u64, |acc, item| acc.saturating_add((self.weigh)(item)));
        Ok(weight > self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("probe failed")]
    struct ProbeFailed;

    #[test]
    fn weight_limit_is_inclusive_at_capacity() {
        let limit = WeightLimit::new(10, |w: &u64| *w);

        assert_eq!(limit.evaluate(&[0u64; 0]), Ok(false));
        assert_eq!(limit.evaluate(&[4u64, 6]), Ok(false));
        assert_eq!(limit.evaluate(&[4u64, 6, 1]), Ok(true));
    }

    #[test]
    fn weight_limit_saturates_heavy_items() {
        let limit = WeightLimit::new(u64::MAX - 1, |w: &u64| *w);

        assert_eq!(limit.evaluate(&[u64::MAX, u64::MAX]), Ok(true));
    }

    #[test]
    fn closure_predicate_passes_errors_through() {
        let predicate = burst_fn(|batch: &[u8]| {
            if batch.contains(&0) {
                Err(ProbeFailed)
            } else {
                Ok(batch.len() > 2)
            }
        });

        assert!(!predicate.evaluate(&[1u8, 2]).unwrap());
        assert!(predicate.evaluate(&[1u8, 2, 3]).unwrap());
        assert!(predicate.evaluate(&[1u8, 0]).is_err());
    }

    #[test]
    fn reference_delegates() {
        let limit = WeightLimit::new(1, |_: &char| 1u64);
        let by_ref = &limit;

        assert_eq!(by_ref.evaluate(&['a', 'b']), Ok(true));
    }
}
