//! Maximal non-bursting batch search.
//!
//! [`find_maximal_batch`] pops items from a [`Store`] and returns the longest
//! prefix the [`BurstPredicate`] accepts, using a doubling (galloping) search
//! instead of probing one item at a time.
//!
//! # Search
//!
//! ```text
//! outer:  window 1, 2, 4, ...   pop `window` items, test packaged + got
//!           ok    -> keep got, double window
//!           burst -> got becomes the overshoot range, stop popping
//! tail:   same doubling over the overshoot range, window reset to 1
//!           ok    -> keep, double
//!           burst at window 1 -> stop
//!           burst at window >1 -> recurse into that sub-range
//! revert: every overshoot item not kept goes back onto the store, in order
//! ```
//!
//! For a monotonic predicate the result never bursts, and the first reverted
//! item would burst it. Each recursion level at least halves the range it
//! works on, so the depth is bounded by `log2` of the overshoot.
//!
//! # Failure handling
//!
//! Items popped before a failure are always returned through
//! [`ExtractFailure`]: accepted items in `packaged`, the rest in `unresolved`.

use tracing::{debug, error, trace};

use crate::store::{Rejected, Store, StoreError};

use super::error::{ExtractError, ExtractFailure};
use super::predicate::BurstPredicate;
use super::window::Window;

/// Counts predicate evaluations and boxes predicate errors.
struct Probe<'a, P: ?Sized> {
    predicate: &'a P,
    evaluations: usize,
}

impl<'a, P: ?Sized> Probe<'a, P> {
    fn new(predicate: &'a P) -> Self {
        Probe {
            predicate,
            evaluations: 0,
        }
    }

    fn bursts<T>(&mut self, candidate: &[T]) -> Result<bool, ExtractError>
    where
        P: BurstPredicate<T>,
    {
        self.evaluations += 1;
        let verdict = self
            .predicate
            .evaluate(candidate)
            .map_err(|e| ExtractError::Predicate(Box::new(e)))?;
        trace!(
            probe = self.evaluations,
            candidate = candidate.len(),
            burst = verdict,
            "evaluated candidate batch"
        );
        Ok(verdict)
    }
}

/// Extracts the longest prefix of `store` that does not burst `predicate`.
///
/// Never waits for new items: an empty store ends the search cleanly and an
/// empty batch is a normal result. Items popped but not accepted are pushed
/// back onto the store one at a time, in their original order.
///
/// # Errors
///
/// Returns an [`ExtractFailure`] carrying every popped item that is not back
/// in the store:
///
/// - [`ExtractError::Store`]: the store failed while popping. `packaged` holds
///   the items accepted so far.
/// - [`ExtractError::Predicate`]: the predicate errored. The items of the
///   probe being evaluated, and any overshoot not yet examined, are in
///   `unresolved`.
/// - [`ExtractError::Revert`]: pushing rejected items back failed. `packaged`
///   is a complete, valid batch; `unresolved` lists the stranded items.
pub fn find_maximal_batch<T, S, P>(store: &S, predicate: &P) -> Result<Vec<T>, ExtractFailure<T>>
where
    S: Store<T> + ?Sized,
    P: BurstPredicate<T> + ?Sized,
{
    let mut probe = Probe::new(predicate);
    let mut window = Window::UNIT;
    let mut packaged: Vec<T> = Vec::new();
    let mut overshoot: Vec<T> = Vec::new();

    loop {
        let mut got = match store.batch(window.get()) {
            Ok(got) if got.is_empty() => break,
            Ok(got) => got,
            Err(StoreError::NoMoreElements) => break,
            Err(source) => {
                let error = ExtractError::Store {
                    requested: window.get(),
                    source,
                };
                return Err(ExtractFailure::new(error, packaged, Vec::new()));
            }
        };

        let mark = packaged.len();
        packaged.append(&mut got);
        match probe.bursts(packaged.as_slice()) {
            Ok(false) => window.double(),
            Ok(true) => {
                overshoot = packaged.split_off(mark);
                break;
            }
            Err(error) => {
                let unresolved = packaged.split_off(mark);
                return Err(ExtractFailure::new(error, packaged, unresolved));
            }
        }
    }

    let rejected = match resolve_tail(&mut packaged, overshoot, &mut probe, 0) {
        Ok(rejected) => rejected,
        Err((error, unresolved)) => return Err(ExtractFailure::new(error, packaged, unresolved)),
    };

    let reverted = rejected.len();
    if let Err((source, stranded)) = revert(store, rejected) {
        error!(
            stranded = stranded.len(),
            error = %source,
            "failed to revert rejected items; they are no longer in the store"
        );
        let error = ExtractError::Revert {
            stranded: stranded.len(),
            source,
        };
        return Err(ExtractFailure::new(error, packaged, stranded));
    }

    debug!(
        items = packaged.len(),
        reverted,
        probes = probe.evaluations,
        "extracted maximal batch"
    );
    Ok(packaged)
}

/// Folds as much of `rest` into `packaged` as the predicate allows.
///
/// Returns the items of `rest` that were not accepted, in order. On a
/// predicate error, returns the error with every item of `rest` that is not
/// in `packaged`.
fn resolve_tail<T, P>(
    packaged: &mut Vec<T>,
    mut rest: Vec<T>,
    probe: &mut Probe<'_, P>,
    depth: u32,
) -> Result<Vec<T>, (ExtractError, Vec<T>)>
where
    P: BurstPredicate<T> + ?Sized,
{
    debug_assert!(depth < usize::BITS, "tail refinement deeper than log2(usize::MAX)");
    let mut window = Window::UNIT;

    while !rest.is_empty() {
        let take = window.get().min(rest.len());
        let remaining = rest.split_off(take);
        let mut got = std::mem::replace(&mut rest, remaining);

        let mark = packaged.len();
        packaged.append(&mut got);
        match probe.bursts(packaged.as_slice()) {
            Ok(false) => window.double(),
            Ok(true) => {
                let mut got = packaged.split_off(mark);
                if window.is_unit() || got.len() == 1 {
                    got.append(&mut rest);
                    return Ok(got);
                }
                trace!(depth, range = got.len(), "refining overshoot");
                return match resolve_tail(packaged, got, probe, depth + 1) {
                    Ok(mut rejected) => {
                        rejected.append(&mut rest);
                        Ok(rejected)
                    }
                    Err((error, mut unresolved)) => {
                        unresolved.append(&mut rest);
                        Err((error, unresolved))
                    }
                };
            }
            Err(error) => {
                let mut unresolved = packaged.split_off(mark);
                unresolved.append(&mut rest);
                return Err((error, unresolved));
            }
        }
    }

    Ok(rest)
}

/// Pushes `rejected` back onto the store in order.
///
/// Stops at the first refusal and returns the refused item followed by every
/// item that was not attempted.
fn revert<T, S>(store: &S, rejected: Vec<T>) -> Result<(), (StoreError, Vec<T>)>
where
    S: Store<T> + ?Sized,
{
    let mut pending = rejected.into_iter();
    while let Some(item) = pending.next() {
        if let Err(Rejected { item, error }) = store.put(item) {
            let mut stranded = vec![item];
            stranded.extend(pending);
            return Err((error, stranded));
        }
    }
    Ok(())
}
