//! Burst-aware batch extraction.
//!
//! Given a [`Store`](crate::store::Store) and a monotonic [`BurstPredicate`],
//! [`find_maximal_batch`] returns the largest prefix of the store that does
//! not burst, in O(log n) predicate evaluations for the outer search.
//!
//! # Module Structure
//!
//! - [`predicate`]: The [`BurstPredicate`] trait and stock predicates
//! - [`threshold`]: The doubling search and tail refinement
//! - [`window`]: Probe window type
//! - [`error`]: Failure types that carry popped items back to the caller

pub mod error;
pub mod predicate;
pub mod threshold;
pub mod window;

pub use error::{BoxError, ExtractError, ExtractFailure};
pub use predicate::{BurstFn, BurstPredicate, WeightLimit, burst_fn};
pub use threshold::find_maximal_batch;
pub use window::Window;
