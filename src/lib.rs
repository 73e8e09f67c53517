//! Burst-aware batch extraction and rate-limited batch consumption.
//!
//! [`extract::find_maximal_batch`] pulls the longest prefix of a FIFO
//! [`store::Store`] that does not "burst" a caller-supplied capacity
//! predicate, putting any overshoot back. [`consumer::RateLimitedConsumer`]
//! runs that extraction once per interval and hands each batch to a
//! handler, keeping every item it could not confirm in a dirty set.

pub mod consumer;
pub mod extract;
pub mod store;

#[cfg(test)]
mod test_utils;
