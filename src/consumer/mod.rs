//! Rate-limited batch consumption.
//!
//! A [`RateLimitedConsumer`] wakes once per configured interval, extracts a
//! maximal non-bursting batch from its store and hands it to a [`Handler`].
//! Nothing extracted is ever dropped: a batch the handler refuses, and any
//! items an extraction fault leaves unverified, go to a dirty set returned by
//! [`RateLimitedConsumer::close`].
//!
//! # Lifecycle
//!
//! - `Running`: ticks start cycles
//! - `Draining`: `close()` was called, in-flight cycles are being joined
//! - `Stopped`: terminal, `done()` has resolved
//!
//! # Module Structure
//!
//! - [`config`]: Interval and cycle policy, from env or JSON
//! - [`handler`]: The [`Handler`] trait
//! - [`dirty`]: The dirty-item accumulator
//! - [`lifecycle`]: The [`ConsumerState`] machine

pub mod config;
#[allow(clippy::module_inception)]
mod consumer;
pub mod dirty;
pub mod handler;
pub mod lifecycle;
mod stats;


pub use config::{ConfigError, ConsumerConfig, CyclePolicy};
pub use consumer::{ConsumerError, CycleReport, RateLimitedConsumer, RunExit};
pub use dirty::DirtySet;
pub use handler::{Handler, HandlerFn, handler_fn};
pub use lifecycle::ConsumerState;
pub use stats::ConsumerStats;
