//! Consumer lifecycle state machine.
//!
//! ```text
//! Running --close()--> Draining --in-flight cycles joined--> Stopped
//! ```
//!
//! There is no way back to `Running`.

use serde::Serialize;

use super::consumer::ConsumerError;

/// Lifecycle state of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    /// Cycles may be started.
    Running,
    /// `close()` was called; waiting for in-flight cycles.
    Draining,
    /// Terminal. Every cycle has finished and the dirty set was returned.
    Stopped,
}

impl ConsumerState {
    /// Returns true while new cycles may start.
    pub fn is_running(self) -> bool {
        self == ConsumerState::Running
    }

    /// Moves `Running` to `Draining`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::AlreadyStopped`] from any other state.
    pub(crate) fn begin_drain(&mut self) -> Result<(), ConsumerError> {
        match self {
            ConsumerState::Running => {
                *self = ConsumerState::Draining;
                Ok(())
            }
            ConsumerState::Draining | ConsumerState::Stopped => Err(ConsumerError::AlreadyStopped),
        }
    }

    /// Moves `Draining` to `Stopped`.
    pub(crate) fn finish(&mut self) {
        debug_assert_eq!(*self, ConsumerState::Draining);
        *self = ConsumerState::Stopped;
    }
}
