//! Service lifecycle states.

use std::fmt;

/// Where the service is between build and serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    /// Nothing has run yet.
    Uninitialized,
    /// The artifact is stale and being regenerated.
    Generating,
    /// A packaged artifact is in place.
    Packaged,
    /// The artifact is loaded and lookups are served.
    Serving,
    /// The artifact could not be loaded; lookups fail but the process lives.
    Degraded {
        /// Why the artifact is unavailable.
        reason: String,
    },
}

impl ServiceState {
    /// Returns `true` if moving from `self` to `next` is allowed.
    ///
    /// `Degraded` is terminal and reachable from every other state.
    pub fn can_transition_to(&self, next: &ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, next),
            (Uninitialized, Generating)
                | (Uninitialized, Packaged)
                | (Generating, Packaged)
                | (Packaged, Serving)
                | (Uninitialized | Generating | Packaged | Serving, Degraded { .. })
        )
    }

    /// Returns `true` for [`ServiceState::Serving`].
    pub fn is_serving(&self) -> bool {
        matches!(self, ServiceState::Serving)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Uninitialized => f.write_str("uninitialized"),
            ServiceState::Generating => f.write_str("generating"),
            ServiceState::Packaged => f.write_str("packaged"),
            ServiceState::Serving => f.write_str("serving"),
            ServiceState::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid lifecycle transition from {from} to {to}")]
pub struct InvalidTransition {
    /// State before the attempted transition.
    pub from: ServiceState,
    /// Requested state.
    pub to: ServiceState,
}

/// Tracks the current state and enforces allowed transitions.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ServiceState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: ServiceState::Uninitialized,
        }
    }
}

impl Lifecycle {
    /// Starts in [`ServiceState::Uninitialized`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Moves to `next` if the transition is allowed.
    pub fn advance(&mut self, next: ServiceState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(&next) {
            return Err(InvalidTransition {
                from: self.state.clone(),
                to: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
        Ok(())
    }
}
