//! The per-request state machine

use research_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Accepted, not yet validated
    Received,
    /// Validated; agents are being invoked
    Dispatching,
    /// Waiting for every selected agent's outcome
    Collecting,
    /// Every outcome is in; terminal
    Assembled,
}

impl RequestState {
    /// The only state this one may move to
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Dispatching),
            Self::Dispatching => Some(Self::Collecting),
            Self::Collecting => Some(Self::Assembled),
            Self::Assembled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Assembled
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::Dispatching => "dispatching",
            Self::Collecting => "collecting",
            Self::Assembled => "assembled",
        })
    }
}

/// Tracks one request through `Received → Dispatching → Collecting → Assembled`
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    id: Uuid,
    state: RequestState,
}

impl RequestLifecycle {
    pub fn new(id: Uuid) -> Self {
        info!(request_id = %id, state = %RequestState::Received, "Request received");
        Self {
            id,
            state: RequestState::Received,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Move to `next`; anything but the direct successor is an internal fault
    pub fn advance(&mut self, next: RequestState) -> Result<()> {
        if self.state.successor() != Some(next) {
            return Err(Error::InternalFault(format!(
                "illegal transition {} -> {next}",
                self.state
            )));
        }
        info!(request_id = %self.id, from = %self.state, to = %next, "Request state changed");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path() {
        let mut lifecycle = RequestLifecycle::new(Uuid::new_v4());
        for next in [
            RequestState::Dispatching,
            RequestState::Collecting,
            RequestState::Assembled,
        ] {
            lifecycle.advance(next).unwrap();
        }
        assert!(lifecycle.state().is_terminal());
        assert_eq!(lifecycle.state().successor(), None);
    }

    #[test]
    fn test_skipping_a_state_is_a_fault() {
        let mut lifecycle = RequestLifecycle::new(Uuid::new_v4());
        let err = lifecycle.advance(RequestState::Collecting).unwrap_err();
        assert_eq!(
            err,
            Error::InternalFault("illegal transition received -> collecting".to_string())
        );
        assert_eq!(lifecycle.state(), RequestState::Received);
    }

    #[test]
    fn test_no_transition_out_of_assembled() {
        let mut lifecycle = RequestLifecycle::new(Uuid::new_v4());
        lifecycle.advance(RequestState::Dispatching).unwrap();
        lifecycle.advance(RequestState::Collecting).unwrap();
        lifecycle.advance(RequestState::Assembled).unwrap();
        assert!(lifecycle.advance(RequestState::Received).is_err());
    }
}
