//! Connection session lifecycle for the chat transport.

use crate::error::AppError;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    PairingRequested,
    Paired,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transport is up. `registered` is true when stored credentials were
    /// accepted.
    Connect { registered: bool },
    RequestPairing,
    PairingCompleted,
    /// Transport closed. A logout ends the session for good.
    Closed { logged_out: bool },
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    logged_out: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            logged_out: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, AppError> {
        use SessionEvent::*;
        use SessionState::*;

        let next = match (self.state, event) {
            (Unauthenticated | Disconnected, Connect { registered: true }) => Paired,
            (Unauthenticated | Disconnected, Connect { registered: false }) => Unauthenticated,
            (Unauthenticated, RequestPairing) => PairingRequested,
            (PairingRequested, RequestPairing) => {
                return Err(AppError::invalid_input("pairing was already requested"));
            }
            (PairingRequested, PairingCompleted) => Paired,
            (Unauthenticated | PairingRequested | Paired, Closed { logged_out }) => {
                self.logged_out = logged_out;
                Disconnected
            }
            (state, event) => {
                return Err(AppError::invalid_input(format!(
                    "{event:?} is not valid while {state:?}"
                )));
            }
        };

        if matches!(event, Connect { .. }) {
            self.logged_out = false;
        }
        debug!(from = ?self.state, to = ?next, ?event, "session transition");
        if next == Paired && self.state != Paired {
            info!("session paired");
        }
        self.state = next;
        Ok(next)
    }

    /// A closed session reconnects unless the close was a logout.
    pub fn should_reconnect(&self) -> bool {
        self.state == SessionState::Disconnected && !self.logged_out
    }
}
