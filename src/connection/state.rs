//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket yet
    Unconnected,

    /// TCP socket open, identify not sent
    SocketConnected,

    /// Server accepted a protocol version
    Identified,

    /// Database or service attachment established
    Attached,

    /// Socket closed; the connection cannot be reused
    Disconnected,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Unconnected, SocketConnected)
                | (SocketConnected, Identified)
                | (Identified, Attached)
                | (_, Disconnected)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }

    /// Fail unless the connection is in `expected`
    pub fn require(&self, expected: ConnectionState) -> Result<()> {
        if *self != expected {
            return Err(Error::InvalidState {
                expected: expected.to_string(),
                actual: self.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconnected => write!(f, "unconnected"),
            Self::SocketConnected => write!(f, "socket_connected"),
            Self::Identified => write!(f, "identified"),
            Self::Attached => write!(f, "attached"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}
