//! Connection management
//!
//! This module handles:
//! * TCP transport setup and socket options
//! * Connection lifecycle (socket connect, identify, attach, disconnect)
//! * State machine enforcement
//! * Authentication and wire encryption during the handshake

mod config;
mod state;
mod transport;
mod wire;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, WireCrypt};
pub use state::ConnectionState;
pub use wire::{CancelHandle, CancelKind, WireConnection};

pub(crate) use transport::{connect_tcp, SocketOptions};
pub(crate) use wire::DeferredAction;
