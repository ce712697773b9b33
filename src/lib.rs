//! firebird-wire: an async engine for the Firebird/InterBase remote wire protocol
//!
//! The crate covers the protocol plumbing of a Firebird client:
//!
//! * [`xdr`]: the 4-byte aligned binary codec
//! * [`params`]: database, transaction, service and blob parameter buffers
//! * [`protocol`]: opcodes, protocol descriptors and version negotiation, responses
//! * [`connection`]: socket connect, identify handshake, connection state machine
//! * [`auth`]: client authentication plugins (legacy hash, SRP)
//! * [`crypt`]: wire encryption plugins and session configuration
//! * [`database`]: attach, transactions, blobs, events on top of an identified connection
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> firebird_wire::Result<()> {
//! use firebird_wire::connection::{ConnectionConfig, WireConnection};
//! use firebird_wire::params::ParameterBuffer;
//!
//! let config = ConnectionConfig::builder("localhost", "/var/lib/firebird/employee.fdb")
//!     .user("SYSDBA")
//!     .password("masterkey")
//!     .build();
//!
//! let mut conn = WireConnection::new(config);
//! conn.socket_connect().await?;
//! conn.identify().await?;
//! let mut db = conn.attach().await?;
//!
//! let tr = db.start_transaction(&ParameterBuffer::default_tpb()).await?;
//! db.execute_immediate("UPDATE COUNTRY SET CURRENCY = CURRENCY", &tr).await?;
//! db.commit(tr).await?;
//! db.detach().await?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod client;
pub mod connection;
pub mod crypt;
pub mod database;
pub mod encoding;
pub mod error;
pub mod metrics;
pub mod params;
pub mod protocol;
pub mod registry;
pub mod xdr;

pub use client::ConnectionString;
pub use connection::{CancelHandle, CancelKind, ConnectionConfig, ConnectionState, WireConnection, WireCrypt};
pub use database::{Blob, Database, EventHandle, EventNotification, Transaction};
pub use error::{Error, Result};
pub use registry::PluginRegistry;
