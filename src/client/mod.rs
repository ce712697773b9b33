//! Client-side helpers
//!
//! Connection string parsing into a [`ConnectionConfigBuilder`](crate::connection::ConnectionConfigBuilder).

mod connection_string;

pub use connection_string::ConnectionString;
