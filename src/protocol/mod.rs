//! Firebird remote protocol definitions
//!
//! Opcodes and tags live in [`constants`]. [`descriptor`] holds the protocol
//! versions the client offers during identify and the per-version strategy.
//! [`response`] decodes server responses and status vectors.

pub mod constants;
pub mod descriptor;
pub mod response;

pub use descriptor::{PasswordMode, ProtocolCollection, ProtocolDescriptor, ProtocolVersion};
pub use response::{
    DefaultWarningCallback, FetchResponse, GenericResponse, Response, SqlResponse, StatusArg,
    StatusVector, WarningCallback,
};
