//! XDR-style binary codec
//!
//! Every field on the Firebird wire is big-endian and ends on a 4-byte
//! boundary. Variable length fields carry a 4-byte length prefix followed by
//! the payload and zero padding.
//!
//! This module handles:
//! * Buffered writing with direct writes for large payloads ([`XdrWriter`])
//! * Buffered reading with framing checks ([`XdrReader`])
//! * Transparent encryption once a cipher pair is installed

mod reader;
mod writer;

pub use reader::{XdrReader, MAX_READ_BUFFER_LENGTH};
pub use writer::{XdrWriter, BUF_SIZE, DIRECT_WRITE_THRESHOLD, MAX_BLOB_BUFFER_LENGTH};

/// A value that serializes itself into a typed sub-message
///
/// Used by [`XdrWriter::write_typed`] for parameter buffers.
pub trait XdrEncode {
    /// Number of bytes [`XdrEncode::encode_to`] will append
    fn encoded_len(&self) -> usize;

    /// Append the encoded bytes
    fn encode_to(&self, out: &mut Vec<u8>);
}

/// Number of padding bytes after a field of `len` bytes
pub const fn padding(len: usize) -> usize {
    (4 - (len & 3)) & 3
}
