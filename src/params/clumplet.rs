//! Tag-length-value items in server replies
//!
//! Info responses use 2-byte little-endian lengths and end with
//! [`INFO_END`]. Server key blocks use 1-byte lengths and no terminator.

use crate::{Error, Result};

/// End of an info response
pub const INFO_END: u8 = 1;

/// Info response did not fit the requested buffer
pub const INFO_TRUNCATED: u8 = 2;

/// Little-endian integer of up to 4 bytes
pub fn vax_integer(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .take(4)
        .enumerate()
        .fold(0i32, |acc, (i, &b)| acc | (i32::from(b) << (8 * i)))
}

/// Little-endian integer of up to 8 bytes
pub fn vax_long(bytes: &[u8]) -> i64 {
    bytes
        .iter()
        .take(8)
        .enumerate()
        .fold(0i64, |acc, (i, &b)| acc | (i64::from(b) << (8 * i)))
}

/// Iterator over `(tag, value)` items
#[derive(Debug, Clone)]
pub struct Clumplets<'a> {
    bytes: &'a [u8],
    pos: usize,
    length_size: usize,
    stop_at_end: bool,
    truncated: bool,
}

impl<'a> Clumplets<'a> {
    /// Items of an info response
    pub fn info(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            length_size: 2,
            stop_at_end: true,
            truncated: false,
        }
    }

    /// Items with a 1-byte length and no terminator
    pub fn untagged(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            length_size: 1,
            stop_at_end: false,
            truncated: false,
        }
    }

    /// Whether iteration stopped on [`INFO_TRUNCATED`]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn malformed(&mut self) -> Option<Result<(u8, &'a [u8])>> {
        let offset = self.pos;
        self.pos = self.bytes.len();
        Some(Err(Error::Protocol(format!(
            "malformed item list at offset {}",
            offset
        ))))
    }
}

impl<'a> Iterator for Clumplets<'a> {
    type Item = Result<(u8, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = *self.bytes.get(self.pos)?;
        if self.stop_at_end && (tag == INFO_END || tag == INFO_TRUNCATED) {
            self.truncated = tag == INFO_TRUNCATED;
            self.pos = self.bytes.len();
            return None;
        }
        let len_start = self.pos + 1;
        let Some(len_bytes) = self.bytes.get(len_start..len_start + self.length_size) else {
            return self.malformed();
        };
        let len = vax_integer(len_bytes) as usize;
        let start = len_start + self.length_size;
        let Some(value) = self.bytes.get(start..start + len) else {
            return self.malformed();
        };
        self.pos = start + len;
        Some(Ok((tag, value)))
    }
}
