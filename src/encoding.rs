//! Character encoding lookup
//!
//! Conversion tables for the Firebird character sets live outside the wire
//! engine. The engine only needs an [`Encoding`] to turn strings into bytes
//! and back, and an [`EncodingFactory`] to resolve the connection character
//! set by its Firebird name.

use std::fmt;
use std::sync::Arc;

/// Text encoding used for strings on the wire
pub trait Encoding: Send + Sync + fmt::Debug {
    /// Firebird character set name (e.g. `UTF8`)
    fn charset_name(&self) -> &str;

    /// Encode text to bytes
    fn encode(&self, text: &str) -> Vec<u8>;

    /// Decode bytes to text
    fn decode(&self, bytes: &[u8]) -> String;
}

/// UTF-8 encoding (`UTF8`, also used for `NONE`)
#[derive(Debug, Clone)]
pub struct Utf8Encoding {
    name: String,
}

impl Utf8Encoding {
    /// UTF-8 registered under the given Firebird character set name
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for Utf8Encoding {
    fn default() -> Self {
        Self::named("UTF8")
    }
}

impl Encoding for Utf8Encoding {
    fn charset_name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// ISO-8859-1: every byte maps to the code point of the same value
#[derive(Debug, Clone, Default)]
pub struct Latin1Encoding;

impl Encoding for Latin1Encoding {
    fn charset_name(&self) -> &str {
        "ISO8859_1"
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
            .collect()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Resolves Firebird character set names to encodings
pub trait EncodingFactory: Send + Sync + fmt::Debug {
    /// Encoding for a Firebird character set name, if known
    fn encoding_for(&self, charset: &str) -> Option<Arc<dyn Encoding>>;

    /// Encoding used when no character set was configured
    fn default_encoding(&self) -> Arc<dyn Encoding>;
}

/// Factory knowing the character sets that need no conversion table
#[derive(Debug, Default)]
pub struct DefaultEncodingFactory;

impl EncodingFactory for DefaultEncodingFactory {
    fn encoding_for(&self, charset: &str) -> Option<Arc<dyn Encoding>> {
        match charset.to_ascii_uppercase().as_str() {
            "UTF8" | "UNICODE_FSS" => Some(Arc::new(Utf8Encoding::named(charset.to_ascii_uppercase()))),
            "NONE" => Some(Arc::new(Utf8Encoding::named("NONE"))),
            "ISO8859_1" => Some(Arc::new(Latin1Encoding)),
            _ => None,
        }
    }

    fn default_encoding(&self) -> Arc<dyn Encoding> {
        Arc::new(Utf8Encoding::default())
    }
}
