//! Parameter buffer arguments

use super::BufferKind;

/// Width of a length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LengthPrefix {
    None,
    One,
    Two,
    Four,
}

impl LengthPrefix {
    pub(crate) fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    /// Largest value the prefix can describe
    pub(crate) fn max_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::One => u8::MAX as usize,
            Self::Two => u16::MAX as usize,
            Self::Four => i32::MAX as usize,
        }
    }

    fn write(self, len: usize, out: &mut Vec<u8>) {
        let bytes = (len as u32).to_le_bytes();
        out.extend_from_slice(&bytes[..self.size()]);
    }
}

/// Value of an argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgumentValue {
    /// Tag without a value
    Flag,
    /// Single byte value
    Byte(u8),
    /// Integer; width depends on the buffer flavor
    Numeric(i32),
    /// String or binary value
    Bytes(Vec<u8>),
}

/// One tagged entry of a parameter buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument {
    tag: u8,
    value: ArgumentValue,
}

impl Argument {
    pub(crate) fn new(tag: u8, value: ArgumentValue) -> Self {
        Self { tag, value }
    }

    /// Argument tag
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Argument value
    pub fn value(&self) -> &ArgumentValue {
        &self.value
    }

    /// Value as an integer, for numeric and byte arguments
    pub fn as_int(&self) -> Option<i32> {
        match &self.value {
            ArgumentValue::Numeric(v) => Some(*v),
            ArgumentValue::Byte(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    /// Raw value bytes, for string and binary arguments
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            ArgumentValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Value as UTF-8 text, for string arguments
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Serialized size in a buffer of `kind`
    pub(crate) fn encoded_len(&self, kind: BufferKind) -> usize {
        1 + match &self.value {
            ArgumentValue::Flag => kind.flag_prefix().size(),
            ArgumentValue::Byte(_) => kind.byte_prefix().size() + 1,
            ArgumentValue::Numeric(_) => {
                let (prefix, width) = kind.numeric_layout();
                prefix.size() + width
            }
            ArgumentValue::Bytes(b) => kind.string_prefix().size() + b.len(),
        }
    }

    /// Append the serialized argument
    pub(crate) fn write_to(&self, kind: BufferKind, out: &mut Vec<u8>) {
        out.push(self.tag);
        match &self.value {
            ArgumentValue::Flag => kind.flag_prefix().write(0, out),
            ArgumentValue::Byte(b) => {
                kind.byte_prefix().write(1, out);
                out.push(*b);
            }
            ArgumentValue::Numeric(v) => {
                let (prefix, width) = kind.numeric_layout();
                prefix.write(width, out);
                out.extend_from_slice(&v.to_le_bytes()[..width]);
            }
            ArgumentValue::Bytes(b) => {
                kind.string_prefix().write(b.len(), out);
                out.extend_from_slice(b);
            }
        }
    }
}
