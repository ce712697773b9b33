//! Parameter buffer container and wire layouts

use super::argument::{Argument, ArgumentValue, LengthPrefix};
use super::tags::{bpb, dpb, spb, tpb};
use crate::encoding::Encoding;
use crate::xdr::{XdrEncode, XdrWriter};
use crate::{Error, Result};
use tokio::io::AsyncWrite;

/// Flavor of a parameter buffer, fixing its wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// DPB version 1: 1-byte lengths
    DpbV1,
    /// DPB version 2: 4-byte lengths
    DpbV2,
    /// Transaction parameter buffer
    Tpb,
    /// Service attach buffer, version 2
    SpbAttachV2,
    /// Service attach buffer, version 3: 4-byte lengths
    SpbAttachV3,
    /// Service start request: 2-byte string lengths, unprefixed integers
    ServiceRequest,
    /// Blob parameter buffer
    Bpb,
}

impl BufferKind {
    /// Version bytes that lead the buffer on the wire
    pub fn type_header(self) -> &'static [u8] {
        match self {
            Self::DpbV1 => &[dpb::VERSION1],
            Self::DpbV2 => &[dpb::VERSION2],
            Self::Tpb => &[tpb::VERSION3],
            Self::SpbAttachV2 => &[spb::CURRENT_VERSION],
            Self::SpbAttachV3 => &[spb::CURRENT_VERSION, spb::VERSION3],
            Self::ServiceRequest => &[],
            Self::Bpb => &[bpb::VERSION1],
        }
    }

    /// Whether adding an existing tag replaces the earlier entry
    pub fn replaces_duplicates(self) -> bool {
        matches!(self, Self::Bpb)
    }

    pub(crate) fn string_prefix(self) -> LengthPrefix {
        match self {
            Self::DpbV2 | Self::SpbAttachV3 => LengthPrefix::Four,
            Self::ServiceRequest => LengthPrefix::Two,
            _ => LengthPrefix::One,
        }
    }

    pub(crate) fn byte_prefix(self) -> LengthPrefix {
        match self {
            Self::ServiceRequest => LengthPrefix::None,
            other => other.string_prefix(),
        }
    }

    pub(crate) fn flag_prefix(self) -> LengthPrefix {
        match self {
            Self::Tpb | Self::ServiceRequest => LengthPrefix::None,
            other => other.string_prefix(),
        }
    }

    pub(crate) fn numeric_layout(self) -> (LengthPrefix, usize) {
        match self {
            Self::Bpb => (LengthPrefix::One, 2),
            Self::ServiceRequest => (LengthPrefix::None, 4),
            other => (other.string_prefix(), 4),
        }
    }

    fn is_numeric_tag(self, tag: u8) -> bool {
        match self {
            Self::DpbV1 | Self::DpbV2 => dpb::NUMERIC.contains(&tag),
            Self::SpbAttachV2 | Self::SpbAttachV3 => spb::NUMERIC.contains(&tag),
            Self::Bpb => true,
            Self::Tpb => tag == tpb::LOCK_TIMEOUT,
            Self::ServiceRequest => false,
        }
    }
}

/// Ordered, tagged argument list sent as a DPB, TPB, SPB or BPB
///
/// Arguments serialize in insertion order. Equality compares the argument
/// lists only.
#[derive(Debug, Clone)]
pub struct ParameterBuffer {
    kind: BufferKind,
    arguments: Vec<Argument>,
}

impl PartialEq for ParameterBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.arguments == other.arguments
    }
}

impl Eq for ParameterBuffer {}

impl ParameterBuffer {
    /// Empty buffer of the given flavor
    pub fn new(kind: BufferKind) -> Self {
        Self {
            kind,
            arguments: Vec::new(),
        }
    }

    /// Read-committed, record-version, read-write, wait transaction
    pub fn default_tpb() -> Self {
        let mut tpb = Self::new(BufferKind::Tpb);
        tpb.add_flag(tpb::READ_COMMITTED);
        tpb.add_flag(tpb::REC_VERSION);
        tpb.add_flag(tpb::WRITE);
        tpb.add_flag(tpb::WAIT);
        tpb
    }

    /// Buffer flavor
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Arguments in insertion order
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// Whether the buffer holds no arguments
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Add a tag without value
    pub fn add_flag(&mut self, tag: u8) {
        self.push(Argument::new(tag, ArgumentValue::Flag));
    }

    /// Add a single byte value
    ///
    /// Only tags the flavor reads back as integers take a byte value.
    pub fn add_byte(&mut self, tag: u8, value: u8) -> Result<()> {
        self.require_numeric_tag(tag)?;
        self.push(Argument::new(tag, ArgumentValue::Byte(value)));
        Ok(())
    }

    /// Add an integer in the flavor's numeric width
    ///
    /// Only tags the flavor reads back as integers take an integer value.
    pub fn add_int(&mut self, tag: u8, value: i32) -> Result<()> {
        self.require_numeric_tag(tag)?;
        let (_, width) = self.kind.numeric_layout();
        if width == 2 && !(i32::from(i16::MIN)..=i32::from(u16::MAX)).contains(&value) {
            return Err(Error::ValueTooLarge(format!(
                "value {} of tag {} does not fit 2 bytes",
                value, tag
            )));
        }
        self.push(Argument::new(tag, ArgumentValue::Numeric(value)));
        Ok(())
    }

    /// Add a UTF-8 string
    pub fn add_string(&mut self, tag: u8, value: &str) -> Result<()> {
        self.add_bytes(tag, value.as_bytes())
    }

    /// Add a string in an explicit encoding
    pub fn add_string_with(&mut self, tag: u8, value: &str, encoding: &dyn Encoding) -> Result<()> {
        self.add_bytes(tag, &encoding.encode(value))
    }

    /// Add a binary value
    pub fn add_bytes(&mut self, tag: u8, value: &[u8]) -> Result<()> {
        let max = self.kind.string_prefix().max_len();
        if value.len() > max {
            return Err(Error::ValueTooLarge(format!(
                "value of tag {} is {} bytes, maximum is {}",
                tag,
                value.len(),
                max
            )));
        }
        self.push(Argument::new(tag, ArgumentValue::Bytes(value.to_vec())));
        Ok(())
    }

    /// Remove the first argument with `tag`; returns whether one was removed
    pub fn remove_argument(&mut self, tag: u8) -> bool {
        match self.arguments.iter().position(|a| a.tag() == tag) {
            Some(index) => {
                self.arguments.remove(index);
                true
            }
            None => false,
        }
    }

    /// First argument with `tag`
    pub fn find(&self, tag: u8) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.tag() == tag)
    }

    /// Whether an argument with `tag` is present
    pub fn has_argument(&self, tag: u8) -> bool {
        self.find(tag).is_some()
    }

    /// Argument chain as placed on the wire, without version header
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_to(&mut out);
        out
    }

    /// Argument chain prefixed with the version header
    pub fn to_bytes_with_type(&self) -> Vec<u8> {
        let header = self.kind.type_header();
        let mut out = Vec::with_capacity(header.len() + self.encoded_len());
        out.extend_from_slice(header);
        self.encode_to(&mut out);
        out
    }

    /// Decode an argument chain (without version header)
    pub fn parse(kind: BufferKind, bytes: &[u8]) -> Result<Self> {
        if kind == BufferKind::ServiceRequest {
            return Err(Error::NotSupported(
                "service request buffers depend on the action and cannot be parsed generically".into(),
            ));
        }
        let mut buffer = Self::new(kind);
        let mut pos = 0;
        while pos < bytes.len() {
            let tag = bytes[pos];
            pos += 1;
            let value = if kind == BufferKind::Tpb && !matches!(tag, tpb::LOCK_READ | tpb::LOCK_WRITE | tpb::LOCK_TIMEOUT) {
                ArgumentValue::Flag
            } else {
                let len = read_prefix(bytes, &mut pos, kind.string_prefix())?;
                let data = take(bytes, &mut pos, len)?;
                classify(kind, tag, data)
            };
            buffer.arguments.push(Argument::new(tag, value));
        }
        Ok(buffer)
    }

    /// Decode a buffer that starts with its version header
    pub fn parse_with_type(kind: BufferKind, bytes: &[u8]) -> Result<Self> {
        let header = kind.type_header();
        match bytes.strip_prefix(header) {
            Some(chain) => Self::parse(kind, chain),
            None => Err(Error::Protocol(format!(
                "parameter buffer does not start with version header {:?}",
                header
            ))),
        }
    }

    /// Write the buffer and its version header as one XDR buffer
    ///
    /// Single byte headers go through [`XdrWriter::write_typed`].
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, out: &mut XdrWriter<W>) -> Result<()> {
        match self.kind.type_header() {
            [kind] => out.write_typed(*kind, Some(self)).await,
            _ => out.write_buffer(Some(&self.to_bytes_with_type())).await,
        }
    }

    fn require_numeric_tag(&self, tag: u8) -> Result<()> {
        if self.kind == BufferKind::ServiceRequest || self.kind.is_numeric_tag(tag) {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "tag {} of {:?} does not take a numeric value",
                tag, self.kind
            )))
        }
    }

    fn push(&mut self, argument: Argument) {
        if self.kind.replaces_duplicates() {
            if let Some(existing) = self.arguments.iter_mut().find(|a| a.tag() == argument.tag()) {
                *existing = argument;
                return;
            }
        }
        self.arguments.push(argument);
    }
}

impl XdrEncode for ParameterBuffer {
    fn encoded_len(&self) -> usize {
        self.arguments.iter().map(|a| a.encoded_len(self.kind)).sum()
    }

    fn encode_to(&self, out: &mut Vec<u8>) {
        for argument in &self.arguments {
            argument.write_to(self.kind, out);
        }
    }
}

fn read_prefix(bytes: &[u8], pos: &mut usize, prefix: LengthPrefix) -> Result<usize> {
    let raw = take(bytes, pos, prefix.size())?;
    let mut le = [0u8; 4];
    le[..raw.len()].copy_from_slice(raw);
    Ok(u32::from_le_bytes(le) as usize)
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::Framing(format!("parameter buffer truncated at offset {}", *pos)))?;
    let data = &bytes[*pos..end];
    *pos = end;
    Ok(data)
}

fn classify(kind: BufferKind, tag: u8, data: &[u8]) -> ArgumentValue {
    if data.is_empty() {
        return ArgumentValue::Flag;
    }
    let (_, width) = kind.numeric_layout();
    if kind.is_numeric_tag(tag) {
        if data.len() == 1 {
            return ArgumentValue::Byte(data[0]);
        }
        if data.len() == width {
            let value = match width {
                2 => i32::from(u16::from_le_bytes([data[0], data[1]])),
                _ => i32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            };
            return ArgumentValue::Numeric(value);
        }
    }
    ArgumentValue::Bytes(data.to_vec())
}
