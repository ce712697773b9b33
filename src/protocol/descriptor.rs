//! Protocol descriptors and version negotiation

use super::constants::{ptype, ARCH_GENERIC, CONNECT_VERSION2, CONNECT_VERSION3, FB_PROTOCOL_FLAG, FB_PROTOCOL_MASK};
use crate::params::BufferKind;
use std::fmt;

/// Remote protocol version
///
/// Each variant carries the version-specific behavior of the engine: which
/// DPB flavor is sent, how the password travels and which optional
/// operations exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    /// Firebird 1.x / InterBase 6
    V10,
    /// Firebird 2.1
    V11,
    /// Firebird 2.5
    V12,
    /// Firebird 3.0
    V13,
    /// Firebird 3.0.2
    V15,
    /// Firebird 4.0
    V16,
}

/// How the password is carried during attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMode {
    /// Plain `isc_dpb_password`
    Plain,
    /// `isc_dpb_password_enc` with the legacy hash
    LegacyHash,
    /// Authentication plugins in the identify and attach exchange
    Plugin,
}

impl ProtocolVersion {
    /// All known versions, lowest first
    pub const ALL: [ProtocolVersion; 6] = [
        ProtocolVersion::V10,
        ProtocolVersion::V11,
        ProtocolVersion::V12,
        ProtocolVersion::V13,
        ProtocolVersion::V15,
        ProtocolVersion::V16,
    ];

    /// Protocol number without the version flag
    pub fn number(self) -> i32 {
        match self {
            Self::V10 => 10,
            Self::V11 => 11,
            Self::V12 => 12,
            Self::V13 => 13,
            Self::V15 => 15,
            Self::V16 => 16,
        }
    }

    /// Version value as sent on the wire
    ///
    /// Versions from 11 on carry [`FB_PROTOCOL_FLAG`].
    pub fn wire_value(self) -> i32 {
        match self {
            Self::V10 => 10,
            other => other.number() | FB_PROTOCOL_FLAG,
        }
    }

    /// Resolve a version value from the accept reply
    pub fn from_wire(value: i32) -> Option<Self> {
        let value = normalize_version(value);
        Self::ALL.into_iter().find(|v| v.wire_value() == value)
    }

    /// Parameter buffer flavor used for attach and create
    pub fn dpb_kind(self) -> BufferKind {
        if self >= Self::V13 {
            BufferKind::DpbV2
        } else {
            BufferKind::DpbV1
        }
    }

    /// How the password is transmitted
    pub fn password_mode(self) -> PasswordMode {
        match self {
            Self::V10 => PasswordMode::Plain,
            Self::V11 | Self::V12 => PasswordMode::LegacyHash,
            _ => PasswordMode::Plugin,
        }
    }

    /// Whether responses of some operations may be deferred
    pub fn supports_deferred(self) -> bool {
        self >= Self::V11
    }

    /// Whether `op_cancel` is available
    pub fn supports_cancel(self) -> bool {
        self >= Self::V12
    }

    /// Whether authentication runs through plugins with `op_cont_auth`
    pub fn uses_plugin_auth(self) -> bool {
        self >= Self::V13
    }

    /// Whether `op_crypt` wire encryption is available
    pub fn supports_wire_crypt(self) -> bool {
        self >= Self::V13
    }

    /// Whether `op_ping` is available
    pub fn supports_ping(self) -> bool {
        self >= Self::V13
    }

    /// Whether the server may send `op_crypt_key_callback`
    pub fn supports_crypt_key_callback(self) -> bool {
        self >= Self::V15
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PROTOCOL_VERSION{}", self.number())
    }
}

/// Reinterpret a sign-extended version from the accept reply
///
/// Servers send flagged versions as a 16-bit value, which arrives negative
/// once widened to 32 bits.
pub fn normalize_version(value: i32) -> i32 {
    if value < 0 {
        (value & FB_PROTOCOL_MASK) | FB_PROTOCOL_FLAG
    } else {
        value
    }
}

/// One protocol offered in the identify message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    version: ProtocolVersion,
    architecture: i32,
    min_type: i32,
    max_type: i32,
    weight: i32,
}

impl ProtocolDescriptor {
    /// Create a descriptor
    pub const fn new(
        version: ProtocolVersion,
        architecture: i32,
        min_type: i32,
        max_type: i32,
        weight: i32,
    ) -> Self {
        Self {
            version,
            architecture,
            min_type,
            max_type,
            weight,
        }
    }

    /// Protocol version
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Client architecture
    pub fn architecture(&self) -> i32 {
        self.architecture
    }

    /// Minimum packet type
    pub fn min_type(&self) -> i32 {
        self.min_type
    }

    /// Maximum packet type
    pub fn max_type(&self) -> i32 {
        self.max_type
    }

    /// Preference weight; the server picks the highest it supports
    pub fn weight(&self) -> i32 {
        self.weight
    }
}

/// Ordered set of descriptors offered in one identify message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolCollection {
    descriptors: Vec<ProtocolDescriptor>,
}

impl Default for ProtocolCollection {
    fn default() -> Self {
        let generic = |version, max_type, weight| {
            ProtocolDescriptor::new(version, ARCH_GENERIC, ptype::RPC, max_type, weight)
        };
        Self::new(vec![
            generic(ProtocolVersion::V16, ptype::LAZY_SEND, 12),
            generic(ProtocolVersion::V15, ptype::LAZY_SEND, 10),
            generic(ProtocolVersion::V13, ptype::LAZY_SEND, 8),
            generic(ProtocolVersion::V12, ptype::LAZY_SEND, 6),
            generic(ProtocolVersion::V11, ptype::LAZY_SEND, 4),
            generic(ProtocolVersion::V10, ptype::BATCH_SEND, 2),
        ])
    }
}

impl ProtocolCollection {
    /// Collection with an explicit order
    pub fn new(descriptors: Vec<ProtocolDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Default descriptors restricted to the given versions
    pub fn only(versions: &[ProtocolVersion]) -> Self {
        let descriptors = Self::default()
            .descriptors
            .into_iter()
            .filter(|d| versions.contains(&d.version))
            .collect();
        Self::new(descriptors)
    }

    /// Descriptors in offer order
    pub fn descriptors(&self) -> &[ProtocolDescriptor] {
        &self.descriptors
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor whose wire version equals the server's choice
    pub fn find(&self, wire_version: i32) -> Option<&ProtocolDescriptor> {
        let wire_version = normalize_version(wire_version);
        self.descriptors
            .iter()
            .find(|d| d.version.wire_value() == wire_version)
    }

    /// Layout version of the connect request for this collection
    pub fn connect_version(&self) -> i32 {
        if self.descriptors.iter().any(|d| d.version >= ProtocolVersion::V13) {
            CONNECT_VERSION3
        } else {
            CONNECT_VERSION2
        }
    }

    /// Protocol numbers offered, for error reporting
    pub fn supported_versions(&self) -> Vec<i32> {
        self.descriptors.iter().map(|d| d.version.number()).collect()
    }

    /// Highest offered version
    pub fn max_version(&self) -> Option<ProtocolVersion> {
        self.descriptors.iter().map(|d| d.version).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_version_normalized() {
        // 0x800D sign-extended from 16 bits
        let wire = 0xFFFF_800Du32 as i32;
        assert_eq!(normalize_version(wire), 0x800D);
        assert_eq!(ProtocolVersion::from_wire(wire), Some(ProtocolVersion::V13));
        assert_eq!(ProtocolVersion::from_wire(10), Some(ProtocolVersion::V10));
        assert_eq!(ProtocolVersion::from_wire(14 | FB_PROTOCOL_FLAG), None);
    }

    #[test]
    fn test_find_exact_match() {
        let protocols = ProtocolCollection::default();
        let found = protocols.find(ProtocolVersion::V12.wire_value()).unwrap();
        assert_eq!(found.version(), ProtocolVersion::V12);
        assert!(protocols.find(12).is_none(), "unflagged 12 is not a known version");
    }

    #[test]
    fn test_connect_version() {
        assert_eq!(ProtocolCollection::default().connect_version(), CONNECT_VERSION3);
        let old = ProtocolCollection::only(&[ProtocolVersion::V10, ProtocolVersion::V12]);
        assert_eq!(old.connect_version(), CONNECT_VERSION2);
        assert_eq!(old.supported_versions(), vec![12, 10]);
    }

    #[test]
    fn test_strategy() {
        assert_eq!(ProtocolVersion::V10.password_mode(), PasswordMode::Plain);
        assert_eq!(ProtocolVersion::V12.password_mode(), PasswordMode::LegacyHash);
        assert_eq!(ProtocolVersion::V13.password_mode(), PasswordMode::Plugin);
        assert_eq!(ProtocolVersion::V12.dpb_kind(), BufferKind::DpbV1);
        assert_eq!(ProtocolVersion::V16.dpb_kind(), BufferKind::DpbV2);
        assert!(!ProtocolVersion::V11.supports_cancel());
        assert!(ProtocolVersion::V12.supports_cancel());
        assert!(!ProtocolVersion::V13.supports_crypt_key_callback());
        assert!(ProtocolVersion::V15.supports_crypt_key_callback());
    }

    #[test]
    fn test_weights_descend_with_offer_order() {
        let protocols = ProtocolCollection::default();
        let weights: Vec<i32> = protocols.descriptors().iter().map(|d| d.weight()).collect();
        let mut sorted = weights.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(weights, sorted);
        assert_eq!(protocols.len(), 6);
    }
}
