//! Wire encryption
//!
//! After authentication the server advertises the keys it can use. For each
//! advertised plugin with a registered provider, a [`CryptSessionConfig`] is
//! built from the auth session key and handed to the plugin, which returns
//! the cipher pair for the channel.

pub mod arc4;
pub mod chacha;
mod keys;
mod session;

pub use keys::{KnownServerKey, PluginSpecificData};
pub use session::CryptSessionConfig;

use crate::protocol::ProtocolVersion;
use crate::Error;
use std::fmt;

/// Key type of session keys produced by authentication plugins
pub const KEY_TYPE_SYMMETRIC: &str = "Symmetric";

/// Key type and plugin name advertised by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncryptionIdentifier {
    key_type: String,
    plugin_name: String,
}

impl EncryptionIdentifier {
    /// Identifier for `plugin_name` under `key_type`
    pub fn new(key_type: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        Self {
            key_type: key_type.into(),
            plugin_name: plugin_name.into(),
        }
    }

    /// Identifier of a plugin using the auth session key
    pub fn symmetric(plugin_name: impl Into<String>) -> Self {
        Self::new(KEY_TYPE_SYMMETRIC, plugin_name)
    }

    /// Key type, e.g. `Symmetric`
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// Encryption plugin name as sent in `op_crypt`
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Whether the plugin keys off the auth session key
    pub fn is_type_symmetric(&self) -> bool {
        self.key_type == KEY_TYPE_SYMMETRIC
    }
}

impl fmt::Display for EncryptionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key_type, self.plugin_name)
    }
}

/// Stream cipher applied to every byte crossing the socket in one direction
pub trait WireCipher: Send {
    /// Encrypt or decrypt `data` in place
    fn apply(&mut self, data: &mut [u8]);
}

/// What a provider may inspect before a plugin is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptConnectionInfo {
    protocol_version: ProtocolVersion,
}

impl CryptConnectionInfo {
    pub fn new(protocol_version: ProtocolVersion) -> Self {
        Self { protocol_version }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }
}

/// Outcome of [`EncryptionPlugin::initialize_encryption`]
pub enum EncryptionInitInfo {
    /// Cipher pair for the channel
    Success {
        identifier: EncryptionIdentifier,
        encrypt: Box<dyn WireCipher>,
        decrypt: Box<dyn WireCipher>,
    },
    /// The plugin could not initialize
    Failure {
        identifier: EncryptionIdentifier,
        cause: Error,
    },
}

impl EncryptionInitInfo {
    pub fn success(
        identifier: EncryptionIdentifier,
        encrypt: Box<dyn WireCipher>,
        decrypt: Box<dyn WireCipher>,
    ) -> Self {
        EncryptionInitInfo::Success {
            identifier,
            encrypt,
            decrypt,
        }
    }

    pub fn failure(identifier: EncryptionIdentifier, cause: Error) -> Self {
        EncryptionInitInfo::Failure { identifier, cause }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EncryptionInitInfo::Success { .. })
    }

    pub fn identifier(&self) -> &EncryptionIdentifier {
        match self {
            EncryptionInitInfo::Success { identifier, .. }
            | EncryptionInitInfo::Failure { identifier, .. } => identifier,
        }
    }
}

impl fmt::Debug for EncryptionInitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionInitInfo::Success { identifier, .. } => {
                f.debug_struct("Success").field("identifier", identifier).finish()
            }
            EncryptionInitInfo::Failure { identifier, cause } => f
                .debug_struct("Failure")
                .field("identifier", identifier)
                .field("cause", cause)
                .finish(),
        }
    }
}

/// Encryption plugin bound to one session config
pub trait EncryptionPlugin {
    fn identifier(&self) -> &EncryptionIdentifier;

    /// Build the cipher pair from the session config
    fn initialize_encryption(&self) -> EncryptionInitInfo;
}

/// Provider of an encryption plugin
pub trait EncryptionPluginSpi: Send + Sync + fmt::Debug {
    fn identifier(&self) -> &EncryptionIdentifier;

    /// Whether the plugin can work on this connection
    fn is_supported(&self, _info: &CryptConnectionInfo) -> bool {
        true
    }

    fn create_plugin<'a>(&self, config: &'a CryptSessionConfig) -> Box<dyn EncryptionPlugin + 'a>;
}

/// Data of an `op_crypt_key_callback` exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbCryptData {
    plugin_data: Option<Vec<u8>>,
    reply_size: i32,
}

impl DbCryptData {
    pub fn new(plugin_data: Option<Vec<u8>>, reply_size: i32) -> Self {
        Self {
            plugin_data,
            reply_size,
        }
    }

    pub fn plugin_data(&self) -> Option<&[u8]> {
        self.plugin_data.as_deref()
    }

    /// Size the server expects for the reply; only sent from protocol 15
    pub fn reply_size(&self) -> i32 {
        self.reply_size
    }
}

/// Answers database encryption key callbacks from the server
pub trait DbCryptCallback: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn handle_callback(&self, server_data: &DbCryptData) -> crate::Result<DbCryptData>;
}

/// Callback replying with empty data
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDbCryptCallback;

impl DbCryptCallback for EmptyDbCryptCallback {
    fn name(&self) -> &str {
        "empty"
    }

    fn handle_callback(&self, _server_data: &DbCryptData) -> crate::Result<DbCryptData> {
        Ok(DbCryptData::default())
    }
}
