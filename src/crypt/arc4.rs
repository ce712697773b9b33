//! `Arc4` wire encryption
//!
//! RC4 keyed directly with the authentication session key, one keystream per
//! direction.

use super::{
    CryptSessionConfig, EncryptionIdentifier, EncryptionInitInfo, EncryptionPlugin,
    EncryptionPluginSpi, WireCipher,
};
use crate::{Error, Result};
use rc4::consts::{U16, U20, U32};
use rc4::{KeyInit, Rc4, StreamCipher};
use std::sync::OnceLock;

pub const ARC4_NAME: &str = "Arc4";

enum Arc4Stream {
    Key16(Rc4<U16>),
    Key20(Rc4<U20>),
    Key32(Rc4<U32>),
}

/// One direction of an RC4 channel
pub struct Arc4Cipher {
    stream: Arc4Stream,
}

impl Arc4Cipher {
    /// Cipher for a 16, 20 or 32 byte key
    pub fn new(key: &[u8]) -> Result<Self> {
        let invalid = || Error::Encryption(format!("Arc4: unsupported key length {}", key.len()));
        let stream = match key.len() {
            16 => Arc4Stream::Key16(Rc4::new_from_slice(key).map_err(|_| invalid())?),
            20 => Arc4Stream::Key20(Rc4::new_from_slice(key).map_err(|_| invalid())?),
            32 => Arc4Stream::Key32(Rc4::new_from_slice(key).map_err(|_| invalid())?),
            _ => return Err(invalid()),
        };
        Ok(Self { stream })
    }
}

impl WireCipher for Arc4Cipher {
    fn apply(&mut self, data: &mut [u8]) {
        match &mut self.stream {
            Arc4Stream::Key16(rc4) => rc4.apply_keystream(data),
            Arc4Stream::Key20(rc4) => rc4.apply_keystream(data),
            Arc4Stream::Key32(rc4) => rc4.apply_keystream(data),
        }
    }
}

fn identifier() -> &'static EncryptionIdentifier {
    static ID: OnceLock<EncryptionIdentifier> = OnceLock::new();
    ID.get_or_init(|| EncryptionIdentifier::symmetric(ARC4_NAME))
}

/// `Arc4` bound to a session config
#[derive(Debug)]
pub struct Arc4EncryptionPlugin<'a> {
    config: &'a CryptSessionConfig,
}

impl EncryptionPlugin for Arc4EncryptionPlugin<'_> {
    fn identifier(&self) -> &EncryptionIdentifier {
        identifier()
    }

    fn initialize_encryption(&self) -> EncryptionInitInfo {
        let ciphers = Arc4Cipher::new(self.config.encrypt_key())
            .and_then(|enc| Ok((enc, Arc4Cipher::new(self.config.decrypt_key())?)));
        match ciphers {
            Ok((encrypt, decrypt)) => {
                EncryptionInitInfo::success(identifier().clone(), Box::new(encrypt), Box::new(decrypt))
            }
            Err(cause) => EncryptionInitInfo::failure(identifier().clone(), cause),
        }
    }
}

/// Provider of `Arc4`
#[derive(Debug, Default, Clone, Copy)]
pub struct Arc4EncryptionPluginSpi;

impl EncryptionPluginSpi for Arc4EncryptionPluginSpi {
    fn identifier(&self) -> &EncryptionIdentifier {
        identifier()
    }

    fn create_plugin<'a>(&self, config: &'a CryptSessionConfig) -> Box<dyn EncryptionPlugin + 'a> {
        Box::new(Arc4EncryptionPlugin { config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: &[u8]) -> CryptSessionConfig {
        CryptSessionConfig::symmetric(identifier().clone(), key, None).unwrap()
    }

    #[test]
    fn test_rc4_known_keystream() {
        // RFC 6229, 128-bit key 0x0102..10, keystream offset 0
        let key: Vec<u8> = (1..=16).collect();
        let mut cipher = Arc4Cipher::new(&key).unwrap();
        let mut data = [0u8; 8];
        cipher.apply(&mut data);
        assert_eq!(data, [0x9a, 0xc7, 0xcc, 0x9a, 0x60, 0x9d, 0x1e, 0xf7]);
    }

    #[test]
    fn test_pair_round_trip() {
        let config = config(&[0x42; 20]);
        let plugin = Arc4EncryptionPluginSpi.create_plugin(&config);
        let client = plugin.initialize_encryption();
        let server = plugin.initialize_encryption();
        let (
            EncryptionInitInfo::Success { mut encrypt, .. },
            EncryptionInitInfo::Success { mut decrypt, .. },
        ) = (client, server)
        else {
            panic!("Arc4 initialization failed");
        };

        let mut data = *b"op_attach payload";
        encrypt.apply(&mut data);
        assert_ne!(&data, b"op_attach payload");
        decrypt.apply(&mut data);
        assert_eq!(&data, b"op_attach payload");
    }

    #[test]
    fn test_bad_key_length_is_failure() {
        let config = config(&[1; 7]);
        let info = Arc4EncryptionPluginSpi.create_plugin(&config).initialize_encryption();
        assert!(!info.is_success());
        assert_eq!(info.identifier().plugin_name(), ARC4_NAME);
    }
}
