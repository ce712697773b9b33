//! `ChaCha` wire encryption
//!
//! ChaCha20 with a 12-byte nonce. The key is the SHA-256 digest of the
//! session key and the nonce comes from the server's plugin specific data.
//! Offered from protocol 16.

use super::{
    CryptConnectionInfo, CryptSessionConfig, EncryptionIdentifier, EncryptionInitInfo,
    EncryptionPlugin, EncryptionPluginSpi, WireCipher,
};
use crate::protocol::ProtocolVersion;
use crate::{Error, Result};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use zeroize::Zeroize;

pub const CHACHA_NAME: &str = "ChaCha";

const NONCE_LEN: usize = 12;

/// One direction of a ChaCha20 channel
pub struct ChaChaCipher {
    cipher: ChaCha20,
}

impl ChaChaCipher {
    /// Cipher keyed by SHA-256 of `session_key`
    ///
    /// Fails unless `nonce` is exactly 12 bytes.
    pub fn new(session_key: &[u8], nonce: &[u8]) -> Result<Self> {
        if nonce.len() != NONCE_LEN {
            return Err(Error::Encryption(format!(
                "ChaCha: expected {} bytes of nonce, got {}",
                NONCE_LEN,
                nonce.len()
            )));
        }
        let mut key: [u8; 32] = Sha256::digest(session_key).into();
        let cipher = ChaCha20::new_from_slices(&key, nonce)
            .map_err(|_| Error::Encryption("ChaCha: invalid key or nonce".into()));
        key.zeroize();
        Ok(Self { cipher: cipher? })
    }
}

impl WireCipher for ChaChaCipher {
    fn apply(&mut self, data: &mut [u8]) {
        self.cipher.apply_keystream(data);
    }
}

fn identifier() -> &'static EncryptionIdentifier {
    static ID: OnceLock<EncryptionIdentifier> = OnceLock::new();
    ID.get_or_init(|| EncryptionIdentifier::symmetric(CHACHA_NAME))
}

#[derive(Debug)]
pub struct ChaChaEncryptionPlugin<'a> {
    config: &'a CryptSessionConfig,
}

impl ChaChaEncryptionPlugin<'_> {
    fn ciphers(&self) -> Result<(ChaChaCipher, ChaChaCipher)> {
        let nonce = self
            .config
            .specific_data()
            .ok_or_else(|| Error::Encryption("ChaCha: server sent no nonce".into()))?;
        Ok((
            ChaChaCipher::new(self.config.encrypt_key(), nonce)?,
            ChaChaCipher::new(self.config.decrypt_key(), nonce)?,
        ))
    }
}

impl EncryptionPlugin for ChaChaEncryptionPlugin<'_> {
    fn identifier(&self) -> &EncryptionIdentifier {
        identifier()
    }

    fn initialize_encryption(&self) -> EncryptionInitInfo {
        match self.ciphers() {
            Ok((encrypt, decrypt)) => {
                EncryptionInitInfo::success(identifier().clone(), Box::new(encrypt), Box::new(decrypt))
            }
            Err(cause) => EncryptionInitInfo::failure(identifier().clone(), cause),
        }
    }
}

/// Provider of `ChaCha`
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaChaEncryptionPluginSpi;

impl EncryptionPluginSpi for ChaChaEncryptionPluginSpi {
    fn identifier(&self) -> &EncryptionIdentifier {
        identifier()
    }

    fn is_supported(&self, info: &CryptConnectionInfo) -> bool {
        info.protocol_version() >= ProtocolVersion::V16
    }

    fn create_plugin<'a>(&self, config: &'a CryptSessionConfig) -> Box<dyn EncryptionPlugin + 'a> {
        Box::new(ChaChaEncryptionPlugin { config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_session_key_digest() {
        let session_key = [7u8; 20];
        let nonce = [0u8; 12];
        let mut ours = ChaChaCipher::new(&session_key, &nonce).unwrap();
        let key: [u8; 32] = Sha256::digest(session_key).into();
        let mut reference = ChaCha20::new_from_slices(&key, &nonce).unwrap();

        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        ours.apply(&mut a);
        reference.apply_keystream(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_round_trip() {
        let config = CryptSessionConfig::symmetric(
            identifier().clone(),
            &[0x11; 20],
            Some(&b"0123456789ab"[..]),
        )
        .unwrap();
        let plugin = ChaChaEncryptionPluginSpi.create_plugin(&config);
        let EncryptionInitInfo::Success { mut encrypt, .. } = plugin.initialize_encryption() else {
            panic!("ChaCha initialization failed");
        };
        let EncryptionInitInfo::Success { mut decrypt, .. } = plugin.initialize_encryption() else {
            panic!("ChaCha initialization failed");
        };
        let mut data = *b"segment of blob data";
        encrypt.apply(&mut data[..7]);
        encrypt.apply(&mut data[7..]);
        decrypt.apply(&mut data);
        assert_eq!(&data, b"segment of blob data");
    }

    #[test]
    fn test_missing_or_short_nonce() {
        let no_nonce =
            CryptSessionConfig::symmetric(identifier().clone(), &[1; 20], None).unwrap();
        assert!(!ChaChaEncryptionPluginSpi
            .create_plugin(&no_nonce)
            .initialize_encryption()
            .is_success());
        assert!(ChaChaCipher::new(&[1; 20], &[0; 8]).is_err());
    }

    #[test]
    fn test_requires_protocol_16() {
        let spi = ChaChaEncryptionPluginSpi;
        assert!(!spi.is_supported(&CryptConnectionInfo::new(ProtocolVersion::V15)));
        assert!(spi.is_supported(&CryptConnectionInfo::new(ProtocolVersion::V16)));
    }
}
