use super::EncryptionIdentifier;
use crate::{Error, Result};
use std::fmt;
use zeroize::Zeroize;

/// Key material for one encrypted channel
///
/// Keys are copied on construction. [`CryptSessionConfig::close`], also run
/// on drop, overwrites every key byte and the specific data with zeros
/// without shrinking the buffers.
pub struct CryptSessionConfig {
    identifier: EncryptionIdentifier,
    encrypt_key: Vec<u8>,
    decrypt_key: Vec<u8>,
    specific_data: Option<Vec<u8>>,
    closed: bool,
}

impl CryptSessionConfig {
    /// Config using the same key for both directions
    pub fn symmetric(
        identifier: EncryptionIdentifier,
        key: &[u8],
        specific_data: Option<&[u8]>,
    ) -> Result<Self> {
        if !identifier.is_type_symmetric() {
            return Err(Error::Encryption(format!(
                "{} is not a symmetric key type",
                identifier
            )));
        }
        Ok(Self {
            identifier,
            encrypt_key: key.to_vec(),
            decrypt_key: key.to_vec(),
            specific_data: specific_data.map(<[u8]>::to_vec),
            closed: false,
        })
    }

    /// Plugin and key type the keys belong to
    pub fn identifier(&self) -> &EncryptionIdentifier {
        &self.identifier
    }

    /// Key for the outbound cipher
    pub fn encrypt_key(&self) -> &[u8] {
        &self.encrypt_key
    }

    /// Key for the inbound cipher
    pub fn decrypt_key(&self) -> &[u8] {
        &self.decrypt_key
    }

    /// Server data for the plugin, such as the ChaCha nonce
    pub fn specific_data(&self) -> Option<&[u8]> {
        self.specific_data.as_deref()
    }

    /// Whether the key material has been zeroed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Zero all key material in place
    pub fn close(&mut self) {
        self.encrypt_key.as_mut_slice().zeroize();
        self.decrypt_key.as_mut_slice().zeroize();
        if let Some(data) = self.specific_data.as_mut() {
            data.as_mut_slice().zeroize();
        }
        self.closed = true;
    }
}

impl Drop for CryptSessionConfig {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CryptSessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptSessionConfig")
            .field("identifier", &self.identifier)
            .field("key_len", &self.encrypt_key.len())
            .field("has_specific_data", &self.specific_data.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_copies() {
        let mut key = vec![1u8, 2, 3, 4];
        let config =
            CryptSessionConfig::symmetric(EncryptionIdentifier::symmetric("Arc4"), &key, None)
                .unwrap();
        key[0] = 9;
        assert_eq!(config.encrypt_key(), &[1, 2, 3, 4]);
        assert_eq!(config.decrypt_key(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_close_zero_fills() {
        let mut config = CryptSessionConfig::symmetric(
            EncryptionIdentifier::symmetric("ChaCha"),
            &[0xAB; 20],
            Some(&[0xCD; 12][..]),
        )
        .unwrap();
        config.close();
        assert!(config.is_closed());
        assert_eq!(config.encrypt_key(), &[0u8; 20]);
        assert_eq!(config.decrypt_key(), &[0u8; 20]);
        assert_eq!(config.specific_data(), Some(&[0u8; 12][..]));
    }

    #[test]
    fn test_non_symmetric_rejected() {
        let err = CryptSessionConfig::symmetric(
            EncryptionIdentifier::new("RSA", "Arc4"),
            &[1; 20],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Encryption(_)));
    }

    #[test]
    fn test_debug_hides_keys() {
        let config =
            CryptSessionConfig::symmetric(EncryptionIdentifier::symmetric("Arc4"), &[0x5A; 4], None)
                .unwrap();
        assert!(!format!("{:?}", config).contains("90"));
    }
}
