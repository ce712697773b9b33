//! Plugin registry injected into connections

use crate::auth::{AuthenticationPluginSpi, LegacyAuthPluginSpi, Srp256PluginSpi, SrpPluginSpi};
use crate::crypt::arc4::Arc4EncryptionPluginSpi;
use crate::crypt::chacha::ChaChaEncryptionPluginSpi;
use crate::crypt::{CryptConnectionInfo, EncryptionIdentifier, EncryptionPluginSpi};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Authentication and encryption providers available to a connection
///
/// [`PluginRegistry::default`] holds `Srp256`, `Srp`, `Legacy_Auth`, `ChaCha`
/// and `Arc4`. Registering a provider under an existing name replaces it.
#[derive(Clone)]
pub struct PluginRegistry {
    auth: Vec<Arc<dyn AuthenticationPluginSpi>>,
    crypt: HashMap<EncryptionIdentifier, Arc<dyn EncryptionPluginSpi>>,
}

impl PluginRegistry {
    /// Registry without any provider
    pub fn empty() -> Self {
        Self {
            auth: Vec::new(),
            crypt: HashMap::new(),
        }
    }

    pub fn with_auth_plugin(mut self, spi: impl AuthenticationPluginSpi + 'static) -> Self {
        self.register_auth_plugin(Arc::new(spi));
        self
    }

    pub fn with_encryption_plugin(mut self, spi: impl EncryptionPluginSpi + 'static) -> Self {
        self.register_encryption_plugin(Arc::new(spi));
        self
    }

    pub fn register_auth_plugin(&mut self, spi: Arc<dyn AuthenticationPluginSpi>) {
        self.auth.retain(|existing| existing.plugin_name() != spi.plugin_name());
        self.auth.push(spi);
    }

    pub fn register_encryption_plugin(&mut self, spi: Arc<dyn EncryptionPluginSpi>) {
        self.crypt.insert(spi.identifier().clone(), spi);
    }

    /// Authentication providers in registration order
    pub fn auth_plugins(&self) -> &[Arc<dyn AuthenticationPluginSpi>] {
        &self.auth
    }

    pub fn auth_plugin(&self, name: &str) -> Option<&Arc<dyn AuthenticationPluginSpi>> {
        self.auth.iter().find(|spi| spi.plugin_name() == name)
    }

    /// Encryption provider for an identifier, regardless of support
    pub fn encryption_plugin(
        &self,
        identifier: &EncryptionIdentifier,
    ) -> Option<&Arc<dyn EncryptionPluginSpi>> {
        self.crypt.get(identifier)
    }

    /// Encryption provider that reports support for this connection
    pub fn supported_encryption_plugin(
        &self,
        identifier: &EncryptionIdentifier,
        info: &CryptConnectionInfo,
    ) -> Option<&Arc<dyn EncryptionPluginSpi>> {
        let spi = self.crypt.get(identifier)?;
        if spi.is_supported(info) {
            Some(spi)
        } else {
            tracing::trace!(
                plugin = %identifier,
                protocol = %info.protocol_version(),
                "encryption plugin not supported on this connection"
            );
            None
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::empty()
            .with_auth_plugin(Srp256PluginSpi)
            .with_auth_plugin(SrpPluginSpi)
            .with_auth_plugin(LegacyAuthPluginSpi)
            .with_encryption_plugin(ChaChaEncryptionPluginSpi)
            .with_encryption_plugin(Arc4EncryptionPluginSpi)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth: Vec<_> = self.auth.iter().map(|spi| spi.plugin_name()).collect();
        let crypt: Vec<_> = self.crypt.keys().map(ToString::to_string).collect();
        f.debug_struct("PluginRegistry")
            .field("auth", &auth)
            .field("crypt", &crypt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolVersion;

    #[test]
    fn test_default_plugins() {
        let registry = PluginRegistry::default();
        let names: Vec<_> = registry.auth_plugins().iter().map(|s| s.plugin_name()).collect();
        assert_eq!(names, vec!["Srp256", "Srp", "Legacy_Auth"]);
        assert!(registry
            .encryption_plugin(&EncryptionIdentifier::symmetric("Arc4"))
            .is_some());
        assert!(registry
            .encryption_plugin(&EncryptionIdentifier::new("Other", "Arc4"))
            .is_none());
    }

    #[test]
    fn test_unsupported_provider_skipped() {
        let registry = PluginRegistry::default();
        let chacha = EncryptionIdentifier::symmetric("ChaCha");
        let v15 = CryptConnectionInfo::new(ProtocolVersion::V15);
        let v16 = CryptConnectionInfo::new(ProtocolVersion::V16);
        assert!(registry.supported_encryption_plugin(&chacha, &v15).is_none());
        assert!(registry.supported_encryption_plugin(&chacha, &v16).is_some());
    }

    #[test]
    fn test_register_replaces_by_name() {
        let registry = PluginRegistry::empty()
            .with_auth_plugin(LegacyAuthPluginSpi)
            .with_auth_plugin(SrpPluginSpi)
            .with_auth_plugin(LegacyAuthPluginSpi);
        let names: Vec<_> = registry.auth_plugins().iter().map(|s| s.plugin_name()).collect();
        assert_eq!(names, vec!["Srp", "Legacy_Auth"]);
        assert!(registry.auth_plugin("Srp").is_some());
    }
}
