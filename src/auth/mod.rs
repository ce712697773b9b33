//! Client authentication
//!
//! Protocol 13 and later negotiate a plugin during connect and may exchange
//! several rounds of plugin data. Older protocols send the legacy password
//! hash in the attach parameters.

pub mod block;
pub mod legacy;
pub mod plugin;
pub mod srp;

pub use block::{ClientAuthBlock, DEFAULT_AUTH_PLUGINS};
pub use legacy::{legacy_hash, LegacyAuthPluginSpi, LEGACY_AUTH_NAME};
pub use plugin::{
    normalize_login, AuthCredentials, AuthStatus, AuthenticationPlugin, AuthenticationPluginSpi,
};
pub use srp::{Srp256PluginSpi, SrpPluginSpi, SRP256_NAME, SRP_NAME};
