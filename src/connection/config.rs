//! Connection configuration

use crate::auth::{legacy_hash, DEFAULT_AUTH_PLUGINS};
use crate::crypt::{DbCryptCallback, EmptyDbCryptCallback};
use crate::encoding::{DefaultEncodingFactory, Encoding, EncodingFactory};
use crate::params::{dpb, ParameterBuffer};
use crate::protocol::constants::DEFAULT_PORT;
use crate::protocol::{
    DefaultWarningCallback, PasswordMode, ProtocolCollection, ProtocolVersion, WarningCallback,
};
use crate::registry::PluginRegistry;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Wire encryption policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireCrypt {
    /// Never encrypt
    Disabled,
    /// Encrypt when the server offers a usable plugin
    #[default]
    Enabled,
    /// Fail the attach unless encryption is established
    Required,
}

impl WireCrypt {
    /// Level sent in `CNCT_client_crypt`
    pub fn wire_level(self) -> i32 {
        match self {
            WireCrypt::Disabled => 0,
            WireCrypt::Enabled => 1,
            WireCrypt::Required => 2,
        }
    }
}

impl FromStr for WireCrypt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "false" => Ok(WireCrypt::Disabled),
            "enabled" | "default" | "true" => Ok(WireCrypt::Enabled),
            "required" => Ok(WireCrypt::Required),
            other => Err(Error::Config(format!("invalid wire_crypt value: {}", other))),
        }
    }
}

impl fmt::Display for WireCrypt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireCrypt::Disabled => write!(f, "disabled"),
            WireCrypt::Enabled => write!(f, "enabled"),
            WireCrypt::Required => write!(f, "required"),
        }
    }
}

/// Connection configuration
///
/// Use [`ConnectionConfig::builder`] to create one.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Server host name or address
    pub server: String,
    /// Server port (default 3050)
    pub port: u16,
    /// Database path or alias as the server resolves it
    pub database: String,
    /// Login
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// SQL role
    pub role: Option<String>,
    /// Connection character set (Firebird name)
    pub charset: Option<String>,
    /// Authentication plugins in preference order (default `Srp256,Srp`)
    pub auth_plugins: Option<String>,
    /// Wire encryption policy
    pub wire_crypt: WireCrypt,
    /// TCP connect timeout
    pub connect_timeout: Option<Duration>,
    /// Read timeout once connected
    pub read_timeout: Option<Duration>,
    /// Socket send and receive buffer size
    pub socket_buffer_size: Option<u32>,
    /// Disable Nagle's algorithm (default true)
    pub tcp_nodelay: bool,
    /// Process name reported to the server
    pub process_name: Option<String>,
    /// Process id reported to the server
    pub process_id: Option<u32>,
    /// SQL dialect (default 3)
    pub sql_dialect: i32,
    /// Protocol versions offered in identify
    pub protocols: ProtocolCollection,
    /// Available auth and encryption plugins
    pub registry: PluginRegistry,
    /// Receives server warnings
    pub warning_callback: Arc<dyn WarningCallback>,
    /// Answers database encryption key callbacks
    pub db_crypt_callback: Arc<dyn DbCryptCallback>,
    /// Resolves `charset` to an encoding
    pub encoding_factory: Arc<dyn EncodingFactory>,
}

impl ConnectionConfig {
    /// Create a builder for a database on a server
    ///
    /// # Examples
    ///
    /// ```
    /// use firebird_wire::connection::{ConnectionConfig, WireCrypt};
    /// use std::time::Duration;
    ///
    /// let config = ConnectionConfig::builder("db.example.com", "employee")
    ///     .user("SYSDBA")
    ///     .password("masterkey")
    ///     .wire_crypt(WireCrypt::Required)
    ///     .connect_timeout(Duration::from_secs(5))
    ///     .build();
    /// assert_eq!(config.port, 3050);
    /// ```
    pub fn builder(server: impl Into<String>, database: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: ConnectionConfig {
                server: server.into(),
                port: DEFAULT_PORT,
                database: database.into(),
                user: None,
                password: None,
                role: None,
                charset: None,
                auth_plugins: None,
                wire_crypt: WireCrypt::default(),
                connect_timeout: None,
                read_timeout: None,
                socket_buffer_size: None,
                tcp_nodelay: true,
                process_name: None,
                process_id: None,
                sql_dialect: 3,
                protocols: ProtocolCollection::default(),
                registry: PluginRegistry::default(),
                warning_callback: Arc::new(DefaultWarningCallback),
                db_crypt_callback: Arc::new(EmptyDbCryptCallback),
                encoding_factory: Arc::new(DefaultEncodingFactory),
            },
        }
    }

    /// Plugin list with the default applied
    pub fn auth_plugin_list(&self) -> &str {
        self.auth_plugins.as_deref().unwrap_or(DEFAULT_AUTH_PLUGINS)
    }

    /// Encoding for the configured character set
    pub fn resolve_encoding(&self) -> Result<Arc<dyn Encoding>> {
        match self.charset.as_deref() {
            None => Ok(self.encoding_factory.default_encoding()),
            Some(charset) => self
                .encoding_factory
                .encoding_for(charset)
                .ok_or_else(|| Error::Config(format!("unknown character set: {}", charset))),
        }
    }

    /// Attach parameters for the negotiated protocol
    ///
    /// Protocols before 13 get the password here; later ones leave it to the
    /// authentication plugins.
    pub fn database_parameters(&self, version: ProtocolVersion) -> Result<ParameterBuffer> {
        let mut pb = ParameterBuffer::new(version.dpb_kind());
        if let Some(charset) = &self.charset {
            pb.add_string(dpb::LC_CTYPE, charset)?;
        }
        pb.add_int(dpb::SQL_DIALECT, self.sql_dialect)?;
        if let Some(user) = &self.user {
            pb.add_string(dpb::USER_NAME, user)?;
        }
        if let Some(password) = &self.password {
            match version.password_mode() {
                PasswordMode::Plain => pb.add_string(dpb::PASSWORD, password)?,
                PasswordMode::LegacyHash => {
                    pb.add_bytes(dpb::PASSWORD_ENC, &legacy_hash(Some(password)))?
                }
                PasswordMode::Plugin => {}
            }
        }
        if let Some(role) = &self.role {
            pb.add_string(dpb::SQL_ROLE_NAME, role)?;
        }
        if let Some(timeout) = self.connect_timeout {
            let secs = i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX);
            pb.add_int(dpb::CONNECT_TIMEOUT, secs)?;
        }
        if let Some(id) = self.process_id {
            pb.add_int(dpb::PROCESS_ID, id as i32)?;
        }
        if let Some(name) = &self.process_name {
            pb.add_string(dpb::PROCESS_NAME, name)?;
        }
        if version.uses_plugin_auth() {
            pb.add_flag(dpb::UTF8_FILENAME);
        }
        Ok(pb)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("role", &self.role)
            .field("charset", &self.charset)
            .field("auth_plugins", &self.auth_plugin_list())
            .field("wire_crypt", &self.wire_crypt)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("protocols", &self.protocols.supported_versions())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ConnectionConfig`]
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set server port
    ///
    /// Default: 3050
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set login user
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self
    }

    /// Set password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set SQL role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.config.role = Some(role.into());
        self
    }

    /// Connection character set, e.g. `UTF8`
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.config.charset = Some(charset.into());
        self
    }

    /// Authentication plugins separated by commas, spaces or semicolons
    pub fn auth_plugins(mut self, plugins: impl Into<String>) -> Self {
        self.config.auth_plugins = Some(plugins.into());
        self
    }

    /// Set wire encryption level
    ///
    /// Default: [`WireCrypt::Enabled`]
    pub fn wire_crypt(mut self, wire_crypt: WireCrypt) -> Self {
        self.config.wire_crypt = wire_crypt;
        self
    }

    /// Set TCP connection timeout
    ///
    /// Default: None (OS default)
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = Some(duration);
        self
    }

    /// Set the read timeout applied to every blocking read
    ///
    /// Default: None (wait indefinitely)
    pub fn read_timeout(mut self, duration: Duration) -> Self {
        self.config.read_timeout = Some(duration);
        self
    }

    /// Set SO_SNDBUF and SO_RCVBUF
    pub fn socket_buffer_size(mut self, size: u32) -> Self {
        self.config.socket_buffer_size = Some(size);
        self
    }

    /// Enable or disable TCP_NODELAY
    ///
    /// Default: true
    pub fn tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.config.tcp_nodelay = nodelay;
        self
    }

    /// Process name reported in the DPB
    pub fn process_name(mut self, name: impl Into<String>) -> Self {
        self.config.process_name = Some(name.into());
        self
    }

    /// Process id reported in the DPB
    pub fn process_id(mut self, id: u32) -> Self {
        self.config.process_id = Some(id);
        self
    }

    /// SQL dialect for attach and immediate statements
    ///
    /// Default: 3
    pub fn sql_dialect(mut self, dialect: i32) -> Self {
        self.config.sql_dialect = dialect;
        self
    }

    /// Protocol versions to offer
    pub fn protocols(mut self, protocols: ProtocolCollection) -> Self {
        self.config.protocols = protocols;
        self
    }

    /// Authentication and encryption plugins to use
    pub fn registry(mut self, registry: PluginRegistry) -> Self {
        self.config.registry = registry;
        self
    }

    /// Receiver for server warnings
    pub fn warning_callback(mut self, callback: Arc<dyn WarningCallback>) -> Self {
        self.config.warning_callback = callback;
        self
    }

    /// Handler for database encryption key callbacks
    pub fn db_crypt_callback(mut self, callback: Arc<dyn DbCryptCallback>) -> Self {
        self.config.db_crypt_callback = callback;
        self
    }

    /// Resolver for the connection character set
    pub fn encoding_factory(mut self, factory: Arc<dyn EncodingFactory>) -> Self {
        self.config.encoding_factory = factory;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}
