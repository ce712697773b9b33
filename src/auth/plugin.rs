//! Authentication plugin interfaces

use crate::Result;
use std::fmt;
use zeroize::Zeroize;

/// Outcome of one authentication step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Client data is ready; more server data is expected
    Continue,
    /// Client data is ready and final
    Success,
    /// The plugin cannot be used; try the next one
    NotApplicable,
}

/// Login and password an attempt authenticates with
///
/// The password is wiped when the credentials are dropped.
#[derive(Clone, Default)]
pub struct AuthCredentials {
    login: Option<String>,
    password: Option<String>,
}

impl AuthCredentials {
    /// Credentials from an optional login and password
    pub fn new(login: Option<String>, password: Option<String>) -> Self {
        Self { login, password }
    }

    /// Login as configured
    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    /// Login as the server compares it; see [`normalize_login`]
    pub fn normalized_login(&self) -> Option<String> {
        self.login.as_deref().map(normalize_login)
    }

    /// Password
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Drop for AuthCredentials {
    fn drop(&mut self) {
        if let Some(password) = self.password.as_mut() {
            password.zeroize();
        }
    }
}

/// Upper-case a login unless it is enclosed in double quotes
///
/// Inside quotes `""` stands for one quote, and a lone quote ends the name.
pub fn normalize_login(login: &str) -> String {
    let quoted = login.len() > 2 && login.starts_with('"') && login.ends_with('"');
    if !quoted {
        return login.to_uppercase();
    }
    let inner = &login[1..login.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else {
                break;
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Per-attempt client state of one authentication plugin
pub trait AuthenticationPlugin: Send + fmt::Debug {
    /// Plugin name as exchanged with the server
    fn name(&self) -> &str;

    /// Produce client data from the credentials and any server data
    fn authenticate(&mut self, credentials: &AuthCredentials) -> Result<AuthStatus>;

    /// Data to send to the server, if any
    fn client_data(&self) -> Option<&[u8]>;

    /// Store data received from the server
    fn set_server_data(&mut self, data: Vec<u8>);

    /// Whether non-empty server data was received
    fn has_server_data(&self) -> bool;

    /// Whether [`AuthenticationPlugin::session_key`] can succeed
    fn generates_session_key(&self) -> bool;

    /// Key for wire encryption; an error for plugins without one
    fn session_key(&self) -> Result<Vec<u8>>;
}

/// Factory of fresh plugin instances
pub trait AuthenticationPluginSpi: Send + Sync + fmt::Debug {
    /// Name of the plugins this provider creates
    fn plugin_name(&self) -> &str;

    /// New plugin for one attempt
    fn create_plugin(&self) -> Box<dyn AuthenticationPlugin>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_login() {
        assert_eq!(normalize_login("sysdba"), "SYSDBA");
        assert_eq!(normalize_login("\"a"), "\"A");
        assert_eq!(normalize_login("\"\""), "\"\"");
    }

    #[test]
    fn test_normalize_quoted_login() {
        assert_eq!(normalize_login("\"CaseSensitive\""), "CaseSensitive");
        assert_eq!(normalize_login("\"with\"\"quote\""), "with\"quote");
        assert_eq!(normalize_login("\"stop\"here\""), "stop");
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = AuthCredentials::new(Some("SYSDBA".into()), Some("masterkey".into()));
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("masterkey"));
        assert_eq!(creds.normalized_login().as_deref(), Some("SYSDBA"));
    }
}
