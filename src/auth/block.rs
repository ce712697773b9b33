//! Client side of plugin negotiation
//!
//! [`ClientAuthBlock`] tracks which plugins the client still considers, which
//! one is current, and the data it exchanges with the server. It produces the
//! auth part of the user identification block and of the DPB/SPB.

use super::plugin::{AuthCredentials, AuthStatus, AuthenticationPlugin, AuthenticationPluginSpi};
use crate::params::clumplet::Clumplets;
use crate::params::{dpb, ParameterBuffer};
use crate::protocol::constants::{cnct, key_tag};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Plugins tried when the configuration names none
pub const DEFAULT_AUTH_PLUGINS: &str = "Srp256,Srp";

const MAX_CONNECT_PARAM: usize = 255;
const MAX_SPECIFIC_DATA_CHUNK: usize = 254;

/// Splits a plugin list on spaces, tabs, commas and semicolons
pub fn split_plugin_list(list: &str) -> Vec<String> {
    list.split([' ', '\t', ',', ';'])
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(",")
}

fn login_error(plugin: &str, err: Error) -> Error {
    match err {
        Error::Authentication(_) => err,
        other => Error::Authentication(format!("{}: {}", plugin, other)),
    }
}

/// Per-attempt authentication state
pub struct ClientAuthBlock {
    credentials: AuthCredentials,
    requested: Vec<String>,
    available: Vec<Arc<dyn AuthenticationPluginSpi>>,
    server_plugins: Vec<String>,
    providers: Vec<Arc<dyn AuthenticationPluginSpi>>,
    current: Option<Box<dyn AuthenticationPlugin>>,
    auth_complete: bool,
    first_time: bool,
}

impl fmt::Debug for ClientAuthBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuthBlock")
            .field("credentials", &self.credentials)
            .field("providers", &self.plugin_names())
            .field("server_plugins", &self.server_plugins)
            .field("current", &self.current_plugin_name())
            .field("auth_complete", &self.auth_complete)
            .field("first_time", &self.first_time)
            .finish()
    }
}

impl ClientAuthBlock {
    /// Create the block for one attach or service attempt
    ///
    /// `plugin_list` defaults to [`DEFAULT_AUTH_PLUGINS`]; names without a
    /// provider in `available` are skipped with a warning. It is an error if
    /// no requested plugin is known.
    pub fn new(
        credentials: AuthCredentials,
        plugin_list: Option<&str>,
        available: &[Arc<dyn AuthenticationPluginSpi>],
    ) -> Result<Self> {
        let list = plugin_list
            .filter(|list| !list.trim().is_empty())
            .unwrap_or(DEFAULT_AUTH_PLUGINS);
        let mut block = Self {
            credentials,
            requested: split_plugin_list(list),
            available: available.to_vec(),
            server_plugins: Vec::new(),
            providers: Vec::new(),
            current: None,
            auth_complete: false,
            first_time: true,
        };
        block.reset_client(None)?;
        Ok(block)
    }

    /// Login as configured
    pub fn login(&self) -> Option<&str> {
        self.credentials.login()
    }

    /// Login as the server compares it
    pub fn normalized_login(&self) -> Option<String> {
        self.credentials.normalized_login()
    }

    pub fn credentials(&self) -> &AuthCredentials {
        &self.credentials
    }

    pub fn is_auth_complete(&self) -> bool {
        self.auth_complete
    }

    pub fn set_auth_complete(&mut self, complete: bool) {
        self.auth_complete = complete;
    }

    pub fn is_first_time(&self) -> bool {
        self.first_time
    }

    pub fn set_first_time(&mut self, first_time: bool) {
        self.first_time = first_time;
    }

    /// Whether a plugin is current
    pub fn has_plugin(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_plugin_name(&self) -> Option<&str> {
        self.current.as_ref().map(|plugin| plugin.name())
    }

    /// Comma separated names of the remaining providers, `None` if there are none
    pub fn plugin_names(&self) -> Option<String> {
        if self.providers.is_empty() {
            return None;
        }
        Some(join_names(self.providers.iter().map(|p| p.plugin_name())))
    }

    /// Client data of the current plugin
    pub fn client_data(&self) -> Option<&[u8]> {
        self.current.as_ref().and_then(|plugin| plugin.client_data())
    }

    /// Pick the first provider whose plugin produces data for the credentials
    ///
    /// Providers answering [`AuthStatus::NotApplicable`] are dropped.
    pub fn authenticate_step0(&mut self) -> Result<()> {
        while let Some(provider) = self.providers.first().cloned() {
            let mut plugin = provider.create_plugin();
            tracing::trace!(plugin = plugin.name(), "trying authentication plugin");
            match plugin
                .authenticate(&self.credentials)
                .map_err(|e| login_error(provider.plugin_name(), e))?
            {
                AuthStatus::Success | AuthStatus::Continue => {
                    self.current = Some(plugin);
                    return Ok(());
                }
                AuthStatus::NotApplicable => {
                    self.providers.remove(0);
                }
            }
        }
        Ok(())
    }

    /// Restart plugin selection, optionally narrowed by server key data
    ///
    /// With `server_info` present and a current plugin already holding
    /// server data, nothing changes. Otherwise the plugin list advertised in
    /// the known-plugins key (if any) replaces the server plugin set, and the
    /// providers are rebuilt from the requested names, keeping only those the
    /// server supports.
    pub fn reset_client(&mut self, server_info: Option<&[u8]>) -> Result<()> {
        if let Some(server_info) = server_info {
            if self
                .current
                .as_ref()
                .map_or(false, |plugin| plugin.has_server_data())
            {
                return Ok(());
            }
            for item in Clumplets::untagged(server_info) {
                let (tag, value) = item?;
                if tag == key_tag::KNOWN_PLUGINS {
                    let names: String = value.iter().map(|&b| char::from(b)).collect();
                    self.server_plugins.clear();
                    for name in split_plugin_list(&names) {
                        if !self.server_plugins.contains(&name) {
                            self.server_plugins.push(name);
                        }
                    }
                    break;
                }
            }
        }

        self.first_time = true;
        self.current = None;
        self.providers = self.supported_providers()?;

        if !self.server_plugins.is_empty() {
            let server_plugins = &self.server_plugins;
            self.providers
                .retain(|provider| server_plugins.iter().any(|name| name == provider.plugin_name()));
            if self.providers.is_empty() {
                return Err(Error::Authentication(
                    "No matching plugins on server".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn supported_providers(&self) -> Result<Vec<Arc<dyn AuthenticationPluginSpi>>> {
        let mut providers = Vec::with_capacity(self.requested.len());
        for name in &self.requested {
            match self.available.iter().find(|spi| spi.plugin_name() == name) {
                Some(spi) => providers.push(Arc::clone(spi)),
                None => tracing::warn!(plugin = %name, "unknown authentication plugin"),
            }
        }
        if providers.is_empty() {
            return Err(Error::Authentication(format!(
                "no known authentication plugins, requested: {}",
                self.requested.join(",")
            )));
        }
        Ok(providers)
    }

    /// Make `name` the current plugin
    ///
    /// Returns `false` if it already is, or if no remaining provider has that
    /// name. Providers listed before the match are dropped.
    pub fn switch_plugin(&mut self, name: &str) -> bool {
        if self.current_plugin_name() == Some(name) {
            return false;
        }
        while let Some(provider) = self.providers.first() {
            if provider.plugin_name() == name {
                self.current = Some(provider.create_plugin());
                return true;
            }
            self.providers.remove(0);
        }
        false
    }

    /// Hand server data to the current plugin
    pub fn set_server_data(&mut self, data: Vec<u8>) {
        match self.current.as_mut() {
            Some(plugin) => plugin.set_server_data(data),
            None => tracing::debug!("received server data without current plugin"),
        }
    }

    /// Run one step of the current plugin
    pub fn authenticate(&mut self) -> Result<AuthStatus> {
        let plugin = self
            .current
            .as_mut()
            .ok_or_else(|| Error::Authentication("no authentication plugin selected".into()))?;
        let name = plugin.name().to_string();
        plugin
            .authenticate(&self.credentials)
            .map_err(|e| login_error(&name, e))
    }

    /// Append login, plugin name, plugin list and client data items to a
    /// user identification block
    pub fn write_plugin_data(&self, out: &mut Vec<u8>) {
        if let Some(login) = self.login() {
            write_param(out, cnct::LOGIN, login.as_bytes());
        }
        if let Some(name) = self.current_plugin_name() {
            write_param(out, cnct::PLUGIN_NAME, name.as_bytes());
        }
        if let Some(list) = self.plugin_names() {
            write_param(out, cnct::PLUGIN_LIST, list.as_bytes());
        }
        if let Some(data) = self.client_data() {
            write_multipart_param(out, cnct::SPECIFIC_DATA, data);
        }
    }

    /// Put client auth data into an attach or service parameter buffer
    ///
    /// The first provider producing data becomes current; providers that do
    /// not apply are dropped. Password items are removed once a plugin takes
    /// over.
    pub fn auth_fill_parameters_block(&mut self, pb: &mut ParameterBuffer) -> Result<()> {
        while let Some(provider) = self.providers.first().cloned() {
            let reused = self.current_plugin_name() == Some(provider.plugin_name());
            let mut plugin = match self.current.take() {
                Some(current) if reused => current,
                other => {
                    self.current = other;
                    provider.create_plugin()
                }
            };
            tracing::trace!(plugin = plugin.name(), "trying authentication plugin");
            let status = plugin
                .authenticate(&self.credentials)
                .map_err(|e| login_error(provider.plugin_name(), e))?;
            match status {
                AuthStatus::Success | AuthStatus::Continue => {
                    self.current = Some(plugin);
                    clean_parameter_buffer(pb);
                    return self.extract_data(pb);
                }
                AuthStatus::NotApplicable => {
                    tracing::trace!(plugin = provider.plugin_name(), "plugin skipped");
                    if reused {
                        self.current = Some(plugin);
                    }
                    self.providers.remove(0);
                }
            }
        }
        Ok(())
    }

    fn extract_data(&mut self, pb: &mut ParameterBuffer) -> Result<()> {
        let Some(data) = self.client_data().filter(|data| !data.is_empty()) else {
            return Ok(());
        };
        let data = data.to_vec();
        if self.first_time {
            if let Some(name) = self.current_plugin_name().map(str::to_string) {
                pb.add_string(dpb::AUTH_PLUGIN_NAME, &name)?;
            }
            if let Some(list) = self.plugin_names() {
                pb.add_string(dpb::AUTH_PLUGIN_LIST, &list)?;
            }
            self.first_time = false;
        }
        pb.add_bytes(dpb::SPECIFIC_AUTH_DATA, &data)
    }

    /// Whether the current plugin yields a session key for wire encryption
    pub fn supports_encryption(&self) -> Result<bool> {
        self.current
            .as_ref()
            .map(|plugin| plugin.generates_session_key())
            .ok_or_else(no_plugin)
    }

    /// Session key of the current plugin
    pub fn session_key(&self) -> Result<Vec<u8>> {
        self.current.as_ref().ok_or_else(no_plugin)?.session_key()
    }
}

fn no_plugin() -> Error {
    Error::Encryption("no authentication plugin available".into())
}

/// Remove password items a plugin exchange replaces
///
/// DPB and SPB share these tag values.
pub fn clean_parameter_buffer(pb: &mut ParameterBuffer) {
    for tag in [dpb::PASSWORD, dpb::PASSWORD_ENC, dpb::TRUSTED_AUTH] {
        while pb.remove_argument(tag) {}
    }
}

fn write_param(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    let value = &value[..value.len().min(MAX_CONNECT_PARAM)];
    out.push(tag);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
}

// Each part is `tag, len + 1, step, bytes`.
fn write_multipart_param(out: &mut Vec<u8>, tag: u8, data: &[u8]) {
    for (step, chunk) in data.chunks(MAX_SPECIFIC_DATA_CHUNK).enumerate() {
        out.push(tag);
        out.push((chunk.len() + 1) as u8);
        out.push(step as u8);
        out.extend_from_slice(chunk);
    }
}
