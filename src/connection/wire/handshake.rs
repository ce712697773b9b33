//! Identify, attach and the authentication / wire encryption exchange

use super::WireConnection;
use crate::auth::block::clean_parameter_buffer;
use crate::auth::{AuthCredentials, ClientAuthBlock};
use crate::connection::config::{ConnectionConfig, WireCrypt};
use crate::connection::state::ConnectionState;
use crate::crypt::{
    CryptConnectionInfo, CryptSessionConfig, DbCryptData, EncryptionIdentifier,
    EncryptionInitInfo, KnownServerKey, WireCipher,
};
use crate::database::Database;
use crate::encoding::{Latin1Encoding, Utf8Encoding};
use crate::metrics::{counters, histograms, labels};
use crate::params::ParameterBuffer;
use crate::protocol::constants::{cnct, op, ptype, ARCH_GENERIC};
use crate::protocol::descriptor::normalize_version;
use crate::protocol::{GenericResponse, ProtocolVersion};
use crate::{Error, Result};
use std::time::Instant;
use tracing::Instrument;

const MAX_CONNECT_PARAM: usize = 255;

/// Authentication payload of `op_cond_accept` / `op_accept_data`
#[derive(Debug)]
pub(super) struct AcceptPacket {
    data: Vec<u8>,
    plugin: String,
}

impl WireConnection {
    /// Send the connect request and process the server's accept
    ///
    /// On success the connection is [`ConnectionState::Identified`] with
    /// the protocol the server picked. A rejection, an unknown protocol or
    /// any I/O failure closes the socket.
    pub async fn identify(&mut self) -> Result<()> {
        self.state.require(ConnectionState::SocketConnected)?;
        let span = tracing::info_span!(
            "identify",
            server = %self.config.server,
            database = %self.config.database
        );
        async {
            match self.identify_inner().await {
                Ok(version) => {
                    counters::identify_completed(labels::OUTCOME_SUCCESS, Some(version.number()));
                    Ok(())
                }
                Err(e) => {
                    let outcome = match e {
                        Error::ConnectionRejected { .. } | Error::UnsupportedProtocol { .. } => {
                            labels::OUTCOME_REJECTED
                        }
                        _ => labels::OUTCOME_ERROR,
                    };
                    counters::identify_completed(outcome, None);
                    self.close_quietly().await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn identify_inner(&mut self) -> Result<ProtocolVersion> {
        let credentials = AuthCredentials::new(self.config.user.clone(), self.config.password.clone());
        let mut auth_block = ClientAuthBlock::new(
            credentials,
            Some(self.config.auth_plugin_list()),
            self.config.registry.auth_plugins(),
        )?;
        let max_offered = self
            .config
            .protocols
            .max_version()
            .ok_or_else(|| Error::Config("no protocol versions to offer".into()))?;
        if max_offered.uses_plugin_auth() {
            auth_block.authenticate_step0()?;
        }
        let user_id = user_identification(&self.config, &auth_block);

        {
            let output = self.output()?;
            let mut out = output.lock().await;
            out.write_int(op::CONNECT).await?;
            out.write_int(op::ATTACH).await?;
            out.write_int(self.config.protocols.connect_version()).await?;
            out.write_int(ARCH_GENERIC).await?;
            out.write_string(&self.config.database).await?;
            out.write_int(self.config.protocols.len() as i32).await?;
            out.write_buffer(Some(&user_id)).await?;
            for descriptor in self.config.protocols.descriptors() {
                out.write_int(descriptor.version().wire_value()).await?;
                out.write_int(descriptor.architecture()).await?;
                out.write_int(descriptor.min_type()).await?;
                out.write_int(descriptor.max_type()).await?;
                out.write_int(descriptor.weight()).await?;
            }
            out.flush().await?;
        }
        tracing::debug!(
            offered = ?self.config.protocols.supported_versions(),
            plugin = auth_block.current_plugin_name(),
            "identify sent"
        );

        let mut operation = self.read_operation().await?;
        while operation == op::CRYPT_KEY_CALLBACK {
            self.handle_crypt_key_callback(max_offered).await?;
            operation = self.read_operation().await?;
        }

        match operation {
            op::ACCEPT | op::COND_ACCEPT | op::ACCEPT_DATA => {
                let input = self.input()?;
                let version = normalize_version(input.read_int().await?);
                let architecture = input.read_int().await?;
                let accept_type = input.read_int().await?;

                let mut packet = None;
                if operation == op::ACCEPT {
                    auth_block.reset_client(None)?;
                } else {
                    let data = input.read_buffer().await?;
                    let plugin = input.read_string().await?;
                    let authenticated = input.read_int().await? == 1;
                    let keys = input.read_buffer().await?;

                    auth_block.set_server_data(data.clone());
                    auth_block.set_auth_complete(authenticated);
                    self.add_server_keys(&keys)?;
                    auth_block.reset_client(Some(&keys))?;
                    auth_block.switch_plugin(&plugin);
                    packet = Some(AcceptPacket { data, plugin });
                }

                if accept_type & ptype::COMPRESS_FLAG != 0 {
                    return Err(Error::Protocol(
                        "server enabled wire compression, which was not requested".into(),
                    ));
                }

                let descriptor = *self.config.protocols.find(version).ok_or_else(|| {
                    Error::UnsupportedProtocol {
                        version,
                        server: self.config.server.clone(),
                        supported: self.config.protocols.supported_versions(),
                    }
                })?;
                self.descriptor = Some(descriptor);
                self.architecture = architecture;
                self.minimum_type = accept_type & ptype::MASK;
                self.auth_block = Some(auth_block);
                self.state.transition(ConnectionState::Identified)?;
                tracing::debug!(
                    protocol = %descriptor.version(),
                    architecture,
                    minimum_type = self.minimum_type,
                    operation,
                    "protocol accepted"
                );

                if operation == op::COND_ACCEPT {
                    self.auth_receive_response(packet).await?;
                }
                Ok(descriptor.version())
            }
            op::RESPONSE => {
                let response = GenericResponse::read_from(self.input()?).await?;
                Err(Error::ConnectionRejected {
                    server: self.config.server.clone(),
                    status: Some(response.status),
                })
            }
            other => {
                tracing::debug!(operation = other, "identify ended without accept");
                Err(Error::ConnectionRejected {
                    server: self.config.server.clone(),
                    status: None,
                })
            }
        }
    }

    /// Attach to the configured database
    ///
    /// Consumes the connection; it is closed if the attach fails.
    pub async fn attach(self) -> Result<Database> {
        let dpb = self.config.database_parameters(self.version()?)?;
        self.attach_or_create(dpb, false).await
    }

    /// Attach with an explicit database parameter buffer
    pub async fn attach_with(self, dpb: ParameterBuffer) -> Result<Database> {
        self.attach_or_create(dpb, false).await
    }

    /// Create the configured database and attach to it
    pub async fn create_database(self) -> Result<Database> {
        let dpb = self.config.database_parameters(self.version()?)?;
        self.attach_or_create(dpb, true).await
    }

    /// Create a database with an explicit database parameter buffer
    pub async fn create_database_with(self, dpb: ParameterBuffer) -> Result<Database> {
        self.attach_or_create(dpb, true).await
    }

    async fn attach_or_create(mut self, dpb: ParameterBuffer, create: bool) -> Result<Database> {
        self.state.require(ConnectionState::Identified)?;
        let span = tracing::info_span!(
            "attach",
            server = %self.config.server,
            database = %self.config.database,
            create
        );
        async move {
            match self.send_attach(dpb, create).await {
                Ok(handle) => {
                    self.mark_attached()?;
                    tracing::info!(handle, encrypted = self.is_encrypted(), "attached");
                    Ok(Database::new(self, handle))
                }
                Err(e) => {
                    self.close_quietly().await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn send_attach(&mut self, mut dpb: ParameterBuffer, create: bool) -> Result<i32> {
        let version = self.version()?;
        if version.uses_plugin_auth() {
            let block = self.auth_block_mut()?;
            if block.is_auth_complete() {
                clean_parameter_buffer(&mut dpb);
            } else {
                block.auth_fill_parameters_block(&mut dpb)?;
            }
        }

        {
            let output = self.output()?;
            let mut out = output.lock().await;
            out.write_int(if create { op::CREATE } else { op::ATTACH }).await?;
            out.write_int(0).await?;
            if version.uses_plugin_auth() {
                out.write_string_with(&self.config.database, &Utf8Encoding::default())
                    .await?;
            } else {
                out.write_string(&self.config.database).await?;
            }
            dpb.write_to(&mut *out).await?;
            out.flush().await?;
        }

        let response = if version.uses_plugin_auth() {
            self.auth_receive_response(None).await?
        } else {
            self.read_generic_response().await?
        };
        Ok(response.object_handle)
    }

    fn auth_block_mut(&mut self) -> Result<&mut ClientAuthBlock> {
        self.auth_block
            .as_mut()
            .ok_or_else(|| Error::Authentication("authentication state missing".into()))
    }

    fn add_server_keys(&mut self, keys: &[u8]) -> Result<()> {
        let parsed = KnownServerKey::parse_keys(keys)?;
        if !parsed.is_empty() {
            tracing::debug!(count = parsed.len(), "server keys received");
        }
        self.server_keys.extend(parsed);
        Ok(())
    }

    /// Run the plugin exchange until the server sends its final response
    ///
    /// `accept` carries the first server round from `op_cond_accept`.
    pub(super) async fn auth_receive_response(
        &mut self,
        mut accept: Option<AcceptPacket>,
    ) -> Result<GenericResponse> {
        let version = self.version()?;
        let started = Instant::now();
        loop {
            let (data, name) = match accept.take() {
                Some(packet) => (packet.data, packet.plugin),
                None => {
                    let operation = self.read_operation().await?;
                    match operation {
                        op::TRUSTED_AUTH => {
                            self.input()?.skip_buffer().await?;
                            return Err(Error::NotSupported("trusted authentication".into()));
                        }
                        op::CONT_AUTH => {
                            let input = self.input()?;
                            let data = input.read_buffer().await?;
                            let name = input.read_string().await?;
                            input.skip_buffer().await?;
                            let keys = input.read_buffer().await?;
                            self.add_server_keys(&keys)?;
                            (data, name)
                        }
                        op::CRYPT_KEY_CALLBACK => {
                            self.handle_crypt_key_callback(version).await?;
                            continue;
                        }
                        op::COND_ACCEPT => {
                            let input = self.input()?;
                            input.skip_bytes(12).await?;
                            let data = input.read_buffer().await?;
                            let name = input.read_string().await?;
                            input.skip_bytes(4).await?;
                            let keys = input.read_buffer().await?;
                            self.add_server_keys(&keys)?;
                            (data, name)
                        }
                        op::RESPONSE => return self.finish_authentication(started).await,
                        other => {
                            return Err(Error::Protocol(format!(
                                "unexpected operation {} during authentication",
                                other
                            )))
                        }
                    }
                }
            };

            let block = self.auth_block_mut()?;
            let switch_to = Some(name).filter(|n| Some(n.as_str()) != block.current_plugin_name());
            if let Some(name) = switch_to.filter(|n| !n.is_empty()) {
                if !block.switch_plugin(&name) {
                    tracing::debug!(plugin = %name, "server requested plugin not available");
                    break;
                }
            }
            let Some(plugin) = block.current_plugin_name().map(str::to_string) else {
                break;
            };
            block.set_server_data(data);
            counters::auth_attempted(&plugin);
            tracing::trace!(plugin = %plugin, "authentication round");
            if let Err(e) = block.authenticate() {
                counters::auth_failed(&plugin, labels::REASON_PLUGIN_ERROR);
                return Err(e);
            }

            let client_data = block.client_data().map(<[u8]>::to_vec);
            let plugin_list = if block.is_first_time() {
                block.set_first_time(false);
                Some(block.plugin_names().unwrap_or_default())
            } else {
                None
            };
            let output = self.output()?;
            let mut out = output.lock().await;
            out.write_int(op::CONT_AUTH).await?;
            out.write_buffer(client_data.as_deref()).await?;
            out.write_string(&plugin).await?;
            match plugin_list {
                Some(list) => out.write_string(&list).await?,
                None => out.write_buffer(None).await?,
            }
            out.write_buffer(None).await?;
            out.flush().await?;
        }

        let plugin = self
            .auth_block
            .as_ref()
            .and_then(|b| b.current_plugin_name())
            .unwrap_or(labels::PLUGIN_UNKNOWN)
            .to_string();
        counters::auth_failed(&plugin, labels::REASON_NO_PLUGIN);
        Err(Error::Authentication(
            "no authentication plugin matches the server's request".into(),
        ))
    }

    async fn finish_authentication(&mut self, started: Instant) -> Result<GenericResponse> {
        let response = GenericResponse::read_from(self.input()?).await?;
        let plugin = self
            .auth_block
            .as_ref()
            .and_then(|b| b.current_plugin_name())
            .unwrap_or(labels::PLUGIN_UNKNOWN)
            .to_string();
        let response = match self.process_status(response) {
            Ok(response) => response,
            Err(e) => {
                counters::auth_failed(&plugin, labels::REASON_SERVER_ERROR);
                return Err(e);
            }
        };

        let block = self.auth_block_mut()?;
        let was_complete = block.is_auth_complete();
        block.set_auth_complete(true);
        self.add_server_keys(&response.data)?;
        if !was_complete {
            counters::auth_successful(&plugin);
            histograms::auth_duration(&plugin, started.elapsed());
            tracing::debug!(plugin = %plugin, "authentication complete");
            if self.config.wire_crypt != WireCrypt::Disabled {
                self.try_known_server_keys().await?;
            }
        }
        Ok(response)
    }

    /// Establish wire encryption with the first usable server key
    ///
    /// Failures of individual plugins are collected. Without any success the
    /// connection fails under [`WireCrypt::Required`] and stays in
    /// cleartext otherwise.
    async fn try_known_server_keys(&mut self) -> Result<()> {
        let span = tracing::info_span!("wire_crypt", wire_crypt = %self.config.wire_crypt);
        async {
            let info = CryptConnectionInfo::new(self.version()?);
            let offered: Vec<_> = self
                .server_keys
                .iter()
                .flat_map(KnownServerKey::plugin_specific_data)
                .collect();
            let mut failures = Vec::new();

            for candidate in offered {
                let identifier = candidate.identifier;
                let Some(spi) = self
                    .config
                    .registry
                    .supported_encryption_plugin(&identifier, &info)
                    .cloned()
                else {
                    continue;
                };
                let init = self
                    .session_config(&identifier, candidate.specific_data.as_deref())
                    .map(|mut config| {
                        let init = spi.create_plugin(&config).initialize_encryption();
                        config.close();
                        init
                    });
                match init {
                    Ok(EncryptionInitInfo::Success {
                        identifier,
                        encrypt,
                        decrypt,
                    }) => {
                        self.enable_encryption(&identifier, encrypt, decrypt).await?;
                        self.server_keys.clear();
                        counters::encryption_established(identifier.plugin_name());
                        tracing::info!(plugin = %identifier, "wire encryption established");
                        return Ok(());
                    }
                    Ok(EncryptionInitInfo::Failure { identifier, cause }) => {
                        counters::encryption_failed(identifier.plugin_name(), labels::REASON_PLUGIN_ERROR);
                        tracing::debug!(plugin = %identifier, error = %cause, "encryption plugin failed");
                        failures.push(cause);
                    }
                    Err(cause) => {
                        counters::encryption_failed(identifier.plugin_name(), labels::REASON_NO_PLUGIN);
                        tracing::debug!(plugin = %identifier, error = %cause, "no session for encryption plugin");
                        failures.push(cause);
                    }
                }
            }

            let detail = failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            if self.config.wire_crypt == WireCrypt::Required {
                return Err(Error::Encryption(if detail.is_empty() {
                    "no compatible wire encryption plugin offered by server".into()
                } else {
                    detail
                }));
            }
            if !failures.is_empty() {
                tracing::warn!(errors = %detail, "wire encryption not established, continuing in cleartext");
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn session_config(
        &self,
        identifier: &EncryptionIdentifier,
        specific_data: Option<&[u8]>,
    ) -> Result<CryptSessionConfig> {
        let block = self
            .auth_block
            .as_ref()
            .ok_or_else(|| Error::Encryption("authentication state missing".into()))?;
        if !block.supports_encryption()? {
            return Err(Error::Encryption(format!(
                "authentication plugin {} does not provide a session key",
                block.current_plugin_name().unwrap_or(labels::PLUGIN_UNKNOWN)
            )));
        }
        let mut key = block.session_key()?;
        let config = CryptSessionConfig::symmetric(identifier.clone(), &key, specific_data);
        zeroize::Zeroize::zeroize(&mut key);
        config
    }

    async fn enable_encryption(
        &mut self,
        identifier: &EncryptionIdentifier,
        encrypt: Box<dyn WireCipher>,
        decrypt: Box<dyn WireCipher>,
    ) -> Result<()> {
        {
            let output = self.output()?;
            let mut out = output.lock().await;
            out.write_int(op::CRYPT).await?;
            out.write_string_with(identifier.plugin_name(), &Latin1Encoding).await?;
            out.write_string_with(identifier.key_type(), &Latin1Encoding).await?;
            out.flush().await?;
            self.input()?.set_cipher(decrypt);
            out.set_cipher(encrypt).await?;
        }
        self.read_response().await.map(|_| ())
    }

    /// Answer a database encryption key request through the configured callback
    async fn handle_crypt_key_callback(&mut self, version: ProtocolVersion) -> Result<()> {
        let sized = version >= ProtocolVersion::V15;
        let input = self.input()?;
        let data = input.read_buffer().await?;
        let reply_size = if sized { input.read_int().await? } else { 0 };

        let callback = &self.config.db_crypt_callback;
        let request = DbCryptData::new(Some(data), reply_size);
        let reply = callback.handle_callback(&request).unwrap_or_else(|e| {
            tracing::warn!(callback = callback.name(), error = %e, "crypt key callback failed");
            DbCryptData::default()
        });

        let output = self.output()?;
        let mut out = output.lock().await;
        out.write_int(op::CRYPT_KEY_CALLBACK).await?;
        out.write_buffer(reply.plugin_data()).await?;
        if sized {
            out.write_int(reply.reply_size()).await?;
        }
        out.flush().await
    }
}

/// User identification block of the connect request
pub(super) fn user_identification(config: &ConnectionConfig, auth_block: &ClientAuthBlock) -> Vec<u8> {
    let mut out = Vec::new();
    auth_block.write_plugin_data(&mut out);

    out.push(cnct::CLIENT_CRYPT);
    out.push(4);
    out.extend_from_slice(&config.wire_crypt.wire_level().to_le_bytes());

    let user = whoami::username();
    let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    write_connect_param(&mut out, cnct::USER, user.as_bytes());
    write_connect_param(&mut out, cnct::HOST, host.as_bytes());

    out.push(cnct::USER_VERIFICATION);
    out.push(0);
    out
}

fn write_connect_param(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    let value = &value[..value.len().min(MAX_CONNECT_PARAM)];
    out.push(tag);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_identification_layout() {
        let config = ConnectionConfig::builder("localhost", "employee")
            .user("sysdba")
            .password("masterkey")
            .auth_plugins("Legacy_Auth")
            .wire_crypt(WireCrypt::Required)
            .build();
        let mut block = ClientAuthBlock::new(
            AuthCredentials::new(config.user.clone(), config.password.clone()),
            Some(config.auth_plugin_list()),
            config.registry.auth_plugins(),
        )
        .unwrap();
        block.authenticate_step0().unwrap();

        let user_id = user_identification(&config, &block);
        assert_eq!(&user_id[..8], &[cnct::LOGIN, 6, b's', b'y', b's', b'd', b'b', b'a']);
        let crypt = [cnct::CLIENT_CRYPT, 4, 2, 0, 0, 0];
        assert!(user_id.windows(crypt.len()).any(|w| w == crypt));
        assert_eq!(&user_id[user_id.len() - 2..], &[cnct::USER_VERIFICATION, 0]);
    }

    #[test]
    fn test_connect_param_truncated() {
        let mut out = Vec::new();
        write_connect_param(&mut out, cnct::HOST, &[b'h'; 300]);
        assert_eq!(out.len(), 257);
        assert_eq!(out[1], 255);
    }
}
