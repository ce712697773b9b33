//! Wire connection: socket, codec streams and response reading

mod handshake;

use super::config::ConnectionConfig;
use super::state::ConnectionState;
use super::transport::{self, SocketOptions};
use crate::auth::ClientAuthBlock;
use crate::crypt::KnownServerKey;
use crate::encoding::{Encoding, Utf8Encoding};
use crate::metrics::{counters, histograms};
use crate::protocol::constants::{cancel, op};
use crate::protocol::{
    FetchResponse, GenericResponse, ProtocolDescriptor, ProtocolVersion, Response, SqlResponse,
};
use crate::xdr::{XdrReader, XdrWriter};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::Instrument;

pub(crate) type Input = XdrReader<OwnedReadHalf>;
pub(crate) type Output = Arc<Mutex<XdrWriter<OwnedWriteHalf>>>;

/// Kind of an `op_cancel` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    /// Disable cancellation for the attachment
    Disable,
    /// Enable cancellation again
    Enable,
    /// Cancel the running operation
    Raise,
    /// Abort the connection
    Abort,
}

impl CancelKind {
    /// Value sent on the wire
    pub fn value(self) -> i32 {
        match self {
            CancelKind::Disable => cancel::DISABLE,
            CancelKind::Enable => cancel::ENABLE,
            CancelKind::Raise => cancel::RAISE,
            CancelKind::Abort => cancel::ABORT,
        }
    }
}

/// Writes `op_cancel` to a connection from another task
///
/// The handle shares the output stream with its connection and writes the
/// request directly, without waiting for the connection's pending read.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    output: Output,
    version: ProtocolVersion,
}

impl CancelHandle {
    /// Send a cancel request
    ///
    /// [`CancelKind::Abort`] shuts the output stream down instead, which
    /// makes the server drop the attachment.
    pub async fn cancel(&self, kind: CancelKind) -> Result<()> {
        if !self.version.supports_cancel() {
            return Err(Error::NotSupported(format!("cancel on {}", self.version)));
        }
        let mut out = self.output.lock().await;
        if kind == CancelKind::Abort {
            tracing::debug!("aborting connection");
            return out.close().await;
        }
        let mut message = [0u8; 8];
        message[..4].copy_from_slice(&op::CANCEL.to_be_bytes());
        message[4..].copy_from_slice(&kind.value().to_be_bytes());
        tracing::debug!(?kind, "sending cancel");
        out.write_direct(&message).await
    }
}

/// Operation whose response is read before the next blocking read
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeferredAction {
    pub label: &'static str,
}

/// A connection to a Firebird server
///
/// Created unconnected from a [`ConnectionConfig`]. [`WireConnection::socket_connect`]
/// opens the socket and [`WireConnection::identify`] negotiates the protocol.
/// [`WireConnection::attach`] then consumes the connection into a
/// [`Database`](crate::database::Database).
pub struct WireConnection {
    config: ConnectionConfig,
    state: ConnectionState,
    reader: Option<Input>,
    writer: Option<Output>,
    encoding: Arc<dyn Encoding>,
    descriptor: Option<ProtocolDescriptor>,
    architecture: i32,
    minimum_type: i32,
    auth_block: Option<ClientAuthBlock>,
    server_keys: Vec<KnownServerKey>,
    deferred: VecDeque<DeferredAction>,
    connected_at: Option<Instant>,
}

impl fmt::Debug for WireConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireConnection")
            .field("server", &self.config.server)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("state", &self.state)
            .field("protocol", &self.protocol_version())
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

impl WireConnection {
    /// Unconnected connection for `config`
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Unconnected,
            reader: None,
            writer: None,
            encoding: Arc::new(Utf8Encoding::default()),
            descriptor: None,
            architecture: 0,
            minimum_type: 0,
            auth_block: None,
            server_keys: Vec::new(),
            deferred: VecDeque::new(),
            connected_at: None,
        }
    }

    /// Open the socket and run identify
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let mut conn = Self::new(config);
        conn.socket_connect().await?;
        conn.identify().await?;
        Ok(conn)
    }

    /// Open the TCP socket
    ///
    /// Applies the connect timeout, socket buffer size and TCP_NODELAY from
    /// the configuration, then the read timeout to the input stream.
    pub async fn socket_connect(&mut self) -> Result<()> {
        let span = tracing::info_span!(
            "socket_connect",
            server = %self.config.server,
            port = self.config.port
        );
        async {
            self.state.require(ConnectionState::Unconnected)?;
            let encoding = self.config.resolve_encoding()?;
            let options = SocketOptions {
                connect_timeout: self.config.connect_timeout,
                buffer_size: self.config.socket_buffer_size,
                nodelay: self.config.tcp_nodelay,
            };
            let stream = transport::connect_tcp(&self.config.server, self.config.port, options).await?;
            let (read_half, write_half) = stream.into_split();

            let mut reader = XdrReader::new(read_half);
            reader.set_encoding(Arc::clone(&encoding));
            reader.set_read_timeout(self.config.read_timeout);
            let mut writer = XdrWriter::new(write_half);
            writer.set_encoding(Arc::clone(&encoding));

            self.reader = Some(reader);
            self.writer = Some(Arc::new(Mutex::new(writer)));
            self.encoding = encoding;
            self.connected_at = Some(Instant::now());
            self.state.transition(ConnectionState::SocketConnected)?;
            counters::connections_opened();
            tracing::debug!(charset = self.encoding.charset_name(), "connected");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Configuration this connection was created with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Encoding negotiated for strings on this connection
    pub fn encoding(&self) -> &Arc<dyn Encoding> {
        &self.encoding
    }

    /// Protocol version accepted by the server
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.descriptor.map(|d| d.version())
    }

    /// Descriptor the server accepted
    pub fn descriptor(&self) -> Option<&ProtocolDescriptor> {
        self.descriptor.as_ref()
    }

    /// Architecture from the accept reply
    pub fn architecture(&self) -> i32 {
        self.architecture
    }

    /// Packet type from the accept reply
    pub fn minimum_type(&self) -> i32 {
        self.minimum_type
    }

    /// Whether wire encryption is active
    pub fn is_encrypted(&self) -> bool {
        self.reader.as_ref().map_or(false, |r| r.is_encrypted())
    }

    /// Server keys not yet consumed by wire encryption
    pub fn server_keys(&self) -> &[KnownServerKey] {
        &self.server_keys
    }

    /// Read timeout in effect
    pub fn network_timeout(&self) -> Option<Duration> {
        self.reader.as_ref().and_then(|r| r.read_timeout())
    }

    /// Change the read timeout; applies from the next blocking read
    pub fn set_network_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader
            .as_mut()
            .ok_or(Error::ConnectionClosed)?
            .set_read_timeout(timeout);
        Ok(())
    }

    /// Handle for cancelling operations from another task
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        Ok(CancelHandle {
            output: self.output()?,
            version: self.version()?,
        })
    }

    /// Close the output stream, then the input stream and the socket
    ///
    /// Every stream is released even when closing one fails; the failures
    /// are returned together as [`Error::Close`]. The connection cannot be
    /// used afterwards.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }
        let mut errors = Vec::new();
        if let Some(output) = self.writer.take() {
            if let Err(e) = output.lock().await.close().await {
                errors.push(into_io_error(e));
            }
        }
        // Dropping the read half releases the socket once the write half is gone.
        if let Some(mut input) = self.reader.take() {
            input.close();
        }
        self.auth_block = None;
        self.server_keys.clear();
        self.deferred.clear();
        let previous = self.state;
        self.state.transition(ConnectionState::Disconnected)?;
        if previous != ConnectionState::Unconnected {
            counters::connections_closed();
        }
        tracing::debug!(errors = errors.len(), "disconnected");
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Close(errors))
        }
    }

    /// Disconnect after a failure, keeping the original error
    pub(crate) async fn close_quietly(&mut self) {
        if let Err(e) = self.disconnect().await {
            tracing::debug!(error = %e, "ignoring error closing failed connection");
        }
    }

    pub(crate) fn version(&self) -> Result<ProtocolVersion> {
        self.protocol_version().ok_or_else(|| Error::InvalidState {
            expected: ConnectionState::Identified.to_string(),
            actual: self.state.to_string(),
        })
    }

    pub(crate) fn output(&self) -> Result<Output> {
        self.writer.as_ref().map(Arc::clone).ok_or(Error::ConnectionClosed)
    }

    pub(crate) fn input(&mut self) -> Result<&mut Input> {
        self.reader.as_mut().ok_or(Error::ConnectionClosed)
    }

    pub(crate) fn mark_attached(&mut self) -> Result<()> {
        self.state.transition(ConnectionState::Attached)?;
        if let (Some(started), Ok(version)) = (self.connected_at, self.version()) {
            histograms::handshake_duration(version.number(), started.elapsed());
        }
        Ok(())
    }

    /// Queue an action whose response has not been read yet
    pub(crate) fn defer(&mut self, action: DeferredAction) {
        self.deferred.push_back(action);
    }

    /// Next operation code, skipping `op_dummy`
    pub(crate) async fn read_operation(&mut self) -> Result<i32> {
        loop {
            let operation = self.input()?.read_int().await?;
            if operation != op::DUMMY {
                return Ok(operation);
            }
            tracing::trace!("skipped op_dummy");
        }
    }

    /// Next operation code after consuming deferred responses
    pub(crate) async fn read_next_operation(&mut self) -> Result<i32> {
        self.process_deferred().await?;
        self.read_operation().await
    }

    async fn process_deferred(&mut self) -> Result<()> {
        while let Some(action) = self.deferred.pop_front() {
            let operation = self.read_operation().await?;
            match self.read_operation_response(operation).await {
                Ok(_) => tracing::trace!(action = action.label, "deferred response read"),
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(action = action.label, error = %e, "deferred operation failed")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read the next response
    ///
    /// Error status vectors become [`Error::Server`]; warnings go to the
    /// configured warning callback.
    pub(crate) async fn read_response(&mut self) -> Result<Response> {
        let operation = self.read_next_operation().await?;
        self.read_operation_response(operation).await
    }

    pub(crate) async fn read_generic_response(&mut self) -> Result<GenericResponse> {
        match self.read_response().await? {
            Response::Generic(response) => Ok(response),
            other => Err(Error::Protocol(format!(
                "expected generic response, got {:?}",
                other
            ))),
        }
    }

    pub(crate) async fn read_operation_response(&mut self, operation: i32) -> Result<Response> {
        let input = self.input()?;
        let response = match operation {
            op::RESPONSE => Response::Generic(GenericResponse::read_from(input).await?),
            op::FETCH_RESPONSE => Response::Fetch(FetchResponse {
                status: input.read_int().await?,
                count: input.read_int().await?,
            }),
            op::SQL_RESPONSE => Response::Sql(SqlResponse {
                count: input.read_int().await?,
            }),
            op::EXIT | op::DISCONNECT => return Err(Error::ConnectionClosed),
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected operation code {} reading response",
                    other
                )))
            }
        };
        match response {
            Response::Generic(generic) => Ok(Response::Generic(self.process_status(generic)?)),
            other => Ok(other),
        }
    }

    pub(crate) fn process_status(&self, response: GenericResponse) -> Result<GenericResponse> {
        if response.status.is_warning() {
            counters::server_warning();
        }
        response.into_result(self.config.warning_callback.as_ref())
    }

    /// Write `operation` and `object_id`, flush and read the response
    pub(crate) async fn release_object(&mut self, operation: i32, object_id: i32) -> Result<()> {
        {
            let output = self.output()?;
            let mut out = output.lock().await;
            out.write_int(operation).await?;
            out.write_int(object_id).await?;
            out.flush().await?;
        }
        self.read_response().await.map(|_| ())
    }
}

fn into_io_error(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}
