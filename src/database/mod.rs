//! Operations on an attached database
//!
//! A [`Database`] owns the [`WireConnection`] it was attached through.
//! Transactions and blobs are plain handles; every request goes through
//! `&mut Database` so a connection serves one request at a time.

mod blob;
mod events;
mod transaction;

pub use blob::{Blob, BlobMode, SeekMode};
pub use events::{EventHandle, EventNotification};
pub use transaction::Transaction;

use crate::connection::{CancelHandle, CancelKind, ConnectionState, WireConnection};
use crate::params::ParameterBuffer;
use crate::protocol::constants::op;
use crate::protocol::ProtocolVersion;
use crate::{Error, Result};
use events::EventChannel;
use tracing::Instrument;

/// An attachment to a Firebird database
#[derive(Debug)]
pub struct Database {
    conn: WireConnection,
    handle: i32,
    events: Option<EventChannel>,
}

impl Database {
    pub(crate) fn new(conn: WireConnection, handle: i32) -> Self {
        Self {
            conn,
            handle,
            events: None,
        }
    }

    /// Server side handle of the attachment
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Underlying connection
    pub fn connection(&self) -> &WireConnection {
        &self.conn
    }

    /// Underlying connection, for timeouts and cancel handles
    pub fn connection_mut(&mut self) -> &mut WireConnection {
        &mut self.conn
    }

    /// Negotiated protocol version
    pub fn protocol_version(&self) -> Result<ProtocolVersion> {
        self.conn.version()
    }

    /// Whether the attachment is still usable
    pub fn is_attached(&self) -> bool {
        self.conn.state() == ConnectionState::Attached
    }

    fn require_attached(&self) -> Result<()> {
        self.conn.state().require(ConnectionState::Attached)
    }

    /// Detach and close the connection
    ///
    /// `op_detach` and `op_disconnect` are sent together; the server's reply
    /// is not awaited. The event channel, if open, is closed first.
    pub async fn detach(mut self) -> Result<()> {
        self.require_attached()?;
        let span = tracing::info_span!("detach", handle = self.handle);
        async move {
            self.close_event_channel().await;
            let sent = self.send_detach().await;
            let closed = self.conn.disconnect().await;
            sent.and(closed)
        }
        .instrument(span)
        .await
    }

    async fn send_detach(&mut self) -> Result<()> {
        let output = self.conn.output()?;
        let mut out = output.lock().await;
        out.write_int(op::DETACH).await?;
        out.write_int(self.handle).await?;
        out.write_int(op::DISCONNECT).await?;
        out.flush().await
    }

    /// Drop the database and close the connection
    pub async fn drop_database(mut self) -> Result<()> {
        self.require_attached()?;
        let span = tracing::info_span!("drop_database", handle = self.handle);
        async move {
            self.close_event_channel().await;
            let result = self.conn.release_object(op::DROP_DATABASE, self.handle).await;
            self.conn.close_quietly().await;
            result
        }
        .instrument(span)
        .await
    }

    /// Start a transaction with the given transaction parameter buffer
    pub async fn start_transaction(&mut self, tpb: &ParameterBuffer) -> Result<Transaction> {
        self.require_attached()?;
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(op::TRANSACTION).await?;
            out.write_int(self.handle).await?;
            tpb.write_to(&mut *out).await?;
            out.flush().await?;
        }
        let response = self.conn.read_generic_response().await?;
        tracing::debug!(transaction = response.object_handle, "transaction started");
        Ok(Transaction::new(response.object_handle))
    }

    /// Execute a statement without preparing it
    pub async fn execute_immediate(&mut self, sql: &str, transaction: &Transaction) -> Result<()> {
        self.require_attached()?;
        transaction.require_active()?;
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(op::EXEC_IMMEDIATE).await?;
            out.write_int(transaction.handle()).await?;
            out.write_int(self.handle).await?;
            out.write_int(self.conn.config().sql_dialect).await?;
            out.write_string(sql).await?;
            out.write_buffer(None).await?;
            out.write_int(0).await?;
            out.flush().await?;
        }
        self.conn.read_generic_response().await.map(|_| ())
    }

    /// Request database information items
    ///
    /// Returns the raw info buffer; `max_len` bounds the server's reply.
    pub async fn database_info(&mut self, items: &[u8], max_len: i32) -> Result<Vec<u8>> {
        self.require_attached()?;
        self.info_request(op::INFO_DATABASE, self.handle, items, max_len).await
    }

    pub(crate) async fn info_request(
        &mut self,
        operation: i32,
        object: i32,
        items: &[u8],
        max_len: i32,
    ) -> Result<Vec<u8>> {
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(operation).await?;
            out.write_int(object).await?;
            out.write_int(0).await?;
            out.write_buffer(Some(items)).await?;
            out.write_int(max_len).await?;
            out.flush().await?;
        }
        Ok(self.conn.read_generic_response().await?.data)
    }

    /// Check the connection is alive; protocol 13 and later
    pub async fn ping(&mut self) -> Result<()> {
        self.require_attached()?;
        let version = self.conn.version()?;
        if !version.supports_ping() {
            return Err(Error::NotSupported(format!("ping on {}", version)));
        }
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(op::PING).await?;
            out.flush().await?;
        }
        self.conn.read_response().await.map(|_| ())
    }

    /// Cancel or abort the running operation from this task
    ///
    /// Use [`Database::cancel_handle`] to cancel from another task.
    /// [`CancelKind::Abort`] disconnects.
    pub async fn cancel_operation(&mut self, kind: CancelKind) -> Result<()> {
        if kind == CancelKind::Abort {
            tracing::debug!(handle = self.handle, "abort requested");
            self.close_event_channel().await;
            return self.conn.disconnect().await;
        }
        self.conn.cancel_handle()?.cancel(kind).await
    }

    /// Handle for cancelling operations from another task; protocol 12 and later
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        self.conn.cancel_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;

    #[tokio::test]
    async fn test_requests_fail_when_not_attached() {
        let conn = WireConnection::new(ConnectionConfig::builder("localhost", "employee").build());
        let mut db = Database::new(conn, 7);
        assert_eq!(db.handle(), 7);
        assert!(!db.is_attached());
        let err = db
            .start_transaction(&ParameterBuffer::default_tpb())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert!(matches!(db.ping().await, Err(Error::InvalidState { .. })));
    }
}
