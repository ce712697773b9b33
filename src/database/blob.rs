//! Blob operations
//!
//! Blobs are read and written in segments. Closing or cancelling a blob on
//! protocol 11 and later is deferred: the request is queued without
//! reading its response, which is consumed before the next read.

use super::{Database, Transaction};
use crate::connection::DeferredAction;
use crate::params::{bpb, ParameterBuffer};
use crate::protocol::constants::{op, segment};
use crate::xdr::MAX_BLOB_BUFFER_LENGTH;
use crate::{Error, Result};

/// Largest data chunk sent in one blob buffer
const MAX_SEGMENT_SIZE: usize = MAX_BLOB_BUFFER_LENGTH - 2;

/// Direction a blob was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobMode {
    /// Opened for reading with [`Database::open_blob`]
    Input,
    /// Created for writing with [`Database::create_blob`]
    Output,
}

/// Origin of a [`Database::seek_blob`] offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Absolute,
    Relative,
    FromEnd,
}

impl SeekMode {
    fn value(self) -> i32 {
        match self {
            SeekMode::Absolute => 0,
            SeekMode::Relative => 1,
            SeekMode::FromEnd => 2,
        }
    }
}

/// An open blob
#[derive(Debug)]
pub struct Blob {
    handle: i32,
    blob_id: i64,
    mode: BlobMode,
    eof: bool,
}

impl Blob {
    /// Server side handle of the open blob
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Blob id to store in a column or open the blob again
    pub fn blob_id(&self) -> i64 {
        self.blob_id
    }

    pub fn mode(&self) -> BlobMode {
        self.mode
    }

    /// Whether the last segment has been read
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    fn require_mode(&self, mode: BlobMode) -> Result<()> {
        if self.mode != mode {
            return Err(Error::InvalidState {
                expected: format!("{:?} blob", mode),
                actual: format!("{:?} blob", self.mode),
            });
        }
        Ok(())
    }
}

/// Concatenate the `[u16 LE length][bytes]` segments of a get segment reply
fn parse_segments(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;
    while !rest.is_empty() {
        let [lo, hi, tail @ ..] = rest else {
            return Err(Error::Framing("truncated blob segment length".into()));
        };
        let len = usize::from(u16::from_le_bytes([*lo, *hi]));
        if tail.len() < len {
            return Err(Error::Framing(format!(
                "blob segment of {} bytes with {} remaining",
                len,
                tail.len()
            )));
        }
        out.extend_from_slice(&tail[..len]);
        rest = &tail[len..];
    }
    Ok(out)
}

impl Database {
    /// Create a blob for writing
    pub async fn create_blob(
        &mut self,
        transaction: &Transaction,
        bpb: Option<&ParameterBuffer>,
    ) -> Result<Blob> {
        self.open_or_create_blob(op::CREATE_BLOB2, transaction, 0, bpb).await
    }

    /// Open an existing blob for reading
    pub async fn open_blob(
        &mut self,
        transaction: &Transaction,
        blob_id: i64,
        bpb: Option<&ParameterBuffer>,
    ) -> Result<Blob> {
        self.open_or_create_blob(op::OPEN_BLOB2, transaction, blob_id, bpb).await
    }

    async fn open_or_create_blob(
        &mut self,
        operation: i32,
        transaction: &Transaction,
        blob_id: i64,
        bpb: Option<&ParameterBuffer>,
    ) -> Result<Blob> {
        self.require_attached()?;
        transaction.require_active()?;
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(operation).await?;
            match bpb {
                Some(bpb) => bpb.write_to(&mut *out).await?,
                None => out.write_typed(bpb::VERSION1, None).await?,
            }
            out.write_int(transaction.handle()).await?;
            out.write_long(blob_id).await?;
            out.flush().await?;
        }
        let response = self.conn.read_generic_response().await?;
        let blob = if operation == op::CREATE_BLOB2 {
            Blob {
                handle: response.object_handle,
                blob_id: response.blob_id,
                mode: BlobMode::Output,
                eof: false,
            }
        } else {
            Blob {
                handle: response.object_handle,
                blob_id,
                mode: BlobMode::Input,
                eof: false,
            }
        };
        tracing::trace!(handle = blob.handle, blob_id = blob.blob_id, mode = ?blob.mode, "blob opened");
        Ok(blob)
    }

    /// Read up to `size` bytes of segment data
    ///
    /// Returns an empty vector once the blob is at its end.
    pub async fn get_segment(&mut self, blob: &mut Blob, size: usize) -> Result<Vec<u8>> {
        self.require_attached()?;
        blob.require_mode(BlobMode::Input)?;
        if blob.eof {
            return Ok(Vec::new());
        }
        let requested = size.clamp(1, MAX_SEGMENT_SIZE) as i32;
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(op::GET_SEGMENT).await?;
            out.write_int(blob.handle).await?;
            out.write_int(requested).await?;
            out.write_int(0).await?;
            out.flush().await?;
        }
        let response = self.conn.read_generic_response().await?;
        if response.object_handle == segment::EOF {
            blob.eof = true;
        }
        parse_segments(&response.data)
    }

    /// Write `data` as one or more segments
    ///
    /// Data longer than a single blob buffer is split. Empty data writes
    /// nothing.
    pub async fn put_segment(&mut self, blob: &mut Blob, data: &[u8]) -> Result<()> {
        self.require_attached()?;
        blob.require_mode(BlobMode::Output)?;
        for chunk in data.chunks(MAX_SEGMENT_SIZE) {
            {
                let output = self.conn.output()?;
                let mut out = output.lock().await;
                out.write_int(op::BATCH_SEGMENTS).await?;
                out.write_int(blob.handle).await?;
                out.write_blob_buffer(chunk).await?;
                out.flush().await?;
            }
            self.conn.read_generic_response().await?;
        }
        Ok(())
    }

    /// Move the read position; returns the new position
    pub async fn seek_blob(&mut self, blob: &mut Blob, mode: SeekMode, offset: i32) -> Result<i32> {
        self.require_attached()?;
        blob.require_mode(BlobMode::Input)?;
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(op::SEEK_BLOB).await?;
            out.write_int(blob.handle).await?;
            out.write_int(mode.value()).await?;
            out.write_int(offset).await?;
            out.flush().await?;
        }
        let response = self.conn.read_generic_response().await?;
        blob.eof = false;
        Ok(response.object_handle)
    }

    /// Request blob information items
    pub async fn blob_info(&mut self, blob: &Blob, items: &[u8], max_len: i32) -> Result<Vec<u8>> {
        self.require_attached()?;
        self.info_request(op::INFO_BLOB, blob.handle, items, max_len).await
    }

    /// Close the blob, keeping written data
    pub async fn close_blob(&mut self, blob: Blob) -> Result<()> {
        self.release_blob(op::CLOSE_BLOB, "close_blob", blob).await
    }

    /// Close the blob, discarding written data
    pub async fn cancel_blob(&mut self, blob: Blob) -> Result<()> {
        self.release_blob(op::CANCEL_BLOB, "cancel_blob", blob).await
    }

    async fn release_blob(&mut self, operation: i32, label: &'static str, blob: Blob) -> Result<()> {
        self.require_attached()?;
        if !self.conn.version()?.supports_deferred() {
            return self.conn.release_object(operation, blob.handle).await;
        }
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(operation).await?;
            out.write_int(blob.handle).await?;
        }
        self.conn.defer(DeferredAction { label });
        tracing::trace!(handle = blob.handle, action = label, "blob release deferred");
        Ok(())
    }
}
