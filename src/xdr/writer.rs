//! Buffered XDR writer

use super::XdrEncode;
use crate::crypt::WireCipher;
use crate::encoding::{Encoding, Utf8Encoding};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Size of the accumulation buffer
pub const BUF_SIZE: usize = 32767;

/// Payloads longer than this bypass the buffer
pub const DIRECT_WRITE_THRESHOLD: usize = 256;

/// Largest payload a blob buffer can describe (16-bit length)
pub const MAX_BLOB_BUFFER_LENGTH: usize = i16::MAX as usize;

const ZERO_PAD: [u8; 4] = [0; 4];

/// Buffered writer producing 4-byte aligned XDR fields
///
/// Small writes accumulate in a [`BUF_SIZE`] buffer. Writes larger than
/// [`DIRECT_WRITE_THRESHOLD`], or writes that would overflow the buffer,
/// flush the buffer and go directly to the transport. Once a cipher is
/// installed every byte leaving the writer passes through it.
pub struct XdrWriter<W> {
    inner: Option<W>,
    buf: Vec<u8>,
    scratch: Vec<u8>,
    cipher: Option<Box<dyn WireCipher>>,
    encoding: Arc<dyn Encoding>,
}

impl<W> std::fmt::Debug for XdrWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XdrWriter")
            .field("buffered", &self.buf.len())
            .field("encrypted", &self.cipher.is_some())
            .field("closed", &self.inner.is_none())
            .finish()
    }
}

impl<W: AsyncWrite + Unpin> XdrWriter<W> {
    /// Create a writer over a transport
    pub fn new(inner: W) -> Self {
        Self {
            inner: Some(inner),
            buf: Vec::with_capacity(BUF_SIZE),
            scratch: Vec::new(),
            cipher: None,
            encoding: Arc::new(Utf8Encoding::default()),
        }
    }

    /// Set the encoding used by [`XdrWriter::write_string`]
    pub fn set_encoding(&mut self, encoding: Arc<dyn Encoding>) {
        self.encoding = encoding;
    }

    /// Underlying transport, if not closed
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Number of bytes waiting in the buffer
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Whether a cipher is installed
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Whether the writer has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Write a big-endian 32-bit integer
    pub async fn write_int(&mut self, value: i32) -> Result<()> {
        self.ensure_capacity(4).await?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Write a big-endian 64-bit integer
    pub async fn write_long(&mut self, value: i64) -> Result<()> {
        self.ensure_capacity(8).await?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Write a length-prefixed, padded buffer; `None` writes length 0
    pub async fn write_buffer(&mut self, buffer: Option<&[u8]>) -> Result<()> {
        match buffer {
            None => self.write_int(0).await,
            Some(bytes) => {
                let len = checked_len(bytes.len())?;
                self.write_int(len).await?;
                let pad = 4usize.wrapping_sub(bytes.len()) & 3;
                self.write_raw(bytes, pad).await
            }
        }
    }

    /// Write a blob segment buffer
    ///
    /// Layout: `len + 2` twice, the 16-bit little-endian length, the data,
    /// then padding.
    pub async fn write_blob_buffer(&mut self, buffer: &[u8]) -> Result<()> {
        let len = buffer.len();
        if len > MAX_BLOB_BUFFER_LENGTH {
            return Err(Error::ValueTooLarge(format!(
                "blob buffer of {} bytes exceeds maximum {}",
                len, MAX_BLOB_BUFFER_LENGTH
            )));
        }
        tracing::trace!(len, "write blob buffer");
        self.write_int(len as i32 + 2).await?;
        self.write_int(len as i32 + 2).await?;
        self.ensure_capacity(2).await?;
        self.buf.push((len & 0xff) as u8);
        self.buf.push(((len >> 8) & 0xff) as u8);
        let pad = 4usize.wrapping_sub(len).wrapping_add(2) & 3;
        self.write_raw(buffer, pad).await
    }

    /// Write a string in the writer's encoding
    pub async fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = self.encoding.encode(value);
        self.write_buffer(Some(&bytes)).await
    }

    /// Write a string in an explicit encoding
    pub async fn write_string_with(&mut self, value: &str, encoding: &dyn Encoding) -> Result<()> {
        let bytes = encoding.encode(value);
        self.write_buffer(Some(&bytes)).await
    }

    /// Write a type tag followed by a set of bytes (e.g. a raw parameter buffer)
    ///
    /// `None` writes length 1 and the tag without padding.
    pub async fn write_set(&mut self, kind: u8, bytes: Option<&[u8]>) -> Result<()> {
        match bytes {
            None => {
                self.write_int(1).await?;
                self.ensure_capacity(1).await?;
                self.buf.push(kind);
                Ok(())
            }
            Some(bytes) => {
                let len = bytes.len();
                self.write_int(checked_len(len + 1)?).await?;
                self.ensure_capacity(1).await?;
                self.buf.push(kind);
                let pad = 4usize.wrapping_sub(len + 1) & 3;
                self.write_raw(bytes, pad).await
            }
        }
    }

    /// Write a type tag followed by an encodable item as one sub-message
    pub async fn write_typed(&mut self, kind: u8, item: Option<&dyn XdrEncode>) -> Result<()> {
        let payload = match item {
            Some(item) => {
                let mut payload = Vec::with_capacity(item.encoded_len());
                item.encode_to(&mut payload);
                payload
            }
            None => Vec::new(),
        };
        let size = payload.len() + 1;
        self.write_int(checked_len(size)?).await?;
        self.ensure_capacity(1).await?;
        self.buf.push(kind);
        let pad = 4usize.wrapping_sub(size) & 3;
        self.write_raw(&payload, pad).await
    }

    /// Write raw bytes followed by `pad` zero bytes
    pub async fn write_raw(&mut self, bytes: &[u8], pad: usize) -> Result<()> {
        if bytes.len() > DIRECT_WRITE_THRESHOLD || self.buf.len() + bytes.len() >= BUF_SIZE {
            self.emit_buffer().await?;
            let mut direct = std::mem::take(&mut self.scratch);
            direct.clear();
            direct.extend_from_slice(bytes);
            direct.extend_from_slice(&ZERO_PAD[..pad]);
            self.scratch = self.emit(direct).await?;
        } else {
            self.ensure_capacity(bytes.len() + pad).await?;
            self.buf.extend_from_slice(bytes);
            self.buf.extend_from_slice(&ZERO_PAD[..pad]);
        }
        Ok(())
    }

    /// Flush the buffer, then write `data` straight to the transport
    ///
    /// Used for out-of-band messages such as cancellation.
    pub async fn write_direct(&mut self, data: &[u8]) -> Result<()> {
        self.emit_buffer().await?;
        self.scratch.clear();
        let mut direct = std::mem::take(&mut self.scratch);
        direct.extend_from_slice(data);
        self.scratch = self.emit(direct).await?;
        self.flush_inner().await
    }

    /// Write out buffered bytes and flush the transport
    pub async fn flush(&mut self) -> Result<()> {
        self.emit_buffer().await?;
        self.flush_inner().await
    }

    /// Install the outbound cipher
    ///
    /// Bytes already buffered are flushed in cleartext first.
    pub async fn set_cipher(&mut self, cipher: Box<dyn WireCipher>) -> Result<()> {
        self.flush().await?;
        self.cipher = Some(cipher);
        Ok(())
    }

    /// Flush and shut the transport down; later calls do nothing
    pub async fn close(&mut self) -> Result<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        let flushed = self.flush().await;
        let shutdown = match self.inner.take() {
            Some(mut inner) => inner.shutdown().await.map_err(Error::from),
            None => Ok(()),
        };
        self.buf.clear();
        self.cipher = None;
        flushed.and(shutdown)
    }

    async fn ensure_capacity(&mut self, count: usize) -> Result<()> {
        if BUF_SIZE - self.buf.len() <= count {
            self.emit_buffer().await?;
        }
        Ok(())
    }

    async fn emit_buffer(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.buf);
        let mut pending = self.emit(pending).await?;
        pending.clear();
        self.buf = pending;
        Ok(())
    }

    async fn emit(&mut self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.apply(&mut data);
        }
        let inner = self.inner.as_mut().ok_or(Error::ConnectionClosed)?;
        inner.write_all(&data).await?;
        Ok(data)
    }

    async fn flush_inner(&mut self) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(Error::ConnectionClosed)?;
        inner.flush().await?;
        Ok(())
    }
}

fn checked_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        Error::ValueTooLarge(format!("length {} does not fit a 32-bit length prefix", len))
    })
}
