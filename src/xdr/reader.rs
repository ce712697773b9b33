//! Buffered XDR reader

use super::padding;
use crate::crypt::WireCipher;
use crate::encoding::{Encoding, Utf8Encoding};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Sanity limit for a single length-prefixed field
pub const MAX_READ_BUFFER_LENGTH: usize = 64 * 1024 * 1024;

const READ_CHUNK: usize = 8192;

/// Buffered reader for 4-byte aligned XDR fields
///
/// Every read waits until the requested number of bytes is available. End of
/// stream in the middle of a field is a framing error: the stream has lost
/// alignment and cannot be resynchronized.
pub struct XdrReader<R> {
    inner: Option<R>,
    buf: BytesMut,
    cipher: Option<Box<dyn WireCipher>>,
    encoding: Arc<dyn Encoding>,
    read_timeout: Option<Duration>,
}

impl<R> std::fmt::Debug for XdrReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XdrReader")
            .field("buffered", &self.buf.len())
            .field("encrypted", &self.cipher.is_some())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl<R: AsyncRead + Unpin> XdrReader<R> {
    /// Create a reader over a transport
    pub fn new(inner: R) -> Self {
        Self {
            inner: Some(inner),
            buf: BytesMut::with_capacity(READ_CHUNK),
            cipher: None,
            encoding: Arc::new(Utf8Encoding::default()),
            read_timeout: None,
        }
    }

    /// Set the encoding used by [`XdrReader::read_string`]
    pub fn set_encoding(&mut self, encoding: Arc<dyn Encoding>) {
        self.encoding = encoding;
    }

    /// Set the read timeout; applies from the next blocking read
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Current read timeout
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Install the inbound cipher
    ///
    /// Bytes already buffered but not yet consumed are decrypted as well.
    pub fn set_cipher(&mut self, mut cipher: Box<dyn WireCipher>) {
        cipher.apply(&mut self.buf[..]);
        self.cipher = Some(cipher);
    }

    /// Whether a cipher is installed
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Whether unread bytes are already buffered
    pub fn has_buffered(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Drop the transport; later reads fail with [`Error::ConnectionClosed`]
    pub fn close(&mut self) {
        self.inner = None;
        self.buf.clear();
        self.cipher = None;
    }

    /// Whether the reader has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Read a big-endian 32-bit integer
    pub async fn read_int(&mut self) -> Result<i32> {
        self.fill(4).await?;
        Ok(self.buf.get_i32())
    }

    /// Read a big-endian 64-bit integer
    pub async fn read_long(&mut self) -> Result<i64> {
        self.fill(8).await?;
        Ok(self.buf.get_i64())
    }

    /// Read a length-prefixed buffer and discard its padding
    pub async fn read_buffer(&mut self) -> Result<Vec<u8>> {
        let len = self.read_length().await?;
        let data = self.read_raw(len).await?;
        self.skip_bytes(padding(len)).await?;
        Ok(data)
    }

    /// Read a string in the reader's encoding
    pub async fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_buffer().await?;
        Ok(self.encoding.decode(&bytes))
    }

    /// Read a string in an explicit encoding
    pub async fn read_string_with(&mut self, encoding: &dyn Encoding) -> Result<String> {
        let bytes = self.read_buffer().await?;
        Ok(encoding.decode(&bytes))
    }

    /// Skip a length-prefixed buffer including its padding
    pub async fn skip_buffer(&mut self) -> Result<()> {
        let len = self.read_length().await?;
        self.skip_bytes(len + padding(len)).await
    }

    /// Skip exactly `count` bytes
    pub async fn skip_bytes(&mut self, count: usize) -> Result<()> {
        let mut remaining = count;
        while remaining > 0 {
            let step = remaining.min(READ_CHUNK);
            self.fill(step).await?;
            self.buf.advance(step);
            remaining -= step;
        }
        Ok(())
    }

    /// Read exactly `count` raw bytes
    pub async fn read_raw(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count.min(READ_CHUNK * 8));
        let mut remaining = count;
        while remaining > 0 {
            let step = remaining.min(READ_CHUNK);
            self.fill(step).await?;
            out.extend_from_slice(&self.buf.split_to(step));
            remaining -= step;
        }
        Ok(out)
    }

    async fn read_length(&mut self) -> Result<usize> {
        let len = self.read_int().await?;
        if len < 0 {
            return Err(Error::Framing(format!("negative length {}", len)));
        }
        let len = len as usize;
        if len > MAX_READ_BUFFER_LENGTH {
            return Err(Error::ValueTooLarge(format!(
                "buffer length {} exceeds limit {}",
                len, MAX_READ_BUFFER_LENGTH
            )));
        }
        Ok(len)
    }

    /// Buffer at least `count` bytes
    async fn fill(&mut self, count: usize) -> Result<()> {
        while self.buf.len() < count {
            let inner = self.inner.as_mut().ok_or(Error::ConnectionClosed)?;
            let start = self.buf.len();
            self.buf.reserve(READ_CHUNK.max(count - start));
            let read = match self.read_timeout {
                Some(timeout) => tokio::time::timeout(timeout, inner.read_buf(&mut self.buf))
                    .await
                    .map_err(|_| Error::ReadTimeout(timeout))??,
                None => inner.read_buf(&mut self.buf).await?,
            };
            if read == 0 {
                return Err(Error::Framing(format!(
                    "unexpected end of stream: needed {} bytes, had {}",
                    count, start
                )));
            }
            if let Some(cipher) = self.cipher.as_mut() {
                cipher.apply(&mut self.buf[start..]);
            }
        }
        Ok(())
    }
}
