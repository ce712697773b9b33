//! TCP transport setup

use crate::{Error, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream};

/// Socket level options applied before and after connecting
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SocketOptions {
    pub connect_timeout: Option<Duration>,
    pub buffer_size: Option<u32>,
    pub nodelay: bool,
}

/// Resolve `server` and connect to the first address that accepts
///
/// The connect timeout covers resolution and all attempts. Failures are
/// reported against `server` so the caller sees the configured name.
pub(crate) async fn connect_tcp(server: &str, port: u16, options: SocketOptions) -> Result<TcpStream> {
    let attempt = connect_any(server, port, options);
    let stream = match options.connect_timeout {
        Some(timeout) => tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| Error::ConnectTimeout {
                server: server.to_string(),
                timeout,
            })?,
        None => attempt.await,
    }
    .map_err(|source| Error::Network {
        server: server.to_string(),
        source,
    })?;

    stream.set_nodelay(options.nodelay).map_err(|source| Error::Network {
        server: server.to_string(),
        source,
    })?;
    Ok(stream)
}

async fn connect_any(server: &str, port: u16, options: SocketOptions) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in tokio::net::lookup_host((server, port)).await? {
        match connect_addr(addr, options).await {
            Ok(stream) => {
                tracing::debug!(%addr, "socket connected");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host name resolved to no addresses")
    }))
}

async fn connect_addr(addr: SocketAddr, options: SocketOptions) -> io::Result<TcpStream> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    if let Some(size) = options.buffer_size {
        socket.set_send_buffer_size(size)?;
        socket.set_recv_buffer_size(size)?;
    }
    socket.connect(addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_applies_options() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let options = SocketOptions {
            connect_timeout: Some(Duration::from_secs(5)),
            buffer_size: Some(64 * 1024),
            nodelay: true,
        };
        let (stream, _) = tokio::join!(connect_tcp("127.0.0.1", port, options), listener.accept());
        let stream = stream.unwrap();
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_refused_is_network_error_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = connect_tcp("127.0.0.1", port, SocketOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network { ref server, .. } if server == "127.0.0.1"));
        assert!(err.is_network());
    }
}
