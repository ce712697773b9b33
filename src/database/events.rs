//! Database events over the auxiliary channel
//!
//! The server delivers event notifications on a second socket. Its address
//! comes from `op_connect_request`; a listener task reads `op_event`
//! packets from it and forwards them on an unbounded channel. Each
//! `op_que_events` request fires at most once, so a consumer re-queues the
//! handle after every notification.

use super::Database;
use crate::connection::{connect_tcp, SocketOptions};
use crate::encoding::Encoding;
use crate::protocol::constants::{op, EPB_VERSION1, P_REQ_ASYNC};
use crate::xdr::XdrReader;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// A named event registered with [`Database::queue_event`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandle {
    name: String,
    local_id: i32,
    event_id: i32,
    count: i32,
}

impl EventHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_id: 0,
            event_id: 0,
            count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client id sent with the last queue request
    pub fn local_id(&self) -> i32 {
        self.local_id
    }

    /// Server id returned for the last queue request
    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    /// Last count seen from the server
    pub fn count(&self) -> i32 {
        self.count
    }

    /// Apply a notification for this handle
    ///
    /// Returns how often the event was posted since the previous
    /// notification, or `None` if the notification is for another handle.
    pub fn update(&mut self, notification: &EventNotification) -> Option<i32> {
        if notification.local_id != self.local_id {
            return None;
        }
        let posted = (notification.count - self.count).max(0);
        self.count = notification.count;
        Some(posted)
    }

    /// Event parameter block: version, then name and current count
    fn to_epb(&self, encoding: &dyn Encoding) -> Result<Vec<u8>> {
        let name = encoding.encode(&self.name);
        let len = u8::try_from(name.len()).map_err(|_| {
            Error::ValueTooLarge(format!("event name of {} bytes exceeds 255", name.len()))
        })?;
        let mut epb = Vec::with_capacity(name.len() + 6);
        epb.push(EPB_VERSION1);
        epb.push(len);
        epb.extend_from_slice(&name);
        epb.extend_from_slice(&self.count.to_le_bytes());
        Ok(epb)
    }
}

/// An `op_event` received on the auxiliary channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNotification {
    /// Local id of the queue request that fired
    pub local_id: i32,
    /// Event name echoed by the server
    pub name: String,
    /// Total count of the event
    pub count: i32,
}

impl EventNotification {
    fn parse(local_id: i32, buffer: &[u8], encoding: &dyn Encoding) -> Self {
        let count = match buffer.len() {
            len if len > 4 => {
                let tail = &buffer[len - 4..];
                i32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]])
            }
            _ => 0,
        };
        let name = match buffer {
            [EPB_VERSION1, len, rest @ ..] if rest.len() >= usize::from(*len) => {
                encoding.decode(&rest[..usize::from(*len)])
            }
            _ => String::new(),
        };
        Self {
            local_id,
            name,
            count,
        }
    }
}

/// Auxiliary connection and its listener task
#[derive(Debug)]
pub(super) struct EventChannel {
    aux_handle: i32,
    writer: OwnedWriteHalf,
    listener: JoinHandle<()>,
    next_local_id: i32,
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Port from the `sockaddr` data of the `op_connect_request` reply
fn parse_aux_port(data: &[u8]) -> Result<u16> {
    match data {
        [_, _, hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::Protocol(format!(
            "event channel address of {} bytes is too short",
            data.len()
        ))),
    }
}

async fn listen(
    mut input: XdrReader<OwnedReadHalf>,
    encoding: Arc<dyn Encoding>,
    sender: mpsc::UnboundedSender<EventNotification>,
) {
    loop {
        match read_event(&mut input, encoding.as_ref()).await {
            Ok(Some(notification)) => {
                tracing::debug!(
                    local_id = notification.local_id,
                    count = notification.count,
                    "event received"
                );
                if sender.send(notification).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "event channel read failed");
                break;
            }
        }
    }
    tracing::debug!("event listener stopped");
}

async fn read_event(
    input: &mut XdrReader<OwnedReadHalf>,
    encoding: &dyn Encoding,
) -> Result<Option<EventNotification>> {
    loop {
        match input.read_int().await? {
            op::DUMMY => continue,
            op::EXIT | op::DISCONNECT => return Ok(None),
            op::EVENT => {
                input.read_int().await?;
                let buffer = input.read_buffer().await?;
                input.read_long().await?;
                let local_id = input.read_int().await?;
                return Ok(Some(EventNotification::parse(local_id, &buffer, encoding)));
            }
            other => tracing::warn!(operation = other, "unexpected operation on event channel"),
        }
    }
}

impl Database {
    /// Open the auxiliary event channel
    ///
    /// Returns the receiving end of the notification stream. The channel
    /// stays open until [`Database::close_event_channel`] or detach.
    pub async fn open_event_channel(&mut self) -> Result<mpsc::UnboundedReceiver<EventNotification>> {
        self.require_attached()?;
        if self.events.is_some() {
            return Err(Error::InvalidState {
                expected: "no event channel".into(),
                actual: "event channel open".into(),
            });
        }
        let span = tracing::info_span!("event_channel", handle = self.handle);
        async {
            {
                let output = self.conn.output()?;
                let mut out = output.lock().await;
                out.write_int(op::CONNECT_REQUEST).await?;
                out.write_int(P_REQ_ASYNC).await?;
                out.write_int(self.handle).await?;
                out.write_int(0).await?;
                out.flush().await?;
            }
            let response = self.conn.read_generic_response().await?;
            let port = parse_aux_port(&response.data)?;
            let config = self.conn.config();
            let options = SocketOptions {
                connect_timeout: config.connect_timeout,
                buffer_size: None,
                nodelay: true,
            };
            let stream = connect_tcp(&config.server, port, options).await?;
            let (read_half, writer) = stream.into_split();

            let encoding = Arc::clone(self.conn.encoding());
            let mut input = XdrReader::new(read_half);
            input.set_encoding(Arc::clone(&encoding));
            let (sender, receiver) = mpsc::unbounded_channel();
            let listener = tokio::spawn(listen(input, encoding, sender).in_current_span());

            tracing::debug!(aux_handle = response.object_handle, port, "event channel open");
            self.events = Some(EventChannel {
                aux_handle: response.object_handle,
                writer,
                listener,
                next_local_id: 1,
            });
            Ok(receiver)
        }
        .instrument(span)
        .await
    }

    /// Register interest in an event
    ///
    /// The handle gets a new local id and the server's event id. The count
    /// stored in the handle is sent, so the server only fires once the
    /// event has been posted beyond it.
    pub async fn queue_event(&mut self, event: &mut EventHandle) -> Result<()> {
        self.require_attached()?;
        let epb = event.to_epb(self.conn.encoding().as_ref())?;
        let channel = self.events.as_mut().ok_or_else(|| Error::InvalidState {
            expected: "event channel open".into(),
            actual: "no event channel".into(),
        })?;
        let local_id = channel.next_local_id;
        channel.next_local_id = channel.next_local_id.wrapping_add(1);
        let aux_handle = channel.aux_handle;
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(op::QUE_EVENTS).await?;
            out.write_int(aux_handle).await?;
            out.write_buffer(Some(&epb)).await?;
            out.write_long(0).await?;
            out.write_int(local_id).await?;
            out.flush().await?;
        }
        let response = self.conn.read_generic_response().await?;
        event.local_id = local_id;
        event.event_id = response.object_handle;
        tracing::trace!(name = %event.name, local_id, event_id = event.event_id, "event queued");
        Ok(())
    }

    /// Cancel the pending queue request of `event`
    pub async fn cancel_event(&mut self, event: &EventHandle) -> Result<()> {
        self.require_attached()?;
        {
            let output = self.conn.output()?;
            let mut out = output.lock().await;
            out.write_int(op::CANCEL_EVENTS).await?;
            out.write_int(self.handle).await?;
            out.write_int(event.local_id).await?;
            out.flush().await?;
        }
        self.conn.read_generic_response().await.map(|_| ())
    }

    /// Stop the listener and close the auxiliary socket
    pub async fn close_event_channel(&mut self) {
        if let Some(mut channel) = self.events.take() {
            channel.listener.abort();
            if let Err(e) = channel.writer.shutdown().await {
                tracing::debug!(error = %e, "ignoring error closing event channel");
            }
            tracing::debug!(aux_handle = channel.aux_handle, "event channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Utf8Encoding;

    #[test]
    fn test_epb_layout() {
        let mut event = EventHandle::new("NEW_ORDER");
        event.count = 3;
        let epb = event.to_epb(&Utf8Encoding::default()).unwrap();
        assert_eq!(epb[0], EPB_VERSION1);
        assert_eq!(epb[1], 9);
        assert_eq!(&epb[2..11], b"NEW_ORDER");
        assert_eq!(&epb[11..], &[3, 0, 0, 0]);
    }

    #[test]
    fn test_epb_name_too_long() {
        let event = EventHandle::new("E".repeat(256));
        assert!(matches!(
            event.to_epb(&Utf8Encoding::default()),
            Err(Error::ValueTooLarge(_))
        ));
    }

    #[test]
    fn test_notification_parse_and_update() {
        let buffer = [EPB_VERSION1, 2, b'E', b'V', 5, 0, 0, 0];
        let notification = EventNotification::parse(4, &buffer, &Utf8Encoding::default());
        assert_eq!(notification.name, "EV");
        assert_eq!(notification.count, 5);

        let mut event = EventHandle::new("EV");
        event.local_id = 4;
        event.count = 2;
        assert_eq!(event.update(&notification), Some(3));
        assert_eq!(event.count(), 5);

        event.local_id = 5;
        assert_eq!(event.update(&notification), None);
    }

    #[test]
    fn test_aux_port() {
        assert_eq!(parse_aux_port(&[0, 2, 0x0b, 0xea, 127, 0, 0, 1]).unwrap(), 3050);
        assert!(parse_aux_port(&[0, 2]).is_err());
    }

    #[tokio::test]
    async fn test_read_event_skips_dummy_and_stops_on_exit() {
        let mut packet = Vec::new();
        packet.extend_from_slice(&op::DUMMY.to_be_bytes());
        packet.extend_from_slice(&op::EVENT.to_be_bytes());
        packet.extend_from_slice(&1i32.to_be_bytes());
        packet.extend_from_slice(&8i32.to_be_bytes());
        packet.extend_from_slice(&[EPB_VERSION1, 2, b'E', b'V', 1, 0, 0, 0]);
        packet.extend_from_slice(&0i64.to_be_bytes());
        packet.extend_from_slice(&9i32.to_be_bytes());
        packet.extend_from_slice(&op::EXIT.to_be_bytes());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&packet).await.unwrap();
        });
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (read_half, _write_half) = stream.into_split();
        let mut input = XdrReader::new(read_half);
        let encoding = Utf8Encoding::default();

        let event = read_event(&mut input, &encoding).await.unwrap().unwrap();
        assert_eq!(event.local_id, 9);
        assert_eq!(event.count, 1);
        assert!(read_event(&mut input, &encoding).await.unwrap().is_none());
        server.await.unwrap();
    }
}
