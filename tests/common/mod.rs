//! Scripted loopback server shared by the integration tests
//!
//! Each test binds a listener on 127.0.0.1 and plays the server side of one
//! exchange with the crate's own XDR codec.

#![allow(dead_code)]

use firebird_wire::connection::{ConnectionConfig, ConnectionConfigBuilder, WireConnection};
use firebird_wire::protocol::constants::{isc_arg, op, ptype, ARCH_GENERIC};
use firebird_wire::protocol::{ProtocolCollection, ProtocolVersion};
use firebird_wire::xdr::{XdrReader, XdrWriter};
use firebird_wire::Database;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub type ServerIn = XdrReader<OwnedReadHalf>;
pub type ServerOut = XdrWriter<OwnedWriteHalf>;

/// What the server saw of the connect request
#[derive(Debug)]
pub struct Identify {
    pub database: Vec<u8>,
    pub user_id: Vec<u8>,
    pub versions: Vec<i32>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn start<F, Fut>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(ServerIn, ServerOut) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = socket.into_split();
        script(XdrReader::new(read_half), XdrWriter::new(write_half)).await;
    });
    (port, handle)
}

pub fn config(port: u16, protocols: &[ProtocolVersion]) -> ConnectionConfigBuilder {
    ConnectionConfig::builder("127.0.0.1", "/db/test.fdb")
        .port(port)
        .user("sysdba")
        .password("masterkey")
        .protocols(ProtocolCollection::only(protocols))
}

pub async fn read_identify(input: &mut ServerIn) -> Identify {
    assert_eq!(input.read_int().await.unwrap(), op::CONNECT);
    assert_eq!(input.read_int().await.unwrap(), op::ATTACH);
    let _connect_version = input.read_int().await.unwrap();
    assert_eq!(input.read_int().await.unwrap(), ARCH_GENERIC);
    let database = input.read_buffer().await.unwrap();
    let count = input.read_int().await.unwrap();
    let user_id = input.read_buffer().await.unwrap();
    let mut versions = Vec::new();
    for _ in 0..count {
        versions.push(input.read_int().await.unwrap());
        for _ in 0..4 {
            input.read_int().await.unwrap();
        }
    }
    Identify {
        database,
        user_id,
        versions,
    }
}

pub async fn write_accept(out: &mut ServerOut, version: ProtocolVersion) {
    out.write_int(op::ACCEPT).await.unwrap();
    out.write_int(version.wire_value()).await.unwrap();
    out.write_int(ARCH_GENERIC).await.unwrap();
    out.write_int(ptype::LAZY_SEND).await.unwrap();
    out.flush().await.unwrap();
}

/// `op_cond_accept` or `op_accept_data` on protocol 13
pub async fn write_accept_with_keys(
    out: &mut ServerOut,
    operation: i32,
    plugin: &str,
    authenticated: bool,
    keys: &[u8],
) {
    out.write_int(operation).await.unwrap();
    out.write_int(ProtocolVersion::V13.wire_value()).await.unwrap();
    out.write_int(ARCH_GENERIC).await.unwrap();
    out.write_int(ptype::LAZY_SEND).await.unwrap();
    out.write_buffer(None).await.unwrap();
    out.write_string(plugin).await.unwrap();
    out.write_int(i32::from(authenticated)).await.unwrap();
    out.write_buffer(Some(keys)).await.unwrap();
    out.flush().await.unwrap();
}

pub async fn write_accept_with_auth(out: &mut ServerOut, operation: i32, plugin: &str, authenticated: bool) {
    write_accept_with_keys(out, operation, plugin, authenticated, &[]).await;
}

/// `op_response` with every field given
pub async fn write_full_response(out: &mut ServerOut, handle: i32, blob_id: i64, data: &[u8], status: &[i32]) {
    out.write_int(op::RESPONSE).await.unwrap();
    out.write_int(handle).await.unwrap();
    out.write_long(blob_id).await.unwrap();
    out.write_buffer(Some(data)).await.unwrap();
    for value in status {
        out.write_int(*value).await.unwrap();
    }
    out.write_int(isc_arg::END).await.unwrap();
    out.flush().await.unwrap();
}

pub async fn write_response(out: &mut ServerOut, handle: i32, status: &[i32]) {
    write_full_response(out, handle, 0, &[], status).await;
}

/// Read `op_attach` and return the file name and DPB
pub async fn read_attach(input: &mut ServerIn) -> (Vec<u8>, Vec<u8>) {
    assert_eq!(input.read_int().await.unwrap(), op::ATTACH);
    assert_eq!(input.read_int().await.unwrap(), 0);
    let file = input.read_buffer().await.unwrap();
    let dpb = input.read_buffer().await.unwrap();
    (file, dpb)
}

pub async fn read_detach(input: &mut ServerIn, handle: i32) {
    assert_eq!(input.read_int().await.unwrap(), op::DETACH);
    assert_eq!(input.read_int().await.unwrap(), handle);
    assert_eq!(input.read_int().await.unwrap(), op::DISCONNECT);
}

/// Server side of identify and attach on a pre-13 protocol
pub async fn accept_attach(input: &mut ServerIn, out: &mut ServerOut, version: ProtocolVersion, handle: i32) {
    read_identify(input).await;
    write_accept(out, version).await;
    read_attach(input).await;
    write_response(out, handle, &[]).await;
}

/// Client side matching [`accept_attach`]
pub async fn attach(port: u16, version: ProtocolVersion) -> Database {
    WireConnection::connect(config(port, &[version]).build())
        .await
        .unwrap()
        .attach()
        .await
        .unwrap()
}
