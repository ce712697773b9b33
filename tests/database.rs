//! Database, transaction and blob requests against a scripted loopback server

mod common;

use common::*;
use firebird_wire::database::SeekMode;
use firebird_wire::params::{bpb, ParameterBuffer};
use firebird_wire::protocol::constants::{isc_arg, op, segment};
use firebird_wire::protocol::ProtocolVersion;

const DB_HANDLE: i32 = 7;
const TR_HANDLE: i32 = 21;
const BLOB_HANDLE: i32 = 6;

/// isc_bad_segstr_handle
const BAD_SEGSTR_HANDLE: i32 = 335_544_328;

const DEFAULT_TPB: [u8; 5] = [3, 15, 17, 9, 6];

async fn read_start_transaction(input: &mut ServerIn) {
    assert_eq!(input.read_int().await.unwrap(), op::TRANSACTION);
    assert_eq!(input.read_int().await.unwrap(), DB_HANDLE);
    assert_eq!(input.read_buffer().await.unwrap(), DEFAULT_TPB);
}

/// Read an operation that carries only an object handle
async fn read_release(input: &mut ServerIn, operation: i32, object: i32) {
    assert_eq!(input.read_int().await.unwrap(), operation);
    assert_eq!(input.read_int().await.unwrap(), object);
}

async fn read_info(input: &mut ServerIn, operation: i32, object: i32, items: &[u8], max_len: i32) {
    assert_eq!(input.read_int().await.unwrap(), operation);
    assert_eq!(input.read_int().await.unwrap(), object);
    assert_eq!(input.read_int().await.unwrap(), 0);
    assert_eq!(input.read_buffer().await.unwrap(), items);
    assert_eq!(input.read_int().await.unwrap(), max_len);
}

async fn read_get_segment(input: &mut ServerIn, size: i32) {
    assert_eq!(input.read_int().await.unwrap(), op::GET_SEGMENT);
    assert_eq!(input.read_int().await.unwrap(), BLOB_HANDLE);
    assert_eq!(input.read_int().await.unwrap(), size);
    assert_eq!(input.read_int().await.unwrap(), 0);
}

#[tokio::test]
async fn test_deferred_blob_close_read_before_commit() {
    let (port, server) = start(|mut input, mut out| async move {
        accept_attach(&mut input, &mut out, ProtocolVersion::V12, DB_HANDLE).await;

        read_start_transaction(&mut input).await;
        write_response(&mut out, TR_HANDLE, &[]).await;

        assert_eq!(input.read_int().await.unwrap(), op::CREATE_BLOB2);
        assert_eq!(input.read_buffer().await.unwrap(), [bpb::VERSION1]);
        assert_eq!(input.read_int().await.unwrap(), TR_HANDLE);
        assert_eq!(input.read_long().await.unwrap(), 0);
        write_full_response(&mut out, BLOB_HANDLE, 0x1234, &[], &[]).await;

        assert_eq!(input.read_int().await.unwrap(), op::BATCH_SEGMENTS);
        assert_eq!(input.read_int().await.unwrap(), BLOB_HANDLE);
        assert_eq!(input.read_int().await.unwrap(), 7);
        assert_eq!(input.read_buffer().await.unwrap(), b"\x05\x00hello");
        write_response(&mut out, 0, &[]).await;

        // The close is only sent along with the commit.
        read_release(&mut input, op::CLOSE_BLOB, BLOB_HANDLE).await;
        read_release(&mut input, op::COMMIT, TR_HANDLE).await;
        write_response(&mut out, 0, &[isc_arg::GDS, BAD_SEGSTR_HANDLE]).await;
        write_response(&mut out, 0, &[]).await;

        read_detach(&mut input, DB_HANDLE).await;
    })
    .await;

    let mut db = attach(port, ProtocolVersion::V12).await;
    let transaction = db.start_transaction(&ParameterBuffer::default_tpb()).await.unwrap();
    assert_eq!(transaction.handle(), TR_HANDLE);

    let mut blob = db.create_blob(&transaction, None).await.unwrap();
    assert_eq!(blob.handle(), BLOB_HANDLE);
    assert_eq!(blob.blob_id(), 0x1234);
    db.put_segment(&mut blob, b"hello").await.unwrap();
    db.close_blob(blob).await.unwrap();

    // A failed deferred close is logged; the commit's own response decides.
    db.commit(transaction).await.unwrap();
    db.detach().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn test_request_layouts_without_deferred_responses() {
    let (port, server) = start(|mut input, mut out| async move {
        accept_attach(&mut input, &mut out, ProtocolVersion::V10, DB_HANDLE).await;

        read_start_transaction(&mut input).await;
        write_response(&mut out, TR_HANDLE, &[]).await;

        assert_eq!(input.read_int().await.unwrap(), op::EXEC_IMMEDIATE);
        assert_eq!(input.read_int().await.unwrap(), TR_HANDLE);
        assert_eq!(input.read_int().await.unwrap(), DB_HANDLE);
        assert_eq!(input.read_int().await.unwrap(), 3);
        assert_eq!(input.read_buffer().await.unwrap(), b"DELETE FROM T");
        assert!(input.read_buffer().await.unwrap().is_empty());
        assert_eq!(input.read_int().await.unwrap(), 0);
        write_response(&mut out, 0, &[]).await;

        read_release(&mut input, op::COMMIT_RETAINING, TR_HANDLE).await;
        write_response(&mut out, 0, &[]).await;

        assert_eq!(input.read_int().await.unwrap(), op::OPEN_BLOB2);
        assert_eq!(input.read_buffer().await.unwrap(), [bpb::VERSION1]);
        assert_eq!(input.read_int().await.unwrap(), TR_HANDLE);
        assert_eq!(input.read_long().await.unwrap(), 0x55);
        write_response(&mut out, BLOB_HANDLE, &[]).await;

        read_get_segment(&mut input, 100).await;
        write_full_response(&mut out, segment::COMPLETE, 0, b"\x03\x00abc\x01\x00d", &[]).await;
        read_get_segment(&mut input, 100).await;
        write_full_response(&mut out, segment::EOF, 0, b"\x02\x00ef", &[]).await;

        assert_eq!(input.read_int().await.unwrap(), op::SEEK_BLOB);
        assert_eq!(input.read_int().await.unwrap(), BLOB_HANDLE);
        assert_eq!(input.read_int().await.unwrap(), 0);
        assert_eq!(input.read_int().await.unwrap(), 2);
        write_response(&mut out, 2, &[]).await;

        read_info(&mut input, op::INFO_BLOB, BLOB_HANDLE, &[6], 32).await;
        write_full_response(&mut out, 0, 0, &[6, 4, 0, 6, 0, 0, 0, 1], &[]).await;

        // Protocol 10 has no deferred operations; the cancel is answered at once.
        read_release(&mut input, op::CANCEL_BLOB, BLOB_HANDLE).await;
        write_response(&mut out, 0, &[]).await;

        read_info(&mut input, op::INFO_TRANSACTION, TR_HANDLE, &[4], 16).await;
        write_full_response(&mut out, 0, 0, &[4, 4, 0, 9, 0, 0, 0, 1], &[]).await;

        read_info(&mut input, op::INFO_DATABASE, DB_HANDLE, &[14, 1], 64).await;
        write_full_response(&mut out, 0, 0, &[14, 4, 0, 0, 16, 0, 0, 1], &[]).await;

        read_release(&mut input, op::ROLLBACK, TR_HANDLE).await;
        write_response(&mut out, 0, &[]).await;

        read_detach(&mut input, DB_HANDLE).await;
    })
    .await;

    let mut db = attach(port, ProtocolVersion::V10).await;
    let mut transaction = db.start_transaction(&ParameterBuffer::default_tpb()).await.unwrap();
    db.execute_immediate("DELETE FROM T", &transaction).await.unwrap();
    db.commit_retaining(&mut transaction).await.unwrap();
    assert!(transaction.is_active());

    let mut blob = db.open_blob(&transaction, 0x55, None).await.unwrap();
    assert_eq!(blob.handle(), BLOB_HANDLE);
    assert_eq!(blob.blob_id(), 0x55);
    assert_eq!(db.get_segment(&mut blob, 100).await.unwrap(), b"abcd");
    assert!(!blob.is_eof());
    assert_eq!(db.get_segment(&mut blob, 100).await.unwrap(), b"ef");
    assert!(blob.is_eof());
    // At the end no request is sent.
    assert!(db.get_segment(&mut blob, 100).await.unwrap().is_empty());

    assert_eq!(db.seek_blob(&mut blob, SeekMode::Absolute, 2).await.unwrap(), 2);
    assert!(!blob.is_eof());
    assert_eq!(
        db.blob_info(&blob, &[6], 32).await.unwrap(),
        [6, 4, 0, 6, 0, 0, 0, 1]
    );
    db.cancel_blob(blob).await.unwrap();

    assert_eq!(
        db.transaction_info(&transaction, &[4], 16).await.unwrap(),
        [4, 4, 0, 9, 0, 0, 0, 1]
    );
    assert_eq!(
        db.database_info(&[14, 1], 64).await.unwrap(),
        [14, 4, 0, 0, 16, 0, 0, 1]
    );
    db.rollback(transaction).await.unwrap();
    db.detach().await.unwrap();
    server.await.unwrap();
}
