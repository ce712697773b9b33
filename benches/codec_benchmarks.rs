//! Codec benchmarks
//!
//! Measures the XDR writer and reader, parameter buffer serialization and
//! the legacy password hash. No server is needed.
//!
//! Run with: cargo bench --bench codec_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use firebird_wire::auth::legacy_hash;
use firebird_wire::params::{dpb, BufferKind, ParameterBuffer};
use firebird_wire::xdr::{XdrReader, XdrWriter};
use std::io::Cursor;
use tokio::runtime::Runtime;

fn encoded_buffers(len: usize, count: usize) -> Vec<u8> {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let mut writer = XdrWriter::new(Vec::new());
        let data = vec![0xA5u8; len];
        for _ in 0..count {
            writer.write_buffer(Some(&data)).await.unwrap();
        }
        writer.flush().await.unwrap();
        writer.get_ref().cloned().unwrap_or_default()
    })
}

fn write_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("xdr_write");

    for len in [3usize, 64, 4096, 65536] {
        let data = vec![0x5Au8; len];
        group.throughput(Throughput::Bytes((len * 100) as u64));
        group.bench_with_input(BenchmarkId::new("write_buffer", len), &data, |b, data| {
            b.to_async(&rt).iter(|| async {
                let mut writer = XdrWriter::new(Vec::with_capacity(data.len() * 100 + 800));
                for _ in 0..100 {
                    writer.write_buffer(Some(black_box(data))).await.unwrap();
                }
                writer.flush().await.unwrap();
            });
        });
    }

    group.bench_function("write_int_1000", |b| {
        b.to_async(&rt).iter(|| async {
            let mut writer = XdrWriter::new(Vec::with_capacity(4000));
            for i in 0..1000 {
                writer.write_int(black_box(i)).await.unwrap();
            }
            writer.flush().await.unwrap();
        });
    });

    group.finish();
}

fn read_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("xdr_read");

    for len in [3usize, 64, 4096] {
        let encoded = encoded_buffers(len, 100);
        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::new("read_buffer", len), &encoded, |b, encoded| {
            b.to_async(&rt).iter(|| async {
                let mut reader = XdrReader::new(Cursor::new(encoded.as_slice()));
                for _ in 0..100 {
                    black_box(reader.read_buffer().await.unwrap());
                }
            });
        });
    }

    group.finish();
}

fn parameter_buffer_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parameter_buffer");

    for kind in [BufferKind::DpbV1, BufferKind::DpbV2] {
        group.bench_function(format!("{:?}_to_bytes", kind), |b| {
            let mut pb = ParameterBuffer::new(kind);
            pb.add_string(dpb::LC_CTYPE, "UTF8").unwrap();
            pb.add_int(dpb::SQL_DIALECT, 3).unwrap();
            pb.add_string(dpb::USER_NAME, "SYSDBA").unwrap();
            pb.add_string(dpb::PROCESS_NAME, "/usr/local/bin/application").unwrap();
            pb.add_bytes(dpb::SPECIFIC_AUTH_DATA, &[0x41; 256]).unwrap();
            b.iter(|| black_box(pb.to_bytes_with_type()));
        });
    }

    group.bench_function("default_tpb", |b| {
        b.iter(|| black_box(ParameterBuffer::default_tpb().to_bytes_with_type()));
    });

    group.finish();
}

fn legacy_hash_benchmarks(c: &mut Criterion) {
    c.bench_function("legacy_hash", |b| {
        b.iter(|| legacy_hash(black_box(Some("masterkey"))));
    });
}

criterion_group!(
    benches,
    write_benchmarks,
    read_benchmarks,
    parameter_buffer_benchmarks,
    legacy_hash_benchmarks
);
criterion_main!(benches);
