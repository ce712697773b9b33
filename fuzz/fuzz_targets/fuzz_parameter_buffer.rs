#![no_main]

use firebird_wire::params::{BufferKind, ParameterBuffer};
use libfuzzer_sys::fuzz_target;

const KINDS: [BufferKind; 7] = [
    BufferKind::DpbV1,
    BufferKind::DpbV2,
    BufferKind::Tpb,
    BufferKind::SpbAttachV2,
    BufferKind::SpbAttachV3,
    BufferKind::ServiceRequest,
    BufferKind::Bpb,
];

fuzz_target!(|data: &[u8]| {
    let Some((selector, bytes)) = data.split_first() else {
        return;
    };
    let kind = KINDS[usize::from(*selector) % KINDS.len()];

    if let Ok(buffer) = ParameterBuffer::parse(kind, bytes) {
        let encoded = buffer.to_bytes_with_type();
        let _ = ParameterBuffer::parse_with_type(kind, &encoded);
    }
});
