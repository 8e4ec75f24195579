#![no_main]

use chunk_witness::{chunkify_code, dechunkify_code, CodeChunk};
use libfuzzer_sys::fuzz_target;

/// Fuzz 31-byte chunkification with arbitrary bytecode
/// Tests roundtrip and leaf invariants
fuzz_target!(|data: &[u8]| {
    let chunks = chunkify_code(data);
    let recovered = dechunkify_code(&chunks, data.len());
    assert_eq!(data, recovered.as_slice(), "roundtrip failed");

    for chunk in &chunks {
        assert!(chunk.leading_pushdata <= 31, "leading_pushdata out of bounds");
        assert_eq!(CodeChunk::decode(chunk.encode()), *chunk);
    }
});
