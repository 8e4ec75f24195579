#![no_main]

use chunk_witness::varint::{decode_varint, encode_varint, encoded_len};
use libfuzzer_sys::fuzz_target;

/// Fuzz varint decoding with arbitrary input
/// Decoding must never panic, and whatever decodes must re-encode minimally
fuzz_target!(|data: &[u8]| {
    if let Ok((value, consumed)) = decode_varint(data) {
        assert!(consumed <= data.len());
        let encoded = encode_varint(value);
        assert_eq!(encoded.len(), encoded_len(value));
        assert!(encoded.len() <= consumed, "encoding is not minimal");
        assert_eq!(decode_varint(&encoded), Ok((value, encoded.len())));
    }
});
