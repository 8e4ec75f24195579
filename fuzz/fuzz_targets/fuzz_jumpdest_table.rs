#![no_main]

use chunk_witness::code::jumpdests;
use chunk_witness::jumpdest::{
    build_invalid_jumpdest_table, decode_table_prefix, encode_table_prefix, valid_jumpdests,
};
use libfuzzer_sys::fuzz_target;

/// Fuzz the invalid-jumpdest table with arbitrary bytecode, and the prefix
/// decoder with arbitrary bytes
fuzz_target!(|data: &[u8]| {
    // Arbitrary input as a chunked-code buffer must not panic.
    let _ = decode_table_prefix(data);

    let table = build_invalid_jumpdest_table(data);
    let entries = table.entries();
    assert_eq!(entries.len(), table.num_entries());
    assert!(entries.windows(2).all(|w| w[0].chunk_number < w[1].chunk_number));
    assert!(entries.iter().all(|e| e.first_valid_offset <= 32));

    let prefix = encode_table_prefix(&table);
    let (decoded, shift) = decode_table_prefix(&prefix).expect("encoded prefix decodes");
    assert_eq!(decoded, entries);
    assert_eq!(shift, prefix.len());

    // Table-driven analysis never accepts a PUSHDATA byte.
    let all = jumpdests(data);
    for pc in valid_jumpdests(data, &entries) {
        assert!(all.binary_search(&pc).is_ok(), "pushdata accepted as jumpdest at {pc}");
    }
});
