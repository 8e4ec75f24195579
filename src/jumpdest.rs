//! Invalid-jumpdest side table for the 32-byte chunking scheme.
//!
//! Slicing code at a fixed 32-byte boundary can split PUSHDATA across chunks.
//! A client that analyses a single chunk would then take a PUSHDATA byte equal
//! to `JUMPDEST` for a valid jump target. The table records, for every chunk
//! that contains such a byte, the offset of the first real instruction in the
//! chunk so that the analysis can start there instead of at offset 0.
//!
//! ## Encoding
//!
//! ```text
//! table  = record*
//! record = varint(delta * 33 + first_valid_offset)
//! prefix = varint(len(table)) || table
//! ```
//!
//! `delta` is the chunk number minus the previous record's chunk number (the
//! first record is relative to chunk 0). `first_valid_offset` is in `0..=32`,
//! where 32 means the whole chunk is PUSHDATA.

use std::fmt;

use crate::{
    code::{push_size, JUMPDEST},
    error::Result,
    varint::{decode_varint, encoded_len, write_varint},
    ChunkError,
};

/// Chunk size of the jumpdest-table layout.
pub const JUMPDEST_CHUNK_SIZE: usize = 32;

/// Number of distinct `first_valid_offset` values (0..=32).
const OFFSET_RADIX: u64 = JUMPDEST_CHUNK_SIZE as u64 + 1;

/// A decoded table record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JumpdestEntry {
    /// Absolute chunk number
    pub chunk_number: u64,
    /// Offset of the first byte in the chunk that is not PUSHDATA
    pub first_valid_offset: u8,
}

/// Encoder for the invalid-jumpdest table.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct InvalidJumpdestTable {
    bytes: Vec<u8>,
    last_chunk: u64,
    entries: usize,
}

impl InvalidJumpdestTable {
    pub fn new() -> Self {
        Self { bytes: Vec::with_capacity(32), last_chunk: 0, entries: 0 }
    }

    /// Append a record. Chunk numbers must be non-decreasing.
    pub fn push(&mut self, chunk_number: u64, first_valid_offset: u8) {
        debug_assert!(chunk_number >= self.last_chunk, "records must be appended in chunk order");
        debug_assert!(u64::from(first_valid_offset) < OFFSET_RADIX);
        let delta = chunk_number - self.last_chunk;
        write_varint(&mut self.bytes, delta * OFFSET_RADIX + u64::from(first_valid_offset));
        self.last_chunk = chunk_number;
        self.entries += 1;
    }

    /// Encoded table bytes (without the length prefix).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded table length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of records.
    pub fn num_entries(&self) -> usize {
        self.entries
    }

    /// Size of the full prefix: length header plus table.
    pub fn prefix_len(&self) -> usize {
        encoded_len(self.bytes.len() as u64) + self.bytes.len()
    }

    /// Decode the records back.
    pub fn entries(&self) -> Vec<JumpdestEntry> {
        // The buffer is produced by `push`, so it always decodes.
        decode_table(&self.bytes).unwrap_or_default()
    }
}

impl fmt::Debug for InvalidJumpdestTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidJumpdestTable(0x{}, entries: {})", hex::encode(&self.bytes), self.entries)
    }
}

/// Build the invalid-jumpdest table of `code`.
pub fn build_invalid_jumpdest_table(code: &[u8]) -> InvalidJumpdestTable {
    let mut table = InvalidJumpdestTable::new();

    let mut added_entry = false;
    let mut valid_offset = 0usize;
    let mut i = 0usize;
    while i < code.len() {
        if i % JUMPDEST_CHUNK_SIZE == 0 {
            valid_offset = 0;
            added_entry = false;
        }
        let push_bytes = push_size(code[i]);
        if push_bytes == 0 {
            i += 1;
            continue;
        }

        let push_data_end = i + push_bytes;
        i += 1;
        while i <= push_data_end && i < code.len() {
            if i % JUMPDEST_CHUNK_SIZE == 0 {
                valid_offset = push_data_end % JUMPDEST_CHUNK_SIZE + 1;
                added_entry = false;
            }
            if code[i] == JUMPDEST && !added_entry {
                let chunk = i / JUMPDEST_CHUNK_SIZE;
                table.push(chunk as u64, valid_offset as u8);
                added_entry = true;
                i = ((chunk + 1) * JUMPDEST_CHUNK_SIZE).min(push_data_end + 1);
            } else {
                i += 1;
            }
        }
    }

    table
}

/// Encode the chunked-code prefix: `varint(len(table)) || table`.
pub fn encode_table_prefix(table: &InvalidJumpdestTable) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.prefix_len());
    write_varint(&mut out, table.len() as u64);
    out.extend_from_slice(table.as_bytes());
    out
}

/// Decode raw table bytes (no length prefix) into absolute records.
pub fn decode_table(bytes: &[u8]) -> Result<Vec<JumpdestEntry>> {
    let mut entries = Vec::new();
    let mut chunk_number = 0u64;
    let mut pos = 0usize;
    while pos < bytes.len() {
        let (value, consumed) = decode_varint(&bytes[pos..])
            .map_err(|_| ChunkError::MalformedVarint { offset: pos })?;
        let delta = value / OFFSET_RADIX;
        let first_valid_offset = (value % OFFSET_RADIX) as u8;
        chunk_number = chunk_number
            .checked_add(delta)
            .ok_or(ChunkError::MalformedTable { offset: pos })?;
        entries.push(JumpdestEntry { chunk_number, first_valid_offset });
        pos += consumed;
    }
    Ok(entries)
}

/// Decode a length-prefixed table from the front of a chunked-code buffer.
///
/// Returns the records and the total prefix length, which is the PC shift of
/// the contract's code.
pub fn decode_table_prefix(buf: &[u8]) -> Result<(Vec<JumpdestEntry>, usize)> {
    let (declared, header_len) = decode_varint(buf)?;
    let available = buf.len() - header_len;
    let declared = usize::try_from(declared)
        .ok()
        .filter(|&d| d <= available)
        .ok_or(ChunkError::TruncatedTable { declared: declared as usize, available })?;

    let body = &buf[header_len..header_len + declared];
    let entries = decode_table(body).map_err(|err| match err {
        ChunkError::MalformedVarint { offset } => {
            ChunkError::MalformedVarint { offset: offset + header_len }
        }
        ChunkError::MalformedTable { offset } => {
            ChunkError::MalformedTable { offset: offset + header_len }
        }
        other => other,
    })?;
    Ok((entries, header_len + declared))
}

/// Per-chunk jumpdest analysis driven by the table.
///
/// Every 32-byte chunk is scanned independently, starting at its recorded
/// `first_valid_offset` (or 0 if the chunk has no record). The result never
/// contains a PUSHDATA byte. It matches [`crate::code::jumpdests`] exactly on
/// chunks that have a record or begin on an instruction boundary; a chunk that
/// begins inside PUSHDATA without a record may miss a real JUMPDEST.
pub fn valid_jumpdests(code: &[u8], entries: &[JumpdestEntry]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut records = entries.iter().peekable();

    for (chunk_idx, chunk) in code.chunks(JUMPDEST_CHUNK_SIZE).enumerate() {
        let chunk_number = chunk_idx as u64;
        while records.next_if(|e| e.chunk_number < chunk_number).is_some() {}
        let start = match records.next_if(|e| e.chunk_number == chunk_number) {
            Some(entry) => entry.first_valid_offset as usize,
            None => 0,
        };

        let base = chunk_idx * JUMPDEST_CHUNK_SIZE;
        let mut offset = start;
        while offset < chunk.len() {
            let opcode = chunk[offset];
            if opcode == JUMPDEST {
                out.push(base + offset);
            }
            offset += 1 + push_size(opcode);
        }
    }

    out
}
