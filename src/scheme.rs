//! Code chunking schemes under comparison.
//!
//! - [`ChunkingScheme::Contiguous31`]: 31 code bytes per 32-byte leaf, the
//!   first leaf byte counts leading PUSHDATA (EIP-7864 `chunkify_code`).
//! - [`ChunkingScheme::Jumpdest32`]: plain 32-byte slicing of the code, with an
//!   invalid-jumpdest table prepended to the chunked representation. Code PCs
//!   are shifted by the size of that prefix.

use std::ops::RangeInclusive;

use crate::{
    code::{chunkify_code, CHUNK_LEAF_SIZE, CODE_CHUNK_DATA_SIZE},
    jumpdest::{build_invalid_jumpdest_table, JUMPDEST_CHUNK_SIZE},
};

/// A chunking layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChunkingScheme {
    /// 31-byte contiguous chunks with a leading-PUSHDATA byte
    Contiguous31,
    /// 32-byte chunks with an invalid-jumpdest side table
    Jumpdest32,
}

impl ChunkingScheme {
    /// All schemes, in report order.
    pub const ALL: [Self; 2] = [Self::Contiguous31, Self::Jumpdest32];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Contiguous31 => "31bytechunker",
            Self::Jumpdest32 => "32bytechunker",
        }
    }

    /// Number of code bytes per chunk.
    pub const fn chunk_size(self) -> u64 {
        match self {
            Self::Contiguous31 => CODE_CHUNK_DATA_SIZE as u64,
            Self::Jumpdest32 => JUMPDEST_CHUNK_SIZE as u64,
        }
    }

    /// Resolve the chunked layout of a contract.
    pub fn layout(self, code: &[u8]) -> ContractLayout {
        let code_len = code.len() as u64;
        match self {
            Self::Contiguous31 => {
                let num_code_chunks = chunkify_code(code).len() as u64;
                ContractLayout {
                    code_len,
                    pc_shift: 0,
                    table_len: 0,
                    chunked_size_bytes: num_code_chunks * CHUNK_LEAF_SIZE as u64,
                    num_code_chunks,
                }
            }
            Self::Jumpdest32 => {
                let table = build_invalid_jumpdest_table(code);
                let pc_shift = table.prefix_len() as u64;
                let chunked_size_bytes = round_up(pc_shift + code_len, JUMPDEST_CHUNK_SIZE as u64);
                ContractLayout {
                    code_len,
                    pc_shift,
                    table_len: table.len() as u64,
                    chunked_size_bytes,
                    num_code_chunks: chunked_size_bytes / JUMPDEST_CHUNK_SIZE as u64,
                }
            }
        }
    }

    /// Chunks holding the table prefix, which a client always fetches.
    pub fn prefix_span(self, layout: &ContractLayout) -> Option<RangeInclusive<u64>> {
        match self {
            Self::Contiguous31 => None,
            Self::Jumpdest32 if layout.pc_shift == 0 => None,
            Self::Jumpdest32 => Some(0..=(layout.pc_shift - 1) / self.chunk_size()),
        }
    }

    /// Chunks touched by reading `size` code bytes from `start_pc`.
    ///
    /// The range is clipped to the code before the PC shift is applied.
    /// Returns `None` when nothing is touched.
    pub fn chunk_span(
        self,
        layout: &ContractLayout,
        start_pc: u64,
        size: u64,
    ) -> Option<RangeInclusive<u64>> {
        let code_len = layout.code_len;
        if (code_len == 0 && size == 0) || start_pc > code_len {
            return None;
        }

        let mut end_pc = start_pc.saturating_add(size).min(code_len);
        // end_pc becomes the last byte touched.
        end_pc = end_pc.saturating_sub(1);

        let first = (start_pc + layout.pc_shift) / self.chunk_size();
        let last = (end_pc + layout.pc_shift) / self.chunk_size();
        (first <= last).then_some(first..=last)
    }

    /// Offset of a code byte inside its chunk.
    pub const fn offset_in_chunk(self, layout: &ContractLayout, pc: u64) -> u64 {
        (pc + layout.pc_shift) % self.chunk_size()
    }

    /// Chunk holding a code byte.
    pub const fn chunk_of(self, layout: &ContractLayout, pc: u64) -> u64 {
        (pc + layout.pc_shift) / self.chunk_size()
    }
}

impl std::fmt::Display for ChunkingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved chunked layout of one contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContractLayout {
    /// Raw bytecode length
    pub code_len: u64,
    /// Bytes placed before the code (length header + table)
    pub pc_shift: u64,
    /// Encoded table length, without its header
    pub table_len: u64,
    /// Total chunked size, aligned to the leaf size
    pub chunked_size_bytes: u64,
    /// Number of leaves holding code (and prefix)
    pub num_code_chunks: u64,
}

const fn round_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}
