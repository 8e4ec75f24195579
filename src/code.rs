//! Opcode helpers and the 31-byte code chunkification of EIP-7864.
//!
//! Contract bytecode is split into 31-byte chunks. Each chunk is stored as a
//! 32-byte leaf whose first byte counts how many of the following bytes are
//! PUSHDATA carried over from a previous chunk.

use alloy_primitives::B256;

/// Size of code data per chunk in the contiguous layout.
pub const CODE_CHUNK_DATA_SIZE: usize = 31;

/// Size of a chunk leaf in the tree.
pub const CHUNK_LEAF_SIZE: usize = 32;

pub const PUSH1: u8 = 0x60;
pub const PUSH32: u8 = 0x7f;
pub const JUMPDEST: u8 = 0x5b;

/// Number of operand bytes following `opcode` (0 unless PUSH1..=PUSH32).
pub const fn push_size(opcode: u8) -> usize {
    if opcode >= PUSH1 && opcode <= PUSH32 {
        (opcode - PUSH1 + 1) as usize
    } else {
        0
    }
}

/// A code chunk with leading PUSHDATA count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeChunk {
    /// Number of leading bytes that are PUSHDATA (0-31)
    pub leading_pushdata: u8,
    /// The 31 bytes of code/data
    pub data: [u8; CODE_CHUNK_DATA_SIZE],
}

impl CodeChunk {
    pub const fn new(leading_pushdata: u8, data: [u8; CODE_CHUNK_DATA_SIZE]) -> Self {
        Self { leading_pushdata, data }
    }

    /// Encode to the 32-byte leaf value.
    pub fn encode(&self) -> B256 {
        let mut bytes = [0u8; CHUNK_LEAF_SIZE];
        bytes[0] = self.leading_pushdata;
        bytes[1..].copy_from_slice(&self.data);
        B256::from(bytes)
    }

    /// Decode from a 32-byte leaf value.
    pub fn decode(value: B256) -> Self {
        let mut data = [0u8; CODE_CHUNK_DATA_SIZE];
        data.copy_from_slice(&value[1..]);
        Self { leading_pushdata: value[0], data }
    }
}

/// Number of 31-byte chunks needed for `code_len` bytes.
pub const fn num_code_chunks(code_len: usize) -> usize {
    (code_len + CODE_CHUNK_DATA_SIZE - 1) / CODE_CHUNK_DATA_SIZE
}

/// Chunkify bytecode into 31-byte chunks with PUSHDATA tracking.
pub fn chunkify_code(bytecode: &[u8]) -> Vec<CodeChunk> {
    let num_chunks = num_code_chunks(bytecode.len());
    let mut chunks = Vec::with_capacity(num_chunks);

    // Absolute position of the next instruction (skipping PUSHDATA).
    let mut next_instruction = 0usize;

    for chunk_idx in 0..num_chunks {
        let start = chunk_idx * CODE_CHUNK_DATA_SIZE;
        let end = (start + CODE_CHUNK_DATA_SIZE).min(bytecode.len());

        let leading_pushdata = next_instruction
            .saturating_sub(start)
            .min(CODE_CHUNK_DATA_SIZE) as u8;

        let mut data = [0u8; CODE_CHUNK_DATA_SIZE];
        data[..end - start].copy_from_slice(&bytecode[start..end]);
        chunks.push(CodeChunk::new(leading_pushdata, data));

        while next_instruction < end {
            next_instruction += 1 + push_size(bytecode[next_instruction]);
        }
    }

    chunks
}

/// Reconstruct bytecode from chunks.
pub fn dechunkify_code(chunks: &[CodeChunk], code_size: usize) -> Vec<u8> {
    let mut bytecode = Vec::with_capacity(code_size);
    for chunk in chunks {
        let remaining = code_size.saturating_sub(bytecode.len());
        let to_copy = remaining.min(CODE_CHUNK_DATA_SIZE);
        bytecode.extend_from_slice(&chunk.data[..to_copy]);
    }
    bytecode
}

/// Linear jumpdest analysis over the whole bytecode.
///
/// Returns the positions of every JUMPDEST opcode that is not PUSHDATA.
pub fn jumpdests(bytecode: &[u8]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut pc = 0usize;
    while pc < bytecode.len() {
        let opcode = bytecode[pc];
        if opcode == JUMPDEST {
            out.push(pc);
        }
        pc += 1 + push_size(opcode);
    }
    out
}
