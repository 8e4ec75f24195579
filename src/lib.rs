//! # Code-chunk witness simulator
//!
//! Estimates how much stateless-witness gas a transaction pays to fetch the
//! code it executes, under alternative code-chunking layouts, and how large
//! each contract's chunked representation becomes.
//!
//! ## Schemes
//!
//! - **31-byte contiguous** ([`ChunkingScheme::Contiguous31`]): the EIP-7864
//!   layout. Each 32-byte leaf holds a leading-PUSHDATA count and 31 code bytes.
//! - **32-byte with jumpdest table** ([`ChunkingScheme::Jumpdest32`]): code is
//!   sliced every 32 bytes. An invalid-jumpdest table (see [`jumpdest`]) is
//!   prepended so a client can still reject PUSHDATA jump targets.
//!
//! ## Gas model
//!
//! Code chunk `n` sits at tree position `128 + n` of the account: tree index
//! `(n + 128) / 256`, subindex `(n + 128) % 256`. The [`AccessWitness`] charges
//! the first touch of every stem and every leaf once per transaction.
//!
//! ## Usage
//!
//! ```
//! use chunk_witness::{Address, Chunker, ChunkingScheme, GasSchedule};
//! use std::collections::HashMap;
//!
//! let contract = Address::repeat_byte(0x01);
//! let code = HashMap::from([(contract, vec![0x60, 0x01, 0x5b, 0x00])]);
//!
//! let mut chunker = Chunker::new(ChunkingScheme::Jumpdest32, GasSchedule::default());
//! chunker.init(&[contract], &code, false)?;
//! chunker.access_pc(contract, 0)?;
//! let report = chunker.report();
//! assert_eq!(report.contracts[&contract].chunked_size_bytes, 32);
//! # Ok::<(), chunk_witness::ChunkError>(())
//! ```

mod chunker;
pub mod code;
mod error;
pub mod jumpdest;
mod key;
mod report;
mod scheme;
pub mod simulate;
pub mod varint;
mod witness;

pub use chunker::{BytecodeSource, Chunker};
pub use code::{chunkify_code, dechunkify_code, CodeChunk};
pub use error::{ChunkError, Result};
pub use jumpdest::{build_invalid_jumpdest_table, InvalidJumpdestTable, JumpdestEntry};
pub use key::{
    code_chunk_position, BranchKey, LeafKey, SubIndex, BASIC_DATA_LEAF_KEY, CODE_HASH_LEAF_KEY,
    CODE_OFFSET, STEM_SUBTREE_WIDTH,
};
pub use report::{join_chunk_reports, ChunkReport, ChunkStats, ChunkerMetrics, ContractStats};
pub use scheme::{ChunkingScheme, ContractLayout};
pub use simulate::{
    simulate_batch, simulate_transaction, Accumulator, BatchSummary, ChunkerConfig, PcAccess,
    SimulationConfig, TransactionReport, TransactionTrace,
};
pub use witness::{AccessWitness, GasSchedule};

/// Re-export alloy primitives for convenience
pub use alloy_primitives::{Address, Bytes, B256, U256};
