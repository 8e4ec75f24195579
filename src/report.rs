//! Per-chunk statistics and chunker reports.

use alloy_primitives::Address;
use std::collections::BTreeMap;

use crate::{error::Result, ChunkError};

/// Accessed bytes and gas of one chunk during a transaction.
///
/// Bit 0 of `accessed` stands for the chunk header byte and is set whenever
/// the chunk is touched; bit `offset + 1` marks code byte `offset`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkStats {
    accessed: u64,
    charged_gas: u64,
}

impl ChunkStats {
    pub fn mark_header(&mut self) {
        self.accessed |= 1;
    }

    /// Mark the code byte at `offset` (also marks the header).
    pub fn mark_byte(&mut self, offset: u64) {
        debug_assert!(offset < 63);
        self.accessed |= 1 | (1u64 << (offset + 1));
    }

    /// Number of distinct code bytes accessed, header excluded.
    pub const fn accessed_bytes(&self) -> u32 {
        (self.accessed >> 1).count_ones()
    }

    pub const fn is_touched(&self) -> bool {
        self.accessed != 0
    }

    pub const fn charged_gas(&self) -> u64 {
        self.charged_gas
    }

    /// Record gas charged for this chunk.
    ///
    /// A chunk may be charged at most once per transaction; a second non-zero
    /// charge is reported as [`ChunkError::DuplicateCharge`].
    pub fn record_charge(&mut self, address: Address, chunk_number: u64, gas: u64) -> Result<()> {
        if gas == 0 {
            return Ok(());
        }
        if self.charged_gas != 0 {
            return Err(ChunkError::DuplicateCharge {
                address,
                chunk_number,
                previous: self.charged_gas,
                attempted: gas,
            });
        }
        self.charged_gas = gas;
        Ok(())
    }
}

/// Exported statistics of one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkReport {
    pub chunk_number: u64,
    pub accessed_bytes: u32,
    pub charged_gas: u64,
}

/// Exported statistics of one contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContractStats {
    /// Raw bytecode length
    pub code_size: u64,
    /// Chunked representation length, including any prefix
    pub chunked_size_bytes: u64,
    /// Number of leaves in the chunked representation
    pub num_code_chunks: u64,
    /// Touched chunks ordered by chunk number; empty unless stats are collected
    pub chunks: Vec<ChunkReport>,
}

impl ContractStats {
    /// Number of chunks touched, when chunk stats were collected.
    pub fn touched_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Sum of the per-chunk charges.
    pub fn chunk_gas(&self) -> u64 {
        self.chunks.iter().fold(0u64, |acc, c| acc.saturating_add(c.charged_gas))
    }
}

/// Report of one chunker over one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkerMetrics {
    pub chunker_name: String,
    /// Code-chunk witness gas
    pub gas: u64,
    /// Gas of warming the touched account headers, not included in `gas`
    pub warmup_gas: u64,
    pub contracts: BTreeMap<Address, ContractStats>,
}

impl ChunkerMetrics {
    /// Total chunked size of all touched contracts.
    pub fn chunked_size_bytes(&self) -> u64 {
        self.contracts.values().map(|c| c.chunked_size_bytes).sum()
    }
}

/// Convert internal per-chunk stats into exported reports.
pub(crate) fn export_chunks(stats: &BTreeMap<u64, ChunkStats>) -> Vec<ChunkReport> {
    stats
        .iter()
        .filter(|(_, s)| s.is_touched() || s.charged_gas != 0)
        .map(|(&chunk_number, s)| ChunkReport {
            chunk_number,
            accessed_bytes: s.accessed_bytes(),
            charged_gas: s.charged_gas,
        })
        .collect()
}

/// Join reports of several chunkers on `(contract, chunk_number)`.
///
/// Each value holds one slot per input report, in input order.
pub fn join_chunk_reports(
    reports: &[ChunkerMetrics],
) -> BTreeMap<(Address, u64), Vec<Option<ChunkReport>>> {
    let mut joined: BTreeMap<(Address, u64), Vec<Option<ChunkReport>>> = BTreeMap::new();
    for (slot, report) in reports.iter().enumerate() {
        for (address, contract) in &report.contracts {
            for chunk in &contract.chunks {
                let row = joined
                    .entry((*address, chunk.chunk_number))
                    .or_insert_with(|| vec![None; reports.len()]);
                row[slot] = Some(*chunk);
            }
        }
    }
    joined
}
