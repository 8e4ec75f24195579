//! Per-transaction chunker.
//!
//! A [`Chunker`] replays the code accesses of one transaction under one
//! [`ChunkingScheme`] and accumulates the witness gas:
//!
//! ```text
//! Chunker::new -> init -> access_pc* -> report
//! ```
//!
//! `report` is read-only and can be called any number of times. `init` resets
//! all state, so a chunker can be reused across transactions.

use alloy_primitives::Address;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use tracing::{debug, trace};

use crate::{
    error::Result,
    report::{export_chunks, ChunkStats, ChunkerMetrics, ContractStats},
    scheme::{ChunkingScheme, ContractLayout},
    witness::{AccessWitness, GasSchedule},
    ChunkError,
};

/// Read-only bytecode lookup shared across chunkers.
pub trait BytecodeSource {
    fn code(&self, address: &Address) -> Option<&[u8]>;
}

impl<C: AsRef<[u8]>, S: BuildHasher> BytecodeSource for HashMap<Address, C, S> {
    fn code(&self, address: &Address) -> Option<&[u8]> {
        self.get(address).map(AsRef::as_ref)
    }
}

impl<C: AsRef<[u8]>> BytecodeSource for BTreeMap<Address, C> {
    fn code(&self, address: &Address) -> Option<&[u8]> {
        self.get(address).map(AsRef::as_ref)
    }
}

/// Chunking state of one touched contract.
#[derive(Clone, Debug, Default)]
struct ContractState {
    layout: ContractLayout,
    chunks: BTreeMap<u64, ChunkStats>,
}

/// State that only exists between `init` and the end of the transaction.
#[derive(Clone, Debug)]
struct TransactionState {
    witness: AccessWitness,
    contracts: HashMap<Address, ContractState>,
    collect_chunk_stats: bool,
    gas: u64,
    warmup_gas: u64,
}

/// Replays code accesses of a transaction under one chunking scheme.
#[derive(Clone, Debug)]
pub struct Chunker {
    scheme: ChunkingScheme,
    schedule: GasSchedule,
    tx: Option<TransactionState>,
}

impl Chunker {
    pub fn new(scheme: ChunkingScheme, schedule: GasSchedule) -> Self {
        Self { scheme, schedule, tx: None }
    }

    pub const fn scheme(&self) -> ChunkingScheme {
        self.scheme
    }

    pub const fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    /// Whether `init` has been called.
    pub const fn is_ready(&self) -> bool {
        self.tx.is_some()
    }

    /// Prepare the chunker for a transaction touching `touched` contracts.
    ///
    /// Every touched account header is warmed, since the transaction
    /// destination and every `*CALL` target read at least the code size.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::MissingBytecode`] if a touched contract has no
    /// code in `bytecode`. The chunker is left uninitialized in that case.
    pub fn init<B: BytecodeSource + ?Sized>(
        &mut self,
        touched: &[Address],
        bytecode: &B,
        collect_chunk_stats: bool,
    ) -> Result<()> {
        self.tx = None;
        let mut tx = TransactionState {
            witness: AccessWitness::new(self.schedule),
            contracts: HashMap::with_capacity(touched.len()),
            collect_chunk_stats,
            gas: 0,
            warmup_gas: 0,
        };

        for &address in touched {
            let code = bytecode.code(&address).ok_or(ChunkError::MissingBytecode(address))?;

            let warmup = tx.witness.touch_account_header(address, false);
            tx.warmup_gas = tx.warmup_gas.checked_add(warmup).ok_or(ChunkError::ArithmeticOverflow)?;

            if tx.contracts.contains_key(&address) {
                continue;
            }
            let layout = self.scheme.layout(code);
            debug!(
                scheme = self.scheme.name(),
                %address,
                code_len = layout.code_len,
                pc_shift = layout.pc_shift,
                chunked_size = layout.chunked_size_bytes,
                "resolved contract layout"
            );

            let mut state = ContractState { layout, chunks: BTreeMap::new() };
            // The table prefix is read before any code of the contract can run.
            if let Some(span) = self.scheme.prefix_span(&layout) {
                for chunk_number in span {
                    let gas = tx.witness.touch_code_chunk(address, chunk_number);
                    tx.gas = tx.gas.checked_add(gas).ok_or(ChunkError::ArithmeticOverflow)?;
                    if collect_chunk_stats {
                        let stats = state.chunks.entry(chunk_number).or_default();
                        mark_prefix_bytes(stats, self.scheme, &layout, chunk_number);
                        stats.record_charge(address, chunk_number, gas)?;
                    }
                }
            }
            tx.contracts.insert(address, state);
        }

        self.tx = Some(tx);
        Ok(())
    }

    /// Charge the code chunk holding `pc` of `address`.
    ///
    /// # Errors
    ///
    /// - [`ChunkError::NotInitialized`] before `init`
    /// - [`ChunkError::UnknownContract`] if `address` was not touched in `init`
    /// - [`ChunkError::DuplicateCharge`] if chunk stats see a chunk charged twice
    /// - [`ChunkError::ArithmeticOverflow`] if the total gas overflows
    pub fn access_pc(&mut self, address: Address, pc: u64) -> Result<()> {
        let scheme = self.scheme;
        let tx = self.tx.as_mut().ok_or(ChunkError::NotInitialized)?;
        let state = tx.contracts.get_mut(&address).ok_or(ChunkError::UnknownContract(address))?;
        let layout = state.layout;

        let Some(span) = scheme.chunk_span(&layout, pc, 1) else {
            return Ok(());
        };

        for chunk_number in span {
            let gas = tx.witness.touch_code_chunk(address, chunk_number);
            tx.gas = tx.gas.checked_add(gas).ok_or(ChunkError::ArithmeticOverflow)?;
            if gas != 0 {
                trace!(scheme = scheme.name(), %address, pc, chunk_number, gas, "charged code chunk");
            }

            if tx.collect_chunk_stats {
                let stats = state.chunks.entry(chunk_number).or_default();
                stats.mark_header();
                if pc < layout.code_len && scheme.chunk_of(&layout, pc) == chunk_number {
                    stats.mark_byte(scheme.offset_in_chunk(&layout, pc));
                }
                stats.record_charge(address, chunk_number, gas)?;
            }
        }

        Ok(())
    }

    /// Code-chunk gas accumulated so far.
    pub fn gas(&self) -> u64 {
        self.tx.as_ref().map_or(0, |tx| tx.gas)
    }

    /// Resolved layout of a touched contract.
    pub fn layout(&self, address: &Address) -> Option<ContractLayout> {
        self.tx.as_ref()?.contracts.get(address).map(|c| c.layout)
    }

    /// Build the report of the current transaction.
    pub fn report(&self) -> ChunkerMetrics {
        let mut metrics = ChunkerMetrics {
            chunker_name: self.scheme.name().to_string(),
            ..Default::default()
        };
        let Some(tx) = &self.tx else {
            return metrics;
        };

        metrics.gas = tx.gas;
        metrics.warmup_gas = tx.warmup_gas;
        metrics.contracts = tx
            .contracts
            .iter()
            .map(|(address, state)| {
                let stats = ContractStats {
                    code_size: state.layout.code_len,
                    chunked_size_bytes: state.layout.chunked_size_bytes,
                    num_code_chunks: state.layout.num_code_chunks,
                    chunks: export_chunks(&state.chunks),
                };
                (*address, stats)
            })
            .collect();
        metrics
    }
}

/// Mark the prefix bytes that live in `chunk_number`.
fn mark_prefix_bytes(
    stats: &mut ChunkStats,
    scheme: ChunkingScheme,
    layout: &ContractLayout,
    chunk_number: u64,
) {
    let chunk_size = scheme.chunk_size();
    let start = chunk_number * chunk_size;
    let end = layout.pc_shift.min(start + chunk_size);
    stats.mark_header();
    for pos in start..end {
        stats.mark_byte(pos - start);
    }
}
