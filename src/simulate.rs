//! Multi-scheme simulation over transaction traces.
//!
//! Each transaction is replayed once per configured chunker over the same
//! access sequence. Results are folded into an explicit [`Accumulator`]
//! instead of shared global counters, so transactions stay independent and
//! can be simulated in parallel (rayon, `parallel` feature).

use alloy_primitives::{Address, B256};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    chunker::{BytecodeSource, Chunker},
    error::Result,
    report::ChunkerMetrics,
    scheme::ChunkingScheme,
    witness::GasSchedule,
    ChunkError,
};

/// One executed instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PcAccess {
    pub contract: Address,
    pub pc: u64,
}

/// Ordered code accesses of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionTrace {
    pub tx_hash: B256,
    /// Transaction destination
    pub destination: Address,
    pub accesses: Vec<PcAccess>,
}

impl TransactionTrace {
    /// Build a trace from per-contract PC lists, replayed contract by contract.
    pub fn from_contract_traces(
        tx_hash: B256,
        destination: Address,
        contract_traces: &BTreeMap<Address, Vec<u64>>,
    ) -> Self {
        let accesses = contract_traces
            .iter()
            .flat_map(|(&contract, pcs)| pcs.iter().map(move |&pc| PcAccess { contract, pc }))
            .collect();
        Self { tx_hash, destination, accesses }
    }

    /// Contracts whose header must be warmed: the destination first, then
    /// every accessed contract in first-appearance order.
    pub fn touched_contracts(&self) -> Vec<Address> {
        let mut seen = HashSet::with_capacity(8);
        let mut touched = Vec::new();
        let all = std::iter::once(self.destination).chain(self.accesses.iter().map(|a| a.contract));
        for address in all {
            if seen.insert(address) {
                touched.push(address);
            }
        }
        touched
    }

    /// Number of executed instructions.
    pub fn execution_length(&self) -> usize {
        self.accesses.len()
    }
}

/// One chunker in a comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkerConfig {
    pub scheme: ChunkingScheme,
    pub schedule: GasSchedule,
}

impl ChunkerConfig {
    pub fn new(scheme: ChunkingScheme) -> Self {
        Self { scheme, schedule: GasSchedule::default() }
    }
}

/// Simulation settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Chunkers compared, in report order
    pub chunkers: Vec<ChunkerConfig>,
    /// Collect per-chunk statistics
    pub collect_chunk_stats: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            chunkers: ChunkingScheme::ALL.iter().copied().map(ChunkerConfig::new).collect(),
            collect_chunk_stats: false,
        }
    }
}

/// Reports of every configured chunker for one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionReport {
    pub tx_hash: B256,
    pub execution_length: usize,
    /// One report per configured chunker, in config order
    pub reports: Vec<ChunkerMetrics>,
}

/// Replay one transaction under every configured chunker.
pub fn simulate_transaction<B: BytecodeSource + ?Sized>(
    trace: &TransactionTrace,
    bytecode: &B,
    config: &SimulationConfig,
) -> Result<TransactionReport> {
    let touched = trace.touched_contracts();
    let mut reports = Vec::with_capacity(config.chunkers.len());

    for chunker_config in &config.chunkers {
        let mut chunker = Chunker::new(chunker_config.scheme, chunker_config.schedule);
        chunker.init(&touched, bytecode, config.collect_chunk_stats)?;
        for access in &trace.accesses {
            chunker.access_pc(access.contract, access.pc)?;
        }
        reports.push(chunker.report());
    }

    Ok(TransactionReport {
        tx_hash: trace.tx_hash,
        execution_length: trace.execution_length(),
        reports,
    })
}

/// Totals of one chunker across transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemeTotals {
    pub chunker_name: String,
    pub transactions: u64,
    pub gas: u64,
    pub warmup_gas: u64,
    /// Sum over transactions of the touched contracts' chunked size
    pub chunked_size_bytes: u64,
}

/// Per-transaction row, one gas value per chunker.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionRow {
    pub tx_hash: B256,
    pub execution_length: usize,
    pub gas: Vec<u64>,
}

/// Outcome of a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub totals: Vec<SchemeTotals>,
    pub rows: Vec<TransactionRow>,
    /// Transactions abandoned with a non-fatal error
    pub failed: Vec<(B256, ChunkError)>,
}

/// Explicit accumulator for transaction reports.
#[derive(Clone, Debug, Default)]
pub struct Accumulator {
    summary: BatchSummary,
}

impl Accumulator {
    pub fn new(config: &SimulationConfig) -> Self {
        let totals = config
            .chunkers
            .iter()
            .map(|c| SchemeTotals { chunker_name: c.scheme.name().to_string(), ..Default::default() })
            .collect();
        Self { summary: BatchSummary { totals, ..Default::default() } }
    }

    /// Fold a finished transaction.
    pub fn record(&mut self, report: &TransactionReport) -> Result<()> {
        debug_assert_eq!(report.reports.len(), self.summary.totals.len());
        for (totals, metrics) in self.summary.totals.iter_mut().zip(&report.reports) {
            totals.transactions += 1;
            totals.gas = totals.gas.checked_add(metrics.gas).ok_or(ChunkError::ArithmeticOverflow)?;
            totals.warmup_gas = totals
                .warmup_gas
                .checked_add(metrics.warmup_gas)
                .ok_or(ChunkError::ArithmeticOverflow)?;
            totals.chunked_size_bytes =
                totals.chunked_size_bytes.saturating_add(metrics.chunked_size_bytes());
        }
        self.summary.rows.push(TransactionRow {
            tx_hash: report.tx_hash,
            execution_length: report.execution_length,
            gas: report.reports.iter().map(|m| m.gas).collect(),
        });
        Ok(())
    }

    /// Record an abandoned transaction.
    pub fn record_failure(&mut self, tx_hash: B256, err: ChunkError) {
        self.summary.failed.push((tx_hash, err));
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    pub fn finish(self) -> BatchSummary {
        self.summary
    }
}

/// Simulate a batch of independent transactions.
///
/// A transaction failing with a non-fatal error is listed in
/// [`BatchSummary::failed`] and does not affect the others.
///
/// # Errors
///
/// Returns the first fatal error ([`ChunkError::is_fatal`]).
#[cfg(feature = "parallel")]
pub fn simulate_batch<B: BytecodeSource + Sync + ?Sized>(
    traces: &[TransactionTrace],
    bytecode: &B,
    config: &SimulationConfig,
) -> Result<BatchSummary> {
    let results: Vec<_> = traces
        .par_iter()
        .map(|trace| (trace.tx_hash, simulate_transaction(trace, bytecode, config)))
        .collect();
    fold_results(results, config)
}

/// Simulate a batch of independent transactions.
///
/// A transaction failing with a non-fatal error is listed in
/// [`BatchSummary::failed`] and does not affect the others.
///
/// # Errors
///
/// Returns the first fatal error ([`ChunkError::is_fatal`]).
#[cfg(not(feature = "parallel"))]
pub fn simulate_batch<B: BytecodeSource + ?Sized>(
    traces: &[TransactionTrace],
    bytecode: &B,
    config: &SimulationConfig,
) -> Result<BatchSummary> {
    let results = traces
        .iter()
        .map(|trace| (trace.tx_hash, simulate_transaction(trace, bytecode, config)));
    fold_results(results, config)
}

fn fold_results(
    results: impl IntoIterator<Item = (B256, Result<TransactionReport>)>,
    config: &SimulationConfig,
) -> Result<BatchSummary> {
    let mut acc = Accumulator::new(config);
    for (tx_hash, result) in results {
        match result {
            Ok(report) => acc.record(&report)?,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(%tx_hash, error = %err, "abandoning transaction");
                acc.record_failure(tx_hash, err);
            }
        }
    }
    Ok(acc.finish())
}
