//! Invariant checking for chunker simulation testing.
//!
//! The reference model recomputes witness gas from plain sets of touched
//! stems and leaves. The key invariant: every chunker report must agree with
//! the model, for every scheme and every transaction.

use chunk_witness::{
    build_invalid_jumpdest_table, Address, BytecodeSource, ChunkerMetrics, ChunkingScheme,
    GasSchedule, TransactionReport, TransactionTrace, CODE_OFFSET, STEM_SUBTREE_WIDTH,
};
use std::collections::{BTreeMap, BTreeSet};

/// A violation of an expected invariant during simulation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub transaction_index: usize,
    pub description: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invariant violation at tx {}: {} (expected: {}, actual: {})",
            self.transaction_index, self.description, self.expected, self.actual
        )
    }
}

impl std::error::Error for InvariantViolation {}

/// Expected gas of one transaction under one scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpectedGas {
    pub gas: u64,
    pub warmup_gas: u64,
}

/// Set-based reference model of the access witness.
#[derive(Debug, Default)]
pub struct ReferenceWitness {
    schedule: GasSchedule,
    stems: BTreeSet<(Address, u64)>,
    leaves: BTreeSet<(Address, u64, u64)>,
}

impl ReferenceWitness {
    pub fn new(schedule: GasSchedule) -> Self {
        Self { schedule, ..Default::default() }
    }

    /// Read a leaf at flat tree position `position`.
    fn read(&mut self, address: Address, position: u64) -> u64 {
        let stem = position / STEM_SUBTREE_WIDTH;
        let mut gas = 0;
        if self.stems.insert((address, stem)) {
            gas += self.schedule.branch_read;
        }
        if self.leaves.insert((address, stem, position % STEM_SUBTREE_WIDTH)) {
            gas += self.schedule.chunk_read;
        }
        gas
    }

    pub fn warm_header(&mut self, address: Address) -> u64 {
        self.read(address, 0) + self.read(address, 1)
    }

    pub fn read_chunk(&mut self, address: Address, chunk_number: u64) -> u64 {
        self.read(address, CODE_OFFSET + chunk_number)
    }
}

/// Chunk fetched when executing `pc`, if any.
///
/// A PC equal to the code length still reads the last code byte, as the
/// interpreter reads the opcode following the final instruction.
pub fn chunk_for_pc(scheme: ChunkingScheme, code_len: u64, shift: u64, pc: u64) -> Option<u64> {
    if pc > code_len {
        return None;
    }
    let size = scheme.chunk_size();
    let last_byte = if pc < code_len { pc } else { code_len.saturating_sub(1) };
    let first = (pc + shift) / size;
    (first <= (last_byte + shift) / size).then_some(first)
}

/// Recompute the gas of `trace` under `scheme` from scratch.
pub fn expected_gas<B: BytecodeSource + ?Sized>(
    scheme: ChunkingScheme,
    schedule: GasSchedule,
    trace: &TransactionTrace,
    bytecode: &B,
) -> Option<ExpectedGas> {
    let mut witness = ReferenceWitness::new(schedule);
    let mut expected = ExpectedGas::default();
    let mut shifts = BTreeMap::new();

    for address in trace.touched_contracts() {
        let code = bytecode.code(&address)?;
        expected.warmup_gas += witness.warm_header(address);
        let layout = scheme.layout(code);
        if layout.pc_shift > 0 {
            for chunk in 0..=(layout.pc_shift - 1) / scheme.chunk_size() {
                expected.gas += witness.read_chunk(address, chunk);
            }
        }
        shifts.insert(address, (layout.code_len, layout.pc_shift));
    }

    for access in &trace.accesses {
        let (code_len, shift) = shifts[&access.contract];
        if let Some(chunk) = chunk_for_pc(scheme, code_len, shift, access.pc) {
            expected.gas += witness.read_chunk(access.contract, chunk);
        }
    }
    Some(expected)
}

/// Checks reports against the reference model and structural invariants.
pub struct ReportChecker {
    schemes: Vec<(ChunkingScheme, GasSchedule)>,
    violations: Vec<InvariantViolation>,
}

impl ReportChecker {
    pub fn new(schemes: Vec<(ChunkingScheme, GasSchedule)>) -> Self {
        Self { schemes, violations: Vec::new() }
    }

    pub fn into_violations(self) -> Vec<InvariantViolation> {
        self.violations
    }

    fn violation(
        &mut self,
        tx: usize,
        description: &str,
        expected: impl ToString,
        actual: impl ToString,
    ) {
        self.violations.push(InvariantViolation {
            transaction_index: tx,
            description: description.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    /// Check one transaction report.
    pub fn check<B: BytecodeSource + ?Sized>(
        &mut self,
        tx: usize,
        trace: &TransactionTrace,
        report: &TransactionReport,
        bytecode: &B,
    ) {
        if report.execution_length != trace.accesses.len() {
            self.violation(tx, "execution length", trace.accesses.len(), report.execution_length);
        }
        if report.reports.len() != self.schemes.len() {
            self.violation(tx, "report count", self.schemes.len(), report.reports.len());
            return;
        }

        for ((scheme, schedule), metrics) in self.schemes.clone().into_iter().zip(&report.reports) {
            if metrics.chunker_name != scheme.name() {
                self.violation(tx, "chunker order", scheme.name(), &metrics.chunker_name);
            }
            match expected_gas(scheme, schedule, trace, bytecode) {
                Some(expected) => {
                    if metrics.gas != expected.gas {
                        self.violation(tx, "code chunk gas", expected.gas, metrics.gas);
                    }
                    if metrics.warmup_gas != expected.warmup_gas {
                        self.violation(tx, "warmup gas", expected.warmup_gas, metrics.warmup_gas);
                    }
                }
                None => self.violation(tx, "report for missing bytecode", "failure", "report"),
            }
            self.check_layouts(tx, scheme, metrics, bytecode);
        }
    }

    fn check_layouts<B: BytecodeSource + ?Sized>(
        &mut self,
        tx: usize,
        scheme: ChunkingScheme,
        metrics: &ChunkerMetrics,
        bytecode: &B,
    ) {
        let mut chunk_gas = 0u64;
        for (address, stats) in &metrics.contracts {
            let code = bytecode.code(address).unwrap_or_default();
            let code_len = code.len() as u64;
            let expected_size = match scheme {
                ChunkingScheme::Contiguous31 => code_len.div_ceil(31) * 32,
                ChunkingScheme::Jumpdest32 => {
                    let prefix_len = build_invalid_jumpdest_table(code).prefix_len() as u64;
                    (prefix_len + code_len).div_ceil(32) * 32
                }
            };
            if stats.chunked_size_bytes != expected_size {
                self.violation(tx, "chunked size", expected_size, stats.chunked_size_bytes);
            }
            if stats.code_size != code_len {
                self.violation(tx, "code size", code_len, stats.code_size);
            }
            for chunk in &stats.chunks {
                if chunk.chunk_number >= stats.num_code_chunks.max(1) {
                    self.violation(tx, "chunk inside layout", stats.num_code_chunks, chunk.chunk_number);
                }
                if u64::from(chunk.accessed_bytes) > scheme.chunk_size() {
                    self.violation(tx, "accessed bytes", scheme.chunk_size(), chunk.accessed_bytes);
                }
            }
            chunk_gas += stats.chunk_gas();
        }
        let collected = metrics.contracts.values().any(|s| !s.chunks.is_empty());
        if collected && chunk_gas != metrics.gas {
            self.violation(tx, "per-chunk gas sums to total", metrics.gas, chunk_gas);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_for_pc_boundaries() {
        let scheme = ChunkingScheme::Contiguous31;
        assert_eq!(chunk_for_pc(scheme, 62, 0, 0), Some(0));
        assert_eq!(chunk_for_pc(scheme, 62, 0, 31), Some(1));
        // PC at the end, on a chunk boundary, reads nothing new.
        assert_eq!(chunk_for_pc(scheme, 62, 0, 62), None);
        assert_eq!(chunk_for_pc(scheme, 61, 0, 61), Some(1));
        assert_eq!(chunk_for_pc(scheme, 61, 0, 62), None);
        assert_eq!(chunk_for_pc(scheme, 0, 0, 0), Some(0));
    }

    #[test]
    fn test_reference_witness_charges_once() {
        let mut witness = ReferenceWitness::new(GasSchedule::default());
        let address = Address::ZERO;
        assert_eq!(witness.warm_header(address), 2300);
        assert_eq!(witness.read_chunk(address, 0), 200);
        assert_eq!(witness.read_chunk(address, 0), 0);
        assert_eq!(witness.read_chunk(address, 128), 2100);
    }
}
