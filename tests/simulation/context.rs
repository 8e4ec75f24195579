//! Simulation context providing deterministic randomness.

use chunk_witness::code::{jumpdests, push_size, JUMPDEST};
use chunk_witness::Address;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;

/// Context for a simulation run providing deterministic primitives.
pub struct WorkloadContext {
    seed: u64,
    rng: StdRng,
    transaction_count: u64,
}

impl WorkloadContext {
    pub fn new(seed: u64) -> Self {
        Self { seed, rng: StdRng::seed_from_u64(seed), transaction_count: 0 }
    }

    /// Get the seed for reproducibility.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Get mutable reference to seeded RNG - use this instead of rand::random().
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Generate next transaction ID (monotonically increasing).
    pub fn next_tx_id(&mut self) -> u64 {
        self.transaction_count += 1;
        self.transaction_count
    }

    pub fn random_address(&mut self) -> Address {
        let mut bytes = [0u8; 20];
        self.rng.fill(&mut bytes);
        Address::from(bytes)
    }

    /// Bytecode of up to `max_len` bytes, biased towards PUSH instructions
    /// whose operands hold JUMPDEST bytes.
    pub fn random_bytecode(&mut self, max_len: usize) -> Vec<u8> {
        let len = self.rng.gen_range(0..=max_len);
        let mut code = Vec::with_capacity(len);
        while code.len() < len {
            match self.rng.gen_range(0..10) {
                0..=2 => {
                    let op = self.rng.gen_range(0x60u8..=0x7f);
                    code.push(op);
                    for _ in 0..push_size(op) {
                        code.push(if self.chance(0.3) { JUMPDEST } else { self.rng.gen() });
                    }
                }
                3 => code.push(JUMPDEST),
                _ => code.push(self.rng.gen_range(0x00u8..0x5f)),
            }
        }
        code.truncate(len);
        code
    }

    /// Instruction-by-instruction walk of `code` with occasional jumps to
    /// JUMPDESTs. Stops once the PC passes the end of the code.
    pub fn random_execution(&mut self, code: &[u8], max_steps: usize) -> Vec<u64> {
        let targets: Vec<u64> = jumpdests(code).into_iter().map(|pc| pc as u64).collect();
        let steps = self.rng.gen_range(0..=max_steps);
        let mut pcs = Vec::with_capacity(steps);
        let mut pc = 0u64;
        for _ in 0..steps {
            pcs.push(pc);
            let op = code.get(pc as usize).copied().unwrap_or(0);
            pc += 1 + push_size(op) as u64;
            if self.chance(0.1) {
                if let Some(&target) = self.choose(&targets) {
                    pc = target;
                }
            }
            if pc > code.len() as u64 {
                break;
            }
        }
        pcs
    }

    /// Choose random element from slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            let idx = self.rng.gen_range(0..items.len());
            Some(&items[idx])
        }
    }

    /// Return true with given probability (0.0 to 1.0).
    pub fn chance(&mut self, probability: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be between 0.0 and 1.0, got {}",
            probability
        );
        self.rng.gen::<f64>() < probability.clamp(0.0, 1.0)
    }
}

/// Deterministic map wrapper - always use BTreeMap for deterministic iteration.
pub type DeterministicMap<K, V> = BTreeMap<K, V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_rng() {
        let mut ctx1 = WorkloadContext::new(12345);
        let mut ctx2 = WorkloadContext::new(12345);
        assert_eq!(ctx1.random_bytecode(500), ctx2.random_bytecode(500));
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut ctx1 = WorkloadContext::new(12345);
        let mut ctx2 = WorkloadContext::new(54321);
        assert_ne!(ctx1.random_address(), ctx2.random_address());
    }

    #[test]
    fn test_tx_id_increments() {
        let mut ctx = WorkloadContext::new(1);
        assert_eq!(ctx.next_tx_id(), 1);
        assert_eq!(ctx.next_tx_id(), 2);
    }

    #[test]
    fn test_execution_stays_within_code() {
        let mut ctx = WorkloadContext::new(7);
        let code = ctx.random_bytecode(300);
        let pcs = ctx.random_execution(&code, 1_000);
        assert!(pcs.iter().all(|&pc| pc <= code.len() as u64));
    }
}
