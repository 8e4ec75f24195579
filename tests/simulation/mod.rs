//! Simulation testing framework for deterministic chunker workloads.

pub mod context;
pub mod invariants;

pub use context::{DeterministicMap, WorkloadContext};
pub use invariants::expected_gas;
pub use workload::{WorkloadConfig, WorkloadRunner, World};
