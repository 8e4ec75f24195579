//! Per-transaction access witness.
//!
//! Tracks which stems (branches) and leaves have already been charged in the
//! current transaction. A leaf costs gas on its first touch in a given mode
//! and is free afterwards; the first leaf touched in a stem additionally pays
//! for opening the branch.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::{
    error::Result,
    key::{BranchKey, LeafKey, SubIndex},
    ChunkError,
};

/// Witness gas constants.
///
/// The default is the go-ethereum verkle schedule. Schemes under comparison may
/// be given different schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasSchedule {
    /// First read of a stem
    pub branch_read: u64,
    /// First read of a leaf
    pub chunk_read: u64,
    /// First write of a stem
    pub branch_write: u64,
    /// First write of a leaf
    pub chunk_write: u64,
}

impl GasSchedule {
    pub const WITNESS_BRANCH_READ_COST: u64 = 1900;
    pub const WITNESS_CHUNK_READ_COST: u64 = 200;
    pub const WITNESS_BRANCH_WRITE_COST: u64 = 3000;
    pub const WITNESS_CHUNK_WRITE_COST: u64 = 500;

    /// One fixed cost per leaf on first touch, nothing for stems.
    pub const fn flat(cost: u64) -> Self {
        Self { branch_read: 0, chunk_read: cost, branch_write: 0, chunk_write: cost }
    }
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            branch_read: Self::WITNESS_BRANCH_READ_COST,
            chunk_read: Self::WITNESS_CHUNK_READ_COST,
            branch_write: Self::WITNESS_BRANCH_WRITE_COST,
            chunk_write: Self::WITNESS_CHUNK_WRITE_COST,
        }
    }
}

/// Access modes already paid for a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Paid {
    read: bool,
    write: bool,
}

impl Paid {
    /// Mark `is_write` as paid; returns which of (read, write) were newly paid.
    fn mark(&mut self, is_write: bool) -> (bool, bool) {
        let new_read = !self.read;
        self.read = true;
        let new_write = is_write && !self.write;
        self.write |= is_write;
        (new_read, new_write)
    }
}

/// Ledger of the stems and leaves charged in one transaction.
#[derive(Clone, Debug, Default)]
pub struct AccessWitness {
    schedule: GasSchedule,
    branches: HashMap<BranchKey, Paid>,
    leaves: HashMap<LeafKey, Paid>,
}

impl AccessWitness {
    pub fn new(schedule: GasSchedule) -> Self {
        Self { schedule, branches: HashMap::new(), leaves: HashMap::new() }
    }

    pub const fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    /// Touch one leaf and return the gas owed for it.
    pub fn touch_leaf(
        &mut self,
        address: Address,
        tree_index: U256,
        subindex: SubIndex,
        is_write: bool,
    ) -> u64 {
        self.touch_key(LeafKey::new(address, tree_index, subindex), is_write)
    }

    /// Read-touch the leaf of a code chunk.
    pub fn touch_code_chunk(&mut self, address: Address, chunk_number: u64) -> u64 {
        self.touch_key(LeafKey::code_chunk(address, chunk_number), false)
    }

    /// Warm the account header leaves. `is_write` marks the basic data as written.
    pub fn touch_account_header(&mut self, address: Address, is_write: bool) -> u64 {
        let basic = self.touch_key(LeafKey::basic_data(address), is_write);
        let code_hash = self.touch_key(LeafKey::code_hash(address), false);
        basic.saturating_add(code_hash)
    }

    /// Read-touch every chunk in `span`, summing the charges.
    pub fn touch_chunk_range(
        &mut self,
        address: Address,
        span: RangeInclusive<u64>,
    ) -> Result<u64> {
        span.into_iter().try_fold(0u64, |total, chunk| {
            total
                .checked_add(self.touch_code_chunk(address, chunk))
                .ok_or(ChunkError::ArithmeticOverflow)
        })
    }

    /// Whether the leaf has been read-charged.
    pub fn is_warm(&self, key: &LeafKey) -> bool {
        self.leaves.get(key).is_some_and(|paid| paid.read)
    }

    /// Number of distinct stems touched.
    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }

    /// Number of distinct leaves touched.
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    fn touch_key(&mut self, key: LeafKey, is_write: bool) -> u64 {
        let schedule = self.schedule;
        let mut gas = 0u64;

        let (branch_read, branch_write) = self.branches.entry(key.branch).or_default().mark(is_write);
        if branch_read {
            gas = gas.saturating_add(schedule.branch_read);
        }
        if branch_write {
            gas = gas.saturating_add(schedule.branch_write);
        }

        let (chunk_read, chunk_write) = self.leaves.entry(key).or_default().mark(is_write);
        if chunk_read {
            gas = gas.saturating_add(schedule.chunk_read);
        }
        if chunk_write {
            gas = gas.saturating_add(schedule.chunk_write);
        }

        gas
    }
}
