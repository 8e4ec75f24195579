//! Tree positions of account and code leaves.
//!
//! Following the EIP-7864 embedding, an account owns a sequence of 256-leaf
//! subtrees (stems). Tree index 0 is the account stem:
//! - Subindex 0: Basic data (version, code size, nonce, balance)
//! - Subindex 1: Code hash
//! - Subindexes 128-255: First 128 code chunks (`CODE_OFFSET`)
//!
//! Code chunk `n` lives at position `CODE_OFFSET + n`, i.e. tree index
//! `(n + 128) / 256` and subindex `(n + 128) % 256`. The witness charges per
//! stem (branch) and per leaf, so positions are kept unhashed here.

use alloy_primitives::{Address, U256};
use std::fmt;

/// Subindex for basic account data (nonce, balance, code size)
pub const BASIC_DATA_LEAF_KEY: SubIndex = 0;

/// Subindex for code hash
pub const CODE_HASH_LEAF_KEY: SubIndex = 1;

/// Position of code chunk 0 within the account stem
pub const CODE_OFFSET: u64 = 128;

/// Width of a stem subtree (256 values)
pub const STEM_SUBTREE_WIDTH: u64 = 256;

/// Subindex within a stem's subtree (0-255).
pub type SubIndex = u8;

/// Tree index and subindex of a code chunk.
pub fn code_chunk_position(chunk_number: u64) -> (U256, SubIndex) {
    let pos = U256::from(chunk_number) + U256::from(CODE_OFFSET);
    let width = U256::from(STEM_SUBTREE_WIDTH);
    let subindex = (chunk_number.wrapping_add(CODE_OFFSET) % STEM_SUBTREE_WIDTH) as SubIndex;
    (pos / width, subindex)
}

/// One 256-leaf stem of an account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchKey {
    pub address: Address,
    pub tree_index: U256,
}

impl BranchKey {
    pub const fn new(address: Address, tree_index: U256) -> Self {
        Self { address, tree_index }
    }

    /// The account stem holding the header and the first 128 code chunks.
    pub const fn account(address: Address) -> Self {
        Self { address, tree_index: U256::ZERO }
    }

    pub const fn leaf(self, subindex: SubIndex) -> LeafKey {
        LeafKey { branch: self, subindex }
    }
}

impl fmt::Debug for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchKey {{ address: {}, tree_index: {} }}", self.address, self.tree_index)
    }
}

/// A single leaf: stem plus subindex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafKey {
    pub branch: BranchKey,
    pub subindex: SubIndex,
}

impl LeafKey {
    pub const fn new(address: Address, tree_index: U256, subindex: SubIndex) -> Self {
        Self { branch: BranchKey::new(address, tree_index), subindex }
    }

    /// Leaf holding code chunk `chunk_number` of `address`.
    pub fn code_chunk(address: Address, chunk_number: u64) -> Self {
        let (tree_index, subindex) = code_chunk_position(chunk_number);
        Self::new(address, tree_index, subindex)
    }

    pub const fn basic_data(address: Address) -> Self {
        BranchKey::account(address).leaf(BASIC_DATA_LEAF_KEY)
    }

    pub const fn code_hash(address: Address) -> Self {
        BranchKey::account(address).leaf(CODE_HASH_LEAF_KEY)
    }
}

impl fmt::Debug for LeafKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LeafKey {{ address: {}, tree_index: {}, subindex: {} }}",
            self.branch.address, self.branch.tree_index, self.subindex
        )
    }
}
