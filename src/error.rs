//! Error types for the chunk witness crate.

use alloy_primitives::Address;
use thiserror::Error;

/// Errors that can occur while simulating code-chunk access costs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// A touched contract has no known bytecode
    #[error("bytecode not found for touched contract {0}")]
    MissingBytecode(Address),

    /// A PC access targeted a contract that was not part of `init`
    #[error("contract {0} was not initialized for this transaction")]
    UnknownContract(Address),

    /// `access_pc` called before `init`
    #[error("chunker accessed before init")]
    NotInitialized,

    /// A chunk received a second non-zero charge in the same transaction.
    ///
    /// This means the chunk-to-branch mapping is broken.
    #[error(
        "chunk {chunk_number} of {address} charged twice (previous {previous}, attempted {attempted})"
    )]
    DuplicateCharge {
        address: Address,
        chunk_number: u64,
        previous: u64,
        attempted: u64,
    },

    /// Gas accumulation exceeded `u64`.
    #[error("gas accumulation overflowed u64")]
    ArithmeticOverflow,

    /// Truncated or oversized LEB128 varint
    #[error("malformed varint at byte offset {offset}")]
    MalformedVarint { offset: usize },

    /// Table prefix declares more bytes than are available
    #[error("jumpdest table declares {declared} bytes but only {available} are available")]
    TruncatedTable { declared: usize, available: usize },

    /// Table record pushes the chunk number past `u64::MAX`
    #[error("jumpdest table record at byte offset {offset} is out of range")]
    MalformedTable { offset: usize },
}

impl ChunkError {
    /// Whether the error invalidates the whole run rather than a single transaction.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ArithmeticOverflow)
    }
}

/// Result type alias for chunk witness operations.
pub type Result<T> = std::result::Result<T, ChunkError>;
