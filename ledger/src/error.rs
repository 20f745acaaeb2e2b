use {
    crate::fork_db::ForkDbError,
    strata_perf::SigVerifyError,
    strata_sdk::{
        block::{Block, BlockId},
        transaction::{TransactionError, TransactionId},
    },
    strata_versioned_store::StoreError,
    thiserror::Error,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("bad block {id}: {reason}")]
    BadBlock { id: BlockId, reason: String },

    #[error("block {0} does not link to a known block")]
    UnlinkedBlock(BlockId),

    #[error("no common ancestor between {0} and {1}")]
    NonCommonBlock(BlockId, BlockId),

    #[error("block {0} rejected by the consensus schedule: {1}")]
    ValidateSchedule(BlockId, String),

    #[error("transaction {transaction} failed in block {block}: {err}")]
    Transaction {
        block: BlockId,
        transaction: TransactionId,
        err: TransactionError,
    },

    #[error("signature verification failed in block {0}: {1}")]
    Signature(BlockId, SigVerifyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A storage failure left committed state unknown; the ledger refuses
    /// all further work.
    #[error("ledger halted after storage failure: {0}")]
    Fatal(String),
}

impl From<ForkDbError> for BlockError {
    fn from(err: ForkDbError) -> Self {
        match err {
            ForkDbError::Unlinked(id) => BlockError::UnlinkedBlock(id),
            ForkDbError::NumberMismatch { id, parent_number } => BlockError::BadBlock {
                id,
                reason: format!("number does not follow parent #{parent_number}"),
            },
            ForkDbError::NonCommon(a, b) => BlockError::NonCommonBlock(a, b),
            ForkDbError::Unknown(id) => BlockError::BadBlock {
                id,
                reason: "not held by the fork store".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BlockError>;

/// What a successful push did with the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Applied on top of the previous head.
    Applied,
    /// Applied after switching to the block's branch. `erased` holds the
    /// blocks of the abandoned branch, newest first.
    SwitchedFork { erased: Vec<Block> },
    /// Linked as a candidate on a branch that is not longer than the head.
    StoredAsFork,
    /// Already linked or committed; nothing changed.
    AlreadyKnown,
}
