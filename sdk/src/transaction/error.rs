use {
    crate::receipt::ContractResult,
    serde_derive::{Deserialize, Serialize},
    thiserror::Error,
};

/// Reasons a transaction might be rejected.
#[derive(Error, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum TransactionError {
    /// The transaction is already committed, pending, or being admitted.
    #[error("duplicate transaction")]
    DuplicateTransaction,

    /// The reference block does not match the recorded history.
    #[error("tapos check failed: {0}")]
    TaposInvalid(String),

    /// The expiration lies outside the accepted liveness window.
    #[error("transaction expired: {0}")]
    TransactionExpired(String),

    #[error("transaction size {size} exceeds limit {max}")]
    TooBigTransaction { size: u64, max: u64 },

    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// The payer cannot cover the bandwidth/energy cost.
    #[error("account resource insufficient: {0}")]
    AccountResourceInsufficient(String),

    /// A domain rule of the contract was violated.
    #[error("contract validate error: {0}")]
    ContractValidate(String),

    #[error("contract execution error: {0}")]
    ContractExecution(String),

    #[error("transaction must carry exactly one contract, found {0}")]
    ContractSizeNotEqualToOne(usize),

    /// The locally computed result differs from the one recorded in the block.
    #[error("receipt check failed: expected {expected:?}, got {actual:?}")]
    ReceiptCheck {
        expected: ContractResult,
        actual: ContractResult,
    },

    /// Too many transactions are pending; try again later.
    #[error("server busy")]
    ServerBusy,

    #[error("storage failure: {0}")]
    StorageFailure(String),
}
