use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("session token does not belong to this store")]
    ForeignToken,

    #[error("no revocable layer to pop")]
    NothingToPop,

    /// The backend failed to persist a flush batch. Callers treat the store
    /// as unusable afterwards.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
