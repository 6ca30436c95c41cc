use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("sync configuration has no slice identifier")]
    MissingSlice,

    #[error("slice `{slice}` has no field tree bound")]
    MissingFieldTree { slice: String },

    #[error("slice `{slice}` already has an attached controller")]
    SliceAlreadyAttached { slice: String },

    #[error("no controller with id {0}")]
    UnknownController(u64),
}

pub type Result<T> = std::result::Result<T, SyncError>;
