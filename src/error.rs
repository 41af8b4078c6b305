// Error taxonomy for the ledger and its backing store.

use thiserror::Error;

/// Failures from the durable key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stored value for `{key}` is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("stored value for `{key}` has unsupported version {version}")]
    UnsupportedVersion { key: String, version: u32 },

    /// Used by in-memory stores that simulate an unavailable backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a rejected ledger operation.
///
/// Everything except `StorageFailure` is a user-correctable validation
/// result; the ledger state is untouched in every case.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("stake must be a positive amount (got {0})")]
    InvalidStake(i64),

    #[error("odds must be a finite multiplier of at least 1.0 (got {0})")]
    InvalidOdds(f64),

    #[error("amount must be positive (got {0})")]
    InvalidAmount(i64),

    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: i64, required: i64 },

    #[error("item `{0}` is already owned")]
    AlreadyOwned(String),

    #[error("failed to persist ledger state: {0}")]
    StorageFailure(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable kind, used for metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidStake(_) => "invalid_stake",
            LedgerError::InvalidOdds(_) => "invalid_odds",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::AlreadyOwned(_) => "already_owned",
            LedgerError::StorageFailure(_) => "storage_failure",
        }
    }

    /// Whether the user can fix this by changing their input.
    pub fn is_validation(&self) -> bool {
        !matches!(self, LedgerError::StorageFailure(_))
    }
}
