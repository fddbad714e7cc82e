//! Failure taxonomy shared by every registry operation

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Loan identifier {0:?} must be two letters followed by seven digits")]
    InvalidIdentifier(String),
    #[error("Loan identifier {0} already exists")]
    DuplicateIdentifier(String),
    #[error("No loan recorded under {0}")]
    NotFound(String),
    #[error("Record under {key} is corrupt: {reason}")]
    CorruptRecord { key: String, reason: String },
    #[error("Invalid value {value:?} for {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Cannot move loan from {from} to {requested}")]
    InvalidTransition { from: String, requested: String },
    #[error("{affiliation} may not change {field} while the loan is {status}")]
    PermissionDenied {
        affiliation: String,
        field: String,
        status: String,
    },
    #[error("Record under {0} changed while the operation was in progress")]
    ConcurrentModification(String),
    #[error("Caller identity unavailable: {0}")]
    IdentityUnavailable(String),
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl RegistryError {
    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<sled::Error> for RegistryError {
    fn from(err: sled::Error) -> Self {
        Self::LedgerUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
