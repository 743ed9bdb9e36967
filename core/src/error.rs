use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Authorization(String),

    #[error("Insufficient balance. You can withdraw up to {}", crate::money::format_currency(*available))]
    InsufficientFunds { available: Decimal },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BankError {
    /// True for failures of the backing store rather than of the request.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Database(_)
                | Self::Io(_)
                | Self::Csv(_)
                | Self::Serialization(_)
        )
    }

    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Authorization(_) => "authorization",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            _ if self.is_storage() => "storage",
            _ => "internal",
        }
    }
}

pub type BankResult<T> = Result<T, BankError>;
