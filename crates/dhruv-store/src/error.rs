//! Error types for the store crate.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur in the store crate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON column (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested row does not exist. The message is user-facing.
    #[error("{0}")]
    NotFound(String),

    /// Input rejected before touching the database. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// A stored value could not be decoded.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

impl From<dhruv_types::UnknownVariant> for StoreError {
    fn from(err: dhruv_types::UnknownVariant) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_bare() {
        let err: StoreError = ValidationError::NotPositive("Amount").into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Amount must be a positive number");
    }

    #[test]
    fn test_unknown_variant_is_invalid_data() {
        let err: StoreError = "brunch".parse::<dhruv_types::MealType>().unwrap_err().into();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
