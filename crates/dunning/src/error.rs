//! Dunning error types

use thiserror::Error;

/// Dunning-specific errors
#[derive(Debug, Error)]
pub enum DunningError {
    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("Invoice failure record not found: {0}")]
    InvoiceNotFound(String),

    #[error("Invalid subscription status: {0}")]
    InvalidStatus(String),

    #[error("Candidate listing failed: {0}")]
    CandidateListing(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DunningError {
    fn from(err: sqlx::Error) -> Self {
        DunningError::Database(err.to_string())
    }
}

pub type DunningResult<T> = Result<T, DunningError>;
