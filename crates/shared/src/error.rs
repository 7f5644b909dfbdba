//! Error types for Paygrid

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaygridError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dunning error: {0}")]
    Dunning(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
