//! Compute provider error types

use thiserror::Error;

/// Compute provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, CloudError>;
