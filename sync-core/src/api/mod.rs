//! Sia renter API client module
//!
//! This module wraps the parts of the renter HTTP API the sync engine needs:
//! uploading, deleting, listing and looking up files, plus a version query
//! used as a connectivity check. Idempotent reads are retried with
//! exponential backoff; uploads and deletes are not.

pub mod client;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use client::{RenterClient, RenterClientBuilder, DEFAULT_ADDRESS, DEFAULT_USER_AGENT};
pub use error::{Result, StoreError};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryability() {
        let unavailable = StoreError::Unavailable("renter busy".to_string());
        assert!(unavailable.is_retryable());

        let auth_error = StoreError::Authentication("invalid password".to_string());
        assert!(!auth_error.is_retryable());

        let server_error = StoreError::Rejected {
            status: 500,
            message: "internal server error".to_string(),
        };
        assert!(server_error.is_retryable());

        let client_error = StoreError::Rejected {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!client_error.is_retryable());

        assert!(!StoreError::AlreadyExists("a".to_string()).is_retryable());
        assert!(!StoreError::NotFound("a".to_string()).is_retryable());
    }
}
