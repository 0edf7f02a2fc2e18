pub mod account_service;
pub mod container;
pub mod listing;
pub mod saga;
pub mod user_service;

pub use account_service::*;
pub use container::*;
pub use saga::{SagaOutcome, SagaReport};
pub use user_service::*;

use crate::backend::BackendError;
use crate::repository::RepositoryError;

/// Service error types
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    #[error("Email already registered: {0}")]
    AlreadyExists(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email address not verified")]
    EmailNotVerified,

    #[error("Administrator role required")]
    Forbidden,
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => ServiceError::NotFound,
            RepositoryError::DuplicateEmail(email) => ServiceError::AlreadyExists(email),
            other => ServiceError::Repository(other),
        }
    }
}

impl ServiceError {
    /// Failures caused by the submitted input rather than by the system
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_)
                | ServiceError::AlreadyExists(_)
                | ServiceError::InvalidCredentials
                | ServiceError::EmailNotVerified
                | ServiceError::Forbidden
        )
    }
}

/// Run `validator` checks and flatten the messages into a `Validation` error
pub(crate) fn validate<T: validator::Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|errors| ServiceError::Validation(crate::utils::format_validation_errors(&errors)))
}
