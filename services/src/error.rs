use sea_orm::DbErr;
use thiserror::Error;

/// Error surface of the tracking services. Distinguishes caller mistakes
/// (validation, state conflicts) from storage faults so an HTTP layer can map
/// them to the right status codes.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    StateConflict(String),

    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
