use axum::http::StatusCode;
use thiserror::Error;

/// Failures surfaced by the account manager and its stores.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User must have an email address")]
    EmptyEmail,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("A user with this email already exists.")]
    DuplicateEmail,
    #[error("User not found")]
    NotFound,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AccountError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::EmptyEmail | AccountError::InvalidEmail => StatusCode::BAD_REQUEST,
            AccountError::DuplicateEmail => StatusCode::CONFLICT,
            AccountError::NotFound => StatusCode::NOT_FOUND,
            AccountError::PasswordHash(_) | AccountError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AccountError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AccountError::DuplicateEmail
            }
            sqlx::Error::RowNotFound => AccountError::NotFound,
            other => AccountError::Storage(other.into()),
        }
    }
}
