//! Application-wide error types.

use axum::http::StatusCode;
use loan_protocol::{AuthError, LoanError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Loan(#[from] LoanError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Session not authenticated")]
    Unauthorized,

    #[error("Invalid session id")]
    InvalidSession,

    #[error("Too many sessions with a PIN submission in flight")]
    SessionCapacity,

    /// The request body could not be read as the expected JSON shape.
    #[error("Invalid request body: {message}")]
    InvalidBody { status: StatusCode, message: String },
}

pub type Result<T> = std::result::Result<T, TrackerError>;
