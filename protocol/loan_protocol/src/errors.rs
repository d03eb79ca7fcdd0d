//! Error types shared by the protocol modules.
//!
//! Sequencer rejections are *not* errors; they come back as
//! [`Decision::Rejected`](crate::Decision::Rejected).  Only infrastructure
//! failures and corrupt data use these enums.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanError {
    #[error("Installment store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Unknown installment: {0}")]
    UnknownInstallment(String),

    /// The stored paid flag no longer matches the snapshot the transition
    /// was evaluated against.
    #[error("Installment {0} changed since it was last read")]
    StaleSnapshot(String),

    #[error("Corrupt installment sequence at position {position}: expected {expected}, found {found}")]
    CorruptSequence {
        position: usize,
        expected: u32,
        found: u32,
    },
}

/// Failure of the PIN verification round-trip itself (never a wrong PIN).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("PIN verification unavailable: {0}")]
pub struct VerifyError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Another submission for this session has not resolved yet.
    #[error("A PIN submission is already in flight")]
    SubmissionInFlight,

    /// The normalized code does not have exactly six digits.
    #[error("PIN must be exactly {expected} digits, got {found}")]
    MalformedCode { expected: usize, found: usize },

    #[error("Session storage error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, LoanError>;
