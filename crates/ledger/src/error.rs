//! The module contains the errors the ledger can throw.
//!
//! The variants mirror the failure classes of the operations:
//!
//! - [`Validation`] for malformed input (empty name, zero amount, taken name).
//! - [`NotFound`] for absent customers, transactions or actions.
//! - [`Precondition`] when an operation needs a state that does not hold.
//! - [`Conflict`] when an undo would break history consistency.
//! - [`State`] for illegal transitions such as a double undo.
//!
//! [`Validation`]: LedgerError::Validation
//! [`NotFound`]: LedgerError::NotFound
//! [`Precondition`]: LedgerError::Precondition
//! [`Conflict`]: LedgerError::Conflict
//! [`State`]: LedgerError::State
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Illegal state: {0}")]
    State(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Precondition(a), Self::Precondition(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::State(a), Self::State(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
