//! Internal helpers for input normalization and store conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! the cleanup applied to caller-supplied strings so every operation
//! stores and compares the same shape.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{LedgerError, ResultLedger};

/// NFC-normalize a fullname and collapse runs of whitespace.
///
/// Returns `Validation` when nothing is left after trimming.
pub(crate) fn normalize_fullname(value: &str) -> ResultLedger<String> {
    let normalized: String = value.nfc().collect();
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(LedgerError::Validation(
            "fullname must not be empty".to_string(),
        ));
    }
    Ok(collapsed)
}

/// Keep digits only; the core does not validate phone formats.
pub(crate) fn normalize_phone(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Lowercased, trimmed search input.
pub(crate) fn normalize_query(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultLedger<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| LedgerError::State(format!("invalid {label} id in store: {value}")))
}
