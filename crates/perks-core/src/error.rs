// ── Core error types ──
//
// The domain taxonomy every store and facade operation reports. Storage
// driver failures never escape raw: the `From<perks_db::Error>` impl
// classifies them at the store boundary, and anything unclassifiable
// becomes an opaque `Storage` error.

use std::collections::BTreeMap;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    // ── Lookup ───────────────────────────────────────────────────────
    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    // ── Uniqueness ───────────────────────────────────────────────────
    #[error("a user with this email address already exists")]
    DuplicateEmail,

    #[error("a voucher with this code already exists")]
    DuplicateCode,

    #[error("voucher already exists")]
    VoucherAlreadyExists,

    #[error("voucher already redeemed")]
    AlreadyGranted,

    // ── Conditional writes ───────────────────────────────────────────
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    // ── Business rules ───────────────────────────────────────────────
    #[error("insufficient points to exchange for a voucher")]
    InsufficientPoints,

    #[error("voucher is not available")]
    VoucherNotAvailable,

    #[error("validation failed: {}", format_field_errors(.errors))]
    ValidationFailed { errors: BTreeMap<String, String> },

    // ── Authentication ───────────────────────────────────────────────
    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or expired authentication token")]
    InvalidToken,

    // ── Infrastructure ───────────────────────────────────────────────
    #[error("storage operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            identifier: identifier.into(),
        }
    }

    /// Build a `ValidationFailed` carrying a single field error.
    pub fn invalid(field: &str, message: &str) -> Self {
        Self::ValidationFailed {
            errors: BTreeMap::from([(field.to_owned(), message.to_owned())]),
        }
    }

    /// Text safe to show an end user.
    ///
    /// Business and validation failures are described precisely;
    /// storage and internal failures collapse to a generic message.
    pub fn public_message(&self) -> String {
        match self {
            Self::Timeout { .. } | Self::Storage(_) | Self::Internal(_) => {
                "the server encountered a problem and could not process your request".into()
            }
            other => other.to_string(),
        }
    }

    /// Field-addressable detail, present only for validation failures.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::ValidationFailed { errors } => Some(errors),
            _ => None,
        }
    }

    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EditConflict | Self::Timeout { .. })
    }
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field} {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Conversion from storage-driver errors ────────────────────────────

impl From<perks_db::Error> for CoreError {
    fn from(err: perks_db::Error) -> Self {
        match err {
            perks_db::Error::UniqueViolation { ref table, ref column } => {
                match (table.as_str(), column.as_str()) {
                    ("users", "email") => CoreError::DuplicateEmail,
                    ("vouchers", "code") => CoreError::DuplicateCode,
                    ("entitlements", _) => CoreError::AlreadyGranted,
                    _ => CoreError::Storage(err.to_string()),
                }
            }
            perks_db::Error::DeadlineExceeded { budget_ms } => CoreError::Timeout {
                timeout_ms: budget_ms,
            },
            perks_db::Error::Cancelled => CoreError::Cancelled,
            perks_db::Error::ForeignKeyViolation
            | perks_db::Error::Sqlite(_)
            | perks_db::Error::Encoding(_)
            | perks_db::Error::Poisoned
            | perks_db::Error::Join(_) => CoreError::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_unique_violations() {
        let email = perks_db::Error::UniqueViolation {
            table: "users".into(),
            column: "email".into(),
        };
        assert_eq!(CoreError::from(email), CoreError::DuplicateEmail);

        let code = perks_db::Error::UniqueViolation {
            table: "vouchers".into(),
            column: "code".into(),
        };
        assert_eq!(CoreError::from(code), CoreError::DuplicateCode);
    }

    #[test]
    fn deadline_becomes_timeout() {
        let err = CoreError::from(perks_db::Error::DeadlineExceeded { budget_ms: 3000 });
        assert_eq!(err, CoreError::Timeout { timeout_ms: 3000 });
        assert!(err.is_retryable());
    }

    #[test]
    fn storage_detail_is_not_public() {
        let err = CoreError::from(perks_db::Error::Poisoned);
        assert!(matches!(err, CoreError::Storage(_)));
        assert!(!err.public_message().contains("poisoned"));
    }

    #[test]
    fn validation_detail_is_public() {
        let err = CoreError::invalid("email", "must be provided");
        assert_eq!(err.public_message(), "validation failed: email must be provided");
        assert_eq!(
            err.field_errors().and_then(|e| e.get("email")).map(String::as_str),
            Some("must be provided")
        );
    }
}
