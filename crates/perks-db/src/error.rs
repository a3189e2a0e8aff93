use thiserror::Error;

/// Top-level error type for the `perks-db` crate.
///
/// Covers every failure mode of the storage driver: SQLite itself,
/// constraint violations, connection locking, and the per-operation
/// deadline. `perks-core` classifies these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Constraints ─────────────────────────────────────────────────
    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("unique constraint violated on {table}.{column}")]
    UniqueViolation { table: String, column: String },

    /// A FOREIGN KEY constraint rejected the write.
    #[error("foreign key constraint violated")]
    ForeignKeyViolation,

    // ── Driver ──────────────────────────────────────────────────────
    /// Any other SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    /// A JSON-encoded column could not be encoded or decoded.
    #[error("column encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("connection lock poisoned")]
    Poisoned,

    /// The blocking worker running the statement panicked or was aborted.
    #[error("storage worker failed: {0}")]
    Join(String),

    // ── Deadlines ───────────────────────────────────────────────────
    /// The operation did not complete within its deadline.
    #[error("storage operation exceeded its {budget_ms}ms deadline")]
    DeadlineExceeded { budget_ms: u64 },

    /// The caller cancelled the operation before it committed.
    #[error("storage operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if the unique constraint on `table.column` was violated.
    pub fn is_unique_violation(&self, table: &str, column: &str) -> bool {
        matches!(self, Self::UniqueViolation { table: t, column: c } if t == table && c == column)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, Some(ref message)) = err {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    if let Some((table, column)) = parse_constraint_target(message) {
                        return Self::UniqueViolation { table, column };
                    }
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::ForeignKeyViolation,
                _ => {}
            }
        }
        Self::Sqlite(err)
    }
}

/// Extract `(table, column)` from a message such as
/// `UNIQUE constraint failed: users.email`.
fn parse_constraint_target(message: &str) -> Option<(String, String)> {
    let target = message.rsplit(": ").next()?;
    // Composite keys report every column; the first one names the table.
    let first = target.split(", ").next()?;
    let (table, column) = first.split_once('.')?;
    Some((table.to_owned(), column.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_column_target() {
        assert_eq!(
            parse_constraint_target("UNIQUE constraint failed: users.email"),
            Some(("users".into(), "email".into()))
        );
    }

    #[test]
    fn parses_composite_target() {
        assert_eq!(
            parse_constraint_target(
                "UNIQUE constraint failed: entitlements.user_id, entitlements.code"
            ),
            Some(("entitlements".into(), "user_id".into()))
        );
    }

    #[test]
    fn rejects_unstructured_message() {
        assert_eq!(parse_constraint_target("database is locked"), None);
    }
}
