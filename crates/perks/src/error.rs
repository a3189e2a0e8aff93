//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use perks_config::ConfigError;
use perks_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const TIMEOUT: i32 = 8;
    pub const REJECTED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────

    #[error("Invalid email or password")]
    #[diagnostic(code(perks::auth_failed))]
    AuthFailed,

    #[error("The token is invalid or has expired")]
    #[diagnostic(
        code(perks::invalid_token),
        help("Log in again with: perks users login --email <EMAIL>")
    )]
    InvalidToken,

    #[error("No user selected")]
    #[diagnostic(
        code(perks::no_user),
        help(
            "Pass --user <ID>, or log in and pass the token:\n\
             perks users login --email <EMAIL> -o plain, then --token <TOKEN> or PERKS_TOKEN"
        )
    )]
    NoUser,

    #[error("No token signing secret is configured")]
    #[diagnostic(
        code(perks::no_token_secret),
        help(
            "Set auth.token_secret_env in the configuration file,\n\
             or pass --token-secret / PERKS_TOKEN_SECRET."
        )
    )]
    NoTokenSecret,

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(perks::not_found),
        help("Run: perks {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(perks::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    #[error("The record changed while it was being updated")]
    #[diagnostic(code(perks::edit_conflict), help("Run the command again."))]
    EditConflict,

    // ── Business rules ───────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(code(perks::rejected))]
    Rejected { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(perks::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(perks::config),
        help("Check the configuration file and PERKS_* environment variables.")
    )]
    Config(#[from] ConfigError),

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(perks::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(perks::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Infrastructure ───────────────────────────────────────────────

    #[error("Storage operation timed out after {millis}ms")]
    #[diagnostic(
        code(perks::timeout),
        help("Increase the timeout with --timeout or store.op_timeout_secs.")
    )]
    Timeout { millis: u64 },

    #[error("{message}")]
    #[diagnostic(code(perks::storage))]
    Storage { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(perks::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed | Self::InvalidToken | Self::NoUser | Self::NoTokenSecret => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::EditConflict => exit_code::CONFLICT,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<perks_db::Error> for CliError {
    fn from(err: perks_db::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.public_message();
        match err {
            CoreError::NotFound { entity, identifier } => CliError::NotFound {
                list_command: list_command(entity).into(),
                resource_type: entity.into(),
                identifier,
            },

            CoreError::DuplicateEmail => CliError::Conflict {
                resource_type: "user with this email".into(),
                identifier: "email".into(),
            },

            CoreError::DuplicateCode | CoreError::VoucherAlreadyExists => CliError::Conflict {
                resource_type: "voucher".into(),
                identifier: "code".into(),
            },

            CoreError::EditConflict => CliError::EditConflict,

            CoreError::AlreadyGranted
            | CoreError::InsufficientPoints
            | CoreError::VoucherNotAvailable => CliError::Rejected { message },

            CoreError::ValidationFailed { errors } => {
                let field = errors.keys().cloned().collect::<Vec<_>>().join(", ");
                let reason = errors
                    .iter()
                    .map(|(k, v)| format!("{k} {v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                CliError::Validation { field, reason }
            }

            CoreError::InvalidCredentials => CliError::AuthFailed,
            CoreError::InvalidToken => CliError::InvalidToken,

            CoreError::Timeout { timeout_ms } => CliError::Timeout { millis: timeout_ms },

            CoreError::Cancelled | CoreError::Storage(_) | CoreError::Internal(_) => {
                tracing::debug!(error = %err, "operation failed");
                CliError::Storage { message }
            }
        }
    }
}

fn list_command(entity: &str) -> &'static str {
    match entity {
        "voucher" => "vouchers list",
        _ => "users get",
    }
}
