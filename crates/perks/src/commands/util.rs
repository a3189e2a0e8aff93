//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use perks_core::{Perks, Store, UserId};

use crate::cli::{GlobalOpts, UserSelector};
use crate::error::CliError;

/// Resolve the user a command acts on: `--user` if given, otherwise the
/// holder of `--token`.
pub async fn acting_user<S: Store>(
    perks: &Perks<S>,
    global: &GlobalOpts,
    who: &UserSelector,
) -> Result<UserId, CliError> {
    if let Some(ref id) = who.user {
        return id.parse().map_err(|_| CliError::Validation {
            field: "user".into(),
            reason: format!("not a user ID: {id}"),
        });
    }
    let Some(ref token) = global.token else {
        return Err(CliError::NoUser);
    };
    require_token_secret(perks)?;
    Ok(perks.authenticate(token).await?.id)
}

/// Fail early with a helpful diagnostic when tokens cannot be signed.
pub fn require_token_secret<S: Store>(perks: &Perks<S>) -> Result<(), CliError> {
    if perks.config().token.secret.expose_secret().is_empty() {
        return Err(CliError::NoTokenSecret);
    }
    Ok(())
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read and parse a JSON file for `--from-file` flags.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Parse an RFC 3339 timestamp argument.
pub fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CliError::Validation {
            field: field.into(),
            reason: format!("expected an RFC 3339 timestamp: {e}"),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_offsets_into_utc() {
        let t = parse_time("expires", "2030-01-01T02:00:00+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_bare_dates() {
        let err = parse_time("expires", "2030-01-01").unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "expires"));
    }
}
