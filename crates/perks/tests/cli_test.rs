//! Integration tests for the `perks` CLI binary.
//!
//! Every test runs against its own SQLite file in a temp directory, with
//! the config directories pointed somewhere that does not exist.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `perks` binary with env isolation.
fn perks_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("perks");
    cmd.env("HOME", "/tmp/perks-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/perks-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/perks-cli-test-nonexistent")
        .env("PERKS_CONFIG", dir.join("perks.toml"))
        .env("PERKS_DB", dir.join("perks.db"))
        .env_remove("PERKS_TOKEN")
        .env_remove("PERKS_TOKEN_SECRET")
        .env_remove("PERKS_OUTPUT")
        .env_remove("PERKS_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Register a user and return its ID.
fn register(dir: &Path, email: &str) -> String {
    let output = perks_cmd(dir)
        .args(["-o", "plain", "users", "register", "--name", "Ada"])
        .args(["--email", email, "--password", "pa55word"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    String::from_utf8(output.stdout).unwrap().trim().to_owned()
}

fn credit(dir: &Path, user: &str, points: &str) {
    perks_cmd(dir)
        .args(["points", "add", points, "--user", user])
        .assert()
        .success();
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = TempDir::new().unwrap();
    let output = perks_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    perks_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("users")
            .and(predicate::str::contains("vouchers"))
            .and(predicate::str::contains("wallet")),
    );
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    perks_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("perks"));
}

#[test]
fn test_completions_zsh() {
    let dir = TempDir::new().unwrap();
    perks_cmd(dir.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_env() {
    let dir = TempDir::new().unwrap();
    perks_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("perks.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    perks_cmd(dir.path()).args(["config", "init"]).assert().success();
    assert!(dir.path().join("perks.toml").exists());

    let output = perks_cmd(dir.path()).args(["config", "init"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("already exists"));

    perks_cmd(dir.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

// ── Users and points ────────────────────────────────────────────────

#[test]
fn test_duplicate_email_is_a_conflict() {
    let dir = TempDir::new().unwrap();
    register(dir.path(), "ada@example.com");
    let output = perks_cmd(dir.path())
        .args(["users", "register", "--name", "Ada"])
        .args(["--email", "ada@example.com", "--password", "pa55word"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6), "{}", combined_output(&output));
}

#[test]
fn test_invalid_registration_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = perks_cmd(dir.path())
        .args(["users", "register", "--name", "Ada"])
        .args(["--email", "not-an-email", "--password", "short"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("email") && text.contains("password"), "{text}");
}

#[test]
fn test_points_accumulate_across_invocations() {
    let dir = TempDir::new().unwrap();
    let user = register(dir.path(), "ada@example.com");
    credit(dir.path(), &user, "40");
    credit(dir.path(), &user, "60");
    perks_cmd(dir.path())
        .args(["-o", "plain", "points", "show", "--user", &user])
        .assert()
        .success()
        .stdout("100\n");
}

#[test]
fn test_commands_need_a_user() {
    let dir = TempDir::new().unwrap();
    let output = perks_cmd(dir.path())
        .args(["points", "show"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("No user selected"));
}

#[test]
fn test_login_token_selects_the_user() {
    let dir = TempDir::new().unwrap();
    let user = register(dir.path(), "ada@example.com");
    credit(dir.path(), &user, "25");

    let output = perks_cmd(dir.path())
        .env("PERKS_TOKEN_SECRET", "cli-test-secret")
        .args(["-o", "plain", "users", "login", "--email", "ada@example.com"])
        .args(["--password", "pa55word"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let token = String::from_utf8(output.stdout).unwrap().trim().to_owned();

    perks_cmd(dir.path())
        .env("PERKS_TOKEN_SECRET", "cli-test-secret")
        .env("PERKS_TOKEN", &token)
        .args(["-o", "plain", "points", "show"])
        .assert()
        .success()
        .stdout("25\n");
}

#[test]
fn test_login_without_secret_explains_itself() {
    let dir = TempDir::new().unwrap();
    register(dir.path(), "ada@example.com");
    let output = perks_cmd(dir.path())
        .args(["users", "login", "--email", "ada@example.com"])
        .args(["--password", "pa55word"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("token signing secret"));
}

#[test]
fn test_wrong_password_is_an_auth_failure() {
    let dir = TempDir::new().unwrap();
    register(dir.path(), "ada@example.com");
    let output = perks_cmd(dir.path())
        .args(["--token-secret", "cli-test-secret"])
        .args(["users", "login", "--email", "ada@example.com"])
        .args(["--password", "wrong-password"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("Invalid email or password"));
}

// ── Vouchers and wallet ─────────────────────────────────────────────

#[test]
fn test_unknown_voucher_is_not_found() {
    let dir = TempDir::new().unwrap();
    let output = perks_cmd(dir.path())
        .args(["vouchers", "get", "NOPE"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("NOPE"));
}

#[test]
fn test_exchange_then_list_wallet() {
    let dir = TempDir::new().unwrap();
    let user = register(dir.path(), "ada@example.com");
    credit(dir.path(), &user, "150");

    let output = perks_cmd(dir.path())
        .args(["-o", "json", "wallet", "exchange", "--user", &user])
        .args(["--points", "50", "--description", "Five off", "--discount", "5"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let voucher: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let code = voucher["code"].as_str().unwrap().to_owned();
    assert_eq!(voucher["usage_limit"], 1);

    perks_cmd(dir.path())
        .args(["-o", "plain", "points", "show", "--user", &user])
        .assert()
        .success()
        .stdout("100\n");

    let output = perks_cmd(dir.path())
        .args(["-o", "json", "wallet", "list", "--user", &user])
        .output()
        .unwrap();
    let owned: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(owned[0]["code"], code.as_str());
    assert_eq!(owned[0]["remaining"], 1);

    perks_cmd(dir.path())
        .args(["-o", "plain", "wallet", "use", &code, "--user", &user])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_exchange_beyond_balance_is_rejected() {
    let dir = TempDir::new().unwrap();
    let user = register(dir.path(), "ada@example.com");
    credit(dir.path(), &user, "100");

    let output = perks_cmd(dir.path())
        .args(["wallet", "exchange", "--user", &user])
        .args(["--points", "150", "--description", "Too much", "--discount", "5"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9), "{}", combined_output(&output));

    perks_cmd(dir.path())
        .args(["-o", "plain", "points", "show", "--user", &user])
        .assert()
        .success()
        .stdout("100\n");
}

#[test]
fn test_created_voucher_is_listed_and_redeemable_once() {
    let dir = TempDir::new().unwrap();
    let user = register(dir.path(), "ada@example.com");

    perks_cmd(dir.path())
        .args(["vouchers", "create", "--code", "SAVE10"])
        .args(["--description", "Ten off", "--discount", "10"])
        .args(["--expires", "2099-01-01T00:00:00Z", "--usage-limit", "5"])
        .assert()
        .success();

    perks_cmd(dir.path())
        .args(["-o", "plain", "vouchers", "list"])
        .assert()
        .success()
        .stdout("SAVE10\n");

    perks_cmd(dir.path())
        .args(["wallet", "redeem", "SAVE10", "--user", &user])
        .assert()
        .success();
    let output = perks_cmd(dir.path())
        .args(["wallet", "redeem", "SAVE10", "--user", &user])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9));
}

#[test]
fn test_delete_requires_confirmation_off_a_terminal() {
    let dir = TempDir::new().unwrap();
    perks_cmd(dir.path())
        .args(["vouchers", "create", "--code", "GONE"])
        .args(["--description", "Soon gone", "--expires", "2099-01-01T00:00:00Z"])
        .assert()
        .success();

    let output = perks_cmd(dir.path())
        .args(["vouchers", "delete", "GONE"])
        .write_stdin("")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    perks_cmd(dir.path())
        .args(["-y", "vouchers", "delete", "GONE"])
        .assert()
        .success();
    let output = perks_cmd(dir.path())
        .args(["vouchers", "get", "GONE"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_sweep_reports_a_count() {
    let dir = TempDir::new().unwrap();
    perks_cmd(dir.path())
        .args(["-o", "plain", "sweep"])
        .assert()
        .success()
        .stdout("0\n");
}
