mod cli;
mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use perks_config::{Config, LogFormat};
use perks_core::{MemoryStore, Perks, PerksConfig, SqliteStore, StoreContext};
use perks_db::Database;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands work even when the config file is broken
        Command::Config(args) => {
            init_tracing(cli.global.verbose, LogFormat::Text);
            commands::config_cmd::handle(args, &cli.global)
        }

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "perks", &mut std::io::stdout());
            Ok(())
        }

        // All other commands need a store
        cmd => {
            let cfg = perks_config::load_config(cli.global.config.as_deref())?;
            init_tracing(cli.global.verbose, cfg.log.format);
            let runtime = build_perks_config(&cfg, &cli.global)?;
            let ctx = StoreContext::new(runtime.op_timeout);

            tracing::debug!(command = ?cmd, "dispatching command");
            let Some(path) = database_path(&cfg, &cli.global) else {
                let perks = Perks::new(MemoryStore::new(ctx), runtime);
                return commands::dispatch(cmd, &perks, &cli.global).await;
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            tracing::debug!(path = %path.display(), "opening database");
            let db = Database::open(&path)?;
            let perks = Perks::new(SqliteStore::new(db, ctx), runtime);
            commands::dispatch(cmd, &perks, &cli.global).await
        }
    }
}

/// Build the runtime `PerksConfig` from the config file plus CLI overrides.
fn build_perks_config(cfg: &Config, global: &GlobalOpts) -> Result<PerksConfig, CliError> {
    let mut cfg = cfg.clone();
    if let Some(timeout) = global.timeout {
        cfg.store.op_timeout_secs = timeout;
    }
    let secret = global.token_secret.clone().map(SecretString::from);
    Ok(cfg.to_perks_config(secret)?)
}

/// `None` selects the in-memory store.
fn database_path(cfg: &Config, global: &GlobalOpts) -> Option<PathBuf> {
    if global.in_memory {
        return None;
    }
    global.database.clone().or_else(|| cfg.database_path())
}
