//! Config subcommand handlers.

use std::path::PathBuf;

use perks_config::{Config, LogFormat};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

fn target_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(perks_config::config_path)
}

fn detail(cfg: &Config) -> String {
    let database = cfg
        .database_path()
        .map_or_else(|| "(in memory)".into(), |p| p.display().to_string());
    let sweep = match cfg.sweep.interval_secs {
        0 => "disabled".into(),
        secs => format!("every {secs}s"),
    };
    let secret = if cfg.token_secret().is_some() {
        "configured"
    } else {
        "not configured"
    };
    let log = match cfg.log.format {
        LogFormat::Text => "text",
        LogFormat::Json => "json",
    };
    [
        format!("Database:      {database}"),
        format!("Op timeout:    {}s", cfg.store.op_timeout_secs),
        format!("Code attempts: {}", cfg.exchange.code_attempts),
        format!("Expiry sweep:  {sweep}"),
        format!("Token secret:  {secret}"),
        format!("Token TTL:     {}s", cfg.auth.token_ttl_secs),
        format!("Log format:    {log}"),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = target_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            perks_config::save_config(&Config::default(), &path)?;
            output::notice(
                &format!("Configuration written to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = perks_config::load_config(global.config.as_deref())?;
            // Never echo a plaintext secret.
            if cfg.auth.token_secret.is_some() {
                cfg.auth.token_secret = Some("********".into());
            }
            let out = output::render_single(&global.output, &cfg, detail, |c| {
                c.database_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&target_path(global).display().to_string(), global.quiet);
            Ok(())
        }
    }
}
