//! Expiry sweep handler.

use serde::Serialize;

use perks_core::{Perks, Store};

use crate::cli::{GlobalOpts, SweepArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct SweepOutcome {
    deactivated: usize,
}

pub async fn handle<S: Store>(
    perks: &Perks<S>,
    args: SweepArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let deactivated = perks.sweep_expired().await?;
    let out = output::render_single(
        &global.output,
        &SweepOutcome { deactivated },
        |o| format!("Deactivated {} expired voucher(s)", o.deactivated),
        |o| o.deactivated.to_string(),
    )?;
    output::print_output(&out, global.quiet);

    if !args.watch {
        return Ok(());
    }
    if !perks.spawn_expiry_sweep().await {
        return Err(CliError::Validation {
            field: "sweep.interval_secs".into(),
            reason: "must be positive to watch; set it in the configuration file \
                     or PERKS_SWEEP__INTERVAL_SECS"
                .into(),
        });
    }

    output::notice("Sweeping on the configured interval, Ctrl-C to stop", global.quiet);
    let waited = tokio::signal::ctrl_c().await;
    perks.shutdown().await;
    waited?;
    Ok(())
}
