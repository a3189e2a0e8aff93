//! Command dispatch: bridges CLI args -> `Perks` operations -> output formatting.

pub mod config_cmd;
pub mod points;
pub mod sweep;
pub mod users;
pub mod util;
pub mod vouchers;
pub mod wallet;

use perks_core::{Perks, Store};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a store-bound command to the appropriate handler.
pub async fn dispatch<S: Store>(
    cmd: Command,
    perks: &Perks<S>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Users(args) => users::handle(perks, args, global).await,
        Command::Points(args) => points::handle(perks, args, global).await,
        Command::Vouchers(args) => vouchers::handle(perks, args, global).await,
        Command::Wallet(args) => wallet::handle(perks, args, global).await,
        Command::Sweep(args) => sweep::handle(perks, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
