//! Point balance handlers.

use serde::Serialize;

use perks_core::{Perks, Store, UserId};

use crate::cli::{GlobalOpts, PointsArgs, PointsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct Balance {
    user: UserId,
    points: i64,
}

fn print_balance(balance: &Balance, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        balance,
        |b| format!("User:   {}\nPoints: {}", b.user, b.points),
        |b| b.points.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle<S: Store>(
    perks: &Perks<S>,
    args: PointsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PointsCommand::Show { who } => {
            let user = util::acting_user(perks, global, &who).await?;
            let points = perks.points(user).await?;
            print_balance(&Balance { user, points }, global)
        }

        PointsCommand::Add { points, who } => {
            let user = util::acting_user(perks, global, &who).await?;
            perks.add_points(user, points).await?;
            output::notice(&format!("Credited {points} points"), global.quiet);
            let points = perks.points(user).await?;
            print_balance(&Balance { user, points }, global)
        }
    }
}
