//! Wallet handlers: a user's own vouchers.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use perks_core::{ExchangeRequest, OwnedVoucher, Perks, RedeemRequest, Store};

use crate::cli::{GlobalOpts, WalletArgs, WalletCommand};
use crate::error::CliError;
use crate::output;

use super::{util, vouchers};

#[derive(Tabled)]
struct OwnedRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Discount")]
    discount: String,
    #[tabled(rename = "Min Spend")]
    min_spend: i64,
    #[tabled(rename = "Expires")]
    expires: String,
    #[tabled(rename = "Uses Left")]
    remaining: u32,
}

impl From<&OwnedVoucher> for OwnedRow {
    fn from(o: &OwnedVoucher) -> Self {
        let v = &o.voucher;
        Self {
            code: v.code.clone(),
            description: v.description.clone(),
            discount: vouchers::discount(v),
            min_spend: v.min_spend,
            expires: output::timestamp(&v.expires),
            remaining: o.remaining,
        }
    }
}

#[derive(Serialize)]
struct UseOutcome {
    code: String,
    remaining: u32,
}

pub async fn handle<S: Store>(
    perks: &Perks<S>,
    args: WalletArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        WalletCommand::List { who } => {
            let user = util::acting_user(perks, global, &who).await?;
            let owned = perks.my_vouchers(user).await?;
            let out = output::render_list(
                &global.output,
                &owned,
                |o| OwnedRow::from(o),
                |o| o.voucher.code.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WalletCommand::Exchange {
            who,
            points,
            description,
            discount,
            percentage,
            valid_for,
            category,
        } => {
            let user = util::acting_user(perks, global, &who).await?;
            let voucher = perks
                .exchange(
                    user,
                    ExchangeRequest {
                        points,
                        description,
                        discount,
                        is_percentage: percentage,
                        valid_for: Duration::from_secs(valid_for),
                        category,
                    },
                )
                .await?;
            output::notice(
                &format!("Spent {points} points on voucher {}", voucher.code),
                global.quiet,
            );
            let out = output::render_single(&global.output, &voucher, vouchers::detail, |v| {
                v.code.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WalletCommand::Redeem { code, who, uses } => {
            let user = util::acting_user(perks, global, &who).await?;
            perks
                .redeem(
                    user,
                    RedeemRequest {
                        code: code.clone(),
                        uses,
                    },
                )
                .await?;
            output::notice(
                &format!("Voucher {code} added to the wallet ({uses} use(s))"),
                global.quiet,
            );
            Ok(())
        }

        WalletCommand::Use { code, who } => {
            let user = util::acting_user(perks, global, &who).await?;
            let remaining = perks.use_voucher(user, &code).await?;
            let outcome = UseOutcome { code, remaining };
            let out = output::render_single(
                &global.output,
                &outcome,
                |o| format!("Used {}; {} use(s) left", o.code, o.remaining),
                |o| o.remaining.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
