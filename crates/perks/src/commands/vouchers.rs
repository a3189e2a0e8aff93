//! Voucher command handlers.

use chrono::Utc;
use tabled::Tabled;

use perks_core::{CreateVoucherRequest, Filters, Page, Perks, Store, Voucher, VoucherFilter};

use crate::cli::{GlobalOpts, OutputFormat, VouchersArgs, VouchersCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(super) struct VoucherRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Discount")]
    discount: String,
    #[tabled(rename = "Min Spend")]
    min_spend: i64,
    #[tabled(rename = "Uses")]
    uses: String,
    #[tabled(rename = "Expires")]
    expires: String,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&Voucher> for VoucherRow {
    fn from(v: &Voucher) -> Self {
        Self {
            code: v.code.clone(),
            description: v.description.clone(),
            discount: discount(v),
            min_spend: v.min_spend,
            uses: format!("{}/{}", v.usage_count, v.usage_limit),
            expires: output::timestamp(&v.expires),
            active: output::yes_no(v.active).into(),
        }
    }
}

pub(super) fn discount(v: &Voucher) -> String {
    if v.is_percentage {
        format!("{}%", v.discount)
    } else {
        v.discount.to_string()
    }
}

pub(super) fn detail(v: &Voucher) -> String {
    [
        format!("Code:        {}", v.code),
        format!("Description: {}", v.description),
        format!("Discount:    {}", discount(v)),
        format!("Min Spend:   {}", v.min_spend),
        format!(
            "Category:    {}",
            if v.category.is_empty() { "-" } else { &v.category }
        ),
        format!("Starts:      {}", output::timestamp(&v.starts)),
        format!("Expires:     {}", output::timestamp(&v.expires)),
        format!("Uses:        {}/{}", v.usage_count, v.usage_limit),
        format!("Active:      {}", output::yes_no(v.active)),
    ]
    .join("\n")
}

fn print_voucher(v: &Voucher, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(&global.output, v, detail, |v| v.code.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Structured formats carry the page metadata; table and plain print the
/// rows and mention the next cursor on stderr.
fn print_page(page: &Page<Voucher>, global: &GlobalOpts) -> Result<(), CliError> {
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let out = output::render_list(
                &global.output,
                &page.items,
                |v| VoucherRow::from(v),
                |v| v.code.clone(),
            )?;
            output::print_output(&out, global.quiet);
            if let Some(ref cursor) = page.metadata.cursor {
                output::notice(&format!("More results: --cursor {cursor}"), global.quiet);
            }
        }
        _ => {
            let out = output::render_single(&global.output, page, |_| String::new(), |_| {
                String::new()
            })?;
            output::print_output(&out, global.quiet);
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle<S: Store>(
    perks: &Perks<S>,
    args: VouchersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        VouchersCommand::Create {
            code,
            description,
            discount,
            percentage,
            starts,
            expires,
            usage_limit,
            min_spend,
            category,
            from_file,
        } => {
            let req: CreateVoucherRequest = if let Some(ref path) = from_file {
                util::read_json_file(path)?
            } else {
                let starts = if let Some(ref s) = starts {
                    util::parse_time("starts", s)?
                } else {
                    Utc::now()
                };
                let expires = expires.ok_or_else(|| CliError::Validation {
                    field: "expires".into(),
                    reason: "required".into(),
                })?;
                CreateVoucherRequest {
                    code,
                    description: description.unwrap_or_default(),
                    discount,
                    is_percentage: percentage,
                    starts,
                    expires: util::parse_time("expires", &expires)?,
                    usage_limit,
                    min_spend,
                    category,
                }
            };

            let voucher = perks.create_voucher(req).await?;
            output::notice(&format!("Voucher {} created", voucher.code), global.quiet);
            print_voucher(&voucher, global)
        }

        VouchersCommand::Get { code } => {
            let voucher = perks.voucher(&code).await?;
            print_voucher(&voucher, global)
        }

        VouchersCommand::List {
            code,
            starts_from,
            expires_until,
            active_only,
            max_min_spend,
            category,
            sort,
            limit,
            cursor,
        } => {
            let filter = VoucherFilter {
                code,
                starts_from: starts_from
                    .as_deref()
                    .map(|s| util::parse_time("starts-from", s))
                    .transpose()?,
                expires_until: expires_until
                    .as_deref()
                    .map(|s| util::parse_time("expires-until", s))
                    .transpose()?,
                active_only,
                max_min_spend,
                category,
            };
            let filters = Filters {
                cursor,
                page_size: limit,
                sort,
            };

            let page = perks.list_vouchers(&filter, &filters).await?;
            print_page(&page, global)
        }

        VouchersCommand::Delete { code } => {
            if !util::confirm(&format!("Delete voucher {code}?"), global.yes)? {
                return Ok(());
            }
            perks.delete_voucher(&code).await?;
            output::notice("Voucher deleted", global.quiet);
            Ok(())
        }

        VouchersCommand::CountUse { code } => {
            perks.increment_usage(&code).await?;
            let voucher = perks.voucher(&code).await?;
            output::notice(
                &format!(
                    "Voucher {} used {}/{} times",
                    voucher.code, voucher.usage_count, voucher.usage_limit
                ),
                global.quiet,
            );
            print_voucher(&voucher, global)
        }
    }
}
