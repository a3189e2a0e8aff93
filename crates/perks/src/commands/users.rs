//! User command handlers.

use secrecy::SecretString;
use tabled::Tabled;

use perks_core::{
    AuthToken, LoginRequest, Perks, RegisterRequest, Store, UpdateUserRequest, User,
};

use crate::cli::{GlobalOpts, UsersArgs, UsersCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntitlementRow {
    #[tabled(rename = "Voucher")]
    code: String,
    #[tabled(rename = "Uses Left")]
    remaining: u32,
}

fn detail(u: &User) -> String {
    let mut lines = vec![
        format!("ID:        {}", u.id),
        format!("Name:      {}", u.name),
        format!("Email:     {}", u.email),
        format!("Points:    {}", u.points),
        format!("Vouchers:  {}", u.vouchers.len()),
        format!("Version:   {}", u.version),
        format!("Created:   {}", output::timestamp(&u.created_at)),
    ];
    for a in &u.addresses {
        lines.push(format!(
            "Address:   {} {}, {} {}",
            a.street, a.number, a.postal_code, a.city
        ));
    }
    for p in &u.phones {
        lines.push(format!("Phone:     +{} {}", p.country_number, p.number));
    }
    if !u.vouchers.is_empty() {
        let rows: Vec<EntitlementRow> = u
            .vouchers
            .iter()
            .map(|(code, remaining)| EntitlementRow {
                code: code.clone(),
                remaining: *remaining,
            })
            .collect();
        lines.push(
            tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string(),
        );
    }
    lines.join("\n")
}

fn token_detail(t: &AuthToken) -> String {
    [
        format!("Token:   {}", t.token),
        format!("Expires: {}", output::timestamp(&t.expiry)),
    ]
    .join("\n")
}

fn print_user(u: &User, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(&global.output, u, detail, |u| u.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle<S: Store>(
    perks: &Perks<S>,
    args: UsersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        UsersCommand::Register {
            name,
            email,
            password,
        } => {
            let user = perks
                .register(RegisterRequest {
                    name,
                    email,
                    password: SecretString::from(password),
                })
                .await?;
            print_user(&user, global)
        }

        UsersCommand::Login { email, password } => {
            util::require_token_secret(perks)?;
            let (_, token) = perks
                .login(LoginRequest {
                    email,
                    password: SecretString::from(password),
                })
                .await?;
            let out = output::render_single(&global.output, &token, token_detail, |t| {
                t.token.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        UsersCommand::Get { who } => {
            let id = util::acting_user(perks, global, &who).await?;
            let user = perks.user(id).await?;
            print_user(&user, global)
        }

        UsersCommand::Update {
            who,
            name,
            email,
            password,
            from_file,
        } => {
            let id = util::acting_user(perks, global, &who).await?;
            let mut req: UpdateUserRequest = if let Some(ref path) = from_file {
                util::read_json_file(path)?
            } else {
                UpdateUserRequest::default()
            };
            // Flags win over the file
            if name.is_some() {
                req.name = name;
            }
            if email.is_some() {
                req.email = email;
            }
            if let Some(password) = password {
                req.password = Some(SecretString::from(password));
            }
            if req.name.is_none()
                && req.email.is_none()
                && req.password.is_none()
                && req.addresses.is_none()
                && req.phones.is_none()
            {
                return Err(CliError::Validation {
                    field: "update".into(),
                    reason: "nothing to change; pass --name, --email, --password or --from-file"
                        .into(),
                });
            }

            let user = perks.update_user(id, req).await?;
            output::notice(&format!("User {} updated", user.id), global.quiet);
            print_user(&user, global)
        }
    }
}
