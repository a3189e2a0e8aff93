//! Clap derive structures for the `perks` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// perks -- loyalty points and vouchers from the command line
#[derive(Debug, Parser)]
#[command(
    name = "perks",
    version,
    about = "Manage loyalty points, vouchers and wallets",
    long_about = "Administer the perks loyalty backend.\n\n\
        Users earn points, exchange them for vouchers, redeem shared\n\
        vouchers into their wallet and spend them. Every command runs\n\
        against the configured SQLite database.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "PERKS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, short = 'd', env = "PERKS_DB", global = true)]
    pub database: Option<PathBuf>,

    /// Use a throwaway in-memory store
    #[arg(long, global = true, conflicts_with = "database")]
    pub in_memory: bool,

    /// Bearer token of the user to act as (from `perks users login`)
    #[arg(long, env = "PERKS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Token signing secret (overrides config)
    #[arg(long, env = "PERKS_TOKEN_SECRET", global = true, hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PERKS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Storage operation timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register, log in and edit users
    #[command(alias = "u")]
    Users(UsersArgs),

    /// Read and credit point balances
    #[command(alias = "pts")]
    Points(PointsArgs),

    /// Manage vouchers
    #[command(alias = "v")]
    Vouchers(VouchersArgs),

    /// A user's vouchers: exchange, redeem, use and list
    #[command(alias = "w")]
    Wallet(WalletArgs),

    /// Deactivate expired vouchers
    Sweep(SweepArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Which user a command acts on. Without `--user`, the `--token` holder.
#[derive(Debug, Args)]
pub struct UserSelector {
    /// User ID (defaults to the user the token was issued to)
    #[arg(long)]
    pub user: Option<String>,
}

// ── Users ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// Register a new user
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Password (8-72 bytes)
        #[arg(long, env = "PERKS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Check credentials and print a token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PERKS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show a user
    #[command(alias = "whoami")]
    Get {
        #[command(flatten)]
        who: UserSelector,
    },

    /// Update a user's profile
    Update {
        #[command(flatten)]
        who: UserSelector,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// JSON file with any of: name, email, password, addresses, phones
        #[arg(long, short = 'F')]
        from_file: Option<PathBuf>,
    },
}

// ── Points ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PointsArgs {
    #[command(subcommand)]
    pub command: PointsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PointsCommand {
    /// Show a user's balance
    Show {
        #[command(flatten)]
        who: UserSelector,
    },

    /// Credit points to a user
    Add {
        /// Points to credit
        points: i64,
        #[command(flatten)]
        who: UserSelector,
    },
}

// ── Vouchers ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct VouchersArgs {
    #[command(subcommand)]
    pub command: VouchersCommand,
}

#[derive(Debug, Subcommand)]
pub enum VouchersCommand {
    /// Create a voucher
    Create {
        /// Voucher code (generated when omitted)
        #[arg(long)]
        code: Option<String>,
        #[arg(long, required_unless_present = "from_file")]
        description: Option<String>,
        /// Discount amount, or percentage with --percentage
        #[arg(long, default_value = "0")]
        discount: i64,
        #[arg(long)]
        percentage: bool,
        /// Start of validity (RFC 3339, defaults to now)
        #[arg(long)]
        starts: Option<String>,
        /// End of validity (RFC 3339)
        #[arg(long, required_unless_present = "from_file")]
        expires: Option<String>,
        /// How many times the voucher may be used in total
        #[arg(long, default_value = "1")]
        usage_limit: i64,
        #[arg(long, default_value = "0")]
        min_spend: i64,
        #[arg(long, default_value = "")]
        category: String,
        /// Create from a JSON file instead of flags
        #[arg(long, short = 'F', conflicts_with_all = ["description", "expires"])]
        from_file: Option<PathBuf>,
    },

    /// Show a voucher
    Get { code: String },

    /// List vouchers, one page at a time
    #[command(alias = "ls")]
    List {
        /// Exact code
        #[arg(long)]
        code: Option<String>,
        /// Only vouchers starting at or after (RFC 3339)
        #[arg(long)]
        starts_from: Option<String>,
        /// Only vouchers expiring at or before (RFC 3339)
        #[arg(long)]
        expires_until: Option<String>,
        #[arg(long)]
        active_only: bool,
        /// Only vouchers whose minimum spend is at most this
        #[arg(long)]
        max_min_spend: Option<i64>,
        #[arg(long)]
        category: Option<String>,
        /// Sort key, `-` prefix for descending (e.g. -expires)
        #[arg(long, default_value = "code")]
        sort: String,
        /// Page size (1-100)
        #[arg(long, short = 'l', default_value = "20")]
        limit: u32,
        /// Continue after this code (printed by the previous page)
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Delete a voucher
    #[command(alias = "rm")]
    Delete { code: String },

    /// Count one use of a voucher outside any wallet
    CountUse { code: String },
}

// ── Wallet ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WalletArgs {
    #[command(subcommand)]
    pub command: WalletCommand,
}

#[derive(Debug, Subcommand)]
pub enum WalletCommand {
    /// List usable vouchers and remaining uses
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        who: UserSelector,
    },

    /// Spend points on a new single-use voucher
    Exchange {
        #[command(flatten)]
        who: UserSelector,
        /// Points to spend
        #[arg(long)]
        points: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        discount: i64,
        #[arg(long)]
        percentage: bool,
        /// Validity in seconds from now
        #[arg(long, default_value = "2592000")]
        valid_for: u64,
        #[arg(long, default_value = "")]
        category: String,
    },

    /// Add an existing voucher to the wallet
    Redeem {
        code: String,
        #[command(flatten)]
        who: UserSelector,
        /// Uses granted
        #[arg(long, default_value = "1")]
        uses: u32,
    },

    /// Spend one use of a voucher in the wallet
    Use {
        code: String,
        #[command(flatten)]
        who: UserSelector,
    },
}

// ── Sweep ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Keep sweeping on the configured interval until interrupted
    #[arg(long)]
    pub watch: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the resolved configuration
    Show,

    /// Print the configuration file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
