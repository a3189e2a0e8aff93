// ── Runtime configuration ──
//
// Tuning knobs and secrets for a `Perks` instance. Built by the binary
// (usually from `perks-config`) and handed in; core never reads files.

use std::time::Duration;

use secrecy::SecretString;

/// How issued tokens are signed and how long they stay valid.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC signing secret.
    pub secret: SecretString,
    /// Lifetime of an issued token.
    pub ttl: Duration,
}

/// Configuration for one `Perks` instance.
#[derive(Debug, Clone)]
pub struct PerksConfig {
    /// Deadline applied to every storage operation.
    pub op_timeout: Duration,
    /// How many generated codes to try before giving up on an exchange.
    pub code_attempts: u32,
    /// Interval of the background expiry sweep. `None` disables it.
    pub sweep_interval: Option<Duration>,
    pub token: TokenConfig,
}

impl Default for PerksConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(3),
            code_attempts: 3,
            sweep_interval: None,
            token: TokenConfig {
                secret: SecretString::from(String::new()),
                ttl: Duration::from_secs(24 * 60 * 60),
            },
        }
    }
}
