// ── Voucher domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discount voucher, keyed by its code.
///
/// `usage_count` only moves through the store's atomic increment, and
/// `active` flips to `false` in the same write that makes
/// `usage_count == usage_limit`. It is not recomputed from the validity
/// window on read; the expiry sweep catches vouchers that lapse unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: String,
    pub discount: i64,
    pub is_percentage: bool,
    pub starts: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub active: bool,
    pub usage_limit: i64,
    pub usage_count: i64,
    pub min_spend: i64,
    #[serde(default)]
    pub category: String,
}

impl Voucher {
    /// Whether the voucher can be used at `now`: active and not past expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires > now
    }

    pub fn remaining_uses(&self) -> i64 {
        (self.usage_limit - self.usage_count).max(0)
    }
}

/// An active voucher joined with the caller's remaining uses of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedVoucher {
    #[serde(flatten)]
    pub voucher: Voucher,
    pub remaining: u32,
}
