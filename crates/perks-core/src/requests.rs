// ── Typed request payloads ──
//
// Inputs to the `Perks` facade. Field names follow the wire format the
// outer surface accepts; validation happens in the facade.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::model::{Address, Phone};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<SecretString>,
    pub addresses: Option<Vec<Address>>,
    pub phones: Option<Vec<Phone>>,
}

/// Admin voucher creation. A code is generated when `code` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVoucherRequest {
    #[serde(default)]
    pub code: Option<String>,
    pub description: String,
    pub discount: i64,
    #[serde(default)]
    pub is_percentage: bool,
    pub starts: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub usage_limit: i64,
    #[serde(default)]
    pub min_spend: i64,
    #[serde(default)]
    pub category: String,
}

/// Spend `points` on a new single-use voucher valid for `valid_for`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub points: i64,
    pub description: String,
    pub discount: i64,
    #[serde(default)]
    pub is_percentage: bool,
    #[serde(with = "secs")]
    pub valid_for: Duration,
    #[serde(default)]
    pub category: String,
}

/// Claim `uses` uses of an existing voucher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
    #[serde(default = "one")]
    pub uses: u32,
}

const fn one() -> u32 {
    1
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn redeem_defaults_to_one_use() {
        let req: RedeemRequest = serde_json::from_str(r#"{"code":"SAVE10"}"#).unwrap();
        assert_eq!(req.uses, 1);
    }

    #[test]
    fn exchange_validity_is_in_seconds() {
        let req: ExchangeRequest = serde_json::from_str(
            r#"{"points":50,"description":"5 off","discount":5,"valid_for":3600}"#,
        )
        .unwrap();
        assert_eq!(req.valid_for, Duration::from_secs(3600));
        assert!(!req.is_percentage);
    }
}
