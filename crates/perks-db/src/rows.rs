use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// A row of the `users` table.
///
/// `addresses` and `phones` hold JSON arrays; use [`to_json`] and
/// [`from_json`] to move between them and typed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub addresses: String,
    pub phones: String,
    pub points: i64,
    pub version: i64,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str = "id, created_at, updated_at, name, email, \
         password_hash, addresses, phones, points, version";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            name: row.get("name")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            addresses: row.get("addresses")?,
            phones: row.get("phones")?,
            points: row.get("points")?,
            version: row.get("version")?,
        })
    }
}

/// A row of the `vouchers` table. The code is the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherRow {
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
    pub category: String,
}

impl VoucherRow {
    pub(crate) const COLUMNS: &'static str = "code, created_at, updated_at, description, \
         discount, is_percentage, starts, expires, active, usage_limit, usage_count, \
         min_spend, category";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get("code")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            description: row.get("description")?,
            discount: row.get("discount")?,
            is_percentage: row.get("is_percentage")?,
            starts: row.get("starts")?,
            expires: row.get("expires")?,
            active: row.get("active")?,
            usage_limit: row.get("usage_limit")?,
            usage_count: row.get("usage_count")?,
            min_spend: row.get("min_spend")?,
            category: row.get("category")?,
        })
    }
}

/// Result of a conditional single-row update.
///
/// Separates "no row has this key" from "the row exists but its state
/// did not satisfy the update's condition".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    ConditionFailed,
    Missing,
}

// ── Voucher listing ─────────────────────────────────────────────────

/// Sortable voucher columns. Only these names ever reach SQL text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderColumn {
    #[default]
    Code,
    Starts,
    Expires,
    Active,
    MinSpend,
    Category,
}

impl OrderColumn {
    pub const fn column(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Starts => "starts",
            Self::Expires => "expires",
            Self::Active => "active",
            Self::MinSpend => "min_spend",
            Self::Category => "category",
        }
    }
}

/// Filter, order and page window for [`crate::vouchers::list_vouchers`].
///
/// `after` is the code of the last voucher on the previous page. Rows
/// are ordered by `(order_by, code)` so the cursor is unambiguous even
/// when the sort column has duplicates.
#[derive(Debug, Clone, Default)]
pub struct VoucherQuery {
    pub code: Option<String>,
    pub starts_from: Option<DateTime<Utc>>,
    pub expires_until: Option<DateTime<Utc>>,
    pub active_only: bool,
    pub max_min_spend: Option<i64>,
    pub category: Option<String>,
    pub order_by: OrderColumn,
    pub descending: bool,
    pub after: Option<String>,
    pub limit: u32,
}

// ── JSON columns ────────────────────────────────────────────────────

/// Encode a value for a JSON text column.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a JSON text column.
pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    Ok(serde_json::from_str(text)?)
}
