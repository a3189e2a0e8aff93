// ── Listing filters and cursor pagination ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::CoreError;
use crate::validator::{Validator, validate_page};

/// Accepted values of the voucher `sort` parameter.
pub const VOUCHER_SORT_SAFELIST: &[&str] = &[
    "code",
    "starts",
    "expires",
    "active",
    "min_spend",
    "category",
    "-code",
    "-starts",
    "-expires",
    "-active",
    "-min_spend",
    "-category",
];

/// Cursor pagination request: the code of the last item already seen,
/// a page size and a sort key, optionally `-`-prefixed for descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub cursor: Option<String>,
    pub page_size: u32,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            cursor: None,
            page_size: 20,
            sort: "code".into(),
        }
    }
}

impl Filters {
    /// Check the page size and that `sort` is in `safelist`.
    pub fn validate(&self, safelist: &[&str]) -> Result<(), CoreError> {
        let mut v = Validator::new();
        validate_page(&mut v, self.page_size, &self.sort, safelist);
        v.finish()
    }

    /// The validated sort key for voucher listings.
    pub fn voucher_sort(&self) -> Result<VoucherSort, CoreError> {
        self.validate(VOUCHER_SORT_SAFELIST)?;
        let (descending, name) = match self.sort.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, self.sort.as_str()),
        };
        let field = name
            .parse::<SortField>()
            .map_err(|_| CoreError::invalid("sort", "invalid sort value"))?;
        Ok(VoucherSort { field, descending })
    }
}

/// Voucher fields a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SortField {
    Code,
    Starts,
    Expires,
    Active,
    MinSpend,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoucherSort {
    pub field: SortField,
    pub descending: bool,
}

/// Predicates for voucher listings. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherFilter {
    /// Exact code.
    pub code: Option<String>,
    /// Only vouchers starting at or after this instant.
    pub starts_from: Option<DateTime<Utc>>,
    /// Only vouchers expiring at or before this instant.
    pub expires_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active_only: bool,
    /// Only vouchers whose minimum spend is at most this amount.
    pub max_min_spend: Option<i64>,
    pub category: Option<String>,
}

// ── Pages ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Pass back as `Filters::cursor` to fetch the next page. Absent on
    /// the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub metadata: Metadata,
}

impl<T> Page<T> {
    /// Wrap one fetched page. A short page is the last one.
    pub fn new(items: Vec<T>, page_size: u32, key: impl Fn(&T) -> String) -> Self {
        let full = u32::try_from(items.len()).is_ok_and(|n| n >= page_size);
        let cursor = if full { items.last().map(key) } else { None };
        Self {
            items,
            metadata: Metadata { cursor, page_size },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_descending_sort() {
        let filters = Filters {
            sort: "-min_spend".into(),
            ..Filters::default()
        };
        assert_eq!(
            filters.voucher_sort().unwrap(),
            VoucherSort {
                field: SortField::MinSpend,
                descending: true,
            }
        );
    }

    #[test]
    fn rejects_unlisted_sort() {
        let filters = Filters {
            sort: "usage_count".into(),
            ..Filters::default()
        };
        let err = filters.voucher_sort().unwrap_err();
        assert_eq!(err.field_errors().unwrap()["sort"], "invalid sort value");
    }

    #[test]
    fn full_page_carries_cursor() {
        let page = Page::new(vec!["a", "b"], 2, |s| (*s).to_owned());
        assert_eq!(page.metadata.cursor.as_deref(), Some("b"));

        let last = Page::new(vec!["c"], 2, |s| (*s).to_owned());
        assert_eq!(last.metadata.cursor, None);
    }
}
