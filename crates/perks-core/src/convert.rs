// ── Row <-> domain conversions ──
//
// Bridges `perks_db` rows and the domain model. Numeric narrowing is
// checked; a stored value out of range is a storage fault.

use std::collections::BTreeMap;

use perks_db::rows::{from_json, to_json};
use perks_db::{OrderColumn, UserRow, VoucherQuery, VoucherRow};

use crate::error::CoreError;
use crate::filter::{SortField, VoucherFilter, VoucherSort};
use crate::model::{User, Voucher};

pub(crate) fn user_to_row(user: &User) -> Result<UserRow, CoreError> {
    Ok(UserRow {
        id: user.id.to_string(),
        created_at: user.created_at,
        updated_at: user.updated_at,
        name: user.name.clone(),
        email: user.email.clone(),
        password_hash: user.password_hash.clone(),
        addresses: to_json(&user.addresses)?,
        phones: to_json(&user.phones)?,
        points: user.points,
        version: to_i64(user.version)?,
    })
}

pub(crate) fn user_from_row(
    row: UserRow,
    entitlements: BTreeMap<String, i64>,
) -> Result<User, CoreError> {
    Ok(User {
        id: row
            .id
            .parse()
            .map_err(|_| CoreError::Storage(format!("malformed user id {:?}", row.id)))?,
        created_at: row.created_at,
        updated_at: row.updated_at,
        name: row.name,
        email: row.email,
        password_hash: row.password_hash,
        addresses: from_json(&row.addresses)?,
        phones: from_json(&row.phones)?,
        vouchers: entitlements_from_rows(entitlements)?,
        points: row.points,
        version: u64::try_from(row.version)
            .map_err(|_| CoreError::Storage(format!("negative version {}", row.version)))?,
    })
}

pub(crate) fn entitlements_from_rows(
    rows: BTreeMap<String, i64>,
) -> Result<BTreeMap<String, u32>, CoreError> {
    rows.into_iter()
        .map(|(code, remaining)| Ok((code, to_u32(remaining)?)))
        .collect()
}

pub(crate) fn entitlements_to_rows(map: &BTreeMap<String, u32>) -> BTreeMap<String, i64> {
    map.iter()
        .map(|(code, remaining)| (code.clone(), i64::from(*remaining)))
        .collect()
}

pub(crate) fn voucher_to_row(voucher: &Voucher) -> VoucherRow {
    VoucherRow {
        code: voucher.code.clone(),
        created_at: voucher.created_at,
        updated_at: voucher.updated_at,
        description: voucher.description.clone(),
        discount: voucher.discount,
        is_percentage: voucher.is_percentage,
        starts: voucher.starts,
        expires: voucher.expires,
        active: voucher.active,
        usage_limit: voucher.usage_limit,
        usage_count: voucher.usage_count,
        min_spend: voucher.min_spend,
        category: voucher.category.clone(),
    }
}

pub(crate) fn voucher_from_row(row: VoucherRow) -> Voucher {
    Voucher {
        code: row.code,
        created_at: row.created_at,
        updated_at: row.updated_at,
        description: row.description,
        discount: row.discount,
        is_percentage: row.is_percentage,
        starts: row.starts,
        expires: row.expires,
        active: row.active,
        usage_limit: row.usage_limit,
        usage_count: row.usage_count,
        min_spend: row.min_spend,
        category: row.category,
    }
}

pub(crate) fn voucher_query(
    filter: &VoucherFilter,
    sort: VoucherSort,
    cursor: Option<&str>,
    limit: u32,
) -> VoucherQuery {
    VoucherQuery {
        code: filter.code.clone(),
        starts_from: filter.starts_from,
        expires_until: filter.expires_until,
        active_only: filter.active_only,
        max_min_spend: filter.max_min_spend,
        category: filter.category.clone(),
        order_by: order_column(sort.field),
        descending: sort.descending,
        after: cursor.map(str::to_owned),
        limit,
    }
}

fn order_column(field: SortField) -> OrderColumn {
    match field {
        SortField::Code => OrderColumn::Code,
        SortField::Starts => OrderColumn::Starts,
        SortField::Expires => OrderColumn::Expires,
        SortField::Active => OrderColumn::Active,
        SortField::MinSpend => OrderColumn::MinSpend,
        SortField::Category => OrderColumn::Category,
    }
}

pub(crate) fn to_i64(value: u64) -> Result<i64, CoreError> {
    i64::try_from(value).map_err(|_| CoreError::Internal(format!("{value} exceeds i64")))
}

pub(crate) fn to_u32(value: i64) -> Result<u32, CoreError> {
    u32::try_from(value).map_err(|_| CoreError::Storage(format!("count {value} out of range")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Address, Phone};

    #[test]
    fn user_survives_row_conversion() {
        let mut user = User::new("Alice", "alice@example.com", "hash".into());
        user.addresses.push(Address {
            street: "Main St".into(),
            number: "12".into(),
            postal_code: 1010,
            city: "Springfield".into(),
        });
        user.phones.push(Phone {
            country_number: "+65".into(),
            number: "5550100".into(),
        });
        user.vouchers.insert("SAVE10".into(), 2);
        user.points = 40;

        let row = user_to_row(&user).unwrap();
        let back = user_from_row(row, entitlements_to_rows(&user.vouchers)).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn negative_entitlement_is_a_storage_fault() {
        let rows = BTreeMap::from([("X".to_owned(), -1)]);
        assert!(matches!(
            entitlements_from_rows(rows),
            Err(CoreError::Storage(_))
        ));
    }
}
