// ── Voucher statements ──

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::error::Error;
use crate::rows::{OrderColumn, UpdateOutcome, VoucherQuery, VoucherRow};

/// Insert a voucher. `usage_count` is always stored as zero.
///
/// A duplicate code surfaces as [`Error::UniqueViolation`] on `vouchers.code`.
pub fn insert_voucher(conn: &Connection, voucher: &VoucherRow) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO vouchers (code, created_at, updated_at, description, discount,
                               is_percentage, starts, expires, active, usage_limit,
                               usage_count, min_spend, category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12)",
        params![
            voucher.code,
            voucher.created_at,
            voucher.updated_at,
            voucher.description,
            voucher.discount,
            voucher.is_percentage,
            voucher.starts,
            voucher.expires,
            voucher.active,
            voucher.usage_limit,
            voucher.min_spend,
            voucher.category,
        ],
    )?;
    Ok(())
}

pub fn get_voucher(conn: &Connection, code: &str) -> Result<Option<VoucherRow>, Error> {
    let sql = format!("SELECT {} FROM vouchers WHERE code = ?1", VoucherRow::COLUMNS);
    Ok(conn
        .query_row(&sql, params![code], VoucherRow::from_row)
        .optional()?)
}

/// Fetch every voucher whose code is in `codes`, in one statement.
/// Unknown codes are skipped.
pub fn get_vouchers(conn: &Connection, codes: &[String]) -> Result<Vec<VoucherRow>, Error> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {} FROM vouchers WHERE code IN (SELECT value FROM json_each(?1)) ORDER BY code",
        VoucherRow::COLUMNS
    );
    let codes = serde_json::to_string(codes)?;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![codes], VoucherRow::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Count one use of the voucher, only while it is active and under its limit.
///
/// The increment and the limit check are one statement; the voucher is
/// deactivated in the same write when the new count reaches the limit.
pub fn increment_usage(
    conn: &Connection,
    code: &str,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, Error> {
    let changed = conn.execute(
        "UPDATE vouchers
         SET usage_count = usage_count + 1,
             active = CASE WHEN usage_count + 1 >= usage_limit THEN 0 ELSE 1 END,
             updated_at = ?2
         WHERE code = ?1 AND active = 1 AND usage_count < usage_limit",
        params![code, now],
    )?;
    if changed == 1 {
        return Ok(UpdateOutcome::Applied);
    }
    let exists = conn
        .query_row("SELECT 1 FROM vouchers WHERE code = ?1", params![code], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(if exists {
        UpdateOutcome::ConditionFailed
    } else {
        UpdateOutcome::Missing
    })
}

/// Returns `false` if no voucher has this code.
pub fn delete_voucher(conn: &Connection, code: &str) -> Result<bool, Error> {
    Ok(conn.execute("DELETE FROM vouchers WHERE code = ?1", params![code])? == 1)
}

/// Deactivate every active voucher whose `expires` is at or before `now`.
pub fn deactivate_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize, Error> {
    Ok(conn.execute(
        "UPDATE vouchers SET active = 0, updated_at = ?1 WHERE active = 1 AND expires <= ?1",
        params![now],
    )?)
}

/// One page of vouchers matching `query`, in `(order_by, code)` order.
pub fn list_vouchers(conn: &Connection, query: &VoucherQuery) -> Result<Vec<VoucherRow>, Error> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(code) = &query.code {
        clauses.push("code = ?".into());
        values.push(Box::new(code.clone()));
    }
    if let Some(starts) = query.starts_from {
        clauses.push("starts >= ?".into());
        values.push(Box::new(starts));
    }
    if let Some(expires) = query.expires_until {
        clauses.push("expires <= ?".into());
        values.push(Box::new(expires));
    }
    if query.active_only {
        clauses.push("active = 1".into());
    }
    if let Some(min_spend) = query.max_min_spend {
        clauses.push("min_spend <= ?".into());
        values.push(Box::new(min_spend));
    }
    if let Some(category) = &query.category {
        clauses.push("category = ?".into());
        values.push(Box::new(category.clone()));
    }

    let column = query.order_by.column();
    let (cmp, direction) = if query.descending {
        ("<", "DESC")
    } else {
        (">", "ASC")
    };
    if let Some(after) = &query.after {
        if query.order_by == OrderColumn::Code {
            clauses.push(format!("code {cmp} ?"));
            values.push(Box::new(after.clone()));
        } else {
            // A cursor whose voucher no longer exists compares as NULL and
            // ends the listing.
            clauses.push(format!(
                "({column}, code) {cmp} ((SELECT {column} FROM vouchers WHERE code = ?), ?)"
            ));
            values.push(Box::new(after.clone()));
            values.push(Box::new(after.clone()));
        }
    }

    let filter = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let order = if query.order_by == OrderColumn::Code {
        format!("code {direction}")
    } else {
        format!("{column} {direction}, code {direction}")
    };
    let sql = format!(
        "SELECT {} FROM vouchers {filter} ORDER BY {order} LIMIT ?",
        VoucherRow::COLUMNS
    );
    values.push(Box::new(query.limit));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), VoucherRow::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
