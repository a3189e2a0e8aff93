// ── User and entitlement statements ──
//
// Functions take `&Connection`; a `&Transaction` derefs to one, so the
// same statements run standalone or inside a transaction. Every write
// that changes a user's points or entitlements bumps `version`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Error;
use crate::rows::{UpdateOutcome, UserRow};

/// Insert a new user. A duplicate email surfaces as
/// [`Error::UniqueViolation`] on `users.email`.
pub fn insert_user(conn: &Connection, user: &UserRow) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO users (id, created_at, updated_at, name, email, password_hash,
                            addresses, phones, points, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            user.id,
            user.created_at,
            user.updated_at,
            user.name,
            user.email,
            user.password_hash,
            user.addresses,
            user.phones,
            user.points,
            user.version,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>, Error> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", UserRow::COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], UserRow::from_row)
        .optional()?)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, Error> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", UserRow::COLUMNS);
    Ok(conn
        .query_row(&sql, params![email], UserRow::from_row)
        .optional()?)
}

pub fn user_exists(conn: &Connection, id: &str) -> Result<bool, Error> {
    Ok(conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Add `delta` (possibly negative) to the user's points.
///
/// Returns `false` if no user has this id. No lower bound is enforced.
pub fn add_points(
    conn: &Connection,
    id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<bool, Error> {
    let changed = conn.execute(
        "UPDATE users SET points = points + ?2, version = version + 1, updated_at = ?3
         WHERE id = ?1",
        params![id, delta, now],
    )?;
    Ok(changed == 1)
}

/// Subtract `amount` from the user's points only if the balance covers it.
pub fn deduct_points(
    conn: &Connection,
    id: &str,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, Error> {
    let changed = conn.execute(
        "UPDATE users SET points = points - ?2, version = version + 1, updated_at = ?3
         WHERE id = ?1 AND points >= ?2",
        params![id, amount, now],
    )?;
    if changed == 1 {
        Ok(UpdateOutcome::Applied)
    } else if user_exists(conn, id)? {
        Ok(UpdateOutcome::ConditionFailed)
    } else {
        Ok(UpdateOutcome::Missing)
    }
}

/// The user's entitlement map, `code -> remaining uses`.
pub fn entitlements(conn: &Connection, id: &str) -> Result<BTreeMap<String, i64>, Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT code, remaining FROM entitlements WHERE user_id = ?1 ORDER BY code",
    )?;
    let rows = stmt.query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut map = BTreeMap::new();
    for row in rows {
        let (code, remaining) = row?;
        map.insert(code, remaining);
    }
    Ok(map)
}

/// Insert `code -> uses` into the user's entitlements if the key is absent.
///
/// `ConditionFailed` means the user already holds this code.
pub fn grant_entitlement(
    conn: &Connection,
    id: &str,
    code: &str,
    uses: i64,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, Error> {
    if !user_exists(conn, id)? {
        return Ok(UpdateOutcome::Missing);
    }
    let inserted = conn.execute(
        "INSERT INTO entitlements (user_id, code, remaining) VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id, code) DO NOTHING",
        params![id, code, uses],
    )?;
    if inserted == 0 {
        return Ok(UpdateOutcome::ConditionFailed);
    }
    bump_version(conn, id, now)?;
    Ok(UpdateOutcome::Applied)
}

/// Spend one use of `code`, only if at least one remains.
///
/// Returns the remaining count after the decrement, or `None` if the
/// user holds no usable entitlement for `code`.
pub fn consume_entitlement(
    conn: &Connection,
    id: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>, Error> {
    let remaining: Option<i64> = conn
        .query_row(
            "UPDATE entitlements SET remaining = remaining - 1
             WHERE user_id = ?1 AND code = ?2 AND remaining > 0
             RETURNING remaining",
            params![id, code],
            |row| row.get(0),
        )
        .optional()?;
    if remaining.is_some() {
        bump_version(conn, id, now)?;
    }
    Ok(remaining)
}

/// Replace the user's whole entitlement map, conditional on `expected_version`.
///
/// Must run inside a transaction so the delete and re-insert are atomic.
pub fn replace_entitlements(
    conn: &Connection,
    id: &str,
    expected_version: i64,
    map: &BTreeMap<String, i64>,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, Error> {
    let changed = conn.execute(
        "UPDATE users SET version = version + 1, updated_at = ?3
         WHERE id = ?1 AND version = ?2",
        params![id, expected_version, now],
    )?;
    if changed == 0 {
        return Ok(if user_exists(conn, id)? {
            UpdateOutcome::ConditionFailed
        } else {
            UpdateOutcome::Missing
        });
    }

    conn.execute("DELETE FROM entitlements WHERE user_id = ?1", params![id])?;
    insert_entitlements(conn, id, map)?;
    Ok(UpdateOutcome::Applied)
}

/// Insert entitlement rows as-is, without touching the user's version.
///
/// Used when the user row itself is written in the same transaction.
pub fn insert_entitlements(
    conn: &Connection,
    id: &str,
    map: &BTreeMap<String, i64>,
) -> Result<(), Error> {
    let mut insert = conn
        .prepare_cached("INSERT INTO entitlements (user_id, code, remaining) VALUES (?1, ?2, ?3)")?;
    for (code, remaining) in map {
        insert.execute(params![id, code, remaining])?;
    }
    Ok(())
}

/// Overwrite the profile columns of `user`, conditional on `user.version`.
pub fn update_profile(
    conn: &Connection,
    user: &UserRow,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, Error> {
    let changed = conn.execute(
        "UPDATE users SET name = ?3, email = ?4, password_hash = ?5, addresses = ?6,
                          phones = ?7, updated_at = ?8, version = version + 1
         WHERE id = ?1 AND version = ?2",
        params![
            user.id,
            user.version,
            user.name,
            user.email,
            user.password_hash,
            user.addresses,
            user.phones,
            now,
        ],
    )?;
    if changed == 1 {
        Ok(UpdateOutcome::Applied)
    } else if user_exists(conn, &user.id)? {
        Ok(UpdateOutcome::ConditionFailed)
    } else {
        Ok(UpdateOutcome::Missing)
    }
}

fn bump_version(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<(), Error> {
    conn.execute(
        "UPDATE users SET version = version + 1, updated_at = ?2 WHERE id = ?1",
        params![id, now],
    )?;
    Ok(())
}
