// ── SQLite-backed store ──

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use perks_db::{Connection, Database, Deadline, Transaction, UpdateOutcome, users, vouchers};
use tracing::debug;

use super::{Store, StoreContext, StoreTx, UserStore, VoucherStore};
use crate::convert::{
    entitlements_from_rows, entitlements_to_rows, to_i64, to_u32, user_from_row, user_to_row,
    voucher_from_row, voucher_query, voucher_to_row,
};
use crate::error::CoreError;
use crate::filter::{VoucherFilter, VoucherSort};
use crate::model::{User, UserId, Voucher};

/// Store backed by a [`perks_db::Database`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
    ctx: StoreContext,
}

impl SqliteStore {
    pub fn new(db: Database, ctx: StoreContext) -> Self {
        Self { db, ctx }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.ctx.op_timeout, self.ctx.cancel.clone())
    }
}

fn usage_outcome(outcome: UpdateOutcome, code: &str) -> Result<(), CoreError> {
    match outcome {
        UpdateOutcome::Applied => Ok(()),
        UpdateOutcome::ConditionFailed => Err(CoreError::EditConflict),
        UpdateOutcome::Missing => Err(CoreError::not_found("voucher", code)),
    }
}

fn grant_outcome(outcome: UpdateOutcome, id: UserId) -> Result<(), CoreError> {
    match outcome {
        UpdateOutcome::Applied => Ok(()),
        UpdateOutcome::ConditionFailed => Err(CoreError::AlreadyGranted),
        UpdateOutcome::Missing => Err(CoreError::not_found("user", id.to_string())),
    }
}

fn load_user(conn: &Connection, row: perks_db::UserRow) -> Result<User, CoreError> {
    let entitlements = users::entitlements(conn, &row.id)?;
    user_from_row(row, entitlements)
}

// ── VoucherStore ────────────────────────────────────────────────────

#[async_trait]
impl VoucherStore for SqliteStore {
    async fn insert_voucher(&self, voucher: &Voucher) -> Result<(), CoreError> {
        let row = voucher_to_row(voucher);
        debug!(code = %row.code, "inserting voucher");
        self.db
            .run(self.deadline(), move |conn| vouchers::insert_voucher(conn, &row))
            .await?;
        Ok(())
    }

    async fn voucher(&self, code: &str) -> Result<Voucher, CoreError> {
        let key = code.to_owned();
        let row = self
            .db
            .run(self.deadline(), move |conn| vouchers::get_voucher(conn, &key))
            .await?;
        row.map(voucher_from_row)
            .ok_or_else(|| CoreError::not_found("voucher", code))
    }

    async fn vouchers_by_code(&self, codes: &[String]) -> Result<Vec<Voucher>, CoreError> {
        let codes = codes.to_vec();
        let rows = self
            .db
            .run(self.deadline(), move |conn| vouchers::get_vouchers(conn, &codes))
            .await?;
        Ok(rows.into_iter().map(voucher_from_row).collect())
    }

    async fn increment_usage(&self, code: &str) -> Result<(), CoreError> {
        let key = code.to_owned();
        let outcome = self
            .db
            .run(self.deadline(), move |conn| {
                vouchers::increment_usage(conn, &key, Utc::now())
            })
            .await?;
        usage_outcome(outcome, code)
    }

    async fn delete_voucher(&self, code: &str) -> Result<(), CoreError> {
        let key = code.to_owned();
        let deleted = self
            .db
            .run(self.deadline(), move |conn| vouchers::delete_voucher(conn, &key))
            .await?;
        if deleted {
            Ok(())
        } else {
            Err(CoreError::not_found("voucher", code))
        }
    }

    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        sort: VoucherSort,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Voucher>, CoreError> {
        let query = voucher_query(filter, sort, cursor, limit);
        let rows = self
            .db
            .run(self.deadline(), move |conn| vouchers::list_vouchers(conn, &query))
            .await?;
        Ok(rows.into_iter().map(voucher_from_row).collect())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        Ok(self
            .db
            .run(self.deadline(), move |conn| vouchers::deactivate_expired(conn, now))
            .await?)
    }
}

// ── UserStore ───────────────────────────────────────────────────────

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<(), CoreError> {
        let row = user_to_row(user)?;
        let entitlements = entitlements_to_rows(&user.vouchers);
        self.db
            .transaction(self.deadline(), move |tx: &Transaction<'_>| {
                users::insert_user(tx, &row)?;
                users::insert_entitlements(tx, &row.id, &entitlements)?;
                Ok::<_, CoreError>(())
            })
            .await
    }

    async fn user(&self, id: UserId) -> Result<User, CoreError> {
        let key = id.to_string();
        self.db
            .run(self.deadline(), move |conn| {
                Ok(users::get_user(conn, &key)?.map(|row| load_user(conn, row)))
            })
            .await?
            .ok_or_else(|| CoreError::not_found("user", id.to_string()))?
    }

    async fn user_by_email(&self, email: &str) -> Result<User, CoreError> {
        let key = email.to_owned();
        self.db
            .run(self.deadline(), move |conn| {
                Ok(users::get_user_by_email(conn, &key)?.map(|row| load_user(conn, row)))
            })
            .await?
            .ok_or_else(|| CoreError::not_found("user", email))?
    }

    async fn add_points(&self, id: UserId, delta: i64) -> Result<(), CoreError> {
        let key = id.to_string();
        let applied = self
            .db
            .run(self.deadline(), move |conn| {
                users::add_points(conn, &key, delta, Utc::now())
            })
            .await?;
        if applied {
            Ok(())
        } else {
            Err(CoreError::not_found("user", id.to_string()))
        }
    }

    async fn entitlements(&self, id: UserId) -> Result<BTreeMap<String, u32>, CoreError> {
        let key = id.to_string();
        let (exists, rows) = self
            .db
            .run(self.deadline(), move |conn| {
                Ok((users::user_exists(conn, &key)?, users::entitlements(conn, &key)?))
            })
            .await?;
        if !exists {
            return Err(CoreError::not_found("user", id.to_string()));
        }
        entitlements_from_rows(rows)
    }

    async fn set_entitlements(
        &self,
        id: UserId,
        expected_version: u64,
        entitlements: &BTreeMap<String, u32>,
    ) -> Result<(), CoreError> {
        let key = id.to_string();
        let version = to_i64(expected_version)?;
        let map = entitlements_to_rows(entitlements);
        let outcome = self
            .db
            .transaction(self.deadline(), move |tx: &Transaction<'_>| {
                Ok::<_, CoreError>(users::replace_entitlements(
                    tx,
                    &key,
                    version,
                    &map,
                    Utc::now(),
                )?)
            })
            .await?;
        match outcome {
            UpdateOutcome::Applied => Ok(()),
            UpdateOutcome::ConditionFailed => Err(CoreError::EditConflict),
            UpdateOutcome::Missing => Err(CoreError::not_found("user", id.to_string())),
        }
    }

    async fn grant_entitlement(&self, id: UserId, code: &str, uses: u32) -> Result<(), CoreError> {
        let key = id.to_string();
        let voucher = code.to_owned();
        let outcome = self
            .db
            .run(self.deadline(), move |conn| {
                users::grant_entitlement(conn, &key, &voucher, i64::from(uses), Utc::now())
            })
            .await?;
        grant_outcome(outcome, id)
    }

    async fn update_user(&self, user: &User) -> Result<User, CoreError> {
        let row = user_to_row(user)?;
        let id = user.id;
        self.db
            .transaction(self.deadline(), move |tx: &Transaction<'_>| {
                match users::update_profile(tx, &row, Utc::now())? {
                    UpdateOutcome::Applied => {}
                    UpdateOutcome::ConditionFailed => return Err(CoreError::EditConflict),
                    UpdateOutcome::Missing => {
                        return Err(CoreError::not_found("user", id.to_string()));
                    }
                }
                let stored = users::get_user(tx, &row.id)?
                    .ok_or_else(|| CoreError::not_found("user", id.to_string()))?;
                load_user(tx, stored)
            })
            .await
    }
}

// ── Transactions ────────────────────────────────────────────────────

struct SqliteTx<'a> {
    tx: &'a Transaction<'a>,
    now: DateTime<Utc>,
}

impl StoreTx for SqliteTx<'_> {
    fn deduct_points(&mut self, id: UserId, amount: i64) -> Result<(), CoreError> {
        match users::deduct_points(self.tx, &id.to_string(), amount, self.now)? {
            UpdateOutcome::Applied => Ok(()),
            UpdateOutcome::ConditionFailed => Err(CoreError::InsufficientPoints),
            UpdateOutcome::Missing => Err(CoreError::not_found("user", id.to_string())),
        }
    }

    fn insert_voucher(&mut self, voucher: &Voucher) -> Result<(), CoreError> {
        vouchers::insert_voucher(self.tx, &voucher_to_row(voucher))?;
        Ok(())
    }

    fn grant_entitlement(&mut self, id: UserId, code: &str, uses: u32) -> Result<(), CoreError> {
        let outcome =
            users::grant_entitlement(self.tx, &id.to_string(), code, i64::from(uses), self.now)?;
        grant_outcome(outcome, id)
    }

    fn consume_entitlement(&mut self, id: UserId, code: &str) -> Result<u32, CoreError> {
        users::consume_entitlement(self.tx, &id.to_string(), code, self.now)?
            .map_or(Err(CoreError::VoucherNotAvailable), to_u32)
    }

    fn increment_usage(&mut self, code: &str) -> Result<(), CoreError> {
        usage_outcome(vouchers::increment_usage(self.tx, code, self.now)?, code)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn context(&self) -> &StoreContext {
        &self.ctx
    }

    async fn transaction<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, CoreError> + Send + 'static,
    {
        self.db
            .transaction(self.deadline(), move |tx: &Transaction<'_>| {
                let mut handle = SqliteTx {
                    tx,
                    now: Utc::now(),
                };
                f(&mut handle)
            })
            .await
    }
}
