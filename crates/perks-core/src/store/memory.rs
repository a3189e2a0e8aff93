// ── In-process store ──
//
// DashMap tables behind a reader/writer gate. Single operations take
// the gate shared and rely on DashMap's per-entry locking for their
// check-and-set; transactions take it exclusively, so no reader sees
// their intermediate state, and undo from a snapshot journal on failure.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::{Store, StoreContext, StoreTx, UserStore, VoucherStore};
use crate::error::CoreError;
use crate::filter::{SortField, VoucherFilter, VoucherSort};
use crate::model::{User, UserId, Voucher};

/// Deterministic in-memory store, for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Tables>,
    ctx: StoreContext,
}

#[derive(Default)]
struct Tables {
    gate: RwLock<()>,
    users: DashMap<UserId, User>,
    emails: DashMap<String, UserId>,
    vouchers: DashMap<String, Voucher>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("users", &self.inner.users.len())
            .field("vouchers", &self.inner.vouchers.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            inner: Arc::default(),
            ctx,
        }
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, ()>, CoreError> {
        if self.ctx.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        self.inner
            .gate
            .read()
            .map_err(|_| CoreError::Storage("memory store gate poisoned".into()))
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>, CoreError> {
        self.inner
            .gate
            .write()
            .map_err(|_| CoreError::Storage("memory store gate poisoned".into()))
    }

    fn check_deadline(&self, started: Instant) -> Result<(), CoreError> {
        if self.ctx.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        if started.elapsed() >= self.ctx.op_timeout {
            return Err(CoreError::Timeout {
                timeout_ms: u64::try_from(self.ctx.op_timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }
}

// ── Row-level primitives shared by single ops and transactions ──────

impl Tables {
    fn insert_voucher(&self, voucher: &Voucher) -> Result<(), CoreError> {
        match self.vouchers.entry(voucher.code.clone()) {
            Entry::Occupied(_) => Err(CoreError::DuplicateCode),
            Entry::Vacant(slot) => {
                let mut stored = voucher.clone();
                stored.usage_count = 0;
                slot.insert(stored);
                Ok(())
            }
        }
    }

    fn increment_usage(&self, code: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        let mut voucher = self
            .vouchers
            .get_mut(code)
            .ok_or_else(|| CoreError::not_found("voucher", code))?;
        if !voucher.active || voucher.usage_count >= voucher.usage_limit {
            return Err(CoreError::EditConflict);
        }
        voucher.usage_count += 1;
        voucher.active = voucher.usage_count < voucher.usage_limit;
        voucher.updated_at = now;
        Ok(())
    }

    fn deduct_points(&self, id: UserId, amount: i64, now: DateTime<Utc>) -> Result<(), CoreError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("user", id.to_string()))?;
        if user.points < amount {
            return Err(CoreError::InsufficientPoints);
        }
        user.points -= amount;
        touch(&mut user, now);
        Ok(())
    }

    fn grant_entitlement(
        &self,
        id: UserId,
        code: &str,
        uses: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("user", id.to_string()))?;
        if user.vouchers.contains_key(code) {
            return Err(CoreError::AlreadyGranted);
        }
        user.vouchers.insert(code.to_owned(), uses);
        touch(&mut user, now);
        Ok(())
    }

    fn consume_entitlement(
        &self,
        id: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, CoreError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or(CoreError::VoucherNotAvailable)?;
        let remaining = match user.vouchers.get_mut(code) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                *remaining
            }
            _ => return Err(CoreError::VoucherNotAvailable),
        };
        touch(&mut user, now);
        Ok(remaining)
    }
}

fn touch(user: &mut User, now: DateTime<Utc>) {
    user.version += 1;
    user.updated_at = now;
}

// ── VoucherStore ────────────────────────────────────────────────────

#[async_trait]
impl VoucherStore for MemoryStore {
    async fn insert_voucher(&self, voucher: &Voucher) -> Result<(), CoreError> {
        let _shared = self.shared()?;
        debug!(code = %voucher.code, "inserting voucher");
        self.inner.insert_voucher(voucher)
    }

    async fn voucher(&self, code: &str) -> Result<Voucher, CoreError> {
        let _shared = self.shared()?;
        self.inner
            .vouchers
            .get(code)
            .map(|v| v.clone())
            .ok_or_else(|| CoreError::not_found("voucher", code))
    }

    async fn vouchers_by_code(&self, codes: &[String]) -> Result<Vec<Voucher>, CoreError> {
        let _shared = self.shared()?;
        let mut found: Vec<Voucher> = codes
            .iter()
            .filter_map(|code| self.inner.vouchers.get(code).map(|v| v.clone()))
            .collect();
        found.sort_by(|a, b| a.code.cmp(&b.code));
        found.dedup_by(|a, b| a.code == b.code);
        Ok(found)
    }

    async fn increment_usage(&self, code: &str) -> Result<(), CoreError> {
        let _shared = self.shared()?;
        self.inner.increment_usage(code, Utc::now())
    }

    async fn delete_voucher(&self, code: &str) -> Result<(), CoreError> {
        let _shared = self.shared()?;
        self.inner
            .vouchers
            .remove(code)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("voucher", code))
    }

    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        sort: VoucherSort,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Voucher>, CoreError> {
        let _shared = self.shared()?;

        let anchor = match cursor {
            Some(code) if sort.field != SortField::Code => {
                let Some(voucher) = self.inner.vouchers.get(code).map(|v| v.clone()) else {
                    return Ok(Vec::new());
                };
                Some(voucher)
            }
            _ => None,
        };

        let mut matching: Vec<Voucher> = self
            .inner
            .vouchers
            .iter()
            .filter(|entry| matches_filter(entry.value(), filter))
            .map(|entry| entry.value().clone())
            .collect();

        let directed = |a: &Voucher, b: &Voucher| {
            let ord = compare_by(sort.field, a, b);
            if sort.descending { ord.reverse() } else { ord }
        };
        matching.sort_by(|a, b| directed(a, b));

        let after_cursor = |v: &Voucher| match (cursor, &anchor) {
            (None, _) => true,
            (Some(_), Some(anchor)) => directed(v, anchor) == Ordering::Greater,
            (Some(code), None) => {
                let ord = v.code.as_str().cmp(code);
                if sort.descending {
                    ord == Ordering::Less
                } else {
                    ord == Ordering::Greater
                }
            }
        };

        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .filter(|v| after_cursor(v))
            .take(limit)
            .collect())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let _shared = self.shared()?;
        let mut count = 0;
        for mut entry in self.inner.vouchers.iter_mut() {
            if entry.active && entry.expires <= now {
                entry.active = false;
                entry.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }
}

fn matches_filter(voucher: &Voucher, filter: &VoucherFilter) -> bool {
    filter.code.as_ref().is_none_or(|code| &voucher.code == code)
        && filter.starts_from.is_none_or(|from| voucher.starts >= from)
        && filter.expires_until.is_none_or(|until| voucher.expires <= until)
        && (!filter.active_only || voucher.active)
        && filter
            .max_min_spend
            .is_none_or(|max| voucher.min_spend <= max)
        && filter
            .category
            .as_ref()
            .is_none_or(|category| &voucher.category == category)
}

/// Order by `field`, then by code.
fn compare_by(field: SortField, a: &Voucher, b: &Voucher) -> Ordering {
    let primary = match field {
        SortField::Code => Ordering::Equal,
        SortField::Starts => a.starts.cmp(&b.starts),
        SortField::Expires => a.expires.cmp(&b.expires),
        SortField::Active => a.active.cmp(&b.active),
        SortField::MinSpend => a.min_spend.cmp(&b.min_spend),
        SortField::Category => a.category.cmp(&b.category),
    };
    primary.then_with(|| a.code.cmp(&b.code))
}

// ── UserStore ───────────────────────────────────────────────────────

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), CoreError> {
        let _shared = self.shared()?;
        match self.inner.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(CoreError::DuplicateEmail),
            Entry::Vacant(slot) => {
                self.inner.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(())
            }
        }
    }

    async fn user(&self, id: UserId) -> Result<User, CoreError> {
        let _shared = self.shared()?;
        self.inner
            .users
            .get(&id)
            .map(|u| u.clone())
            .ok_or_else(|| CoreError::not_found("user", id.to_string()))
    }

    async fn user_by_email(&self, email: &str) -> Result<User, CoreError> {
        let _shared = self.shared()?;
        let id = self
            .inner
            .emails
            .get(email)
            .map(|id| *id)
            .ok_or_else(|| CoreError::not_found("user", email))?;
        self.inner
            .users
            .get(&id)
            .map(|u| u.clone())
            .ok_or_else(|| CoreError::not_found("user", email))
    }

    async fn add_points(&self, id: UserId, delta: i64) -> Result<(), CoreError> {
        let _shared = self.shared()?;
        let mut user = self
            .inner
            .users
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("user", id.to_string()))?;
        user.points += delta;
        touch(&mut user, Utc::now());
        Ok(())
    }

    async fn entitlements(&self, id: UserId) -> Result<BTreeMap<String, u32>, CoreError> {
        let _shared = self.shared()?;
        self.inner
            .users
            .get(&id)
            .map(|u| u.vouchers.clone())
            .ok_or_else(|| CoreError::not_found("user", id.to_string()))
    }

    async fn set_entitlements(
        &self,
        id: UserId,
        expected_version: u64,
        entitlements: &BTreeMap<String, u32>,
    ) -> Result<(), CoreError> {
        let _shared = self.shared()?;
        let mut user = self
            .inner
            .users
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("user", id.to_string()))?;
        if user.version != expected_version {
            return Err(CoreError::EditConflict);
        }
        user.vouchers.clone_from(entitlements);
        touch(&mut user, Utc::now());
        Ok(())
    }

    async fn grant_entitlement(&self, id: UserId, code: &str, uses: u32) -> Result<(), CoreError> {
        let _shared = self.shared()?;
        self.inner.grant_entitlement(id, code, uses, Utc::now())
    }

    async fn update_user(&self, user: &User) -> Result<User, CoreError> {
        // Email re-indexing touches two tables; serialize against everything.
        let _exclusive = self.exclusive()?;
        let current = self
            .inner
            .users
            .get(&user.id)
            .map(|u| u.clone())
            .ok_or_else(|| CoreError::not_found("user", user.id.to_string()))?;
        if current.version != user.version {
            return Err(CoreError::EditConflict);
        }
        if current.email != user.email {
            if self.inner.emails.contains_key(&user.email) {
                return Err(CoreError::DuplicateEmail);
            }
            self.inner.emails.remove(&current.email);
            self.inner.emails.insert(user.email.clone(), user.id);
        }

        let mut updated = current;
        updated.name.clone_from(&user.name);
        updated.email.clone_from(&user.email);
        updated.password_hash.clone_from(&user.password_hash);
        updated.addresses.clone_from(&user.addresses);
        updated.phones.clone_from(&user.phones);
        touch(&mut updated, Utc::now());
        self.inner.users.insert(updated.id, updated.clone());
        Ok(updated)
    }
}

// ── Transactions ────────────────────────────────────────────────────

/// Transaction handle. Records each row's pre-image the first time the
/// row is written and restores them on drop unless committed.
struct MemoryTx<'a> {
    tables: &'a Tables,
    now: DateTime<Utc>,
    users_before: HashMap<UserId, User>,
    vouchers_before: HashMap<String, Option<Voucher>>,
    committed: bool,
}

impl<'a> MemoryTx<'a> {
    fn new(tables: &'a Tables) -> Self {
        Self {
            tables,
            now: Utc::now(),
            users_before: HashMap::new(),
            vouchers_before: HashMap::new(),
            committed: false,
        }
    }

    fn save_user(&mut self, id: UserId) {
        if !self.users_before.contains_key(&id) {
            if let Some(user) = self.tables.users.get(&id) {
                self.users_before.insert(id, user.clone());
            }
        }
    }

    fn save_voucher(&mut self, code: &str) {
        if !self.vouchers_before.contains_key(code) {
            let before = self.tables.vouchers.get(code).map(|v| v.clone());
            self.vouchers_before.insert(code.to_owned(), before);
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (id, user) in self.users_before.drain() {
            self.tables.users.insert(id, user);
        }
        for (code, before) in self.vouchers_before.drain() {
            match before {
                Some(voucher) => {
                    self.tables.vouchers.insert(code, voucher);
                }
                None => {
                    self.tables.vouchers.remove(&code);
                }
            }
        }
    }
}

impl StoreTx for MemoryTx<'_> {
    fn deduct_points(&mut self, id: UserId, amount: i64) -> Result<(), CoreError> {
        self.save_user(id);
        self.tables.deduct_points(id, amount, self.now)
    }

    fn insert_voucher(&mut self, voucher: &Voucher) -> Result<(), CoreError> {
        self.save_voucher(&voucher.code);
        self.tables.insert_voucher(voucher)
    }

    fn grant_entitlement(&mut self, id: UserId, code: &str, uses: u32) -> Result<(), CoreError> {
        self.save_user(id);
        self.tables.grant_entitlement(id, code, uses, self.now)
    }

    fn consume_entitlement(&mut self, id: UserId, code: &str) -> Result<u32, CoreError> {
        self.save_user(id);
        self.tables.consume_entitlement(id, code, self.now)
    }

    fn increment_usage(&mut self, code: &str) -> Result<(), CoreError> {
        self.save_voucher(code);
        self.tables.increment_usage(code, self.now)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn context(&self) -> &StoreContext {
        &self.ctx
    }

    async fn transaction<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, CoreError> + Send + 'static,
    {
        let started = Instant::now();
        let _exclusive = self.exclusive()?;
        self.check_deadline(started)?;

        let mut tx = MemoryTx::new(&self.inner);
        // An early return drops `tx` while the gate is still held, which
        // restores every pre-image.
        let value = f(&mut tx)?;
        self.check_deadline(started)?;
        tx.commit();
        Ok(value)
    }
}
