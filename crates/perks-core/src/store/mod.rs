// ── Stores ──
//
// Capability traits over durable state, with two implementations: the
// SQLite-backed `SqliteStore` and the in-process `MemoryStore`. Which
// one a `Perks` instance uses is fixed when it is constructed.
//
// Every operation that checks and mutates a counter does so atomically
// inside the store; callers never read-then-write.

mod memory;
mod sqlite;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::filter::{VoucherFilter, VoucherSort};
use crate::model::{User, UserId, Voucher};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Deadline and cancellation shared by every operation of one store.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub op_timeout: Duration,
    pub cancel: CancellationToken,
}

impl StoreContext {
    pub fn new(op_timeout: Duration) -> Self {
        Self {
            op_timeout,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

// ── Voucher store ───────────────────────────────────────────────────

#[async_trait]
pub trait VoucherStore: Send + Sync {
    /// Persist a new voucher with `usage_count = 0`.
    ///
    /// Fails with `DuplicateCode` if the code is taken.
    async fn insert_voucher(&self, voucher: &Voucher) -> Result<(), CoreError>;

    async fn voucher(&self, code: &str) -> Result<Voucher, CoreError>;

    /// Every voucher in `codes` that exists, fetched in one batch.
    async fn vouchers_by_code(&self, codes: &[String]) -> Result<Vec<Voucher>, CoreError>;

    /// Count one use: `NotFound` if no such code, `EditConflict` if the
    /// voucher is inactive or at its limit when the write applies.
    async fn increment_usage(&self, code: &str) -> Result<(), CoreError>;

    async fn delete_voucher(&self, code: &str) -> Result<(), CoreError>;

    /// One page of matching vouchers after `cursor`, at most `limit` long.
    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        sort: VoucherSort,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Voucher>, CoreError>;

    /// Deactivate active vouchers with `expires <= now`. Returns how many.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<usize, CoreError>;
}

// ── User store ──────────────────────────────────────────────────────

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `DuplicateEmail` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), CoreError>;

    async fn user(&self, id: UserId) -> Result<User, CoreError>;

    async fn user_by_email(&self, email: &str) -> Result<User, CoreError>;

    /// Atomically add `delta` (possibly negative) to the balance.
    async fn add_points(&self, id: UserId, delta: i64) -> Result<(), CoreError>;

    async fn entitlements(&self, id: UserId) -> Result<BTreeMap<String, u32>, CoreError>;

    /// Replace the whole entitlement map if the stored version is still
    /// `expected_version`; `EditConflict` otherwise.
    async fn set_entitlements(
        &self,
        id: UserId,
        expected_version: u64,
        entitlements: &BTreeMap<String, u32>,
    ) -> Result<(), CoreError>;

    /// Insert `code -> uses` only if absent; `AlreadyGranted` otherwise.
    async fn grant_entitlement(&self, id: UserId, code: &str, uses: u32) -> Result<(), CoreError>;

    /// Overwrite name, email, password hash, addresses and phones if the
    /// stored version equals `user.version`. Returns the stored record.
    async fn update_user(&self, user: &User) -> Result<User, CoreError>;
}

// ── Transactions ────────────────────────────────────────────────────

/// Writes available inside [`Store::transaction`]. Either every write
/// made through this handle commits, or none does.
pub trait StoreTx {
    /// Subtract `amount` if the balance covers it; `InsufficientPoints`
    /// otherwise.
    fn deduct_points(&mut self, id: UserId, amount: i64) -> Result<(), CoreError>;

    /// Same contract as [`VoucherStore::insert_voucher`].
    fn insert_voucher(&mut self, voucher: &Voucher) -> Result<(), CoreError>;

    /// Same contract as [`UserStore::grant_entitlement`].
    fn grant_entitlement(&mut self, id: UserId, code: &str, uses: u32) -> Result<(), CoreError>;

    /// Spend one use of `code` if any remain. Returns the uses left;
    /// `VoucherNotAvailable` if none.
    fn consume_entitlement(&mut self, id: UserId, code: &str) -> Result<u32, CoreError>;

    /// Same contract as [`VoucherStore::increment_usage`].
    fn increment_usage(&mut self, code: &str) -> Result<(), CoreError>;
}

/// A complete store: vouchers, users and multi-entity transactions.
#[async_trait]
pub trait Store: VoucherStore + UserStore + Clone + 'static {
    fn context(&self) -> &StoreContext;

    /// Run `f` atomically. If `f` fails, or the deadline passes or the
    /// store is cancelled before commit, nothing it wrote is kept, and
    /// no reader ever observes its intermediate state.
    async fn transaction<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, CoreError> + Send + 'static;
}
