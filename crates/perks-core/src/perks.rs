// ── Perks facade ──
//
// The entry point consumers hold. Wires a store to the password hasher
// and token issuer, runs validation before any storage call, and owns
// the background expiry sweep. The exchange, usage and refresh flows
// live in their own modules as further `impl Perks` blocks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Argon2Hasher, AuthToken, JwtIssuer, PasswordHasher, TokenIssuer};
use crate::code::generate_code;
use crate::config::PerksConfig;
use crate::error::CoreError;
use crate::filter::{Filters, Page, VoucherFilter};
use crate::model::{User, UserId, Voucher};
use crate::requests::{CreateVoucherRequest, LoginRequest, RegisterRequest, UpdateUserRequest};
use crate::store::Store;
use crate::validator::{
    Validator, validate_email, validate_name, validate_password, validate_points,
    validate_voucher,
};

/// Loyalty service over a store `S`.
///
/// Cheaply cloneable via `Arc`. Dropping every clone does not stop the
/// expiry sweep; call [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct Perks<S: Store> {
    pub(crate) inner: Arc<PerksInner<S>>,
}

pub(crate) struct PerksInner<S> {
    pub(crate) store: S,
    pub(crate) config: PerksConfig,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Option<Arc<dyn TokenIssuer>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: Store> Perks<S> {
    /// Build with the default Argon2 hasher and a JWT issuer keyed from
    /// `config.token`. Without a signing secret, token operations fail.
    pub fn new(store: S, config: PerksConfig) -> Self {
        let tokens = match JwtIssuer::new(&config.token) {
            Ok(issuer) => Some(Arc::new(issuer) as Arc<dyn TokenIssuer>),
            Err(e) => {
                debug!(error = %e, "token issuer disabled");
                None
            }
        };
        Self::with_collaborators(store, config, Arc::new(Argon2Hasher), tokens)
    }

    pub fn with_collaborators(
        store: S,
        config: PerksConfig,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Option<Arc<dyn TokenIssuer>>,
    ) -> Self {
        Self {
            inner: Arc::new(PerksInner {
                store,
                config,
                hasher,
                tokens,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &PerksConfig {
        &self.inner.config
    }

    /// Cancelling this token aborts in-flight storage operations; any
    /// open transaction rolls back.
    pub fn storage_cancellation(&self) -> CancellationToken {
        self.inner.store.context().cancel.clone()
    }

    fn tokens(&self) -> Result<&dyn TokenIssuer, CoreError> {
        self.inner
            .tokens
            .as_deref()
            .ok_or_else(|| CoreError::Internal("token signing secret is not configured".into()))
    }

    // ── Users ────────────────────────────────────────────────────────

    /// Register a new user with zero points and no entitlements.
    pub async fn register(&self, req: RegisterRequest) -> Result<User, CoreError> {
        let mut v = Validator::new();
        validate_name(&mut v, &req.name);
        validate_email(&mut v, &req.email);
        validate_password(&mut v, req.password.expose_secret());
        v.finish()?;

        let hash = self.hash_password(req.password).await?;
        let user = User::new(req.name, req.email, hash);
        self.inner.store.insert_user(&user).await?;
        info!(user = %user.id, "registered user");
        Ok(user)
    }

    /// Check credentials and issue a token.
    ///
    /// An unknown email and a wrong password are indistinguishable.
    pub async fn login(&self, req: LoginRequest) -> Result<(User, AuthToken), CoreError> {
        let mut v = Validator::new();
        validate_email(&mut v, &req.email);
        v.check(
            !req.password.expose_secret().is_empty(),
            "password",
            "must be provided",
        );
        v.finish()?;

        let user = match self.inner.store.user_by_email(&req.email).await {
            Ok(user) => user,
            Err(CoreError::NotFound { .. }) => return Err(CoreError::InvalidCredentials),
            Err(e) => return Err(e),
        };
        if !self
            .password_matches(req.password, user.password_hash.clone())
            .await?
        {
            return Err(CoreError::InvalidCredentials);
        }
        let token = self.tokens()?.issue(user.id)?;
        debug!(user = %user.id, "issued token");
        Ok((user, token))
    }

    /// The user a token was issued to.
    pub async fn authenticate(&self, token: &str) -> Result<User, CoreError> {
        let id = self.tokens()?.verify(token)?;
        match self.inner.store.user(id).await {
            Err(CoreError::NotFound { .. }) => Err(CoreError::InvalidToken),
            other => other,
        }
    }

    pub async fn user(&self, id: UserId) -> Result<User, CoreError> {
        self.inner.store.user(id).await
    }

    pub async fn points(&self, id: UserId) -> Result<i64, CoreError> {
        Ok(self.inner.store.user(id).await?.points)
    }

    /// Credit `points` (non-negative) to the user.
    pub async fn add_points(&self, id: UserId, points: i64) -> Result<(), CoreError> {
        let mut v = Validator::new();
        validate_points(&mut v, points);
        v.finish()?;
        self.inner.store.add_points(id, points).await?;
        info!(user = %id, points, "credited points");
        Ok(())
    }

    /// Apply a partial profile update against the version just read.
    ///
    /// Fails with `EditConflict` if the user changed in between.
    pub async fn update_user(&self, id: UserId, req: UpdateUserRequest) -> Result<User, CoreError> {
        let mut user = self.inner.store.user(id).await?;

        let mut v = Validator::new();
        if let Some(name) = req.name {
            validate_name(&mut v, &name);
            user.name = name;
        }
        if let Some(email) = req.email {
            validate_email(&mut v, &email);
            user.email = email;
        }
        if let Some(password) = &req.password {
            validate_password(&mut v, password.expose_secret());
        }
        v.finish()?;

        if let Some(password) = req.password {
            user.password_hash = self.hash_password(password).await?;
        }
        if let Some(addresses) = req.addresses {
            user.addresses = addresses;
        }
        if let Some(phones) = req.phones {
            user.phones = phones;
        }
        self.inner.store.update_user(&user).await
    }

    async fn hash_password(&self, password: SecretString) -> Result<String, CoreError> {
        let hasher = Arc::clone(&self.inner.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(password.expose_secret()))
            .await
            .map_err(|e| CoreError::Internal(format!("password hashing task failed: {e}")))?
    }

    async fn password_matches(
        &self,
        password: SecretString,
        hash: String,
    ) -> Result<bool, CoreError> {
        let hasher = Arc::clone(&self.inner.hasher);
        tokio::task::spawn_blocking(move || hasher.matches(password.expose_secret(), &hash))
            .await
            .map_err(|e| CoreError::Internal(format!("password check task failed: {e}")))?
    }

    // ── Vouchers ─────────────────────────────────────────────────────

    /// Create a voucher. When no code is supplied one is generated, and
    /// regenerated on collision up to the configured attempt count.
    pub async fn create_voucher(&self, req: CreateVoucherRequest) -> Result<Voucher, CoreError> {
        let generated = req.code.is_none();
        let now = Utc::now();
        let mut voucher = Voucher {
            code: req.code.unwrap_or_else(generate_code),
            created_at: now,
            updated_at: now,
            description: req.description,
            discount: req.discount,
            is_percentage: req.is_percentage,
            starts: req.starts,
            expires: req.expires,
            // A voucher already at its limit is born inactive.
            active: req.usage_limit > 0,
            usage_limit: req.usage_limit,
            usage_count: 0,
            min_spend: req.min_spend,
            category: req.category,
        };
        let mut v = Validator::new();
        validate_voucher(&mut v, &voucher);
        v.finish()?;

        let attempts = self.inner.config.code_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.store.insert_voucher(&voucher).await {
                Ok(()) => break,
                Err(CoreError::DuplicateCode) if generated && attempt < attempts => {
                    warn!(attempt, "generated voucher code collided, retrying");
                    voucher.code = generate_code();
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(code = %voucher.code, "created voucher");
        Ok(voucher)
    }

    pub async fn voucher(&self, code: &str) -> Result<Voucher, CoreError> {
        self.inner.store.voucher(code).await
    }

    /// One page of vouchers matching `filter`, ordered and windowed by
    /// `filters`.
    pub async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        filters: &Filters,
    ) -> Result<Page<Voucher>, CoreError> {
        let sort = filters.voucher_sort()?;
        let items = self
            .inner
            .store
            .list_vouchers(filter, sort, filters.cursor.as_deref(), filters.page_size)
            .await?;
        Ok(Page::new(items, filters.page_size, |v| v.code.clone()))
    }

    pub async fn delete_voucher(&self, code: &str) -> Result<(), CoreError> {
        self.inner.store.delete_voucher(code).await?;
        info!(code, "deleted voucher");
        Ok(())
    }

    /// Count one use of a voucher outside any user's entitlement.
    pub async fn increment_usage(&self, code: &str) -> Result<(), CoreError> {
        self.inner.store.increment_usage(code).await
    }

    // ── Expiry sweep ─────────────────────────────────────────────────

    /// Deactivate every voucher past its expiry. Returns how many.
    pub async fn sweep_expired(&self) -> Result<usize, CoreError> {
        let count = self.inner.store.deactivate_expired(Utc::now()).await?;
        if count > 0 {
            info!(count, "deactivated expired vouchers");
        }
        Ok(count)
    }

    /// Start the periodic expiry sweep if an interval is configured.
    /// Returns whether a task was started.
    pub async fn spawn_expiry_sweep(&self) -> bool {
        let Some(interval) = self.inner.config.sweep_interval else {
            return false;
        };
        let perks = self.clone();
        let cancel = self.inner.cancel.clone();
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(sweep_task(perks, interval, cancel)));
        debug!(?interval, "expiry sweep started");
        true
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("perks shut down");
    }
}

async fn sweep_task<S: Store>(perks: Perks<S>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = perks.sweep_expired().await {
                    warn!(error = %e, "expiry sweep failed");
                }
            }
        }
    }
}
