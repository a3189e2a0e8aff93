#![allow(clippy::unwrap_used, dead_code)]
// Shared fixtures for the perks-core integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as Span, Utc};
use secrecy::SecretString;
use tempfile::TempDir;

use perks_core::{
    CoreError, CreateVoucherRequest, JwtIssuer, MemoryStore, PasswordHasher, Perks, PerksConfig,
    RegisterRequest, SqliteStore, Store, StoreContext, TokenConfig, User, Voucher,
};
use perks_db::Database;

/// Reversible stand-in for Argon2; hashing cost would dominate the suite.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String, CoreError> {
        Ok(format!("plain${plaintext}"))
    }

    fn matches(&self, plaintext: &str, hash: &str) -> Result<bool, CoreError> {
        Ok(hash.strip_prefix("plain$") == Some(plaintext))
    }
}

pub fn config() -> PerksConfig {
    PerksConfig {
        op_timeout: Duration::from_secs(10),
        token: TokenConfig {
            secret: SecretString::from("integration-secret".to_owned()),
            ttl: Duration::from_secs(3600),
        },
        ..PerksConfig::default()
    }
}

fn context() -> StoreContext {
    StoreContext::new(config().op_timeout)
}

pub fn build<S: Store>(store: S) -> Perks<S> {
    let config = config();
    let issuer = JwtIssuer::new(&config.token).unwrap();
    Perks::with_collaborators(store, config, Arc::new(PlainHasher), Some(Arc::new(issuer)))
}

pub fn memory() -> Perks<MemoryStore> {
    build(MemoryStore::new(context()))
}

pub fn sqlite() -> Perks<SqliteStore> {
    build(SqliteStore::new(Database::open_in_memory().unwrap(), context()))
}

/// A file-backed store. Keep the directory alive for the test's duration.
pub fn sqlite_file() -> (TempDir, Perks<SqliteStore>) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("perks.db")).unwrap();
    (dir, build(SqliteStore::new(db, context())))
}

pub async fn register<S: Store>(perks: &Perks<S>, email: &str) -> User {
    perks
        .register(RegisterRequest {
            name: "Test User".into(),
            email: email.into(),
            password: SecretString::from("pa55word".to_owned()),
        })
        .await
        .unwrap()
}

pub fn voucher_request(code: &str, usage_limit: i64) -> CreateVoucherRequest {
    let now = Utc::now();
    CreateVoucherRequest {
        code: Some(code.into()),
        description: format!("{code} discount"),
        discount: 10,
        is_percentage: true,
        starts: now - Span::hours(1),
        expires: now + Span::days(30),
        usage_limit,
        min_spend: 0,
        category: String::new(),
    }
}

pub async fn seed_voucher<S: Store>(perks: &Perks<S>, code: &str, usage_limit: i64) -> Voucher {
    perks
        .create_voucher(voucher_request(code, usage_limit))
        .await
        .unwrap()
}

/// Generate one multi-threaded test per backend for each named generic
/// scenario `async fn name<S: Store>(perks: Perks<S>)`.
macro_rules! store_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    super::$name(crate::common::memory()).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    super::$name(crate::common::sqlite()).await;
                }
            )*
        }

        mod sqlite_file {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    let (_dir, perks) = crate::common::sqlite_file();
                    super::$name(perks).await;
                }
            )*
        }
    };
}

pub(crate) use store_tests;
