// ── Connection handle and execution model ──
//
// A single SQLite connection guarded by a mutex. Every statement runs on
// the blocking pool under a progress handler that interrupts SQLite
// once the caller's deadline passes or the operation is cancelled.
// Transactions commit only if the deadline is still live afterwards.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::{Connection, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id            TEXT PRIMARY KEY,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        name          TEXT NOT NULL,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        addresses     TEXT NOT NULL DEFAULT '[]',
        phones        TEXT NOT NULL DEFAULT '[]',
        points        INTEGER NOT NULL DEFAULT 0,
        version       INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS entitlements (
        user_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        code      TEXT NOT NULL,
        remaining INTEGER NOT NULL CHECK (remaining >= 0),
        PRIMARY KEY (user_id, code)
    );

    CREATE TABLE IF NOT EXISTS vouchers (
        code          TEXT PRIMARY KEY,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        description   TEXT NOT NULL,
        discount      INTEGER NOT NULL,
        is_percentage INTEGER NOT NULL,
        starts        TEXT NOT NULL,
        expires       TEXT NOT NULL,
        active        INTEGER NOT NULL,
        usage_limit   INTEGER NOT NULL,
        usage_count   INTEGER NOT NULL DEFAULT 0,
        min_spend     INTEGER NOT NULL DEFAULT 0,
        category      TEXT NOT NULL DEFAULT '',
        CHECK (usage_count >= 0 AND usage_count <= MAX(usage_limit, 0))
    );

    CREATE INDEX IF NOT EXISTS idx_vouchers_active_expires ON vouchers(active, expires);
";

fn prepare(conn: &Connection) -> Result<(), Error> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // WAL is silently ignored for in-memory databases.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// A bare in-memory connection with the schema applied.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    prepare(&conn).unwrap();
    conn
}

// ── Deadline ────────────────────────────────────────────────────────

/// SQLite VM instructions between progress-handler polls.
const PROGRESS_OPS: i32 = 1_000;

/// Time budget and cancellation signal for one storage operation.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
    cancel: CancellationToken,
}

impl Deadline {
    /// Start a deadline of `budget` from now, bound to `cancel`.
    pub fn after(budget: Duration, cancel: CancellationToken) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
            cancel,
        }
    }

    /// Fail if the operation was cancelled or ran out of time.
    pub fn check(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if Instant::now() >= self.at {
            return Err(Error::DeadlineExceeded {
                budget_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    /// Interrupt any statement on `conn` that is still running when the
    /// deadline passes or the operation is cancelled.
    fn arm(&self, conn: &Connection) {
        let at = self.at;
        let cancel = AssertUnwindSafe(self.cancel.clone());
        conn.progress_handler(
            PROGRESS_OPS,
            Some(move || Instant::now() >= at || cancel.is_cancelled()),
        );
    }

    fn disarm(conn: &Connection) {
        conn.progress_handler(0, None::<fn() -> bool>);
    }

    /// An interrupted statement reports a generic SQLite failure; name
    /// the deadline instead when it is the cause.
    fn classify<E: From<Error>>(&self, err: E) -> E {
        match self.check() {
            Ok(()) => err,
            Err(expired) => E::from(expired),
        }
    }
}

// ── Database ────────────────────────────────────────────────────────

/// Cheaply cloneable handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database file at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened sqlite database");
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        prepare(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection outside of an explicit transaction.
    ///
    /// Each statement SQLite executes this way is atomic on its own.
    pub async fn run<T, F>(&self, deadline: Deadline, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| Error::Poisoned)?;
            deadline.check()?;
            deadline.arm(&guard);
            let result = f(&guard).map_err(|e| deadline.classify(e));
            Deadline::disarm(&guard);
            result
        })
        .await
        .map_err(|e| Error::Join(e.to_string()))?
    }

    /// Run `f` inside a transaction.
    ///
    /// The transaction commits only if `f` succeeds AND the deadline is
    /// still live at commit time; otherwise it is rolled back and no
    /// write becomes visible.
    pub async fn transaction<T, E, F>(&self, deadline: Deadline, f: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<Error> + Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, E> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| Error::Poisoned)?;
            deadline.check()?;
            deadline.arm(&guard);
            let result = (|| -> Result<T, E> {
                let tx = guard.transaction().map_err(Error::from)?;
                // Dropping `tx` on any early return rolls it back.
                let value = f(&tx).map_err(|e| deadline.classify(e))?;
                deadline.check()?;
                tx.commit().map_err(Error::from)?;
                Ok(value)
            })();
            Deadline::disarm(&guard);
            result
        })
        .await
        .map_err(|e| E::from(Error::Join(e.to_string())))?
    }
}
