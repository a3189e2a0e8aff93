//! SQLite-backed document storage for the perks loyalty backend.
//!
//! This crate is the raw storage driver: it knows tables, rows and SQL,
//! and nothing about business rules. It offers the primitives the
//! domain layer builds on:
//!
//! - **Conditional updates** ([`vouchers::increment_usage`],
//!   [`users::deduct_points`], [`users::consume_entitlement`]) that apply
//!   in a single statement and report whether the row existed and whether
//!   the condition held, via [`UpdateOutcome`].
//! - **Multi-row transactions** ([`Database::transaction`]) that commit
//!   only if the closure succeeds and the [`Deadline`] is still live.
//! - **Keyset pagination** over vouchers ([`vouchers::list_vouchers`]).
//!
//! Every call runs on tokio's blocking pool behind a single connection
//! mutex. Timestamps are stored as text in one fixed format so they
//! compare lexically in the same order as chronologically.

pub mod database;
pub mod error;
pub mod rows;
pub mod users;
pub mod vouchers;

pub use database::{Database, Deadline};
pub use error::Error;
pub use rows::{OrderColumn, UpdateOutcome, UserRow, VoucherQuery, VoucherRow};
pub use rusqlite::{Connection, Transaction};
