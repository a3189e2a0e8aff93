//! Loyalty points, vouchers and per-user entitlements.
//!
//! This crate owns the business rules of the perks backend:
//!
//! - **[`Perks`]**: The facade consumers hold. Validates input, then
//!   drives registration and login, point balances, voucher management,
//!   the points-for-voucher [`exchange`](Perks::exchange), redeeming and
//!   [using](Perks::use_voucher) vouchers, the wallet
//!   [refresh](Perks::my_vouchers), and the periodic expiry sweep.
//!
//! - **[`Store`]**: Capability traits over durable state with atomic
//!   conditional updates and all-or-nothing transactions.
//!   [`SqliteStore`] persists through `perks-db`; [`MemoryStore`] keeps
//!   everything in process with identical semantics.
//!
//! - **Domain model** ([`model`]): [`User`] with its points and
//!   entitlement map, [`Voucher`] with its usage counter, and
//!   [`OwnedVoucher`] for wallet listings.
//!
//! - **[`CoreError`]**: One classified error type. Storage failures are
//!   mapped into it at the store boundary, so callers can tell a lost
//!   race (`EditConflict`) from a missing record or a timeout.

pub mod auth;
pub mod code;
pub mod config;
mod convert;
pub mod error;
mod exchange;
pub mod filter;
pub mod model;
mod perks;
mod refresh;
pub mod requests;
pub mod store;
mod usage;
pub mod validator;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::{Argon2Hasher, AuthToken, JwtIssuer, PasswordHasher, TokenIssuer};
pub use config::{PerksConfig, TokenConfig};
pub use error::CoreError;
pub use filter::{Filters, Metadata, Page, SortField, VoucherFilter, VoucherSort};
pub use perks::Perks;
pub use requests::{
    CreateVoucherRequest, ExchangeRequest, LoginRequest, RedeemRequest, RegisterRequest,
    UpdateUserRequest,
};
pub use store::{MemoryStore, SqliteStore, Store, StoreContext, StoreTx, UserStore, VoucherStore};

pub use model::{Address, OwnedVoucher, Phone, User, UserId, Voucher};
