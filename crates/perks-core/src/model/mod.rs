// ── Domain model ──
//
// Canonical representations of users and vouchers as consumers see
// them. Store implementations convert to and from these.

pub mod user;
pub mod voucher;

pub use user::{Address, Phone, User, UserId};
pub use voucher::{OwnedVoucher, Voucher};
