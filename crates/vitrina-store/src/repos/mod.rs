//! Repositories - one per table

mod balance;
mod product;
mod transaction;
mod user;

pub use balance::BalanceRepo;
pub use product::ProductRepo;
pub use transaction::{NewTransaction, TransactionRepo};
pub use user::UserRepo;

use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 so stored timestamps compare lexicographically
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}
