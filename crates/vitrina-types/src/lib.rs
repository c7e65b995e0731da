//! Vitrina Types - Canonical domain types for the inventory tracker
//!
//! This crate contains all foundational types for Vitrina with zero
//! dependencies on other vitrina crates. It defines the type system for:
//!
//! - Identity types (UserId, ProductId, TransactionId, etc.)
//! - Users, roles and languages
//! - Products and per-vitrine balances
//! - Stock movements and their confirmation status
//!
//! # Invariants
//!
//! These types support the core Vitrina invariants:
//!
//! 1. Balance quantities never go negative
//! 2. A movement mutates balances exactly once, and only when confirmed
//! 3. Status transitions exactly once out of `Pending`
//! 4. Quantities are positive and bounded by [`MAX_QUANTITY`]

pub mod balance;
pub mod identity;
pub mod language;
pub mod movement;
pub mod product;
pub mod quantity;
pub mod ui;
pub mod user;

pub use balance::Balance;
pub use identity::{AuditEntryId, BalanceId, ChatId, ProductId, TransactionId, UserId};
pub use language::Language;
pub use movement::{MovementKind, Transaction, TransactionStatus};
pub use product::Product;
pub use quantity::{parse_quantity, QuantityError, MAX_QUANTITY};
pub use ui::{ButtonAction, JournalPeriod, MenuCommand};
pub use user::{Role, User};
