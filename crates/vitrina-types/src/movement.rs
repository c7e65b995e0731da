//! Stock movements and their confirmation status
//!
//! A [`Transaction`] is the central workflow record: a proposed or
//! completed movement of one product between parties. Movements that are
//! not self-confirming stay `Pending` until the counterparty replies.

use crate::{ProductId, TransactionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Admin hands stock to a vitrine; confirmed by the vitrine
    Give,
    /// Admin takes stock back from a vitrine; applied immediately
    Take,
    /// Vitrine returns stock to an admin; confirmed by the admin
    Return,
    /// Vitrine sells stock; applied immediately
    Sale,
    /// Stock moves between two vitrines; confirmed by the receiver
    Transfer,
}

impl MovementKind {
    /// Whether this kind requires a second-party confirmation
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, MovementKind::Give | MovementKind::Return | MovementKind::Transfer)
    }

    /// Whether this kind mutates balances at creation time
    pub fn is_self_confirming(&self) -> bool {
        matches!(self, MovementKind::Take | MovementKind::Sale)
    }

    /// Whether creation requires sufficient stock at the source vitrine
    pub fn debits_source(&self) -> bool {
        matches!(
            self,
            MovementKind::Take | MovementKind::Return | MovementKind::Sale | MovementKind::Transfer
        )
    }

    /// Storage string for the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Give => "give",
            MovementKind::Take => "take",
            MovementKind::Return => "return",
            MovementKind::Sale => "sale",
            MovementKind::Transfer => "transfer",
        }
    }

    /// Parse a stored kind string
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "give" => Some(MovementKind::Give),
            "take" => Some(MovementKind::Take),
            "return" => Some(MovementKind::Return),
            "sale" => Some(MovementKind::Sale),
            "transfer" => Some(MovementKind::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confirmation status of a movement
///
/// Transitions exactly once: `Pending -> Confirmed` or
/// `Pending -> Rejected`. Self-confirming kinds are created already
/// `Confirmed`. There is no transition out of a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Storage string for the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Rejected => "rejected",
        }
    }

    /// Parse a stored status string
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "confirmed" => Some(TransactionStatus::Confirmed),
            "rejected" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed or completed stock movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Source vitrine for take/return/sale/transfer
    pub from_vitrine_id: Option<UserId>,
    /// Target vitrine for give/transfer
    pub to_vitrine_id: Option<UserId>,
    /// Admin bound to the movement (actor for give/take/transfer, the
    /// confirming admin for return once resolved)
    pub admin_id: Option<UserId>,
    pub status: TransactionStatus,
    pub needs_confirmation: bool,
    /// Who replied to the confirmation prompt
    pub confirmed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_split_matches_kind() {
        assert!(MovementKind::Give.needs_confirmation());
        assert!(MovementKind::Return.needs_confirmation());
        assert!(MovementKind::Transfer.needs_confirmation());
        assert!(MovementKind::Take.is_self_confirming());
        assert!(MovementKind::Sale.is_self_confirming());
        assert!(!MovementKind::Take.needs_confirmation());
        assert!(!MovementKind::Sale.needs_confirmation());
    }

    #[test]
    fn give_does_not_debit_source() {
        assert!(!MovementKind::Give.debits_source());
        assert!(MovementKind::Transfer.debits_source());
        assert!(MovementKind::Sale.debits_source());
    }

    #[test]
    fn kind_and_status_round_trip_storage_strings() {
        for kind in [
            MovementKind::Give,
            MovementKind::Take,
            MovementKind::Return,
            MovementKind::Sale,
            MovementKind::Transfer,
        ] {
            assert_eq!(MovementKind::from_str_opt(kind.as_str()), Some(kind));
        }
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Confirmed,
            TransactionStatus::Rejected,
        ] {
            assert_eq!(TransactionStatus::from_str_opt(status.as_str()), Some(status));
        }
    }
}
