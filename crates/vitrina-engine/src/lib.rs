//! Vitrina Transaction Engine
//!
//! Creates stock movements and applies confirmed ones to balances.
//!
//! Two entry points:
//!
//! - [`Engine::create_movement`] validates a request and records the
//!   transaction row. Self-confirming kinds (take, sale) debit the source
//!   balance in the same database transaction as the insert, so a failed
//!   debit records nothing. Confirmation-requiring kinds (give, return,
//!   transfer) are recorded `pending` and touch no balance.
//! - [`Engine::apply_confirmed`] performs the balance mutation of a
//!   movement that has just been confirmed. The status row is the
//!   idempotency ledger: callers transition `pending -> confirmed` first
//!   (a single-shot update) and only then apply, so a movement mutates
//!   balances at most once.
//!
//! Stock pre-checks at creation time are advisory for transfer (the
//! guarded debit re-checks at apply); for return the debit is re-validated
//! when the admin confirms, since stock may have been sold in between.

pub mod error;

pub use error::{EngineError, EngineResult};

use tracing::{debug, info};
use vitrina_store::repos::NewTransaction;
use vitrina_store::Store;
use vitrina_types::{
    MovementKind, ProductId, Transaction, TransactionStatus, UserId, MAX_QUANTITY,
};

/// A requested stock movement, parties already resolved to user ids
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Source vitrine for take/return/sale/transfer
    pub from_vitrine_id: Option<UserId>,
    /// Target vitrine for give/transfer
    pub to_vitrine_id: Option<UserId>,
}

/// Result of creating a movement
#[derive(Debug, Clone)]
pub struct CreatedMovement {
    pub transaction: Transaction,
    /// Source balance after an immediate debit (take/sale only)
    pub new_source_balance: Option<u32>,
}

/// Balance changes produced by applying a confirmed movement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedBalances {
    pub source: Option<u32>,
    pub target: Option<u32>,
}

/// The transaction engine
#[derive(Clone)]
pub struct Engine {
    store: Store,
}

impl Engine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Validate and record a movement requested by `actor`.
    ///
    /// `actor` is stored as the acting admin for give/take/transfer;
    /// return and sale are vitrine-initiated, so the admin slot stays
    /// empty (a return binds its confirming admin later).
    pub async fn create_movement(
        &self,
        request: MovementRequest,
        actor: UserId,
    ) -> EngineResult<CreatedMovement> {
        if request.quantity == 0 {
            return Err(EngineError::InvalidQuantity(
                vitrina_types::QuantityError::NotPositive,
            ));
        }
        if request.quantity > MAX_QUANTITY {
            return Err(EngineError::InvalidQuantity(
                vitrina_types::QuantityError::TooLarge,
            ));
        }

        let (from, to) = self.check_parties(&request)?;

        // stock pre-check for every kind that debits a source vitrine
        if request.kind.debits_source() {
            let source = from.ok_or(EngineError::MissingParty("from_vitrine"))?;
            let available = self
                .store
                .balances()
                .quantity(source, request.product_id)
                .await?;
            if available < request.quantity {
                debug!(
                    kind = %request.kind,
                    available,
                    requested = request.quantity,
                    "rejecting movement: insufficient stock"
                );
                return Err(EngineError::InsufficientStock {
                    available,
                    requested: request.quantity,
                });
            }
        }

        let admin_id = match request.kind {
            MovementKind::Give | MovementKind::Take | MovementKind::Transfer => Some(actor),
            MovementKind::Return | MovementKind::Sale => None,
        };
        let status = if request.kind.is_self_confirming() {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Pending
        };

        let new = NewTransaction {
            kind: request.kind,
            product_id: request.product_id,
            quantity: request.quantity,
            from_vitrine_id: from,
            to_vitrine_id: to,
            admin_id,
            status,
            needs_confirmation: false,
        };

        // take and sale apply right away. The insert and the guarded
        // debit commit together, so a debit that loses a race leaves no
        // confirmed row behind.
        let (transaction, new_source_balance) = if request.kind.is_self_confirming() {
            let source = from.ok_or(EngineError::MissingParty("from_vitrine"))?;
            let (transaction, remaining) =
                self.store.transactions().create_with_debit(new, source).await?;
            (transaction, Some(remaining))
        } else {
            (self.store.transactions().create(new).await?, None)
        };

        info!(
            transaction_id = %transaction.id,
            kind = %transaction.kind,
            quantity = transaction.quantity,
            status = %transaction.status,
            "movement created"
        );

        Ok(CreatedMovement { transaction, new_source_balance })
    }

    /// Apply the balance mutation of a confirmed movement.
    ///
    /// Take and sale were applied at creation, so they are a no-op here.
    /// Returns the touched balances.
    pub async fn apply_confirmed(&self, tx: &Transaction) -> EngineResult<AppliedBalances> {
        if tx.status != TransactionStatus::Confirmed {
            return Err(EngineError::WrongState("apply requires a confirmed movement"));
        }

        let balances = self.store.balances();
        let applied = match tx.kind {
            MovementKind::Give => {
                let to = tx.to_vitrine_id.ok_or(EngineError::MissingParty("to_vitrine"))?;
                let target = balances.credit(to, tx.product_id, tx.quantity).await?;
                AppliedBalances { source: None, target: Some(target) }
            }
            MovementKind::Return => {
                // stock may have been sold since the request was made
                let from =
                    tx.from_vitrine_id.ok_or(EngineError::MissingParty("from_vitrine"))?;
                let source = balances.debit(from, tx.product_id, tx.quantity).await?;
                AppliedBalances { source: Some(source), target: None }
            }
            MovementKind::Transfer => {
                let from =
                    tx.from_vitrine_id.ok_or(EngineError::MissingParty("from_vitrine"))?;
                let to = tx.to_vitrine_id.ok_or(EngineError::MissingParty("to_vitrine"))?;
                let (source, target) = balances.transfer(from, to, tx.product_id, tx.quantity).await?;
                AppliedBalances { source: Some(source), target: Some(target) }
            }
            MovementKind::Take | MovementKind::Sale => AppliedBalances::default(),
        };

        info!(transaction_id = %tx.id, kind = %tx.kind, "movement applied");
        Ok(applied)
    }

    fn check_parties(
        &self,
        request: &MovementRequest,
    ) -> EngineResult<(Option<UserId>, Option<UserId>)> {
        let from = request.from_vitrine_id;
        let to = request.to_vitrine_id;
        match request.kind {
            MovementKind::Give => {
                to.ok_or(EngineError::MissingParty("to_vitrine"))?;
                Ok((None, to))
            }
            MovementKind::Take | MovementKind::Return | MovementKind::Sale => {
                from.ok_or(EngineError::MissingParty("from_vitrine"))?;
                Ok((from, None))
            }
            MovementKind::Transfer => {
                let f = from.ok_or(EngineError::MissingParty("from_vitrine"))?;
                let t = to.ok_or(EngineError::MissingParty("to_vitrine"))?;
                if f == t {
                    return Err(EngineError::SameVitrine);
                }
                Ok((from, to))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_types::{ChatId, Language, Role};

    struct Fixture {
        engine: Engine,
        store: Store,
        admin: UserId,
        a: UserId,
        b: UserId,
        p: ProductId,
    }

    async fn fixture() -> Fixture {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();

        let admin = store
            .users()
            .create(ChatId(10), "boss", Role::Admin, Language::En)
            .await
            .unwrap();
        let a = store
            .users()
            .create(ChatId(1), "shop-a", Role::Vitrine, Language::Ru)
            .await
            .unwrap();
        let b = store
            .users()
            .create(ChatId(2), "shop-b", Role::Vitrine, Language::Uz)
            .await
            .unwrap();
        let p = store.products().create("SKU-1", "Widget", None).await.unwrap();

        Fixture { engine: Engine::new(store.clone()), store, admin: admin.id, a: a.id, b: b.id, p: p.id }
    }

    fn request(
        kind: MovementKind,
        product: ProductId,
        quantity: u32,
        from: Option<UserId>,
        to: Option<UserId>,
    ) -> MovementRequest {
        MovementRequest { kind, product_id: product, quantity, from_vitrine_id: from, to_vitrine_id: to }
    }

    #[tokio::test]
    async fn give_is_created_pending_and_touches_no_balance() {
        let f = fixture().await;

        let created = f
            .engine
            .create_movement(request(MovementKind::Give, f.p, 5, None, Some(f.a)), f.admin)
            .await
            .unwrap();

        assert_eq!(created.transaction.status, TransactionStatus::Pending);
        assert_eq!(created.new_source_balance, None);
        assert_eq!(f.store.balances().quantity(f.a, f.p).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn confirmed_give_credits_the_target() {
        let f = fixture().await;

        let created = f
            .engine
            .create_movement(request(MovementKind::Give, f.p, 5, None, Some(f.a)), f.admin)
            .await
            .unwrap();
        f.store
            .transactions()
            .set_status(created.transaction.id, TransactionStatus::Confirmed, Some(f.a))
            .await
            .unwrap();
        let tx = f.store.transactions().by_id(created.transaction.id).await.unwrap().unwrap();

        let applied = f.engine.apply_confirmed(&tx).await.unwrap();
        assert_eq!(applied.target, Some(5));
        assert_eq!(f.store.balances().quantity(f.a, f.p).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn return_with_too_little_stock_creates_nothing() {
        let f = fixture().await;
        f.store.balances().credit(f.a, f.p, 3).await.unwrap();

        let err = f
            .engine
            .create_movement(request(MovementKind::Return, f.p, 5, Some(f.a), None), f.a)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { available: 3, requested: 5 }));
        assert!(f.store.transactions().in_range(None, None, None).await.unwrap().is_empty());
        assert_eq!(f.store.balances().quantity(f.a, f.p).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn take_applies_immediately() {
        let f = fixture().await;
        f.store.balances().credit(f.a, f.p, 5).await.unwrap();

        let created = f
            .engine
            .create_movement(request(MovementKind::Take, f.p, 2, Some(f.a), None), f.admin)
            .await
            .unwrap();

        assert_eq!(created.transaction.status, TransactionStatus::Confirmed);
        assert_eq!(created.new_source_balance, Some(3));
        assert_eq!(f.store.balances().quantity(f.a, f.p).await.unwrap(), 3);

        // applying an already-applied self-confirming movement is a no-op
        let applied = f.engine.apply_confirmed(&created.transaction).await.unwrap();
        assert_eq!(applied, AppliedBalances::default());
        assert_eq!(f.store.balances().quantity(f.a, f.p).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn sale_applies_immediately() {
        let f = fixture().await;
        f.store.balances().credit(f.a, f.p, 3).await.unwrap();

        let created = f
            .engine
            .create_movement(request(MovementKind::Sale, f.p, 2, Some(f.a), None), f.a)
            .await
            .unwrap();
        assert_eq!(created.transaction.status, TransactionStatus::Confirmed);
        assert_eq!(created.new_source_balance, Some(1));
    }

    #[tokio::test]
    async fn racing_self_confirming_movements_never_leave_extra_rows() {
        let f = fixture().await;
        f.store.balances().credit(f.a, f.p, 3).await.unwrap();

        // both want all the stock; exactly one may win
        let sale = f
            .engine
            .create_movement(request(MovementKind::Sale, f.p, 3, Some(f.a), None), f.a);
        let take = f
            .engine
            .create_movement(request(MovementKind::Take, f.p, 3, Some(f.a), None), f.admin);
        let (sale, take) = tokio::join!(sale, take);

        let successes = [sale.is_ok(), take.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);

        // the loser rolled back whole: one confirmed row, no stock left
        let rows = f.store.transactions().in_range(None, None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TransactionStatus::Confirmed);
        assert_eq!(f.store.balances().quantity(f.a, f.p).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transfer_conserves_stock() {
        let f = fixture().await;
        f.store.balances().credit(f.a, f.p, 10).await.unwrap();

        let created = f
            .engine
            .create_movement(
                request(MovementKind::Transfer, f.p, 4, Some(f.a), Some(f.b)),
                f.admin,
            )
            .await
            .unwrap();
        assert_eq!(created.transaction.status, TransactionStatus::Pending);
        // no mutation until confirmed
        assert_eq!(f.store.balances().quantity(f.a, f.p).await.unwrap(), 10);

        f.store
            .transactions()
            .set_status(created.transaction.id, TransactionStatus::Confirmed, Some(f.b))
            .await
            .unwrap();
        let tx = f.store.transactions().by_id(created.transaction.id).await.unwrap().unwrap();
        let applied = f.engine.apply_confirmed(&tx).await.unwrap();
        assert_eq!(applied, AppliedBalances { source: Some(6), target: Some(4) });

        let total = f.store.balances().quantity(f.a, f.p).await.unwrap()
            + f.store.balances().quantity(f.b, f.p).await.unwrap();
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn transfer_to_itself_is_rejected() {
        let f = fixture().await;
        f.store.balances().credit(f.a, f.p, 10).await.unwrap();

        let err = f
            .engine
            .create_movement(
                request(MovementKind::Transfer, f.p, 1, Some(f.a), Some(f.a)),
                f.admin,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SameVitrine));
    }

    #[tokio::test]
    async fn quantity_bounds_are_enforced() {
        let f = fixture().await;

        let err = f
            .engine
            .create_movement(request(MovementKind::Give, f.p, 0, None, Some(f.a)), f.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity(_)));

        let err = f
            .engine
            .create_movement(
                request(MovementKind::Give, f.p, MAX_QUANTITY + 1, None, Some(f.a)),
                f.admin,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity(_)));
    }

    #[tokio::test]
    async fn apply_refuses_pending_movements() {
        let f = fixture().await;

        let created = f
            .engine
            .create_movement(request(MovementKind::Give, f.p, 5, None, Some(f.a)), f.admin)
            .await
            .unwrap();
        let err = f.engine.apply_confirmed(&created.transaction).await.unwrap_err();
        assert!(matches!(err, EngineError::WrongState(_)));
    }
}
