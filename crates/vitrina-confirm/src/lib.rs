//! Vitrina Confirmation Workflow
//!
//! The two-party handshake for movements that are not self-confirming:
//!
//! 1. [`ConfirmationWorkflow::request_confirmation`] resolves the
//!    counterparty of a pending movement, sends them a localized prompt
//!    with confirm/reject buttons and marks the row once the prompt is
//!    known to have reached them.
//! 2. [`ConfirmationWorkflow::process_reply`] handles the button press:
//!    the `pending -> terminal` transition is single-shot in the store, so
//!    a second press on the same prompt comes back as
//!    [`ReplyOutcome::AlreadyProcessed`] instead of double-applying.
//!
//! If applying a freshly confirmed movement fails (a return whose stock
//! was sold in the meantime), the status is rolled back to pending so the
//! row never claims a mutation that did not happen.

pub mod directory;
pub mod error;

pub use directory::AdminDirectory;
pub use error::{ConfirmError, ConfirmResult};

use std::sync::Arc;

use tracing::{info, warn};
use vitrina_audit::{AuditEntry, AuditSink};
use vitrina_delivery::{Button, Delivery, Keyboard, Outgoing};
use vitrina_engine::{AppliedBalances, Engine};
use vitrina_i18n::Localizer;
use vitrina_store::Store;
use vitrina_types::{
    ButtonAction, MovementKind, Transaction, TransactionId, TransactionStatus, User,
};

/// What a confirmation reply amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Confirmed { applied: AppliedBalances },
    Rejected,
    /// The movement was already terminal (or gone); nothing changed
    AlreadyProcessed,
}

pub struct ConfirmationWorkflow {
    store: Store,
    engine: Engine,
    directory: AdminDirectory,
    localizer: Arc<Localizer>,
    delivery: Arc<dyn Delivery>,
    audit: Arc<dyn AuditSink>,
}

impl ConfirmationWorkflow {
    pub fn new(
        store: Store,
        engine: Engine,
        localizer: Arc<Localizer>,
        delivery: Arc<dyn Delivery>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let directory = AdminDirectory::new(store.clone());
        Self { store, engine, directory, localizer, delivery, audit }
    }

    /// Send the confirmation prompt for a pending movement.
    ///
    /// Returns whether the prompt reached the counterparty;
    /// `needs_confirmation` is set on the row only in that case. A return
    /// with no resolvable admin is discarded and reported as
    /// [`ConfirmError::CounterpartyUnavailable`].
    pub async fn request_confirmation(&self, tx: &Transaction) -> ConfirmResult<bool> {
        let recipient = match tx.kind {
            MovementKind::Give | MovementKind::Transfer => match tx.to_vitrine_id {
                Some(id) => self.store.users().by_id(id).await?,
                None => None,
            },
            MovementKind::Return => {
                let admin = self.directory.confirming_admin(tx).await?;
                match admin {
                    Some(admin) => {
                        // bind so later replies route to the same admin
                        if tx.admin_id != Some(admin.id) {
                            self.store.transactions().set_admin(tx.id, admin.id).await?;
                        }
                        Some(admin)
                    }
                    None => {
                        warn!(transaction_id = %tx.id, "no admin available, discarding return");
                        self.store.transactions().delete(tx.id).await?;
                        return Err(ConfirmError::CounterpartyUnavailable);
                    }
                }
            }
            MovementKind::Take | MovementKind::Sale => return Ok(false),
        };

        let Some(recipient) = recipient else {
            return Ok(false);
        };

        let prompt = self.render_prompt(tx, &recipient).await?;
        let keyboard = self.confirm_keyboard(tx.id, recipient.language);
        let delivered = self
            .delivery
            .send(recipient.chat_id, Outgoing::with_keyboard(prompt, keyboard))
            .await;

        if delivered {
            self.store.transactions().set_needs_confirmation(tx.id, true).await?;
            info!(transaction_id = %tx.id, recipient = %recipient.username, "confirmation requested");
        } else {
            warn!(transaction_id = %tx.id, recipient = %recipient.username, "confirmation prompt undelivered");
        }
        Ok(delivered)
    }

    /// Process a confirm/reject button press from `responder`.
    pub async fn process_reply(
        &self,
        responder: &User,
        transaction_id: TransactionId,
        accept: bool,
    ) -> ConfirmResult<ReplyOutcome> {
        let Some(tx) = self.store.transactions().by_id(transaction_id).await? else {
            return Ok(ReplyOutcome::AlreadyProcessed);
        };
        if !tx.is_pending() {
            return Ok(ReplyOutcome::AlreadyProcessed);
        }

        let status = if accept {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Rejected
        };
        let moved = self
            .store
            .transactions()
            .set_status(transaction_id, status, Some(responder.id))
            .await?;
        if !moved {
            // raced with another reply
            return Ok(ReplyOutcome::AlreadyProcessed);
        }

        let outcome = if accept {
            let confirmed = self
                .store
                .transactions()
                .by_id(transaction_id)
                .await?
                .ok_or_else(|| {
                    ConfirmError::Store(vitrina_store::StoreError::NotFound(format!(
                        "transaction {transaction_id} after status update"
                    )))
                })?;

            match self.engine.apply_confirmed(&confirmed).await {
                Ok(applied) => ReplyOutcome::Confirmed { applied },
                Err(e) => {
                    // the row must not claim a mutation that failed
                    self.store.transactions().reset_to_pending(transaction_id).await?;
                    self.audit
                        .record(AuditEntry::error(
                            Some(responder.chat_id),
                            "confirmation",
                            format!("apply failed for {transaction_id}: {e}"),
                        ))
                        .await;
                    return Err(e.into());
                }
            }
        } else {
            ReplyOutcome::Rejected
        };

        self.audit
            .record(AuditEntry::operation(
                Some(responder.chat_id),
                transaction_id,
                tx.kind.as_str(),
                status.as_str(),
                format!("quantity {}", tx.quantity),
            ))
            .await;

        self.notify_initiator(&tx, accept).await?;
        info!(transaction_id = %transaction_id, status = %status, "reply processed");
        Ok(outcome)
    }

    /// Tell the party that initiated the movement how it ended, in their
    /// own language. Delivery failure here is logged, not propagated.
    async fn notify_initiator(&self, tx: &Transaction, accepted: bool) -> ConfirmResult<()> {
        let initiator_id = match tx.kind {
            MovementKind::Give | MovementKind::Transfer => tx.admin_id,
            MovementKind::Return => tx.from_vitrine_id,
            MovementKind::Take | MovementKind::Sale => None,
        };
        let Some(initiator_id) = initiator_id else {
            return Ok(());
        };
        let Some(initiator) = self.store.users().by_id(initiator_id).await? else {
            return Ok(());
        };

        let product = self.product_name(tx).await?;
        let key = match (tx.kind, accepted) {
            (MovementKind::Give, true) => "give_result_confirmed",
            (MovementKind::Give, false) => "give_result_rejected",
            (MovementKind::Return, true) => "return_result_confirmed",
            (MovementKind::Return, false) => "return_result_rejected",
            (MovementKind::Transfer, true) => "transfer_result_confirmed",
            (MovementKind::Transfer, false) => "transfer_result_rejected",
            _ => return Ok(()),
        };
        let text = self.localizer.text_with(
            key,
            initiator.language,
            &[
                ("product", product),
                ("quantity", tx.quantity.to_string()),
            ],
        );

        if !self.delivery.send(initiator.chat_id, Outgoing::text(text)).await {
            warn!(transaction_id = %tx.id, "result notification undelivered");
        }
        Ok(())
    }

    async fn render_prompt(&self, tx: &Transaction, recipient: &User) -> ConfirmResult<String> {
        let product = self.product_name(tx).await?;
        let quantity = tx.quantity.to_string();

        let text = match tx.kind {
            MovementKind::Give => {
                let admin = self.username_of(tx.admin_id).await?;
                self.localizer.text_with(
                    "give_confirm_prompt",
                    recipient.language,
                    &[("admin", admin), ("product", product), ("quantity", quantity)],
                )
            }
            MovementKind::Return => {
                let vitrine = self.username_of(tx.from_vitrine_id).await?;
                self.localizer.text_with(
                    "return_confirm_prompt",
                    recipient.language,
                    &[("vitrine", vitrine), ("product", product), ("quantity", quantity)],
                )
            }
            MovementKind::Transfer => {
                let vitrine = self.username_of(tx.from_vitrine_id).await?;
                self.localizer.text_with(
                    "transfer_confirm_prompt",
                    recipient.language,
                    &[("vitrine", vitrine), ("product", product), ("quantity", quantity)],
                )
            }
            MovementKind::Take | MovementKind::Sale => String::new(),
        };
        Ok(text)
    }

    fn confirm_keyboard(&self, id: TransactionId, language: vitrina_types::Language) -> Keyboard {
        Keyboard::new().row(vec![
            Button::new(
                self.localizer.text("confirm_button", language),
                ButtonAction::Confirm { transaction_id: id, accept: true },
            ),
            Button::new(
                self.localizer.text("reject_button", language),
                ButtonAction::Confirm { transaction_id: id, accept: false },
            ),
        ])
    }

    async fn product_name(&self, tx: &Transaction) -> ConfirmResult<String> {
        Ok(self
            .store
            .products()
            .by_id(tx.product_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| tx.product_id.to_string()))
    }

    async fn username_of(&self, id: Option<vitrina_types::UserId>) -> ConfirmResult<String> {
        let Some(id) = id else {
            return Ok(String::new());
        };
        Ok(self
            .store
            .users()
            .by_id(id)
            .await?
            .map(|u| u.username)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_audit::MemoryAuditSink;
    use vitrina_delivery::MockDelivery;
    use vitrina_engine::{EngineError, MovementRequest};
    use vitrina_types::{ChatId, Language, ProductId, Role};

    struct Fixture {
        store: Store,
        engine: Engine,
        workflow: ConfirmationWorkflow,
        delivery: Arc<MockDelivery>,
        audit: Arc<MemoryAuditSink>,
        admin: User,
        vitrine_a: User,
        vitrine_b: User,
        product: ProductId,
    }

    async fn fixture() -> Fixture {
        fixture_with_admins(1).await
    }

    async fn fixture_with_admins(admins: usize) -> Fixture {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();

        let mut admin = None;
        for i in 0..admins {
            let user = store
                .users()
                .create(ChatId(100 + i as i64), &format!("admin-{i}"), Role::Admin, Language::En)
                .await
                .unwrap();
            admin.get_or_insert(user);
        }
        let vitrine_a = store
            .users()
            .create(ChatId(1), "shop-a", Role::Vitrine, Language::Ru)
            .await
            .unwrap();
        let vitrine_b = store
            .users()
            .create(ChatId(2), "shop-b", Role::Vitrine, Language::Uz)
            .await
            .unwrap();
        let product = store.products().create("SKU-1", "Widget", None).await.unwrap();

        let engine = Engine::new(store.clone());
        let delivery = Arc::new(MockDelivery::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let localizer = Arc::new(Localizer::new(Language::En).unwrap());
        let workflow = ConfirmationWorkflow::new(
            store.clone(),
            engine.clone(),
            localizer,
            delivery.clone(),
            audit.clone(),
        );

        Fixture {
            store,
            engine,
            workflow,
            delivery,
            audit,
            admin: admin.unwrap_or(vitrine_a.clone()),
            vitrine_a,
            vitrine_b,
            product: product.id,
        }
    }

    async fn pending_give(f: &Fixture, quantity: u32) -> Transaction {
        f.engine
            .create_movement(
                MovementRequest {
                    kind: MovementKind::Give,
                    product_id: f.product,
                    quantity,
                    from_vitrine_id: None,
                    to_vitrine_id: Some(f.vitrine_a.id),
                },
                f.admin.id,
            )
            .await
            .unwrap()
            .transaction
    }

    #[tokio::test]
    async fn give_prompt_reaches_the_target_vitrine() {
        let f = fixture().await;
        let tx = pending_give(&f, 5).await;

        let delivered = f.workflow.request_confirmation(&tx).await.unwrap();
        assert!(delivered);

        let sent = f.delivery.sent_to(f.vitrine_a.chat_id);
        assert_eq!(sent.len(), 1);
        // typed confirm/reject affordances carry the transaction id
        let keyboard = sent[0].keyboard.as_ref().unwrap();
        assert_eq!(
            keyboard.rows[0][0].action,
            ButtonAction::Confirm { transaction_id: tx.id, accept: true }
        );
        assert_eq!(
            keyboard.rows[0][1].action,
            ButtonAction::Confirm { transaction_id: tx.id, accept: false }
        );

        let reloaded = f.store.transactions().by_id(tx.id).await.unwrap().unwrap();
        assert!(reloaded.needs_confirmation);
    }

    #[tokio::test]
    async fn undelivered_prompt_leaves_needs_confirmation_unset() {
        let f = fixture().await;
        let tx = pending_give(&f, 5).await;
        f.delivery.fail_for(f.vitrine_a.chat_id);

        let delivered = f.workflow.request_confirmation(&tx).await.unwrap();
        assert!(!delivered);

        let reloaded = f.store.transactions().by_id(tx.id).await.unwrap().unwrap();
        assert!(!reloaded.needs_confirmation);
        assert!(reloaded.is_pending());
    }

    #[tokio::test]
    async fn confirming_a_give_credits_and_notifies_the_admin() {
        let f = fixture().await;
        let tx = pending_give(&f, 5).await;
        f.workflow.request_confirmation(&tx).await.unwrap();

        let outcome = f.workflow.process_reply(&f.vitrine_a, tx.id, true).await.unwrap();
        assert!(matches!(outcome, ReplyOutcome::Confirmed { .. }));
        assert_eq!(f.store.balances().quantity(f.vitrine_a.id, f.product).await.unwrap(), 5);

        // admin hears about it in their language
        let to_admin = f.delivery.sent_to(f.admin.chat_id);
        assert_eq!(to_admin.len(), 1);
        assert!(to_admin[0].text.contains("Widget"));

        assert_eq!(f.audit.len(), 1);
    }

    #[tokio::test]
    async fn replaying_a_reply_is_a_noop() {
        let f = fixture().await;
        let tx = pending_give(&f, 5).await;
        f.workflow.request_confirmation(&tx).await.unwrap();

        f.workflow.process_reply(&f.vitrine_a, tx.id, true).await.unwrap();
        let again = f.workflow.process_reply(&f.vitrine_a, tx.id, false).await.unwrap();
        assert_eq!(again, ReplyOutcome::AlreadyProcessed);

        // still confirmed, balance applied once
        let reloaded = f.store.transactions().by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TransactionStatus::Confirmed);
        assert_eq!(f.store.balances().quantity(f.vitrine_a.id, f.product).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn rejected_transfer_touches_no_balance() {
        let f = fixture().await;
        f.store.balances().credit(f.vitrine_a.id, f.product, 10).await.unwrap();

        let tx = f
            .engine
            .create_movement(
                MovementRequest {
                    kind: MovementKind::Transfer,
                    product_id: f.product,
                    quantity: 4,
                    from_vitrine_id: Some(f.vitrine_a.id),
                    to_vitrine_id: Some(f.vitrine_b.id),
                },
                f.admin.id,
            )
            .await
            .unwrap()
            .transaction;
        f.workflow.request_confirmation(&tx).await.unwrap();

        let outcome = f.workflow.process_reply(&f.vitrine_b, tx.id, false).await.unwrap();
        assert_eq!(outcome, ReplyOutcome::Rejected);

        assert_eq!(f.store.balances().quantity(f.vitrine_a.id, f.product).await.unwrap(), 10);
        assert_eq!(f.store.balances().quantity(f.vitrine_b.id, f.product).await.unwrap(), 0);
        let reloaded = f.store.transactions().by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TransactionStatus::Rejected);
    }

    #[tokio::test]
    async fn return_routes_to_first_admin_and_binds_it() {
        let f = fixture_with_admins(2).await;
        f.store.balances().credit(f.vitrine_a.id, f.product, 5).await.unwrap();

        let tx = f
            .engine
            .create_movement(
                MovementRequest {
                    kind: MovementKind::Return,
                    product_id: f.product,
                    quantity: 3,
                    from_vitrine_id: Some(f.vitrine_a.id),
                    to_vitrine_id: None,
                },
                f.vitrine_a.id,
            )
            .await
            .unwrap()
            .transaction;

        let delivered = f.workflow.request_confirmation(&tx).await.unwrap();
        assert!(delivered);
        assert_eq!(f.delivery.sent_to(f.admin.chat_id).len(), 1);

        let reloaded = f.store.transactions().by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(reloaded.admin_id, Some(f.admin.id));
    }

    #[tokio::test]
    async fn return_without_admins_is_discarded() {
        let f = fixture_with_admins(0).await;
        f.store.balances().credit(f.vitrine_a.id, f.product, 5).await.unwrap();

        let tx = f
            .engine
            .create_movement(
                MovementRequest {
                    kind: MovementKind::Return,
                    product_id: f.product,
                    quantity: 3,
                    from_vitrine_id: Some(f.vitrine_a.id),
                    to_vitrine_id: None,
                },
                f.vitrine_a.id,
            )
            .await
            .unwrap()
            .transaction;

        let err = f.workflow.request_confirmation(&tx).await.unwrap_err();
        assert!(matches!(err, ConfirmError::CounterpartyUnavailable));
        assert!(f.store.transactions().by_id(tx.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_apply_rolls_the_status_back_to_pending() {
        let f = fixture().await;
        f.store.balances().credit(f.vitrine_a.id, f.product, 5).await.unwrap();

        let tx = f
            .engine
            .create_movement(
                MovementRequest {
                    kind: MovementKind::Return,
                    product_id: f.product,
                    quantity: 5,
                    from_vitrine_id: Some(f.vitrine_a.id),
                    to_vitrine_id: None,
                },
                f.vitrine_a.id,
            )
            .await
            .unwrap()
            .transaction;
        f.workflow.request_confirmation(&tx).await.unwrap();

        // stock sold before the admin confirms
        f.store.balances().debit(f.vitrine_a.id, f.product, 3).await.unwrap();

        let err = f.workflow.process_reply(&f.admin, tx.id, true).await.unwrap_err();
        assert!(matches!(
            err,
            ConfirmError::Engine(EngineError::InsufficientStock { available: 2, requested: 5 })
        ));

        let reloaded = f.store.transactions().by_id(tx.id).await.unwrap().unwrap();
        assert!(reloaded.is_pending());
        assert_eq!(f.store.balances().quantity(f.vitrine_a.id, f.product).await.unwrap(), 2);
        // the failure is on the audit trail
        assert_eq!(f.audit.len(), 1);
    }
}
