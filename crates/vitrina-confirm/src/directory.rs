//! Admin directory
//!
//! Resolves which admin confirms a return. Priority is registration
//! order; a movement that has already been bound to an admin keeps that
//! binding. The directory never creates user records: admin records come
//! from the startup allow-list only.

use vitrina_store::{Store, StoreResult};
use vitrina_types::{Transaction, User};

pub struct AdminDirectory {
    store: Store,
}

impl AdminDirectory {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// All admins in routing priority order (oldest first)
    pub async fn admins(&self) -> StoreResult<Vec<User>> {
        self.store.users().admins().await
    }

    /// The admin who should confirm `tx`: its bound admin when one is
    /// recorded and still exists, otherwise the first admin by priority.
    pub async fn confirming_admin(&self, tx: &Transaction) -> StoreResult<Option<User>> {
        if let Some(admin_id) = tx.admin_id {
            if let Some(user) = self.store.users().by_id(admin_id).await? {
                if user.is_admin() {
                    return Ok(Some(user));
                }
            }
        }
        Ok(self.admins().await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vitrina_types::{
        ChatId, Language, MovementKind, ProductId, Role, TransactionId, TransactionStatus, UserId,
    };

    fn return_tx(admin_id: Option<UserId>) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            kind: MovementKind::Return,
            product_id: ProductId::new(),
            quantity: 1,
            from_vitrine_id: Some(UserId::new()),
            to_vitrine_id: None,
            admin_id,
            status: TransactionStatus::Pending,
            needs_confirmation: false,
            confirmed_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn falls_back_to_first_admin_by_registration_order() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();

        let first = store
            .users()
            .create(ChatId(1), "admin-1", Role::Admin, Language::Ru)
            .await
            .unwrap();
        store
            .users()
            .create(ChatId(2), "admin-2", Role::Admin, Language::Ru)
            .await
            .unwrap();

        let directory = AdminDirectory::new(store);
        let resolved = directory.confirming_admin(&return_tx(None)).await.unwrap();
        assert_eq!(resolved.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn bound_admin_wins_over_priority() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();

        store
            .users()
            .create(ChatId(1), "admin-1", Role::Admin, Language::Ru)
            .await
            .unwrap();
        let second = store
            .users()
            .create(ChatId(2), "admin-2", Role::Admin, Language::Ru)
            .await
            .unwrap();

        let directory = AdminDirectory::new(store);
        let resolved = directory
            .confirming_admin(&return_tx(Some(second.id)))
            .await
            .unwrap();
        assert_eq!(resolved.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn no_admins_resolves_to_none() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();

        let directory = AdminDirectory::new(store);
        let resolved = directory.confirming_admin(&return_tx(None)).await.unwrap();
        assert!(resolved.is_none());
    }
}
