//! In-memory store for tests and the demo server.
//!
//! Behaves like the Postgres store from the caller's side: snapshots are
//! cloned in and out, `save` replaces the whole account, and the log keeps
//! insertion order so "newest first" matches settlement order.

use async_trait::async_trait;
use papertrade_core::{
    Account, AccountStore, Credentials, NewAccount, StoreError, Transaction, TransactionLog,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    credentials: RwLock<HashMap<String, Credentials>>,
    transactions: RwLock<Vec<Transaction>>,
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        let mut credentials = self.credentials.write().await;

        if credentials.contains_key(&new.username) {
            return Err(StoreError::UsernameTaken(new.username));
        }
        if accounts.values().any(|a| a.email == new.email) {
            return Err(StoreError::EmailTaken(new.email));
        }

        let account = Account::open(&new.username, &new.email);
        credentials.insert(
            new.username.clone(),
            Credentials {
                account_id: account.id,
                username: new.username,
                password_hash: new.password_hash,
            },
        );
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn load(&self, id: Uuid) -> Result<Account, StoreError> {
        self.accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::AccountNotFound(id))
    }

    async fn save(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&account.id) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(StoreError::AccountNotFound(account.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.remove(&id).ok_or(StoreError::AccountNotFound(id))?;
        self.credentials.write().await.remove(&account.username);
        Ok(())
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError> {
        Ok(self.credentials.read().await.get(username).cloned())
    }
}

#[async_trait]
impl TransactionLog for MemoryStore {
    async fn append(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.transactions.write().await.push(transaction.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Transaction, StoreError> {
        self.transactions
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::TransactionNotFound(id))
    }

    async fn for_account(&self, account_id: Uuid) -> Result<Vec<Transaction>, StoreError> {
        let mut result: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        result.reverse();
        Ok(result)
    }

    async fn recent(
        &self,
        account_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut result = self.for_account(account_id).await?;
        result.truncate(limit);
        Ok(result)
    }

    async fn purge_account(&self, account_id: Uuid) -> Result<u64, StoreError> {
        let mut transactions = self.transactions.write().await;
        let before = transactions.len();
        transactions.retain(|t| t.account_id != account_id);
        Ok((before - transactions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use papertrade_core::PaymentMethod;
    use rust_decimal_macros::dec;

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_load_save_round_trip() {
        let store = MemoryStore::default();
        let account = store.create(new_account("alice")).await.unwrap();

        let mut updated = store.load(account.id).await.unwrap();
        updated.cash_balance = dec!(750);
        store.save(&updated).await.unwrap();

        assert_eq!(store.load(account.id).await.unwrap().cash_balance, dec!(750));
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_rejected() {
        let store = MemoryStore::default();
        store.create(new_account("alice")).await.unwrap();

        assert!(matches!(
            store.create(new_account("alice")).await,
            Err(StoreError::UsernameTaken(_))
        ));

        let same_email = NewAccount {
            username: "alice2".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
        };
        assert!(matches!(
            store.create(same_email).await,
            Err(StoreError::EmailTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_frees_username() {
        let store = MemoryStore::default();
        let account = store.create(new_account("alice")).await.unwrap();

        store.delete(account.id).await.unwrap();
        assert!(matches!(
            store.load(account.id).await,
            Err(StoreError::AccountNotFound(_))
        ));
        assert!(store.find_credentials("alice").await.unwrap().is_none());

        // Same username can register again after deletion.
        store.create(new_account("alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_log_is_newest_first_and_purgeable() {
        let store = MemoryStore::default();
        let account = store.create(new_account("alice")).await.unwrap();

        for amount in [dec!(10), dec!(20), dec!(30)] {
            let tx =
                Transaction::deposit(account.id, amount, PaymentMethod::Paypal, Utc::now());
            store.append(&tx).await.unwrap();
        }

        let history = store.for_account(account.id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].total_value, dec!(30));
        assert_eq!(history[2].total_value, dec!(10));

        let recent = store.recent(account.id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].total_value, dec!(30));

        assert_eq!(store.purge_account(account.id).await.unwrap(), 3);
        assert!(store.for_account(account.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_transaction() {
        let store = MemoryStore::default();
        let account = store.create(new_account("bob")).await.unwrap();
        let tx = Transaction::deposit(account.id, dec!(5), PaymentMethod::Paypal, Utc::now());
        store.append(&tx).await.unwrap();

        assert_eq!(store.find(tx.id).await.unwrap().id, tx.id);
        assert!(matches!(
            store.find(Uuid::new_v4()).await,
            Err(StoreError::TransactionNotFound(_))
        ));
    }
}
