pub mod db;
pub mod memory;

pub use db::run_migrations;
pub use memory::MemoryStore;

use async_trait::async_trait;
use papertrade_core::{
    Account, AccountStore, Credentials, NewAccount, StoreError, Transaction, TransactionLog,
};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed account store and transaction log.
///
/// One instance serves both traits; `save` replaces the whole account
/// snapshot (cash plus positions) inside a single SQL transaction so a
/// settlement is either fully visible or not at all.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        db::create_account(&self.pool, &new).await
    }

    async fn load(&self, id: Uuid) -> Result<Account, StoreError> {
        db::load_account(&self.pool, id).await
    }

    async fn save(&self, account: &Account) -> Result<(), StoreError> {
        db::save_account(&self.pool, account).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        db::delete_account(&self.pool, id).await
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError> {
        db::find_credentials(&self.pool, username).await
    }
}

#[async_trait]
impl TransactionLog for PgStore {
    async fn append(&self, transaction: &Transaction) -> Result<(), StoreError> {
        db::insert_transaction(&self.pool, transaction).await
    }

    async fn find(&self, id: Uuid) -> Result<Transaction, StoreError> {
        db::find_transaction(&self.pool, id).await
    }

    async fn for_account(&self, account_id: Uuid) -> Result<Vec<Transaction>, StoreError> {
        db::transactions_for_account(&self.pool, account_id).await
    }

    async fn recent(
        &self,
        account_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        db::recent_transactions(&self.pool, account_id, limit).await
    }

    async fn purge_account(&self, account_id: Uuid) -> Result<u64, StoreError> {
        db::purge_transactions(&self.pool, account_id).await
    }
}
