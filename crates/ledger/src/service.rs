//! Orchestration around the pure settlement functions: price lookup,
//! per-account serialization, persistence, and the read-side queries the API
//! exposes.

use crate::{engine, portfolio, stats, PortfolioValuation, Settlement, TransactionStats};
use chrono::{DateTime, Utc};
use papertrade_core::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// How many transactions the account summary includes.
const RECENT_TRANSACTIONS: usize = 5;

/// Errors surfaced by the settlement service, one variant per collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("Transaction {0} belongs to another account")]
    NotOwner(Uuid),
}

/// Account profile plus recent activity, for the summary endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account: Account,
    pub open_positions: usize,
    pub recent_transactions: Vec<Transaction>,
    pub transaction_counts: HashMap<TransactionKind, u64>,
}

/// The single gateway for everything that reads or mutates accounts.
///
/// Every settlement is a read-modify-write of one account snapshot, so the
/// service keeps a mutex per account and holds it across load, settle, and
/// save. Two concurrent sells can therefore never both pass the sufficiency
/// check against the same stale snapshot. Price lookups happen before the
/// lock is taken; a failed lookup aborts with nothing written.
pub struct SettlementService {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionLog>,
    oracle: Arc<dyn PriceOracle>,
    account_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SettlementService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionLog>,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        Self {
            accounts,
            transactions,
            oracle,
            account_locks: Mutex::new(HashMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Account lifecycle
    // -----------------------------------------------------------------------

    pub async fn register(&self, new: NewAccount) -> Result<Account, ServiceError> {
        let account = self.accounts.create(new).await?;
        tracing::info!(
            account_id = %account.id,
            username = %account.username,
            "Opened account"
        );
        Ok(account)
    }

    pub async fn credentials(&self, username: &str) -> Result<Option<Credentials>, ServiceError> {
        Ok(self.accounts.find_credentials(username).await?)
    }

    pub async fn account(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        Ok(self.accounts.load(account_id).await?)
    }

    pub async fn summary(&self, account_id: Uuid) -> Result<AccountSummary, ServiceError> {
        let account = self.accounts.load(account_id).await?;
        let recent = self
            .transactions
            .recent(account_id, RECENT_TRANSACTIONS)
            .await?;
        let history = self.transactions.for_account(account_id).await?;
        Ok(AccountSummary {
            open_positions: account.holdings.len(),
            transaction_counts: stats::counts_by_kind(&history),
            recent_transactions: recent,
            account,
        })
    }

    /// Delete the account and purge its history. Requires every position to
    /// have been sold first.
    pub async fn close_account(&self, account_id: Uuid) -> Result<(), ServiceError> {
        let lock = self.lock_for(account_id).await;
        let guard = lock.lock().await;

        let account = self.accounts.load(account_id).await?;
        if account.has_open_positions() {
            return Err(LedgerError::AccountNotEmpty {
                open_positions: account.holdings.len(),
            }
            .into());
        }
        let purged = self.transactions.purge_account(account_id).await?;
        self.accounts.delete(account_id).await?;

        drop(guard);
        self.account_locks.lock().await.remove(&account_id);

        tracing::info!(
            account_id = %account_id,
            purged_transactions = purged,
            "Closed account"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Settlements
    // -----------------------------------------------------------------------

    pub async fn buy(
        &self,
        account_id: Uuid,
        symbol: &str,
        quantity: Decimal,
        payment_method: PaymentMethod,
    ) -> Result<Settlement, ServiceError> {
        let symbol = normalize_symbol(symbol);
        let quote = self.oracle.quote(&symbol).await?;
        self.settle(account_id, move |account, now| {
            engine::buy(account, &quote, quantity, payment_method, now)
        })
        .await
    }

    pub async fn sell(
        &self,
        account_id: Uuid,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<Settlement, ServiceError> {
        let symbol = normalize_symbol(symbol);
        let quote = self.oracle.quote(&symbol).await?;
        self.settle(account_id, move |account, now| {
            engine::sell(account, &quote, quantity, now)
        })
        .await
    }

    pub async fn deposit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        payment_method: PaymentMethod,
    ) -> Result<Settlement, ServiceError> {
        self.settle(account_id, move |account, now| {
            engine::deposit(account, amount, payment_method, now)
        })
        .await
    }

    pub async fn withdraw(
        &self,
        account_id: Uuid,
        amount: Decimal,
        payment_method: PaymentMethod,
    ) -> Result<Settlement, ServiceError> {
        self.settle(account_id, move |account, now| {
            engine::withdraw(account, amount, payment_method, now)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub async fn portfolio(&self, account_id: Uuid) -> Result<PortfolioValuation, ServiceError> {
        let account = self.accounts.load(account_id).await?;
        if !account.has_open_positions() {
            return Ok(PortfolioValuation::empty());
        }

        let mut symbols: Vec<String> = account.holdings.keys().cloned().collect();
        symbols.sort();
        let quotes = self.oracle.quotes(&symbols).await?;
        Ok(portfolio::value_portfolio(&account, &quotes)?)
    }

    pub async fn history(&self, account_id: Uuid) -> Result<Vec<Transaction>, ServiceError> {
        Ok(self.transactions.for_account(account_id).await?)
    }

    pub async fn transaction(
        &self,
        account_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, ServiceError> {
        let transaction = self.transactions.find(transaction_id).await?;
        if transaction.account_id != account_id {
            return Err(ServiceError::NotOwner(transaction_id));
        }
        Ok(transaction)
    }

    pub async fn stats(&self, account_id: Uuid) -> Result<TransactionStats, ServiceError> {
        let history = self.transactions.for_account(account_id).await?;
        Ok(stats::transaction_stats(&history))
    }

    pub async fn market_listings(&self, limit: usize) -> Result<Vec<Quote>, ServiceError> {
        Ok(self.oracle.listings(limit).await?)
    }

    pub async fn market_quote(&self, symbol: &str) -> Result<Quote, ServiceError> {
        let symbol = normalize_symbol(symbol);
        Ok(self.oracle.quote(&symbol).await?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn lock_for(&self, account_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().await;
        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load, settle, persist, all under the account's lock.
    async fn settle<F>(&self, account_id: Uuid, op: F) -> Result<Settlement, ServiceError>
    where
        F: FnOnce(&Account, DateTime<Utc>) -> Result<Settlement, LedgerError> + Send,
    {
        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        let account = self.accounts.load(account_id).await?;
        let settlement = op(&account, Utc::now())?;
        self.accounts.save(&settlement.account).await?;
        self.transactions.append(&settlement.transaction).await?;

        tracing::info!(
            account_id = %account_id,
            kind = settlement.transaction.kind.as_str(),
            total_value = %settlement.transaction.total_value,
            "Settled operation"
        );
        Ok(settlement)
    }
}
