use crate::models::*;
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Price Oracle Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while fetching market prices.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Unknown symbol: {0}")]
    SymbolNotFound(String),
    #[error("Market data API error: {0}")]
    ApiError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Source of current market prices.
///
/// Quotes are treated as current at the moment of use; the ledger keeps no
/// cache and attaches no staleness contract. A failed lookup aborts the
/// surrounding settlement before any state changes.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetch the current quote for one symbol (normalized form).
    async fn quote(&self, symbol: &str) -> Result<Quote, OracleError>;

    /// Fetch quotes for several symbols in one round trip.
    ///
    /// Every requested symbol must appear in the result; an unknown symbol
    /// fails the whole batch with `SymbolNotFound`.
    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, OracleError>;

    /// Current top listings by market rank, for the market browse surface.
    async fn listings(&self, limit: usize) -> Result<Vec<Quote>, OracleError>;
}

// ---------------------------------------------------------------------------
// Account Store Trait
// ---------------------------------------------------------------------------

/// Errors that can occur during persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),
    #[error("Username already taken: {0}")]
    UsernameTaken(String),
    #[error("Email already registered: {0}")]
    EmailTaken(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Persistence for account snapshots.
///
/// `save` replaces the whole snapshot (cash plus holdings) atomically, which
/// is the unit of consistency every settlement relies on. Callers serialize
/// writes per account; the store itself does no cross-call coordination.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persist a new account with the default starting balance.
    async fn create(&self, new: NewAccount) -> Result<Account, StoreError>;

    /// Load the current snapshot.
    async fn load(&self, id: Uuid) -> Result<Account, StoreError>;

    /// Replace the stored snapshot with `account`.
    async fn save(&self, account: &Account) -> Result<(), StoreError>;

    /// Remove the account. The caller has already verified it holds no
    /// open positions.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Look up login credentials by username.
    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, StoreError>;
}

// ---------------------------------------------------------------------------
// Transaction Log Trait
// ---------------------------------------------------------------------------

/// Append-only history of settled operations.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Record one settled operation.
    async fn append(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Fetch a single transaction by id.
    async fn find(&self, id: Uuid) -> Result<Transaction, StoreError>;

    /// Full history for an account, newest first.
    async fn for_account(&self, account_id: Uuid) -> Result<Vec<Transaction>, StoreError>;

    /// The most recent `limit` transactions for an account.
    async fn recent(&self, account_id: Uuid, limit: usize)
        -> Result<Vec<Transaction>, StoreError>;

    /// Remove the whole history for an account as part of account deletion.
    /// Returns the number of purged records.
    async fn purge_account(&self, account_id: Uuid) -> Result<u64, StoreError>;
}
