//! SQL queries behind `PgStore`.

use papertrade_core::{
    Account, Credentials, NewAccount, PaymentMethod, Position, StoreError, Transaction,
    TransactionKind,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Run embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

/// Map unique-constraint violations on registration to typed conflicts.
fn conflict_err(new: &NewAccount, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(details) = &e {
        if let Some(constraint) = details.constraint() {
            if constraint.contains("username") {
                return StoreError::UsernameTaken(new.username.clone());
            }
            if constraint.contains("email") {
                return StoreError::EmailTaken(new.email.clone());
            }
        }
    }
    db_err(e)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub async fn create_account(pool: &PgPool, new: &NewAccount) -> Result<Account, StoreError> {
    let account = Account::open(&new.username, &new.email);
    sqlx::query(
        "INSERT INTO accounts (id, username, email, password_hash, cash_balance, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(account.id)
    .bind(&account.username)
    .bind(&account.email)
    .bind(&new.password_hash)
    .bind(account.cash_balance)
    .bind(account.created_at)
    .execute(pool)
    .await
    .map_err(|e| conflict_err(new, e))?;

    Ok(account)
}

pub async fn load_account(pool: &PgPool, id: Uuid) -> Result<Account, StoreError> {
    let row = sqlx::query(
        "SELECT id, username, email, cash_balance, created_at
         FROM accounts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    let row = match row {
        Some(row) => row,
        None => return Err(StoreError::AccountNotFound(id)),
    };

    let positions = sqlx::query(
        "SELECT symbol, quantity, cost_basis, opened_at
         FROM positions WHERE account_id = $1",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    let holdings = positions
        .iter()
        .map(|r| {
            let position = Position {
                symbol: r.get("symbol"),
                quantity: r.get("quantity"),
                cost_basis: r.get("cost_basis"),
                opened_at: r.get("opened_at"),
            };
            (position.symbol.clone(), position)
        })
        .collect();

    Ok(Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        cash_balance: row.get("cash_balance"),
        holdings,
        created_at: row.get("created_at"),
    })
}

/// Replace the stored snapshot: balance update plus a delete-and-reinsert of
/// the position rows, in one SQL transaction.
pub async fn save_account(pool: &PgPool, account: &Account) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    let updated = sqlx::query("UPDATE accounts SET cash_balance = $2 WHERE id = $1")
        .bind(account.id)
        .bind(account.cash_balance)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
    if updated.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound(account.id));
    }

    sqlx::query("DELETE FROM positions WHERE account_id = $1")
        .bind(account.id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

    for position in account.holdings.values() {
        sqlx::query(
            "INSERT INTO positions (account_id, symbol, quantity, cost_basis, opened_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(account.id)
        .bind(&position.symbol)
        .bind(position.quantity)
        .bind(position.cost_basis)
        .bind(position.opened_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
    }

    tx.commit().await.map_err(db_err)?;
    Ok(())
}

pub async fn delete_account(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    if deleted.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound(id));
    }
    Ok(())
}

pub async fn find_credentials(
    pool: &PgPool,
    username: &str,
) -> Result<Option<Credentials>, StoreError> {
    let row = sqlx::query("SELECT id, username, password_hash FROM accounts WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

    Ok(row.map(|r| Credentials {
        account_id: r.get("id"),
        username: r.get("username"),
        password_hash: r.get("password_hash"),
    }))
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

fn row_to_transaction(row: &PgRow) -> Result<Transaction, StoreError> {
    let kind_text: String = row.get("kind");
    let kind = TransactionKind::from_str(&kind_text)
        .ok_or_else(|| StoreError::DatabaseError(format!("Unknown transaction kind: {kind_text}")))?;

    let method_text: Option<String> = row.get("payment_method");
    let payment_method = match method_text {
        Some(text) => Some(PaymentMethod::from_str(&text).ok_or_else(|| {
            StoreError::DatabaseError(format!("Unknown payment method: {text}"))
        })?),
        None => None,
    };

    Ok(Transaction {
        id: row.get("id"),
        account_id: row.get("account_id"),
        kind,
        symbol: row.get("symbol"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        total_value: row.get("total_value"),
        payment_method,
        created_at: row.get("created_at"),
    })
}

pub async fn insert_transaction(
    pool: &PgPool,
    transaction: &Transaction,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO transactions
           (id, account_id, kind, symbol, quantity, unit_price, total_value, payment_method, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(transaction.id)
    .bind(transaction.account_id)
    .bind(transaction.kind.as_str())
    .bind(&transaction.symbol)
    .bind(transaction.quantity)
    .bind(transaction.unit_price)
    .bind(transaction.total_value)
    .bind(transaction.payment_method.map(|m| m.as_str()))
    .bind(transaction.created_at)
    .execute(pool)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub async fn find_transaction(pool: &PgPool, id: Uuid) -> Result<Transaction, StoreError> {
    let row = sqlx::query(
        "SELECT id, account_id, kind, symbol, quantity, unit_price, total_value, payment_method, created_at
         FROM transactions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    match row {
        Some(row) => row_to_transaction(&row),
        None => Err(StoreError::TransactionNotFound(id)),
    }
}

pub async fn transactions_for_account(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Vec<Transaction>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, account_id, kind, symbol, quantity, unit_price, total_value, payment_method, created_at
         FROM transactions WHERE account_id = $1 ORDER BY created_at DESC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.iter().map(row_to_transaction).collect()
}

pub async fn recent_transactions(
    pool: &PgPool,
    account_id: Uuid,
    limit: usize,
) -> Result<Vec<Transaction>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, account_id, kind, symbol, quantity, unit_price, total_value, payment_method, created_at
         FROM transactions WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(account_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.iter().map(row_to_transaction).collect()
}

pub async fn purge_transactions(pool: &PgPool, account_id: Uuid) -> Result<u64, StoreError> {
    let purged = sqlx::query("DELETE FROM transactions WHERE account_id = $1")
        .bind(account_id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(purged.rows_affected())
}
