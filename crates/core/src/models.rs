use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Cash balance every newly opened account starts with, in the reference
/// currency (USD).
pub const DEFAULT_STARTING_BALANCE: Decimal = dec!(1000);

/// Positions whose remaining quantity falls at or below this threshold after
/// a sell are removed outright instead of being kept as dust records.
pub const POSITION_DUST: Decimal = dec!(0.00000001);

// ---------------------------------------------------------------------------
// Symbols & Quotes
// ---------------------------------------------------------------------------

/// Canonical form of a ticker symbol: trimmed and upper-cased.
///
/// Holdings maps and quote lookups are keyed by this form, so every external
/// input passes through here before it reaches the ledger.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// A current market price for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    /// Display name of the asset (e.g. "Bitcoin").
    pub name: String,
    /// Unit price in the reference currency.
    pub price: Decimal,
    pub as_of: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Payment Methods
// ---------------------------------------------------------------------------

/// How an operation is funded or paid out.
///
/// Only `Balance` draws on the account's cash balance; every other method
/// settles outside the ledger and leaves cash untouched on buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Balance,
    CreditCard,
    BankTransfer,
    Paypal,
    Crypto,
}

impl PaymentMethod {
    pub fn is_external(&self) -> bool {
        !matches!(self, PaymentMethod::Balance)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Balance => "balance",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Crypto => "crypto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "balance" => Some(PaymentMethod::Balance),
            "credit_card" => Some(PaymentMethod::CreditCard),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "paypal" => Some(PaymentMethod::Paypal),
            "crypto" => Some(PaymentMethod::Crypto),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Account & Positions
// ---------------------------------------------------------------------------

/// A currently held amount of one crypto asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Held quantity; always `> 0` while the position exists.
    pub quantity: Decimal,
    /// Total cash paid for the currently held quantity.
    pub cost_basis: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Average entry price of the held quantity.
    pub fn average_price(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.cost_basis / self.quantity
        }
    }
}

/// Snapshot of one user's account: cash plus open positions.
///
/// Password hashes are held by the account store and never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Cash in the reference currency; `>= 0` after every settlement.
    pub cash_balance: Decimal,
    /// Open positions keyed by normalized symbol.
    pub holdings: HashMap<String, Position>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a fresh account with the default starting balance.
    pub fn open(username: &str, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            cash_balance: DEFAULT_STARTING_BALANCE,
            holdings: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.holdings.get(symbol)
    }

    pub fn has_open_positions(&self) -> bool {
        !self.holdings.is_empty()
    }
}

/// Input for opening an account. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Login lookup result from the account store.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account_id: Uuid,
    pub username: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// The kind of settled operation a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Buy,
    Sell,
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "buy",
            TransactionKind::Sell => "sell",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(TransactionKind::Buy),
            "sell" => Some(TransactionKind::Sell),
            "deposit" => Some(TransactionKind::Deposit),
            "withdraw" => Some(TransactionKind::Withdraw),
            _ => None,
        }
    }
}

/// Immutable record of one settled operation.
///
/// `symbol`, `quantity` and `unit_price` are populated for trades and `None`
/// for cash movements. Transactions are append-only; they are removed only as
/// a cascade of account deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    /// Cash value of the operation: cost for buys, proceeds for sells,
    /// the amount for deposits and withdrawals.
    pub total_value: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn buy(
        account_id: Uuid,
        symbol: &str,
        quantity: Decimal,
        unit_price: Decimal,
        total_value: Decimal,
        payment_method: PaymentMethod,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind: TransactionKind::Buy,
            symbol: Some(symbol.to_string()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            total_value,
            payment_method: Some(payment_method),
            created_at: at,
        }
    }

    pub fn sell(
        account_id: Uuid,
        symbol: &str,
        quantity: Decimal,
        unit_price: Decimal,
        total_value: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind: TransactionKind::Sell,
            symbol: Some(symbol.to_string()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            total_value,
            payment_method: None,
            created_at: at,
        }
    }

    pub fn deposit(
        account_id: Uuid,
        amount: Decimal,
        payment_method: PaymentMethod,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind: TransactionKind::Deposit,
            symbol: None,
            quantity: None,
            unit_price: None,
            total_value: amount,
            payment_method: Some(payment_method),
            created_at: at,
        }
    }

    pub fn withdraw(
        account_id: Uuid,
        amount: Decimal,
        payment_method: PaymentMethod,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind: TransactionKind::Withdraw,
            symbol: None,
            quantity: None,
            unit_price: None,
            total_value: amount,
            payment_method: Some(payment_method),
            created_at: at,
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self.kind, TransactionKind::Buy | TransactionKind::Sell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" btc "), "BTC");
        assert_eq!(normalize_symbol("Eth"), "ETH");
        assert_eq!(normalize_symbol("DOGE"), "DOGE");
    }

    #[test]
    fn test_new_account_defaults() {
        let account = Account::open("alice", "alice@example.com");
        assert_eq!(account.cash_balance, DEFAULT_STARTING_BALANCE);
        assert!(account.holdings.is_empty());
        assert!(!account.has_open_positions());
    }

    #[test]
    fn test_average_price() {
        let position = Position {
            symbol: "BTC".to_string(),
            quantity: dec!(2),
            cost_basis: dec!(300),
            opened_at: Utc::now(),
        };
        assert_eq!(position.average_price(), dec!(150));
    }

    #[test]
    fn test_average_price_zero_quantity() {
        let position = Position {
            symbol: "BTC".to_string(),
            quantity: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            opened_at: Utc::now(),
        };
        assert_eq!(position.average_price(), Decimal::ZERO);
    }

    #[test]
    fn test_payment_method_round_trip() {
        for method in [
            PaymentMethod::Balance,
            PaymentMethod::CreditCard,
            PaymentMethod::BankTransfer,
            PaymentMethod::Paypal,
            PaymentMethod::Crypto,
        ] {
            assert_eq!(PaymentMethod::from_str(method.as_str()), Some(method));
        }
        assert_eq!(PaymentMethod::from_str("cheque"), None);
    }

    #[test]
    fn test_decimal_serializes_as_string() {
        let account = Account::open("bob", "bob@example.com");
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["cash_balance"], "1000");
    }

    #[test]
    fn test_transaction_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&TransactionKind::Withdraw).unwrap(),
            "\"withdraw\""
        );
        let kind: TransactionKind = serde_json::from_str("\"buy\"").unwrap();
        assert_eq!(kind, TransactionKind::Buy);
    }
}
