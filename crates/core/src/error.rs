use rust_decimal::Decimal;

/// Reasons the settlement engine rejects an operation.
///
/// Every rejection happens before any state is touched: the engine validates
/// the full precondition set against the account snapshot and only then
/// produces the successor state, so a caller holding a `LedgerError` knows
/// the account is exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Quantity or amount was zero or negative.
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    /// The cash balance cannot cover the operation.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// The position is missing or smaller than the requested sell quantity.
    #[error("Insufficient holdings of {symbol}: requested {requested}, available {available}")]
    InsufficientHoldings {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    /// No usable price for the symbol (missing or non-positive quote).
    #[error("No current price for {symbol}")]
    PriceUnavailable { symbol: String },

    /// Account deletion requires all positions to be sold first.
    #[error("Account still holds {open_positions} open position(s)")]
    AccountNotEmpty { open_positions: usize },
}
