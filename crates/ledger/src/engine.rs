//! Pure settlement functions.
//!
//! Each operation takes an account snapshot plus the operation inputs and
//! either returns the successor snapshot with its transaction record, or a
//! `LedgerError` with the input snapshot untouched. Every precondition is
//! checked before any field of the copy is written, so a rejection can never
//! leave a half-applied account behind. No I/O happens here; price lookups
//! and persistence belong to the service layer.

use chrono::{DateTime, Utc};
use papertrade_core::*;
use rust_decimal::Decimal;

/// Result of a successful settlement: the updated account snapshot and the
/// transaction that records it.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub account: Account,
    pub transaction: Transaction,
    /// Profit or loss realized against the relieved cost basis. Only sells
    /// produce one.
    pub realized_pnl: Option<Decimal>,
}

/// Buy `quantity` of the quoted symbol.
///
/// Paying from `Balance` requires sufficient cash and debits it; external
/// payment methods leave the cash balance untouched. The position for the
/// symbol is created or grown, with the cost added to its basis so the
/// average entry price stays the quantity-weighted mean of all buys.
pub fn buy(
    account: &Account,
    quote: &Quote,
    quantity: Decimal,
    payment_method: PaymentMethod,
    at: DateTime<Utc>,
) -> Result<Settlement, LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount { amount: quantity });
    }
    if quote.price <= Decimal::ZERO {
        return Err(LedgerError::PriceUnavailable {
            symbol: quote.symbol.clone(),
        });
    }

    let cost = quantity * quote.price;
    if !payment_method.is_external() && account.cash_balance < cost {
        return Err(LedgerError::InsufficientFunds {
            required: cost,
            available: account.cash_balance,
        });
    }

    let mut next = account.clone();
    if !payment_method.is_external() {
        next.cash_balance -= cost;
    }
    match next.holdings.get_mut(&quote.symbol) {
        Some(position) => {
            position.quantity += quantity;
            position.cost_basis += cost;
        }
        None => {
            next.holdings.insert(
                quote.symbol.clone(),
                Position {
                    symbol: quote.symbol.clone(),
                    quantity,
                    cost_basis: cost,
                    opened_at: at,
                },
            );
        }
    }

    let transaction = Transaction::buy(
        account.id,
        &quote.symbol,
        quantity,
        quote.price,
        cost,
        payment_method,
        at,
    );
    Ok(Settlement {
        account: next,
        transaction,
        realized_pnl: None,
    })
}

/// Sell `quantity` of the quoted symbol and credit the proceeds to cash.
///
/// The sold slice relieves the position's cost basis proportionally, and the
/// difference between proceeds and relieved basis is reported as realized
/// PnL. A position whose remaining quantity falls within `POSITION_DUST` of
/// zero is removed outright.
pub fn sell(
    account: &Account,
    quote: &Quote,
    quantity: Decimal,
    at: DateTime<Utc>,
) -> Result<Settlement, LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount { amount: quantity });
    }
    if quote.price <= Decimal::ZERO {
        return Err(LedgerError::PriceUnavailable {
            symbol: quote.symbol.clone(),
        });
    }

    let position = match account.position(&quote.symbol) {
        Some(p) if p.quantity >= quantity => p,
        other => {
            return Err(LedgerError::InsufficientHoldings {
                symbol: quote.symbol.clone(),
                requested: quantity,
                available: other.map(|p| p.quantity).unwrap_or(Decimal::ZERO),
            })
        }
    };

    let proceeds = quantity * quote.price;
    // Basis leaves the position in proportion to the quantity sold.
    let basis_sold = position.cost_basis * quantity / position.quantity;
    let remaining = position.quantity - quantity;

    let mut next = account.clone();
    next.cash_balance += proceeds;
    if remaining <= POSITION_DUST {
        // Fully closed; any dust basis goes with the position.
        next.holdings.remove(&quote.symbol);
    } else if let Some(position) = next.holdings.get_mut(&quote.symbol) {
        position.quantity = remaining;
        position.cost_basis -= basis_sold;
    }

    let transaction = Transaction::sell(
        account.id,
        &quote.symbol,
        quantity,
        quote.price,
        proceeds,
        at,
    );
    Ok(Settlement {
        account: next,
        transaction,
        realized_pnl: Some(proceeds - basis_sold),
    })
}

/// Credit `amount` of external money to the cash balance.
pub fn deposit(
    account: &Account,
    amount: Decimal,
    payment_method: PaymentMethod,
    at: DateTime<Utc>,
) -> Result<Settlement, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount { amount });
    }

    let mut next = account.clone();
    next.cash_balance += amount;

    let transaction = Transaction::deposit(account.id, amount, payment_method, at);
    Ok(Settlement {
        account: next,
        transaction,
        realized_pnl: None,
    })
}

/// Debit `amount` from the cash balance and pay it out.
pub fn withdraw(
    account: &Account,
    amount: Decimal,
    payment_method: PaymentMethod,
    at: DateTime<Utc>,
) -> Result<Settlement, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount { amount });
    }
    if account.cash_balance < amount {
        return Err(LedgerError::InsufficientFunds {
            required: amount,
            available: account.cash_balance,
        });
    }

    let mut next = account.clone();
    next.cash_balance -= amount;

    let transaction = Transaction::withdraw(account.id, amount, payment_method, at);
    Ok(Settlement {
        account: next,
        transaction,
        realized_pnl: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account::open("trader", "trader@example.com")
    }

    fn quote(symbol: &str, price: Decimal) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price,
            as_of: Utc::now(),
        }
    }

    fn buy_now(account: &Account, q: &Quote, quantity: Decimal) -> Account {
        buy(account, q, quantity, PaymentMethod::Balance, Utc::now())
            .unwrap()
            .account
    }

    #[test]
    fn test_balance_buy_debits_cash() {
        let acct = account();
        let settled = buy(
            &acct,
            &quote("BTC", dec!(200)),
            dec!(2),
            PaymentMethod::Balance,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(settled.account.cash_balance, dec!(600));
        let position = settled.account.position("BTC").unwrap();
        assert_eq!(position.quantity, dec!(2));
        assert_eq!(position.cost_basis, dec!(400));
        assert_eq!(settled.transaction.kind, TransactionKind::Buy);
        assert_eq!(settled.transaction.total_value, dec!(400));
        assert_eq!(settled.transaction.unit_price, Some(dec!(200)));
    }

    #[test]
    fn test_external_buy_leaves_cash_untouched() {
        let acct = account();
        let settled = buy(
            &acct,
            &quote("BTC", dec!(5000)),
            dec!(1),
            PaymentMethod::CreditCard,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(settled.account.cash_balance, acct.cash_balance);
        assert_eq!(
            settled.account.position("BTC").unwrap().cost_basis,
            dec!(5000)
        );
    }

    #[test]
    fn test_buy_insufficient_funds_rejected_unchanged() {
        let acct = account();
        let err = buy(
            &acct,
            &quote("BTC", dec!(2000)),
            dec!(1),
            PaymentMethod::Balance,
            Utc::now(),
        )
        .unwrap_err();

        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, dec!(2000));
                assert_eq!(available, dec!(1000));
            }
            other => panic!("Expected InsufficientFunds, got {other:?}"),
        }
        assert_eq!(acct.cash_balance, dec!(1000));
        assert!(acct.holdings.is_empty());
    }

    #[test]
    fn test_buy_rejects_non_positive_quantity() {
        let acct = account();
        let q = quote("BTC", dec!(100));
        assert!(matches!(
            buy(&acct, &q, dec!(0), PaymentMethod::Balance, Utc::now()),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            buy(&acct, &q, dec!(-1), PaymentMethod::Balance, Utc::now()),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_buy_rejects_non_positive_price() {
        let acct = account();
        assert!(matches!(
            buy(
                &acct,
                &quote("BTC", dec!(0)),
                dec!(1),
                PaymentMethod::Balance,
                Utc::now()
            ),
            Err(LedgerError::PriceUnavailable { .. })
        ));
    }

    #[test]
    fn test_weighted_average_cost() {
        let acct = account();
        let acct = buy_now(&acct, &quote("BTC", dec!(100)), dec!(1));
        let acct = buy_now(&acct, &quote("BTC", dec!(200)), dec!(1));

        let position = acct.position("BTC").unwrap();
        assert_eq!(position.quantity, dec!(2));
        assert_eq!(position.cost_basis, dec!(300));
        assert_eq!(position.average_price(), dec!(150));
    }

    #[test]
    fn test_sell_credits_proceeds_and_shrinks_position() {
        let acct = account();
        let acct = buy_now(&acct, &quote("ETH", dec!(100)), dec!(4));
        assert_eq!(acct.cash_balance, dec!(600));

        let settled = sell(&acct, &quote("ETH", dec!(150)), dec!(1), Utc::now()).unwrap();
        assert_eq!(settled.account.cash_balance, dec!(750));
        let position = settled.account.position("ETH").unwrap();
        assert_eq!(position.quantity, dec!(3));
        // One quarter of the 400 basis left with the sold quarter.
        assert_eq!(position.cost_basis, dec!(300));
        assert_eq!(settled.realized_pnl, Some(dec!(50)));
    }

    #[test]
    fn test_sell_entire_position_removes_it() {
        let acct = account();
        let acct = buy_now(&acct, &quote("ETH", dec!(100)), dec!(4));

        let settled = sell(&acct, &quote("ETH", dec!(100)), dec!(4), Utc::now()).unwrap();
        assert!(settled.account.position("ETH").is_none());
        assert_eq!(settled.account.cash_balance, dec!(1000));
        assert_eq!(settled.realized_pnl, Some(dec!(0)));
    }

    #[test]
    fn test_sell_dust_remainder_removes_position() {
        let acct = account();
        let acct = buy_now(&acct, &quote("DOGE", dec!(10)), dec!(1));

        let settled = sell(
            &acct,
            &quote("DOGE", dec!(10)),
            dec!(0.999999995),
            Utc::now(),
        )
        .unwrap();
        // Remainder of 5e-9 is below the dust threshold.
        assert!(settled.account.position("DOGE").is_none());
    }

    #[test]
    fn test_oversell_rejected_unchanged() {
        let acct = account();
        let acct = buy_now(&acct, &quote("BTC", dec!(100)), dec!(2));
        let before = acct.clone();

        let err = sell(&acct, &quote("BTC", dec!(100)), dec!(3), Utc::now()).unwrap_err();
        match err {
            LedgerError::InsufficientHoldings {
                symbol,
                requested,
                available,
            } => {
                assert_eq!(symbol, "BTC");
                assert_eq!(requested, dec!(3));
                assert_eq!(available, dec!(2));
            }
            other => panic!("Expected InsufficientHoldings, got {other:?}"),
        }
        assert_eq!(acct.cash_balance, before.cash_balance);
        assert_eq!(
            acct.position("BTC").unwrap().quantity,
            before.position("BTC").unwrap().quantity
        );
    }

    #[test]
    fn test_sell_without_position_reports_zero_available() {
        let acct = account();
        let err = sell(&acct, &quote("SOL", dec!(20)), dec!(1), Utc::now()).unwrap_err();
        match err {
            LedgerError::InsufficientHoldings { available, .. } => {
                assert_eq!(available, Decimal::ZERO);
            }
            other => panic!("Expected InsufficientHoldings, got {other:?}"),
        }
    }

    #[test]
    fn test_deposit_withdraw_round_trip() {
        let acct = account();
        let deposited = deposit(
            &acct,
            dec!(250),
            PaymentMethod::BankTransfer,
            Utc::now(),
        )
        .unwrap()
        .account;
        assert_eq!(deposited.cash_balance, dec!(1250));

        let withdrawn = withdraw(
            &deposited,
            dec!(250),
            PaymentMethod::BankTransfer,
            Utc::now(),
        )
        .unwrap()
        .account;
        assert_eq!(withdrawn.cash_balance, acct.cash_balance);
    }

    #[test]
    fn test_over_withdrawal_rejected_unchanged() {
        let acct = account();
        let err = withdraw(&acct, dec!(1500), PaymentMethod::Paypal, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(acct.cash_balance, dec!(1000));
    }

    #[test]
    fn test_deposit_rejects_non_positive_amount() {
        let acct = account();
        assert!(matches!(
            deposit(&acct, dec!(0), PaymentMethod::Paypal, Utc::now()),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            withdraw(&acct, dec!(-5), PaymentMethod::Paypal, Utc::now()),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }
}
