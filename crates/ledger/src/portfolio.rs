//! Read-only portfolio valuation against current quotes.

use papertrade_core::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// One held position priced at the current quote.
#[derive(Debug, Clone, Serialize)]
pub struct HoldingValuation {
    pub symbol: String,
    pub name: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub cost_basis: Decimal,
    pub current_price: Decimal,
    /// `quantity * current_price`.
    pub value: Decimal,
    pub profit: Decimal,
    /// Profit relative to cost basis, in percent. Zero when the basis is
    /// zero.
    pub profit_percentage: Decimal,
}

/// The whole portfolio priced at current quotes, with totals.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioValuation {
    pub holdings: Vec<HoldingValuation>,
    pub total_value: Decimal,
    pub total_cost_basis: Decimal,
    pub total_profit: Decimal,
}

impl PortfolioValuation {
    pub fn empty() -> Self {
        Self {
            holdings: Vec::new(),
            total_value: Decimal::ZERO,
            total_cost_basis: Decimal::ZERO,
            total_profit: Decimal::ZERO,
        }
    }
}

/// Price every held position with the supplied quotes.
///
/// Output is ordered by symbol. Every held symbol must have a quote; a
/// missing one fails the whole valuation rather than reporting a partial
/// portfolio.
pub fn value_portfolio(
    account: &Account,
    quotes: &HashMap<String, Quote>,
) -> Result<PortfolioValuation, LedgerError> {
    let mut entries: Vec<(&String, &Position)> = account.holdings.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut valuation = PortfolioValuation::empty();
    for (symbol, position) in entries {
        let quote = quotes
            .get(symbol)
            .ok_or_else(|| LedgerError::PriceUnavailable {
                symbol: symbol.clone(),
            })?;

        let value = position.quantity * quote.price;
        let profit = value - position.cost_basis;
        let profit_percentage = if position.cost_basis.is_zero() {
            Decimal::ZERO
        } else {
            profit / position.cost_basis * Decimal::ONE_HUNDRED
        };

        valuation.total_value += value;
        valuation.total_cost_basis += position.cost_basis;
        valuation.total_profit += profit;
        valuation.holdings.push(HoldingValuation {
            symbol: position.symbol.clone(),
            name: quote.name.clone(),
            quantity: position.quantity,
            average_price: position.average_price(),
            cost_basis: position.cost_basis,
            current_price: quote.price,
            value,
            profit,
            profit_percentage,
        });
    }

    Ok(valuation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account_with(positions: &[(&str, Decimal, Decimal)]) -> Account {
        let mut account = Account::open("trader", "trader@example.com");
        for (symbol, quantity, cost_basis) in positions {
            account.holdings.insert(
                symbol.to_string(),
                Position {
                    symbol: symbol.to_string(),
                    quantity: *quantity,
                    cost_basis: *cost_basis,
                    opened_at: Utc::now(),
                },
            );
        }
        account
    }

    fn quotes_for(prices: &[(&str, Decimal)]) -> HashMap<String, Quote> {
        prices
            .iter()
            .map(|(symbol, price)| {
                (
                    symbol.to_string(),
                    Quote {
                        symbol: symbol.to_string(),
                        name: symbol.to_string(),
                        price: *price,
                        as_of: Utc::now(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_valuation_profit_and_totals() {
        let account = account_with(&[
            ("BTC", dec!(2), dec!(400)),
            ("ETH", dec!(10), dec!(1000)),
        ]);
        let quotes = quotes_for(&[("BTC", dec!(300)), ("ETH", dec!(90))]);

        let valuation = value_portfolio(&account, &quotes).unwrap();
        assert_eq!(valuation.holdings.len(), 2);
        // Sorted by symbol.
        assert_eq!(valuation.holdings[0].symbol, "BTC");
        assert_eq!(valuation.holdings[0].value, dec!(600));
        assert_eq!(valuation.holdings[0].profit, dec!(200));
        assert_eq!(valuation.holdings[0].profit_percentage, dec!(50));
        assert_eq!(valuation.holdings[1].profit, dec!(-100));

        assert_eq!(valuation.total_value, dec!(1500));
        assert_eq!(valuation.total_cost_basis, dec!(1400));
        assert_eq!(valuation.total_profit, dec!(100));
    }

    #[test]
    fn test_zero_cost_basis_reports_zero_percentage() {
        let account = account_with(&[("BTC", dec!(1), dec!(0))]);
        let quotes = quotes_for(&[("BTC", dec!(500))]);

        let valuation = value_portfolio(&account, &quotes).unwrap();
        assert_eq!(valuation.holdings[0].profit, dec!(500));
        assert_eq!(valuation.holdings[0].profit_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_missing_quote_fails_valuation() {
        let account = account_with(&[("BTC", dec!(1), dec!(100))]);
        let quotes = quotes_for(&[("ETH", dec!(90))]);

        let err = value_portfolio(&account, &quotes).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::PriceUnavailable { symbol } if symbol == "BTC"
        ));
    }

    #[test]
    fn test_empty_portfolio() {
        let account = account_with(&[]);
        let valuation = value_portfolio(&account, &HashMap::new()).unwrap();
        assert!(valuation.holdings.is_empty());
        assert_eq!(valuation.total_value, Decimal::ZERO);
    }
}
