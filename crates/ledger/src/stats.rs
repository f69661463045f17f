//! Transaction statistics as plain folds over the history slice.
//!
//! The store hands back the account's transactions and everything is
//! aggregated here in memory, so the numbers come out identical no matter
//! which store backs the log.

use chrono::Datelike;
use papertrade_core::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Activity within one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyActivity {
    pub year: i32,
    pub month: u32,
    pub count: u64,
    pub value: Decimal,
}

/// Aggregate view of an account's history.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionStats {
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_purchases: Decimal,
    pub total_sales: Decimal,
    /// Per-month count and total value, ascending by (year, month).
    pub monthly: Vec<MonthlyActivity>,
}

/// Fold the history into totals by kind and a monthly series.
pub fn transaction_stats(transactions: &[Transaction]) -> TransactionStats {
    let mut totals = TransactionStats {
        total_deposits: Decimal::ZERO,
        total_withdrawals: Decimal::ZERO,
        total_purchases: Decimal::ZERO,
        total_sales: Decimal::ZERO,
        monthly: Vec::new(),
    };

    let mut by_month: BTreeMap<(i32, u32), (u64, Decimal)> = BTreeMap::new();
    for transaction in transactions {
        match transaction.kind {
            TransactionKind::Deposit => totals.total_deposits += transaction.total_value,
            TransactionKind::Withdraw => totals.total_withdrawals += transaction.total_value,
            TransactionKind::Buy => totals.total_purchases += transaction.total_value,
            TransactionKind::Sell => totals.total_sales += transaction.total_value,
        }

        let key = (
            transaction.created_at.year(),
            transaction.created_at.month(),
        );
        let entry = by_month.entry(key).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += transaction.total_value;
    }

    totals.monthly = by_month
        .into_iter()
        .map(|((year, month), (count, value))| MonthlyActivity {
            year,
            month,
            count,
            value,
        })
        .collect();
    totals
}

/// Number of transactions per kind, for the account summary.
pub fn counts_by_kind(transactions: &[Transaction]) -> HashMap<TransactionKind, u64> {
    let mut counts = HashMap::new();
    for transaction in transactions {
        *counts.entry(transaction.kind).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn tx(kind: TransactionKind, value: Decimal, year: i32, month: u32) -> Transaction {
        let at = Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap();
        let account_id = Uuid::new_v4();
        match kind {
            TransactionKind::Buy => {
                Transaction::buy(account_id, "BTC", dec!(1), value, value, PaymentMethod::Balance, at)
            }
            TransactionKind::Sell => Transaction::sell(account_id, "BTC", dec!(1), value, value, at),
            TransactionKind::Deposit => {
                Transaction::deposit(account_id, value, PaymentMethod::Paypal, at)
            }
            TransactionKind::Withdraw => {
                Transaction::withdraw(account_id, value, PaymentMethod::Paypal, at)
            }
        }
    }

    #[test]
    fn test_totals_by_kind() {
        let history = vec![
            tx(TransactionKind::Deposit, dec!(500), 2024, 1),
            tx(TransactionKind::Deposit, dec!(250), 2024, 2),
            tx(TransactionKind::Buy, dec!(300), 2024, 2),
            tx(TransactionKind::Sell, dec!(120), 2024, 3),
            tx(TransactionKind::Withdraw, dec!(80), 2024, 3),
        ];

        let stats = transaction_stats(&history);
        assert_eq!(stats.total_deposits, dec!(750));
        assert_eq!(stats.total_withdrawals, dec!(80));
        assert_eq!(stats.total_purchases, dec!(300));
        assert_eq!(stats.total_sales, dec!(120));
    }

    #[test]
    fn test_monthly_series_sorted_ascending() {
        let history = vec![
            tx(TransactionKind::Buy, dec!(10), 2024, 3),
            tx(TransactionKind::Buy, dec!(20), 2023, 12),
            tx(TransactionKind::Sell, dec!(30), 2024, 3),
            tx(TransactionKind::Deposit, dec!(40), 2024, 1),
        ];

        let stats = transaction_stats(&history);
        let keys: Vec<(i32, u32)> = stats.monthly.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(keys, vec![(2023, 12), (2024, 1), (2024, 3)]);

        let march = &stats.monthly[2];
        assert_eq!(march.count, 2);
        assert_eq!(march.value, dec!(40));
    }

    #[test]
    fn test_empty_history() {
        let stats = transaction_stats(&[]);
        assert_eq!(stats.total_deposits, Decimal::ZERO);
        assert!(stats.monthly.is_empty());
        assert!(counts_by_kind(&[]).is_empty());
    }

    #[test]
    fn test_counts_by_kind() {
        let history = vec![
            tx(TransactionKind::Buy, dec!(10), 2024, 1),
            tx(TransactionKind::Buy, dec!(10), 2024, 2),
            tx(TransactionKind::Deposit, dec!(10), 2024, 2),
        ];
        let counts = counts_by_kind(&history);
        assert_eq!(counts.get(&TransactionKind::Buy), Some(&2));
        assert_eq!(counts.get(&TransactionKind::Deposit), Some(&1));
        assert_eq!(counts.get(&TransactionKind::Sell), None);
    }
}
