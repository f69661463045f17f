pub mod cmc;

pub use cmc::CoinMarketCapOracle;

use async_trait::async_trait;
use chrono::Utc;
use papertrade_core::{OracleError, PriceOracle, Quote};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Fixed-price oracle for tests and the demo server.
///
/// Prices stay where they were put until `set_price` moves them, which makes
/// settlement arithmetic in tests exact.
pub struct StaticOracle {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_price(mut self, symbol: &str, name: &str, price: Decimal) -> Self {
        self.quotes.get_mut().insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                name: name.to_string(),
                price,
                as_of: Utc::now(),
            },
        );
        self
    }

    /// Move an existing price, or introduce a new symbol named after itself.
    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        let mut quotes = self.quotes.write().await;
        match quotes.get_mut(symbol) {
            Some(quote) => {
                quote.price = price;
                quote.as_of = Utc::now();
            }
            None => {
                quotes.insert(
                    symbol.to_string(),
                    Quote {
                        symbol: symbol.to_string(),
                        name: symbol.to_string(),
                        price,
                        as_of: Utc::now(),
                    },
                );
            }
        }
    }
}

impl Default for StaticOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for StaticOracle {
    async fn quote(&self, symbol: &str) -> Result<Quote, OracleError> {
        self.quotes
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| OracleError::SymbolNotFound(symbol.to_string()))
    }

    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, OracleError> {
        let quotes = self.quotes.read().await;
        let mut result = HashMap::new();
        for symbol in symbols {
            let quote = quotes
                .get(symbol)
                .cloned()
                .ok_or_else(|| OracleError::SymbolNotFound(symbol.clone()))?;
            result.insert(symbol.clone(), quote);
        }
        Ok(result)
    }

    async fn listings(&self, limit: usize) -> Result<Vec<Quote>, OracleError> {
        let quotes = self.quotes.read().await;
        let mut listings: Vec<Quote> = quotes.values().cloned().collect();
        listings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        listings.truncate(limit);
        Ok(listings)
    }
}
