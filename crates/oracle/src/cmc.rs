//! CoinMarketCap REST client.
//!
//! Uses the pro API's `quotes/latest` and `listings/latest` endpoints with
//! the `X-CMC_PRO_API_KEY` header. Quote requests pass `skip_invalid` so an
//! unknown symbol comes back as an absent entry rather than a 400, and is
//! reported as `SymbolNotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use papertrade_core::{OracleError, PriceOracle, Quote};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CoinMarketCapOracle {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CoinMarketCapOracle {
    pub fn new(api_key: impl Into<String>) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OracleError::ApiError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the client at a different host (tests, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_payload<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, OracleError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| OracleError::ApiError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::ApiError(format!("{path} returned {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| OracleError::ParseError(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    data: HashMap<String, CoinEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    data: Vec<CoinEntry>,
}

#[derive(Debug, Deserialize)]
struct CoinEntry {
    symbol: String,
    name: String,
    quote: QuoteBlock,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(rename = "USD")]
    usd: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: Decimal,
    last_updated: Option<DateTime<Utc>>,
}

impl CoinEntry {
    fn into_quote(self, fetched_at: DateTime<Utc>) -> Quote {
        Quote {
            symbol: self.symbol,
            name: self.name,
            price: self.quote.usd.price,
            as_of: self.quote.usd.last_updated.unwrap_or(fetched_at),
        }
    }
}

#[async_trait]
impl PriceOracle for CoinMarketCapOracle {
    async fn quote(&self, symbol: &str) -> Result<Quote, OracleError> {
        let symbols = [symbol.to_string()];
        let mut quotes = self.quotes(&symbols).await?;
        quotes
            .remove(symbol)
            .ok_or_else(|| OracleError::SymbolNotFound(symbol.to_string()))
    }

    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, OracleError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let response: QuotesResponse = self
            .get_payload(
                "cryptocurrency/quotes/latest",
                &[
                    ("symbol", symbols.join(",")),
                    ("convert", "USD".to_string()),
                    ("skip_invalid", "true".to_string()),
                ],
            )
            .await?;

        let fetched_at = Utc::now();
        let mut quotes = HashMap::new();
        for (symbol, entry) in response.data {
            quotes.insert(symbol, entry.into_quote(fetched_at));
        }
        for symbol in symbols {
            if !quotes.contains_key(symbol) {
                return Err(OracleError::SymbolNotFound(symbol.clone()));
            }
        }
        Ok(quotes)
    }

    async fn listings(&self, limit: usize) -> Result<Vec<Quote>, OracleError> {
        let response: ListingsResponse = self
            .get_payload(
                "cryptocurrency/listings/latest",
                &[
                    ("start", "1".to_string()),
                    ("limit", limit.to_string()),
                    ("convert", "USD".to_string()),
                ],
            )
            .await?;

        let fetched_at = Utc::now();
        Ok(response
            .data
            .into_iter()
            .map(|entry| entry.into_quote(fetched_at))
            .collect())
    }
}
