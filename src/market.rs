// src/market.rs
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::AppError;
use crate::models::Quote;

/// Categories offered by the dashboard selector, first one is the default.
pub const CATEGORIES: [&str; 4] = ["Stocks US", "Crypto", "Currencies", "Futures"];

/// Cap on quotes in one market panel.
pub const MAX_ITEMS: usize = 5;

/// Quote source for one market category.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch up to [`MAX_ITEMS`] quotes. Failures surface as
    /// `AppError::MarketData` and are for the caller to absorb.
    async fn fetch(&self, category: &str) -> Result<Vec<Quote>, AppError>;
}

/// Provider key for a display category.
fn category_key(category: &str) -> String {
    if category == "Stocks US" {
        "us".to_string()
    } else {
        category.to_lowercase()
    }
}

fn category_symbols(key: &str) -> &'static [&'static str] {
    match key {
        "us" => &[
            "DJI:INDEXDJX",
            "SPX:INDEXSP",
            "COMP:INDEXNASDAQ",
            "RUT:INDEXRUS",
            "VIX:INDEXCBOE",
        ],
        "crypto" => &["BTC:USD", "ETH:USD", "ADA:USD", "XRP:USD", "DOGE:USD"],
        "currencies" => &["EUR:USD", "USD:JPY", "GBP:USD", "USD:CAD", "AUD:USD"],
        "futures" => &[
            "YMW00:CBOT",
            "ESW00:CME_EMINIS",
            "NQW00:CME_EMINIS",
            "GCW00:COMEX",
            "CLW00:NYMEX",
        ],
        _ => &[],
    }
}

#[derive(Debug, Default, Deserialize)]
struct PriceMovement {
    #[serde(default)]
    movement: String,
    #[serde(default)]
    percentage: f64,
}

#[derive(Debug, Deserialize)]
struct MarketInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    price_movement: PriceMovement,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    markets: HashMap<String, Vec<MarketInfo>>,
}

/// Quote client against a SerpApi-style `google_finance` endpoint.
pub struct SerpApiGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SerpApiGateway {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        SerpApiGateway {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl MarketData for SerpApiGateway {
    async fn fetch(&self, category: &str) -> Result<Vec<Quote>, AppError> {
        let key = category_key(category);
        let mut quotes = Vec::new();

        for symbol in category_symbols(&key) {
            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("engine", "google_finance"),
                    ("q", symbol),
                    ("api_key", &self.api_key),
                ])
                .send()
                .await
                .map_err(|e| AppError::MarketData(e.to_string()))?;

            if !response.status().is_success() {
                return Err(AppError::MarketData(format!(
                    "quote provider answered HTTP {}",
                    response.status()
                )));
            }

            let mut body: QuoteResponse = response
                .json()
                .await
                .map_err(|e| AppError::MarketData(e.to_string()))?;

            let rows = body.markets.remove(&key).unwrap_or_default();
            let row_count = rows.len();
            for info in rows {
                quotes.push(Quote {
                    symbol: symbol.split(':').next().unwrap_or(symbol).to_string(),
                    name: info.name,
                    price: info.price,
                    movement: info.price_movement.movement,
                    percentage: info.price_movement.percentage,
                });
            }

            if row_count >= MAX_ITEMS {
                break;
            }
        }

        quotes.truncate(MAX_ITEMS);
        info!("Fetched {} quotes for category {}", quotes.len(), category);
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn category_keys_match_the_provider() {
        assert_eq!(category_key("Stocks US"), "us");
        assert_eq!(category_key("Crypto"), "crypto");
        assert_eq!(category_key("Futures"), "futures");
    }

    #[test]
    fn every_category_has_symbols() {
        for category in CATEGORIES {
            assert!(!category_symbols(&category_key(category)).is_empty());
        }
        assert!(category_symbols("unknown").is_empty());
    }

    #[test]
    fn response_fields_default_when_absent() {
        let body = json!({
            "markets": {
                "crypto": [
                    {"name": "Bitcoin", "price": 42000.5,
                     "price_movement": {"movement": "Up", "percentage": 1.5}},
                    {"name": "Sparse"}
                ]
            }
        });
        let parsed: QuoteResponse = serde_json::from_value(body).unwrap();
        let rows = &parsed.markets["crypto"];
        assert_eq!(rows[0].price, 42000.5);
        assert_eq!(rows[0].price_movement.movement, "Up");
        assert_eq!(rows[1].price, 0.0);
        assert_eq!(rows[1].price_movement.percentage, 0.0);
    }

    #[tokio::test]
    async fn fetch_collects_quotes_per_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("engine", "google_finance"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "markets": {
                    "crypto": [
                        {"name": "Bitcoin", "price": 42000.5,
                         "price_movement": {"movement": "Up", "percentage": 1.5}}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let gateway = SerpApiGateway::new(Client::new(), server.uri(), "test-key".to_string());
        let quotes = gateway.fetch("Crypto").await.unwrap();

        assert_eq!(quotes.len(), 5);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].name, "Bitcoin");
        assert_eq!(quotes[0].movement, "Up");
    }

    #[tokio::test]
    async fn fetch_stops_after_a_full_panel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "markets": {
                    "us": [
                        {"name": "Item 1", "price": 100.0},
                        {"name": "Item 2", "price": 200.0},
                        {"name": "Item 3", "price": 300.0},
                        {"name": "Item 4", "price": 400.0},
                        {"name": "Item 5", "price": 500.0}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = SerpApiGateway::new(Client::new(), server.uri(), "test-key".to_string());
        let quotes = gateway.fetch("Stocks US").await.unwrap();
        assert_eq!(quotes.len(), MAX_ITEMS);
    }

    #[tokio::test]
    async fn provider_errors_become_market_data_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gateway = SerpApiGateway::new(Client::new(), server.uri(), "test-key".to_string());
        let err = gateway.fetch("Crypto").await.unwrap_err();
        assert!(matches!(err, AppError::MarketData(_)));
    }
}
