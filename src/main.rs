// src/main.rs
mod api;
mod db;
mod error;
mod market;
mod models;
mod portfolio;
mod store;
mod trade;

use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use reqwest::Client;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::market::{MarketData, SerpApiGateway};
use crate::store::PortfolioStore;

struct Config {
    port: u16,
    scylla_node: String,
    quote_base_url: String,
    api_key: String,
    quote_timeout_secs: u64,
}

impl Config {
    fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3030),
            scylla_node: env::var("SCYLLA_NODE").unwrap_or_else(|_| "127.0.0.1:9042".to_string()),
            quote_base_url: env::var("QUOTE_BASE_URL")
                .unwrap_or_else(|_| "https://serpapi.com/search.json".to_string()),
            api_key: env::var("SERPAPI_KEY").unwrap_or_default(),
            quote_timeout_secs: env::var("QUOTE_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(10),
        }
    }
}

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let config = Config::from_env();
    if config.api_key.is_empty() {
        warn!("SERPAPI_KEY is not set; the market panel will be empty.");
    }

    let store: Arc<dyn PortfolioStore> = match db::ScyllaStore::init(&config.scylla_node).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };
    info!("Connected to database...");

    let client = match Client::builder()
        .timeout(Duration::from_secs(config.quote_timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };
    let market: Arc<dyn MarketData> = Arc::new(SerpApiGateway::new(
        client,
        config.quote_base_url,
        config.api_key,
    ));

    let api = api::routes(store, market);

    info!("Server running on http://127.0.0.1:{}", config.port);
    warp::serve(api).run(([127, 0, 0, 1], config.port)).await;
}
