// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side for a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(raw: &str) -> Option<Side> {
        match raw {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Cash account for a single user. One portfolio per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub user_id: String,
    pub balance: Decimal,
}

/// A tradeable instrument. Reference data, looked up by symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub name: String,
}

/// A holding in one instrument. At most one open position per
/// (user, symbol); closed positions are kept for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub user_id: String,
    pub symbol: String,
    pub quantity: i64,
    /// Entry price from the opening fill.
    pub price: Decimal,
    pub is_open: bool,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn open(user_id: &str, symbol: &str, quantity: i64, price: Decimal) -> Self {
        Position {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            quantity,
            price,
            is_open: true,
            opened_at: Utc::now(),
        }
    }
}

/// Append-only audit row, one per executed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: String,
    pub side: Side,
    pub symbol: String,
    pub quantity: i64,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl Transaction {
    pub fn record(user_id: &str, side: Side, symbol: &str, quantity: i64, price: Decimal) -> Self {
        Transaction {
            user_id: user_id.to_string(),
            side,
            symbol: symbol.to_string(),
            quantity,
            price,
            executed_at: Utc::now(),
        }
    }
}

/// One row of the market panel, as returned by the quote provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub movement: String,
    pub percentage: f64,
}
