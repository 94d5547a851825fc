// src/db.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use scylla::{frame::response::result::CqlValue, query::Query, Session, SessionBuilder};

use crate::error::AppError;
use crate::models::{Portfolio, Position, Stock, Transaction};
use crate::store::{PortfolioStore, DEFAULT_STOCKS};

/// ScyllaDB-backed [`PortfolioStore`]. Decimal amounts travel as text
/// columns, timestamps as millisecond values.
pub struct ScyllaStore {
    session: Session,
}

impl ScyllaStore {
    /// Connect, create the schema and seed the instrument table.
    pub async fn init(node: &str) -> Result<Self, AppError> {
        let session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(storage)?;

        session.query("CREATE KEYSPACE IF NOT EXISTS stock_portfolio WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}", &[]).await.map_err(storage)?;
        session.query("CREATE TABLE IF NOT EXISTS stock_portfolio.portfolios (user_id TEXT PRIMARY KEY, balance TEXT)", &[]).await.map_err(storage)?;
        session.query("CREATE TABLE IF NOT EXISTS stock_portfolio.stocks (symbol TEXT PRIMARY KEY, name TEXT)", &[]).await.map_err(storage)?;
        session.query("CREATE TABLE IF NOT EXISTS stock_portfolio.positions (user_id TEXT, symbol TEXT, opened_at TIMESTAMP, quantity BIGINT, price TEXT, is_open BOOLEAN, PRIMARY KEY (user_id, symbol, opened_at))", &[]).await.map_err(storage)?;
        session.query("CREATE TABLE IF NOT EXISTS stock_portfolio.transactions (user_id TEXT, executed_at TIMESTAMP, side TEXT, symbol TEXT, quantity BIGINT, price TEXT, PRIMARY KEY (user_id, executed_at))", &[]).await.map_err(storage)?;

        let seed = Query::new("INSERT INTO stock_portfolio.stocks (symbol, name) VALUES (?, ?)");
        for (symbol, name) in DEFAULT_STOCKS {
            session
                .query(seed.clone(), (*symbol, *name))
                .await
                .map_err(storage)?;
        }

        info!("Successfully connected to ScyllaDB.");
        Ok(ScyllaStore { session })
    }
}

fn rows_to_positions(rows: Vec<scylla::frame::response::result::Row>) -> Vec<Position> {
    rows.into_iter()
        .filter_map(|row| {
            let user_id = text_column(&row.columns, 0)?;
            let symbol = text_column(&row.columns, 1)?;
            let opened_at = timestamp_column(&row.columns, 2)?;
            let quantity = bigint_column(&row.columns, 3)?;
            let price = text_column(&row.columns, 4)?.parse().ok()?;
            let is_open = boolean_column(&row.columns, 5)?;
            Some(Position {
                user_id,
                symbol,
                quantity,
                price,
                is_open,
                opened_at,
            })
        })
        .collect()
}

fn storage<E: std::fmt::Display>(e: E) -> AppError {
    AppError::Storage(e.to_string())
}

fn text_column(columns: &[Option<CqlValue>], index: usize) -> Option<String> {
    columns.get(index)?.as_ref()?.as_text().cloned()
}

fn bigint_column(columns: &[Option<CqlValue>], index: usize) -> Option<i64> {
    columns.get(index)?.as_ref()?.as_bigint()
}

fn boolean_column(columns: &[Option<CqlValue>], index: usize) -> Option<bool> {
    match columns.get(index)?.as_ref()? {
        CqlValue::Boolean(b) => Some(*b),
        _ => None,
    }
}

fn timestamp_column(columns: &[Option<CqlValue>], index: usize) -> Option<DateTime<Utc>> {
    match columns.get(index)?.as_ref()? {
        CqlValue::Timestamp(d) => DateTime::<Utc>::from_timestamp_millis(d.num_milliseconds()),
        _ => None,
    }
}

#[async_trait]
impl PortfolioStore for ScyllaStore {
    async fn get_portfolio(&self, user_id: &str) -> Result<Portfolio, AppError> {
        let query = Query::new("SELECT balance FROM stock_portfolio.portfolios WHERE user_id = ?");
        let result = self
            .session
            .query(query, (user_id,))
            .await
            .map_err(storage)?;

        let row = result
            .rows
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| AppError::PortfolioNotFound(user_id.to_string()))?;

        let balance = text_column(&row.columns, 0)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                error!("Unreadable balance for user {}", user_id);
                AppError::Storage(format!("unreadable balance for user {}", user_id))
            })?;

        Ok(Portfolio {
            user_id: user_id.to_string(),
            balance,
        })
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), AppError> {
        let query =
            Query::new("INSERT INTO stock_portfolio.portfolios (user_id, balance) VALUES (?, ?)");
        self.session
            .query(
                query,
                (portfolio.user_id.as_str(), portfolio.balance.to_string()),
            )
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn find_stock(&self, symbol: &str) -> Result<Option<Stock>, AppError> {
        let query = Query::new("SELECT name FROM stock_portfolio.stocks WHERE symbol = ?");
        let result = self.session.query(query, (symbol,)).await.map_err(storage)?;

        Ok(result
            .rows
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|row| text_column(&row.columns, 0))
            .map(|name| Stock {
                symbol: symbol.to_string(),
                name,
            }))
    }

    async fn find_open_position(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<Option<Position>, AppError> {
        // is_open is a regular column; filtering happens client-side.
        let query = Query::new("SELECT user_id, symbol, opened_at, quantity, price, is_open FROM stock_portfolio.positions WHERE user_id = ? AND symbol = ?");
        let result = self
            .session
            .query(query, (user_id, symbol))
            .await
            .map_err(storage)?;
        Ok(rows_to_positions(result.rows.unwrap_or_default())
            .into_iter()
            .find(|p| p.is_open))
    }

    async fn open_positions(&self, user_id: &str) -> Result<Vec<Position>, AppError> {
        let query = Query::new("SELECT user_id, symbol, opened_at, quantity, price, is_open FROM stock_portfolio.positions WHERE user_id = ?");
        let result = self
            .session
            .query(query, (user_id,))
            .await
            .map_err(storage)?;
        Ok(rows_to_positions(result.rows.unwrap_or_default())
            .into_iter()
            .filter(|p| p.is_open)
            .collect())
    }

    async fn save_position(&self, position: &Position) -> Result<(), AppError> {
        let query = Query::new("INSERT INTO stock_portfolio.positions (user_id, symbol, opened_at, quantity, price, is_open) VALUES (?, ?, ?, ?, ?, ?)");
        self.session
            .query(
                query,
                (
                    position.user_id.as_str(),
                    position.symbol.as_str(),
                    position.opened_at.timestamp_millis(),
                    position.quantity,
                    position.price.to_string(),
                    position.is_open,
                ),
            )
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), AppError> {
        let query = Query::new("INSERT INTO stock_portfolio.transactions (user_id, executed_at, side, symbol, quantity, price) VALUES (?, ?, ?, ?, ?, ?)");
        self.session
            .query(
                query,
                (
                    transaction.user_id.as_str(),
                    transaction.executed_at.timestamp_millis(),
                    transaction.side.as_str(),
                    transaction.symbol.as_str(),
                    transaction.quantity,
                    transaction.price.to_string(),
                ),
            )
            .await
            .map_err(storage)?;
        Ok(())
    }
}
