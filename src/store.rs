// src/store.rs
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{Portfolio, Position, Stock, Transaction};

/// Instruments seeded into a fresh store. The trade path only ever
/// looks instruments up, it never creates them.
pub const DEFAULT_STOCKS: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("GOOGL", "Alphabet Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("ABNB", "Airbnb Inc."),
    ("ADBE", "Adobe Inc."),
];

/// Repository seam over the portfolio data. One get/find/save set per
/// entity, independent of the storage engine behind it.
///
/// Balance and position writes are separate saves with no rollback; a
/// failure between them leaves the store partially updated.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Fails with `PortfolioNotFound` when the user has no portfolio.
    async fn get_portfolio(&self, user_id: &str) -> Result<Portfolio, AppError>;

    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), AppError>;

    async fn find_stock(&self, symbol: &str) -> Result<Option<Stock>, AppError>;

    /// The single open position for (user, symbol), if any.
    async fn find_open_position(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<Option<Position>, AppError>;

    async fn open_positions(&self, user_id: &str) -> Result<Vec<Position>, AppError>;

    /// Upsert keyed by (user, symbol, opened_at).
    async fn save_position(&self, position: &Position) -> Result<(), AppError>;

    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), AppError>;
}

/// In-memory store. Backs the unit tests and works as a standalone
/// paper-trading backend when no database is around.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    portfolios: HashMap<String, Portfolio>,
    stocks: HashMap<String, Stock>,
    positions: Vec<Position>,
    transactions: Vec<Transaction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub async fn with_default_stocks() -> Self {
        let store = MemoryStore::new();
        for (symbol, name) in DEFAULT_STOCKS {
            store.add_stock(Stock {
                symbol: symbol.to_string(),
                name: name.to_string(),
            })
            .await;
        }
        store
    }

    pub async fn add_stock(&self, stock: Stock) {
        self.inner
            .write()
            .await
            .stocks
            .insert(stock.symbol.clone(), stock);
    }

    /// All positions for a user, closed ones included.
    pub async fn positions_for(&self, user_id: &str) -> Vec<Position> {
        self.inner
            .read()
            .await
            .positions
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn transactions_for(&self, user_id: &str) -> Vec<Transaction> {
        self.inner
            .read()
            .await
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn get_portfolio(&self, user_id: &str) -> Result<Portfolio, AppError> {
        self.inner
            .read()
            .await
            .portfolios
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::PortfolioNotFound(user_id.to_string()))
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .portfolios
            .insert(portfolio.user_id.clone(), portfolio.clone());
        Ok(())
    }

    async fn find_stock(&self, symbol: &str) -> Result<Option<Stock>, AppError> {
        Ok(self.inner.read().await.stocks.get(symbol).cloned())
    }

    async fn find_open_position(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<Option<Position>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .positions
            .iter()
            .find(|p| p.user_id == user_id && p.symbol == symbol && p.is_open)
            .cloned())
    }

    async fn open_positions(&self, user_id: &str) -> Result<Vec<Position>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .positions
            .iter()
            .filter(|p| p.user_id == user_id && p.is_open)
            .cloned()
            .collect())
    }

    async fn save_position(&self, position: &Position) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        match inner.positions.iter_mut().find(|p| {
            p.user_id == position.user_id
                && p.symbol == position.symbol
                && p.opened_at == position.opened_at
        }) {
            Some(existing) => *existing = position.clone(),
            None => inner.positions.push(position.clone()),
        }
        Ok(())
    }

    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .transactions
            .push(transaction.clone());
        Ok(())
    }
}
