// src/portfolio.rs
use log::warn;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::AppError;
use crate::market::CATEGORIES;
use crate::models::Quote;
use crate::store::PortfolioStore;

/// One open position, priced for display.
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: Decimal,
    /// quantity x current price when quoted, entry price otherwise.
    pub value: Decimal,
    /// Unrealized; zero without a current quote.
    pub profit_loss: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub balance: Decimal,
    pub positions: Vec<PositionView>,
    pub profit_loss: Decimal,
}

/// Everything the display endpoint returns in one response.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub balance: Decimal,
    pub positions: Vec<PositionView>,
    pub profit_loss: Decimal,
    pub markets: Vec<Quote>,
    pub selected_category: String,
    pub categories: Vec<&'static str>,
    pub notices: Vec<String>,
}

/// Price the open positions against current quotes.
pub async fn summarize(
    store: &dyn PortfolioStore,
    user_id: &str,
    quotes: &[Quote],
) -> Result<PortfolioSummary, AppError> {
    let portfolio = store.get_portfolio(user_id).await?;
    let open = store.open_positions(user_id).await?;

    let current: HashMap<&str, Decimal> = quotes
        .iter()
        .filter_map(|q| Decimal::from_f64(q.price).map(|p| (q.symbol.as_str(), p)))
        .collect();

    let mut positions = Vec::with_capacity(open.len());
    let mut profit_loss = Decimal::ZERO;
    for position in &open {
        let quantity = Decimal::from(position.quantity);
        let (value, pnl) = match current.get(position.symbol.as_str()) {
            Some(&price) => (quantity * price, quantity * (price - position.price)),
            None => (quantity * position.price, Decimal::ZERO),
        };
        profit_loss += pnl;
        positions.push(PositionView {
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            entry_price: position.price,
            value,
            profit_loss: pnl,
        });
    }

    Ok(PortfolioSummary {
        balance: portfolio.balance,
        positions,
        profit_loss,
    })
}

/// Assemble the display response. Neither a missing portfolio nor a
/// quote-provider outage escapes this path; both degrade to an empty
/// section plus a notice.
pub async fn dashboard(
    store: &dyn PortfolioStore,
    user_id: &str,
    category: &str,
    market: Result<Vec<Quote>, AppError>,
) -> Dashboard {
    let mut notices = Vec::new();

    let quotes = match market {
        Ok(quotes) => quotes,
        Err(e) => {
            warn!("Market data unavailable for {}: {}", category, e);
            notices.push(e.to_string());
            Vec::new()
        }
    };

    let summary = match summarize(store, user_id, &quotes).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Portfolio summary failed for {}: {}", user_id, e);
            notices.push(e.to_string());
            PortfolioSummary {
                balance: Decimal::ZERO,
                positions: Vec::new(),
                profit_loss: Decimal::ZERO,
            }
        }
    };

    Dashboard {
        balance: summary.balance,
        positions: summary.positions,
        profit_loss: summary.profit_loss,
        markets: quotes,
        selected_category: category.to_string(),
        categories: CATEGORIES.to_vec(),
        notices,
    }
}
