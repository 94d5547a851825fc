// src/trade.rs
use log::info;
use rust_decimal::Decimal;

use crate::error::AppError;
use crate::models::{Portfolio, Position, Side, Transaction};
use crate::store::PortfolioStore;

/// A validated order, ready to execute.
#[derive(Debug, Clone)]
pub struct TradeOrder {
    pub side: Side,
    pub symbol: String,
    pub quantity: i64,
    pub price: Decimal,
}

/// What actually happened, with the quantity after sell clamping.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub side: Side,
    pub symbol: String,
    pub quantity: i64,
    pub message: String,
}

/// Quantities arrive as form strings; only digit strings are accepted.
pub fn parse_quantity(raw: &str) -> Result<i64, AppError> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidQuantity(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| AppError::InvalidQuantity(raw.to_string()))
}

/// Settle one order against the user's portfolio.
///
/// Validation failures report before any write. The writes themselves
/// are sequential saves with no cross-entity transaction; concurrent
/// orders against the same position are not serialized here.
pub async fn execute(
    store: &dyn PortfolioStore,
    user_id: &str,
    order: &TradeOrder,
) -> Result<TradeOutcome, AppError> {
    if order.quantity <= 0 {
        return Err(AppError::InvalidQuantity(order.quantity.to_string()));
    }

    let portfolio = store.get_portfolio(user_id).await?;
    store
        .find_stock(&order.symbol)
        .await?
        .ok_or_else(|| AppError::UnknownSymbol(order.symbol.clone()))?;

    let outcome = match order.side {
        Side::Buy => buy(store, portfolio, order).await?,
        Side::Sell => sell(store, portfolio, order).await?,
    };
    info!(
        "{}: {} {} x{} @ {}",
        user_id,
        outcome.side.as_str(),
        outcome.symbol,
        outcome.quantity,
        order.price
    );
    Ok(outcome)
}

async fn buy(
    store: &dyn PortfolioStore,
    mut portfolio: Portfolio,
    order: &TradeOrder,
) -> Result<TradeOutcome, AppError> {
    let cost = Decimal::from(order.quantity) * order.price;
    if cost > portfolio.balance {
        return Err(AppError::InsufficientFunds {
            cost,
            balance: portfolio.balance,
        });
    }

    let user_id = portfolio.user_id.clone();
    store
        .append_transaction(&Transaction::record(
            &user_id,
            Side::Buy,
            &order.symbol,
            order.quantity,
            order.price,
        ))
        .await?;

    portfolio.balance -= cost;
    store.save_portfolio(&portfolio).await?;

    match store.find_open_position(&user_id, &order.symbol).await? {
        Some(mut position) => {
            // Entry price stays at the first fill; repeated buys are
            // not averaged in.
            position.quantity += order.quantity;
            store.save_position(&position).await?;
        }
        None => {
            store
                .save_position(&Position::open(
                    &user_id,
                    &order.symbol,
                    order.quantity,
                    order.price,
                ))
                .await?;
        }
    }

    Ok(TradeOutcome {
        side: Side::Buy,
        symbol: order.symbol.clone(),
        quantity: order.quantity,
        message: format!(
            "You have bought {} shares of {}.",
            order.quantity, order.symbol
        ),
    })
}

async fn sell(
    store: &dyn PortfolioStore,
    mut portfolio: Portfolio,
    order: &TradeOrder,
) -> Result<TradeOutcome, AppError> {
    let user_id = portfolio.user_id.clone();
    let mut position = store
        .find_open_position(&user_id, &order.symbol)
        .await?
        .ok_or_else(|| AppError::NoOpenPosition(order.symbol.clone()))?;

    // Requests beyond the holding are clamped, not rejected.
    let sold = order.quantity.min(position.quantity);
    position.quantity -= sold;
    if position.quantity == 0 {
        position.is_open = false;
    }
    store.save_position(&position).await?;

    // Credits the sale price; cost basis plays no part here, so no
    // realized P&L is computed.
    portfolio.balance += Decimal::from(sold) * order.price;
    store.save_portfolio(&portfolio).await?;

    store
        .append_transaction(&Transaction::record(
            &user_id,
            Side::Sell,
            &order.symbol,
            sold,
            order.price,
        ))
        .await?;

    Ok(TradeOutcome {
        side: Side::Sell,
        symbol: order.symbol.clone(),
        quantity: sold,
        message: format!("You have sold {} shares of {}.", sold, order.symbol),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    async fn store_with_balance(balance: Decimal) -> MemoryStore {
        let store = MemoryStore::with_default_stocks().await;
        store
            .save_portfolio(&Portfolio {
                user_id: "alice".to_string(),
                balance,
            })
            .await
            .unwrap();
        store
    }

    fn order(side: Side, symbol: &str, quantity: i64, price: Decimal) -> TradeOrder {
        TradeOrder {
            side,
            symbol: symbol.to_string(),
            quantity,
            price,
        }
    }

    #[tokio::test]
    async fn buy_debits_balance_and_opens_position() {
        let store = store_with_balance(dec!(1000)).await;

        let outcome = execute(&store, "alice", &order(Side::Buy, "AAPL", 5, dec!(100)))
            .await
            .unwrap();
        assert_eq!(outcome.quantity, 5);

        let portfolio = store.get_portfolio("alice").await.unwrap();
        assert_eq!(portfolio.balance, dec!(500));

        let position = store
            .find_open_position("alice", "AAPL")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.quantity, 5);
        assert_eq!(position.price, dec!(100));
        assert!(position.is_open);

        let transactions = store.transactions_for("alice").await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].side, Side::Buy);
        assert_eq!(transactions[0].quantity, 5);
    }

    #[tokio::test]
    async fn buy_beyond_balance_is_rejected_without_mutation() {
        let store = store_with_balance(dec!(1000)).await;

        let err = execute(&store, "alice", &order(Side::Buy, "AAPL", 20, dec!(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));

        assert_eq!(store.get_portfolio("alice").await.unwrap().balance, dec!(1000));
        assert!(store.positions_for("alice").await.is_empty());
        assert!(store.transactions_for("alice").await.is_empty());
    }

    #[tokio::test]
    async fn repeated_buy_increments_quantity_and_keeps_entry_price() {
        let store = store_with_balance(dec!(1000)).await;

        execute(&store, "alice", &order(Side::Buy, "AAPL", 2, dec!(100)))
            .await
            .unwrap();
        execute(&store, "alice", &order(Side::Buy, "AAPL", 3, dec!(150)))
            .await
            .unwrap();

        let position = store
            .find_open_position("alice", "AAPL")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.quantity, 5);
        // First fill wins; the 150 buy does not move the entry price.
        assert_eq!(position.price, dec!(100));

        let portfolio = store.get_portfolio("alice").await.unwrap();
        assert_eq!(portfolio.balance, dec!(350));
        assert_eq!(store.transactions_for("alice").await.len(), 2);
    }

    #[tokio::test]
    async fn partial_sell_credits_sale_price_and_stays_open() {
        let store = store_with_balance(dec!(1000)).await;
        execute(&store, "alice", &order(Side::Buy, "AAPL", 5, dec!(100)))
            .await
            .unwrap();

        let outcome = execute(&store, "alice", &order(Side::Sell, "AAPL", 3, dec!(120)))
            .await
            .unwrap();
        assert_eq!(outcome.quantity, 3);

        let portfolio = store.get_portfolio("alice").await.unwrap();
        assert_eq!(portfolio.balance, dec!(860));

        let position = store
            .find_open_position("alice", "AAPL")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.quantity, 2);
        assert!(position.is_open);
    }

    #[tokio::test]
    async fn oversized_sell_is_clamped_and_closes_the_position() {
        let store = store_with_balance(dec!(1000)).await;
        execute(&store, "alice", &order(Side::Buy, "AAPL", 10, dec!(10)))
            .await
            .unwrap();

        let outcome = execute(&store, "alice", &order(Side::Sell, "AAPL", 100, dec!(5)))
            .await
            .unwrap();
        // 100 requested, 10 held: honored as a sell of 10.
        assert_eq!(outcome.quantity, 10);

        let portfolio = store.get_portfolio("alice").await.unwrap();
        assert_eq!(portfolio.balance, dec!(950));

        assert!(store
            .find_open_position("alice", "AAPL")
            .await
            .unwrap()
            .is_none());
        let positions = store.positions_for("alice").await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, 0);
        assert!(!positions[0].is_open);

        let transactions = store.transactions_for("alice").await;
        assert_eq!(transactions[1].side, Side::Sell);
        assert_eq!(transactions[1].quantity, 10);
    }

    #[tokio::test]
    async fn sell_without_open_position_is_rejected() {
        let store = store_with_balance(dec!(1000)).await;

        let err = execute(&store, "alice", &order(Side::Sell, "AAPL", 3, dec!(120)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoOpenPosition(_)));

        assert_eq!(store.get_portfolio("alice").await.unwrap().balance, dec!(1000));
        assert!(store.transactions_for("alice").await.is_empty());
    }

    #[tokio::test]
    async fn unknown_symbol_is_rejected() {
        let store = store_with_balance(dec!(1000)).await;

        let err = execute(&store, "alice", &order(Side::Buy, "ZZZZ", 1, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownSymbol(_)));
        assert!(store.transactions_for("alice").await.is_empty());
    }

    #[tokio::test]
    async fn missing_portfolio_is_rejected() {
        let store = MemoryStore::with_default_stocks().await;

        let err = execute(&store, "nobody", &order(Side::Buy, "AAPL", 1, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PortfolioNotFound(_)));
    }

    #[tokio::test]
    async fn non_positive_quantity_is_rejected() {
        let store = store_with_balance(dec!(1000)).await;

        let err = execute(&store, "alice", &order(Side::Buy, "AAPL", 0, dec!(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidQuantity(_)));
    }

    #[test]
    fn quantity_strings_must_be_digits() {
        assert_eq!(parse_quantity("42").unwrap(), 42);
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("-3").is_err());
        assert!(parse_quantity("3.5").is_err());
    }
}
