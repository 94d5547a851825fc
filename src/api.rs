// src/api.rs
use log::{error, info};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::{StatusCode, Uri};
use warp::{Filter, Rejection, Reply};

use crate::error::AppError;
use crate::market::{MarketData, CATEGORIES};
use crate::models::{Portfolio, Side};
use crate::portfolio;
use crate::store::PortfolioStore;
use crate::trade::{self, TradeOrder};

/// Cash a freshly created portfolio starts with.
const STARTING_BALANCE: i64 = 50_000;

#[derive(Deserialize)]
struct CreatePortfolio {
    user_id: String,
    balance: Option<Decimal>,
}

#[derive(Deserialize)]
struct DashboardQuery {
    category: Option<String>,
}

/// Trade form as posted by the dashboard.
#[derive(Deserialize)]
struct TradeForm {
    transaction_type: String,
    name: String,
    #[serde(rename = "quantitySelector")]
    quantity: String,
    price: String,
}

pub fn routes(
    store: Arc<dyn PortfolioStore>,
    market: Arc<dyn MarketData>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let create = warp::path!("portfolio")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_store(store.clone()))
        .and_then(create_portfolio_handler);

    let dashboard = warp::path!("portfolio" / String)
        .and(warp::get())
        .and(warp::query::<DashboardQuery>())
        .and(with_store(store.clone()))
        .and(with_market(market))
        .and_then(dashboard_handler);

    let trade = warp::path!("portfolio" / String / "trade")
        .and(warp::post())
        .and(warp::body::form())
        .and(with_store(store))
        .and_then(trade_handler);

    create.or(dashboard).or(trade).recover(handle_rejection)
}

fn with_store(
    store: Arc<dyn PortfolioStore>,
) -> impl Filter<Extract = (Arc<dyn PortfolioStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_market(
    market: Arc<dyn MarketData>,
) -> impl Filter<Extract = (Arc<dyn MarketData>,), Error = Infallible> + Clone {
    warp::any().map(move || market.clone())
}

async fn create_portfolio_handler(
    request: CreatePortfolio,
    store: Arc<dyn PortfolioStore>,
) -> Result<impl Reply, Rejection> {
    let portfolio = Portfolio {
        user_id: request.user_id,
        balance: request.balance.unwrap_or_else(|| Decimal::from(STARTING_BALANCE)),
    };
    match store.save_portfolio(&portfolio).await {
        Ok(()) => {
            info!("Portfolio created for {}.", portfolio.user_id);
            Ok(warp::reply::with_status(
                "Portfolio created",
                StatusCode::CREATED,
            ))
        }
        Err(e) => {
            error!("Failed to create portfolio: {}", e);
            Err(warp::reject::custom(e))
        }
    }
}

/// Display endpoint. Store or quote-provider trouble lands in the
/// response notices instead of failing the request.
async fn dashboard_handler(
    user_id: String,
    query: DashboardQuery,
    store: Arc<dyn PortfolioStore>,
    market: Arc<dyn MarketData>,
) -> Result<impl Reply, Rejection> {
    let category = query
        .category
        .filter(|c| CATEGORIES.contains(&c.as_str()))
        .unwrap_or_else(|| CATEGORIES[0].to_string());

    let market_result = market.fetch(&category).await;
    let view = portfolio::dashboard(store.as_ref(), &user_id, &category, market_result).await;
    Ok(warp::reply::json(&view))
}

async fn trade_handler(
    user_id: String,
    form: TradeForm,
    store: Arc<dyn PortfolioStore>,
) -> Result<impl Reply, Rejection> {
    let order = parse_trade_form(&form).map_err(warp::reject::custom)?;
    match trade::execute(store.as_ref(), &user_id, &order).await {
        Ok(outcome) => {
            info!("{}", outcome.message);
            let uri = format!("/portfolio/{}", user_id)
                .parse::<Uri>()
                .unwrap_or_else(|_| Uri::from_static("/"));
            Ok(warp::redirect::see_other(uri))
        }
        Err(e) => {
            error!("Trade failed for {}: {}", user_id, e);
            Err(warp::reject::custom(e))
        }
    }
}

fn parse_trade_form(form: &TradeForm) -> Result<TradeOrder, AppError> {
    let side = Side::parse(&form.transaction_type)
        .ok_or_else(|| AppError::InvalidSide(form.transaction_type.clone()))?;
    let quantity = trade::parse_quantity(&form.quantity)?;
    let price = form
        .price
        .parse::<Decimal>()
        .map_err(|_| AppError::InvalidPrice(form.price.clone()))?;
    Ok(TradeOrder {
        side,
        symbol: form.name.clone(),
        quantity,
        price,
    })
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(app) = err.find::<AppError>() {
        (app.status(), app.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Malformed request body".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    let body = warp::reply::json(&json!({ "message": message }));
    Ok(warp::reply::with_status(body, status))
}
