// src/error.rs
use rust_decimal::Decimal;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Everything the trade and display paths can report to a caller.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("User portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Unknown instrument: {0}")]
    UnknownSymbol(String),

    #[error("No position found for selling {0}")]
    NoOpenPosition(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid transaction type: {0}")]
    InvalidSide(String),

    #[error("Insufficient funds to complete the purchase: cost {cost} exceeds balance {balance}")]
    InsufficientFunds { cost: Decimal, balance: Decimal },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Error retrieving market data: {0}")]
    MarketData(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::PortfolioNotFound(_)
            | AppError::UnknownSymbol(_)
            | AppError::NoOpenPosition(_) => StatusCode::NOT_FOUND,
            AppError::InvalidQuantity(_)
            | AppError::InvalidPrice(_)
            | AppError::InvalidSide(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MarketData(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl Reject for AppError {}
