//! Bodies returned by the query endpoints

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use yata::core::OHLCV;

use crate::{
    error::Error,
    technical_analysis::{Candle, FibLevel, FibResult, IndicatorRow},
};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CandleResponse {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<Candle> for CandleResponse {
    fn from(candle: Candle) -> Self {
        Self {
            timestamp: candle.timestamp(),
            open: candle.open(),
            high: candle.high(),
            low: candle.low(),
            close: candle.close(),
            volume: candle.volume(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IndicatorResponse {
    pub timestamp: NaiveDateTime,
    pub sma_14: Option<f64>,
    pub ema_14: f64,
    pub rsi_14: Option<f64>,
}

impl From<IndicatorRow> for IndicatorResponse {
    fn from(row: IndicatorRow) -> Self {
        Self {
            timestamp: row.timestamp,
            sma_14: row.sma_14,
            ema_14: row.ema_14,
            rsi_14: row.rsi_14,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FibLevelResponse {
    pub ratio: f64,
    pub value: f64,
}

impl From<FibLevel> for FibLevelResponse {
    fn from(level: FibLevel) -> Self {
        Self {
            ratio: level.ratio,
            value: level.value,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FibResponse {
    pub low: f64,
    pub high: f64,
    pub levels: Vec<FibLevelResponse>,
}

impl From<FibResult> for FibResponse {
    fn from(result: FibResult) -> Self {
        Self {
            low: result.low,
            high: result.high,
            levels: result.levels.into_iter().map(FibLevelResponse::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub candles: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error as seen by a client: a status code and a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryError {
    pub status: StatusCode,
    pub message: String,
}

impl From<Error> for QueryError {
    fn from(error: Error) -> Self {
        if error.is_client_error() {
            log::debug!("Rejected query: {}", error);
            Self {
                status: StatusCode::BAD_REQUEST,
                message: error.to_string(),
            }
        } else {
            log::error!("Query failed: {}", error);
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: error.to_string(),
            }
        }
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
