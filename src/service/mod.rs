//! Read-only queries over the candle series
//!
//! The service validates the raw query parameters, delegates to the store and
//! the technical analysis functions, then shapes the results into response
//! bodies. Failures are translated into a [`QueryError`].

mod response;

pub use response::{CandleResponse, FibResponse, HealthResponse, IndicatorResponse, QueryError};

#[cfg(test)]
pub use response::{ErrorResponse, FibLevelResponse};

use chrono::NaiveDateTime;
use opentelemetry::{
    metrics::{Counter, Meter, ObservableGauge, Unit},
    KeyValue,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::{task, time::Instant};

use crate::{
    error::Error,
    metrics::{instrument, metadata, unit},
    store::CandleStore,
    technical_analysis::{compute_all, levels, range_extrema},
    utils::serde::{parse_query_datetime, QUERY_DATETIME_FORMAT},
};

const DEFAULT_CANDLE_LIMIT: usize = 500;

fn default_limit() -> usize {
    DEFAULT_CANDLE_LIMIT
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueryConfig {
    /// Number of candles returned when the request has no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_CANDLE_LIMIT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::AsRefStr)]
pub enum Endpoint {
    #[strum(serialize = "candles")]
    Candles,
    #[strum(serialize = "indicators")]
    Indicators,
    #[strum(serialize = "fib")]
    Fib,
    #[strum(serialize = "health")]
    Health,
}

pub trait QueryMeter {
    fn record(&self, endpoint: Endpoint, seconds: f64, failure: Option<&QueryError>);
}

#[derive(Clone)]
pub struct QueryMetrics {
    /// Count received queries
    request_count: Counter<u64>,
    /// Count failed queries
    request_failed: Counter<u64>,
    /// Duration of the last query
    request_duration: ObservableGauge<f64>,
}

impl QueryMetrics {
    pub fn try_new(meter: Arc<Meter>) -> Result<Self, Error> {
        Ok(Self {
            request_count: meter
                .u64_counter(instrument::REQUEST_COUNT)
                .with_unit(Unit::new(unit::REQUEST))
                .try_init()?,
            request_failed: meter
                .u64_counter(instrument::REQUEST_FAILED)
                .with_unit(Unit::new(unit::REQUEST))
                .try_init()?,
            request_duration: meter
                .f64_observable_gauge(instrument::REQUEST_DURATION)
                .with_unit(Unit::new(unit::SECONDS))
                .try_init()?,
        })
    }
}

impl QueryMeter for QueryMetrics {
    fn record(&self, endpoint: Endpoint, seconds: f64, failure: Option<&QueryError>) {
        let attributes = [KeyValue::new(metadata::ENDPOINT, endpoint.as_ref().to_string())];

        self.request_count.add(1, &attributes);
        self.request_duration.observe(seconds, &attributes);

        if let Some(error) = failure {
            self.request_failed.add(
                1,
                &[
                    KeyValue::new(metadata::ENDPOINT, endpoint.as_ref().to_string()),
                    KeyValue::new(metadata::STATUS, i64::from(error.status.as_u16())),
                ],
            );
        }
    }
}

/// Parse the `limit` parameter of the candle endpoint
fn parse_limit(limit: Option<&str>, default: usize) -> Result<usize, Error> {
    match limit {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(limit) if limit > 0 => Ok(limit),
            _ => Err(Error::Parse(format!(
                "limit must be a positive integer, got {:?}",
                raw
            ))),
        },
    }
}

fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<NaiveDateTime>, Error> {
    raw.map(|value| {
        parse_query_datetime(value).map_err(|error| {
            Error::Parse(format!(
                "{} must match {}, got {:?}: {}",
                name, QUERY_DATETIME_FORMAT, value, error
            ))
        })
    })
    .transpose()
}

pub struct QueryService {
    store: Arc<CandleStore>,
    config: QueryConfig,
    metrics: Box<dyn QueryMeter + Send + Sync>,
}

impl QueryService {
    pub fn try_new(
        store: Arc<CandleStore>,
        config: QueryConfig,
        meter: Arc<Meter>,
    ) -> Result<Self, Error> {
        Ok(Self {
            store,
            config,
            metrics: Box::new(QueryMetrics::try_new(meter)?),
        })
    }

    fn observe<T>(
        &self,
        endpoint: Endpoint,
        start: Instant,
        result: Result<T, Error>,
    ) -> Result<T, QueryError> {
        let result = result.map_err(QueryError::from);
        self.metrics.record(
            endpoint,
            start.elapsed().as_secs_f64(),
            result.as_ref().err(),
        );
        result
    }

    /// Most recent candles, ascending
    pub async fn get_candles(
        &self,
        limit: Option<&str>,
    ) -> Result<Vec<CandleResponse>, QueryError> {
        let start = Instant::now();
        let result: Result<Vec<CandleResponse>, Error> = async {
            let limit = parse_limit(limit, self.config.default_limit)?;
            let candles = self.store.scan(Some(limit)).await?;
            Ok(candles.into_iter().map(CandleResponse::from).collect())
        }
        .await;

        self.observe(Endpoint::Candles, start, result)
    }

    /// Indicators over the whole series, one row per candle
    pub async fn get_indicators(&self) -> Result<Vec<IndicatorResponse>, QueryError> {
        let start = Instant::now();
        let result: Result<Vec<IndicatorResponse>, Error> = async {
            let series = self.store.ensure_loaded().await?;
            let rows = task::spawn_blocking(move || compute_all(series.iter())).await??;
            Ok(rows.into_iter().map(IndicatorResponse::from).collect())
        }
        .await;

        self.observe(Endpoint::Indicators, start, result)
    }

    /// Retracement levels over the inclusive `[start, end]` window
    pub async fn get_fib(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<FibResponse, QueryError> {
        let started = Instant::now();
        let result: Result<FibResponse, Error> = async {
            let start = parse_bound("start", start)?;
            let end = parse_bound("end", end)?;

            let series = self.store.ensure_loaded().await?;
            let extrema = range_extrema(&series, start, end)?;
            Ok(FibResponse::from(levels(extrema.low, extrema.high)))
        }
        .await;

        self.observe(Endpoint::Fib, started, result)
    }

    pub async fn health(&self) -> Result<HealthResponse, QueryError> {
        let start = Instant::now();
        let result = self
            .store
            .ensure_loaded()
            .await
            .map(|series| HealthResponse {
                status: "ok".to_string(),
                candles: series.len(),
            });

        self.observe(Endpoint::Health, start, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metrics::{MetricsConfig, MetricsExporterBuilder},
        store::StoreConfig,
    };
    use axum::http::StatusCode;
    use chrono::Duration;
    use opentelemetry::{global, metrics::MeterProvider};
    use rstest::*;
    use std::{fmt::Write as _, fs, path::Path};
    use tempfile::TempDir;

    fn write_source(path: &Path, rows: usize) {
        let start: NaiveDateTime = "2024-01-01T00:00:00".parse().unwrap();
        let mut content = String::from("timestamp,open,high,low,close,volume\n");
        for i in 0..rows {
            let close = 100.0 + (i % 7) as f64 - (i % 3) as f64;
            writeln!(
                content,
                "{},{},{},{},{},{}",
                (start + Duration::minutes(i as i64)).format("%Y-%m-%d %H:%M:%S"),
                close - 0.5,
                close + 1.0,
                close - 1.0,
                close,
                10 * i
            )
            .unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn service_for(dir: &TempDir, content: Option<&str>, rows: usize) -> QueryService {
        let source = dir.path().join("stocks.csv");
        match content {
            Some(content) => fs::write(&source, content).unwrap(),
            None => write_source(&source, rows),
        }
        let config = StoreConfig {
            source,
            path: dir.path().join("candles.arrow"),
            ..StoreConfig::default()
        };
        let meter = Arc::new(global::meter("chart-engine-test"));
        let store = Arc::new(CandleStore::try_new(config, meter.clone()).unwrap());
        QueryService::try_new(
            store,
            QueryConfig {
                default_limit: 500,
            },
            meter,
        )
        .unwrap()
    }

    #[rstest]
    fn test_metrics_from_sdk_provider() {
        let provider = MetricsConfig::default().build().unwrap();
        let meter = Arc::new(provider.meter("chart-engine-test"));

        let metrics = QueryMetrics::try_new(meter).unwrap();
        let error = QueryError::from(Error::Parse("limit".to_string()));
        metrics.record(Endpoint::Candles, 0.5, None);
        metrics.record(Endpoint::Fib, 0.1, Some(&error));
    }

    #[rstest]
    #[case::default(None, 500)]
    #[case::explicit(Some("10"), 10)]
    #[case::padded(Some(" 25 "), 25)]
    #[case::larger(Some("100000"), 600)]
    #[tokio::test]
    async fn test_get_candles(#[case] limit: Option<&str>, #[case] expected: usize) {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(&dir, None, 600);

        let candles = service.get_candles(limit).await.unwrap();
        assert_eq!(candles.len(), expected);
        assert!(candles
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
        // the tail is returned
        assert_eq!(
            candles.last().unwrap().timestamp,
            "2024-01-01T09:59:00".parse::<NaiveDateTime>().unwrap()
        );
    }

    #[rstest]
    #[case::zero("0")]
    #[case::negative("-3")]
    #[case::text("ten")]
    #[case::empty("")]
    #[tokio::test]
    async fn test_invalid_limit(#[case] limit: &str) {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(&dir, None, 20);

        let error = service.get_candles(Some(limit)).await.unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_indicators() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(&dir, None, 40);

        let rows = service.get_indicators().await.unwrap();
        let candles = service.get_candles(Some("40")).await.unwrap();

        assert_eq!(rows.len(), candles.len());
        for (row, candle) in rows.iter().zip(candles.iter()) {
            assert_eq!(row.timestamp, candle.timestamp);
        }
        assert_eq!(rows[0].ema_14, candles[0].close);
        assert!(rows[..13].iter().all(|r| r.sma_14.is_none() && r.rsi_14.is_none()));
        assert!(rows[13..].iter().all(|r| r.sma_14.is_some() && r.rsi_14.is_some()));
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_fib_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(
            &dir,
            Some(
                "timestamp,open,high,low,close,volume\n\
                 2024-01-01 00:00:00,10,12,9,11,100\n\
                 2024-01-01 00:01:00,11,13,10,12,200\n\
                 2024-01-01 00:02:00,12,11,9,10,300\n",
            ),
            0,
        );

        let fib = service
            .get_fib(Some("2024-01-01 00:00:00"), Some("2024-01-01 00:02:00"))
            .await
            .unwrap();

        assert_eq!(fib.low, 9.0);
        assert_eq!(fib.high, 13.0);
        assert_eq!(fib.levels.len(), 7);
        assert_eq!(fib.levels[0], FibLevelResponse { ratio: 0.0, value: 13.0 });
        assert_eq!(fib.levels[6], FibLevelResponse { ratio: 1.0, value: 9.0 });
    }

    #[rstest]
    #[case::reversed(Some("2024-01-01 00:30:00"), Some("2024-01-01 00:10:00"))]
    #[case::outside(Some("2030-01-01 00:00:00"), None)]
    #[case::bad_start(Some("yesterday"), None)]
    #[case::bad_end(None, Some("2024-01-01T00:10:00"))]
    #[case::date_only(Some("2024-01-01"), None)]
    #[tokio::test]
    async fn test_get_fib_rejected(#[case] start: Option<&str>, #[case] end: Option<&str>) {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(&dir, None, 60);

        let error = service.get_fib(start, end).await.unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(&dir, Some("timestamp,open,high,low,close,volume\n"), 0);

        let error = service.get_candles(None).await.unwrap_err();
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);

        let error = service.health().await.unwrap_err();
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[rstest]
    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(&dir, None, 12);

        let health = service.health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.candles, 12);
    }
}
