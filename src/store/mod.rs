//! Durable candle store, ingested once from the csv source

mod file;
mod schema;
mod series;
mod source;

pub use series::Series;

use file::{read_store, write_store, Publication};
use source::read_source;

use opentelemetry::{
    metrics::{Counter, Meter, ObservableGauge, Unit},
    KeyValue,
};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc};
use tokio::{sync::OnceCell, task, time::Instant};

use crate::{
    error::Error,
    metrics::{instrument, metadata, unit},
    technical_analysis::Candle,
};

const DEFAULT_SOURCE_PATH: &str = "data/stocks.csv";
const DEFAULT_STORE_PATH: &str = "data/candles.arrow";
const DEFAULT_BATCH_SIZE: usize = 65_536;

fn default_source() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_PATH)
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    /// Csv file read when the store does not exist yet
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Arrow IPC file of the store
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Rows per record batch in the store file
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            path: default_path(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// How the series was obtained by [`load_or_open`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum LoadOutcome {
    #[strum(serialize = "opened")]
    Opened,
    #[strum(serialize = "ingested")]
    Ingested(usize),
}

/// Open the store, ingesting the source first if the store is absent.
///
/// This is the only code path writing to disk.
pub fn load_or_open(config: &StoreConfig) -> Result<(Series, LoadOutcome), Error> {
    if config.path.exists() {
        log::info!("Open candle store {}", config.path.display());
        return Ok((read_store(&config.path)?, LoadOutcome::Opened));
    }

    if !config.source.exists() {
        return Err(Error::Ingestion(format!(
            "Neither the store {} nor the source {} exist",
            config.path.display(),
            config.source.display()
        )));
    }

    log::info!(
        "Candle store {} is absent, ingest {}",
        config.path.display(),
        config.source.display()
    );
    let candles = read_source(&config.source)?;
    let series = Series::try_from_candles(&candles)
        .map_err(|error| Error::Ingestion(error.to_string()))?;

    match write_store(&candles, &config.path, config.batch_size)
        .map_err(|error| Error::Ingestion(error.to_string()))?
    {
        Publication::Published => {
            log::info!(
                "Published {} candles to {}",
                series.len(),
                config.path.display()
            );
            Ok((series, LoadOutcome::Ingested(candles.len())))
        }
        Publication::AlreadyExists => {
            log::info!(
                "Store {} was published concurrently, open it",
                config.path.display()
            );
            Ok((read_store(&config.path)?, LoadOutcome::Opened))
        }
    }
}

#[derive(Clone)]
pub struct StoreMetrics {
    /// Count the rows written to the store
    ingested_rows: Counter<u64>,
    /// Duration of the initial load
    load_duration: ObservableGauge<f64>,
}

impl StoreMetrics {
    pub fn try_new(meter: Arc<Meter>) -> Result<Self, Error> {
        Ok(Self {
            ingested_rows: meter
                .u64_counter(instrument::INGESTED_ROWS)
                .with_unit(Unit::new(unit::ROW))
                .try_init()?,
            load_duration: meter
                .f64_observable_gauge(instrument::STORE_LOAD_DURATION)
                .with_unit(Unit::new(unit::SECONDS))
                .try_init()?,
        })
    }

    fn record(&self, outcome: LoadOutcome, seconds: f64) {
        if let LoadOutcome::Ingested(rows) = outcome {
            self.ingested_rows.add(rows as u64, &[]);
        }
        self.load_duration.observe(
            seconds,
            &[KeyValue::new(metadata::OUTCOME, outcome.to_string())],
        );
    }
}

/// Guard around the one time ingestion.
///
/// Concurrent callers of [`CandleStore::ensure_loaded`] share a single load,
/// late arrivers wait for the one in progress. Once loaded the series is
/// immutable and handed out as a shared handle.
pub struct CandleStore {
    config: StoreConfig,
    series: OnceCell<Arc<Series>>,
    metrics: StoreMetrics,
}

impl CandleStore {
    pub fn try_new(config: StoreConfig, meter: Arc<Meter>) -> Result<Self, Error> {
        Ok(Self {
            config,
            series: OnceCell::new(),
            metrics: StoreMetrics::try_new(meter)?,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub async fn ensure_loaded(&self) -> Result<Arc<Series>, Error> {
        let series = self
            .series
            .get_or_try_init(|| async {
                let config = self.config.clone();
                let start = Instant::now();

                let (series, outcome) =
                    task::spawn_blocking(move || load_or_open(&config)).await??;

                self.metrics.record(outcome, start.elapsed().as_secs_f64());
                log::info!("Candle series {} with {} rows", outcome, series.len());
                Ok::<_, Error>(Arc::new(series))
            })
            .await?;

        Ok(series.clone())
    }

    /// Candles in ascending order, the most recent `limit` ones if given
    pub async fn scan(&self, limit: Option<usize>) -> Result<Vec<Candle>, Error> {
        Ok(self.ensure_loaded().await?.scan(limit))
    }
}
