//! Chart engine serves a single OHLCV series to a browser chart
//!
//! * the series is ingested once from a csv file into an Arrow IPC store
//! * indicators (SMA, EMA and RSI over 14 periods) are computed per request
//! * Fibonacci retracements are computed over an arbitrary date window
//!
//! ## Commands
//!
//! * `run` opens (or builds) the store then serves the HTTP api
//! * `ingest` only builds the store
//! * `validate` checks a configuration file

#[macro_use]
extern crate lazy_static;
extern crate log;
extern crate strum_macros;

mod config;
mod error;
mod metrics;
mod routes;
mod service;
mod store;
mod technical_analysis;
mod utils;

use async_trait::async_trait;
use chrono::Local;
use config::ServiceConfig;
use enum_dispatch::enum_dispatch;
use env_logger::Builder;
use error::Error;
use log::LevelFilter;
use metrics::MetricsExporterBuilder;
use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry_sdk::metrics::MeterProvider as SdkMeterProvider;
use service::QueryService;
use std::{borrow::Cow, io::Write, path::PathBuf, sync::Arc};
use store::CandleStore;
use structopt::StructOpt;

const BIND: &str = "BIND";
const LOG_LEVEL: &str = "LOG_LEVEL";
const PORT: &str = "PORT";
const SOURCE_PATH: &str = "SOURCE_PATH";
const STATIC_DIR: &str = "STATIC_DIR";
const STORE_PATH: &str = "STORE_PATH";
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const PKG_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "chart-engine", about = "OHLCV chart backend cli.")]
struct MainCommand {
    #[structopt(
        long = "log-level",
        help = "Minimum level of the logs.",
        env = LOG_LEVEL,
        default_value = "info"
    )]
    pub log_level: LevelFilter,
    #[structopt(subcommand)]
    command: Command,
}

#[async_trait]
#[enum_dispatch]
trait Execute {
    async fn execute(&self) -> Result<(), Error>;
}

#[derive(Clone, Debug, StructOpt)]
#[enum_dispatch(Execute)]
enum Command {
    Run(RunCommand),
    Ingest(IngestCommand),
    Validate(ValidateCommand),
}

/// Options shared by the commands, applied on top of the configuration file
#[derive(Clone, Debug, StructOpt)]
struct ConfigArgs {
    #[structopt(short = "c", long = "config", help = "Path to a json or yaml configuration.")]
    pub configuration_path: Option<PathBuf>,
    #[structopt(long = "bind", env = BIND, help = "Address the server listens on.")]
    pub bind: Option<String>,
    #[structopt(short = "p", long = "port", env = PORT, help = "Port the server listens on.")]
    pub port: Option<u16>,
    #[structopt(long = "source", env = SOURCE_PATH, help = "Csv source of the candles.")]
    pub source: Option<PathBuf>,
    #[structopt(long = "store", env = STORE_PATH, help = "Arrow file of the candle store.")]
    pub store: Option<PathBuf>,
    #[structopt(long = "static-dir", env = STATIC_DIR, help = "Directory of the chart frontend.")]
    pub static_dir: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<ServiceConfig, Error> {
        let mut config = match &self.configuration_path {
            Some(path) => ServiceConfig::try_from(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(source) = &self.source {
            config.store.source = source.clone();
        }
        if let Some(store) = &self.store {
            config.store.path = store.clone();
        }
        if let Some(static_dir) = &self.static_dir {
            config.server.static_dir = Some(static_dir.clone());
        }

        Ok(config)
    }
}

/// The provider must outlive the meter for measurements to be exported
fn build_meter(config: &ServiceConfig) -> Result<(SdkMeterProvider, Arc<Meter>), Error> {
    let provider = config.metrics.build()?;
    let meter = Arc::new(provider.versioned_meter(
        PKG_NAME,
        Some(PKG_VERSION),
        None::<Cow<'static, str>>,
        None,
    ));
    Ok((provider, meter))
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "validate", about = "Validate a configuration.")]
struct ValidateCommand {
    #[structopt(flatten)]
    pub args: ConfigArgs,
    #[structopt(long = "show", help = "Print the resolved configuration.")]
    pub show: bool,
}

#[async_trait]
impl Execute for ValidateCommand {
    async fn execute(&self) -> Result<(), Error> {
        let config = self.args.load()?;
        config.server.address()?;
        if self.show {
            log::info!("{:#?}", config);
        };
        Ok(())
    }
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "ingest", about = "Build the candle store from the csv source.")]
struct IngestCommand {
    #[structopt(flatten)]
    pub args: ConfigArgs,
}

#[async_trait]
impl Execute for IngestCommand {
    async fn execute(&self) -> Result<(), Error> {
        let config = self.args.load()?;
        let (_provider, meter) = build_meter(&config)?;

        let store = CandleStore::try_new(config.store.clone(), meter)?;
        let series = store.ensure_loaded().await?;
        log::info!(
            "Store {} holds {} candles",
            store.config().path.display(),
            series.len()
        );
        Ok(())
    }
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "run", about = "Serve the chart api.")]
struct RunCommand {
    #[structopt(flatten)]
    pub args: ConfigArgs,
}

#[async_trait]
impl Execute for RunCommand {
    async fn execute(&self) -> Result<(), Error> {
        log::info!("Start {}!", PKG_NAME);

        let config = self.args.load()?;
        let address = config.server.address()?;
        let (_provider, meter) = build_meter(&config)?;

        // Load the series before accepting any request
        let store = Arc::new(CandleStore::try_new(config.store.clone(), meter.clone())?);
        let series = store.ensure_loaded().await?;
        log::info!("Series ready with {} candles", series.len());

        let service = Arc::new(QueryService::try_new(store, config.query.clone(), meter)?);
        let app = routes::router(service, config.server.static_dir.as_deref());

        let listener = tokio::net::TcpListener::bind(address).await?;
        log::info!("Listening on http://{}", address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutdown signal received, stopping."),
        Err(error) => {
            log::error!("Failed to listen for the shutdown signal: {}", error);
            std::future::pending::<()>().await
        }
    }
}

#[tokio::main]
async fn run_app() -> Result<(), Error> {
    let opt = MainCommand::from_args();
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .filter(None, opt.log_level)
        .init();
    opt.command.execute().await
}

fn main() {
    std::process::exit(match run_app() {
        Ok(_) => 0,
        Err(err) => {
            log::error!("error: {:?}", err);
            1
        }
    });
}
