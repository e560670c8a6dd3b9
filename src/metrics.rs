use super::error::Error;
use enum_dispatch::enum_dispatch;
use opentelemetry::runtime;
use opentelemetry_otlp::{ExportConfig, Protocol, WithExportConfig};
use opentelemetry_sdk::metrics::MeterProvider;
use serde::Deserialize;
use std::time::Duration;

pub mod instrument {
    pub const INGESTED_ROWS: &str = "ingested_rows";
    pub const STORE_LOAD_DURATION: &str = "store_load_duration";
    pub const REQUEST_COUNT: &str = "request_count";
    pub const REQUEST_FAILED: &str = "request_failed";
    pub const REQUEST_DURATION: &str = "request_duration";
}

pub mod unit {
    pub const SECONDS: &str = "seconds";
    pub const REQUEST: &str = "request";
    pub const ROW: &str = "row";
}

pub mod metadata {
    pub const ENDPOINT: &str = "endpoint";
    pub const OUTCOME: &str = "outcome";
    pub const STATUS: &str = "status";
}

pub const EXPORTER_DEFAULT_INTERVAL: u64 = 15;
pub const EXPORTER_DEFAULT_ENDPOINT: &str = "http://localhost:4317";

#[enum_dispatch]
pub trait MetricsExporterBuilder {
    fn build(&self) -> Result<MeterProvider, Error>;
}

#[derive(Clone, Debug, Deserialize)]
pub struct OtlpConfig {
    pub period: Duration,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            period: Duration::new(EXPORTER_DEFAULT_INTERVAL, 0),
            endpoint: None,
        }
    }
}

impl MetricsExporterBuilder for OtlpConfig {
    fn build(&self) -> Result<MeterProvider, Error> {
        let endpoint = self
            .clone()
            .endpoint
            .unwrap_or_else(|| String::from(EXPORTER_DEFAULT_ENDPOINT));
        log::info!("Export metrics to {}", endpoint);

        let exporter_config = ExportConfig {
            endpoint,
            protocol: Protocol::Grpc,
            ..ExportConfig::default()
        };

        Ok(opentelemetry_otlp::new_pipeline()
            .metrics(runtime::Tokio)
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_export_config(exporter_config),
            )
            .with_period(self.period)
            .build()?)
    }
}

/// Provider without any reader, measurements are dropped
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NoopConfig {}

impl MetricsExporterBuilder for NoopConfig {
    fn build(&self) -> Result<MeterProvider, Error> {
        Ok(MeterProvider::builder().build())
    }
}

#[enum_dispatch(MetricsExporterBuilder)]
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum MetricsConfig {
    #[serde(rename = "otlp")]
    Otlp(OtlpConfig),
    #[serde(rename = "noop")]
    Noop(NoopConfig),
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig::Noop(NoopConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case::noop(r#"{"type": "noop"}"#, false)]
    #[case::otlp(
        r#"{"type": "otlp", "period": {"secs": 30, "nanos": 0}, "endpoint": "http://collector:4317"}"#,
        true
    )]
    fn test_metrics_config(#[case] content: &str, #[case] otlp: bool) {
        let config: MetricsConfig = serde_json::from_str(content).unwrap();
        assert_eq!(matches!(config, MetricsConfig::Otlp(_)), otlp);
    }

    #[rstest]
    fn test_default_is_noop() {
        let config = MetricsConfig::default();
        assert!(matches!(config, MetricsConfig::Noop(_)));
        assert!(config.build().is_ok());
    }
}
