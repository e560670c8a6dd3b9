#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Source file missing or malformed at cold start
    #[error("Ingestion failed: {0}")]
    Ingestion(String),
    /// Range query without any candle to aggregate
    #[error("Empty range: {0}")]
    EmptyRange(String),
    /// Query parameter that cannot be parsed
    #[error("Invalid parameter: {0}")]
    Parse(String),
    /// Durable store cannot be read
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// Error returned when reading the configuration
    #[error("Failed to build config: {0}")]
    Config(String),
    #[error("Csv failed: {}", .source)]
    Csv {
        #[from]
        source: csv::Error,
    },
    #[error("Arrow failed: {}", .source)]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },
    #[error("IO failure: {}", .source)]
    IO {
        #[from]
        source: std::io::Error,
    },
    #[error("Serde failed: {}", .source)]
    SerdeJson {
        #[from]
        source: serde_json::Error,
    },
    #[error("Deserilaze failed: {}", .source)]
    SerdeYaml {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("Failed to init indicator: {}", .source)]
    Yata {
        #[from]
        source: yata::core::Error,
    },
    /// Error return by the crate opentelemetry
    #[error("Metrics failed: {}", .source)]
    OpenTelemetry {
        #[from]
        source: opentelemetry::metrics::MetricsError,
    },
    #[error("Blocking task failed: {}", .source)]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Failed to parse address: {}", .source)]
    Address {
        #[from]
        source: std::net::AddrParseError,
    },
}

impl Error {
    /// Client side errors are caused by the request parameters
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::EmptyRange(_) | Error::Parse(_))
    }
}
