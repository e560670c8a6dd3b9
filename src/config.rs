use serde::Deserialize;
use std::{
    fs::File,
    io::{BufReader, Read},
    net::SocketAddr,
    path::{Path, PathBuf},
};

use crate::{error::Error, metrics::MetricsConfig, service::QueryConfig, store::StoreConfig};

const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_STATIC_DIR: &str = "static";

fn default_bind() -> String {
    String::from(DEFAULT_BIND)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_STATIC_DIR))
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of the chart frontend, nothing is served when unset
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: DEFAULT_PORT,
            static_dir: default_static_dir(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> Result<SocketAddr, Error> {
        Ok(format!("{}:{}", self.bind, self.port).parse()?)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ServiceConfig {
    pub fn try_from(path: &Path) -> Result<Self, Error> {
        log::info!("Read configuration from {}", path.display());

        let file = File::open(path)?;
        let reader: Box<dyn Read> = Box::new(BufReader::new(file));

        let config: ServiceConfig = match path.extension() {
            None => Err(Error::Config(path.display().to_string())),
            Some(os_str) => match os_str.to_str() {
                Some("json") => serde_json::from_reader(reader).map_err(Error::from),
                Some("yaml") | Some("yml") => serde_yaml::from_reader(reader).map_err(Error::from),
                _ => Err(Error::Config("Invalid extension.".to_string())),
            },
        }?;

        Ok(config)
    }
}
