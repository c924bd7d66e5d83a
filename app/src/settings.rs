use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File, FileSourceFile, FileFormat};
use infrastructure::{HttpClientConfig, HttpServerConfig, MonitoringConfig};
use serde::Deserialize;

use crate::station::{StationSettings, validate_scan_interval};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub monitoring: MonitoringConfig,
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub http_client: HttpClientConfig,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub stations: Vec<StationSettings>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(File::with_name("config.toml"))
    }

    fn load(file: File<FileSourceFile, FileFormat>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(file)
            .add_source(Environment::default().separator("_").list_separator(","));

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        for station in self.stations.iter_mut() {
            station.host = station.host.trim().to_owned();

            if station.host.is_empty() {
                return Err(ConfigError::Message("Station host must not be empty".to_owned()));
            }

            validate_scan_interval(station.scan_interval).map_err(|e| {
                ConfigError::Message(format!("Invalid configuration of station {}: {}", station.host, e.message()))
            })?;
        }

        Ok(())
    }
}
