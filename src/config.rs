use crate::client::DatabaseClient;
use crate::core::db::ConnectOptions;
use crate::core::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

/// Connection settings.
///
/// `backend` stays a plain string so that an unknown engine is reported as a
/// configuration error when connecting, like any other constructor call.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    pub backend: String,
    #[serde(flatten)]
    pub options: ConnectOptions,
}

impl Config {
    /// Opens a client from these settings.
    pub fn connect(&self) -> Result<DatabaseClient> {
        DatabaseClient::new(&self.database.backend, self.database.options.clone())
    }
}

/// Default location of the configuration file, e.g.
/// `~/.config/dbclient/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dbclient").join("config.toml"))
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = dbclient::config::load_config("config.toml").expect("Failed to load config");
/// let client = config.connect().expect("Failed to connect");
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
