use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Runtime configuration for the `migo` binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MigoConfig {
    /// SQLite database file the migrations are applied to.
    pub database_path: PathBuf,
    /// Directory containing the `migrations/` folder.
    pub migrations_root: PathBuf,
    /// Stop starting new migrations after this many seconds.
    pub timeout_secs: Option<u64>,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for MigoConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("migo.db"),
            migrations_root: PathBuf::from("."),
            timeout_secs: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl MigoConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
