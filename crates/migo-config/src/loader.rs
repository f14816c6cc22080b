use std::path::{Path, PathBuf};

use migo_common::{Error, Result};
use tracing::{debug, info};

use crate::model::MigoConfig;

pub const ENV_DATABASE: &str = "MIGO_DATABASE";
pub const ENV_ROOT: &str = "MIGO_ROOT";
pub const ENV_TIMEOUT_SECS: &str = "MIGO_TIMEOUT_SECS";

/// Loads [`MigoConfig`] from a YAML or TOML file and the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read a config file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<MigoConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: MigoConfig = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => return Err(Error::Config(format!("unsupported config extension: {other}"))),
        };

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise start from defaults; then apply the
    /// process environment.
    pub fn load_or_default(path: Option<&Path>) -> Result<MigoConfig> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => MigoConfig::default(),
        };
        Self::apply_env(config, |key| std::env::var(key).ok())
    }

    /// Overlay `MIGO_*` variables looked up through `lookup`.
    pub fn apply_env<F>(mut config: MigoConfig, lookup: F) -> Result<MigoConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE) {
            debug!("{ENV_DATABASE} overrides database path");
            config.database_path = PathBuf::from(db);
        }
        if let Some(root) = lookup(ENV_ROOT) {
            debug!("{ENV_ROOT} overrides migrations root");
            config.migrations_root = PathBuf::from(root);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("invalid {ENV_TIMEOUT_SECS} {secs:?}: {e}")))?;
            config.timeout_secs = Some(secs);
        }
        Ok(config)
    }
}
