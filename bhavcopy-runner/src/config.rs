//! TOML configuration.
//!
//! Every field has a default, so a missing file means "use defaults":
//!
//! ```toml
//! [source]
//! cutover = "2024-07-08"
//! timeout_secs = 30
//!
//! [output]
//! dir = "~/data/nse_bhav"
//!
//! [store]
//! path = "~/data/nse_bhav/bhav_copy.duckdb"
//! load_timeout_secs = 300
//! ```

use bhavcopy_core::{SchemaVariant, SourceConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `[store] path`.
pub const STORE_PATH_ENV: &str = "BHAVCOPY_DB";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "~/data/nse_bhav".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub load_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "~/data/nse_bhav/bhav_copy.duckdb".to_string(),
            load_timeout_secs: 300,
        }
    }
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// The file at `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let templates = [
            (SchemaVariant::Legacy, "source.legacy_url", &self.source.legacy_url),
            (SchemaVariant::Unified, "source.unified_url", &self.source.unified_url),
        ];
        for (variant, key, template) in templates {
            for placeholder in variant.required_placeholders() {
                if !template.contains(placeholder) {
                    return Err(ConfigError::Invalid(format!(
                        "{key} must contain the {placeholder} placeholder"
                    )));
                }
            }
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "source.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.store.load_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "store.load_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.output.dir.trim().is_empty() {
            return Err(ConfigError::Invalid("output.dir must not be empty".into()));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_tilde(&self.output.dir)
    }

    /// Store path with precedence: explicit flag, then `BHAVCOPY_DB`, then config.
    pub fn store_path(&self, flag: Option<&Path>) -> PathBuf {
        self.resolve_store_path(flag, std::env::var(STORE_PATH_ENV).ok())
    }

    fn resolve_store_path(&self, flag: Option<&Path>, env: Option<String>) -> PathBuf {
        if let Some(p) = flag {
            return p.to_path_buf();
        }
        match env.filter(|v| !v.trim().is_empty()) {
            Some(v) => expand_tilde(&v),
            None => expand_tilde(&self.store.path),
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.store.load_timeout_secs)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
