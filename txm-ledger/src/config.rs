//! Ledger configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use txm_core::{HashAlgorithm, OddNodePolicy};

use crate::{LedgerError, Result};

/// Environment variable overriding `storage.path`
pub const STORAGE_DIR_ENV: &str = "TXM_STORAGE_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tree construction parameters
    #[serde(default)]
    pub tree: TreeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the sled database
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Hash function for leaves and internal nodes
    #[serde(default)]
    pub hash: HashAlgorithm,

    /// Handling of the unpaired node on odd-width levels
    #[serde(default)]
    pub odd_node_policy: OddNodePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".txm"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level> {
        self.level
            .parse()
            .map_err(|_| LedgerError::Config(format!("unknown log level '{}'", self.level)))
    }
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut config: LedgerConfig = toml::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.apply_env();
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            Ok(config)
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| LedgerError::Config(format!("Failed to encode config: {}", e)))?;
        std::fs::write(path, contents)
            .map_err(|e| LedgerError::Config(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(STORAGE_DIR_ENV) {
            self.storage.path = PathBuf::from(dir);
        }
    }
}
