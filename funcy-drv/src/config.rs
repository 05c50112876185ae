//! Driver-level configuration (§10): an optional `funcy.toml` in the current
//! directory tweaks a handful of cosmetic knobs. Absence of the file is not
//! an error — every field defaults to something reasonable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Name of the config file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "funcy.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Colorize diagnostics written to stderr.
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self { color: true }
    }
}

impl Config {
    /// Look for `funcy.toml` in the current directory, falling back to
    /// defaults if it isn't there.
    pub fn load() -> Result<Self, DriverError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DriverError::Config(e.to_string()))?;
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_sensible_values() {
        let config = Config::default();
        assert!(config.color);
    }

    #[test]
    fn load_from_path_reads_overrides_and_fills_the_rest_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("funcy.toml");
        std::fs::write(&path, "color = false\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert!(!config.color);
    }

    #[test]
    fn load_from_path_rejects_a_missing_file() {
        let result = Config::load_from_path(Path::new("/nonexistent/funcy.toml"));
        assert!(result.is_err());
    }
}
