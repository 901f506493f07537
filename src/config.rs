use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default number of idle nodes the pool keeps
pub const DEFAULT_POOL_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum idle nodes held by the node pool
    pub pool_capacity: usize,
    /// Nodes allocated into the pool up front
    pub prewarm: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            prewarm: 0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(Error::InvalidConfig("pool_capacity must be greater than 0".to_string()));
        }
        if self.prewarm > self.pool_capacity {
            return Err(Error::InvalidConfig(format!(
                "prewarm ({}) exceeds pool_capacity ({})",
                self.prewarm, self.pool_capacity
            )));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("uastq.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<EngineConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: EngineConfig = toml::from_str(&contents)?;
    config.validate()?;
    tracing::debug!(path = %path.display(), ?config, "loaded engine config");
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &EngineConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (pass force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(&dir.path().join("uastq.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uastq.toml");
        let config = EngineConfig {
            pool_capacity: 128,
            prewarm: 16,
        };

        write_config(&path, &config, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config.clone()));

        // Refuses to overwrite unless forced
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &EngineConfig::default(), true).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(EngineConfig::default()));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uastq.toml");
        std::fs::write(&path, "prewarm = 8\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.pool_capacity, DEFAULT_POOL_CAPACITY);
        assert_eq!(config.prewarm, 8);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig { pool_capacity: 0, prewarm: 0 }.validate().is_err());
        assert!(EngineConfig { pool_capacity: 4, prewarm: 5 }.validate().is_err());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uastq.toml");
        std::fs::write(&path, "pool_capacity = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
