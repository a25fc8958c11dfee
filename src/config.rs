//! Server configuration
//!
//! Settings come from an optional JSON file; any field missing from the file
//! keeps its default. Command-line flags are applied on top by the server
//! binary.

use crate::error::{CellStoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// cellstore server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_connections: usize,
    /// Run the background task that reclaims expired keys nobody reads
    pub active_expiry: bool,
    /// `tracing` filter directive, e.g. `info` or `cellstore=debug`
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6379".to_string(),
            max_connections: 1000,
            active_expiry: true,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            CellStoreError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: ServerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(CellStoreError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.bind_addr.is_empty() {
            return Err(CellStoreError::Config("bind_addr is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(r#"{ "bind_addr": "0.0.0.0:7000", "active_expiry": false }"#);
        let config = ServerConfig::load(file.path()).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:7000");
        assert!(!config.active_expiry);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let file = write_config(r#"{ "wal_path": "vault.log" }"#);
        assert!(matches!(
            ServerConfig::load(file.path()),
            Err(CellStoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_zero_connections_is_invalid() {
        let file = write_config(r#"{ "max_connections": 0 }"#);
        assert!(matches!(
            ServerConfig::load(file.path()),
            Err(CellStoreError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ServerConfig::load("/definitely/not/here.json"),
            Err(CellStoreError::Config(_))
        ));
    }
}
