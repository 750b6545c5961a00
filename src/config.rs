use crate::core::{Result, SequelError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Adapter used for connection strings without a `scheme://` prefix.
    pub default_adapter: String,
    pub sqlserver: SqlServerConfig,
    pub sqlite: SqliteConfig,
}

/// SQL Server adapter configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SqlServerConfig {
    /// Database statements are issued from while dropping another database.
    pub safe_database: String,
    pub primary_key_prefix: String,
}

/// SQLite adapter configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub busy_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_adapter: "sqlserver".to_string(),
            sqlserver: SqlServerConfig::default(),
            sqlite: SqliteConfig::default(),
        }
    }
}

impl Default for SqlServerConfig {
    fn default() -> Self {
        SqlServerConfig {
            safe_database: "master".to_string(),
            primary_key_prefix: crate::core::db::DEFAULT_PRIMARY_KEY_PREFIX.to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SequelError::Config(e.to_string()))
    }

    /// Default location: `<config dir>/sequel/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sequel").join("config.toml"))
    }

    /// Loads the file at [`Config::default_path`], or defaults when there
    /// is none.
    pub fn discover() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => load_config(path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Config::default())
            }
        }
    }
}

/// Loads configuration from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    debug!("Loading configuration from {:?}", path.as_ref());
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
default_adapter = "sqlite"

[sqlserver]
safe_database = "tempdb"
primary_key_prefix = "PK__"

[sqlite]
busy_timeout_ms = 250
"#;

    #[test]
    fn test_load_config_from_str() {
        let config = Config::from_toml_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.default_adapter, "sqlite");
        assert_eq!(config.sqlserver.safe_database, "tempdb");
        assert_eq!(config.sqlserver.primary_key_prefix, "PK__");
        assert_eq!(config.sqlite.busy_timeout_ms, Some(250));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sqlserver.safe_database, "master");
        assert_eq!(config.sqlserver.primary_key_prefix, "PK_");
    }

    #[test]
    fn test_invalid_config() {
        let result = Config::from_toml_str("default_adapter = [");
        assert!(matches!(result, Err(SequelError::Config(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.default_adapter, "sqlite");

        let missing = load_config("/nonexistent/sequel/config.toml");
        assert!(matches!(missing, Err(SequelError::Io(_))));
    }
}
