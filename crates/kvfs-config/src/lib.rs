mod defaults;
mod env;
pub mod types;
mod validation;

use std::path::Path;

pub use defaults::normalize_root;
pub use types::*;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("Invalid mount point, must set the `--to` flag or `mountpoint`")]
    MissingMountpoint,

    #[error("Error with specified mount point {0}: {1}")]
    InvalidMountpoint(String, String),

    #[error("Must specify a valid KV store, set the `--store` flag or `store`")]
    MissingStore,

    #[error("Need at least one addr to connect to the {0} store")]
    MissingAddr(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MountConfig {
    /// Parse a mount configuration from a YAML string.
    /// Environment variables in the format `${VAR_NAME}` will be interpolated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;
        let config: MountConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a mount configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
mountpoint: /mnt/kv
store: etcd
addrs:
  - http://127.0.0.1:2379
"#;

        let config = MountConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store, Some(StoreKind::Etcd));
        assert_eq!(config.addrs, vec!["http://127.0.0.1:2379"]);
        assert_eq!(config.mountpoint.unwrap().to_str(), Some("/mnt/kv"));
        assert_eq!(config.fsname, "kvfs");
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
mountpoint: /mnt/kv
store: sqlite
addrs: [/var/lib/kvfs/data.db]
root: /apps/demo
debug: true
fsname: demo
allow_other: true
connect_timeout: 750ms
"#;

        let config = MountConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store, Some(StoreKind::Sqlite));
        assert_eq!(config.normalized_root(), "apps/demo/");
        assert!(config.debug);
        assert!(config.allow_other);
        assert_eq!(config.fsname, "demo");
        assert_eq!(config.connect_timeout.as_duration(), Duration::from_millis(750));
    }

    #[test]
    fn test_parse_with_env_vars() {
        std::env::set_var("KVFS_TEST_DB_PATH", "/tmp/test.db");

        let yaml = r#"
store: sqlite
addrs:
  - ${KVFS_TEST_DB_PATH}
"#;

        let config = MountConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.addrs, vec!["/tmp/test.db"]);
    }

    #[test]
    fn test_parse_unknown_store() {
        let result = MountConfig::from_yaml("store: zookeeper\n");
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_parse_without_store() {
        let config = MountConfig::from_yaml("mountpoint: /mnt/kv\n").unwrap();
        assert_eq!(config.store, None);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kvfs.yaml");
        std::fs::write(&path, "store: memory\nroot: scratch\n").unwrap();

        let config = MountConfig::from_file(&path).unwrap();
        assert_eq!(config.store, Some(StoreKind::Memory));
        assert_eq!(config.normalized_root(), "scratch/");
    }
}
