//! Resolve the effective mount configuration from file and flags.

use std::path::{Path, PathBuf};

use kvfs_config::{ConfigError, MountConfig, StoreKind};

/// Values given on the command line. `None`/empty means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub mountpoint: Option<PathBuf>,
    pub store: Option<StoreKind>,
    pub addrs: Vec<String>,
    pub root: Option<String>,
    pub debug: bool,
    pub allow_other: bool,
}

/// Locate a configuration file.
///
/// Order: the `KVFS_CONFIG` environment variable, `kvfs.yaml` in the
/// current directory, then `~/.config/kvfs/config.yaml`.
pub fn find_config() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KVFS_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from("kvfs.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/kvfs/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Load `path` if given, else defaults, then apply flag overrides.
pub fn resolve(path: Option<&Path>, flags: &Overrides) -> Result<MountConfig, ConfigError> {
    let base = match path {
        Some(path) => MountConfig::from_file(path)?,
        None => MountConfig::default(),
    };
    Ok(apply(base, flags))
}

fn apply(mut config: MountConfig, flags: &Overrides) -> MountConfig {
    if let Some(mountpoint) = &flags.mountpoint {
        config.mountpoint = Some(mountpoint.clone());
    }
    if let Some(store) = flags.store {
        config.store = Some(store);
    }
    if !flags.addrs.is_empty() {
        config.addrs = flags.addrs.clone();
    }
    if let Some(root) = &flags.root {
        config.root = root.clone();
    }
    config.debug |= flags.debug;
    config.allow_other |= flags.allow_other;
    config
}
