use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which key-value store adapter backs the mount.
///
/// There is no default: a mount must name its store explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Process-local map, lost on unmount.
    Memory,
    /// Single-file embedded store.
    Sqlite,
    /// etcd v3 cluster.
    Etcd,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Sqlite => "sqlite",
            StoreKind::Etcd => "etcd",
        }
    }

    /// Whether the store needs at least one `addr` to connect to.
    pub fn needs_addr(&self) -> bool {
        !matches!(self, StoreKind::Memory)
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreKind::Memory),
            "sqlite" | "sqlite3" => Ok(StoreKind::Sqlite),
            "etcd" | "etcdv3" => Ok(StoreKind::Etcd),
            other => Err(format!(
                "unknown store '{}', expected one of: memory, sqlite, etcd",
                other
            )),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable duration (e.g., "200ms", "5s", "1m").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (num_str, scale_ms) = if let Some(n) = s.strip_suffix("ms") {
            (n, 1)
        } else if let Some(n) = s.strip_suffix('s') {
            (n, 1_000)
        } else if let Some(n) = s.strip_suffix('m') {
            (n, 60_000)
        } else if let Some(n) = s.strip_suffix('h') {
            (n, 3_600_000)
        } else {
            return Err(format!("Invalid duration format: {}", s));
        };

        let num: u64 = num_str
            .trim()
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        Ok(HumanDuration(Duration::from_millis(num * scale_ms)))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        if millis % 1000 != 0 {
            write!(f, "{}ms", millis)
        } else {
            write!(f, "{}s", self.0.as_secs())
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Everything needed to mount one store at one path.
///
/// Loaded once at startup (from YAML, flags, or both) and never changed for
/// the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Directory the filesystem is mounted on.
    #[serde(default)]
    pub mountpoint: Option<PathBuf>,
    /// Store adapter to use. Required; `None` fails validation.
    #[serde(default)]
    pub store: Option<StoreKind>,
    /// Store addresses. For sqlite the first entry is the database file.
    #[serde(default)]
    pub addrs: Vec<String>,
    /// Key prefix every path is confined under.
    #[serde(default)]
    pub root: String,
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,
    /// Filesystem name shown in the mount table.
    #[serde(default = "default_fsname")]
    pub fsname: String,
    /// Let users other than the mounter access the mount.
    #[serde(default)]
    pub allow_other: bool,
    /// Upper bound on establishing a store connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
}

pub(crate) fn default_fsname() -> String {
    "kvfs".to_string()
}

pub(crate) fn default_connect_timeout() -> HumanDuration {
    HumanDuration(Duration::from_secs(5))
}

impl Default for MountConfig {
    fn default() -> Self {
        MountConfig {
            mountpoint: None,
            store: None,
            addrs: Vec::new(),
            root: String::new(),
            debug: false,
            fsname: default_fsname(),
            allow_other: false,
            connect_timeout: default_connect_timeout(),
        }
    }
}
