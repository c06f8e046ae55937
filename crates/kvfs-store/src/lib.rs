//! Key-value store adapters for kvfs.
//!
//! Every adapter implements [`Store`]: `get`, `put`, `delete`,
//! `delete_tree` and `list` over opaque string keys, plus an optional
//! atomic `move_key` advertised through [`StoreCapabilities`].
//!
//! The adapter is chosen once at startup by [`open_store`] and handed to the
//! filesystem layer as an `Arc<dyn Store>`.

mod error;
mod memory;
mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "etcd")]
mod etcd;

use std::sync::Arc;

use kvfs_config::{MountConfig, StoreKind};
use tracing::info;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::{KvPair, Store, StoreCapabilities};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "etcd")]
pub use etcd::EtcdStore;

/// Construct the store selected by `config.store`.
pub async fn open_store(config: &MountConfig) -> Result<Arc<dyn Store>, StoreError> {
    let kind = config
        .store
        .ok_or_else(|| StoreError::Other("no store configured".to_string()))?;
    info!(store = %kind, addrs = ?config.addrs, "opening store");

    match kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::Sqlite => open_sqlite(config),
        StoreKind::Etcd => open_etcd(config).await,
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &MountConfig) -> Result<Arc<dyn Store>, StoreError> {
    let path = config
        .addrs
        .first()
        .ok_or_else(|| StoreError::Other("sqlite store needs a database path".to_string()))?;
    Ok(Arc::new(SqliteStore::open(std::path::Path::new(path))?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &MountConfig) -> Result<Arc<dyn Store>, StoreError> {
    Err(StoreError::Unsupported(
        "kvfs was built without the `sqlite` feature".to_string(),
    ))
}

#[cfg(feature = "etcd")]
async fn open_etcd(config: &MountConfig) -> Result<Arc<dyn Store>, StoreError> {
    let store = EtcdStore::connect(&config.addrs, config.connect_timeout.as_duration()).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "etcd"))]
async fn open_etcd(_config: &MountConfig) -> Result<Arc<dyn Store>, StoreError> {
    Err(StoreError::Unsupported(
        "kvfs was built without the `etcd` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store() {
        let config = MountConfig {
            store: Some(StoreKind::Memory),
            ..Default::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn test_open_without_store_kind() {
        let config = MountConfig::default();
        assert!(matches!(
            open_store(&config).await,
            Err(StoreError::Other(_))
        ));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_open_sqlite_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = MountConfig {
            store: Some(StoreKind::Sqlite),
            addrs: vec![dir.path().join("kv.db").to_string_lossy().into_owned()],
            ..Default::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        store.put("k", b"v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().value, b"v");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_open_sqlite_without_path() {
        let config = MountConfig {
            store: Some(StoreKind::Sqlite),
            ..Default::default()
        };
        assert!(open_store(&config).await.is_err());
    }

    #[cfg(not(feature = "etcd"))]
    #[tokio::test]
    async fn test_open_etcd_without_feature() {
        let config = MountConfig {
            store: Some(StoreKind::Etcd),
            addrs: vec!["http://127.0.0.1:2379".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            open_store(&config).await,
            Err(StoreError::Unsupported(_))
        ));
    }
}
