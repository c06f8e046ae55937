//! Filesystem operations over a key-value store.

use std::sync::Arc;

use kvfs_config::{normalize_root, MountConfig};
use kvfs_store::{KvPair, Store, StoreError};
use tracing::{debug, error, info, warn};

use crate::attr::Attributes;
use crate::error::{FsError, FsResult};
use crate::handle::OpenFileHandle;
use crate::path::{split_entry, DirEntry, Keyspace};

/// Filesystem-wide statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsStats {
    /// Number of keys under the queried directory, at any depth.
    pub files: u64,
}

/// The operations invoked once per filesystem request.
///
/// Paths are relative to the mount root; a leading `/` is accepted. Every
/// call is independent: there is no locking, caching, or retrying, and
/// concurrent calls see whatever the store's own consistency gives them.
pub struct KvFs {
    store: Arc<dyn Store>,
    keys: Keyspace,
}

/// Log a failed store call, then classify it.
fn store_failure(op: &'static str, path: &str, err: StoreError) -> FsError {
    if err.is_not_found() {
        debug!(op, path, "not found");
    } else {
        error!(op, path, error = %err, "store call failed");
    }
    FsError::from_store(path, &err)
}

impl KvFs {
    /// Create a filesystem over `store`, confined under `root`.
    ///
    /// `root` is normalized here; pass it as configured.
    pub fn new(store: Arc<dyn Store>, root: &str) -> Self {
        KvFs {
            store,
            keys: Keyspace::new(normalize_root(root)),
        }
    }

    /// Create a filesystem and check that the root prefix can be listed.
    ///
    /// An empty root is fine; any store error other than not-found is not.
    pub async fn connect(store: Arc<dyn Store>, root: &str) -> FsResult<Self> {
        let fs = Self::new(store, root);
        match fs.store.list(fs.keys.root()).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(FsError::Io(format!(
                    "error setting root node {:?}: {}",
                    root, e
                )))
            }
        }
        info!(store = fs.store.name(), root = fs.keys.root(), "filesystem ready");
        Ok(fs)
    }

    /// Build from a mount configuration.
    pub async fn from_config(store: Arc<dyn Store>, config: &MountConfig) -> FsResult<Self> {
        Self::connect(store, &config.root).await
    }

    /// Normalized root prefix.
    pub fn root(&self) -> &str {
        self.keys.root()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Put an empty value at `name` and return a handle on the read-back entry.
    pub async fn create(&self, name: &str) -> FsResult<OpenFileHandle> {
        debug!(name, "create");
        let key = self.keys.key(name);

        self.store
            .put(&key, &[])
            .await
            .map_err(|e| store_failure("create", name, e))?;

        match self.store.get(&key).await {
            Ok(entry) => Ok(OpenFileHandle::new(self.store.clone(), entry)),
            Err(e) if e.is_not_found() => {
                error!(name, key = %key, "created key missing on read-back");
                Err(FsError::Inconsistent(key))
            }
            Err(e) => Err(store_failure("create", name, e)),
        }
    }

    /// Open an existing file.
    pub async fn open(&self, name: &str) -> FsResult<OpenFileHandle> {
        debug!(name, "open");
        let entry = self
            .store
            .get(&self.keys.key(name))
            .await
            .map_err(|e| store_failure("open", name, e))?;
        Ok(OpenFileHandle::new(self.store.clone(), entry))
    }

    /// Direct children of `name`, in key order.
    ///
    /// Any failed listing reports the directory as missing.
    pub async fn open_directory(&self, name: &str) -> FsResult<Vec<DirEntry>> {
        let prefix = self.keys.dir_key(name);
        debug!(name, prefix = %prefix, "open_directory");

        let pairs = match self.store.list(&prefix).await {
            Ok(pairs) => pairs,
            Err(e) if e.is_not_found() && Keyspace::is_root(name) => Vec::new(),
            Err(e) => {
                store_failure("open_directory", name, e);
                return Err(FsError::NotFound(name.to_string()));
            }
        };

        let entries: Vec<DirEntry> = pairs
            .iter()
            .filter_map(|pair| {
                let entry = split_entry(&pair.key, &prefix);
                if entry.is_none() {
                    debug!(key = %pair.key, "skipping non-child key");
                }
                entry
            })
            .collect();
        Ok(entries)
    }

    /// Attributes for `name`, trying the file key first and then its
    /// directory marker.
    pub async fn get_attributes(&self, name: &str) -> FsResult<Attributes> {
        debug!(name, "get_attributes");
        if Keyspace::is_root(name) {
            return Ok(Attributes::directory());
        }

        let entry = self.resolve(name).await?;
        Ok(Attributes::for_entry(&entry))
    }

    async fn resolve(&self, name: &str) -> FsResult<KvPair> {
        match self.store.get(&self.keys.key(name)).await {
            Ok(entry) => Ok(entry),
            Err(e) if e.is_not_found() => self
                .store
                .get(&self.keys.dir_key(name))
                .await
                .map_err(|e| store_failure("get_attributes", name, e)),
            Err(e) => Err(store_failure("get_attributes", name, e)),
        }
    }

    /// Write the directory marker for `name`.
    pub async fn make_directory(&self, name: &str) -> FsResult<()> {
        debug!(name, "make_directory");
        self.store
            .put(&self.keys.dir_key(name), &[])
            .await
            .map_err(|e| store_failure("make_directory", name, e))
    }

    /// Move the value at `old_name` to `new_name`.
    ///
    /// Uses the store's atomic move when it has one. Otherwise this is put
    /// then delete, with a best-effort undo if the delete fails; a crash
    /// between the two steps leaves both keys present.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> FsResult<()> {
        debug!(old_name, new_name, "rename");
        let old_key = self.keys.key(old_name);
        let new_key = self.keys.key(new_name);

        let entry = self
            .store
            .get(&old_key)
            .await
            .map_err(|e| store_failure("rename", old_name, e))?;

        if old_key == new_key {
            return Ok(());
        }

        if self.store.capabilities().atomic_move {
            return self
                .store
                .move_key(&old_key, &new_key)
                .await
                .map_err(|e| store_failure("rename", old_name, e));
        }

        let previous = match self.store.get(&new_key).await {
            Ok(existing) => Some(existing),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(store_failure("rename", new_name, e)),
        };

        self.store
            .put(&new_key, &entry.value)
            .await
            .map_err(|e| store_failure("rename", new_name, e))?;

        if let Err(e) = self.store.delete(&old_key).await {
            error!(old_name, new_name, error = %e, "rename: removing source failed, undoing");
            self.undo_rename(&entry, &new_key, previous).await;
            return Err(FsError::Io(e.to_string()));
        }

        Ok(())
    }

    async fn undo_rename(&self, source: &KvPair, new_key: &str, previous: Option<KvPair>) {
        if let Err(e) = self.store.put(&source.key, &source.value).await {
            warn!(key = %source.key, error = %e, "rename undo: restoring source failed");
        }

        let restored = match previous {
            Some(prev) => self.store.put(new_key, &prev.value).await,
            None => self.store.delete(new_key).await,
        };
        if let Err(e) = restored {
            warn!(key = new_key, error = %e, "rename undo: restoring destination failed");
        }
    }

    /// Remove `name` and every key beneath it.
    pub async fn remove_directory(&self, name: &str) -> FsResult<()> {
        debug!(name, "remove_directory");
        if Keyspace::is_root(name) {
            error!("refusing to remove the mount root");
            return Err(FsError::Io("cannot remove the mount root".to_string()));
        }
        self.store
            .delete_tree(&self.keys.dir_key(name))
            .await
            .map_err(|e| store_failure("remove_directory", name, e))
    }

    /// Remove the file key `name`.
    pub async fn unlink(&self, name: &str) -> FsResult<()> {
        debug!(name, "unlink");
        self.store
            .delete(&self.keys.key(name))
            .await
            .map_err(|e| store_failure("unlink", name, e))
    }

    /// Shorten the value at `name` to `size` bytes. Never extends.
    pub async fn truncate(&self, name: &str, size: u64) -> FsResult<()> {
        debug!(name, size, "truncate");
        let key = self.keys.key(name);
        let mut entry = self
            .store
            .get(&key)
            .await
            .map_err(|e| store_failure("truncate", name, e))?;

        let keep = usize::try_from(size)
            .unwrap_or(usize::MAX)
            .min(entry.value.len());
        entry.value.truncate(keep);

        self.store
            .put(&key, &entry.value)
            .await
            .map_err(|e| store_failure("truncate", name, e))
    }

    /// Count the keys under `name`.
    pub async fn stat_filesystem(&self, name: &str) -> FsResult<FsStats> {
        debug!(name, "stat_filesystem");
        match self.store.list(&self.keys.dir_key(name)).await {
            Ok(pairs) => Ok(FsStats {
                files: pairs.len() as u64,
            }),
            Err(e) if e.is_not_found() => Ok(FsStats::default()),
            Err(e) => Err(store_failure("stat_filesystem", name, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::EntryKind;
    use kvfs_store::MemoryStore;

    fn fs_with_root(root: &str) -> (Arc<MemoryStore>, KvFs) {
        let store = Arc::new(MemoryStore::new());
        let fs = KvFs::new(store.clone(), root);
        (store, fs)
    }

    #[tokio::test]
    async fn test_root_is_normalized() {
        let (_store, fs) = fs_with_root("/apps/demo");
        assert_eq!(fs.root(), "apps/demo/");
    }

    #[tokio::test]
    async fn test_connect_with_empty_store() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let fs = KvFs::connect(store, "scratch").await.unwrap();
        assert_eq!(fs.root(), "scratch/");
    }

    #[tokio::test]
    async fn test_keys_are_rooted() {
        let (store, fs) = fs_with_root("apps");
        fs.create("/cfg").await.unwrap();
        fs.make_directory("/sub").await.unwrap();

        assert!(store.get("apps/cfg").await.is_ok());
        assert!(store.get("apps/sub/").await.is_ok());
        assert!(store.get("cfg").await.is_err());
    }

    #[tokio::test]
    async fn test_root_attributes_without_any_keys() {
        let (_store, fs) = fs_with_root("");
        assert!(fs.get_attributes("").await.unwrap().is_dir());
        assert!(fs.get_attributes("/").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_get_attributes_prefers_file_key() {
        let (store, fs) = fs_with_root("");
        store.put("x", b"abc").await.unwrap();
        store.put("x/", b"").await.unwrap();
        let attr = fs.get_attributes("x").await.unwrap();
        assert_eq!(attr.kind, EntryKind::File);
        assert_eq!(attr.size, 3);
    }

    #[tokio::test]
    async fn test_list_root_of_empty_store() {
        let (_store, fs) = fs_with_root("apps");
        assert!(fs.open_directory("/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_root_under_prefix() {
        let (store, fs) = fs_with_root("apps");
        store.put("apps/a", b"").await.unwrap();
        store.put("apps/d/", b"").await.unwrap();
        store.put("other/b", b"").await.unwrap();

        let names: Vec<_> = fs
            .open_directory("")
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a".to_string(), EntryKind::File),
                ("d".to_string(), EntryKind::Directory)
            ]
        );
    }

    #[tokio::test]
    async fn test_list_does_not_match_sibling_prefix() {
        let (store, fs) = fs_with_root("");
        store.put("a/", b"").await.unwrap();
        store.put("ab", b"").await.unwrap();
        assert!(fs.open_directory("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_directory_keeps_sibling_prefix() {
        let (store, fs) = fs_with_root("");
        store.put("a/", b"").await.unwrap();
        store.put("a/x", b"").await.unwrap();
        store.put("ab", b"keep").await.unwrap();

        fs.remove_directory("a").await.unwrap();
        assert_eq!(store.get("ab").await.unwrap().value, b"keep");
    }

    #[tokio::test]
    async fn test_remove_root_refused() {
        let (store, fs) = fs_with_root("");
        store.put("a", b"").await.unwrap();
        assert!(fs.remove_directory("/").await.unwrap_err().is_io());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_truncate_shrinks() {
        let (store, fs) = fs_with_root("");
        store.put("f", b"hello world").await.unwrap();
        fs.truncate("f", 5).await.unwrap();
        assert_eq!(store.get("f").await.unwrap().value, b"hello");
        fs.truncate("f", 0).await.unwrap();
        assert!(store.get("f").await.unwrap().value.is_empty());
    }

    #[tokio::test]
    async fn test_truncate_missing() {
        let (_store, fs) = fs_with_root("");
        assert!(fs.truncate("nope", 0).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stat_filesystem_counts_all_depths() {
        let (store, fs) = fs_with_root("r");
        store.put("r/a", b"").await.unwrap();
        store.put("r/d/", b"").await.unwrap();
        store.put("r/d/e/f", b"").await.unwrap();
        store.put("elsewhere", b"").await.unwrap();

        assert_eq!(fs.stat_filesystem("/").await.unwrap().files, 3);
        assert_eq!(fs.stat_filesystem("d").await.unwrap().files, 2);
        assert_eq!(fs.stat_filesystem("missing").await.unwrap().files, 0);
    }

    #[tokio::test]
    async fn test_rename_onto_itself() {
        let (store, fs) = fs_with_root("");
        store.put("same", b"v").await.unwrap();
        fs.rename("same", "/same").await.unwrap();
        assert_eq!(store.get("same").await.unwrap().value, b"v");
    }
}
