//! Per-open-file state.

use std::fmt;
use std::sync::Arc;

use kvfs_store::{KvPair, Store};
use tracing::{debug, error};

use crate::attr::Attributes;
use crate::error::{FsError, FsResult};

/// An open file: one key plus a snapshot of its value taken at open time.
///
/// Reads are served from the snapshot and never re-fetch. Every write
/// rewrites the whole value in the store before returning.
pub struct OpenFileHandle {
    store: Arc<dyn Store>,
    entry: KvPair,
}

impl OpenFileHandle {
    pub(crate) fn new(store: Arc<dyn Store>, entry: KvPair) -> Self {
        OpenFileHandle { store, entry }
    }

    /// Store key this handle is bound to.
    pub fn key(&self) -> &str {
        &self.entry.key
    }

    /// Current snapshot length.
    pub fn len(&self) -> usize {
        self.entry.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.value.is_empty()
    }

    /// Copy snapshot bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied; zero at or past the end.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> usize {
        let value = &self.entry.value;
        let start = match usize::try_from(offset) {
            Ok(start) if start < value.len() => start,
            _ => return 0,
        };
        let n = buf.len().min(value.len() - start);
        buf[..n].copy_from_slice(&value[start..start + n]);
        n
    }

    /// Truncate the snapshot to `offset`, append `data`, and put the result.
    ///
    /// An `offset` past the end is not zero-filled: `data` lands right after
    /// the current last byte.
    pub async fn write(&mut self, data: &[u8], offset: u64) -> FsResult<usize> {
        let keep = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.entry.value.len());

        let mut value = Vec::with_capacity(keep + data.len());
        value.extend_from_slice(&self.entry.value[..keep]);
        value.extend_from_slice(data);

        debug!(key = %self.entry.key, offset, len = data.len(), "write");
        if let Err(e) = self.store.put(&self.entry.key, &value).await {
            error!(key = %self.entry.key, error = %e, "write failed");
            return Err(FsError::Io(e.to_string()));
        }

        self.entry.value = value;
        Ok(data.len())
    }

    /// Attributes of the bound entry, from the snapshot.
    pub fn get_attributes(&self) -> Attributes {
        Attributes::for_entry(&self.entry)
    }
}

impl fmt::Display for OpenFileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry.key)
    }
}

impl fmt::Debug for OpenFileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFileHandle")
            .field("key", &self.entry.key)
            .field("len", &self.entry.value.len())
            .field("store", &self.store.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::EntryKind;
    use kvfs_store::MemoryStore;

    async fn handle_with(key: &str, value: &[u8]) -> (Arc<MemoryStore>, OpenFileHandle) {
        let store = Arc::new(MemoryStore::new());
        store.put(key, value).await.unwrap();
        let entry = store.get(key).await.unwrap();
        let handle = OpenFileHandle::new(store.clone(), entry);
        (store, handle)
    }

    #[tokio::test]
    async fn test_read_within_bounds() {
        let (_store, handle) = handle_with("f", b"hello world").await;
        let mut buf = [0u8; 5];
        assert_eq!(handle.read(&mut buf, 6), 5);
        assert_eq!(&buf, b"world");
    }

    #[tokio::test]
    async fn test_read_short_at_end() {
        let (_store, handle) = handle_with("f", b"hello").await;
        let mut buf = [0u8; 16];
        assert_eq!(handle.read(&mut buf, 3), 2);
        assert_eq!(&buf[..2], b"lo");
    }

    #[tokio::test]
    async fn test_read_past_end_is_empty() {
        let (_store, handle) = handle_with("f", b"hello").await;
        let mut buf = [0u8; 4];
        assert_eq!(handle.read(&mut buf, 5), 0);
        assert_eq!(handle.read(&mut buf, 500), 0);
        assert_eq!(handle.read(&mut buf, u64::MAX), 0);
    }

    #[tokio::test]
    async fn test_write_at_zero_replaces_value() {
        let (store, mut handle) = handle_with("f", b"old contents").await;
        assert_eq!(handle.write(b"new", 0).await.unwrap(), 3);
        assert_eq!(store.get("f").await.unwrap().value, b"new");
        assert_eq!(handle.len(), 3);
    }

    #[tokio::test]
    async fn test_write_mid_value_truncates_tail() {
        let (store, mut handle) = handle_with("f", b"abcdef").await;
        handle.write(b"XY", 2).await.unwrap();
        assert_eq!(store.get("f").await.unwrap().value, b"abXY");
    }

    #[tokio::test]
    async fn test_write_appends_at_end() {
        let (store, mut handle) = handle_with("f", b"abc").await;
        handle.write(b"def", 3).await.unwrap();
        handle.write(b"ghi", 6).await.unwrap();
        assert_eq!(store.get("f").await.unwrap().value, b"abcdefghi");
    }

    #[tokio::test]
    async fn test_write_past_end_is_not_padded() {
        let (store, mut handle) = handle_with("f", b"abc").await;
        handle.write(b"Z", 10).await.unwrap();
        assert_eq!(store.get("f").await.unwrap().value, b"abcZ");
    }

    #[tokio::test]
    async fn test_reads_see_own_writes() {
        let (_store, mut handle) = handle_with("f", b"").await;
        handle.write(b"fresh", 0).await.unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(handle.read(&mut buf, 0), 5);
        assert_eq!(&buf, b"fresh");
    }

    #[tokio::test]
    async fn test_snapshot_ignores_other_writers() {
        let (store, handle) = handle_with("f", b"v1").await;
        store.put("f", b"version two").await.unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(handle.read(&mut buf, 0), 2);
        assert_eq!(&buf[..2], b"v1");
    }

    #[tokio::test]
    async fn test_attributes_follow_snapshot() {
        let (_store, mut handle) = handle_with("f", b"1234").await;
        assert_eq!(handle.get_attributes().size, 4);
        handle.write(b"123456", 0).await.unwrap();
        let attr = handle.get_attributes();
        assert_eq!(attr.kind, EntryKind::File);
        assert_eq!(attr.size, 6);
    }

    #[tokio::test]
    async fn test_display_is_key() {
        let (_store, handle) = handle_with("root/a/f", b"").await;
        assert_eq!(handle.to_string(), "root/a/f");
        assert_eq!(handle.key(), "root/a/f");
    }
}
