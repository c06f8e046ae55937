use async_trait::async_trait;

use crate::error::StoreError;

/// One entry in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// Full key, including any root prefix.
    pub key: String,
    /// Opaque value bytes. Empty for directory markers.
    pub value: Vec<u8>,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        KvPair {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Optional primitives a store can offer beyond the basic five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCapabilities {
    /// `move_key` atomically replaces the destination and removes the source.
    pub atomic_move: bool,
}

/// Trait for key-value store adapters.
///
/// Keys are opaque strings; the store attaches no meaning to `/`.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Fetch one key.
    async fn get(&self, key: &str) -> Result<KvPair, StoreError>;

    /// Create or overwrite one key.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove one key.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every key that starts with `prefix`.
    async fn delete_tree(&self, prefix: &str) -> Result<(), StoreError>;

    /// Every pair whose key starts with `prefix`, sorted by key.
    ///
    /// Returns `NotFound` when nothing matches.
    async fn list(&self, prefix: &str) -> Result<Vec<KvPair>, StoreError>;

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }

    /// Move `from` to `to` in one step. Only called when
    /// [`StoreCapabilities::atomic_move`] is advertised.
    async fn move_key(&self, from: &str, _to: &str) -> Result<(), StoreError> {
        Err(StoreError::Unsupported(format!(
            "{} cannot move '{}' atomically",
            self.name(),
            from
        )))
    }
}
