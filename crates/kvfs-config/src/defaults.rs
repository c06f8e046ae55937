use crate::types::MountConfig;

impl MountConfig {
    /// The configured root in the form every store key is built from:
    /// no leading `/`, and a trailing `/` unless the root is empty.
    ///
    /// An empty root confines nothing and maps paths onto the whole keyspace.
    pub fn normalized_root(&self) -> String {
        normalize_root(&self.root)
    }
}

/// Normalize a root key prefix.
///
/// `/apps/demo` -> `apps/demo/`
/// `apps/demo/` -> `apps/demo/`
/// `` and `/` -> ``
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.strip_prefix('/').unwrap_or(root);
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}
