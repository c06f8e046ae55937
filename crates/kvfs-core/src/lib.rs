//! Filesystem semantics over a flat key-value store.
//!
//! Keys ending in `/` are directory markers; every other key is a file whose
//! contents are the value. [`KvFs`] implements the per-request operations and
//! [`OpenFileHandle`] serves reads and writes for one open file.

mod attr;
mod error;
mod handle;
mod ops;
mod path;

pub use attr::{Attributes, EntryKind, DIR_PERM, FILE_PERM};
pub use error::{FsError, FsResult};
pub use handle::OpenFileHandle;
pub use ops::{FsStats, KvFs};
pub use path::{is_directory_key, split_entry, to_store_key, DirEntry, Keyspace};
