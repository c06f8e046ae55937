//! FUSE adapter for kvfs.
//!
//! Translates kernel requests (inode and file-handle based) into path based
//! [`kvfs_core::KvFs`] calls. FUSE callbacks are synchronous, so every call
//! runs on a shared tokio runtime through [`block_on`].
//!
//! ```ignore
//! init_runtime()?;
//! let fs = block_on(KvFs::connect(store, "apps/"))??;
//! let session = mount(UnixFuse::new(KvFuse::new(Arc::new(fs))), mountpoint, &config)?;
//! // dropping `session` unmounts
//! ```

mod async_bridge;
mod common;
mod handles;
mod inode;
#[cfg(unix)]
mod unix_fuse;

pub use async_bridge::{block_on, init_runtime, run, runtime};
pub use common::{DirListing, KvFuse, NodeAttr, ReadDirResult};
pub use handles::{HandleTable, SharedHandle};
pub use inode::{InodeTable, ROOT_INO};

#[cfg(unix)]
pub use unix_fuse::{mount, mount_options, to_file_attr, UnixFuse};
#[cfg(unix)]
pub use fuser::BackgroundSession;
