//! Platform-neutral FUSE request handling.
//!
//! Each `do_*` method resolves inodes and file handles, then runs the
//! matching [`KvFs`] operation on the bridge runtime.

use std::sync::Arc;

use kvfs_core::{Attributes, EntryKind, FsError, FsResult, FsStats, KvFs};
use tracing::debug;

use crate::async_bridge::run;
use crate::handles::HandleTable;
use crate::inode::{child_path, InodeTable, ROOT_INO};

/// Attributes paired with the inode they were reported for.
#[derive(Debug, Clone)]
pub struct NodeAttr {
    pub ino: u64,
    pub attr: Attributes,
}

/// A single directory entry with its inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub ino: u64,
    pub name: String,
    pub kind: EntryKind,
}

/// Result from a readdir operation.
#[derive(Debug)]
pub struct ReadDirResult {
    /// Inode of the directory being listed.
    pub ino: u64,
    /// Inode of the parent directory.
    pub parent_ino: u64,
    pub entries: Vec<DirListing>,
}

/// The filesystem as seen by the kernel: inode and handle bookkeeping on
/// top of [`KvFs`].
pub struct KvFuse {
    fs: Arc<KvFs>,
    inodes: InodeTable,
    handles: HandleTable,
}

impl KvFuse {
    pub fn new(fs: Arc<KvFs>) -> Self {
        KvFuse {
            fs,
            inodes: InodeTable::new(),
            handles: HandleTable::new(),
        }
    }

    pub fn fs(&self) -> &Arc<KvFs> {
        &self.fs
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn path_of(&self, ino: u64) -> FsResult<String> {
        self.inodes
            .get_path(ino)
            .ok_or_else(|| FsError::NotFound(format!("inode {}", ino)))
    }

    fn child_of(&self, parent: u64, name: &str) -> FsResult<String> {
        self.inodes
            .resolve_child(parent, name)
            .ok_or_else(|| FsError::NotFound(format!("inode {}", parent)))
    }

    fn node(&self, path: &str, attr: Attributes) -> NodeAttr {
        NodeAttr {
            ino: self.inodes.get_or_create(path),
            attr,
        }
    }

    pub fn do_lookup(&self, parent: u64, name: &str) -> FsResult<NodeAttr> {
        let path = self.child_of(parent, name)?;
        let fs = self.fs.clone();
        let attr = run(async { fs.get_attributes(&path).await })?;
        Ok(self.node(&path, attr))
    }

    pub fn do_getattr(&self, ino: u64) -> FsResult<NodeAttr> {
        let path = self.path_of(ino)?;
        let fs = self.fs.clone();
        let attr = run(async { fs.get_attributes(&path).await })?;
        Ok(NodeAttr { ino, attr })
    }

    /// Only a size change has an effect; it truncates the stored value.
    pub fn do_setattr(&self, ino: u64, size: Option<u64>) -> FsResult<NodeAttr> {
        let path = self.path_of(ino)?;
        let fs = self.fs.clone();
        let attr = run(async {
            if let Some(size) = size {
                fs.truncate(&path, size).await?;
            }
            fs.get_attributes(&path).await
        })?;
        Ok(NodeAttr { ino, attr })
    }

    /// Open the file behind `ino` and return its fh.
    pub fn do_open(&self, ino: u64) -> FsResult<u64> {
        let path = self.path_of(ino)?;
        let fs = self.fs.clone();
        let handle = run(async { fs.open(&path).await })?;
        Ok(self.handles.insert(handle))
    }

    pub fn do_create(&self, parent: u64, name: &str) -> FsResult<(NodeAttr, u64)> {
        let path = self.child_of(parent, name)?;
        let fs = self.fs.clone();
        let handle = run(async { fs.create(&path).await })?;
        let node = self.node(&path, handle.get_attributes());
        let fh = self.handles.insert(handle);
        Ok((node, fh))
    }

    pub fn do_read(&self, fh: u64, offset: i64, size: u32) -> FsResult<Vec<u8>> {
        let handle = self.handle(fh)?;
        run(async move {
            let handle = handle.lock().await;
            let mut buf = vec![0u8; size as usize];
            let n = handle.read(&mut buf, offset.max(0) as u64);
            buf.truncate(n);
            Ok(buf)
        })
    }

    pub fn do_write(&self, fh: u64, offset: i64, data: &[u8]) -> FsResult<u32> {
        let handle = self.handle(fh)?;
        let written = run(async move {
            let mut handle = handle.lock().await;
            handle.write(data, offset.max(0) as u64).await
        })?;
        Ok(written as u32)
    }

    pub fn do_release(&self, fh: u64) {
        if self.handles.remove(fh).is_none() {
            debug!(fh, "release of unknown handle");
        }
    }

    fn handle(&self, fh: u64) -> FsResult<crate::handles::SharedHandle> {
        self.handles
            .get(fh)
            .ok_or_else(|| FsError::Io(format!("unknown file handle {}", fh)))
    }

    pub fn do_opendir(&self, ino: u64) -> FsResult<()> {
        self.path_of(ino).map(|_| ())
    }

    pub fn do_readdir(&self, ino: u64) -> FsResult<ReadDirResult> {
        let path = self.path_of(ino)?;
        let fs = self.fs.clone();
        let listed = run(async { fs.open_directory(&path).await })?;

        let entries = listed
            .into_iter()
            .map(|entry| DirListing {
                ino: self.inodes.get_or_create(&child_path(&path, &entry.name)),
                name: entry.name,
                kind: entry.kind,
            })
            .collect();

        let parent_ino = if ino == ROOT_INO {
            ROOT_INO
        } else {
            self.inodes.parent_ino(&path)
        };

        Ok(ReadDirResult {
            ino,
            parent_ino,
            entries,
        })
    }

    pub fn do_mkdir(&self, parent: u64, name: &str) -> FsResult<NodeAttr> {
        let path = self.child_of(parent, name)?;
        let fs = self.fs.clone();
        run(async { fs.make_directory(&path).await })?;
        Ok(self.node(&path, Attributes::directory()))
    }

    pub fn do_unlink(&self, parent: u64, name: &str) -> FsResult<()> {
        let path = self.child_of(parent, name)?;
        let fs = self.fs.clone();
        run(async { fs.unlink(&path).await })?;
        self.inodes.remove_path(&path);
        Ok(())
    }

    pub fn do_rmdir(&self, parent: u64, name: &str) -> FsResult<()> {
        let path = self.child_of(parent, name)?;
        let fs = self.fs.clone();
        run(async { fs.remove_directory(&path).await })?;
        self.inodes.remove_subtree(&path);
        Ok(())
    }

    pub fn do_rename(
        &self,
        parent: u64,
        name: &str,
        newparent: u64,
        newname: &str,
    ) -> FsResult<()> {
        let src = self.child_of(parent, name)?;
        let dst = self.child_of(newparent, newname)?;
        let fs = self.fs.clone();
        run(async { fs.rename(&src, &dst).await })?;
        self.inodes.rename(&src, &dst);
        Ok(())
    }

    pub fn do_statfs(&self, ino: u64) -> FsResult<FsStats> {
        let path = self.path_of(ino).unwrap_or_else(|_| "/".to_string());
        let fs = self.fs.clone();
        run(async { fs.stat_filesystem(&path).await })
    }
}
