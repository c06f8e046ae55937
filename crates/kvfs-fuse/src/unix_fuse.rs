//! Unix FUSE implementation using the `fuser` crate.

use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use kvfs_config::MountConfig;
use kvfs_core::{EntryKind, FsError};
use tracing::{debug, error, info};

use crate::common::{KvFuse, NodeAttr};

/// How long the kernel may cache attributes and entries.
const TTL: Duration = Duration::from_secs(1);

const BLOCK_SIZE: u32 = 4096;

/// `fuser::Filesystem` wrapper around [`KvFuse`], reporting every node as
/// owned by one uid/gid.
pub struct UnixFuse {
    core: KvFuse,
    uid: u32,
    gid: u32,
}

impl UnixFuse {
    /// Wrap `core`, owned by the calling process's user.
    pub fn new(core: KvFuse) -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self::with_owner(core, uid, gid)
    }

    pub fn with_owner(core: KvFuse, uid: u32, gid: u32) -> Self {
        UnixFuse { core, uid, gid }
    }

    fn file_attr(&self, node: &NodeAttr) -> FileAttr {
        to_file_attr(node, self.uid, self.gid)
    }

    fn reply_err(op: &str, e: &FsError) -> i32 {
        if e.is_not_found() {
            debug!("{} failed: {}", op, e);
        } else {
            error!("{} failed: {}", op, e);
        }
        e.errno()
    }
}

/// Mount options derived from the configuration.
pub fn mount_options(config: &MountConfig) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName(config.fsname.clone()),
        MountOption::Subtype("kvfs".to_string()),
    ];
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

/// Mount in a background thread. Dropping the session unmounts.
pub fn mount(
    fs: UnixFuse,
    mountpoint: &Path,
    config: &MountConfig,
) -> std::io::Result<fuser::BackgroundSession> {
    info!("mounting kvfs at {:?}", mountpoint);
    fuser::spawn_mount2(fs, mountpoint, &mount_options(config))
}

pub fn to_file_attr(node: &NodeAttr, uid: u32, gid: u32) -> FileAttr {
    let attr = &node.attr;
    let (kind, nlink) = match attr.kind {
        EntryKind::File => (FileType::RegularFile, 1),
        EntryKind::Directory => (FileType::Directory, 2),
    };

    FileAttr {
        ino: node.ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind,
        perm: attr.perm,
        nlink,
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn name_str(name: &OsStr) -> Result<&str, FsError> {
    name.to_str().ok_or(FsError::InvalidName)
}

impl Filesystem for UnixFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let result = name_str(name).and_then(|name| {
            debug!("lookup: parent={}, name={}", parent, name);
            self.core.do_lookup(parent, name)
        });
        match result {
            Ok(node) => reply.entry(&TTL, &self.file_attr(&node), 0),
            Err(e) => reply.error(Self::reply_err("lookup", &e)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        debug!("getattr: ino={}", ino);

        match self.core.do_getattr(ino) {
            Ok(node) => reply.attr(&TTL, &self.file_attr(&node)),
            Err(e) => reply.error(Self::reply_err("getattr", &e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("setattr: ino={}, size={:?}", ino, size);

        match self.core.do_setattr(ino, size) {
            Ok(node) => reply.attr(&TTL, &self.file_attr(&node)),
            Err(e) => reply.error(Self::reply_err("setattr", &e)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("open: ino={}", ino);

        match self.core.do_open(ino) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(Self::reply_err("open", &e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let result = name_str(name).and_then(|name| {
            debug!("create: parent={}, name={}", parent, name);
            self.core.do_create(parent, name)
        });
        match result {
            Ok((node, fh)) => reply.created(&TTL, &self.file_attr(&node), 0, fh, 0),
            Err(e) => reply.error(Self::reply_err("create", &e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read: ino={}, fh={}, offset={}, size={}", ino, fh, offset, size);

        match self.core.do_read(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(Self::reply_err("read", &e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write: ino={}, fh={}, offset={}, size={}", ino, fh, offset, data.len());

        match self.core.do_write(fh, offset, data) {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(Self::reply_err("write", &e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("release: ino={}, fh={}", ino, fh);
        self.core.do_release(fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir: ino={}", ino);

        match self.core.do_opendir(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(Self::reply_err("opendir", &e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir: ino={}, offset={}", ino, offset);

        let result = match self.core.do_readdir(ino) {
            Ok(result) => result,
            Err(e) => {
                reply.error(Self::reply_err("readdir", &e));
                return;
            }
        };

        let dots = [
            (result.ino, FileType::Directory, "."),
            (result.parent_ino, FileType::Directory, ".."),
        ];
        let entries = result.entries.iter().map(|entry| {
            let kind = match entry.kind {
                EntryKind::File => FileType::RegularFile,
                EntryKind::Directory => FileType::Directory,
            };
            (entry.ino, kind, entry.name.as_str())
        });

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (child_ino, kind, name)) in dots.into_iter().chain(entries).enumerate().skip(skip) {
            // Offset handed back is the index of the next entry.
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let result = name_str(name).and_then(|name| {
            debug!("mkdir: parent={}, name={}", parent, name);
            self.core.do_mkdir(parent, name)
        });
        match result {
            Ok(node) => reply.entry(&TTL, &self.file_attr(&node), 0),
            Err(e) => reply.error(Self::reply_err("mkdir", &e)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = name_str(name).and_then(|name| {
            debug!("unlink: parent={}, name={}", parent, name);
            self.core.do_unlink(parent, name)
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::reply_err("unlink", &e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = name_str(name).and_then(|name| {
            debug!("rmdir: parent={}, name={}", parent, name);
            self.core.do_rmdir(parent, name)
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::reply_err("rmdir", &e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let result = name_str(name).and_then(|name| {
            let newname = name_str(newname)?;
            debug!(
                "rename: parent={}, name={}, newparent={}, newname={}",
                parent, name, newparent, newname
            );
            self.core.do_rename(parent, name, newparent, newname)
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::reply_err("rename", &e)),
        }
    }

    fn statfs(&mut self, _req: &Request, ino: u64, reply: ReplyStatfs) {
        debug!("statfs: ino={}", ino);

        match self.core.do_statfs(ino) {
            Ok(stats) => reply.statfs(0, 0, 0, stats.files, 0, BLOCK_SIZE, 255, BLOCK_SIZE),
            Err(e) => reply.error(Self::reply_err("statfs", &e)),
        }
    }
}
