//! End-to-end behavior of the filesystem operations against the in-memory store.

use std::sync::Arc;

use kvfs_core::{EntryKind, FsError, KvFs};
use kvfs_store::{MemoryStore, Store};

fn setup() -> (Arc<MemoryStore>, KvFs) {
    let store = Arc::new(MemoryStore::new());
    let fs = KvFs::new(store.clone(), "");
    (store, fs)
}

fn names(entries: Vec<kvfs_core::DirEntry>) -> Vec<(String, EntryKind)> {
    entries.into_iter().map(|e| (e.name, e.kind)).collect()
}

#[tokio::test]
async fn missing_path_is_not_found() {
    let (_store, fs) = setup();

    let err = fs.open("/nope").await.unwrap_err();
    assert!(matches!(err, FsError::NotFound(_)), "got {:?}", err);

    let err = fs.get_attributes("/nope").await.unwrap_err();
    assert!(matches!(err, FsError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn created_file_opens_empty() {
    let (_store, fs) = setup();
    fs.create("/f").await.unwrap();

    let handle = fs.open("/f").await.unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(handle.read(&mut buf, 0), 0);
    assert!(handle.is_empty());
}

#[tokio::test]
async fn write_then_read_back() {
    let (_store, fs) = setup();
    let mut handle = fs.create("/notes.txt").await.unwrap();
    let data = b"the quick brown fox";
    assert_eq!(handle.write(data, 0).await.unwrap(), data.len());

    let reopened = fs.open("/notes.txt").await.unwrap();
    let mut buf = vec![0u8; data.len()];
    assert_eq!(reopened.read(&mut buf, 0), data.len());
    assert_eq!(&buf, data);

    let attr = fs.get_attributes("/notes.txt").await.unwrap();
    assert_eq!(attr.kind, EntryKind::File);
    assert_eq!(attr.size, data.len() as u64);
}

#[tokio::test]
async fn new_directory_lists_empty() {
    let (_store, fs) = setup();
    fs.make_directory("a").await.unwrap();
    assert!(fs.open_directory("a").await.unwrap().is_empty());

    let attr = fs.get_attributes("a").await.unwrap();
    assert!(attr.is_dir());
}

#[tokio::test]
async fn directory_lists_its_file() {
    let (_store, fs) = setup();
    fs.make_directory("a").await.unwrap();
    fs.create("a/f").await.unwrap();

    assert_eq!(
        names(fs.open_directory("a").await.unwrap()),
        vec![("f".to_string(), EntryKind::File)]
    );
}

#[tokio::test]
async fn listing_hides_grandchildren() {
    let (store, fs) = setup();
    store.put("a/", b"").await.unwrap();
    store.put("a/b/", b"").await.unwrap();
    store.put("a/b/c", b"deep").await.unwrap();
    store.put("a/b/c/d/", b"").await.unwrap();

    assert_eq!(
        names(fs.open_directory("a").await.unwrap()),
        vec![("b".to_string(), EntryKind::Directory)]
    );
}

#[tokio::test]
async fn rename_moves_value() {
    let (store, fs) = setup();
    store.put("old", b"payload").await.unwrap();

    fs.rename("/old", "/new").await.unwrap();

    assert!(store.get("old").await.unwrap_err().is_not_found());
    assert_eq!(store.get("new").await.unwrap().value, b"payload");
}

#[tokio::test]
async fn rename_overwrites_destination() {
    let (store, fs) = setup();
    store.put("src", b"fresh").await.unwrap();
    store.put("dst", b"stale").await.unwrap();

    fs.rename("src", "dst").await.unwrap();

    assert!(store.get("src").await.is_err());
    assert_eq!(store.get("dst").await.unwrap().value, b"fresh");
}

#[tokio::test]
async fn rename_missing_source_fails() {
    let (store, fs) = setup();
    let err = fs.rename("ghost", "dst").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(store.is_empty());
}

#[tokio::test]
async fn truncate_never_extends() {
    let (store, fs) = setup();
    store.put("f", b"short").await.unwrap();

    fs.truncate("f", 1024).await.unwrap();
    assert_eq!(store.get("f").await.unwrap().value, b"short");

    fs.truncate("f", 2).await.unwrap();
    assert_eq!(store.get("f").await.unwrap().value, b"sh");
}

#[tokio::test]
async fn remove_directory_is_recursive() {
    let (store, fs) = setup();
    fs.make_directory("a").await.unwrap();
    store.put("a/x", b"1").await.unwrap();
    store.put("a/y", b"2").await.unwrap();

    fs.remove_directory("a").await.unwrap();

    assert!(store.get("a/x").await.is_err());
    assert!(store.get("a/y").await.is_err());
    assert!(fs.open_directory("a").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn unlink_twice_reports_not_found_twice() {
    let (store, fs) = setup();
    store.put("f", b"").await.unwrap();
    fs.unlink("f").await.unwrap();

    let first = fs.unlink("f").await.unwrap_err();
    let second = fs.unlink("f").await.unwrap_err();
    assert!(first.is_not_found());
    assert!(second.is_not_found());
}

#[tokio::test]
async fn stat_counts_keys() {
    let (_store, fs) = setup();
    assert_eq!(fs.stat_filesystem("/").await.unwrap().files, 0);

    fs.make_directory("d").await.unwrap();
    fs.create("d/one").await.unwrap();
    fs.create("two").await.unwrap();
    assert_eq!(fs.stat_filesystem("/").await.unwrap().files, 3);
}

#[tokio::test]
async fn root_prefix_confines_every_operation() {
    let store = Arc::new(MemoryStore::new());
    store.put("outside", b"secret").await.unwrap();
    let fs = KvFs::connect(store.clone(), "/tenant").await.unwrap();

    assert!(fs.open("/outside").await.unwrap_err().is_not_found());
    assert!(fs.open_directory("/").await.unwrap().is_empty());

    fs.make_directory("/docs").await.unwrap();
    let mut handle = fs.create("/docs/readme").await.unwrap();
    handle.write(b"hi", 0).await.unwrap();
    fs.rename("/docs/readme", "/docs/README").await.unwrap();

    assert_eq!(store.get("tenant/docs/README").await.unwrap().value, b"hi");
    assert_eq!(
        names(fs.open_directory("/").await.unwrap()),
        vec![("docs".to_string(), EntryKind::Directory)]
    );

    fs.remove_directory("/docs").await.unwrap();
    assert_eq!(store.get("outside").await.unwrap().value, b"secret");
    assert_eq!(store.len(), 1);
}
