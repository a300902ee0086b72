//! Tests for the cache storage backends.

use muninn::{CacheStore, FileStore, MemoryStore, MuninnError};
use tempfile::TempDir;

async fn exercise(store: &dyn CacheStore) {
    assert_eq!(store.read("abc").await.unwrap(), None);
    assert!(store.list().await.unwrap().is_empty());

    store.write("abc", b"{\"a\":1}").await.unwrap();
    store.write("def", b"2").await.unwrap();
    store.write("abc", b"3").await.unwrap();

    assert_eq!(store.read("abc").await.unwrap().as_deref(), Some(&b"3"[..]));
    let mut keys = store.list().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["abc", "def"]);

    store.delete("abc").await.unwrap();
    store.delete("abc").await.unwrap();
    assert_eq!(store.read("abc").await.unwrap(), None);
    assert_eq!(store.list().await.unwrap(), vec!["def"]);
}

#[tokio::test]
async fn memory_store_contract() {
    let store = MemoryStore::new();
    exercise(&store).await;
    assert_eq!(store.name(), "memory");
}

#[tokio::test]
async fn file_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path().join("cache"));
    assert_eq!(store.root(), dir.path().join("cache"));
    exercise(&store).await;
    assert_eq!(store.name(), "file");
    assert!(dir.path().join("cache").join("def.json").exists());
}

#[tokio::test]
async fn file_store_missing_root_lists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path().join("never-created"));
    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(store.read("abc").await.unwrap(), None);
    store.delete("abc").await.unwrap();
}

#[tokio::test]
async fn file_store_ignores_foreign_files() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    store.write("abc", b"1").await.unwrap();
    std::fs::write(dir.path().join("abc.tmp"), b"partial").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();

    assert_eq!(store.list().await.unwrap(), vec!["abc"]);
}

#[tokio::test]
async fn file_store_rejects_path_like_keys() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    for key in ["", "../escape", "a/b", "a\\b", ".hidden"] {
        let err = store.write(key, b"x").await.unwrap_err();
        assert!(matches!(err, MuninnError::InvalidInput(_)), "{key:?}");
    }
}
