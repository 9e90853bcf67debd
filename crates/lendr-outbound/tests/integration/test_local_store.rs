//! Integration tests for LocalBlobStore on a temporary directory

use lendr_core::ports::{IBlobStore, PhotoUpload};
use lendr_outbound::LocalBlobStore;

use crate::common;

#[tokio::test]
async fn test_store_writes_file_and_returns_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path().join("photos"));

    let photo = common::sample_photo();
    let url = store.upload(&photo).await.unwrap();

    let path = url.strip_prefix("file://").unwrap();
    assert!(path.ends_with(".jpg"));
    assert_eq!(std::fs::read(path).unwrap(), photo.bytes);
}

#[tokio::test]
async fn test_each_upload_gets_its_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());

    let first = store.upload(&common::sample_photo()).await.unwrap();
    let second = store.upload(&common::sample_photo()).await.unwrap();
    assert_ne!(first, second);

    let count = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_upload_without_name_or_type_has_no_extension() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());

    let url = store.upload(&PhotoUpload::new(vec![1, 2, 3])).await.unwrap();
    let file_name = url.rsplit('/').next().unwrap();
    assert!(!file_name.contains('.'));
}
