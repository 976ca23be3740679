//! Blob context behavior against the in-memory blob backend

use std::io::Write;
use stowage::prelude::*;

struct BlobOne;

impl Model for BlobOne {
    const NAME: &'static str = "BlobOne";
    const KIND: StorageKind = StorageKind::Blob;

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .storage_name("blobtest")
            .field("user", "")
            .field("password", "")
            .field("server", "")
            .field("protocol", "")
    }
}

fn blob_one(source: impl Into<BlobSource>) -> Blob<BlobOne> {
    Blob::with_overrides([
        ("user", "bla"),
        ("password", "blabla"),
        ("server", "blablabla"),
        ("protocol", "sbla"),
    ])
    .unwrap()
    .with_source(source)
}

async fn context() -> BlobContext<MemoryBlobBackend> {
    let _ = stowage::logging::init();
    let mut container = BlobContext::new(StorageConfig::emulated(), MemoryBlobBackend::new()).unwrap();
    container.register::<BlobOne>().await.unwrap();
    container
}

#[tokio::test]
async fn test_register_model() {
    let container = context().await;
    assert!(container.registry().model_names().contains(&"BlobOne"));
    assert!(container.backend().has_container("blobtest"));
}

#[tokio::test]
async fn test_upload_text() {
    let container = context().await;
    let mut blob = blob_one("Test Blob");
    container.upload(&mut blob).await.unwrap();

    assert_eq!(blob.get_as::<String>("user").as_deref(), Some("bla"));
    assert_eq!(blob.source(), Some(&BlobSource::Text("Test Blob".to_string())));

    let found = container.find::<BlobOne>(blob.name()).await.unwrap().unwrap();
    assert_eq!(found.text(), Some("Test Blob"));
    assert_eq!(found.get_as::<String>("protocol").as_deref(), Some("sbla"));
}

#[tokio::test]
async fn test_upload_file() {
    let container = context().await;
    let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap();

    let source = BlobSource::infer(&file.path().to_string_lossy()).await;
    assert!(source.is_file());

    let mut blob = blob_one(source.clone());
    container.upload(&mut blob).await.unwrap();
    assert_eq!(blob.source(), Some(&source));
    assert_eq!(blob.content_type(), Some("image/jpeg"));

    let mut copy = Blob::<BlobOne>::named(blob.name()).unwrap();
    assert!(container.download(&mut copy).await.unwrap());
    assert_eq!(copy.content().map(|c| c.len()), Some(6));
    assert_eq!(copy.get_as::<String>("server").as_deref(), Some("blablabla"));
}

#[tokio::test]
async fn test_list_blobs() {
    let container = context().await;
    container.upload(&mut blob_one("first")).await.unwrap();
    container.upload(&mut blob_one("second")).await.unwrap();

    let blobs = container.list::<BlobOne>().await.unwrap();
    assert_eq!(blobs.len(), 2);
}

#[tokio::test]
async fn test_encryption_required_by_config() {
    let config = StorageConfig::emulated()
        .with_encryption_key("stowage_test", "supa-dupa-secret-special-key2901")
        .require_encryption(true);
    let mut container = BlobContext::new(config, MemoryBlobBackend::new()).unwrap();
    container.register::<BlobOne>().await.unwrap();

    let mut blob = blob_one("Test Blob").with_name("sealed.txt");
    container.upload(&mut blob).await.unwrap();

    let raw = container.backend().raw_blob("blobtest", "sealed.txt").unwrap();
    assert_ne!(raw.as_ref(), b"Test Blob");
    let found = container.find::<BlobOne>("sealed.txt").await.unwrap().unwrap();
    assert_eq!(found.text(), Some("Test Blob"));
}

#[tokio::test]
async fn test_unregister_model_delete() {
    let mut container = context().await;
    container.unregister::<BlobOne>(true).await.unwrap();
    assert!(!container.registry().model_names().contains(&"BlobOne"));
    assert!(!container.backend().has_container("blobtest"));
}
