use std::sync::Arc;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::prefix::PrefixStore;
use tokio_stream::StreamExt;

use crate::conf::{LocalStorageConfig, S3StorageConfig, StorageConfig};
use crate::core::StrataError;

/// Zero-argument constructor for a storage handle. Every finalize task calls
/// it once and drops the handle when the task ends.
pub type StoreFactory =
    Arc<dyn Fn() -> Result<Arc<dyn ObjectStore>, StrataError> + Send + Sync>;

/// Build a factory for the configured backend.
pub fn store_factory(config: &StorageConfig) -> Result<StoreFactory, StrataError> {
    match config {
        StorageConfig::Local(local) => {
            std::fs::create_dir_all(&local.path).map_err(|e| {
                StrataError::IoError(format!("creating directory {}: {}", local.path, e))
            })?;
            let local = local.clone();
            Ok(Arc::new(move || create_local_store(&local)))
        }
        StorageConfig::S3(s3) => {
            // fail on bad settings now rather than inside the first task
            create_s3_store(s3)?;
            let s3 = s3.clone();
            Ok(Arc::new(move || create_s3_store(&s3)))
        }
        StorageConfig::Memory => Ok(shared_store_factory(Arc::new(InMemory::new()))),
    }
}

/// Factory handing out clones of one existing store, used for in-memory
/// storage where separate instances would not see each other's data.
pub fn shared_store_factory(store: Arc<dyn ObjectStore>) -> StoreFactory {
    Arc::new(move || Ok(store.clone()))
}

/// Creates a LocalFileSystem ObjectStore rooted at the configured path.
pub fn create_local_store(config: &LocalStorageConfig) -> Result<Arc<dyn ObjectStore>, StrataError> {
    let store = LocalFileSystem::new_with_prefix(&config.path).map_err(|e| {
        StrataError::StoreError(format!(
            "Failed to create local store at '{}': {}",
            config.path, e
        ))
    })?;
    Ok(Arc::new(store))
}

/// Creates an S3 ObjectStore from S3StorageConfig.
pub fn create_s3_store(config: &S3StorageConfig) -> Result<Arc<dyn ObjectStore>, StrataError> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region);

    // Optional custom endpoint (for MinIO, LocalStack, etc.)
    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
        if endpoint.starts_with("http://") {
            builder = builder.with_allow_http(true);
        }
    }

    let store = builder.build().map_err(|e| {
        StrataError::StoreError(format!(
            "Failed to create S3 store for bucket '{}': {}",
            config.bucket, e
        ))
    })?;

    if config.prefix.is_empty() {
        Ok(Arc::new(store))
    } else {
        Ok(Arc::new(PrefixStore::new(store, config.prefix.as_str())))
    }
}

/// List all objects under `prefix`, sorted by path.
pub async fn list_files(
    store: &dyn ObjectStore,
    prefix: Option<&ObjectPath>,
) -> Result<Vec<ObjectPath>, StrataError> {
    let mut paths = Vec::new();
    let mut stream = store.list(prefix);

    while let Some(result) = stream.next().await {
        let meta = result?;
        paths.push(meta.location);
    }

    paths.sort();
    Ok(paths)
}
