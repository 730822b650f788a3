//! Blob storage collaborator.
//!
//! The pipeline only needs five operations against named containers, so it
//! talks to the [`BlobStore`] trait. [`ObjectStoreBlobStore`] implements it
//! on top of the `object_store` crate for Azure Blob Storage, a local
//! directory tree, or an in-memory store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::connection_string::{AzureConnection, StorageConnection};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob already exists: {0}")]
    AlreadyExists(String),

    #[error("storage configuration error: {0}")]
    Configuration(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<object_store::Error> for BlobError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => BlobError::NotFound(path),
            object_store::Error::AlreadyExists { path, .. } => BlobError::AlreadyExists(path),
            other => BlobError::Backend(other.to_string()),
        }
    }
}

/// Operations the style pipeline needs from a blob store.
///
/// Paths are `/` separated and relative to the container root.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every blob whose path starts with `prefix`
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError>;

    async fn exists(&self, container: &str, path: &str) -> Result<bool, BlobError>;

    async fn download(&self, container: &str, path: &str) -> Result<Bytes, BlobError>;

    /// Write `data` to `path`. With `overwrite == false` an existing blob is
    /// left alone and `BlobError::AlreadyExists` is returned.
    async fn upload(
        &self,
        container: &str,
        path: &str,
        data: Bytes,
        overwrite: bool,
    ) -> Result<(), BlobError>;

    async fn container_exists(&self, container: &str) -> Result<bool, BlobError>;
}

#[derive(Debug)]
enum Backend {
    Azure(AzureConnection),
    Local { root: PathBuf },
    Memory,
}

/// [`BlobStore`] backed by one `object_store` client per container
#[derive(Debug)]
pub struct ObjectStoreBlobStore {
    backend: Backend,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreBlobStore {
    pub fn new(connection: StorageConnection) -> Self {
        let backend = match connection {
            StorageConnection::Azure(azure) => Backend::Azure(azure),
            StorageConnection::Local { root } => Backend::Local { root },
        };
        Self {
            backend,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_connection_string(raw: &str) -> Result<Self, BlobError> {
        StorageConnection::parse(raw).map(Self::new)
    }

    /// In-memory store holding exactly the given (initially empty) containers
    pub fn in_memory<I, S>(containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stores = containers
            .into_iter()
            .map(|name| (name.into(), Arc::new(InMemory::new()) as Arc<dyn ObjectStore>))
            .collect();
        Self {
            backend: Backend::Memory,
            stores: RwLock::new(stores),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Azure(_) => "azure",
            Backend::Local { .. } => "local",
            Backend::Memory => "memory",
        }
    }

    async fn store(&self, container: &str) -> Result<Arc<dyn ObjectStore>, BlobError> {
        if let Some(store) = self.stores.read().await.get(container) {
            return Ok(Arc::clone(store));
        }

        let store = self.build_store(container)?;
        let mut stores = self.stores.write().await;
        let entry = stores
            .entry(container.to_string())
            .or_insert_with(|| Arc::clone(&store));
        Ok(Arc::clone(entry))
    }

    fn build_store(&self, container: &str) -> Result<Arc<dyn ObjectStore>, BlobError> {
        match &self.backend {
            Backend::Azure(azure) => {
                let mut builder = MicrosoftAzureBuilder::new().with_container_name(container);
                if azure.emulator {
                    builder = builder.with_use_emulator(true);
                }
                if let Some(account) = &azure.account {
                    builder = builder.with_account(account);
                }
                if let Some(key) = &azure.access_key {
                    builder = builder.with_access_key(key);
                }
                if let Some(sas) = &azure.sas {
                    builder = builder.with_config(AzureConfigKey::SasKey, sas);
                }
                if let Some(endpoint) = &azure.endpoint {
                    builder = builder.with_endpoint(endpoint.clone());
                }
                let store = builder
                    .build()
                    .map_err(|e| BlobError::Configuration(e.to_string()))?;
                Ok(Arc::new(store))
            }
            Backend::Local { root } => {
                let dir = root.join(container);
                if !dir.is_dir() {
                    return Err(BlobError::NotFound(format!("container '{}'", container)));
                }
                let store = LocalFileSystem::new_with_prefix(&dir)?;
                Ok(Arc::new(store))
            }
            Backend::Memory => Err(BlobError::NotFound(format!("container '{}'", container))),
        }
    }
}

/// Blob names are used as-is; `Path::from` would percent-encode them and a
/// listed name would no longer address the same object.
fn object_path(path: &str) -> Result<Path, BlobError> {
    Path::parse(path)
        .map_err(|e| BlobError::Backend(format!("invalid blob path '{}': {}", path, e)))
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        let store = self.store(container).await?;
        let prefix = prefix.trim_start_matches('/');
        // object_store matches prefixes by whole segment, so list the parent
        // folder and match the name prefix here.
        let parent = match prefix.rfind('/') {
            Some(end) if end > 0 => Some(object_path(&prefix[..end])?),
            _ => None,
        };

        let objects: Vec<_> = store.list(parent.as_ref()).try_collect().await?;
        let mut paths: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .filter(|path| path.starts_with(prefix))
            .collect();
        // Listing order differs between backends; keep runs comparable.
        paths.sort();
        Ok(paths)
    }

    async fn exists(&self, container: &str, path: &str) -> Result<bool, BlobError> {
        let store = self.store(container).await?;
        match store.head(&object_path(path)?).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn download(&self, container: &str, path: &str) -> Result<Bytes, BlobError> {
        let store = self.store(container).await?;
        let result = store.get(&object_path(path)?).await?;
        Ok(result.bytes().await?)
    }

    async fn upload(
        &self,
        container: &str,
        path: &str,
        data: Bytes,
        overwrite: bool,
    ) -> Result<(), BlobError> {
        let store = self.store(container).await?;
        let mode = if overwrite {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };
        let options = PutOptions {
            mode,
            ..Default::default()
        };
        store
            .put_opts(&object_path(path)?, PutPayload::from(data), options)
            .await?;
        Ok(())
    }

    async fn container_exists(&self, container: &str) -> Result<bool, BlobError> {
        match &self.backend {
            Backend::Memory => Ok(self.stores.read().await.contains_key(container)),
            Backend::Local { root } => Ok(tokio::fs::metadata(root.join(container))
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false)),
            Backend::Azure(_) => {
                let store = self.store(container).await?;
                match store.list_with_delimiter(None).await {
                    Ok(_) => Ok(true),
                    Err(object_store::Error::NotFound { .. }) => Ok(false),
                    // The Azure client reports a missing container on list as a
                    // generic request error carrying the service's error code.
                    Err(e) if e.to_string().contains("ContainerNotFound") => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip_and_listing() {
        let store = ObjectStoreBlobStore::in_memory(["file-container"]);
        assert!(store.container_exists("file-container").await.unwrap());
        assert!(!store.container_exists("missing").await.unwrap());

        store
            .upload("file-container", "source/b.png", Bytes::from_static(b"b"), true)
            .await
            .unwrap();
        store
            .upload("file-container", "source/a.png", Bytes::from_static(b"a"), true)
            .await
            .unwrap();
        store
            .upload("file-container", "other/c.png", Bytes::from_static(b"c"), true)
            .await
            .unwrap();

        let listed = store.list("file-container", "source").await.unwrap();
        assert_eq!(listed, vec!["source/a.png", "source/b.png"]);

        let all = store.list("file-container", "").await.unwrap();
        assert_eq!(all.len(), 3);

        let bytes = store.download("file-container", "source/a.png").await.unwrap();
        assert_eq!(&bytes[..], b"a");
    }

    #[tokio::test]
    async fn test_exists_and_create_only_upload() {
        let store = ObjectStoreBlobStore::in_memory(["c1"]);
        assert!(!store.exists("c1", "out/x.png").await.unwrap());

        store
            .upload("c1", "out/x.png", Bytes::from_static(b"one"), false)
            .await
            .unwrap();
        assert!(store.exists("c1", "out/x.png").await.unwrap());

        let second = store
            .upload("c1", "out/x.png", Bytes::from_static(b"two"), false)
            .await;
        assert!(matches!(second, Err(BlobError::AlreadyExists(_))));

        store
            .upload("c1", "out/x.png", Bytes::from_static(b"three"), true)
            .await
            .unwrap();
        let bytes = store.download("c1", "out/x.png").await.unwrap();
        assert_eq!(&bytes[..], b"three");
    }

    #[tokio::test]
    async fn test_reserved_characters_survive_listing() {
        let store = ObjectStoreBlobStore::in_memory(["c1"]);
        store
            .upload("c1", "source/photo #1.png", Bytes::from_static(b"one"), true)
            .await
            .unwrap();
        store
            .upload("c1", "source/50% [draft].jpg", Bytes::from_static(b"two"), true)
            .await
            .unwrap();

        let listed = store.list("c1", "source").await.unwrap();
        assert_eq!(listed, vec!["source/50% [draft].jpg", "source/photo #1.png"]);

        for path in &listed {
            assert!(store.exists("c1", path).await.unwrap());
            assert!(!store.download("c1", path).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_list_matches_name_prefix() {
        let store = ObjectStoreBlobStore::in_memory(["c1"]);
        for path in ["source/a.png", "source2/b.png", "src/photo1.png", "src/other.png"] {
            store
                .upload("c1", path, Bytes::from_static(b"x"), true)
                .await
                .unwrap();
        }

        assert_eq!(
            store.list("c1", "source").await.unwrap(),
            vec!["source/a.png", "source2/b.png"]
        );
        assert_eq!(store.list("c1", "source/").await.unwrap(), vec!["source/a.png"]);
        assert_eq!(store.list("c1", "src/pho").await.unwrap(), vec!["src/photo1.png"]);
        assert!(store.list("c1", "nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_listing_keeps_raw_names() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("c1").join("source")).unwrap();
        std::fs::write(root.path().join("c1").join("source/photo #1.png"), b"png").unwrap();

        let store = ObjectStoreBlobStore::new(StorageConnection::Local {
            root: root.path().to_path_buf(),
        });
        let listed = store.list("c1", "source").await.unwrap();
        assert_eq!(listed, vec!["source/photo #1.png"]);
        assert_eq!(&store.download("c1", &listed[0]).await.unwrap()[..], b"png");
    }

    #[tokio::test]
    async fn test_unknown_memory_container() {
        let store = ObjectStoreBlobStore::in_memory(["c1"]);
        assert!(matches!(
            store.download("nope", "a.png").await,
            Err(BlobError::NotFound(_))
        ));
        assert!(matches!(
            store.download("c1", "a.png").await,
            Err(BlobError::NotFound(_))
        ));
    }
}
