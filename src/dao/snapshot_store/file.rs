use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::{debug, warn};

use crate::dao::{
    models::{EventDocument, EventId},
    snapshot_store::SnapshotStore,
    storage::{StoreError, StoreResult},
};

const EXTENSION: &str = ".json";

/// Snapshot store keeping `<root>/<id>.json` files on the local disk.
#[derive(Clone)]
pub struct FileSnapshotStore {
    root: Arc<Path>,
}

impl FileSnapshotStore {
    /// Open the store, creating the cache directory when it does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root: PathBuf = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::io(&root, source))?;
        Ok(Self {
            root: Arc::from(root),
        })
    }

    /// Directory holding the documents.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: EventId) -> PathBuf {
        self.root.join(format!("{id}{EXTENSION}"))
    }

    async fn read_document(&self, id: EventId) -> StoreResult<EventDocument> {
        let path = self.document_path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { id });
            }
            Err(source) => return Err(StoreError::io(path, source)),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { id, source })
    }

    /// Write through a temporary sibling and rename it over the target, so
    /// readers only ever observe whole documents.
    async fn write_document(&self, id: EventId, document: &EventDocument) -> StoreResult<()> {
        let payload =
            serde_json::to_vec(document).map_err(|source| StoreError::Encode { id, source })?;

        let path = self.document_path(id);
        let temp_path = self
            .root
            .join(format!(".{id}.{:016x}.tmp", rand::random::<u64>()));

        fs::write(&temp_path, &payload)
            .await
            .map_err(|source| StoreError::io(&temp_path, source))?;

        if let Err(source) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::io(path, source));
        }

        Ok(())
    }

    async fn remove_document(&self, id: EventId) -> StoreResult<()> {
        let path = self.document_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::io(path, source)),
        }
    }

    async fn scan_ids(&self) -> StoreResult<Vec<EventId>> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|source| StoreError::io(&*self.root, source))?;

        let mut ids = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|source| StoreError::io(&*self.root, source))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(EXTENSION) else {
                debug!(file = name, "skipping non-document file in cache directory");
                continue;
            };
            match stem.parse::<EventId>() {
                Ok(id) if id > 0 => ids.push(id),
                _ => warn!(file = name, "cache file name is not an event id"),
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self, id: EventId) -> BoxFuture<'static, StoreResult<EventDocument>> {
        let store = self.clone();
        Box::pin(async move { store.read_document(id).await })
    }

    fn write(&self, id: EventId, document: EventDocument) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.write_document(id, &document).await })
    }

    fn evict(&self, id: EventId) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.remove_document(id).await })
    }

    fn list_known_ids(&self) -> BoxFuture<'static, StoreResult<Vec<EventId>>> {
        let store = self.clone();
        Box::pin(async move { store.scan_ids().await })
    }
}
