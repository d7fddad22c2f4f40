use serde_json::error::Category;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::*;

use crate::uploads::StagedUpload;
use crate::{Notebook, SourceRef, StoreError, UploadDir};

/// The notebook collection, persisted as one JSON array in one file.
///
/// Nothing is cached: each operation reads the whole file and every mutation
/// rewrites it. `lock` is held for the whole read-modify-write of every
/// operation, so concurrent requests cannot lose each other's updates.
/// Upload bodies are received before the lock is taken (see `UploadDir::receive`).
pub struct NotebookStore {
    db_file: PathBuf,
    uploads: UploadDir,
    lock: Mutex<()>,
}

impl NotebookStore {
    pub fn new(db_file: impl Into<PathBuf>, uploads: UploadDir) -> Self {
        NotebookStore {
            db_file: db_file.into(),
            uploads,
            lock: Mutex::new(()),
        }
    }

    pub fn db_file(&self) -> &Path {
        &self.db_file
    }

    pub fn uploads(&self) -> &UploadDir {
        &self.uploads
    }

    /// All notebooks, most recently created first.
    pub async fn list(&self) -> Result<Vec<Notebook>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// First notebook carrying `id`.
    pub async fn get(&self, id: i64) -> Result<Notebook, StoreError> {
        let _guard = self.lock.lock().await;
        self.load()
            .await?
            .into_iter()
            .find(|nb| nb.id == id)
            .ok_or(StoreError::NotebookNotFound)
    }

    /// Inserts at the front. Ids are not checked for collisions.
    pub async fn create(&self, notebook: Notebook) -> Result<Notebook, StoreError> {
        let _guard = self.lock.lock().await;
        let mut notebooks = self.load().await?;
        notebooks.insert(0, notebook.clone());
        self.save(&notebooks).await?;
        info!("Created notebook id={} title={}", notebook.id, notebook.title);
        Ok(notebook)
    }

    /// Removes every notebook carrying `id`, then their uploaded files.
    /// Returns how many records were removed.
    pub async fn delete(&self, id: i64) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut notebooks = self.load().await?;
        let initial_len = notebooks.len();
        notebooks.retain(|nb| nb.id != id);
        let removed = initial_len - notebooks.len();
        if removed == 0 {
            return Err(StoreError::NotebookNotFound);
        }
        self.save(&notebooks).await?;

        if let Err(e) = self.uploads.remove(id).await {
            warn!("Could not remove uploads of notebook id={}: {}", id, e);
        }
        info!("Deleted notebook id={} ({} record(s))", id, removed);
        Ok(removed)
    }

    /// Moves a received upload under notebook `id` and appends its source
    /// reference to the first notebook carrying that id. If the notebook is
    /// gone by now, the staged bytes are discarded.
    pub async fn attach_upload(
        &self,
        id: i64,
        filename: &str,
        content_type: &str,
        staged: StagedUpload,
    ) -> Result<SourceRef, StoreError> {
        let _guard = self.lock.lock().await;
        let mut notebooks = self.load().await?;
        let notebook = notebooks
            .iter_mut()
            .find(|nb| nb.id == id)
            .ok_or(StoreError::NotebookNotFound)?;

        let size = self.uploads.commit(staged, id, filename).await?;
        let source = SourceRef {
            name: filename.to_string(),
            path: UploadDir::public_path(id, filename),
            size: size.to_string(),
            content_type: Some(content_type.to_string()),
        };
        notebook.sources.push(source.clone());
        self.save(&notebooks).await?;

        info!("Attached {} ({} bytes) to notebook id={}", filename, size, id);
        Ok(source)
    }

    async fn load(&self) -> Result<Vec<Notebook>, StoreError> {
        let raw = match tokio::fs::read(&self.db_file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&raw) {
            Ok(notebooks) => Ok(notebooks),
            // well-formed JSON we cannot map is left alone for someone to look at
            Err(e) if e.classify() == Category::Data => {
                error!("{} has unexpected content: {}", self.db_file.display(), e);
                Err(e.into())
            }
            Err(e) => {
                warn!(
                    "{} is corrupted or empty ({}). Starting with an empty list.",
                    self.db_file.display(),
                    e
                );
                self.save(&[]).await?;
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, notebooks: &[Notebook]) -> Result<(), StoreError> {
        if let Some(parent) = self.db_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(notebooks)?;
        tokio::fs::write(&self.db_file, data).await?;
        trace!("Saved {} notebook(s) to {}", notebooks.len(), self.db_file.display());
        Ok(())
    }
}
