use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::*;

use crate::StoreError;

const MAX_FILENAME_BYTES: usize = 255;
const STAGING_DIR: &str = ".staging";

/// Reduces a client-supplied filename to a single safe path component.
///
/// Directory parts (either separator) are dropped, so `../../etc/passwd`
/// becomes `passwd`. Names that end up empty, `.`/`..`, too long, or holding
/// control characters are rejected.
pub fn sanitize_filename(raw: &str) -> Result<String, StoreError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(StoreError::InvalidUpload(format!(
            "Invalid filename: {:?}",
            raw
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(StoreError::InvalidUpload(
            "Filename contains control characters".to_string(),
        ));
    }
    if name.len() > MAX_FILENAME_BYTES {
        return Err(StoreError::InvalidUpload(format!(
            "Filename longer than {} bytes",
            MAX_FILENAME_BYTES
        )));
    }
    Ok(name.to_string())
}

/// An upload fully received but not yet visible under its name.
/// Dropping it deletes the received bytes.
#[derive(Debug)]
pub struct StagedUpload {
    temp: TempPath,
    size: u64,
}

impl StagedUpload {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.temp
    }
}

/// The `uploads/{notebookId}/{filename}` tree.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UploadDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn notebook_dir(&self, notebook_id: i64) -> PathBuf {
        self.root.join(notebook_id.to_string())
    }

    /// URL under which the static mount serves the stored file.
    pub fn public_path(notebook_id: i64, filename: &str) -> String {
        format!("/uploads/{}/{}", notebook_id, filename)
    }

    /// Where uploads are received before they are committed under their name.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Streams `content` into a temporary file in the staging folder.
    /// Nothing under a notebook's folder changes until `commit`; on error the
    /// partial file is removed.
    pub async fn receive<S, B, E>(&self, content: S) -> Result<StagedUpload, StoreError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let staging = self.staging_dir();
        tokio::fs::create_dir_all(&staging).await?;
        let (file, temp) = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&staging)?
            .into_parts();
        trace!("upload starting, in {}", temp.display());

        let mut file = tokio::fs::File::from_std(file);
        let mut size: u64 = 0;
        futures::pin_mut!(content);
        while let Some(item) = content.next().await {
            match item {
                Ok(chunk) => {
                    let chunk = chunk.as_ref();
                    file.write_all(chunk).await?;
                    size += chunk.len() as u64;
                }
                Err(e) => {
                    return Err(StoreError::InvalidUpload(format!(
                        "Stream read error: {}",
                        e
                    )));
                }
            }
        }
        file.flush().await?;

        debug!("upload received, in {}, {} bytes", temp.display(), size);
        Ok(StagedUpload { temp, size })
    }

    /// Moves a received upload to `{notebook_id}/{filename}`, replacing any
    /// file with the same name. Returns its size in bytes.
    pub async fn commit(
        &self,
        staged: StagedUpload,
        notebook_id: i64,
        filename: &str,
    ) -> Result<u64, StoreError> {
        let dir = self.notebook_dir(notebook_id);
        tokio::fs::create_dir_all(&dir).await?;
        let destination = dir.join(filename);

        tokio::fs::rename(&staged.temp, &destination).await?;
        // renamed away, nothing left for the temp path to clean up
        let _ = staged.temp.keep();

        debug!("upload ready, in {}", destination.display());
        Ok(staged.size)
    }

    /// Removes every file uploaded for the notebook. A missing folder is fine.
    pub async fn remove(&self, notebook_id: i64) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(self.notebook_dir(notebook_id)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
