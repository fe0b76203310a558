//! Local media store for uploaded images and generated speech assets.
//!
//! Fills the hosted-image-store role with a directory on disk: uploads
//! get a generated name, retrieval is a keyed fetch with the key pinned
//! to a bare file name.

use mesa_common::error::MesaError;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist uploaded bytes under a generated name, returning the URL
    /// path clients fetch it back from.
    pub async fn save_image(&self, original_name: &str, bytes: &[u8]) -> Result<String, MesaError> {
        if bytes.is_empty() {
            return Err(MesaError::Validation("empty image upload".into()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let file_name = format!("{}.{ext}", Uuid::new_v4());
        tokio::fs::write(self.dir.join(&file_name), bytes)
            .await
            .map_err(|e| MesaError::Upstream(format!("image write: {e}")))?;

        info!("Stored image {file_name} ({} bytes)", bytes.len());
        Ok(format!("/media/{file_name}"))
    }

    /// Resolve a stored asset by name. Only bare file names are valid
    /// keys; anything path-like is rejected before touching the disk.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, MesaError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
        {
            return Err(MesaError::Validation(format!("bad asset name: {name}")));
        }
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(MesaError::NotFound(format!("asset {name}")));
        }
        Ok(path)
    }
}
