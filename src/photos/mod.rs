//! Photo storage for meal records.
//!
//! Photos picked by the user are copied into a directory the application
//! owns, so a record never depends on a picker or cache location:
//! ```text
//! <PHOTO_ROOT>/
//!   meal-photos/
//!     <id>.jpg
//! ```
//!
//! A photo reference is the absolute path of its file, as a string.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, StoreError};
use crate::models::generate_id;

/// Name of the managed subdirectory.
pub const PHOTO_DIR_NAME: &str = "meal-photos";

/// Extension of every stored photo.
pub const PHOTO_EXTENSION: &str = "jpg";

const PARTIAL_EXTENSION: &str = "jpg.tmp";

#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    /// Store rooted in the application's private document directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(PHOTO_DIR_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the managed directory on first use.
    pub async fn ensure_directory(&self) -> Result<()> {
        if let Ok(meta) = fs::metadata(&self.dir).await {
            if meta.is_dir() {
                return Ok(());
            }
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::photo(&self.dir, e))?;
        tracing::debug!("Created photo directory {}", self.dir.display());
        Ok(())
    }

    /// Copies the image at `source` into the store and returns its reference.
    ///
    /// The source is read in full and written as a new file; it is never
    /// moved, since it may live on another volume or outside our sandbox.
    pub async fn save(&self, source: &Path) -> Result<String> {
        let bytes = fs::read(source)
            .await
            .map_err(|e| StoreError::photo(source, e))?;

        self.ensure_directory().await?;

        loop {
            let path = self.dir.join(format!("{}.{}", generate_id(), PHOTO_EXTENSION));
            if fs::try_exists(&path)
                .await
                .map_err(|e| StoreError::photo(&path, e))?
            {
                continue;
            }

            let temp_path = path.with_extension(PARTIAL_EXTENSION);
            if let Err(e) = write_new(&temp_path, &bytes).await {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    continue;
                }
                let _ = fs::remove_file(&temp_path).await;
                return Err(StoreError::photo(temp_path, e));
            }

            // Rename within one directory is atomic
            if let Err(e) = fs::rename(&temp_path, &path).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(StoreError::photo(path, e));
            }

            tracing::debug!(
                "Saved photo {} ({} bytes) from {}",
                path.display(),
                bytes.len(),
                source.display()
            );
            return Ok(path.to_string_lossy().into_owned());
        }
    }

    /// Removes a stored photo. Best effort: never fails.
    ///
    /// An already-missing file counts as deleted. Any other I/O error is
    /// logged and swallowed so file cleanup cannot block a record change.
    /// References outside the managed directory are left untouched.
    pub async fn delete(&self, reference: &str) {
        let path = Path::new(reference);
        if !self.owns(path) {
            tracing::warn!("Refusing to delete photo outside {}: {}", self.dir.display(), reference);
            return;
        }

        match fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Deleted photo {}", reference),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Photo already gone: {}", reference)
            }
            Err(e) => tracing::warn!("Failed to delete photo {}: {}", reference, e),
        }
    }

    pub async fn exists(&self, reference: &str) -> bool {
        fs::try_exists(reference).await.unwrap_or(false)
    }

    /// References of every stored photo.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut references = Vec::new();
        for path in self.entries().await? {
            if path.extension().and_then(|e| e.to_str()) == Some(PHOTO_EXTENSION) {
                references.push(path.to_string_lossy().into_owned());
            }
        }
        references.sort();
        Ok(references)
    }

    /// Deletes temp files left behind by an interrupted `save`.
    pub async fn remove_partial_writes(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entries().await? {
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&format!(".{}", PARTIAL_EXTENSION)));
            if !is_partial {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove partial photo {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }

    fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
            && path.extension().and_then(|e| e.to_str()) == Some(PHOTO_EXTENSION)
    }

    /// Regular files in the managed directory; empty if it does not exist yet.
    async fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::photo(&self.dir, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::photo(&self.dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
