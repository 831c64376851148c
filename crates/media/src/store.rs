//! Private temp directory holding generated images until the host sends them.

use std::{
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use {
    tempfile::TempDir,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    image_ops,
};

const DIR_PREFIX: &str = "gemini_exp_";

struct Inner {
    dir: Option<TempDir>,
    files: Vec<PathBuf>,
}

/// Owns the directory generated images are written to.
///
/// Files are named `gemini_result_<unix_millis>_<n>.png`; the counter keeps
/// names unique when several images are saved within the same millisecond.
pub struct ResultImageStore {
    root: PathBuf,
    inner: Mutex<Inner>,
    counter: AtomicU64,
}

impl ResultImageStore {
    /// Create a fresh directory under the system temp dir.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(DIR_PREFIX).tempdir()?;
        Ok(Self::from_dir(dir))
    }

    /// Create the directory under `parent` instead.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(parent)?;
        Ok(Self::from_dir(dir))
    }

    fn from_dir(dir: TempDir) -> Self {
        let root = dir.path().to_path_buf();
        debug!(dir = %root.display(), "result image directory created");
        Self {
            root,
            inner: Mutex::new(Inner {
                dir: Some(dir),
                files: Vec::new(),
            }),
            counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// Paths saved so far and not yet cleaned up.
    pub fn files(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .map(|inner| inner.files.clone())
            .unwrap_or_default()
    }

    /// Decode a generated image and store it as PNG, returning its path.
    pub async fn save_png(&self, data: Vec<u8>) -> Result<PathBuf> {
        let png = tokio::task::spawn_blocking(move || image_ops::to_png(&data))
            .await
            .map_err(|e| Error::external("image encoding task failed", e))??;

        let path = self.next_path()?;
        tokio::fs::write(&path, &png).await?;
        debug!(path = %path.display(), bytes = png.len(), "saved generated image");

        if let Ok(mut inner) = self.inner.lock() {
            inner.files.push(path.clone());
        }
        Ok(path)
    }

    fn next_path(&self) -> Result<PathBuf> {
        let open = self
            .inner
            .lock()
            .map(|inner| inner.dir.is_some())
            .unwrap_or(false);
        if !open {
            return Err(Error::invalid_input("result image store is closed"));
        }
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(self.root.join(format!("gemini_result_{millis}_{n}.png")))
    }

    /// Delete every saved file and the directory itself.
    ///
    /// Failures are logged and otherwise ignored. Later saves fail.
    pub fn cleanup(&self) {
        let (dir, files) = match self.inner.lock() {
            Ok(mut inner) => (inner.dir.take(), std::mem::take(&mut inner.files)),
            Err(_) => {
                warn!("result image store lock poisoned, skipping cleanup");
                return;
            },
        };

        for file in &files {
            if let Err(e) = std::fs::remove_file(file)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %file.display(), error = %e, "failed to remove generated image");
            }
        }

        if let Some(dir) = dir {
            match dir.close() {
                Ok(()) => info!(dir = %self.root.display(), "result image directory removed"),
                Err(e) => {
                    warn!(dir = %self.root.display(), error = %e, "failed to remove result image directory")
                },
            }
        }
    }
}

impl std::fmt::Debug for ResultImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultImageStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::image_ops::test_support::png};

    #[tokio::test]
    async fn saves_png_files_with_unique_names() {
        let parent = tempfile::tempdir().unwrap();
        let store = ResultImageStore::new_in(parent.path()).unwrap();
        assert!(
            store
                .dir()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("gemini_exp_")
        );

        let a = store.save_png(png(2, 2)).await.unwrap();
        let b = store.save_png(png(2, 2)).await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(store.dir()));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("gemini_result_") && name.ends_with(".png"));

        let (.., format) = image_ops::get_image_metadata(&std::fs::read(&b).unwrap()).unwrap();
        assert_eq!(format, Some(image::ImageFormat::Png));
        assert_eq!(store.files(), vec![a, b]);
    }

    #[tokio::test]
    async fn undecodable_payload_is_not_saved() {
        let store = ResultImageStore::new().unwrap();
        assert!(store.save_png(b"nope".to_vec()).await.is_err());
        assert!(store.files().is_empty());
        store.cleanup();
    }

    #[tokio::test]
    async fn cleanup_removes_files_and_directory() {
        let store = ResultImageStore::new().unwrap();
        let path = store.save_png(png(1, 1)).await.unwrap();
        let dir = store.dir().to_path_buf();

        store.cleanup();
        assert!(!path.exists());
        assert!(!dir.exists());
        assert!(store.files().is_empty());

        // Second cleanup is a no-op and saving afterwards fails.
        store.cleanup();
        assert!(store.save_png(png(1, 1)).await.is_err());
    }
}
