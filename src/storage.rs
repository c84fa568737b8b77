// SPDX-License-Identifier: GPL-3.0-only

//! Image sinks for finished photos
//!
//! The still pipeline hands `(bytes, suggested_name)` to an [`ImageSink`].
//! [`DirectorySink`] writes into a directory on disk, [`MemorySink`] keeps
//! the images in memory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Failure reported by an image sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError(pub String);

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError(err.to_string())
    }
}

impl From<SinkError> for crate::errors::PhotoError {
    fn from(err: SinkError) -> Self {
        crate::errors::PhotoError::SaveFailed(err.0)
    }
}

/// Consumer of encoded photos
///
/// Called from a blocking task, never from the session worker itself.
pub trait ImageSink: Send + Sync {
    /// Persist `bytes`; returns a locator for the stored image
    fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, SinkError>;
}

/// Timestamped photo file name (`IMG_YYYYMMDD_HHMMSS.jpg`)
pub fn photo_file_name() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("IMG_{}.jpg", timestamp)
}

/// Writes photos into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First path for `name` that does not exist yet
    ///
    /// `IMG_x.jpg` becomes `IMG_x_1.jpg`, `IMG_x_2.jpg`, ... on collision.
    fn unique_path(&self, name: &str) -> PathBuf {
        let candidate = self.dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut n = 1u32;
        loop {
            let candidate = self.dir.join(format!("{}_{}{}", stem, n, ext));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl ImageSink for DirectorySink {
    fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, SinkError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.unique_path(suggested_name);
        std::fs::write(&path, bytes)?;
        info!(path = %path.display(), size = bytes.len(), "Photo saved");
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Keeps saved photos in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    images: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved `(name, bytes)` pairs in save order
    pub fn images(&self) -> Vec<(String, Vec<u8>)> {
        match self.images.lock() {
            Ok(images) => images.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ImageSink for MemorySink {
    fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String, SinkError> {
        let mut images = self
            .images
            .lock()
            .map_err(|_| SinkError("memory sink lock poisoned".to_string()))?;
        images.push((suggested_name.to_string(), bytes.to_vec()));
        debug!(name = suggested_name, count = images.len(), "Photo kept in memory");
        Ok(format!("memory:{}", suggested_name))
    }
}
