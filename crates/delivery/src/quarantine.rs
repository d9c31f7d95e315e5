//! Quarantine area for artifacts that exhausted their retries

use monitor_core::layout;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("Failed to create quarantine directory {path}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("Artifact has no file name: {0}")]
    Unnamed(PathBuf),

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// `<monitor_dir>/.failed_uploads`
///
/// Quarantined artifacts keep their base name. A name that is already taken
/// gets a numeric suffix so earlier failures are never overwritten.
#[derive(Debug, Clone)]
pub struct Quarantine {
    dir: PathBuf,
}

impl Quarantine {
    /// Open (creating if needed) the quarantine of a monitored root
    pub fn open(monitor_dir: &Path) -> Result<Self, QuarantineError> {
        let dir = layout::quarantine_dir(monitor_dir);
        std::fs::create_dir_all(&dir).map_err(|source| QuarantineError::Create {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `artifact` into quarantine, returning its new location
    ///
    /// On failure the artifact stays where it was.
    pub async fn admit(&self, artifact: &Path) -> Result<PathBuf, QuarantineError> {
        let name = artifact
            .file_name()
            .ok_or_else(|| QuarantineError::Unnamed(artifact.to_path_buf()))?;

        let mut dest = self.dir.join(name);
        let mut n = 1u32;
        while tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            dest = self.dir.join(numbered_name(Path::new(name), n));
            n += 1;
        }

        tokio::fs::rename(artifact, &dest)
            .await
            .map_err(|source| QuarantineError::Move {
                from: artifact.to_path_buf(),
                to: dest.clone(),
                source,
            })?;

        Ok(dest)
    }
}

/// `mods-1.rwmod` -> `mods-1.<n>.rwmod`
fn numbered_name(name: &Path, n: u32) -> String {
    let stem = name.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    match name.extension() {
        Some(ext) => format!("{}.{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}.{}", stem, n),
    }
}
