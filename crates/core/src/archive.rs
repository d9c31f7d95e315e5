//! Directory snapshots as gzip-compressed tar artifacts

use crate::layout;
use crate::stage::Snapshotter;
use flate2::{write::GzEncoder, Compression};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Builder, Header};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors produced while snapshotting a directory
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Directory has no usable name: {0}")]
    Unnamed(PathBuf),

    #[error("Failed to create archive {path}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("Failed to walk {path}: {source}")]
    Walk { path: PathBuf, source: walkdir::Error },

    #[error("Failed to add {path} to archive: {source}")]
    Append { path: PathBuf, source: io::Error },

    #[error("Failed to finish archive {path}: {source}")]
    Finish { path: PathBuf, source: io::Error },
}

/// Writes directory snapshots into the monitored root
#[derive(Debug, Clone)]
pub struct Archiver {
    /// Where artifacts are written (the monitored root)
    output_dir: PathBuf,
    /// Artifact extension without the leading dot
    extension: String,
}

impl Archiver {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Snapshot `dir` into `<output_dir>/<name>-<unix_secs>.<ext>`
    ///
    /// Every regular file below `dir` is stored under its path relative to
    /// `dir`. Directories, symlinks and special files are not stored. On any
    /// error the partial artifact is removed before returning.
    pub fn archive(&self, dir: &Path) -> Result<PathBuf, ArchiveError> {
        if !dir.is_dir() {
            return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
        }

        let dir_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArchiveError::Unnamed(dir.to_path_buf()))?;

        let name = layout::artifact_name(dir_name, unix_now_secs(), &self.extension);
        let artifact = self.output_dir.join(name);

        // Never clobber an artifact that may still be queued for delivery
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&artifact)
            .map_err(|source| ArchiveError::Create {
                path: artifact.clone(),
                source,
            })?;

        match write_tree(dir, &artifact, file) {
            Ok(()) => Ok(artifact),
            Err(e) => {
                if let Err(rm) = fs::remove_file(&artifact) {
                    tracing::warn!("Failed to remove partial archive {}: {}", artifact.display(), rm);
                }
                Err(e)
            }
        }
    }
}

impl Snapshotter for Archiver {
    fn snapshot(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        Ok(self.archive(dir)?)
    }
}

fn write_tree(dir: &Path, artifact: &Path, file: File) -> Result<(), ArchiveError> {
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| ArchiveError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = match path.strip_prefix(dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };

        append_file(&mut builder, path, relative).map_err(|source| ArchiveError::Append {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let finish = |source| ArchiveError::Finish {
        path: artifact.to_path_buf(),
        source,
    };

    let encoder = builder.into_inner().map_err(finish)?;
    let mut writer = encoder.finish().map_err(finish)?;
    writer.flush().map_err(finish)?;
    writer
        .into_inner()
        .map_err(|e| finish(e.into_error()))?
        .sync_all()
        .map_err(finish)?;

    Ok(())
}

/// Append one regular file, sized from the open handle
fn append_file<W: Write>(builder: &mut Builder<W>, path: &Path, relative: &Path) -> io::Result<()> {
    let file = File::open(path)?;
    let meta = file.metadata()?;
    append_open(builder, &file, &meta, relative)
}

/// The header promises `meta.len()` bytes. A file that shrank since then is
/// an error; bytes appended after that point are left out.
fn append_open<W: Write>(
    builder: &mut Builder<W>,
    file: &File,
    meta: &fs::Metadata,
    relative: &Path,
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_metadata(meta);

    let data = SizedReader {
        inner: file.take(meta.len()),
        remaining: meta.len(),
    };
    builder.append_data(&mut header, relative, data)
}

/// Reads exactly `remaining` bytes or fails with `UnexpectedEof`
struct SizedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for SizedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank while archiving ({} bytes missing)", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
