use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Converts a `/`-separated destination into a path that stays below the root.
///
/// Absolute paths, drive prefixes, `..` and empty names are refused.
pub fn safe_relative_path(destination: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for segment in destination.split(['/', '\\']) {
        if segment.is_empty() {
            if path.as_os_str().is_empty() {
                // Leading separator: absolute path.
                return None;
            }
            continue;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => path.push(name),
            _ => return None,
        }
    }
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

/// A file being written under a temporary name in its final directory.
///
/// Dropping it without [`StagedFile::commit`] removes the partial data.
pub struct StagedFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Stages `relative` below `root`, creating intermediate directories.
    pub fn create(root: &Path, relative: &Path) -> Result<Self, PersistError> {
        let target = root.join(relative);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        ensure_output_dir(&dir)?;
        let tmp = NamedTempFile::new_in(&dir)?;
        Ok(Self { tmp, target })
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PersistError> {
        self.tmp.write_all(chunk)?;
        Ok(())
    }

    /// Moves the data into place. An existing file is kept and the new one is
    /// saved as `name (1).ext`, `name (2).ext`, ...
    pub fn commit(mut self) -> Result<PathBuf, PersistError> {
        self.tmp.flush()?;
        self.tmp.as_file_mut().sync_all()?;
        let mut candidate = self.target.clone();
        let mut n = 0;
        loop {
            match self.tmp.persist_noclobber(&candidate) {
                Ok(_) => return Ok(candidate),
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                    self.tmp = err.file;
                    n += 1;
                    candidate = uniquified(&self.target, n);
                }
                Err(err) => return Err(PersistError::Io(err.error)),
            }
        }
    }
}

fn uniquified(target: &Path, n: usize) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };
    target.with_file_name(name)
}
