// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-granularity file storage behind a CFDP entity.
//!
//! All operations are expressed against paths relative to a configured root
//! directory; the [`OsFilestore`] implementation refuses absolute paths and
//! any component that would climb out of the root. Failures come back as a
//! taxonomised [`FilestoreError`] which the receive state machine maps onto
//! the `FilestoreRejection` condition code.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

// ============================================================================
// Errors
// ============================================================================

/// Taxonomised filestore rejection.
#[derive(Debug)]
pub enum FilestoreError {
    /// Path does not exist.
    NotFound(PathBuf),
    /// Path already exists where it must not.
    AlreadyExists(PathBuf),
    /// Path is absolute or escapes the configured root.
    PathEscape(PathBuf),
    /// Underlying I/O failure.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for FilestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilestoreError::NotFound(path) => write!(f, "not found: {}", path.display()),
            FilestoreError::AlreadyExists(path) => {
                write!(f, "already exists: {}", path.display())
            }
            FilestoreError::PathEscape(path) => {
                write!(f, "path escapes filestore root: {}", path.display())
            }
            FilestoreError::Io { path, source } => {
                write!(f, "i/o failure on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for FilestoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilestoreError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl FilestoreError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => FilestoreError::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => FilestoreError::AlreadyExists(path.to_path_buf()),
            _ => FilestoreError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

// ============================================================================
// Contract
// ============================================================================

/// Filestore operations surface consumed by the transaction state machines.
pub trait Filestore: Send + Sync {
    fn read_all(&self, path: &str) -> Result<Vec<u8>, FilestoreError>;
    fn write_all(&self, path: &str, data: &[u8]) -> Result<(), FilestoreError>;
    fn exists(&self, path: &str) -> bool;
    fn size_of(&self, path: &str) -> Result<u64, FilestoreError>;
    fn create_file(&self, path: &str) -> Result<(), FilestoreError>;
    fn delete_file(&self, path: &str) -> Result<(), FilestoreError>;
    fn rename(&self, from: &str, to: &str) -> Result<(), FilestoreError>;
    /// Append the contents of `source` to `target`.
    fn append(&self, target: &str, source: &str) -> Result<(), FilestoreError>;
    /// Replace the contents of `target` with the contents of `source`.
    fn replace(&self, target: &str, source: &str) -> Result<(), FilestoreError>;
    fn create_directory(&self, path: &str) -> Result<(), FilestoreError>;
    fn remove_directory(&self, path: &str) -> Result<(), FilestoreError>;
}

// ============================================================================
// OS-backed implementation
// ============================================================================

/// Filestore rooted at a directory on the local filesystem.
pub struct OsFilestore {
    root: PathBuf,
}

impl OsFilestore {
    /// Bind to `root`. The directory is created on first write if absent.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path under the root, rejecting traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf, FilestoreError> {
        let rel = Path::new(path);
        if rel.is_absolute() {
            return Err(FilestoreError::PathEscape(rel.to_path_buf()));
        }
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(FilestoreError::PathEscape(rel.to_path_buf())),
            }
        }
        Ok(self.root.join(rel))
    }
}

impl Filestore for OsFilestore {
    fn read_all(&self, path: &str) -> Result<Vec<u8>, FilestoreError> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| FilestoreError::from_io(&full, e))
    }

    fn write_all(&self, path: &str, data: &[u8]) -> Result<(), FilestoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| FilestoreError::from_io(parent, e))?;
        }
        fs::write(&full, data).map_err(|e| FilestoreError::from_io(&full, e))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|full| full.exists()).unwrap_or(false)
    }

    fn size_of(&self, path: &str) -> Result<u64, FilestoreError> {
        let full = self.resolve(path)?;
        fs::metadata(&full)
            .map(|m| m.len())
            .map_err(|e| FilestoreError::from_io(&full, e))
    }

    fn create_file(&self, path: &str) -> Result<(), FilestoreError> {
        let full = self.resolve(path)?;
        if full.exists() {
            return Err(FilestoreError::AlreadyExists(full));
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| FilestoreError::from_io(parent, e))?;
        }
        fs::File::create(&full)
            .map(|_| ())
            .map_err(|e| FilestoreError::from_io(&full, e))
    }

    fn delete_file(&self, path: &str) -> Result<(), FilestoreError> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).map_err(|e| FilestoreError::from_io(&full, e))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), FilestoreError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        fs::rename(&src, &dst).map_err(|e| FilestoreError::from_io(&src, e))
    }

    fn append(&self, target: &str, source: &str) -> Result<(), FilestoreError> {
        use std::io::Write;

        let src = self.resolve(source)?;
        let dst = self.resolve(target)?;
        let data = fs::read(&src).map_err(|e| FilestoreError::from_io(&src, e))?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&dst)
            .map_err(|e| FilestoreError::from_io(&dst, e))?;
        file.write_all(&data)
            .map_err(|e| FilestoreError::from_io(&dst, e))
    }

    fn replace(&self, target: &str, source: &str) -> Result<(), FilestoreError> {
        let src = self.resolve(source)?;
        let dst = self.resolve(target)?;
        if !dst.exists() {
            return Err(FilestoreError::NotFound(dst));
        }
        let data = fs::read(&src).map_err(|e| FilestoreError::from_io(&src, e))?;
        fs::write(&dst, data).map_err(|e| FilestoreError::from_io(&dst, e))
    }

    fn create_directory(&self, path: &str) -> Result<(), FilestoreError> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).map_err(|e| FilestoreError::from_io(&full, e))
    }

    fn remove_directory(&self, path: &str) -> Result<(), FilestoreError> {
        let full = self.resolve(path)?;
        fs::remove_dir(&full).map_err(|e| FilestoreError::from_io(&full, e))
    }
}
