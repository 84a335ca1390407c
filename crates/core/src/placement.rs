//! Collision-free placement of uploaded files inside a fixed upload root.
//!
//! [`UploadRoot::resolve`] is a plain exists-check and is racy: two callers
//! resolving the same name concurrently can both receive the same path.
//! Callers that may upload identical filenames concurrently must either
//! serialize those uploads or go through [`UploadRoot::reserve`], which
//! claims the path with a create-exclusive open.

use crate::error::IngestError;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UploadRoot {
    root: PathBuf,
}

impl UploadRoot {
    /// Creates the directory if needed and checks it accepts new files.
    /// Safe to call repeatedly.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let upload_root = Self { root: root.into() };
        fs::create_dir_all(&upload_root.root)
            .map_err(|error| upload_root.placement_error(error.to_string()))?;
        upload_root.ensure_writable()?;
        Ok(upload_root)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn ensure_writable(&self) -> Result<(), IngestError> {
        if !self.root.is_dir() {
            return Err(self.placement_error("not a directory".to_string()));
        }

        let probe = self.root.join(format!(".write-probe-{}", Uuid::new_v4()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&probe)
            .map_err(|error| self.placement_error(error.to_string()))?;
        fs::remove_file(&probe).map_err(|error| self.placement_error(error.to_string()))?;
        Ok(())
    }

    /// First free path for `desired_name`: the name itself, then
    /// `base_1.ext`, `base_2.ext`, ...
    pub fn resolve(&self, desired_name: &str) -> Result<PathBuf, IngestError> {
        let name = sanitize_file_name(desired_name)?;
        let direct = self.root.join(name);
        if !direct.exists() {
            return Ok(direct);
        }

        let (base, extension) = split_extension(name);
        let mut counter = 1u64;
        loop {
            let candidate = self.root.join(numbered_name(base, extension, counter));
            if !candidate.exists() {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    /// Same naming sequence as [`resolve`](Self::resolve), but each candidate
    /// is claimed atomically, so concurrent reservations never share a path.
    pub fn reserve(&self, desired_name: &str) -> Result<(PathBuf, File), IngestError> {
        let name = sanitize_file_name(desired_name)?;
        let (base, extension) = split_extension(name);

        let mut counter = 0u64;
        loop {
            let candidate = if counter == 0 {
                self.root.join(name)
            } else {
                self.root.join(numbered_name(base, extension, counter))
            };

            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => return Ok((candidate, file)),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => counter += 1,
                Err(error)
                    if matches!(
                        error.kind(),
                        ErrorKind::NotFound | ErrorKind::PermissionDenied
                    ) =>
                {
                    return Err(self.placement_error(error.to_string()));
                }
                Err(error) => return Err(IngestError::Io(error)),
            }
        }
    }

    /// Reserves a path and writes `bytes` to it. A partially written file is
    /// removed before the error is returned.
    pub fn persist(&self, desired_name: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
        let (path, mut file) = self.reserve(desired_name)?;

        let written = file.write_all(bytes).and_then(|()| file.sync_all());
        if let Err(error) = written {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(IngestError::Io(error));
        }

        debug!(path = %path.display(), bytes = bytes.len(), "persisted upload");
        Ok(path)
    }

    fn placement_error(&self, reason: String) -> IngestError {
        IngestError::Placement {
            root: self.root.display().to_string(),
            reason,
        }
    }
}

/// Reduces an uploaded name to its final path component.
pub fn sanitize_file_name(desired_name: &str) -> Result<&str, IngestError> {
    let name = desired_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(desired_name)
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(IngestError::InvalidArgument(format!(
            "upload name '{desired_name}' has no usable file name"
        )));
    }
    Ok(name)
}

/// Splits at the last dot that is not part of a leading run of dots, so
/// `a.tar.gz` gives `("a.tar", ".gz")` and `.profile` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(index) => name.split_at(leading_dots + index),
        None => (name, ""),
    }
}

fn numbered_name(base: &str, extension: &str, counter: u64) -> String {
    format!("{base}_{counter}{extension}")
}
