//! Writing candidates to their artifact path.
//!
//! The SXFM writer emits an unnamed header; [`persist`] then rewrites the
//! first line to carry the model name and leaves every other line as is.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fm_core::FeatureModel;
use fm_sxfm::SxfmError;

/// Artifact could not be written or patched.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceFailure {
    #[error("Failed to serialize model: {0}")]
    Write(#[from] SxfmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact {} disappeared after writing", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Artifact {} is empty", .0.display())]
    EmptyArtifact(PathBuf),
}

/// Header line naming the model.
#[must_use]
pub fn named_header(name: &str) -> String {
    format!("<feature_model name=\"{}\">", name)
}

/// Write `model` to `path` (creating or truncating it) and name it `name`.
pub fn persist(model: &FeatureModel, path: &Path, name: &str) -> Result<(), PersistenceFailure> {
    fm_sxfm::write_file(model, path)?;
    patch_header(path, name)
}

/// Replace the first line of `path` with the named header.
pub fn patch_header(path: &Path, name: &str) -> Result<(), PersistenceFailure> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PersistenceFailure::MissingArtifact(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut lines = text.lines();
    if lines.next().is_none() {
        return Err(PersistenceFailure::EmptyArtifact(path.to_path_buf()));
    }

    let mut patched = named_header(name);
    patched.push('\n');
    for line in lines {
        patched.push_str(line);
        patched.push('\n');
    }

    fs::write(path, patched)?;
    Ok(())
}

/// Delete a rejected artifact.
pub fn remove_artifact(path: &Path) -> Result<(), PersistenceFailure> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(PersistenceFailure::MissingArtifact(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
