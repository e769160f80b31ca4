//! Publishing a build to disk.
//!
//! Every artifact is first written into a staging directory next to the
//! output directory. Only when all writes succeed is the staging directory
//! swapped in place of the output directory, with the previous tree kept as
//! a backup until the swap completes. A failed publish leaves the previous
//! output untouched.
//!
//! Artifact paths are validated before anything is written: they must stay
//! inside the output directory after normalization.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::BuildOutput;
use crate::{Error, Result};

/// Publish `output` into `dir`.
///
/// With `clean`, the previous contents of `dir` are discarded. Otherwise
/// files from the previous tree that the build does not overwrite are kept.
pub fn publish(output: &BuildOutput, dir: &Path, clean: bool) -> Result<()> {
    let dir = validate_and_normalize_dir(dir)?;
    let (staging, backup) = sibling_paths(&dir)?;

    remove_leftover(&staging)?;
    remove_leftover(&backup)?;

    let staged = stage(output, &dir, &staging, clean);
    if let Err(err) = staged {
        discard(&staging);
        return Err(err);
    }

    swap(&dir, &staging, &backup)?;
    debug!(dir = %dir.display(), files = output.len(), "published");
    Ok(())
}

fn stage(output: &BuildOutput, dir: &Path, staging: &Path, clean: bool) -> Result<()> {
    fs::create_dir_all(staging).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create staging directory '{}': {}",
            staging.display(),
            e
        ))
    })?;

    let mut operations = Vec::with_capacity(output.len());
    for artifact in output.iter() {
        operations.push((validate_output_path(staging, &artifact.path)?, &artifact.content));
    }

    if !clean && dir.is_dir() {
        carry_over(dir, staging)?;
    }

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        fs::write(&target, content.as_slice()).map_err(|e| {
            Error::WriteFailure(format!("Failed to write '{}': {}", target.display(), e))
        })?;
    }
    Ok(())
}

/// Copy the previous output tree into staging.
fn carry_over(dir: &Path, staging: &Path) -> Result<()> {
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| {
            Error::WriteFailure(format!("Failed to read '{}': {}", dir.display(), e))
        })?;
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let target = staging.join(relative);
        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
        } else {
            fs::copy(entry.path(), &target).map(|_| ())
        };
        result.map_err(|e| {
            Error::WriteFailure(format!(
                "Failed to carry over '{}': {}",
                entry.path().display(),
                e
            ))
        })?;
    }
    Ok(())
}

/// Replace `dir` with `staging`, restoring the backup if the rename fails.
fn swap(dir: &Path, staging: &Path, backup: &Path) -> Result<()> {
    let had_previous = dir.exists();
    if had_previous {
        if let Err(e) = fs::rename(dir, backup) {
            discard(staging);
            return Err(Error::WriteFailure(format!(
                "Failed to move previous output '{}' aside: {}",
                dir.display(),
                e
            )));
        }
    }

    if let Err(e) = fs::rename(staging, dir) {
        if had_previous {
            if let Err(restore) = fs::rename(backup, dir) {
                warn!(
                    backup = %backup.display(),
                    error = %restore,
                    "failed to restore previous output"
                );
            }
        }
        discard(staging);
        return Err(Error::WriteFailure(format!(
            "Failed to move staged output into '{}': {}",
            dir.display(),
            e
        )));
    }

    if had_previous {
        discard(backup);
    }
    Ok(())
}

fn sibling_paths(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let parent = dir
        .parent()
        .ok_or_else(|| Error::OutputPath(format!("'{}' has no parent directory", dir.display())))?;
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::OutputPath(format!("'{}' has no directory name", dir.display())))?;

    fs::create_dir_all(parent).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    Ok((
        parent.join(format!(".{name}.kiln-staging")),
        parent.join(format!(".{name}.kiln-backup")),
    ))
}

fn remove_leftover(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| {
            Error::io(format!("Failed to remove leftover '{}'", path.display()), e)
        })?;
    }
    Ok(())
}

/// Best-effort removal; we are already failing or done.
fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            warn!(path = %path.display(), error = %e, "failed to remove temporary directory");
        }
    }
}

fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::OutputPath(format!("Failed to get current directory: {}", e)))?;
    Ok(cwd.join(cleaned).clean())
}

/// Join `filename` onto `base_dir`, rejecting anything that escapes it.
fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.is_empty() {
        return Err(Error::OutputPath("Empty artifact path".to_string()));
    }
    if filename.contains('\0') {
        return Err(Error::OutputPath("Filename contains null byte".to_string()));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::OutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }
    Ok(full_path)
}
