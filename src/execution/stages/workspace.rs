//! Workspace staging - a clean copy of the source tree

use crate::execution::StageError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Replace `workspace` with a full copy of `source`
///
/// Hidden files and subdirectories come along. Nothing from a previous run
/// survives. Returns the number of entries copied.
pub fn stage_workspace(source: &Path, workspace: &Path) -> Result<usize, StageError> {
    let source = source
        .canonicalize()
        .map_err(|e| StageError::io("read source tree", source, e))?;
    if !source.is_dir() {
        return Err(StageError::io(
            "read source tree",
            &source,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let target = absolute(workspace)?;
    if target.starts_with(&source) || source.starts_with(&target) {
        return Err(StageError::OverlappingWorkspace {
            workspace: target,
            source_root: source,
        });
    }

    match fs::symlink_metadata(&target) {
        Ok(meta) if meta.is_dir() => {
            debug!("Removing previous workspace {}", target.display());
            fs::remove_dir_all(&target)
                .map_err(|e| StageError::io("remove previous workspace", &target, e))?;
        }
        Ok(_) => {
            fs::remove_file(&target)
                .map_err(|e| StageError::io("remove previous workspace", &target, e))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(StageError::io("inspect workspace", &target, e)),
    }

    fs::create_dir_all(&target).map_err(|e| StageError::io("create workspace", &target, e))?;
    let copied = copy_dir_recursive(&source, &target)?;

    info!(
        "Staged {} entries from {} into {}",
        copied,
        source.display(),
        target.display()
    );
    Ok(copied)
}

/// Absolute form of a path that may not exist yet
///
/// Ancestors are resolved through symlinks. The last component is kept as
/// given, so a workspace that is itself a link is replaced, never followed.
fn absolute(path: &Path) -> Result<PathBuf, StageError> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| StageError::io("resolve workspace", path, e))?
            .join(path)
    };

    let (parent, name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (parent, name.to_os_string()),
        _ => return Ok(path.canonicalize().unwrap_or_else(|_| path.clone())),
    };

    // Resolve the deepest existing ancestor and re-append the rest
    let mut existing = parent;
    let mut rest = vec![name];
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(up), Some(dir)) => {
                rest.push(dir.to_os_string());
                existing = up;
            }
            _ => return Ok(path.clone()),
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| StageError::io("resolve workspace", existing, e))?;
    for component in rest.into_iter().rev() {
        resolved.push(component);
    }
    Ok(resolved)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<usize, StageError> {
    let mut copied = 0;
    let entries = fs::read_dir(src).map_err(|e| StageError::io("read directory", src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| StageError::io("read directory", src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| StageError::io("inspect", &from, e))?;

        if file_type.is_dir() {
            fs::create_dir(&to).map_err(|e| StageError::io("create directory", &to, e))?;
            copied += 1 + copy_dir_recursive(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
            copied += 1;
        } else {
            fs::copy(&from, &to).map_err(|e| StageError::io("copy", &from, e))?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), StageError> {
    let link = fs::read_link(from).map_err(|e| StageError::io("read link", from, e))?;
    std::os::unix::fs::symlink(&link, to).map_err(|e| StageError::io("create link", to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), StageError> {
    // Without portable symlinks, copy what the link points at
    if from.is_dir() {
        fs::create_dir(to).map_err(|e| StageError::io("create directory", to, e))?;
        copy_dir_recursive(from, to).map(|_| ())
    } else {
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| StageError::io("copy", from, e))
    }
}
