//! Disk Space Check
//!
//! A Miniconda base plus a handful of scientific packages needs a few
//! gigabytes. The check runs before the download so a full disk fails
//! early instead of half way through the installer.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use sysinfo::Disks;

use crate::error::{InstallerError, InstallerResult};

/// Default free space required for a provisioning run.
pub const DEFAULT_MIN_FREE_MB: u64 = 3000;

/// Returns the free space, in MB, of the filesystem holding `path`.
///
/// `path` does not need to exist; its nearest existing ancestor is used.
/// Returns `None` when no mounted disk covers the path.
pub fn available_space_mb(path: &Path) -> Option<u64> {
    let probe = existing_ancestor(path)?;
    let disks = Disks::new_with_refreshed_list();

    let disk = disks
        .list()
        .iter()
        .filter(|d| probe.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().components().count())?;

    debug!(
        "{} is on {} ({} MB free)",
        probe.display(),
        disk.mount_point().display(),
        disk.available_space() / (1024 * 1024)
    );

    Some(disk.available_space() / (1024 * 1024))
}

/// Fails when the filesystem holding `path` has less than `required_mb` free.
///
/// Unknown free space only logs a warning.
pub fn ensure_free_space(path: &Path, required_mb: u64) -> InstallerResult<()> {
    if required_mb == 0 {
        return Ok(());
    }

    match available_space_mb(path) {
        Some(available_mb) => check_space(path, available_mb, required_mb),
        None => {
            warn!(
                "Could not determine free disk space for {}, continuing",
                path.display()
            );
            Ok(())
        }
    }
}

fn check_space(path: &Path, available_mb: u64, required_mb: u64) -> InstallerResult<()> {
    if available_mb < required_mb {
        return Err(InstallerError::InsufficientSpace {
            path: path.to_path_buf(),
            available_mb,
            required_mb,
        });
    }
    Ok(())
}

/// Nearest existing ancestor of a path, made absolute.
fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    absolute
        .ancestors()
        .find(|p| p.exists())
        .and_then(|p| p.canonicalize().ok())
}
