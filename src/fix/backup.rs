//! Timestamped lock file backups.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};

use crate::error::{GuardError, Result};

/// `<lockfile>.backup.<YYYYmmdd_HHMMSS>` next to the lock file.
pub fn backup_path_for(lockfile: &Path, at: DateTime<Local>) -> PathBuf {
    let mut name = OsString::from(lockfile.as_os_str());
    name.push(".backup.");
    name.push(at.format("%Y%m%d_%H%M%S").to_string());
    PathBuf::from(name)
}

/// Upper bound on backup names tried for one timestamp.
const MAX_BACKUP_SUFFIX: u32 = 100;

/// Copy the lock file to a timestamped sibling, flush it to disk and
/// confirm the copy is byte-identical. An existing backup is never
/// overwritten; a numeric suffix is appended instead.
pub fn create_backup(lockfile: &Path) -> Result<PathBuf> {
    create_backup_at(lockfile, Local::now())
}

fn create_backup_at(lockfile: &Path, at: DateTime<Local>) -> Result<PathBuf> {
    let content = fs::read(lockfile)
        .map_err(|e| GuardError::file(lockfile, format!("cannot read lock file: {}", e)))?;
    let original = hex::encode(Sha256::digest(&content));

    let (backup, mut file) = open_new_backup(lockfile, at)?;
    let written = file.write_all(&content).and_then(|_| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(&backup);
        return Err(GuardError::file(&backup, format!("cannot write backup: {}", e)));
    }

    let copy = digest(&backup)?;
    if original != copy {
        return Err(GuardError::file(
            &backup,
            format!("backup digest {} does not match lock file {}", copy, original),
        ));
    }

    tracing::info!(path = %backup.display(), sha256 = %copy, "created lock file backup");
    Ok(backup)
}

fn open_new_backup(lockfile: &Path, at: DateTime<Local>) -> Result<(PathBuf, File)> {
    let base = backup_path_for(lockfile, at);
    let mut candidate = base.clone();

    for suffix in 1..=MAX_BACKUP_SUFFIX {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let mut name = OsString::from(base.as_os_str());
                name.push(format!(".{}", suffix));
                candidate = PathBuf::from(name);
            }
            Err(e) => {
                return Err(GuardError::file(&candidate, format!("cannot create backup: {}", e)))
            }
        }
    }

    Err(GuardError::file(
        &base,
        format!("{} backups already exist for this second", MAX_BACKUP_SUFFIX),
    ))
}

fn digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| GuardError::file(path, e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
