//! File permission utilities for sensitive files.
//!
//! Files holding credentials or decrypted `.env` content are created with
//! owner-only permissions before any byte is written, then moved into place
//! with an atomic rename so a concurrent reader sees either the old file or
//! the complete new one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;

/// Owner read/write.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Set restrictive permissions (owner-only read/write) on a file.
///
/// On Unix systems this sets mode 0o600. On other platforms this is a no-op
/// since the permission model differs.
pub fn restrict_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(PRIVATE_FILE_MODE);
        fs::set_permissions(path, perms)?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Write `bytes` to `path` atomically with owner-only permissions.
///
/// Parent directories are created as needed. The temporary file lives next to
/// the target (same filesystem, so the rename is atomic) and is removed if any
/// step before the rename fails.
pub fn write_private_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let temp_path = temp_path_for(path);
    let result = write_new_private(&temp_path, bytes).and_then(|_| {
        fs::rename(&temp_path, path)?;
        Ok(())
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Create a brand-new file that is private from the moment it exists.
fn write_new_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    // The creation mode is subject to the umask, which can only remove bits.
    restrict_file_permissions(path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("tmp");
    path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
}
