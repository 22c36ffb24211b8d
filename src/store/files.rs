//! Which local files the store tracks, and where they live in the store.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Suffix of encrypted blobs in the store.
pub const BLOB_SUFFIX: &str = ".age";

const TEMPLATE_SUFFIXES: &[&str] = &[".example", ".sample", ".template"];

/// Whether `name` is an env file the store syncs: `.env`, `.env.local`,
/// `.env.production`... but not `.env.example` and friends.
pub fn is_valid_env_file(name: &str) -> bool {
    name.starts_with(".env")
        && !name.contains(['/', '\\'])
        && !TEMPLATE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Blob file name for an env file.
pub fn blob_name(env_file: &str) -> String {
    format!("{}{}", env_file, BLOB_SUFFIX)
}

/// Env file name for a blob file name, `None` for anything else.
pub fn env_file_for_blob(blob: &str) -> Option<&str> {
    blob.strip_suffix(BLOB_SUFFIX).filter(|name| is_valid_env_file(name))
}

/// Env files directly inside `project_root`, sorted by name.
pub fn discover_env_files(project_root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(project_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && is_valid_env_file(name)
        {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Env file names stored in `dir` (a project directory of the mirror),
/// sorted. A missing directory yields nothing.
pub fn stored_env_files(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(env_name) = entry.file_name().to_str().and_then(env_file_for_blob) {
            names.push(env_name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
