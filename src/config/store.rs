//! ConfigStore: the local `KEY=VALUE` credential file.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::dotenv;
use crate::error::{AitkError, Result};
use crate::utils::write_private_file_atomic;

/// Handle to the credential file. Cheap to clone; holds no open file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Use the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store at its standard location for the given `XDG_CONFIG_HOME`.
    pub fn locate(xdg_config_home: Option<&str>) -> Self {
        Self::new(super::paths::config_file_path(xdg_config_home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read every entry in file order. A missing file is an empty store; a
    /// file that exists but cannot be read or is not UTF-8 is a
    /// [`AitkError::ConfigRead`].
    pub fn load(&self) -> Result<Vec<(String, String)>> {
        match self.read_content()? {
            Some(content) => Ok(dotenv::parse_entries(&content)),
            None => Ok(Vec::new()),
        }
    }

    /// Value for `key`, or `None` when unset or empty.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_content()?
            .and_then(|content| dotenv::lookup(&content, key)))
    }

    /// Replace the whole file with `entries`, one `KEY=VALUE` line each, in
    /// iteration order. A key given twice keeps its first position and its
    /// last value.
    ///
    /// The new file is private before it becomes visible: it is written to a
    /// 0600 temp file and renamed over the old one.
    pub fn write_all<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut merged: Vec<(String, String)> = Vec::new();
        for (key, value) in entries {
            let (key, value) = (key.as_ref(), value.as_ref());
            if !dotenv::is_valid_key(key) {
                return Err(AitkError::validation(format!(
                    "Invalid config key '{}': use letters, digits and underscores",
                    key
                )));
            }
            if value.contains('\n') || value.contains('\r') {
                return Err(AitkError::validation(format!(
                    "Value for '{}' must be a single line",
                    key
                )));
            }
            match merged.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.to_string(),
                None => merged.push((key.to_string(), value.to_string())),
            }
        }

        let mut content = String::new();
        for (key, value) in &merged {
            content.push_str(&dotenv::format_entry(key, value));
            content.push('\n');
        }

        write_private_file_atomic(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), entries = merged.len(), "config written");
        Ok(())
    }

    /// Set one key, keeping every other entry.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
        self.write_all(entries)
    }

    /// Remove one key. Returns whether it was present.
    pub fn unset(&self, key: &str) -> Result<bool> {
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        if entries.len() == before {
            return Ok(false);
        }
        self.write_all(entries)?;
        Ok(true)
    }

    fn read_content(&self) -> Result<Option<String>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AitkError::config_read(&self.path, e.to_string())),
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| AitkError::config_read(&self.path, "file is not valid UTF-8"))
    }
}
