//! Masked comparison of local and stored env files.
//!
//! Reports only key names and how they differ. Values are compared in memory
//! and dropped; nothing in this module's output can carry one.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::dotenv;

/// How a key differs between the local file and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyChange {
    /// Only in the local file (push would add it).
    Added,
    /// Only in the store (push would drop it, pull would restore it).
    Removed,
    /// In both with different values.
    Changed,
    /// In both with the same value.
    Unchanged,
}

impl fmt::Display for KeyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyChange::Added => "added",
            KeyChange::Removed => "removed",
            KeyChange::Changed => "changed",
            KeyChange::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

impl KeyChange {
    /// Marker used in the text report.
    pub fn symbol(self) -> char {
        match self {
            KeyChange::Added => '+',
            KeyChange::Removed => '-',
            KeyChange::Changed => '~',
            KeyChange::Unchanged => ' ',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDiff {
    pub key: String,
    pub change: KeyChange,
}

/// Which side of the comparison a file exists on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePresence {
    Both,
    LocalOnly,
    StoreOnly,
}

/// Result for one env file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub file: String,
    pub presence: FilePresence,
    pub keys: Vec<KeyDiff>,
    /// Set when either copy could not be read, or the stored one not
    /// decrypted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The error came from decrypting the stored copy.
    #[serde(skip)]
    pub decryption: bool,
}

impl FileDiff {
    /// Whether any key differs.
    pub fn has_changes(&self) -> bool {
        self.keys.iter().any(|k| k.change != KeyChange::Unchanged)
    }

    pub fn count(&self, change: KeyChange) -> usize {
        self.keys.iter().filter(|k| k.change == change).count()
    }
}

/// Whole-project diff report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub project: String,
    pub files: Vec<FileDiff>,
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        self.files
            .iter()
            .any(|f| f.has_changes() || f.error.is_some())
    }

    /// Files that could not be compared.
    pub fn failures(&self) -> impl Iterator<Item = &FileDiff> {
        self.files.iter().filter(|f| f.error.is_some())
    }
}

/// Compare two env file contents key by key. Either side may be absent.
/// Keys are reported sorted by name.
pub fn diff_contents(local: Option<&str>, stored: Option<&str>) -> Vec<KeyDiff> {
    let local: BTreeMap<String, String> = local.map(entries).unwrap_or_default();
    let stored: BTreeMap<String, String> = stored.map(entries).unwrap_or_default();

    let mut keys: Vec<KeyDiff> = local
        .iter()
        .map(|(key, value)| {
            let change = match stored.get(key) {
                None => KeyChange::Added,
                Some(other) if other == value => KeyChange::Unchanged,
                Some(_) => KeyChange::Changed,
            };
            KeyDiff {
                key: key.clone(),
                change,
            }
        })
        .collect();

    keys.extend(
        stored
            .keys()
            .filter(|key| !local.contains_key(*key))
            .map(|key| KeyDiff {
                key: key.clone(),
                change: KeyChange::Removed,
            }),
    );
    keys.sort_by(|a, b| a.key.cmp(&b.key));
    keys
}

fn entries(content: &str) -> BTreeMap<String, String> {
    dotenv::parse_entries(content).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change_of(keys: &[KeyDiff], key: &str) -> KeyChange {
        keys.iter().find(|k| k.key == key).unwrap().change
    }

    #[test]
    fn test_classifies_every_key() {
        let keys = diff_contents(
            Some("SAME=1\nEDITED=new-secret\nFRESH=x\n"),
            Some("SAME=1\nEDITED=old-secret\nGONE=y\n"),
        );
        assert_eq!(change_of(&keys, "SAME"), KeyChange::Unchanged);
        assert_eq!(change_of(&keys, "EDITED"), KeyChange::Changed);
        assert_eq!(change_of(&keys, "FRESH"), KeyChange::Added);
        assert_eq!(change_of(&keys, "GONE"), KeyChange::Removed);
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_quoting_is_not_a_change() {
        let keys = diff_contents(Some("A=\"v\"\n"), Some("export A=v\n"));
        assert_eq!(change_of(&keys, "A"), KeyChange::Unchanged);
    }

    #[test]
    fn test_one_sided_files() {
        let keys = diff_contents(None, Some("A=1\nB=2"));
        assert!(keys.iter().all(|k| k.change == KeyChange::Removed));
        let keys = diff_contents(Some("A=1"), None);
        assert_eq!(keys[0].change, KeyChange::Added);
    }

    #[test]
    fn test_report_json_has_no_values() {
        let report = DiffReport {
            project: "acme/api".to_string(),
            files: vec![FileDiff {
                file: ".env".to_string(),
                presence: FilePresence::Both,
                keys: diff_contents(Some("TOKEN=hunter2-new"), Some("TOKEN=hunter2-old")),
                error: None,
                decryption: false,
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"changed\""));
        assert!(!json.contains("hunter2"));
        assert!(report.has_changes());
    }
}
