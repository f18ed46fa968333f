use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

pub const ALLOWLIST_FILE: &str = "whitelist.json";
pub const STATUS_FILE: &str = "status.json";

pub const DEFAULT_STATUS_KIND: &str = "playing";
pub const DEFAULT_STATUS_TEXT: &str = "Hello! I'm online.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize document: {0}")]
    SerializeFailed(#[from] serde_json::Error),
}

/// Ordered set of user ids granted elevated access.
///
/// Serialized as a bare JSON array. Order of insertion is kept so the file
/// stays stable across save/load cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u64>", into = "Vec<u64>")]
pub struct AllowList {
    ids: Vec<u64>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, id: u64) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Returns false when the id was absent.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| *existing != id);
        self.ids.len() != before
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<Vec<u64>> for AllowList {
    fn from(raw: Vec<u64>) -> Self {
        let mut list = Self::new();
        for id in raw {
            list.insert(id);
        }
        list
    }
}

impl From<AllowList> for Vec<u64> {
    fn from(list: AllowList) -> Self {
        list.ids
    }
}

impl FromIterator<u64> for AllowList {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

/// Persisted presence: `{"type": "...", "text": "..."}`.
///
/// `kind` is kept verbatim; interpretation (and the fallback for unknown
/// values) belongs to whoever applies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl StatusDescriptor {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
        }
    }
}

impl Default for StatusDescriptor {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_KIND, DEFAULT_STATUS_TEXT)
    }
}

/// File-backed store for the allowlist and status documents.
///
/// Every read goes to disk. Mutations run load-modify-save while holding the
/// document's mutex, so concurrent command handlers never lose an update.
#[derive(Debug)]
pub struct ConfigStore {
    allowlist_path: PathBuf,
    status_path: PathBuf,
    allowlist_lock: Mutex<()>,
    status_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(allowlist_path: PathBuf, status_path: PathBuf) -> Self {
        Self {
            allowlist_path,
            status_path,
            allowlist_lock: Mutex::new(()),
            status_lock: Mutex::new(()),
        }
    }

    /// Standard layout: `whitelist.json` and `status.json` side by side in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ALLOWLIST_FILE), dir.join(STATUS_FILE))
    }

    pub fn allowlist_path(&self) -> &Path {
        &self.allowlist_path
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// Empty when the document is missing or unreadable; malformed JSON is an error.
    pub fn load_allowlist(&self) -> Result<AllowList, StoreError> {
        lenient(read_document(&self.allowlist_path))
    }

    pub fn save_allowlist(&self, list: &AllowList) -> Result<(), StoreError> {
        let _guard = acquire(&self.allowlist_lock);
        write_document(&self.allowlist_path, list)
    }

    /// Returns whether the id was newly added. Nothing is written otherwise.
    pub fn add_to_allowlist(&self, id: u64) -> Result<bool, StoreError> {
        self.mutate_allowlist(|list| list.insert(id))
    }

    /// Returns whether the id was present and got removed.
    pub fn remove_from_allowlist(&self, id: u64) -> Result<bool, StoreError> {
        self.mutate_allowlist(|list| list.remove(id))
    }

    pub fn load_status(&self) -> Result<StatusDescriptor, StoreError> {
        lenient(read_document(&self.status_path))
    }

    pub fn save_status(&self, status: &StatusDescriptor) -> Result<(), StoreError> {
        let _guard = acquire(&self.status_lock);
        write_document(&self.status_path, status)
    }

    /// Parses both documents so corruption surfaces at startup instead of mid-command.
    pub fn verify(&self) -> Result<(AllowList, StatusDescriptor), StoreError> {
        let allowlist = read_document(&self.allowlist_path)?.unwrap_or_default();
        let status = read_document(&self.status_path)?.unwrap_or_default();
        Ok((allowlist, status))
    }

    fn mutate_allowlist(
        &self,
        apply: impl FnOnce(&mut AllowList) -> bool,
    ) -> Result<bool, StoreError> {
        let _guard = acquire(&self.allowlist_lock);
        // A read error here must not be treated as "empty": saving would wipe the file.
        let mut list: AllowList = read_document(&self.allowlist_path)?.unwrap_or_default();
        let changed = apply(&mut list);
        if changed {
            write_document(&self.allowlist_path, &list)?;
        }
        Ok(changed)
    }
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lenient<T: Default>(result: Result<Option<T>, StoreError>) -> Result<T, StoreError> {
    match result {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(StoreError::ReadFailed { path, source }) => {
            warn!(path = %path.display(), error = %source, "document unreadable; using default");
            Ok(T::default())
        }
        Err(err) => Err(err),
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "document missing");
            return Ok(None);
        }
        Err(source) => {
            return Err(StoreError::ReadFailed {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes to a sibling temp file, syncs it, then renames over the target.
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_failed = |source| StoreError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_failed)?;

    let raw = serde_json::to_vec(value)?;
    let mut staged = NamedTempFile::new_in(parent).map_err(write_failed)?;
    staged.write_all(&raw).map_err(write_failed)?;
    staged.as_file().sync_all().map_err(write_failed)?;
    staged
        .persist(path)
        .map_err(|err| write_failed(err.error))?;
    debug!(path = %path.display(), bytes = raw.len(), "document saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_occurrence_order() {
        let mut list = AllowList::new();
        assert!(list.insert(7));
        assert!(list.insert(3));
        assert!(!list.insert(7));
        assert_eq!(list.ids(), &[7, 3]);
    }

    #[test]
    fn remove_reports_absence() {
        let mut list: AllowList = [1, 2, 3].into_iter().collect();
        assert!(list.remove(2));
        assert!(!list.remove(2));
        assert_eq!(list.ids(), &[1, 3]);
    }

    #[test]
    fn duplicate_ids_in_document_collapse() {
        let list: AllowList = serde_json::from_str("[5, 9, 5, 1]").expect("parse");
        assert_eq!(list.ids(), &[5, 9, 1]);
    }

    #[test]
    fn allowlist_serializes_as_bare_array() {
        let list: AllowList = [42, 1_234_567_890_123_456_789].into_iter().collect();
        let raw = serde_json::to_string(&list).expect("serialize");
        assert_eq!(raw, "[42,1234567890123456789]");
    }

    #[test]
    fn status_uses_type_field_name() {
        let status = StatusDescriptor::new("watching", "the logs");
        let raw = serde_json::to_string(&status).expect("serialize");
        assert_eq!(raw, r#"{"type":"watching","text":"the logs"}"#);
    }
}
