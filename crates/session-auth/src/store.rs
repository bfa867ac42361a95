//! Key-value persistence for credentials
//!
//! Everything the session knows lives behind [`KeyValueStore`]: a flat map
//! of string keys to string values, shared by every consumer in the process.
//! Two implementations exist:
//!
//! - [`MemoryStore`]: session-scoped, lost with the process. Holds the PKCE
//!   verifier between redirect and callback.
//! - [`FileStore`]: durable JSON object file. Holds the credential bundle.
//!   All writes use atomic temp-file + rename, and the in-memory map only
//!   changes after the file write succeeded, so a failed `remove_all` leaves
//!   the bundle intact rather than half-cleared.
//!
//! Two processes sharing one file race; the last writer wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Flat string storage with an atomic multi-key clear.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_all(&[(key, value)])
    }

    /// Write several keys in one step.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_all(&[key])
    }

    /// Remove every listed key, or none of them on error.
    fn remove_all(&self, keys: &[&str]) -> Result<()>;

    /// Read a value and delete it.
    fn take(&self, key: &str) -> Result<Option<String>> {
        let value = self.get(key);
        if value.is_some() {
            self.remove(key)?;
        }
        Ok(value)
    }
}

fn lock(entries: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process store, the equivalent of per-tab session storage.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut state = lock(&self.entries);
        for (key, value) in entries {
            state.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut state = lock(&self.entries);
        for key in keys {
            state.remove(*key);
        }
        Ok(())
    }
}

/// Durable store backed by a single JSON object file.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// If the file doesn't exist, creates it (and its parent directory) as
    /// `{}` so a signed-out user is a valid cold start. A file that isn't a
    /// JSON string map is moved aside to `<name>.corrupt` and replaced by an
    /// empty store: the user starts signed out instead of being locked out.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let loaded = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("reading store file: {e}")))?;
            match serde_json::from_str::<HashMap<String, String>>(&contents) {
                Ok(entries) => {
                    info!(
                        path = %path.display(),
                        keys = entries.len(),
                        "loaded credential store"
                    );
                    Some(entries)
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "store file unreadable, starting signed out"
                    );
                    quarantine(&path);
                    None
                }
            }
        } else {
            info!(path = %path.display(), "store file not found, starting signed out");
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Storage(format!("creating store directory: {e}")))?;
            }
            None
        };

        let entries = match loaded {
            Some(entries) => entries,
            None => {
                let entries = HashMap::new();
                write_atomic(&path, &entries)?;
                entries
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self, apply: impl FnOnce(&mut HashMap<String, String>) -> bool) -> Result<()> {
        let mut state = lock(&self.entries);
        let mut next = state.clone();
        if !apply(&mut next) {
            return Ok(());
        }
        write_atomic(&self.path, &next)?;
        *state = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.commit(|next| {
            for (key, value) in entries {
                next.insert((*key).to_string(), (*value).to_string());
            }
            debug!(keys = entries.len(), "set store keys");
            true
        })
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        self.commit(|next| {
            let before = next.len();
            for key in keys {
                next.remove(*key);
            }
            before != next.len()
        })
    }
}

/// Keep an unreadable store file around as `<name>.corrupt` for inspection.
fn quarantine(path: &Path) {
    let mut aside = path.as_os_str().to_owned();
    aside.push(".corrupt");
    if let Err(e) = std::fs::rename(path, &aside) {
        warn!(error = %e, "could not move unreadable store file aside, overwriting it");
    }
}

/// Write the store to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Permissions are 0600 on unix since the file holds bearer
/// credentials.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::StoreParse(format!("serializing store: {e}")))?;

    let dir = path
        .parent()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .ok_or_else(|| Error::Storage("store path has no parent directory".into()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("store");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Storage(format!("writing temp store file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Storage(format!("setting store file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("renaming temp store file: {e}")))?;

    debug!(path = %path.display(), "persisted store");
    Ok(())
}
