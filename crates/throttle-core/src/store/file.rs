//! JSON-file key-value store
//!
//! The whole table lives in one JSON document mapping identity to its
//! prefixed keys. Every write rewrites the document through a uniquely named
//! temp file and a rename, so a crash never leaves a half-written file
//! behind and readers always see a whole document.
//!
//! Writers take an advisory lock on a `<file>.lock` sidecar for the whole
//! read-modify-write, so several handles on one file (an application and the
//! operator CLI, say) never lose each other's updates.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use super::kv::PersistentKeyValueStore;
use crate::error::{Result, ThrottleError};
use crate::types::IdentityId;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    identities: BTreeMap<IdentityId, BTreeMap<String, String>>,
}

impl Document {
    fn prefixed(&self, identity: &IdentityId, prefix: &str) -> HashMap<String, String> {
        self.identities
            .get(identity)
            .map(|keys| {
                keys.iter()
                    .filter_map(|(key, value)| {
                        key.strip_prefix(prefix)
                            .map(|short| (short.to_string(), value.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn merge(&mut self, identity: &IdentityId, values: &HashMap<String, String>, prefix: &str) {
        let keys = self.identities.entry(*identity).or_default();
        for (key, value) in values {
            keys.insert(format!("{}{}", prefix, key), value.clone());
        }
    }
}

const DOCUMENT_VERSION: u32 = 1;

/// `PersistentKeyValueStore` persisted to a single JSON file
pub struct FileKeyValueStore {
    path: PathBuf,
    lock_path: PathBuf,
    io: Mutex<()>,
}

impl FileKeyValueStore {
    /// Open (or lazily create) the store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut lock_name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("state.json"));
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        Ok(Self {
            path,
            lock_path,
            io: Mutex::new(()),
        })
    }

    /// Default state file location
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("login-throttle")
            .join("state.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` holding this handle's mutex and the sidecar file lock
    fn exclusive<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _io = self.io.lock().map_err(|_| ThrottleError::poisoned("file"))?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(unavailable)?;
        lock.lock_exclusive().map_err(unavailable)?;

        // Released when `lock` is closed
        f()
    }

    fn read_document(&self) -> Result<Document> {
        if !self.path.exists() {
            return Ok(Document {
                version: DOCUMENT_VERSION,
                ..Default::default()
            });
        }
        let content = fs::read_to_string(&self.path).map_err(unavailable)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_document(&self, document: &Document) -> Result<()> {
        let contents = serde_json::to_vec_pretty(document)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = temp_file(dir).map_err(unavailable)?;
        temp.write_all(&contents).map_err(unavailable)?;
        temp.as_file().sync_all().map_err(unavailable)?;
        temp.persist(&self.path).map_err(|e| unavailable(e.error))?;

        Ok(())
    }
}

/// Temp file next to the state file, owner-only from creation on unix
fn temp_file(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".state-").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o600));
    }
    builder.tempfile_in(dir)
}

fn unavailable(e: std::io::Error) -> ThrottleError {
    ThrottleError::StorageUnavailable(e.to_string())
}

impl PersistentKeyValueStore for FileKeyValueStore {
    fn get(&self, identity: &IdentityId, prefix: &str) -> Result<HashMap<String, String>> {
        Ok(self.read_document()?.prefixed(identity, prefix))
    }

    fn put(
        &self,
        identity: &IdentityId,
        values: &HashMap<String, String>,
        prefix: &str,
    ) -> Result<()> {
        self.exclusive(|| {
            let mut document = self.read_document()?;
            document.merge(identity, values, prefix);
            self.write_document(&document)
        })
    }

    fn modify(
        &self,
        identity: &IdentityId,
        prefix: &str,
        apply: &mut dyn FnMut(&HashMap<String, String>) -> Result<Option<HashMap<String, String>>>,
    ) -> Result<()> {
        self.exclusive(|| {
            let mut document = self.read_document()?;
            match apply(&document.prefixed(identity, prefix))? {
                Some(values) => {
                    document.merge(identity, &values, prefix);
                    self.write_document(&document)
                }
                None => Ok(()),
            }
        })
    }
}
