//! Durable local persistence of the credential bundle and identity snapshot.
//!
//! All operations are synchronous and local. Reads fail soft: a record that
//! cannot be read back is treated as "no session" and the store is cleared.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use panel_auth::{CredentialBundle, Identity};

/// Well-known key of the credential bundle record.
pub const TOKEN_KEY: &str = "auth_token";
/// Well-known key of the identity snapshot record.
pub const USER_KEY: &str = "auth_user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write '{key}': {source}")]
    Io {
        key: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize '{key}': {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// String key-value persistence underneath [`CredentialStore`].
pub trait KeyValueStore: core::fmt::Debug + Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create session directory at {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        // unique temp file + rename: concurrent writers never share a partial record
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{key}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(key)).map_err(|err| err.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Process-local store, used for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Typed access to the persisted credential bundle and identity snapshot.
///
/// Cheap to clone; clones share the same backing store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// File-backed store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::new(FileStore::open(dir)?))
    }

    /// Overwrite the credential bundle wholesale.
    pub fn save(&self, bundle: &CredentialBundle) -> Result<(), StoreError> {
        self.write(TOKEN_KEY, bundle)
    }

    pub fn load(&self) -> Option<CredentialBundle> {
        self.read(TOKEN_KEY)
    }

    pub fn save_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        self.write(USER_KEY, identity)
    }

    pub fn load_identity(&self) -> Option<Identity> {
        let identity: Identity = self.read(USER_KEY)?;
        if identity.is_complete() {
            Some(identity)
        } else {
            tracing::warn!(key = USER_KEY, "identity snapshot is incomplete; clearing local session");
            self.clear();
            None
        }
    }

    /// Delete both records. Never fails; errors are logged.
    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(err) = self.backend.remove(key) {
                tracing::error!(key, error = %err, "failed to remove session record");
            }
        }
    }

    fn write<T: Serialize>(&self, key: &'static str, value: &T) -> Result<(), StoreError> {
        let data =
            serde_json::to_string(value).map_err(|source| StoreError::Serialize { key, source })?;
        self.backend
            .set(key, &data)
            .map_err(|source| StoreError::Io { key, source })
    }

    fn read<T: DeserializeOwned>(&self, key: &'static str) -> Option<T> {
        let data = match self.backend.get(key) {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read session record");
                return None;
            }
        };

        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "malformed session record; clearing local session");
                self.clear();
                None
            }
        }
    }
}
