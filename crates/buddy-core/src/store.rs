use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::{Activity, BuddyError, Rating, Result};

pub const ACTIVITIES_KEY: &str = "activities";
pub const RATINGS_KEY: &str = "ratings";
pub const SESSION_KEY: &str = "session";
pub const SEEDED_KEY: &str = "seeded_v1";

/// Persistence port: a synchronous string key-value store, atomic per call.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

// --- File-backed store ---

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "failed to read stored value, treating as absent");
                None
            }
        }
    }

    /// Atomic write (temp file + rename) so a crash never leaves a half-written collection.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(storage_err)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, value).map_err(storage_err)?;
        fs::rename(&tmp, self.path_for(key)).map_err(storage_err)
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(e)),
        }
    }
}

pub(crate) fn storage_err(e: io::Error) -> BuddyError {
    BuddyError::Storage(e.to_string())
}

// --- In-memory store ---

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds whole values; every write replaces a key in one step.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

// --- Record collections ---

/// A whole persisted collection under one key. No query logic: callers load
/// everything, mutate in memory, and save everything back.
pub struct RecordStore<T> {
    kv: SharedStore,
    key: &'static str,
    id_prefix: &'static str,
    _record: PhantomData<fn() -> T>,
}

pub type ActivityStore = RecordStore<Activity>;
pub type RatingStore = RecordStore<Rating>;

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            key: self.key,
            id_prefix: self.id_prefix,
            _record: PhantomData,
        }
    }
}

impl ActivityStore {
    pub fn activities(kv: SharedStore) -> Self {
        RecordStore::new(kv, ACTIVITIES_KEY, "act")
    }
}

impl RatingStore {
    pub fn ratings(kv: SharedStore) -> Self {
        RecordStore::new(kv, RATINGS_KEY, "rate")
    }
}

impl<T: Serialize + DeserializeOwned> RecordStore<T> {
    fn new(kv: SharedStore, key: &'static str, id_prefix: &'static str) -> Self {
        Self {
            kv,
            key,
            id_prefix,
            _record: PhantomData,
        }
    }

    /// Load the full collection.
    ///
    /// Missing content is an empty collection. So is content that does not parse
    /// as an array of records: a corrupt local cache is dropped rather than
    /// surfaced, and the next save overwrites it.
    pub fn load_all(&self) -> Vec<T> {
        let Some(raw) = self.kv.get(self.key) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(key = self.key, error = %e, "discarding unreadable collection");
                Vec::new()
            }
        }
    }

    pub fn save_all(&self, records: &[T]) -> Result<()> {
        let json =
            serde_json::to_string(records).map_err(|e| BuddyError::Storage(e.to_string()))?;
        self.kv.set(self.key, &json)
    }

    pub fn generate_id(&self) -> String {
        format!("{}-{}", self.id_prefix, uuid::Uuid::new_v4().simple())
    }
}
