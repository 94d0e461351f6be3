//! Opaque key-value persistence with file locking.
//!
//! The domain stores exactly three documents: the history log, the
//! preferences record and the schema version. `FileStore` keeps one file
//! per key with proper locking and atomic replacement; `MemoryStore`
//! backs tests and dry runs.

use crate::{Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Store key for the history document.
pub const KEY_HISTORY: &str = "history";
/// Store key for the preferences document.
pub const KEY_PREFS: &str = "prefs";
/// Store key for the schema version marker.
pub const KEY_SCHEMA: &str = "schema-version";

/// Current schema version for persisted documents.
pub const SCHEMA_VERSION: u32 = 2;

/// Opaque read/write store keyed by string identifiers.
pub trait KeyValueStore {
    /// Read the value for a key, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write the value for a key.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// File-backed store: one file per key under a data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are fixed identifiers, never user input; reject separators anyway.
        if key.is_empty() || key.contains(['/', '\\']) {
            return Err(Error::Store(format!("Invalid store key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        // Shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read_result = reader.read_to_string(&mut contents);
        file.unlock()?;
        read_result?;

        Ok(Some(contents))
    }

    /// Atomically writes the value by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let temp = NamedTempFile::new_in(&self.dir)?;

        // Exclusive lock on the temp file to serialize concurrent writers
        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved '{}' to {:?}", key, path);
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::Store("memory store poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Store("memory store poisoned".into()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Upgrade the stored schema version marker if it is absent or older.
///
/// No field-level migrations exist yet; this is the gate future versions
/// hang them on. Returns the version now in effect.
pub fn ensure_schema_version(store: &dyn KeyValueStore) -> Result<u32> {
    let stored = store
        .get(KEY_SCHEMA)?
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(1);

    if stored < SCHEMA_VERSION {
        tracing::info!("Upgrading schema version {} -> {}", stored, SCHEMA_VERSION);
        store.set(KEY_SCHEMA, &SCHEMA_VERSION.to_string())?;
    }

    Ok(stored.max(SCHEMA_VERSION))
}
