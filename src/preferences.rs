use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::settings::novera_home_dir;
use crate::theme::ReaderTheme;

pub const FONT_SIZE_KEY: &str = "novera-font-size";
pub const THEME_KEY: &str = "novera-theme";

pub const MIN_FONT_SIZE: u16 = 12;
pub const MAX_FONT_SIZE: u16 = 32;
pub const DEFAULT_FONT_SIZE: u16 = 18;

const PREFERENCES_FILENAME: &str = ".novera_preferences.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("durable storage is unavailable")]
    Unavailable,

    #[error("storage io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt storage file {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Device-local string key-value storage that outlives a reader session.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Keys kept in a single JSON object file.
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store in the Novera home directory, if one can be determined.
    pub fn in_home_dir() -> Option<Self> {
        novera_home_dir().map(|dir| Self::new(dir.join(PREFERENCES_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        // A corrupt file is replaced rather than blocking every future write.
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(StorageError::Corrupt { path, source }) => {
                warn!("Replacing corrupt preferences file {:?}: {}", path, source);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(key.to_string(), value.to_string());

        let content = serde_json::to_string_pretty(&entries).map_err(|source| {
            StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, content).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage that is never reachable.
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// Raw values read back from storage. Each key is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredPreferences {
    pub font_size_px: Option<u16>,
    pub theme_name: Option<String>,
}

/// In-memory reader settings of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderPreferences {
    pub font_size_px: u16,
    pub theme: ReaderTheme,
}

impl Default for ReaderPreferences {
    fn default() -> Self {
        Self {
            font_size_px: DEFAULT_FONT_SIZE,
            theme: ReaderTheme::default(),
        }
    }
}

pub fn clamp_font_size(size: u16) -> u16 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

impl ReaderPreferences {
    /// Overlay stored values; unknown theme names keep the current theme.
    pub fn apply_stored(&mut self, stored: &StoredPreferences) {
        if let Some(size) = stored.font_size_px {
            self.font_size_px = clamp_font_size(size);
        }
        if let Some(name) = &stored.theme_name {
            match ReaderTheme::lookup(name) {
                Some(theme) => self.theme = theme,
                None => warn!("Stored theme '{}' not found, keeping {}", name, self.theme.name()),
            }
        }
    }

    pub fn from_stored(stored: &StoredPreferences) -> Self {
        let mut prefs = Self::default();
        prefs.apply_stored(stored);
        prefs
    }
}

/// Reads and writes the two reader preference keys.
///
/// Failures never leave this type: reads come back as absent values and
/// writes are dropped with a warning.
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    /// File-backed store in the Novera home directory, memory when there is none.
    pub fn open_default() -> Self {
        match FileKeyValueStore::in_home_dir() {
            Some(store) => {
                debug!("Using preferences file {:?}", store.path());
                Self::new(Arc::new(store))
            }
            None => {
                warn!("Could not determine home directory, preferences will not be saved");
                Self::in_memory()
            }
        }
    }

    pub fn hydrate(&self) -> StoredPreferences {
        let font_size_px = self.read(FONT_SIZE_KEY).and_then(|raw| {
            match raw.trim().parse::<u16>() {
                Ok(size) => Some(size),
                Err(e) => {
                    warn!("Ignoring stored font size '{}': {}", raw, e);
                    None
                }
            }
        });
        let theme_name = self.read(THEME_KEY);

        StoredPreferences {
            font_size_px,
            theme_name,
        }
    }

    pub fn persist(&self, font_size_px: u16, theme_name: &str) {
        self.write(FONT_SIZE_KEY, &font_size_px.to_string());
        self.write(THEME_KEY, theme_name);
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not read preference '{}': {}", key, e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!("Could not save preference '{}': {}", key, e);
        }
    }
}
