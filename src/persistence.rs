//! Key-value persistence for the last folder and the favorites.
//!
//! The store is a flat map of string values. [`JsonFileStore`] keeps it in a
//! single JSON object on disk; [`Settings`] knows which keys exist and how
//! their values are encoded.
//!
//! Paths are written as JSON strings when they are valid UTF-8 and as arrays
//! of raw bytes otherwise, so every path read back is the one that was saved.

use crate::error::PersistenceError;
use crate::state::FavoriteSet;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const LAST_FOLDER_KEY: &str = "last_folder";
const FAVORITES_KEY: &str = "favorites";

fn encode_path(path: &Path) -> Value {
    match path.to_str() {
        Some(text) => Value::from(text),
        None => Value::from(path.as_os_str().as_encoded_bytes().to_vec()),
    }
}

fn decode_path(value: Value) -> Option<PathBuf> {
    match value {
        Value::String(text) => Some(PathBuf::from(text)),
        Value::Array(items) => {
            let bytes = items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()?;
            path_from_bytes(bytes)
        }
        _ => None,
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(PathBuf::from(OsString::from(text))),
        Err(_) => {
            warn!("Skipping a saved path that is not valid on this platform");
            None
        }
    }
}

/// Flat string key-value storage.
pub trait KeyValueStore: Send {
    fn load_value(&self, key: &str) -> Option<String>;
    fn store_value(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// In-memory store, used when nothing should touch the disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load_value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn store_value(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by one JSON object file, rewritten atomically on each change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Loads the file if present. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring malformed settings {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read settings {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        debug!("Loaded {} settings from {}", values.len(), path.display());
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let io_error = |source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_error)?;

        let json = serde_json::to_string_pretty(&self.values).map_err(|source| {
            PersistenceError::Format {
                key: "*".to_string(),
                source,
            }
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_error)?;
        tmp.write_all(json.as_bytes()).map_err(io_error)?;
        tmp.persist(&self.path).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn load_value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn store_value(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Typed access to the two persisted records.
pub struct Settings {
    store: Box<dyn KeyValueStore>,
}

impl Settings {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn last_folder(&self) -> Option<PathBuf> {
        let raw = self
            .store
            .load_value(LAST_FOLDER_KEY)
            .filter(|value| !value.is_empty())?;
        // Non-UTF-8 folders are saved as a JSON byte array.
        if raw.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                return decode_path(value);
            }
        }
        Some(PathBuf::from(raw))
    }

    pub fn set_last_folder(&mut self, folder: &Path) -> Result<(), PersistenceError> {
        let raw = match encode_path(folder) {
            Value::String(text) => text,
            bytes => bytes.to_string(),
        };
        self.store.store_value(LAST_FOLDER_KEY, &raw)
    }

    /// Loads the favorites; a malformed record is logged and treated as empty.
    pub fn favorites(&self) -> FavoriteSet {
        let Some(raw) = self.store.load_value(FAVORITES_KEY) else {
            return FavoriteSet::new();
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(paths) => paths.into_iter().filter_map(decode_path).collect(),
            Err(source) => {
                let e = PersistenceError::Format {
                    key: FAVORITES_KEY.to_string(),
                    source,
                };
                warn!("{}", e);
                FavoriteSet::new()
            }
        }
    }

    pub fn set_favorites(&mut self, favorites: &FavoriteSet) -> Result<(), PersistenceError> {
        let paths: Vec<Value> = favorites
            .sorted_paths()
            .into_iter()
            .map(encode_path)
            .collect();
        let json = serde_json::to_string(&paths).map_err(|source| PersistenceError::Format {
            key: FAVORITES_KEY.to_string(),
            source,
        })?;
        self.store.store_value(FAVORITES_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_records() {
        let mut settings = Settings::in_memory();
        assert_eq!(settings.last_folder(), None);
        assert!(settings.favorites().is_empty());

        settings.set_last_folder(Path::new("/docs")).unwrap();
        let favorites: FavoriteSet = ["/docs/a.pdf"].into_iter().collect();
        settings.set_favorites(&favorites).unwrap();

        assert_eq!(settings.last_folder(), Some(PathBuf::from("/docs")));
        assert_eq!(settings.favorites(), favorites);
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        {
            let mut settings = Settings::new(JsonFileStore::open(&path));
            settings.set_last_folder(Path::new("/docs")).unwrap();
            let favorites: FavoriteSet = ["/docs/b.pdf", "/docs/a.pdf"].into_iter().collect();
            settings.set_favorites(&favorites).unwrap();
        }

        let reopened = Settings::new(JsonFileStore::open(&path));
        assert_eq!(reopened.last_folder(), Some(PathBuf::from("/docs")));
        assert!(reopened.favorites().contains(Path::new("/docs/a.pdf")));
        assert_eq!(reopened.favorites().len(), 2);

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["favorites"], r#"["/docs/a.pdf","/docs/b.pdf"]"#);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_round_trip() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let folder = Path::new(OsStr::from_bytes(b"/docs/\xffarchive"));
        let odd = folder.join("a.pdf");
        let twin = Path::new(OsStr::from_bytes(b"/docs/\xfearchive/a.pdf"));

        {
            let mut settings = Settings::new(JsonFileStore::open(&path));
            settings.set_last_folder(folder).unwrap();
            let favorites: FavoriteSet = [odd.as_path(), Path::new("/docs/b.pdf")]
                .into_iter()
                .collect();
            settings.set_favorites(&favorites).unwrap();
        }

        let reopened = Settings::new(JsonFileStore::open(&path));
        assert_eq!(reopened.last_folder().as_deref(), Some(folder));
        let favorites = reopened.favorites();
        assert_eq!(favorites.len(), 2);
        assert!(favorites.contains(&odd));
        assert!(!favorites.contains(twin));
        assert!(favorites.contains(Path::new("/docs/b.pdf")));
    }

    #[test]
    fn malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert_eq!(store.load_value(LAST_FOLDER_KEY), None);
    }

    #[test]
    fn malformed_favorites_are_empty() {
        let mut store = MemoryStore::new();
        store.store_value(FAVORITES_KEY, "not a list").unwrap();

        let settings = Settings::new(store);
        assert!(settings.favorites().is_empty());
    }
}
