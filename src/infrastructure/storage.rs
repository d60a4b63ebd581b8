//! # Storage
//!
//! Nested JSON key/value store shared by the plugins. Keys are paths into the
//! object tree (`["volunteer", "cook"]`). The whole document is rewritten to
//! disk after every mutation, through a temporary file renamed over the old one.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::StorageError;

pub struct JsonStore {
    path: PathBuf,
    root: Mutex<Value>,
}

impl JsonStore {
    /// Loads `path`, or creates it holding an empty object.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let root = if path.is_file() {
            let content = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            let value: Value = serde_json::from_str(&content).map_err(|source| StorageError::Decode {
                path: path.display().to_string(),
                source,
            })?;
            if !value.is_object() {
                return Err(StorageError::NotAnObject(path.display().to_string()));
            }
            value
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
            }
            let empty = Value::Object(Map::new());
            write_document(&path, &empty)?;
            empty
        };

        tracing::debug!("Storage opened at {}", path.display());
        Ok(Self {
            path,
            root: Mutex::new(root),
        })
    }

    pub fn get(&self, key: &[&str]) -> Option<Value> {
        let root = self.root.lock();
        let mut node = &*root;
        for segment in key {
            node = node.as_object()?.get(*segment)?;
        }
        Some(node.clone())
    }

    /// Stores `value` at `key`, creating missing intermediate objects.
    pub fn set(&self, key: &[&str], value: Value) -> Result<(), StorageError> {
        let Some((last, parents)) = key.split_last() else {
            return Err(StorageError::EmptyKey);
        };

        let mut root = self.root.lock();
        let mut node = &mut *root;
        for segment in parents {
            let object = node
                .as_object_mut()
                .ok_or_else(|| StorageError::NotAnObject(segment.to_string()))?;
            node = object
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        node.as_object_mut()
            .ok_or_else(|| StorageError::NotAnObject(last.to_string()))?
            .insert(last.to_string(), value);

        write_document(&self.path, &root)
    }

    /// Deletes `key`. Absent keys are not an error and do not touch the file.
    pub fn remove(&self, key: &[&str]) -> Result<Option<Value>, StorageError> {
        let Some((last, parents)) = key.split_last() else {
            return Err(StorageError::EmptyKey);
        };

        let mut root = self.root.lock();
        let mut node = &mut *root;
        for segment in parents {
            match node.as_object_mut().and_then(|o| o.get_mut(*segment)) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        let removed = node.as_object_mut().and_then(|o| o.remove(*last));
        if removed.is_some() {
            write_document(&self.path, &root)?;
        }
        Ok(removed)
    }
}

fn write_document(path: &Path, root: &Value) -> Result<(), StorageError> {
    let content = serde_json::to_string(root).map_err(|source| StorageError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    let temp = temp_path(path);
    fs::write(&temp, content).map_err(|source| io_error(&temp, source))?;
    fs::rename(&temp, path).map_err(|source| io_error(path, source))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        let store = JsonStore::open(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert_eq!(store.get(&["key"]), None);
    }

    #[test]
    fn test_every_set_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = JsonStore::open(&path).unwrap();

        store.set(&["key"], json!("a")).unwrap();
        store.set(&["key"], json!("b")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"key":"b"}"#);
    }

    #[test]
    fn test_writes_leave_no_temporary_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = JsonStore::open(&path).unwrap();

        store.set(&["key"], json!("a")).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["storage.json".to_string()]);
        assert_eq!(temp_path(&path), dir.path().join("storage.json.tmp"));
    }

    #[test]
    fn test_stale_temporary_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"key":"kept"}"#).unwrap();
        fs::write(temp_path(&path), "{ half written").unwrap();

        let store = JsonStore::open(&path).unwrap();
        assert_eq!(store.get(&["key"]), Some(json!("kept")));
        store.set(&["other"], json!(1)).unwrap();

        assert!(!temp_path(&path).exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"key":"kept","other":1}"#);
    }

    #[test]
    fn test_subkey_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = JsonStore::open(&path).unwrap();

        store.set(&["key", "subkey"], json!("abc")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"key":{"subkey":"abc"}}"#);
        assert_eq!(store.get(&["key", "subkey"]), Some(json!("abc")));
    }

    #[test]
    fn test_reload_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"key":{"subkey":"abc"}}"#).unwrap();

        let store = JsonStore::open(&path).unwrap();
        assert_eq!(store.get(&["key"]), Some(json!({"subkey": "abc"})));
    }

    #[test]
    fn test_remove_and_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = JsonStore::open(&path).unwrap();
        store.set(&["key"], json!(1)).unwrap();

        assert!(matches!(store.set(&[], json!(1)), Err(StorageError::EmptyKey)));
        assert!(matches!(
            store.set(&["key", "sub"], json!(1)),
            Err(StorageError::NotAnObject(_))
        ));
        assert_eq!(store.remove(&["missing", "x"]).unwrap(), None);
        assert_eq!(store.remove(&["key"]).unwrap(), Some(json!(1)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_rejects_non_object_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(JsonStore::open(&path), Err(StorageError::NotAnObject(_))));
        fs::write(&path, "{").unwrap();
        assert!(matches!(JsonStore::open(&path), Err(StorageError::Decode { .. })));
    }
}
