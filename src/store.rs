//! Durable JSON document backing the wizard.
//!
//! The whole document is held in memory and rewritten on every `save()`.
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write leaves the previous document intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while reading or writing the persisted document
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("persisted state at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("persisted state at {} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("key '{key}' cannot be set: '{segment}' is not an object")]
    PathConflict { key: String, segment: String },

    #[error("value at '{key}' has an unexpected shape: {source}")]
    Shape {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value view over a JSON object on disk. Keys use dotted paths
/// (`"session.username"`) to address nested objects.
#[derive(Debug, Clone)]
pub struct PersistentStore {
    path: PathBuf,
    doc: Map<String, Value>,
}

impl PersistentStore {
    /// Open the document at `path`. A missing file yields an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let doc = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            if contents.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&contents) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) => return Err(StoreError::NotAnObject { path }),
                    Err(source) => return Err(StoreError::Corrupt { path, source }),
                }
            }
        } else {
            Map::new()
        };

        tracing::debug!(path = %path.display(), keys = doc.len(), "Opened persistent store");
        Ok(Self { path, doc })
    }

    /// An empty, not-yet-written document at `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc: Map::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let mut current = self.doc.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Deserialize the value at `key`; `Ok(None)` when absent or null
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StoreError::Shape {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, creating intermediate objects as needed
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let segments: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };

        let mut current = &mut self.doc;
        for segment in parents {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::PathConflict {
                        key: key.to_string(),
                        segment: (*segment).to_string(),
                    })
                }
            };
        }
        current.insert((*last).to_string(), value);
        Ok(())
    }

    pub fn set_as<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Shape {
            key: key.to_string(),
            source,
        })?;
        self.set(key, value)
    }

    /// Remove `key`, returning the old value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let segments: Vec<&str> = key.split('.').collect();
        let (last, parents) = segments.split_last()?;

        let mut current = &mut self.doc;
        for segment in parents {
            current = current.get_mut(*segment)?.as_object_mut()?;
        }
        current.remove(*last)
    }

    /// Overwrite the file with the full document
    pub fn save(&self) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let contents = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, contents).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), "Saved persistent store");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
