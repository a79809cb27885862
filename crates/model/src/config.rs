use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::util::write_atomic;

const OPTIONS_VERSION: u32 = 1;

/// SQLite journal modes accepted by `PRAGMA journal_mode`.
/// `PRAGMA journal_mode` 可接受的日誌模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JournalMode {
    #[default]
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pragma())
    }
}

/// Knobs applied when a solution store is opened.
/// 開啟解決方案儲存檔時套用的選項。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptions {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub journal_mode: JournalMode,
    #[serde(default = "default_true")]
    pub enforce_foreign_keys: bool,
}

fn default_version() -> u32 {
    OPTIONS_VERSION
}

fn default_true() -> bool {
    true
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            version: OPTIONS_VERSION,
            journal_mode: JournalMode::default(),
            enforce_foreign_keys: true,
        }
    }
}

impl StorageOptions {
    pub fn sanitize(&mut self) {
        if self.version == 0 || self.version > OPTIONS_VERSION {
            warn!(version = self.version, "resetting storage options version");
            self.version = OPTIONS_VERSION;
        }
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read storage options {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse storage options {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize storage options {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write storage options {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// JSON-backed holder for [`StorageOptions`].
#[derive(Debug)]
pub struct StorageOptionsStore {
    path: PathBuf,
    data: StorageOptions,
}

impl StorageOptionsStore {
    pub fn new(path: impl Into<PathBuf>, options: StorageOptions) -> Self {
        Self {
            path: path.into(),
            data: options,
        }
    }

    /// Loads options from `path`, falling back to defaults when the file is absent.
    /// 從檔案載入選項；檔案不存在時使用預設值。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                data: StorageOptions::default(),
            });
        }

        let contents = fs::read_to_string(&path).map_err(|source| OptionsError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: StorageOptions =
            serde_json::from_str(&contents).map_err(|source| OptionsError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StorageOptions {
        &self.data
    }

    pub fn into_options(self) -> StorageOptions {
        self.data
    }

    pub fn update<F>(&mut self, op: F) -> Result<(), OptionsError>
    where
        F: FnOnce(&mut StorageOptions),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), OptionsError> {
        let payload =
            serde_json::to_vec_pretty(&self.data).map_err(|source| OptionsError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        write_atomic(&self.path, &payload).map_err(|source| OptionsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = StorageOptionsStore::load(dir.path().join("storage.json")).unwrap();
        assert_eq!(store.options(), &StorageOptions::default());
        assert!(store.options().enforce_foreign_keys);
        assert_eq!(store.options().journal_mode, JournalMode::Delete);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let mut store = StorageOptionsStore::new(&path, StorageOptions::default());
        store
            .update(|options| {
                options.journal_mode = JournalMode::Wal;
                options.enforce_foreign_keys = false;
            })
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"WAL\""));
        let reloaded = StorageOptionsStore::load(&path).unwrap();
        assert_eq!(reloaded.options().journal_mode, JournalMode::Wal);
        assert!(!reloaded.options().enforce_foreign_keys);
    }

    #[test]
    fn partial_file_uses_field_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{ "journal_mode": "TRUNCATE", "version": 9 }"#).unwrap();
        let store = StorageOptionsStore::load(&path).unwrap();
        assert_eq!(store.options().journal_mode, JournalMode::Truncate);
        assert!(store.options().enforce_foreign_keys);
        assert_eq!(store.options().version, 1);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            StorageOptionsStore::load(&path),
            Err(OptionsError::Parse { .. })
        ));
    }
}
