//! Atomic file operations for the persisted snapshot.
//!
//! Reads tolerate the comment-carrying JSON dialect the snapshot is written
//! in. Writes go through a temp file in the target directory: serialize,
//! re-parse to validate, fsync, optional `.bak` of the previous snapshot,
//! then rename into place so no partial file is ever visible.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{filetype_of, StoreConfig};
use crate::error::{BudmanError, Result};

/// Read and decode a snapshot file.
///
/// Validates the path before reading: it must exist, be a regular file,
/// carry a supported store filetype, and be non-empty. The content is
/// decoded with a comment-tolerant parser; a decode failure is distinct
/// from the shape checks callers apply to the decoded value.
pub fn read_store_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(BudmanError::StoreNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(BudmanError::NotAFile(path.to_path_buf()));
    }
    let filetype = filetype_of(path);
    if !StoreConfig::is_store_filetype(&filetype) {
        return Err(BudmanError::InvalidStoreFiletype {
            filetype,
            path: path.to_path_buf(),
        });
    }

    let mut file = File::open(path).map_err(|e| BudmanError::io_with_path(e, path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| BudmanError::io_with_path(e, path))?;
    if contents.trim().is_empty() {
        return Err(BudmanError::EmptyStore(path.to_path_buf()));
    }

    let value: Value = json5::from_str(&contents).map_err(|e| BudmanError::Decode {
        url: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!("Read {} chars of snapshot from {}", contents.len(), path.display());
    Ok(value)
}

/// Write a snapshot value atomically, keeping a `.bak` of any previous file.
pub fn write_store_file(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| BudmanError::io_with_path(e, parent))?;
        }
    }

    let temp_path = temp_path_for(path);
    let serialized =
        serde_json::to_string_pretty(value).map_err(|e| BudmanError::Json {
            message: format!("Failed to serialize snapshot: {}", e),
            source: Some(e),
        })?;

    // Validate by re-parsing before anything touches the target.
    serde_json::from_str::<Value>(&serialized).map_err(|e| BudmanError::Json {
        message: format!("Snapshot validation failed: {}", e),
        source: Some(e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| BudmanError::io_with_path(e, &temp_path))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| BudmanError::io_with_path(e, &temp_path))?;
        file.flush()
            .map_err(|e| BudmanError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| BudmanError::io_with_path(e, &temp_path))?;
    }

    if path.exists() {
        let backup_path = backup_path_for(path);
        if let Err(e) = fs::copy(path, &backup_path) {
            // Backup failure is not fatal.
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    fs::rename(&temp_path, path).map_err(|e| BudmanError::io_with_path(e, path))?;
    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Backup name with `.bak` appended after the full filename, so
/// `store.json` and `store.jsonc` in one directory keep separate backups.
fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Unique temp file name next to the target, suffixed with PID and thread
/// id so concurrent processes never collide.
fn temp_path_for(path: &Path) -> PathBuf {
    let pid = process::id();
    let tid = thread_id();
    path.with_extension(format!("{}.{}.tmp", pid, tid))
}

fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    format!("{:?}", thread::current().id()).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.jsonc");

        let value = json!({ "bdm_id": "abcd1234" });
        write_store_file(&path, &value).unwrap();
        assert!(path.exists());

        let read_back = read_store_file(&path).unwrap();
        assert_eq!(read_back, value);
    }

    #[test]
    fn test_read_tolerates_comments() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.jsonc");
        std::fs::write(&path, "// snapshot\n{ \"bdm_id\": \"abcd1234\", }\n").unwrap();

        let value = read_store_file(&path).unwrap();
        assert_eq!(value["bdm_id"], "abcd1234");
    }

    #[test]
    fn test_read_validation_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.jsonc");
        assert!(matches!(
            read_store_file(&missing).unwrap_err(),
            BudmanError::StoreNotFound(_)
        ));

        let wrong_type = temp_dir.path().join("store.csv");
        std::fs::write(&wrong_type, "a,b").unwrap();
        assert!(matches!(
            read_store_file(&wrong_type).unwrap_err(),
            BudmanError::InvalidStoreFiletype { .. }
        ));

        let empty = temp_dir.path().join("empty.jsonc");
        std::fs::write(&empty, "  \n").unwrap();
        assert!(matches!(
            read_store_file(&empty).unwrap_err(),
            BudmanError::EmptyStore(_)
        ));

        let garbled = temp_dir.path().join("garbled.jsonc");
        std::fs::write(&garbled, "{ not json").unwrap();
        assert!(matches!(
            read_store_file(&garbled).unwrap_err(),
            BudmanError::Decode { .. }
        ));
    }

    #[test]
    fn test_write_keeps_backup_of_previous() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.jsonc");

        write_store_file(&path, &json!({ "bdm_id": "first" })).unwrap();
        write_store_file(&path, &json!({ "bdm_id": "second" })).unwrap();

        // Backup keeps the full filename, so sibling stores with different
        // extensions never share one.
        let backup = temp_dir.path().join("store.jsonc.bak");
        assert!(backup.exists());
        let backup_contents = std::fs::read_to_string(&backup).unwrap();
        assert!(backup_contents.contains("first"));
        assert_eq!(read_store_file(&path).unwrap()["bdm_id"], "second");
    }

    #[test]
    fn test_sibling_stores_get_distinct_backups() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("store.json");
        let jsonc_path = temp_dir.path().join("store.jsonc");

        write_store_file(&json_path, &json!({ "bdm_id": "plain-old" })).unwrap();
        write_store_file(&json_path, &json!({ "bdm_id": "plain-new" })).unwrap();
        write_store_file(&jsonc_path, &json!({ "bdm_id": "jsonc-old" })).unwrap();
        write_store_file(&jsonc_path, &json!({ "bdm_id": "jsonc-new" })).unwrap();

        let json_bak = std::fs::read_to_string(temp_dir.path().join("store.json.bak")).unwrap();
        let jsonc_bak =
            std::fs::read_to_string(temp_dir.path().join("store.jsonc.bak")).unwrap();
        assert!(json_bak.contains("plain-old"));
        assert!(jsonc_bak.contains("jsonc-old"));
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("store.json");
        write_store_file(&path, &json!({ "bdm_id": "x" })).unwrap();
        assert!(path.exists());
    }
}
