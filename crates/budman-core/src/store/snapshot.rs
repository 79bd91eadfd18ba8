//! Whole-model snapshot load and save.
//!
//! The snapshot is a single URL-addressed resource. Only the `file` scheme
//! is wired end-to-end; `http`/`https` are recognized in the scheme taxonomy
//! but surface a distinct not-implemented error. On save, the in-memory
//! model is filtered down to the persisted allow-list before encoding, so
//! transient fields never round-trip.

use std::any::type_name;
use std::path::PathBuf;

use serde_json::Value;
use tracing::info;
use url::Url;

use crate::config::default_store_path;
use crate::error::{BudmanError, Result};
use crate::model::{decode_model, BudgetModel};
use crate::store::atomic::{read_store_file, write_store_file};
use crate::workbook::path_to_url;

/// Top-level keys persisted on save. Anything else present in memory is
/// intentionally dropped, letting the model carry transient state.
pub const PERSISTED_PROPERTIES: [&str; 12] = [
    "bdm_id",
    "bdm_store_filename",
    "bdm_store_filetype",
    "bdm_store_folder",
    "bdm_url",
    "bdm_fi_collection",
    "bdm_wf_collection",
    "bdm_options",
    "bdm_created_date",
    "bdm_last_modified_date",
    "bdm_last_modified_by",
    "bdm_data_context",
];

/// Resolve a snapshot URL to a local path, applying the scheme taxonomy:
/// no scheme is malformed, `http`/`https` are recognized but unimplemented,
/// anything else is unsupported.
pub fn resolve_store_url(url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|_| BudmanError::MalformedUrl {
        url: url.to_string(),
    })?;
    match parsed.scheme() {
        "file" => parsed.to_file_path().map_err(|_| BudmanError::MalformedUrl {
            url: url.to_string(),
        }),
        scheme @ ("http" | "https") => Err(BudmanError::SchemeNotImplemented {
            scheme: scheme.to_string(),
            url: url.to_string(),
        }),
        other => Err(BudmanError::UnsupportedScheme {
            scheme: other.to_string(),
            url: url.to_string(),
        }),
    }
}

/// Load the model snapshot from a URL.
///
/// All-or-nothing: the decoded model is returned only after the whole file
/// parsed and validated, so callers can swap it in wholesale. The decoded
/// value must be a non-empty object; anything else is a content error
/// distinct from a decode error.
pub fn load(url: &str) -> Result<BudgetModel> {
    let path = resolve_store_url(url)?;
    let value = read_store_file(&path)?;

    let non_empty_object = value.as_object().map_or(false, |o| !o.is_empty());
    if !non_empty_object {
        return Err(BudmanError::InvalidStoreShape {
            url: url.to_string(),
        });
    }

    let mut model = decode_model(&value, url)?;
    model.bdm_url = url.to_string();
    info!("Loaded model '{}' from {}", model.bdm_id, url);
    Ok(model)
}

/// Save the model snapshot to a URL.
///
/// The model is serialized to a JSON value, filtered to the allow-listed
/// top-level keys, and written atomically. An un-encodable value is
/// reported with its type and string form rather than swallowed.
pub fn save(model: &BudgetModel, url: &str) -> Result<()> {
    let path = resolve_store_url(url)?;

    let value = serde_json::to_value(model).map_err(|e| BudmanError::Encode {
        type_name: type_name::<BudgetModel>().to_string(),
        value: e.to_string(),
    })?;
    let Value::Object(map) = value else {
        return Err(BudmanError::Encode {
            type_name: type_name::<BudgetModel>().to_string(),
            value: value.to_string(),
        });
    };

    let filtered: serde_json::Map<String, Value> = map
        .into_iter()
        .filter(|(key, _)| PERSISTED_PROPERTIES.contains(&key.as_str()))
        .collect();

    write_store_file(&path, &Value::Object(filtered))?;
    info!("Saved model '{}' to {}", model.bdm_id, url);
    Ok(())
}

/// Default snapshot URL under the user's home folder.
pub fn default_store_url() -> Result<String> {
    path_to_url(&default_store_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BudgetConfig;
    use tempfile::TempDir;

    fn setup_model() -> BudgetModel {
        let config = BudgetConfig::default_template("/tmp/budget");
        BudgetModel::new_template(&config, "tester")
    }

    fn store_url(dir: &TempDir) -> String {
        path_to_url(&dir.path().join("bdm_store.jsonc")).unwrap()
    }

    #[test]
    fn test_scheme_taxonomy() {
        assert!(matches!(
            resolve_store_url("relative/path.jsonc").unwrap_err(),
            BudmanError::MalformedUrl { .. }
        ));
        assert!(matches!(
            resolve_store_url("https://host/store.jsonc").unwrap_err(),
            BudmanError::SchemeNotImplemented { .. }
        ));
        assert!(matches!(
            resolve_store_url("ftp://host/store.jsonc").unwrap_err(),
            BudmanError::UnsupportedScheme { .. }
        ));
        assert!(resolve_store_url("file:///tmp/store.jsonc").is_ok());
    }

    #[test]
    fn test_save_load_roundtrip_allow_listed_fields() {
        let temp_dir = TempDir::new().unwrap();
        let url = store_url(&temp_dir);

        let mut model = setup_model();
        model
            .bdm_working_data
            .insert("scratch".to_string(), serde_json::json!(42));

        save(&model, &url).unwrap();
        let loaded = load(&url).unwrap();

        assert_eq!(loaded.bdm_id, model.bdm_id);
        assert_eq!(loaded.bdm_fi_collection, model.bdm_fi_collection);
        assert_eq!(loaded.bdm_wf_collection, model.bdm_wf_collection);
        assert_eq!(loaded.bdm_created_date, model.bdm_created_date);
        // Transient state does not round-trip.
        assert!(loaded.bdm_working_data.is_empty());

        // And is absent from the stored file itself.
        let path = resolve_store_url(&url).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("bdm_working_data"));
        assert!(!raw.contains("scratch"));
    }

    #[test]
    fn test_load_rejects_empty_object() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.jsonc");
        std::fs::write(&path, "{}").unwrap();
        let url = path_to_url(&path).unwrap();

        assert!(matches!(
            load(&url).unwrap_err(),
            BudmanError::InvalidStoreShape { .. }
        ));
    }

    #[test]
    fn test_load_rejects_non_object() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.jsonc");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let url = path_to_url(&path).unwrap();

        assert!(matches!(
            load(&url).unwrap_err(),
            BudmanError::InvalidStoreShape { .. }
        ));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let url = store_url(&temp_dir);
        assert!(load(&url).unwrap_err().is_not_found());
    }
}
