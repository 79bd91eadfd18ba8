//! Workbook metadata records.
//!
//! A [`WorkbookRecord`] describes one stored file, not its content. The
//! record identity (`wb_id`) is always derived from the folder path and the
//! base name; there is no settable identity field, so two records for the
//! same folder and name are the same entity by construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{StoreConfig, WorkflowPurpose};
use crate::error::{BudmanError, Result};

/// Persisted keys dropped during schema migration. These existed in older
/// snapshot versions and must not survive a decode.
const OBSOLETE_RECORD_KEYS: &[&str] = &["wb_content", "wb_last_error", "wf_folder_url"];

/// Workbook type tag, embedded in filenames and persisted with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkbookType {
    #[serde(rename = "txn_register")]
    TxnRegister,
    #[serde(rename = "excel_txns")]
    ExcelTxns,
    #[serde(rename = "csv_txns")]
    CsvTxns,
    #[serde(rename = "category_map")]
    CategoryMap,
    #[serde(rename = "category_catalog")]
    CategoryCatalog,
    #[serde(rename = "budget")]
    Budget,
    #[serde(rename = "config")]
    Config,
    #[serde(rename = "transactions")]
    Transactions,
}

impl WorkbookType {
    /// All types in canonical scan order. `Transactions` is last because it
    /// is the fallback, never a filename match target of its own.
    pub const ALL: [WorkbookType; 8] = [
        WorkbookType::TxnRegister,
        WorkbookType::ExcelTxns,
        WorkbookType::CsvTxns,
        WorkbookType::CategoryMap,
        WorkbookType::CategoryCatalog,
        WorkbookType::Budget,
        WorkbookType::Config,
        WorkbookType::Transactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkbookType::TxnRegister => "txn_register",
            WorkbookType::ExcelTxns => "excel_txns",
            WorkbookType::CsvTxns => "csv_txns",
            WorkbookType::CategoryMap => "category_map",
            WorkbookType::CategoryCatalog => "category_catalog",
            WorkbookType::Budget => "budget",
            WorkbookType::Config => "config",
            WorkbookType::Transactions => "transactions",
        }
    }

    /// Parse a tag string back into a type.
    pub fn from_tag(tag: &str) -> Option<WorkbookType> {
        WorkbookType::ALL.iter().copied().find(|t| t.as_str() == tag)
    }

    /// Detect the workbook type from a filename stem.
    ///
    /// Scans the tag strings in declaration order and returns the first one
    /// that occurs in the stem, falling back to the canonical default.
    pub fn detect(stem: &str) -> WorkbookType {
        let lowered = stem.to_lowercase();
        for wb_type in WorkbookType::ALL {
            if wb_type == WorkbookType::Transactions {
                continue;
            }
            if lowered.contains(wb_type.as_str()) {
                return wb_type;
            }
        }
        WorkbookType::Transactions
    }

    /// Tag strings in canonical order, for the path codec's suffix scan.
    pub fn tag_strings() -> Vec<String> {
        WorkbookType::ALL
            .iter()
            .map(|t| t.as_str().to_string())
            .collect()
    }
}

impl Default for WorkbookType {
    fn default() -> Self {
        WorkbookType::Transactions
    }
}

impl std::fmt::Display for WorkbookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata for one stored workbook file.
///
/// Content is never carried here; `wb_loaded` records whether content has
/// been fetched elsewhere, and survives reconciliation refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbookRecord {
    /// Full file name with extension. Identity input.
    pub wb_name: String,
    /// Filename stem, without extension.
    #[serde(default)]
    pub wb_filename: String,
    /// Extension including the leading dot, lowercased.
    #[serde(default)]
    pub wb_filetype: String,
    #[serde(default)]
    pub wb_type: WorkbookType,
    /// Storage URL (file scheme).
    #[serde(default)]
    pub wb_url: String,
    /// Owning institution key.
    #[serde(default)]
    pub fi_key: String,
    /// Workflow key.
    #[serde(default)]
    pub wf_key: String,
    #[serde(default)]
    pub wf_purpose: WorkflowPurpose,
    /// Folder identifier from configuration (`wf_input_folder`, ...).
    #[serde(default)]
    pub wf_folder_id: String,
    /// Folder path relative to the institution folder. Identity input.
    pub wf_folder: String,
    /// Whether content has been fetched into memory.
    #[serde(default)]
    pub wb_loaded: bool,
    #[serde(default = "current_schema_version")]
    pub wb_schema_version: String,
}

fn current_schema_version() -> String {
    StoreConfig::WORKBOOK_SCHEMA_VERSION.to_string()
}

impl WorkbookRecord {
    /// Derived identity: `wf_folder` and `wb_name` joined by the reserved
    /// separator. Read-only by construction; no identity field exists.
    pub fn wb_id(&self) -> String {
        format!(
            "{}{}{}",
            self.wf_folder,
            StoreConfig::ID_SEPARATOR,
            self.wb_name
        )
    }

    /// Canonical string form of an attribute by its external field name.
    ///
    /// Returns `None` for names outside the record's external shape.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "wb_id" => Some(self.wb_id()),
            "wb_name" => Some(self.wb_name.clone()),
            "wb_filename" => Some(self.wb_filename.clone()),
            "wb_filetype" => Some(self.wb_filetype.clone()),
            "wb_type" => Some(self.wb_type.as_str().to_string()),
            "wb_url" => Some(self.wb_url.clone()),
            "fi_key" => Some(self.fi_key.clone()),
            "wf_key" => Some(self.wf_key.clone()),
            "wf_purpose" => Some(self.wf_purpose.as_str().to_string()),
            "wf_folder_id" => Some(self.wf_folder_id.clone()),
            "wf_folder" => Some(self.wf_folder.clone()),
            "wb_loaded" => Some(self.wb_loaded.to_string()),
            "wb_schema_version" => Some(self.wb_schema_version.clone()),
            _ => None,
        }
    }

    /// Refresh path-derived fields from a freshly discovered candidate with
    /// the same identity, preserving the loaded flag.
    ///
    /// Returns true when any field actually changed.
    pub fn refresh_from(&mut self, candidate: &WorkbookRecord) -> bool {
        debug_assert_eq!(self.wb_id(), candidate.wb_id());
        let mut changed = false;
        macro_rules! refresh {
            ($field:ident) => {
                if self.$field != candidate.$field {
                    self.$field = candidate.$field.clone();
                    changed = true;
                }
            };
        }
        refresh!(wb_filename);
        refresh!(wb_filetype);
        refresh!(wb_type);
        refresh!(wb_url);
        refresh!(fi_key);
        refresh!(wf_key);
        refresh!(wf_purpose);
        refresh!(wf_folder_id);
        changed
    }
}

/// Decode a persisted workbook record from an arbitrary JSON value.
///
/// This is the explicit, versioned restore path: required fields are
/// validated up front, obsolete keys from older schema versions are dropped,
/// and missing optional fields are filled with defaults. A missing or
/// invalid field yields a typed error naming the field, never a partially
/// constructed record.
pub fn decode_record(value: &Value) -> Result<WorkbookRecord> {
    let Some(obj) = value.as_object() else {
        return Err(BudmanError::InvalidRecord {
            field: "record".to_string(),
            message: format!("expected an object, got {}", json_type_name(value)),
        });
    };

    let mut map = obj.clone();
    for key in OBSOLETE_RECORD_KEYS {
        map.remove(*key);
    }

    for required in ["wb_name", "wf_folder"] {
        match map.get(required).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => {}
            Some(_) => {
                return Err(BudmanError::InvalidRecord {
                    field: required.to_string(),
                    message: "must be a non-empty string".to_string(),
                })
            }
            None => {
                return Err(BudmanError::InvalidRecord {
                    field: required.to_string(),
                    message: "missing required field".to_string(),
                })
            }
        }
    }

    // Older snapshots predate the schema stamp; migrate them forward.
    if !map.contains_key("wb_schema_version") {
        map.insert(
            "wb_schema_version".to_string(),
            Value::String(StoreConfig::WORKBOOK_SCHEMA_VERSION.to_string()),
        );
    }
    if map.get("wb_type").map_or(true, Value::is_null) {
        map.insert(
            "wb_type".to_string(),
            Value::String(WorkbookType::Transactions.as_str().to_string()),
        );
    }

    serde_json::from_value(Value::Object(map)).map_err(|e| BudmanError::InvalidRecord {
        field: "record".to_string(),
        message: e.to_string(),
    })
}

/// Short JSON type name for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
