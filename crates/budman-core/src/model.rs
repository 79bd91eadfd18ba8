//! The budget model aggregate: the state the store snapshot persists.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{BudgetConfig, InstitutionType, StoreConfig, WorkflowConfig};
use crate::error::{BudmanError, Result};
use crate::workbook::record::decode_record;
use crate::workbook::WorkbookCollection;

/// One financial institution and its tracked workbooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub fi_key: String,
    pub fi_name: String,
    #[serde(default)]
    pub fi_type: InstitutionType,
    /// Folder under the budget root holding this institution's data.
    pub fi_folder: String,
    #[serde(default)]
    pub fi_workbook_collection: WorkbookCollection,
}

impl Institution {
    pub fn new(
        fi_key: impl Into<String>,
        fi_name: impl Into<String>,
        fi_type: InstitutionType,
        fi_folder: impl Into<String>,
    ) -> Self {
        Institution {
            fi_key: fi_key.into(),
            fi_name: fi_name.into(),
            fi_type,
            fi_folder: fi_folder.into(),
            fi_workbook_collection: WorkbookCollection::new(),
        }
    }
}

/// The whole-model aggregate.
///
/// Persisted fields carry the `bdm_` prefix and must stay on the snapshot
/// allow-list to round-trip; everything marked `serde(skip)` is transient
/// runtime state that must never reach the stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BudgetModel {
    #[serde(default)]
    pub bdm_id: String,
    #[serde(default)]
    pub bdm_store_filename: String,
    #[serde(default)]
    pub bdm_store_filetype: String,
    #[serde(default)]
    pub bdm_store_folder: String,
    #[serde(default)]
    pub bdm_url: String,
    #[serde(default)]
    pub bdm_fi_collection: BTreeMap<String, Institution>,
    #[serde(default)]
    pub bdm_wf_collection: BTreeMap<String, WorkflowConfig>,
    #[serde(default)]
    pub bdm_options: BTreeMap<String, Value>,
    #[serde(default)]
    pub bdm_created_date: String,
    #[serde(default)]
    pub bdm_last_modified_date: String,
    #[serde(default)]
    pub bdm_last_modified_by: String,
    #[serde(default)]
    pub bdm_data_context: BTreeMap<String, Value>,
    /// Transient scratch state. Never persisted.
    #[serde(skip)]
    pub bdm_working_data: BTreeMap<String, Value>,
}

impl BudgetModel {
    /// Fresh model from the canonical template, stamped with the creation
    /// date and user.
    pub fn new_template(config: &BudgetConfig, user: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        let mut fi_collection = BTreeMap::new();
        for institution in [
            Institution::new("boa", "Bank of America", InstitutionType::Bank, "boa"),
            Institution::new("merrill", "Merrill Lynch", InstitutionType::Brokerage, "merrill"),
        ] {
            fi_collection.insert(institution.fi_key.clone(), institution);
        }

        BudgetModel {
            bdm_id: new_model_id(),
            bdm_store_filename: StoreConfig::DEFAULT_STORE_FILENAME.to_string(),
            bdm_store_filetype: StoreConfig::DEFAULT_STORE_FILETYPE.to_string(),
            bdm_store_folder: config.bdm_folder.display().to_string(),
            bdm_url: String::new(),
            bdm_fi_collection: fi_collection,
            bdm_wf_collection: config.workflows.clone(),
            bdm_options: BTreeMap::new(),
            bdm_created_date: now.clone(),
            bdm_last_modified_date: now,
            bdm_last_modified_by: user.to_string(),
            bdm_data_context: BTreeMap::new(),
            bdm_working_data: BTreeMap::new(),
        }
    }

    /// Look up an institution, distinguishing not-found from other errors.
    pub fn institution(&self, fi_key: &str) -> Result<&Institution> {
        self.bdm_fi_collection
            .get(fi_key)
            .ok_or_else(|| BudmanError::UnknownInstitution {
                fi_key: fi_key.to_string(),
            })
    }

    pub fn institution_mut(&mut self, fi_key: &str) -> Result<&mut Institution> {
        self.bdm_fi_collection
            .get_mut(fi_key)
            .ok_or_else(|| BudmanError::UnknownInstitution {
                fi_key: fi_key.to_string(),
            })
    }

    /// Update the modified stamp after a mutation.
    pub fn touch(&mut self, user: &str) {
        self.bdm_last_modified_date = Utc::now().to_rfc3339();
        self.bdm_last_modified_by = user.to_string();
    }
}

/// Short random model id: the first 8 hex chars of a v4 uuid.
pub fn new_model_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Versioned decode of a snapshot value into a [`BudgetModel`].
///
/// Workbook record maps are migrated record by record before the aggregate
/// decode, so a malformed record yields a typed error naming the field
/// instead of a construct-then-validate failure.
pub fn decode_model(value: &Value, url: &str) -> Result<BudgetModel> {
    let Some(obj) = value.as_object() else {
        return Err(BudmanError::InvalidStoreShape {
            url: url.to_string(),
        });
    };

    let mut map = obj.clone();
    if let Some(Value::Object(fi_collection)) = map.get_mut("bdm_fi_collection") {
        for (fi_key, fi_value) in fi_collection.iter_mut() {
            let Some(fi_obj) = fi_value.as_object_mut() else {
                return Err(BudmanError::InvalidRecord {
                    field: format!("bdm_fi_collection.{}", fi_key),
                    message: "institution entry is not an object".to_string(),
                });
            };
            if let Some(Value::Object(workbooks)) = fi_obj.get_mut("fi_workbook_collection") {
                for (wb_id, wb_value) in workbooks.iter_mut() {
                    let record = decode_record(wb_value).map_err(|e| match e {
                        BudmanError::InvalidRecord { field, message } => {
                            BudmanError::InvalidRecord {
                                field: format!("{}.{}", wb_id, field),
                                message,
                            }
                        }
                        other => other,
                    })?;
                    *wb_value = serde_json::to_value(&record)?;
                }
            }
        }
    }

    serde_json::from_value(Value::Object(map)).map_err(|e| BudmanError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
