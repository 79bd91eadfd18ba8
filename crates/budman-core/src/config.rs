//! Configuration for the budget workbook library.
//!
//! All configuration is carried by an explicit [`BudgetConfig`] value built
//! once by the caller and passed by reference into the reconciler and the
//! path codec. There is no ambient global state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BudmanError, Result};

/// Storage-level constants shared across the library.
pub struct StoreConfig;

impl StoreConfig {
    /// Reserved separator between folder path and base name in a workbook id.
    pub const ID_SEPARATOR: &'static str = "|";
    /// Schema stamp written into persisted workbook records.
    pub const WORKBOOK_SCHEMA_VERSION: &'static str = "1.3.0";
    /// Filetypes accepted for the persisted model snapshot.
    pub const STORE_FILETYPES: [&'static str; 2] = [".json", ".jsonc"];
    /// Filetypes recognized as workbooks during folder scans.
    pub const WORKBOOK_FILETYPES: [&'static str; 5] =
        [".csv", ".xlsx", ".json", ".jsonc", ".txt"];
    /// Office writes `~$name.xlsx` lock files next to open workbooks.
    pub const LOCK_FILE_PREFIX: &'static str = "~$";
    pub const DEFAULT_STORE_FILENAME: &'static str = "bdm_store";
    pub const DEFAULT_STORE_FILETYPE: &'static str = ".jsonc";
    pub const DEFAULT_BUDGET_FOLDER_NAME: &'static str = "budget";

    /// Check a file extension (with leading dot) against the workbook list.
    pub fn is_workbook_filetype(filetype: &str) -> bool {
        Self::WORKBOOK_FILETYPES
            .iter()
            .any(|ft| ft.eq_ignore_ascii_case(filetype))
    }

    /// Check a file extension (with leading dot) against the store list.
    pub fn is_store_filetype(filetype: &str) -> bool {
        Self::STORE_FILETYPES
            .iter()
            .any(|ft| ft.eq_ignore_ascii_case(filetype))
    }
}

/// Role of a folder within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkflowPurpose {
    #[serde(rename = "wf_input")]
    Input,
    #[serde(rename = "wf_working")]
    Working,
    #[serde(rename = "wf_output")]
    Output,
}

impl WorkflowPurpose {
    /// All purposes, in the canonical scan order.
    pub const ALL: [WorkflowPurpose; 3] = [
        WorkflowPurpose::Input,
        WorkflowPurpose::Working,
        WorkflowPurpose::Output,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPurpose::Input => "wf_input",
            WorkflowPurpose::Working => "wf_working",
            WorkflowPurpose::Output => "wf_output",
        }
    }

    /// Name of the workflow config element holding this purpose's folder.
    /// Doubles as the `wf_folder_id` recorded on discovered workbooks.
    pub fn folder_element(&self) -> &'static str {
        match self {
            WorkflowPurpose::Input => "wf_input_folder",
            WorkflowPurpose::Working => "wf_working_folder",
            WorkflowPurpose::Output => "wf_output_folder",
        }
    }
}

impl Default for WorkflowPurpose {
    fn default() -> Self {
        WorkflowPurpose::Input
    }
}

impl std::str::FromStr for WorkflowPurpose {
    type Err = BudmanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wf_input" => Ok(WorkflowPurpose::Input),
            "wf_working" => Ok(WorkflowPurpose::Working),
            "wf_output" => Ok(WorkflowPurpose::Output),
            other => Err(BudmanError::InvalidPurpose(other.to_string())),
        }
    }
}

impl std::fmt::Display for WorkflowPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of financial institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionType {
    Bank,
    Brokerage,
    Organization,
    Person,
}

impl InstitutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstitutionType::Bank => "bank",
            InstitutionType::Brokerage => "brokerage",
            InstitutionType::Organization => "organization",
            InstitutionType::Person => "person",
        }
    }
}

impl std::str::FromStr for InstitutionType {
    type Err = BudmanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bank" => Ok(InstitutionType::Bank),
            "brokerage" => Ok(InstitutionType::Brokerage),
            "organization" => Ok(InstitutionType::Organization),
            "person" => Ok(InstitutionType::Person),
            other => Err(BudmanError::InvalidInstitutionType(other.to_string())),
        }
    }
}

impl Default for InstitutionType {
    fn default() -> Self {
        InstitutionType::Bank
    }
}

impl std::fmt::Display for InstitutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One workflow definition: a name plus per-purpose folders and filename
/// prefixes. Folders are relative to the institution folder; a purpose with
/// no folder configured is simply not scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub wf_key: String,
    pub wf_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf_input_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf_working_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf_output_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf_prefix_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf_prefix_working: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf_prefix_out: Option<String>,
}

impl WorkflowConfig {
    pub fn new(wf_key: impl Into<String>, wf_name: impl Into<String>) -> Self {
        WorkflowConfig {
            wf_key: wf_key.into(),
            wf_name: wf_name.into(),
            wf_input_folder: None,
            wf_working_folder: None,
            wf_output_folder: None,
            wf_prefix_in: None,
            wf_prefix_working: None,
            wf_prefix_out: None,
        }
    }

    /// Folder configured for the given purpose, if any.
    pub fn folder_for(&self, purpose: WorkflowPurpose) -> Option<&str> {
        let folder = match purpose {
            WorkflowPurpose::Input => &self.wf_input_folder,
            WorkflowPurpose::Working => &self.wf_working_folder,
            WorkflowPurpose::Output => &self.wf_output_folder,
        };
        folder.as_deref().filter(|f| !f.is_empty())
    }

    /// Filename prefix configured for the given purpose, if any.
    pub fn prefix_for(&self, purpose: WorkflowPurpose) -> Option<&str> {
        let prefix = match purpose {
            WorkflowPurpose::Input => &self.wf_prefix_in,
            WorkflowPurpose::Working => &self.wf_prefix_working,
            WorkflowPurpose::Output => &self.wf_prefix_out,
        };
        prefix.as_deref().filter(|p| !p.is_empty())
    }
}

/// Absolute location of one configured (workflow, purpose) folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowFolder {
    /// Config element name for the purpose (`wf_input_folder`, ...).
    pub wf_folder_id: String,
    /// Folder value as configured, relative to the institution folder.
    pub wf_folder: String,
    /// Resolved absolute path in the storage backend.
    pub abs_path: PathBuf,
}

/// Explicit configuration for the budget storage hierarchy.
///
/// Holds the absolute storage root and the workflow definitions, and
/// resolves (institution, workflow, purpose) triples to folder locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Absolute root of the budget folder hierarchy.
    pub bdm_folder: PathBuf,
    /// Workflow definitions keyed by `wf_key`.
    pub workflows: BTreeMap<String, WorkflowConfig>,
}

impl BudgetConfig {
    pub fn new(bdm_folder: impl Into<PathBuf>) -> Self {
        BudgetConfig {
            bdm_folder: expand_home(bdm_folder.into()),
            workflows: BTreeMap::new(),
        }
    }

    /// The canonical starter configuration: intake drops new statements in
    /// `data/new`, categorization consumes them into `data/categorized`,
    /// and the budget workflow finalizes into `data/finalized`.
    pub fn default_template(bdm_folder: impl Into<PathBuf>) -> Self {
        let mut cfg = BudgetConfig::new(bdm_folder);

        let mut intake = WorkflowConfig::new("intake", "intake");
        intake.wf_output_folder = Some("data/new".to_string());
        cfg.workflows.insert(intake.wf_key.clone(), intake);

        let mut categorization =
            WorkflowConfig::new("categorize_transactions", "categorize_transactions");
        categorization.wf_input_folder = Some("data/new".to_string());
        categorization.wf_output_folder = Some("data/categorized".to_string());
        categorization.wf_prefix_out = Some("categorized_".to_string());
        cfg.workflows
            .insert(categorization.wf_key.clone(), categorization);

        let mut finalization = WorkflowConfig::new("budget", "budget");
        finalization.wf_input_folder = Some("data/categorized".to_string());
        finalization.wf_prefix_in = Some("categorized_".to_string());
        finalization.wf_output_folder = Some("data/finalized".to_string());
        finalization.wf_prefix_out = Some("finalized_".to_string());
        cfg.workflows
            .insert(finalization.wf_key.clone(), finalization);

        cfg
    }

    /// Look up a workflow definition by key.
    pub fn workflow(&self, wf_key: &str) -> Result<&WorkflowConfig> {
        self.workflows
            .get(wf_key)
            .ok_or_else(|| BudmanError::UnknownWorkflow {
                wf_key: wf_key.to_string(),
            })
    }

    /// Resolve the folder for an (institution folder, workflow, purpose)
    /// triple. Returns `None` when the workflow has no folder configured
    /// for that purpose; existence of the path is not checked here.
    pub fn resolve_folder(
        &self,
        fi_folder: &str,
        wf_key: &str,
        purpose: WorkflowPurpose,
    ) -> Result<Option<WorkflowFolder>> {
        let wf = self.workflow(wf_key)?;
        let Some(folder) = wf.folder_for(purpose) else {
            return Ok(None);
        };
        Ok(Some(WorkflowFolder {
            wf_folder_id: purpose.folder_element().to_string(),
            wf_folder: folder.to_string(),
            abs_path: self.bdm_folder.join(fi_folder).join(folder),
        }))
    }

    /// Ordered list of all configured filename prefixes, for the path codec.
    /// Workflow order (by key) then input/working/output order within a
    /// workflow; first occurrence wins on duplicates.
    pub fn valid_prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = Vec::new();
        for wf in self.workflows.values() {
            for purpose in WorkflowPurpose::ALL {
                if let Some(prefix) = wf.prefix_for(purpose) {
                    if !prefixes.iter().any(|p| p == prefix) {
                        prefixes.push(prefix.to_string());
                    }
                }
            }
        }
        prefixes
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    let Some(s) = path.to_str() else {
        return path;
    };
    if s == "~" {
        return dirs::home_dir().unwrap_or(path);
    }
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path
}

/// Default location of the persisted model snapshot:
/// `~/<budget folder>/<store filename><store filetype>`.
pub fn default_store_path() -> PathBuf {
    let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(StoreConfig::DEFAULT_BUDGET_FOLDER_NAME).join(format!(
        "{}{}",
        StoreConfig::DEFAULT_STORE_FILENAME,
        StoreConfig::DEFAULT_STORE_FILETYPE
    ))
}

/// Extension of `path` as a lowercased `.ext` string, or empty when absent.
pub fn filetype_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_purpose_roundtrip() {
        for purpose in WorkflowPurpose::ALL {
            let s = purpose.as_str();
            let parsed = WorkflowPurpose::from_str(s).expect("Should parse");
            assert_eq!(purpose, parsed);
        }
        assert!(WorkflowPurpose::from_str("wf_bogus").is_err());
    }

    #[test]
    fn test_institution_type_roundtrip() {
        for t in [
            InstitutionType::Bank,
            InstitutionType::Brokerage,
            InstitutionType::Organization,
            InstitutionType::Person,
        ] {
            let parsed = InstitutionType::from_str(t.as_str()).expect("Should parse");
            assert_eq!(t, parsed);
        }
        assert!(InstitutionType::from_str("charity").is_err());
    }

    #[test]
    fn test_template_folders() {
        let cfg = BudgetConfig::default_template("/tmp/budget");
        assert_eq!(cfg.workflows.len(), 3);

        let folder = cfg
            .resolve_folder("boa", "categorize_transactions", WorkflowPurpose::Input)
            .unwrap()
            .expect("input folder configured");
        assert_eq!(folder.wf_folder, "data/new");
        assert_eq!(folder.wf_folder_id, "wf_input_folder");
        assert_eq!(folder.abs_path, PathBuf::from("/tmp/budget/boa/data/new"));

        // intake has no input folder
        let none = cfg
            .resolve_folder("boa", "intake", WorkflowPurpose::Input)
            .unwrap();
        assert!(none.is_none());

        // unknown workflow is an error, not a silent skip
        assert!(cfg
            .resolve_folder("boa", "nonesuch", WorkflowPurpose::Input)
            .is_err());
    }

    #[test]
    fn test_valid_prefixes_ordered_and_deduped() {
        let cfg = BudgetConfig::default_template("/tmp/budget");
        // Workflows iterate in key order: budget, categorize_transactions,
        // intake. The budget workflow contributes categorized_ (in) and
        // finalized_ (out); categorize_transactions re-contributes
        // categorized_, which dedups to the first occurrence.
        assert_eq!(cfg.valid_prefixes(), vec!["categorized_", "finalized_"]);
    }

    #[test]
    fn test_workbook_filetype_check() {
        assert!(StoreConfig::is_workbook_filetype(".csv"));
        assert!(StoreConfig::is_workbook_filetype(".XLSX"));
        assert!(!StoreConfig::is_workbook_filetype(".exe"));
        assert!(StoreConfig::is_store_filetype(".jsonc"));
        assert!(!StoreConfig::is_store_filetype(".csv"));
    }

    #[test]
    fn test_filetype_of() {
        assert_eq!(filetype_of(Path::new("/a/b/Txns.CSV")), ".csv");
        assert_eq!(filetype_of(Path::new("/a/b/noext")), "");
    }
}
