//! Reconciliation of one institution's workbook collection against storage.
//!
//! The reconciler walks every configured (workflow, purpose) folder for the
//! institution, derives candidate records through the path codec, and merges
//! them into the collection. Discovery is additive by default: records
//! present in the collection but absent from storage are only reported
//! unless [`ReconcileMode::RemoveMissing`] is requested.
//!
//! Failure isolation: a single unreadable file is skipped with a warning; a
//! missing or unreadable folder is recorded as a folder-level error for that
//! (workflow, purpose) pair and the other pairs continue. Tracked records
//! living in a folder that failed to list are reported as unverified and
//! left untouched, never treated as missing: an unlistable folder says
//! nothing about its contents. An unknown institution key is a hard
//! precondition error raised before any mutation.
//!
//! The reconciler never persists. Saving the snapshot is the caller's
//! explicit call, made only after a pass has completed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{filetype_of, BudgetConfig, StoreConfig, WorkflowPurpose};
use crate::error::Result;
use crate::model::BudgetModel;
use crate::workbook::codec::{parse_name, path_to_url};
use crate::workbook::record::{WorkbookRecord, WorkbookType};
use crate::workbook::Upsert;

/// Merge policy for records present in the collection but absent from
/// storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Report missing records, leave them in the collection.
    Additive,
    /// Remove missing records from the collection.
    RemoveMissing,
}

/// Delta summary of one reconciliation pass, suitable for a log or status
/// line via its `Display` impl.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    pub fi_key: String,
    /// Identities discovered in storage but not previously tracked.
    pub added: Vec<String>,
    /// Identities removed from the collection (remove-missing mode only).
    pub removed: Vec<String>,
    /// Identities tracked but absent from storage.
    pub missing: Vec<String>,
    /// Identities tracked in folders that could not be listed. Left
    /// untouched even in remove-missing mode.
    pub unverified: Vec<String>,
    /// Tracked records whose path-derived fields were refreshed.
    pub refreshed: usize,
    /// Tracked records rediscovered with no field changes.
    pub unchanged: usize,
    /// Files skipped during listing (unreadable entries).
    pub skipped: usize,
    /// Per-(workflow, purpose) folder failures: (pair id, message).
    pub folder_errors: Vec<(String, String)>,
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FI '{}': {} added, {} removed, {} missing, {} unverified, \
             {} refreshed, {} unchanged, {} skipped, {} folder errors",
            self.fi_key,
            self.added.len(),
            self.removed.len(),
            self.missing.len(),
            self.unverified.len(),
            self.refreshed,
            self.unchanged,
            self.skipped,
            self.folder_errors.len()
        )
    }
}

/// Walks storage for one institution and merges what it finds into the
/// model's workbook collection.
pub struct Reconciler<'a> {
    config: &'a BudgetConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a BudgetConfig) -> Self {
        Reconciler { config }
    }

    /// Bring the institution's collection into agreement with storage.
    ///
    /// Running twice against an unchanged filesystem yields zero adds and
    /// zero missing on the second pass, and a structurally identical
    /// collection.
    pub fn reconcile(
        &self,
        model: &mut BudgetModel,
        fi_key: &str,
        mode: ReconcileMode,
    ) -> Result<ReconcileSummary> {
        // Unknown institution is fatal before any mutation.
        let fi_folder = model.institution(fi_key)?.fi_folder.clone();

        info!("Start: reconcile workbooks for FI '{}'", fi_key);
        let mut summary = ReconcileSummary {
            fi_key: fi_key.to_string(),
            ..ReconcileSummary::default()
        };

        let (discovered, errored_folders) = self.discover(fi_key, &fi_folder, &mut summary)?;
        self.merge(model, fi_key, discovered, &errored_folders, mode, &mut summary)?;

        info!("Complete: {}", summary);
        Ok(summary)
    }

    /// Scan every configured (workflow, purpose) folder and build candidate
    /// records. Keyed by identity; a folder reachable through more than one
    /// (workflow, purpose) pair contributes one record, last pair wins.
    ///
    /// Also returns the `wf_folder` values of pairs that failed to list, so
    /// the merge can tell "folder listed, record gone" from "folder
    /// unlistable, record state unknown".
    fn discover(
        &self,
        fi_key: &str,
        fi_folder: &str,
        summary: &mut ReconcileSummary,
    ) -> Result<(BTreeMap<String, WorkbookRecord>, BTreeSet<String>)> {
        let prefixes = self.config.valid_prefixes();
        let type_tags = WorkbookType::tag_strings();
        let mut discovered: BTreeMap<String, WorkbookRecord> = BTreeMap::new();
        let mut errored_folders: BTreeSet<String> = BTreeSet::new();

        for wf_key in self.config.workflows.keys() {
            for purpose in WorkflowPurpose::ALL {
                let Some(folder) = self.config.resolve_folder(fi_folder, wf_key, purpose)?
                else {
                    continue;
                };
                let pair_id = format!("<{}:{}:{}:{}>", fi_key, wf_key, purpose, folder.wf_folder);

                if !folder.abs_path.exists() {
                    summary.folder_errors.push((
                        pair_id,
                        format!("folder does not exist: {}", folder.abs_path.display()),
                    ));
                    errored_folders.insert(folder.wf_folder.clone());
                    continue;
                }
                if !folder.abs_path.is_dir() {
                    summary.folder_errors.push((
                        pair_id,
                        format!("not a directory: {}", folder.abs_path.display()),
                    ));
                    errored_folders.insert(folder.wf_folder.clone());
                    continue;
                }

                for entry in WalkDir::new(&folder.abs_path).min_depth(1).max_depth(1) {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            warn!("{} skipping unreadable entry: {}", pair_id, e);
                            summary.skipped += 1;
                            continue;
                        }
                    };
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let file_name = entry.file_name().to_string_lossy();
                    if file_name.starts_with(StoreConfig::LOCK_FILE_PREFIX) {
                        debug!("{} skipping lock file: {}", pair_id, file_name);
                        continue;
                    }
                    if !StoreConfig::is_workbook_filetype(&filetype_of(entry.path())) {
                        continue;
                    }

                    let record = match self.candidate_record(
                        entry.path(),
                        fi_key,
                        wf_key,
                        purpose,
                        &folder.wf_folder_id,
                        &folder.wf_folder,
                        &prefixes,
                        &type_tags,
                    ) {
                        Ok(record) => record,
                        Err(e) => {
                            warn!("{} skipping '{}': {}", pair_id, file_name, e);
                            summary.skipped += 1;
                            continue;
                        }
                    };
                    debug!("{} discovered workbook '{}'", pair_id, record.wb_id());
                    discovered.insert(record.wb_id(), record);
                }
            }
        }

        debug!(
            "FI '{}' discovered {} workbooks in storage",
            fi_key,
            discovered.len()
        );
        Ok((discovered, errored_folders))
    }

    /// Build one candidate record from a listed file. Workflow, purpose,
    /// and folder fields come from the configuration, not the file.
    #[allow(clippy::too_many_arguments)]
    fn candidate_record(
        &self,
        path: &std::path::Path,
        fi_key: &str,
        wf_key: &str,
        purpose: WorkflowPurpose,
        wf_folder_id: &str,
        wf_folder: &str,
        prefixes: &[String],
        type_tags: &[String],
    ) -> Result<WorkbookRecord> {
        let wb_url = path_to_url(path)?;
        let parsed = parse_name(&wb_url, prefixes, type_tags)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let wb_type = parsed
            .type_tag
            .as_deref()
            .and_then(WorkbookType::from_tag)
            .unwrap_or_else(|| WorkbookType::detect(&stem));

        Ok(WorkbookRecord {
            wb_name: parsed.full_filename,
            wb_filename: stem,
            wb_filetype: parsed.filetype,
            wb_type,
            wb_url,
            fi_key: fi_key.to_string(),
            wf_key: wf_key.to_string(),
            wf_purpose: purpose,
            wf_folder_id: wf_folder_id.to_string(),
            wf_folder: wf_folder.to_string(),
            wb_loaded: false,
            wb_schema_version: StoreConfig::WORKBOOK_SCHEMA_VERSION.to_string(),
        })
    }

    /// Merge discovered candidates into the institution's collection and
    /// track the delta. Existing records keep their loaded state; only
    /// path-derived fields are refreshed. Records in an errored folder are
    /// reported as unverified and never removed.
    fn merge(
        &self,
        model: &mut BudgetModel,
        fi_key: &str,
        discovered: BTreeMap<String, WorkbookRecord>,
        errored_folders: &BTreeSet<String>,
        mode: ReconcileMode,
        summary: &mut ReconcileSummary,
    ) -> Result<()> {
        let collection = &mut model.institution_mut(fi_key)?.fi_workbook_collection;

        for (wb_id, candidate) in &discovered {
            match collection.get_mut(wb_id) {
                Some(existing) => {
                    if existing.refresh_from(candidate) {
                        summary.refreshed += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                }
                None => {
                    let outcome = collection.upsert(candidate.clone());
                    debug_assert_eq!(outcome, Upsert::Inserted);
                    summary.added.push(wb_id.clone());
                }
            }
        }

        for record in collection.iter() {
            let wb_id = record.wb_id();
            if discovered.contains_key(&wb_id) {
                continue;
            }
            if errored_folders.contains(&record.wf_folder) {
                summary.unverified.push(wb_id);
            } else {
                summary.missing.push(wb_id);
            }
        }
        if mode == ReconcileMode::RemoveMissing {
            for wb_id in &summary.missing {
                collection.remove(wb_id);
                summary.removed.push(wb_id.clone());
            }
        }

        // Stable display order before anyone hands out positional indices.
        collection.sort_by_identity();
        Ok(())
    }
}
