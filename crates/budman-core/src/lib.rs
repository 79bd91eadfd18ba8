//! Budman Library - Headless library for budget workbook metadata.
//!
//! This crate tracks per-user financial data stored as workbook files in a
//! Financial-Institution → Workflow → Purpose folder hierarchy. It provides:
//!
//! - stable, derivable identity for every stored file ([`WorkbookRecord`])
//! - an indexed, queryable in-memory collection of that metadata, separate
//!   from file content ([`WorkbookCollection`])
//! - a navigable tree projection of the hierarchy ([`WorkbookTree`])
//! - a filtered, URL-addressed model snapshot ([`store::load`] /
//!   [`store::save`])
//! - reconciliation of the collection against the actual storage backend
//!   ([`Reconciler`])
//!
//! # Example
//!
//! ```rust,ignore
//! use budman_library::{
//!     BudgetConfig, BudgetModel, ReconcileMode, Reconciler, store,
//! };
//!
//! fn main() -> budman_library::Result<()> {
//!     let config = BudgetConfig::default_template("~/budget");
//!     let mut model = BudgetModel::new_template(&config, "jeremy");
//!
//!     let summary = Reconciler::new(&config)
//!         .reconcile(&mut model, "boa", ReconcileMode::Additive)?;
//!     println!("{}", summary);
//!
//!     store::save(&model, &store::default_store_url()?)?;
//!     Ok(())
//! }
//! ```
//!
//! Execution model is single-threaded and synchronous: reconciliation and
//! snapshot serialization never interleave on the same model because the
//! API takes `&mut BudgetModel` for mutation and `&BudgetModel` for save.

pub mod config;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod workbook;

// Re-export commonly used types
pub use config::{
    default_store_path, BudgetConfig, InstitutionType, StoreConfig, WorkflowConfig,
    WorkflowFolder, WorkflowPurpose,
};
pub use error::{BudmanError, Result};
pub use model::{BudgetModel, Institution};
pub use reconcile::{ReconcileMode, ReconcileSummary, Reconciler};
pub use workbook::{
    AttrMatch, NodeAttrs, NodeId, NodeKind, ParsedName, Upsert, WorkbookCollection,
    WorkbookRecord, WorkbookTree, WorkbookType,
};
