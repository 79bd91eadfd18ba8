//! End-to-end test: discover workbooks from storage, project the tree,
//! persist the snapshot, restore it, and reconcile again without drift.

use std::fs;
use std::path::Path;
use std::sync::Once;

use anyhow::Result;
use tempfile::TempDir;

use budman_library::workbook::path_to_url;
use budman_library::{
    store, AttrMatch, BudgetConfig, BudgetModel, NodeKind, ReconcileMode, Reconciler,
    WorkbookTree,
};

static INIT: Once = Once::new();

fn setup_storage() -> (TempDir, BudgetConfig, BudgetModel) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .try_init();
    });
    let temp_dir = TempDir::new().unwrap();
    let config = BudgetConfig::default_template(temp_dir.path());
    let model = BudgetModel::new_template(&config, "tester");
    (temp_dir, config, model)
}

fn touch_file(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "date,amount\n").unwrap();
}

#[test]
fn test_reconcile_save_load_reconcile() -> Result<()> {
    let (temp_dir, config, mut model) = setup_storage();
    let root = temp_dir.path();
    touch_file(&root.join("boa/data/new/boa_2025_txns.csv"));
    touch_file(&root.join("boa/data/categorized/categorized_boa_2025_txns.csv"));
    touch_file(&root.join("boa/data/finalized/finalized_boa_2025_budget.xlsx"));
    touch_file(&root.join("merrill/data/new/ml_statement.csv"));
    fs::create_dir_all(root.join("merrill/data/categorized"))?;
    fs::create_dir_all(root.join("merrill/data/finalized"))?;

    let reconciler = Reconciler::new(&config);
    let boa = reconciler
        .reconcile(&mut model, "boa", ReconcileMode::Additive)?;
    assert_eq!(boa.added.len(), 3);
    let merrill = reconciler
        .reconcile(&mut model, "merrill", ReconcileMode::Additive)?;
    assert_eq!(merrill.added.len(), 1);

    // The tree projection covers root, institutions, workflows, purpose
    // folders, and one leaf per discovered workbook.
    let tree = WorkbookTree::from_model(&model)?;
    let leaves: Vec<_> = tree
        .depth_first()
        .into_iter()
        .filter(|id| tree.attrs(*id).kind == NodeKind::Workbook)
        .collect();
    assert_eq!(leaves.len(), 4);
    assert_eq!(
        tree.attrs(tree.root().expect("tree has a root")).kind,
        NodeKind::DomainRoot
    );

    // Persist and restore.
    let url = path_to_url(&root.join("bdm_store.jsonc"))?;
    model
        .bdm_working_data
        .insert("session".to_string(), serde_json::json!("transient"));
    store::save(&model, &url)?;

    let mut restored = store::load(&url)?;
    assert_eq!(restored.bdm_id, model.bdm_id);
    assert_eq!(restored.bdm_fi_collection, model.bdm_fi_collection);
    assert!(restored.bdm_working_data.is_empty());

    // A reconcile of the restored model against unchanged storage is a
    // no-op delta.
    let again = Reconciler::new(&config)
        .reconcile(&mut restored, "boa", ReconcileMode::Additive)?;
    assert!(again.added.is_empty());
    assert!(again.missing.is_empty());
    assert_eq!(restored.bdm_fi_collection, model.bdm_fi_collection);
    Ok(())
}

#[test]
fn test_attribute_search_after_discovery() {
    let (temp_dir, config, mut model) = setup_storage();
    let root = temp_dir.path();
    touch_file(&root.join("boa/data/new/jan_txns.csv"));
    touch_file(&root.join("boa/data/new/feb_txns.csv"));
    touch_file(&root.join("boa/data/categorized/categorized_jan_txns.csv"));
    fs::create_dir_all(root.join("boa/data/finalized")).unwrap();

    Reconciler::new(&config)
        .reconcile(&mut model, "boa", ReconcileMode::Additive)
        .unwrap();
    let collection = &model.institution("boa").unwrap().fi_workbook_collection;
    assert_eq!(collection.len(), 3);

    // Two records share the data/new folder, one is unique, and absent
    // values match nothing.
    match collection.find_by_attribute("wf_folder", "data/new") {
        AttrMatch::MultipleMatches(positions) => assert_eq!(positions.len(), 2),
        other => panic!("expected multiple matches, got {:?}", other),
    }
    assert!(matches!(
        collection.find_by_attribute("wb_name", "categorized_jan_txns.csv"),
        AttrMatch::SingleMatch(_)
    ));
    assert_eq!(
        collection.find_by_attribute("wf_folder", "data/archive"),
        AttrMatch::NoMatch
    );
}
