//! Hierarchical projection of the budget model for traversal and display.
//!
//! The tree is a generic arena of opaque [`NodeId`] handles with a side
//! table of domain attributes per node. It is a derived, rebuildable view:
//! never the source of truth for identity or metadata, always
//! reconstructible from a model via [`WorkbookTree::from_model`].

use std::collections::HashMap;

use crate::config::WorkflowPurpose;
use crate::error::{BudmanError, Result};
use crate::model::BudgetModel;

/// Opaque handle to one tree node. Only ever produced by the owning tree.
///
/// A `NodeId` is only valid for the tree that issued it. Handing one to a
/// different tree's accessors indexes the wrong arena: out-of-range ids
/// panic, in-range ids name an unrelated node. Use [`WorkbookTree::find`]
/// to translate identifiers between trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Node type, drawn from the fixed hierarchy levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    DomainRoot,
    Institution,
    Workflow,
    PurposeFolder,
    Workbook,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::DomainRoot => "domain_root",
            NodeKind::Institution => "institution",
            NodeKind::Workflow => "workflow",
            NodeKind::PurposeFolder => "purpose_folder",
            NodeKind::Workbook => "workbook",
        }
    }
}

/// Domain attributes kept in the side table, one entry per node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttrs {
    pub kind: NodeKind,
    pub label: String,
    /// Sequential display index, unique across the whole tree. CLI surfaces
    /// address nodes by this number.
    pub index: usize,
}

#[derive(Debug, Clone)]
struct Node {
    identifier: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Single-rooted typed tree over the institution/workflow/folder/workbook
/// hierarchy.
#[derive(Debug, Clone, Default)]
pub struct WorkbookTree {
    nodes: Vec<Node>,
    attrs: Vec<NodeAttrs>,
    by_identifier: HashMap<String, NodeId>,
    root: Option<NodeId>,
}

impl WorkbookTree {
    pub fn new() -> Self {
        WorkbookTree::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Look up a node by its identifier.
    pub fn find(&self, identifier: &str) -> Option<NodeId> {
        self.by_identifier.get(identifier).copied()
    }

    /// Add a node, or return the existing node with the same identifier
    /// unchanged (idempotent ensure, not strict insert).
    ///
    /// The first node added must be [`NodeKind::DomainRoot`]; any other kind
    /// on an empty tree is a shape violation, as is a second root once one
    /// exists. A new non-root node must name a known parent.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        label: impl Into<String>,
        identifier: impl Into<String>,
        parent: Option<&str>,
    ) -> Result<NodeId> {
        let identifier = identifier.into();
        if let Some(existing) = self.find(&identifier) {
            return Ok(existing);
        }

        if self.nodes.is_empty() {
            if kind != NodeKind::DomainRoot {
                return Err(BudmanError::TreeShape {
                    message: format!(
                        "first node must be domain_root, got {} ('{}')",
                        kind.as_str(),
                        identifier
                    ),
                });
            }
            let id = self.push_node(kind, label.into(), identifier, None);
            self.root = Some(id);
            return Ok(id);
        }

        if kind == NodeKind::DomainRoot {
            return Err(BudmanError::TreeShape {
                message: format!("tree already has a root, cannot add '{}'", identifier),
            });
        }

        let parent_identifier = parent.ok_or_else(|| BudmanError::TreeShape {
            message: format!("non-root node '{}' requires a parent", identifier),
        })?;
        let parent_id = self
            .find(parent_identifier)
            .ok_or_else(|| BudmanError::NodeNotFound {
                identifier: parent_identifier.to_string(),
            })?;

        let id = self.push_node(kind, label.into(), identifier, Some(parent_id));
        self.nodes[parent_id.0].children.push(id);
        Ok(id)
    }

    fn push_node(
        &mut self,
        kind: NodeKind,
        label: String,
        identifier: String,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            identifier: identifier.clone(),
            parent,
            children: Vec::new(),
        });
        self.attrs.push(NodeAttrs {
            kind,
            label,
            index: id.0,
        });
        self.by_identifier.insert(identifier, id);
        id
    }

    /// Attributes of a node.
    ///
    /// Panics when `id` was issued by a different tree (see [`NodeId`]).
    pub fn attrs(&self, id: NodeId) -> &NodeAttrs {
        &self.attrs[id.0]
    }

    /// Identifier of a node. Panics on a foreign `id` (see [`NodeId`]).
    pub fn identifier(&self, id: NodeId) -> &str {
        &self.nodes[id.0].identifier
    }

    /// Children of a node. Panics on a foreign `id` (see [`NodeId`]).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Ancestors from the node's parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.nodes[parent.0].parent;
        }
        out
    }

    /// Depth-first preorder listing starting at the root.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Reverse so the first child is visited first.
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Build the tree from a model: root, institutions, workflows with
    /// configured folders, purpose folders, and workbook leaves.
    pub fn from_model(model: &BudgetModel) -> Result<WorkbookTree> {
        let mut tree = WorkbookTree::new();
        let root_id = model.bdm_id.clone();
        tree.add_node(
            NodeKind::DomainRoot,
            format!("BDM({})", root_id),
            root_id.clone(),
            None,
        )?;

        for (fi_key, institution) in &model.bdm_fi_collection {
            tree.add_node(
                NodeKind::Institution,
                format!("FI({})", fi_key),
                fi_key.clone(),
                Some(root_id.as_str()),
            )?;

            for (wf_key, wf) in &model.bdm_wf_collection {
                let configured: Vec<(WorkflowPurpose, &str)> = WorkflowPurpose::ALL
                    .iter()
                    .filter_map(|p| wf.folder_for(*p).map(|f| (*p, f)))
                    .collect();
                if configured.is_empty() {
                    continue;
                }
                let wf_node_id = format!("{}::{}", fi_key, wf_key);
                tree.add_node(
                    NodeKind::Workflow,
                    format!("WF({})", wf_key),
                    wf_node_id.clone(),
                    Some(fi_key.as_str()),
                )?;
                for (purpose, folder) in configured {
                    let folder_node_id =
                        format!("{}::{}::{}::{}", fi_key, wf_key, purpose, folder);
                    tree.add_node(
                        NodeKind::PurposeFolder,
                        format!("WF_FOLDER({})", folder),
                        folder_node_id,
                        Some(wf_node_id.as_str()),
                    )?;
                }
            }

            for record in institution.fi_workbook_collection.iter() {
                let folder_node_id = format!(
                    "{}::{}::{}::{}",
                    fi_key, record.wf_key, record.wf_purpose, record.wf_folder
                );
                // Records can outlive their folder configuration; park those
                // directly under the institution.
                let parent = if tree.find(&folder_node_id).is_some() {
                    folder_node_id
                } else {
                    fi_key.clone()
                };
                tree.add_node(
                    NodeKind::Workbook,
                    format!("WB({})", record.wb_name),
                    record.wb_id(),
                    Some(parent.as_str()),
                )?;
            }
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_tree() -> WorkbookTree {
        let mut tree = WorkbookTree::new();
        tree.add_node(NodeKind::DomainRoot, "BDM(test)", "bdm", None)
            .unwrap();
        tree.add_node(NodeKind::Institution, "FI(boa)", "boa", Some("bdm"))
            .unwrap();
        tree
    }

    #[test]
    fn test_first_node_must_be_root() {
        let mut tree = WorkbookTree::new();
        let err = tree
            .add_node(NodeKind::Institution, "FI(boa)", "boa", None)
            .unwrap_err();
        assert!(matches!(err, BudmanError::TreeShape { .. }));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_second_root_rejected() {
        let mut tree = setup_tree();
        let err = tree
            .add_node(NodeKind::DomainRoot, "BDM(other)", "bdm2", None)
            .unwrap_err();
        assert!(matches!(err, BudmanError::TreeShape { .. }));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut tree = setup_tree();
        let first = tree.find("boa").unwrap();
        // Re-adding with different attributes returns the existing node.
        let again = tree
            .add_node(NodeKind::Workflow, "other label", "boa", Some("bdm"))
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(tree.attrs(again).kind, NodeKind::Institution);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_foreign_node_id_panics() {
        let mut big = setup_tree();
        let id = big
            .add_node(NodeKind::Workflow, "WF(intake)", "boa::intake", Some("boa"))
            .unwrap();

        let mut small = WorkbookTree::new();
        small
            .add_node(NodeKind::DomainRoot, "BDM(other)", "bdm2", None)
            .unwrap();
        // Ids are tree-scoped; indexing another tree with one is a bug.
        let _ = small.attrs(id);
    }

    #[test]
    fn test_unknown_parent_is_not_found() {
        let mut tree = setup_tree();
        let err = tree
            .add_node(NodeKind::Workflow, "WF(x)", "boa::x", Some("nonesuch"))
            .unwrap_err();
        assert!(matches!(err, BudmanError::NodeNotFound { .. }));
    }

    #[test]
    fn test_traversal() {
        let mut tree = setup_tree();
        tree.add_node(NodeKind::Workflow, "WF(intake)", "boa::intake", Some("boa"))
            .unwrap();
        tree.add_node(
            NodeKind::PurposeFolder,
            "WF_FOLDER(data/new)",
            "boa::intake::wf_output::data/new",
            Some("boa::intake"),
        )
        .unwrap();

        let folder = tree.find("boa::intake::wf_output::data/new").unwrap();
        let ancestors: Vec<&str> = tree
            .ancestors(folder)
            .into_iter()
            .map(|id| tree.identifier(id))
            .collect();
        assert_eq!(ancestors, vec!["boa::intake", "boa", "bdm"]);

        let order: Vec<&str> = tree
            .depth_first()
            .into_iter()
            .map(|id| tree.identifier(id))
            .collect();
        assert_eq!(
            order,
            vec!["bdm", "boa", "boa::intake", "boa::intake::wf_output::data/new"]
        );

        // Display indices are sequential and unique across the tree.
        let indices: Vec<usize> = tree
            .depth_first()
            .into_iter()
            .map(|id| tree.attrs(id).index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
