//! Applying patches to the mounted tree.
//!
//! An edit script is applied in a fixed order: every insertion (each node
//! placed just before its anchor), then every deletion, then the trailing
//! appends. Anchors are surviving mounted nodes, so each one is still in
//! the tree when its insertion runs.
//!
//! Steps run against a staged copy of the children, which replaces the
//! mounted children only once every step has run. A cancelled apply leaves
//! the mounted tree exactly as it was.
//!
//! Every applied step is reported as a positional [`PatchOp`] so a
//! presentation layer holding a copy of the body can replay the same
//! mutations without knowing about node identity.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::cancel::Checkpoint;
use crate::diff::{EditScript, Patch};
use crate::markup::{MarkupNode, NodeRef, Tree};

/// The tree currently attached to the presentation surface.
#[derive(Debug, Clone, Default)]
pub struct MountedTree {
    tree: Tree,
    revision: u64,
}

impl MountedTree {
    pub const fn new() -> Self {
        Self {
            tree: Tree::new(),
            revision: 0,
        }
    }

    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn children(&self) -> &[NodeRef] {
        self.tree.children()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Incremented on every apply that changed the tree.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Position of `node` by identity.
    pub fn position_of(&self, node: &NodeRef) -> Option<usize> {
        position(self.children(), node)
    }

    /// Serialized body.
    pub fn to_html(&self) -> String {
        self.tree.to_html()
    }
}

/// One applied mutation, with indices valid at the moment it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Replace the whole body.
    Mount { html: String },
    /// Insert before the child currently at `index`.
    Insert { index: usize, html: String },
    /// Remove the child currently at `index`.
    Remove { index: usize },
    /// Add after the last child.
    Append { html: String },
}

/// Which part of an edit script referenced a node that is not mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Anchor,
    Deleted,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anchor => f.write_str("insertion anchor"),
            Self::Deleted => f.write_str("deleted node"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The script does not belong to the mounted tree; nothing was applied.
    #[error("edit script references a {role} that is not mounted: {node}")]
    MissingNode { role: NodeRole, node: String },
}

/// Outcome of [`apply`].
#[derive(Debug, Clone, Default)]
pub struct Applied {
    /// Steps that were applied, in order. Empty when cancelled.
    pub ops: Vec<PatchOp>,
    /// False when cancellation stopped the patch; nothing was mounted then.
    pub complete: bool,
}

/// Apply `patch` to `mounted`.
///
/// Cancellation is checked before each step. A cancelled apply discards
/// the staged steps, returns `Applied::complete == false` with no ops and
/// leaves `mounted` and its revision untouched.
///
/// Inserted and appended nodes whose id is already taken in the tree are
/// given a fresh suffixed id, so addressable nodes stay unique.
///
/// # Errors
/// Returns [`PatchError::MissingNode`] when the script references a node
/// that is not in `mounted`. The tree is left untouched in that case.
pub fn apply(
    mounted: &mut MountedTree,
    patch: Patch,
    cx: &mut Checkpoint<'_>,
) -> Result<Applied, PatchError> {
    match patch {
        Patch::Mount(tree) => {
            let html = tree.to_html();
            mounted.tree = tree;
            mounted.revision += 1;
            Ok(Applied {
                ops: vec![PatchOp::Mount { html }],
                complete: true,
            })
        }
        Patch::Edit(script) => {
            validate(mounted, &script)?;
            let applied = apply_script(mounted, script, cx);
            if !applied.ops.is_empty() {
                mounted.revision += 1;
            }
            Ok(applied)
        }
    }
}

fn validate(mounted: &MountedTree, script: &EditScript) -> Result<(), PatchError> {
    let present: HashSet<*const MarkupNode> =
        mounted.children().iter().map(Arc::as_ptr).collect();
    let missing = |role: NodeRole, node: &NodeRef| PatchError::MissingNode {
        role,
        node: node.outer_html(),
    };

    for insertion in &script.inserted {
        if !present.contains(&Arc::as_ptr(&insertion.anchor)) {
            return Err(missing(NodeRole::Anchor, &insertion.anchor));
        }
    }
    for node in &script.deleted {
        if !present.contains(&Arc::as_ptr(node)) {
            return Err(missing(NodeRole::Deleted, node));
        }
    }
    Ok(())
}

fn apply_script(mounted: &mut MountedTree, script: EditScript, cx: &mut Checkpoint<'_>) -> Applied {
    let EditScript {
        inserted,
        deleted,
        appended,
    } = script;
    let mut staged = mounted.children().to_vec();
    let mut ids = IdSet::new(&staged);
    let mut ops = Vec::with_capacity(inserted.len() + deleted.len() + appended.len());

    for insertion in inserted {
        if cx.step().is_err() {
            return Applied::default();
        }
        // Validated above, and deletions have not run yet.
        let Some(index) = position(&staged, &insertion.anchor) else {
            continue;
        };
        let node = ids.claim(insertion.node);
        ops.push(PatchOp::Insert {
            index,
            html: node.outer_html(),
        });
        staged.insert(index, node);
    }

    for node in deleted {
        if cx.step().is_err() {
            return Applied::default();
        }
        let Some(index) = position(&staged, &node) else {
            continue;
        };
        staged.remove(index);
        ops.push(PatchOp::Remove { index });
    }

    for node in appended {
        if cx.step().is_err() {
            return Applied::default();
        }
        let node = ids.claim(node);
        ops.push(PatchOp::Append {
            html: node.outer_html(),
        });
        staged.push(node);
    }

    *mounted.tree.children_mut() = staged;
    Applied {
        ops,
        complete: true,
    }
}

fn position(children: &[NodeRef], node: &NodeRef) -> Option<usize> {
    children.iter().position(|child| Arc::ptr_eq(child, node))
}

/// Ids in use by the mounted tree, including nodes the script will delete,
/// since those are still attached while insertions run.
struct IdSet {
    taken: HashSet<String>,
}

impl IdSet {
    fn new(children: &[NodeRef]) -> Self {
        let taken = children
            .iter()
            .filter_map(|node| node.id())
            .map(ToOwned::to_owned)
            .collect();
        Self { taken }
    }

    /// Reserve the id of an incoming node, re-identifying it on a clash.
    fn claim(&mut self, node: NodeRef) -> NodeRef {
        let Some(id) = node.id() else {
            return node;
        };
        if self.taken.insert(id.to_owned()) {
            return node;
        }
        let fresh = (2..)
            .map(|n| format!("{id}-{n}"))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or_default();
        tracing::trace!(clash = id, id = %fresh, "re-identified incoming node");
        self.taken.insert(fresh.clone());
        Arc::unwrap_or_clone(node).with_id(fresh).into_ref()
    }
}
