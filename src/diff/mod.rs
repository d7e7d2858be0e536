//! Block-level tree diffing.
//!
//! [`diff`] walks the mounted and fresh sibling lists with two pointers. On
//! a mismatch it scans forward through the fresh list for the mounted node;
//! everything it skips over becomes an insertion anchored before that
//! mounted node, and a mounted node with no match anywhere ahead is
//! deleted. This is a heuristic, not a minimal edit distance: a block moved
//! far down the document shows up as delete plus insert. Anchors produced
//! this way are always matched (surviving) mounted nodes, which is what
//! makes the insert-then-delete apply order in [`crate::patch`] sound.

use std::sync::Arc;

use crate::cancel::{Cancelled, Checkpoint};
use crate::markup::{NodeRef, Tree};

/// Insert `node` immediately before the mounted node `anchor`.
#[derive(Debug, Clone)]
pub struct Insertion {
    pub anchor: NodeRef,
    pub node: NodeRef,
}

/// Ordered edits turning the mounted sibling list into the fresh one.
///
/// `deleted` and every `Insertion::anchor` reference nodes of the mounted
/// tree the script was computed against; `Insertion::node` and `appended`
/// are fresh nodes.
#[derive(Debug, Clone, Default)]
pub struct EditScript {
    pub inserted: Vec<Insertion>,
    pub deleted: Vec<NodeRef>,
    pub appended: Vec<NodeRef>,
}

impl EditScript {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.appended.is_empty()
    }

    /// Total number of edits.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.deleted.len() + self.appended.len()
    }
}

/// Result of a diff.
#[derive(Debug, Clone)]
pub enum Patch {
    /// Nothing is mounted yet; attach the fresh tree wholesale.
    Mount(Tree),
    /// Fine-grained edits against the mounted tree.
    Edit(EditScript),
}

impl Patch {
    /// Whether applying this patch would leave the mounted tree untouched.
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Mount(tree) => tree.is_empty(),
            Self::Edit(script) => script.is_empty(),
        }
    }
}

/// Compare `mounted` against `fresh` and produce the patch that turns one
/// into the other.
///
/// # Errors
/// Returns [`Cancelled`] when the checkpoint reports cancellation; no
/// partial script escapes.
pub fn diff(mounted: &Tree, fresh: Tree, cx: &mut Checkpoint<'_>) -> Result<Patch, Cancelled> {
    if mounted.is_empty() {
        return Ok(Patch::Mount(fresh));
    }

    let old = mounted.children();
    let new = fresh.into_children();
    let mut script = EditScript::default();

    let mut a = 0;
    // `b` only moves on a match, so it always sits just past the last
    // matched fresh node; a deleted mounted node leaves it in place.
    let mut b = 0;
    while a < old.len() && b < new.len() {
        cx.step()?;
        if old[a].same_structure(&new[b]) {
            a += 1;
            b += 1;
            continue;
        }

        let mut matched = None;
        for probe in b + 1..new.len() {
            cx.step()?;
            if old[a].same_structure(&new[probe]) {
                matched = Some(probe);
                break;
            }
        }

        if let Some(matched) = matched {
            script
                .inserted
                .extend(new[b..matched].iter().map(|node| Insertion {
                    anchor: Arc::clone(&old[a]),
                    node: Arc::clone(node),
                }));
            a += 1;
            b = matched + 1;
        } else {
            script.deleted.push(Arc::clone(&old[a]));
            a += 1;
        }
    }

    script.deleted.extend(old[a..].iter().cloned());
    script.appended.extend(new[b..].iter().cloned());

    tracing::debug!(
        inserted = script.inserted.len(),
        deleted = script.deleted.len(),
        appended = script.appended.len(),
        steps = cx.steps(),
        "diffed tree"
    );
    Ok(Patch::Edit(script))
}
