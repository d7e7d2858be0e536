// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. patch::PatchOp)
    clippy::module_name_repetitions
)]

//! # Livemark
//!
//! An incremental live preview engine for markdown being edited.
//!
//! Each buffer change is re-rendered, diffed against the tree the preview
//! currently shows, and applied as a small set of block-level edits instead
//! of a full reload. The editor's cursor line is then mapped onto the
//! patched tree so the preview can scroll along with the cursor.
//!
//! ## Architecture
//!
//! One change event flows through a single pipeline:
//! - **Render**: buffer lines to a flat tree of block nodes
//! - **Diff**: fresh tree against the mounted tree, as an edit script
//! - **Patch**: edit script applied in place, mirrored to a presenter
//! - **Locate**: cursor line to the node to scroll to
//!
//! A newer event pre-empts a running pipeline at its next checkpoint.
//!
//! ## Modules
//!
//! - [`markup`]: Markup nodes and trees
//! - [`render`]: Markdown rendering with comrak
//! - [`diff`]: Block-level tree diffing
//! - [`patch`]: Applying edit scripts to the mounted tree
//! - [`cursor`]: Cursor line to node mapping
//! - [`session`]: Update coordination, change events and presenters
//! - [`cancel`]: Cooperative cancellation
//! - [`highlight`]: Syntax highlighting
//! - [`listener`]: Editor socket listener
//! - [`watcher`]: File watching

pub mod cancel;
pub mod config;
pub mod cursor;
pub mod diff;
pub mod highlight;
pub mod listener;
pub mod markup;
pub mod patch;
pub mod perf;
pub mod render;
pub mod session;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::markup::{MarkupNode, NodeRef, Tree};
    pub use crate::render::{MarkdownRenderer, Render};
    pub use crate::session::{ChangeEvent, EventKind, Outcome, Presenter, UpdateCoordinator};
}
