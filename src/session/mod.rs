//! Update coordination.
//!
//! [`UpdateCoordinator`] owns the mounted tree for one document and runs the
//! render, diff, patch and locate stages for each change event. Only one
//! pipeline runs at a time. While it runs, its checkpoint polls the inbox;
//! a newer event cancels the run, and the run reports
//! [`Outcome::Superseded`] so the newer event can be dispatched next.

mod event;
mod presenter;

pub use event::{ChangeEvent, EventError, EventKind, EventSender};
pub use presenter::{
    ChannelPresenter, DEFAULT_SCROLL_TIMEOUT, JsonLinesPresenter, PresentError, Presenter,
    PresenterFrame, ScrollInstruction, ScrollOutcome,
};

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::cancel::{CancelToken, Cancelled, Checkpoint, DEFAULT_YIELD_EVERY};
use crate::diff::Patch;
use crate::patch::{MountedTree, PatchError};
use crate::render::{Render, RenderError};
use crate::{cursor, diff, patch};

/// Coordinator state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Rendering,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The pipeline ran to completion.
    Updated {
        revision: u64,
        /// Id of the node scrolled to, if one was found and the view confirmed
        scrolled_to: Option<String>,
    },
    /// A newer event arrived first; it is queued for the next dispatch.
    Superseded,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("patch failed: {0}")]
    Patch(#[from] PatchError),

    #[error("presenter failed: {0}")]
    Present(#[from] PresentError),
}

/// Why a pipeline run stopped early.
enum Halt {
    Superseded,
    Failed(PipelineError),
}

impl From<Cancelled> for Halt {
    fn from(_: Cancelled) -> Self {
        Self::Superseded
    }
}

impl From<RenderError> for Halt {
    fn from(err: RenderError) -> Self {
        Self::Failed(err.into())
    }
}

impl From<PatchError> for Halt {
    fn from(err: PatchError) -> Self {
        Self::Failed(err.into())
    }
}

impl From<PresentError> for Halt {
    fn from(err: PresentError) -> Self {
        Self::Failed(err.into())
    }
}

/// Serializes change events for one document into a single active pipeline.
pub struct UpdateCoordinator<R, P> {
    renderer: R,
    presenter: P,
    mounted: MountedTree,
    state: PipelineState,
    inbox: Receiver<ChangeEvent>,
    sender: EventSender,
    /// Latest event that superseded a run, merged with anything it replaced
    pending: Option<ChangeEvent>,
    shutdown: CancelToken,
    yield_every: usize,
}

impl<R: Render, P: Presenter> UpdateCoordinator<R, P> {
    pub fn new(renderer: R, presenter: P) -> Self {
        let (tx, inbox) = mpsc::channel();
        Self {
            renderer,
            presenter,
            mounted: MountedTree::new(),
            state: PipelineState::Idle,
            inbox,
            sender: EventSender::new(tx),
            pending: None,
            shutdown: CancelToken::new(),
            yield_every: DEFAULT_YIELD_EVERY,
        }
    }

    /// Node-level steps between inbox polls.
    #[must_use]
    pub fn with_yield_every(mut self, every: usize) -> Self {
        self.yield_every = every.max(1);
        self
    }

    /// Handle for submitting events, possibly from other threads.
    pub fn handle(&self) -> EventSender {
        self.sender.clone()
    }

    /// Token that stops [`UpdateCoordinator::run`] and cancels the active
    /// pipeline when cancelled.
    pub fn shutdown_token(&self) -> CancelToken {
        self.shutdown.clone()
    }

    /// Decode and queue a JSON change event.
    ///
    /// # Errors
    /// Returns the decoding error; a malformed event never reaches the
    /// pipeline.
    pub fn submit_json(&self, json: &str) -> Result<(), EventError> {
        self.sender.submit_json(json)
    }

    pub const fn mounted(&self) -> &MountedTree {
        &self.mounted
    }

    pub const fn state(&self) -> PipelineState {
        self.state
    }

    pub const fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Whether a superseding event is waiting to be dispatched.
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Run the pipeline for `event`.
    ///
    /// # Errors
    /// Returns a [`PipelineError`] when rendering, patching or presenting
    /// fails. Render and patch failures leave the mounted tree unchanged; a
    /// presenter failure happens after the new tree is mounted.
    pub fn dispatch(&mut self, event: ChangeEvent) -> Result<Outcome, PipelineError> {
        self.state = PipelineState::Rendering;
        let _scope = crate::perf::scope("session.dispatch");
        let result = self.run_pipeline(event);
        self.state = PipelineState::Idle;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(Halt::Superseded) => {
                tracing::debug!("pipeline superseded by newer event");
                Ok(Outcome::Superseded)
            }
            Err(Halt::Failed(err)) => {
                match &err {
                    PipelineError::Patch(_) => tracing::error!(error = %err, "update aborted"),
                    _ => tracing::warn!(error = %err, "update aborted"),
                }
                Err(err)
            }
        }
    }

    /// Dispatch queued events until the inbox is empty.
    pub fn run_pending(&mut self) -> Vec<Result<Outcome, PipelineError>> {
        let mut outcomes = Vec::new();
        while let Some(event) = self.pending.take().or_else(|| self.inbox.try_recv().ok()) {
            outcomes.push(self.dispatch(event));
        }
        outcomes
    }

    /// Dispatch events as they arrive until the shutdown token is
    /// cancelled, waking up every `poll` to check it.
    pub fn run(&mut self, poll: Duration) {
        tracing::info!("update coordinator running");
        while !self.shutdown.is_cancelled() {
            let event = match self.pending.take() {
                Some(event) => event,
                None => match self.inbox.recv_timeout(poll) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };
            // Failures are already logged; the next event starts afresh.
            let _ = self.dispatch(event);
        }
        tracing::info!(revision = self.mounted.revision(), "update coordinator stopped");
    }

    fn run_pipeline(&mut self, event: ChangeEvent) -> Result<Outcome, Halt> {
        let Self {
            renderer,
            presenter,
            mounted,
            inbox,
            pending,
            shutdown,
            yield_every,
            ..
        } = self;

        // A cursor event has nothing to scroll within until a first render.
        let text_changed = event.kind == EventKind::TextChanged || mounted.is_empty();
        let mut poll = || {
            let mut superseded = false;
            while let Ok(mut next) = inbox.try_recv() {
                let replaced_text = text_changed
                    || pending
                        .take()
                        .is_some_and(|previous| previous.kind == EventKind::TextChanged);
                if replaced_text {
                    next.kind = EventKind::TextChanged;
                }
                *pending = Some(next);
                superseded = true;
            }
            superseded || shutdown.is_cancelled()
        };
        let mut cx = Checkpoint::polling(CancelToken::new(), *yield_every, &mut poll);

        if text_changed {
            cx.yield_now()?;
            let fresh = renderer.render(&event.lines)?;
            cx.yield_now()?;
            let edits = diff::diff(mounted.tree(), fresh, &mut cx)?;
            cx.yield_now()?;
            commit(mounted, presenter, edits, &mut cx)?;
        } else {
            cx.yield_now()?;
        }

        let scrolled_to = match cursor::locate(mounted, event.cursor_line, &event.lines, &mut cx)? {
            Some(node) => {
                let target = ScrollInstruction {
                    node,
                    source_line: event.cursor_line,
                };
                match presenter.scroll_to(&target)? {
                    ScrollOutcome::Scrolled => Some(target.id().to_owned()),
                    ScrollOutcome::Skipped => None,
                }
            }
            None => None,
        };

        tracing::debug!(
            revision = mounted.revision(),
            cursor_line = event.cursor_line,
            scrolled_to = scrolled_to.as_deref(),
            "update complete"
        );
        Ok(Outcome::Updated {
            revision: mounted.revision(),
            scrolled_to,
        })
    }
}

/// Apply `edits` to the mounted tree, then mirror the steps to the
/// presenter. A cancelled apply mounts nothing and presents nothing.
fn commit<P: Presenter>(
    mounted: &mut MountedTree,
    presenter: &mut P,
    edits: Patch,
    cx: &mut Checkpoint<'_>,
) -> Result<(), Halt> {
    let applied = patch::apply(mounted, edits, cx)?;
    if !applied.complete {
        tracing::debug!(revision = mounted.revision(), "patch interrupted, tree kept");
        return Err(Halt::Superseded);
    }
    if !applied.ops.is_empty() {
        presenter.apply(&applied.ops)?;
    }
    Ok(())
}
