//! Presentation surfaces the coordinator drives.

use std::io::Write;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use serde::Serialize;

use crate::markup::NodeRef;
use crate::patch::PatchOp;

/// How long [`ChannelPresenter`] waits for a scroll acknowledgement.
pub const DEFAULT_SCROLL_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("failed to write to presenter: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode presenter message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("presenter consumer has disconnected")]
    Disconnected,
}

/// Scroll the view so `node` is visible.
#[derive(Debug, Clone)]
pub struct ScrollInstruction {
    pub node: NodeRef,
    /// Editor line the node was located from
    pub source_line: usize,
}

impl ScrollInstruction {
    pub fn id(&self) -> &str {
        self.node.id().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Scrolled,
    /// The surface did not confirm in time; the view may be stale.
    Skipped,
}

/// Receives the mutations applied to the mounted tree and scroll requests.
pub trait Presenter {
    /// Mirror applied patch steps, in order.
    ///
    /// # Errors
    /// Returns an error when the surface cannot be reached.
    fn apply(&mut self, ops: &[PatchOp]) -> Result<(), PresentError>;

    /// Bring a node into view.
    ///
    /// # Errors
    /// Returns an error when the surface cannot be reached. A slow surface
    /// is not an error; it yields [`ScrollOutcome::Skipped`].
    fn scroll_to(&mut self, target: &ScrollInstruction) -> Result<ScrollOutcome, PresentError>;
}

impl<P: Presenter + ?Sized> Presenter for &mut P {
    fn apply(&mut self, ops: &[PatchOp]) -> Result<(), PresentError> {
        (**self).apply(ops)
    }

    fn scroll_to(&mut self, target: &ScrollInstruction) -> Result<ScrollOutcome, PresentError> {
        (**self).scroll_to(target)
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename = "scroll")]
struct ScrollMessage<'a> {
    id: &'a str,
    line: usize,
}

/// Writes one JSON object per line: each patch op, then scroll requests as
/// `{"op":"scroll","id":...,"line":...}`.
#[derive(Debug)]
pub struct JsonLinesPresenter<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesPresenter<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, value: &impl Serialize) -> Result<(), PresentError> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> Presenter for JsonLinesPresenter<W> {
    fn apply(&mut self, ops: &[PatchOp]) -> Result<(), PresentError> {
        for op in ops {
            self.write_line(op)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn scroll_to(&mut self, target: &ScrollInstruction) -> Result<ScrollOutcome, PresentError> {
        self.write_line(&ScrollMessage {
            id: target.id(),
            line: target.source_line,
        })?;
        self.out.flush()?;
        Ok(ScrollOutcome::Scrolled)
    }
}

/// Messages delivered to a [`ChannelPresenter`] consumer.
#[derive(Debug)]
pub enum PresenterFrame {
    Patch(Vec<PatchOp>),
    /// Send on `ack` once the view has scrolled.
    Scroll {
        id: String,
        line: usize,
        ack: Sender<()>,
    },
}

/// Forwards frames over a channel, for an in-process view.
#[derive(Debug)]
pub struct ChannelPresenter {
    frames: Sender<PresenterFrame>,
    timeout: Duration,
}

impl ChannelPresenter {
    /// Returns the presenter and the receiving end for the view.
    pub fn channel() -> (Self, Receiver<PresenterFrame>) {
        let (frames, rx) = mpsc::channel();
        (
            Self {
                frames,
                timeout: DEFAULT_SCROLL_TIMEOUT,
            },
            rx,
        )
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Presenter for ChannelPresenter {
    fn apply(&mut self, ops: &[PatchOp]) -> Result<(), PresentError> {
        self.frames
            .send(PresenterFrame::Patch(ops.to_vec()))
            .map_err(|_| PresentError::Disconnected)
    }

    fn scroll_to(&mut self, target: &ScrollInstruction) -> Result<ScrollOutcome, PresentError> {
        let (ack, acked) = mpsc::channel();
        self.frames
            .send(PresenterFrame::Scroll {
                id: target.id().to_owned(),
                line: target.source_line,
                ack,
            })
            .map_err(|_| PresentError::Disconnected)?;

        match acked.recv_timeout(self.timeout) {
            Ok(()) => Ok(ScrollOutcome::Scrolled),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    id = target.id(),
                    timeout_ms = self.timeout.as_millis(),
                    "scroll not acknowledged in time"
                );
                Ok(ScrollOutcome::Skipped)
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!(id = target.id(), "scroll dropped without acknowledgement");
                Ok(ScrollOutcome::Skipped)
            }
        }
    }
}
