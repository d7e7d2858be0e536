//! Cooperative cancellation.
//!
//! A pipeline run owns a [`CancelToken`] and threads a [`Checkpoint`]
//! through every stage. Stages call [`Checkpoint::step`] between node-level
//! steps; every few steps the checkpoint yields, which runs the poll hook
//! (the coordinator uses it to look for a newer change event) and then
//! reports whether the run has been cancelled.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of node-level steps between yields when none is configured.
pub const DEFAULT_YIELD_EVERY: usize = 64;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// The run was abandoned in favour of newer input. Not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("superseded by a newer change")]
pub struct Cancelled;

/// Yield point handed to each pipeline stage.
pub struct Checkpoint<'a> {
    token: CancelToken,
    poll: Option<&'a mut dyn FnMut() -> bool>,
    every: usize,
    steps: usize,
}

impl<'a> Checkpoint<'a> {
    /// A checkpoint that only observes `token`.
    pub fn new(token: CancelToken) -> Self {
        Self {
            token,
            poll: None,
            every: DEFAULT_YIELD_EVERY,
            steps: 0,
        }
    }

    /// A checkpoint that calls `poll` at each yield. When `poll` returns
    /// true the token is cancelled.
    pub fn polling(token: CancelToken, every: usize, poll: &'a mut dyn FnMut() -> bool) -> Self {
        Self {
            token,
            poll: Some(poll),
            every: every.max(1),
            steps: 0,
        }
    }

    /// A checkpoint that can never be cancelled.
    pub fn detached() -> Self {
        Self::new(CancelToken::new())
    }

    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Steps taken so far.
    pub const fn steps(&self) -> usize {
        self.steps
    }

    /// Record one node-level step, yielding every `every` steps.
    ///
    /// # Errors
    /// Returns [`Cancelled`] once the token has been cancelled.
    pub fn step(&mut self) -> Result<(), Cancelled> {
        self.steps += 1;
        if self.steps % self.every == 0 {
            return self.yield_now();
        }
        self.check()
    }

    /// Run the poll hook now, regardless of the step count.
    ///
    /// # Errors
    /// Returns [`Cancelled`] once the token has been cancelled.
    pub fn yield_now(&mut self) -> Result<(), Cancelled> {
        if let Some(poll) = self.poll.as_deref_mut()
            && poll()
        {
            self.token.cancel();
        }
        self.check()
    }

    fn check(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Checkpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("cancelled", &self.token.is_cancelled())
            .field("every", &self.every)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}
