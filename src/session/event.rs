//! Change events and their wire decoding.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What changed in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventKind {
    /// The buffer text changed; the cursor may have moved too.
    #[default]
    #[serde(rename = "text", alias = "text_changed")]
    TextChanged,
    /// Only the cursor moved.
    #[serde(rename = "cursor", alias = "cursor_moved")]
    CursorMoved,
}

/// A snapshot of the editor buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub lines: Vec<String>,
    /// 1-based
    pub cursor_line: usize,
    pub kind: EventKind,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed change event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("change event is not an object")]
    NotAnObject,

    #[error("change event has no `text` line list")]
    MissingLines,

    #[error("change event has no `line`")]
    MissingCursorLine,

    #[error("cursor line must be 1 or greater, got {0}")]
    InvalidCursorLine(i64),

    #[error("update coordinator has shut down")]
    Closed,
}

#[derive(Deserialize)]
struct WireEvent {
    text: Option<Vec<String>>,
    line: Option<i64>,
    #[serde(default)]
    kind: EventKind,
}

impl ChangeEvent {
    pub fn text_changed(lines: Vec<String>, cursor_line: usize) -> Self {
        Self {
            lines,
            cursor_line,
            kind: EventKind::TextChanged,
        }
    }

    pub fn cursor_moved(lines: Vec<String>, cursor_line: usize) -> Self {
        Self {
            lines,
            cursor_line,
            kind: EventKind::CursorMoved,
        }
    }

    /// Snapshot of a whole document, split into lines.
    pub fn from_text(text: &str, cursor_line: usize) -> Self {
        Self::text_changed(text.lines().map(str::to_owned).collect(), cursor_line)
    }

    /// Decode one JSON message.
    ///
    /// # Errors
    /// See [`ChangeEvent::from_value`].
    pub fn parse(json: &str) -> Result<Self, EventError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Decode an already parsed message. Both a bare object and the editor
    /// channel framing `[msg_id, {...}]` are accepted.
    ///
    /// # Errors
    /// Returns an [`EventError`] when `text` or `line` is missing, has the
    /// wrong type, or `line` is below 1.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let body = match value {
            Value::Array(mut items) if items.len() == 2 => items.swap_remove(1),
            other => other,
        };
        if !body.is_object() {
            return Err(EventError::NotAnObject);
        }

        let wire: WireEvent = serde_json::from_value(body)?;
        let lines = wire.text.ok_or(EventError::MissingLines)?;
        let line = wire.line.ok_or(EventError::MissingCursorLine)?;
        let cursor_line = usize::try_from(line)
            .ok()
            .filter(|line| *line >= 1)
            .ok_or(EventError::InvalidCursorLine(line))?;
        Ok(Self {
            lines,
            cursor_line,
            kind: wire.kind,
        })
    }
}

/// Cloneable handle for feeding events to an
/// [`UpdateCoordinator`](super::UpdateCoordinator) from other threads.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<ChangeEvent>,
}

impl EventSender {
    pub(crate) const fn new(tx: Sender<ChangeEvent>) -> Self {
        Self { tx }
    }

    /// Queue an event.
    ///
    /// # Errors
    /// Returns [`EventError::Closed`] once the coordinator is gone.
    pub fn submit(&self, event: ChangeEvent) -> Result<(), EventError> {
        self.tx.send(event).map_err(|_| EventError::Closed)
    }

    /// Decode and queue a JSON message. A malformed message is rejected
    /// without reaching the coordinator.
    ///
    /// # Errors
    /// Returns the decoding error, or [`EventError::Closed`].
    pub fn submit_json(&self, json: &str) -> Result<(), EventError> {
        self.submit(ChangeEvent::parse(json)?)
    }

    /// Decode and queue an already parsed message.
    ///
    /// # Errors
    /// Returns the decoding error, or [`EventError::Closed`].
    pub fn submit_value(&self, value: Value) -> Result<(), EventError> {
        self.submit(ChangeEvent::from_value(value)?)
    }
}
