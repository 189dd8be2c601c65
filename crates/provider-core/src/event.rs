//! Normalized streaming events produced by every adapter.

use futures::stream::BoxStream;

use crate::attachment::FileInfo;

/// One event of an adapter stream.
///
/// A well-formed stream yields an optional `FilesInfo` first, any number
/// of `Content` chunks, then exactly one of `Done` or `Error`. A stream
/// that was cancelled simply ends without a terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The attachments this branch actually sent upstream.
    FilesInfo(Vec<FileInfo>),
    /// A chunk of generated text, in arrival order.
    Content(String),
    /// The upstream finished normally.
    Done,
    /// The upstream failed; the message is user-facing.
    Error(String),
}

impl StreamEvent {
    /// Whether nothing may follow this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}

/// A boxed adapter stream.
pub type EventStream = BoxStream<'static, StreamEvent>;
