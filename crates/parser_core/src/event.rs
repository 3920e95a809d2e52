use crate::TextId;

/// Message pushed from the session coordinator to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Status bar text changed.
    StatusChanged(String),
    /// A one-shot notification from the parser.
    Notification(String),
    /// The parser hit an unhandled failure and the session was closed.
    FatalError(String),
    /// Every wordform of the text has been reparsed; show the conflicts view.
    ShowConflicts(TextId),
}
