// src/session/ui.rs

use super::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Warning,
    Error,
}

/// Display updates published by the session. The rendering layer consumes
/// these from a channel; the session never touches the UI directly.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A message was appended to the transcript.
    MessageAppended(Message),
    /// The in-flight assistant message changed; carries the full current text.
    AssistantText(String),
    ScrollToBottom,
    FocusInput,
    Toast { level: ToastLevel, text: String },
    OcrProgress(String),
    UploadProgress(u8),
    /// The whole transcript was reset (clear chat).
    Reset,
}
