// src/session/mod.rs
//! Session state and its update channel. The session owns the transcript and
//! file bookkeeping behind a lock; every externally visible change goes out
//! as a `UiEvent` so a separate rendering layer can draw it.

pub mod ui;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::openai::AssistantApi;
pub use ui::{ToastLevel, UiEvent};

pub const WELCOME_MESSAGE: &str = "¡Hola! Soy LeyIA, tu Asistente Legal. \
    Puedes hacerme una pregunta o subir un documento para analizarlo.";

/// Only the most recent N session files are attached to a new message.
pub const ATTACHMENT_WINDOW: usize = 3;

pub const MISSING_CREDENTIALS: &str = "Las credenciales de OpenAI no están configuradas.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Per-session reactive state. Mutated only through `SessionHandle` critical
/// sections.
#[derive(Debug)]
pub struct ChatSession {
    pub messages: Vec<Message>,
    pub thread_id: Option<String>,
    /// Every file uploaded in this chat, used for duplicate detection.
    pub file_info_list: Vec<FileInfo>,
    /// Files considered current for attachment purposes.
    pub session_files: Vec<FileInfo>,
    pub processing: bool,
    pub streaming: bool,
    pub uploading: bool,
    pub upload_progress: u8,
    pub ocr_progress: String,
    pub upload_error: String,
    pub thinking_seconds: u64,
    pub focus_chat_input: bool,
}

impl ChatSession {
    fn new() -> Self {
        Self {
            messages: vec![Message::assistant(WELCOME_MESSAGE)],
            thread_id: None,
            file_info_list: Vec::new(),
            session_files: Vec::new(),
            processing: false,
            streaming: false,
            uploading: false,
            upload_progress: 0,
            ocr_progress: String::new(),
            upload_error: String::new(),
            thinking_seconds: 0,
            focus_chat_input: false,
        }
    }

    /// Snapshot of the files that will travel with the next message.
    pub fn attachment_window(&self) -> Vec<FileInfo> {
        let skip = self.session_files.len().saturating_sub(ATTACHMENT_WINDOW);
        self.session_files[skip..].to_vec()
    }

    /// The assistant is never left to assume document context: the outbound
    /// text always carries an explicit marker.
    pub fn outbound_content(user_prompt: &str, window: &[FileInfo]) -> String {
        if window.is_empty() {
            format!("{}\n\n[SISTEMA: No hay archivos subidos]", user_prompt)
        } else {
            let names: Vec<&str> = window.iter().map(|f| f.filename.as_str()).collect();
            format!("{}\n\n[Archivos adjuntos: {}]", user_prompt, names.join(", "))
        }
    }

    fn reset(&mut self) {
        *self = ChatSession::new();
    }
}

/// Shared handle to one session: state lock, assistant API, display-update
/// channel and the cancellation token that scopes its background tasks.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<RwLock<ChatSession>>,
    pub api: Arc<dyn AssistantApi>,
    updates: mpsc::UnboundedSender<UiEvent>,
    cancel: CancellationToken,
    pub assistant_id: String,
    credentials_ok: bool,
    thinking_timeout: Duration,
}

impl SessionHandle {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        assistant_id: &str,
        credentials_ok: bool,
        thinking_timeout: Duration,
        updates: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(ChatSession::new())),
            api,
            updates,
            cancel: CancellationToken::new(),
            assistant_id: assistant_id.to_string(),
            credentials_ok,
            thinking_timeout,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials_ok
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops janitors and timers tied to this session.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ChatSession> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, ChatSession> {
        self.state.write().await
    }

    pub fn publish(&self, event: UiEvent) {
        // The renderer may already be gone during shutdown.
        let _ = self.updates.send(event);
    }

    pub fn toast(&self, level: ToastLevel, text: impl Into<String>) {
        self.publish(UiEvent::Toast { level, text: text.into() });
    }

    /// Replace the in-flight assistant message and publish the new snapshot.
    pub async fn set_last_message(&self, content: &str) {
        {
            let mut session = self.write().await;
            if let Some(last) = session.messages.last_mut() {
                last.content = content.to_string();
            }
        }
        self.publish(UiEvent::AssistantText(content.to_string()));
    }

    /// Explicit, user-initiated file deletion.
    pub async fn delete_file(&self, file_id: &str) {
        if !self.credentials_ok {
            self.toast(ToastLevel::Error, MISSING_CREDENTIALS);
            return;
        }

        let filename = {
            let session = self.read().await;
            session
                .file_info_list
                .iter()
                .find(|f| f.file_id == file_id)
                .map(|f| f.filename.clone())
                .unwrap_or_else(|| "archivo".to_string())
        };

        match self.api.delete_file(file_id).await {
            Ok(()) => {
                let mut session = self.write().await;
                session.file_info_list.retain(|f| f.file_id != file_id);
                session.session_files.retain(|f| f.file_id != file_id);
                drop(session);
                self.toast(ToastLevel::Success, format!("'{}' eliminado.", filename));
            }
            Err(e) => {
                self.toast(ToastLevel::Error, format!("Error eliminando '{}': {}", filename, e));
            }
        }
    }

    /// Delete every current session file remotely and forget them locally.
    /// Remote failures are best-effort; already-deleted ids are fine.
    pub async fn cleanup_session_files(&self) {
        if !self.credentials_ok {
            return;
        }
        let files = {
            let session = self.read().await;
            session.session_files.clone()
        };
        for file in &files {
            if let Err(e) = self.api.delete_file(&file.file_id).await {
                warn!(file_id = %file.file_id, error = %e, "session file cleanup failed");
            }
        }
        self.write().await.session_files.clear();
    }

    /// Reset the chat to its initial state. Session files are removed first
    /// so they cannot outlive the conversation that uploaded them.
    pub async fn clear_chat(&self) {
        self.cleanup_session_files().await;
        self.write().await.reset();
        self.publish(UiEvent::Reset);
        info!("chat cleared");
    }

    /// Counts elapsed seconds while a response is in flight; gives up and
    /// unblocks the session after the safety timeout.
    pub fn spawn_thinking_timer(&self) -> JoinHandle<()> {
        let handle = self.clone();
        let cancel = self.cancel.clone();
        let max = self.thinking_timeout;
        tokio::spawn(async move {
            handle.write().await.thinking_seconds = 0;
            let started = tokio::time::Instant::now();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
                let mut session = handle.write().await;
                if !session.processing {
                    break;
                }
                if started.elapsed() > max {
                    warn!("response exceeded safety timeout of {:?}", max);
                    session.processing = false;
                    if let Some(last) = session.messages.last_mut() {
                        last.content = "Error: Tiempo de respuesta agotado.".to_string();
                    }
                    drop(session);
                    handle.publish(UiEvent::AssistantText(
                        "Error: Tiempo de respuesta agotado.".to_string(),
                    ));
                    break;
                }
                session.thinking_seconds += 1;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str) -> FileInfo {
        FileInfo {
            file_id: id.to_string(),
            filename: format!("{}.pdf", id),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_attachment_window_keeps_most_recent_three() {
        let mut session = ChatSession::new();
        for id in ["f1", "f2", "f3", "f4", "f5"] {
            session.session_files.push(file(id));
        }
        let window = session.attachment_window();
        let ids: Vec<&str> = window.iter().map(|f| f.file_id.as_str()).collect();
        assert_eq!(ids, vec!["f3", "f4", "f5"]);
    }

    #[test]
    fn test_attachment_window_under_three() {
        let mut session = ChatSession::new();
        session.session_files.push(file("f1"));
        assert_eq!(session.attachment_window().len(), 1);
    }

    #[test]
    fn test_outbound_content_markers() {
        let with_files = ChatSession::outbound_content("hola", &[file("f1"), file("f2")]);
        assert!(with_files.contains("[Archivos adjuntos: f1.pdf, f2.pdf]"));

        let without = ChatSession::outbound_content("hola", &[]);
        assert!(without.contains("[SISTEMA: No hay archivos subidos]"));
    }

    #[test]
    fn test_new_session_starts_with_welcome() {
        let session = ChatSession::new();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::Assistant);
        assert!(session.messages[0].content.contains("LeyIA"));
    }
}
