// src/chat/engine.rs
// Drives one assistant response: thread management, run streaming, tool
// dispatch and the always-run cleanup path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::buffer::ChunkBuffer;
use crate::openai::{AssistantStreamEvent, Attachment, EventStream};
use crate::session::{
    ChatSession, MISSING_CREDENTIALS, Message, SessionHandle, ToastLevel, UiEvent,
};
use crate::tools::ToolRegistry;

const THINKING_PLACEHOLDER: &str = "Estoy pensando...";
const RETRY_PROMPT: &str = "Repite la solicitud por favor.";
const RUN_TIMEOUT_MESSAGE: &str = "Error: La respuesta tardó demasiado.";

pub struct ResponseEngine {
    session: SessionHandle,
    registry: Arc<ToolRegistry>,
    run_timeout: Duration,
}

impl ResponseEngine {
    pub fn new(session: SessionHandle, registry: Arc<ToolRegistry>, run_timeout: Duration) -> Self {
        Self { session, registry, run_timeout }
    }

    /// Entry point for one user turn. Re-entry while a response is in flight
    /// is ignored; missing credentials surface as a toast before any remote
    /// call.
    pub async fn send_message(&self, user_prompt: &str) {
        let prompt = user_prompt.trim().to_string();
        if prompt.is_empty() {
            return;
        }
        if self.session.read().await.processing {
            warn!("response already in flight, ignoring prompt");
            return;
        }
        if !self.session.has_credentials() {
            self.session.toast(ToastLevel::Error, MISSING_CREDENTIALS);
            return;
        }

        {
            let mut session = self.session.write().await;
            session.processing = true;
            session.streaming = true;
            session.thinking_seconds = 0;
            session.messages.push(Message::user(&prompt));
        }
        self.session.publish(UiEvent::MessageAppended(Message::user(&prompt)));
        self.session.publish(UiEvent::ScrollToBottom);

        self.session
            .write()
            .await
            .messages
            .push(Message::assistant(THINKING_PLACEHOLDER));
        self.session
            .publish(UiEvent::MessageAppended(Message::assistant(THINKING_PLACEHOLDER)));

        let timer = self.session.spawn_thinking_timer();

        if let Err(e) = self.generate(&prompt).await {
            error!(error = %e, "response generation failed");
            self.session
                .set_last_message(&format!("Error inesperado: {}", e))
                .await;
        }

        // Cleanup runs on every exit path: success, failure or error.
        {
            let mut session = self.session.write().await;
            session.processing = false;
            session.streaming = false;
            session.thinking_seconds = 0;
            session.focus_chat_input = true;
        }
        self.session.publish(UiEvent::ScrollToBottom);
        self.session.publish(UiEvent::FocusInput);
        // One-shot trigger resets once the focus event is out.
        self.session.write().await.focus_chat_input = false;
        timer.abort();
    }

    async fn generate(&self, prompt: &str) -> Result<()> {
        // Immutable snapshot of the window; uploads landing mid-response do
        // not change this turn.
        let (window, thread_id) = {
            let session = self.session.read().await;
            (session.attachment_window(), session.thread_id.clone())
        };

        // A fresh thread whenever none exists or the session has no files
        // left, so removed documents cannot leak across thread boundaries.
        let thread_id = match thread_id {
            Some(id) if !window.is_empty() => id,
            _ => {
                let id = self.session.api.create_thread().await?;
                info!(thread_id = %id, "created new thread");
                self.session.write().await.thread_id = Some(id.clone());
                id
            }
        };

        let attachments: Vec<Attachment> =
            window.iter().map(|f| Attachment::file_search(&f.file_id)).collect();
        let content = ChatSession::outbound_content(prompt, &window);
        self.session
            .api
            .create_message(&thread_id, &content, &attachments)
            .await?;

        let mut tools: Vec<Value> = self.registry.manifest();
        if !window.is_empty() {
            tools.push(json!({"type": "file_search"}));
        }

        let stream = match tokio::time::timeout(
            self.run_timeout,
            self.session
                .api
                .create_run_stream(&thread_id, &self.session.assistant_id, tools),
        )
        .await
        {
            Ok(stream) => stream?,
            Err(_) => {
                error!("run creation timed out after {:?}", self.run_timeout);
                self.session.set_last_message(RUN_TIMEOUT_MESSAGE).await;
                return Ok(());
            }
        };

        self.consume(stream, &thread_id).await
    }

    async fn consume(&self, mut stream: EventStream, thread_id: &str) -> Result<()> {
        let mut buffer = ChunkBuffer::new(Instant::now());
        let mut displayed = String::new();

        while let Some(event) = stream.next().await {
            match event? {
                AssistantStreamEvent::MessageDelta { text } => {
                    if let Some(flushed) = buffer.push(&text, Instant::now()) {
                        displayed.push_str(&flushed);
                        self.session.set_last_message(&displayed).await;
                        if buffer.should_scroll() {
                            self.session.publish(UiEvent::ScrollToBottom);
                        }
                    }
                }
                AssistantStreamEvent::RequiresAction { run_id, tool_calls } => {
                    let first_query = tool_calls
                        .first()
                        .and_then(|c| serde_json::from_str::<Value>(&c.arguments).ok())
                        .and_then(|v| v["query"].as_str().map(String::from))
                        .unwrap_or_else(|| "...".to_string());
                    self.session
                        .set_last_message(&format!("Buscando: '{}'...", first_query))
                        .await;

                    let outputs = self.registry.dispatch(&tool_calls).await;
                    info!(count = outputs.len(), "submitting tool outputs");
                    stream = self
                        .session
                        .api
                        .submit_tool_outputs(thread_id, &run_id, outputs)
                        .await?;
                    // Streaming restarts on the replacement stream; the
                    // buffer keeps accumulating into the same message.
                }
                AssistantStreamEvent::Completed => {
                    if let Some(rest) = buffer.drain(Instant::now()) {
                        displayed.push_str(&rest);
                        self.session.set_last_message(&displayed).await;
                        self.session.publish(UiEvent::ScrollToBottom);
                    }
                    info!(chars = buffer.displayed_len(), "run completed");
                    return Ok(());
                }
                AssistantStreamEvent::Failed { message }
                | AssistantStreamEvent::Error { message } => {
                    warn!(error = %message, "run did not complete");
                    self.session.set_last_message(RETRY_PROMPT).await;
                    return Ok(());
                }
            }
        }

        // Stream ended without a terminal event; show what we have.
        if let Some(rest) = buffer.drain(Instant::now()) {
            displayed.push_str(&rest);
            self.session.set_last_message(&displayed).await;
        }
        Ok(())
    }
}
