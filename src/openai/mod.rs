// src/openai/mod.rs
//! Client for the hosted assistant API: threads, messages, streaming runs,
//! tool-output submission and file lifecycle.

pub mod client;
pub mod error;
pub mod types;

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

pub use client::{EventStream, OpenAiClient};
pub use error::OpenAiError;
pub use types::{AssistantStreamEvent, Attachment, ToolCallRequest, ToolOutput};

/// Seam between the session machinery and the hosted API, so the response
/// engine and janitors can run against a scripted fake in tests.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<String, OpenAiError>;
    async fn retrieve_thread(&self, thread_id: &str) -> Result<(), OpenAiError>;
    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), OpenAiError>;
    async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Vec<Value>,
    ) -> Result<EventStream, OpenAiError>;
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, OpenAiError>;
    async fn upload_file(&self, path: &Path, filename: &str) -> Result<String, OpenAiError>;
    /// Idempotent: deleting an already-deleted file is not an error.
    async fn delete_file(&self, file_id: &str) -> Result<(), OpenAiError>;
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_thread(&self) -> Result<String, OpenAiError> {
        OpenAiClient::create_thread(self).await
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<(), OpenAiError> {
        OpenAiClient::retrieve_thread(self, thread_id).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), OpenAiError> {
        OpenAiClient::create_message(self, thread_id, content, attachments).await
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Vec<Value>,
    ) -> Result<EventStream, OpenAiError> {
        Ok(OpenAiClient::create_run_stream(self, thread_id, assistant_id, tools))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, OpenAiError> {
        Ok(OpenAiClient::submit_tool_outputs_stream(self, thread_id, run_id, outputs))
    }

    async fn upload_file(&self, path: &Path, filename: &str) -> Result<String, OpenAiError> {
        OpenAiClient::upload_file(self, path, filename).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), OpenAiError> {
        OpenAiClient::delete_file(self, file_id).await
    }
}
