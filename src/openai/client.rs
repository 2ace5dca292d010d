// src/openai/client.rs

use std::path::Path;
use std::pin::Pin;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::{Client, Method, RequestBuilder};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::OpenAiError;
use super::types::{
    AssistantStreamEvent, Attachment, CreateMessageRequest, CreateRunRequest, FileResponse,
    SubmitToolOutputsRequest, ThreadResponse, ToolOutput,
};

/// Boxed stream of typed run events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AssistantStreamEvent, OpenAiError>> + Send>>;

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Universal request builder for all assistant JSON endpoints.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.api_base, path.trim_start_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Multipart request builder for file uploads (Content-Type set by reqwest).
    fn request_multipart(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/{}", self.api_base, path.trim_start_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Map a non-2xx response into the typed error surface.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, OpenAiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or(body);
        Err(OpenAiError::from_response(status.as_u16(), message))
    }

    pub async fn create_thread(&self) -> Result<String, OpenAiError> {
        let response = self
            .request(Method::POST, "threads")
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let thread = Self::check(response).await?.json::<ThreadResponse>().await?;
        debug!(thread_id = %thread.id, "thread created");
        Ok(thread.id)
    }

    pub async fn retrieve_thread(&self, thread_id: &str) -> Result<(), OpenAiError> {
        let response = self
            .request(Method::GET, &format!("threads/{}", thread_id))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), OpenAiError> {
        let req = CreateMessageRequest {
            role: "user".to_string(),
            content: content.to_string(),
            attachments: attachments.to_vec(),
        };
        let response = self
            .request(Method::POST, &format!("threads/{}/messages", thread_id))
            .json(&req)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: Vec<Value>,
    ) -> EventStream {
        let req = CreateRunRequest {
            assistant_id: assistant_id.to_string(),
            tools,
            stream: true,
        };
        let builder = self
            .request(Method::POST, &format!("threads/{}/runs", thread_id))
            .json(&req);
        Self::sse_stream(builder)
    }

    pub fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> EventStream {
        let req = SubmitToolOutputsRequest { tool_outputs: outputs, stream: true };
        let builder = self
            .request(
                Method::POST,
                &format!("threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            )
            .json(&req);
        Self::sse_stream(builder)
    }

    /// Upload an already-extracted text file with purpose=assistants.
    pub async fn upload_file(&self, path: &Path, filename: &str) -> Result<String, OpenAiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| OpenAiError::Stream(format!("failed to read {}: {}", path.display(), e)))?;

        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
            );

        let response = self.request_multipart("files").multipart(form).send().await?;
        let file = Self::check(response).await?.json::<FileResponse>().await?;
        Ok(file.id)
    }

    /// Delete a remote file. Already-deleted files are treated as success so
    /// the janitors and clear-chat can retry freely.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), OpenAiError> {
        let response = self
            .request(Method::DELETE, &format!("files/{}", file_id))
            .send()
            .await?;
        match Self::check(response).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Consume an SSE response as typed run events. Frames the engine does
    /// not act on are dropped here.
    fn sse_stream(builder: RequestBuilder) -> EventStream {
        Box::pin(try_stream! {
            let mut es = EventSource::new(builder)
                .map_err(|e| OpenAiError::Stream(format!("failed to open event stream: {}", e)))?;

            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {
                        debug!("run stream opened");
                    }
                    Ok(Event::Message(msg)) => {
                        if msg.data == "[DONE]" {
                            break;
                        }
                        if let Some(parsed) = AssistantStreamEvent::parse(&msg.event, &msg.data) {
                            yield parsed;
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        warn!(error = %e, "run stream error");
                        Err(OpenAiError::Stream(e.to_string()))?;
                    }
                }
            }
        })
    }
}
