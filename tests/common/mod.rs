// Shared scripted fake for the assistant API.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use leyia::openai::{
    AssistantApi, AssistantStreamEvent, Attachment, EventStream, OpenAiError, ToolOutput,
};

pub type ScriptedEvents = Vec<Result<AssistantStreamEvent, OpenAiError>>;

/// In-memory assistant backend. Threads created through it are "alive";
/// anything else is reported as not found. Run streams replay prepared
/// scripts in order.
#[derive(Default)]
pub struct FakeApi {
    pub live_threads: Mutex<Vec<String>>,
    pub retrieve_error: Mutex<Option<OpenAiError>>,
    pub created_messages: Mutex<Vec<(String, String, usize)>>,
    pub run_scripts: Mutex<VecDeque<ScriptedEvents>>,
    pub tool_scripts: Mutex<VecDeque<ScriptedEvents>>,
    pub submitted_outputs: Mutex<Vec<Vec<ToolOutput>>>,
    pub uploaded: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    thread_counter: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_live_thread(thread_id: &str) -> Self {
        let api = Self::default();
        api.live_threads.lock().unwrap().push(thread_id.to_string());
        api
    }

    pub fn push_run_script(&self, events: ScriptedEvents) {
        self.run_scripts.lock().unwrap().push_back(events);
    }

    pub fn push_tool_script(&self, events: ScriptedEvents) {
        self.tool_scripts.lock().unwrap().push_back(events);
    }

    pub fn threads_created(&self) -> usize {
        self.thread_counter.load(Ordering::SeqCst)
    }

    fn stream_from(events: ScriptedEvents) -> EventStream {
        Box::pin(futures::stream::iter(events))
    }
}

#[async_trait]
impl AssistantApi for FakeApi {
    async fn create_thread(&self) -> Result<String, OpenAiError> {
        let n = self.thread_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("thread_{}", n);
        self.live_threads.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<(), OpenAiError> {
        if let Some(err) = self.retrieve_error.lock().unwrap().take() {
            return Err(err);
        }
        if self.live_threads.lock().unwrap().iter().any(|t| t == thread_id) {
            Ok(())
        } else {
            Err(OpenAiError::NotFound(format!("No thread found with id '{}'", thread_id)))
        }
    }

    async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), OpenAiError> {
        self.created_messages.lock().unwrap().push((
            thread_id.to_string(),
            content.to_string(),
            attachments.len(),
        ));
        Ok(())
    }

    async fn create_run_stream(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
        _tools: Vec<Value>,
    ) -> Result<EventStream, OpenAiError> {
        let events = self
            .run_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Ok(AssistantStreamEvent::Completed)]);
        Ok(Self::stream_from(events))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, OpenAiError> {
        self.submitted_outputs.lock().unwrap().push(outputs);
        let events = self
            .tool_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Ok(AssistantStreamEvent::Completed)]);
        Ok(Self::stream_from(events))
    }

    async fn upload_file(&self, _path: &Path, filename: &str) -> Result<String, OpenAiError> {
        let mut uploaded = self.uploaded.lock().unwrap();
        uploaded.push(filename.to_string());
        Ok(format!("file-{}", uploaded.len()))
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), OpenAiError> {
        self.deleted.lock().unwrap().push(file_id.to_string());
        Ok(())
    }
}
