// src/openai/types.rs
// Request/response types for the assistant threads/runs/files surface.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Deserialize, Debug)]
pub struct ThreadResponse {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct FileResponse {
    pub id: String,
}

/// Reference from an outbound message to an uploaded file, scoped to
/// file_search.
#[derive(Serialize, Debug, Clone)]
pub struct Attachment {
    pub file_id: String,
    pub tools: Vec<Value>,
}

impl Attachment {
    pub fn file_search(file_id: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            tools: vec![json!({"type": "file_search"})],
        }
    }
}

#[derive(Serialize, Debug)]
pub struct CreateMessageRequest {
    pub role: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Serialize, Debug)]
pub struct CreateRunRequest {
    pub assistant_id: String,
    pub tools: Vec<Value>,
    pub stream: bool,
}

/// One pending tool call extracted from a requires_action event. Arguments
/// stay as the raw JSON string; dispatch parses them per tool.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Serialize, Debug)]
pub struct SubmitToolOutputsRequest {
    pub tool_outputs: Vec<ToolOutput>,
    pub stream: bool,
}

/// Typed view of the run SSE stream, reduced to the events the response
/// engine acts on.
#[derive(Debug, Clone)]
pub enum AssistantStreamEvent {
    MessageDelta { text: String },
    RequiresAction { run_id: String, tool_calls: Vec<ToolCallRequest> },
    Completed,
    Failed { message: String },
    Error { message: String },
}

impl AssistantStreamEvent {
    /// Parse one SSE frame. Events the engine ignores (run step updates,
    /// message lifecycle markers) return None.
    pub fn parse(event: &str, data: &str) -> Option<Self> {
        match event {
            "thread.message.delta" => {
                let frame: Value = serde_json::from_str(data).ok()?;
                let mut text = String::new();
                if let Some(parts) = frame["delta"]["content"].as_array() {
                    for part in parts {
                        if let Some(chunk) = part["text"]["value"].as_str() {
                            text.push_str(chunk);
                        }
                    }
                }
                if text.is_empty() {
                    None
                } else {
                    Some(AssistantStreamEvent::MessageDelta { text })
                }
            }
            "thread.run.requires_action" => {
                let frame: Value = serde_json::from_str(data).ok()?;
                let run_id = frame["id"].as_str()?.to_string();
                let calls = frame["required_action"]["submit_tool_outputs"]["tool_calls"]
                    .as_array()?
                    .iter()
                    .filter_map(|call| {
                        Some(ToolCallRequest {
                            id: call["id"].as_str()?.to_string(),
                            name: call["function"]["name"].as_str()?.to_string(),
                            arguments: call["function"]["arguments"].as_str()?.to_string(),
                        })
                    })
                    .collect();
                Some(AssistantStreamEvent::RequiresAction { run_id, tool_calls: calls })
            }
            "thread.run.completed" => Some(AssistantStreamEvent::Completed),
            "thread.run.failed" => {
                let message = serde_json::from_str::<Value>(data)
                    .ok()
                    .and_then(|f| f["last_error"]["message"].as_str().map(String::from))
                    .unwrap_or_else(|| "run failed".to_string());
                Some(AssistantStreamEvent::Failed { message })
            }
            "error" => {
                let message = serde_json::from_str::<Value>(data)
                    .ok()
                    .and_then(|f| {
                        f["message"]
                            .as_str()
                            .or_else(|| f["error"]["message"].as_str())
                            .map(String::from)
                    })
                    .unwrap_or_else(|| data.to_string());
                Some(AssistantStreamEvent::Error { message })
            }
            _ => None,
        }
    }
}
