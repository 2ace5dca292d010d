// src/tools/mod.rs
//! Tool manifest and dispatch for requires_action events.

pub mod legal_search;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::openai::{ToolCallRequest, ToolOutput};
pub use legal_search::LegalSearchTool;

/// Tools the assistant may call, as a closed set instead of free-form names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    BuscarDocumentoLegal,
}

impl ToolId {
    pub fn name(&self) -> &'static str {
        match self {
            ToolId::BuscarDocumentoLegal => "buscar_documento_legal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "buscar_documento_legal" => Some(ToolId::BuscarDocumentoLegal),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> ToolId;
    /// Function-tool definition as sent to the assistant API.
    fn definition(&self) -> Value;
    async fn invoke(&self, arguments: Value) -> Result<String>;
}

pub struct ToolRegistry {
    tools: HashMap<ToolId, Box<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Builds the registry and validates each definition against its id, so
    /// a manifest/registry mismatch fails at startup instead of mid-run.
    pub fn new(tools: Vec<Box<dyn Tool>>, timeout: Duration) -> Result<Self> {
        let mut map: HashMap<ToolId, Box<dyn Tool>> = HashMap::new();
        for tool in tools {
            let id = tool.id();
            let declared = tool.definition()["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if declared != id.name() {
                bail!("tool definition name '{}' does not match id '{}'", declared, id.name());
            }
            if map.insert(id, tool).is_some() {
                bail!("duplicate tool registration for '{}'", id.name());
            }
        }
        Ok(Self { tools: map, timeout })
    }

    /// Function definitions for the run's tool manifest.
    pub fn manifest(&self) -> Vec<Value> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Run every pending tool call. Unknown names produce no output entry;
    /// timeouts and failures become bounded error strings so one bad call
    /// never aborts the others or the run.
    pub async fn dispatch(&self, calls: &[ToolCallRequest]) -> Vec<ToolOutput> {
        let mut outputs = Vec::new();
        for call in calls {
            let Some(id) = ToolId::from_name(&call.name) else {
                warn!(name = %call.name, "assistant requested unregistered tool");
                continue;
            };
            let tool = &self.tools[&id];

            let output = match serde_json::from_str::<Value>(&call.arguments) {
                Ok(arguments) => {
                    match tokio::time::timeout(self.timeout, tool.invoke(arguments)).await {
                        Ok(Ok(output)) => output,
                        Ok(Err(e)) => {
                            error!(name = %call.name, error = %e, "tool invocation failed");
                            format!("Error ejecutando {}: {}", call.name, e)
                        }
                        Err(_) => {
                            error!(name = %call.name, "tool invocation timed out");
                            format!("Error: La herramienta {} tardó demasiado.", call.name)
                        }
                    }
                }
                Err(e) => {
                    error!(name = %call.name, error = %e, "invalid tool arguments");
                    format!("Error ejecutando {}: argumentos inválidos", call.name)
                }
            };

            info!(name = %call.name, chars = output.len(), "tool call completed");
            outputs.push(ToolOutput { tool_call_id: call.id.clone(), output });
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn id(&self) -> ToolId {
            ToolId::BuscarDocumentoLegal
        }

        fn definition(&self) -> Value {
            json!({"type": "function", "function": {"name": "buscar_documento_legal"}})
        }

        async fn invoke(&self, _arguments: Value) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn id(&self) -> ToolId {
            ToolId::BuscarDocumentoLegal
        }

        fn definition(&self) -> Value {
            json!({"type": "function", "function": {"name": "buscar_documento_legal"}})
        }

        async fn invoke(&self, _arguments: Value) -> Result<String> {
            bail!("proveedor caído")
        }
    }

    fn call(name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_produces_no_output() {
        let registry =
            ToolRegistry::new(vec![Box::new(FailingTool)], Duration::from_secs(1)).unwrap();
        let outputs = registry.dispatch(&[call("herramienta_fantasma")]).await;
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_string() {
        let registry =
            ToolRegistry::new(vec![Box::new(SlowTool)], Duration::from_millis(20)).unwrap();
        let outputs = registry.dispatch(&[call("buscar_documento_legal")]).await;
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].output.contains("tardó demasiado"));
    }

    #[tokio::test]
    async fn test_failure_becomes_error_string() {
        let registry =
            ToolRegistry::new(vec![Box::new(FailingTool)], Duration::from_secs(1)).unwrap();
        let outputs = registry.dispatch(&[call("buscar_documento_legal")]).await;
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].output.contains("proveedor caído"));
    }

    #[test]
    fn test_registry_validates_definition_names() {
        struct Mismatched;

        #[async_trait]
        impl Tool for Mismatched {
            fn id(&self) -> ToolId {
                ToolId::BuscarDocumentoLegal
            }

            fn definition(&self) -> Value {
                json!({"type": "function", "function": {"name": "otra_cosa"}})
            }

            async fn invoke(&self, _arguments: Value) -> Result<String> {
                Ok(String::new())
            }
        }

        assert!(ToolRegistry::new(vec![Box::new(Mismatched)], Duration::from_secs(1)).is_err());
    }
}
