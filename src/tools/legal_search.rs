// src/tools/legal_search.rs
// buscar_documento_legal: Colombian legal document search over Tavily.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::{Tool, ToolId};

const TAVILY_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;
const MAX_SNIPPET_LENGTH: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Gaceta,
    Sentencia,
    Ley,
}

#[derive(Debug, Deserialize)]
pub struct LegalSearchArgs {
    pub query: String,
    pub tipo_documento: DocKind,
    #[serde(default)]
    pub sitio_preferido: Option<String>,
}

/// Search strategy per document kind. Gacetas get a robust quoted prefix and
/// a pdf filetype filter; sentencias and leyes are exact-quoted unless a
/// preferred site already narrows the search.
pub fn build_query(args: &LegalSearchArgs) -> String {
    let mut filetype = None;
    let mut query = match args.tipo_documento {
        DocKind::Gaceta => {
            filetype = Some("pdf");
            format!("\"Gaceta del Congreso\" {}", args.query)
        }
        DocKind::Sentencia | DocKind::Ley if args.sitio_preferido.is_none() => {
            format!("\"{}\"", args.query)
        }
        _ => args.query.clone(),
    };

    if let Some(site) = &args.sitio_preferido {
        query.push_str(&format!(" site:{}", site));
    }
    if let Some(ft) = filetype {
        query.push_str(&format!(" filetype:{}", ft));
    }
    query
}

#[derive(Serialize)]
struct TavilySearchRequest {
    api_key: String,
    query: String,
    search_depth: String,
    max_results: usize,
    include_raw_content: bool,
}

#[derive(Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

pub struct LegalSearchTool {
    http_client: Client,
    api_key: Option<String>,
}

impl LegalSearchTool {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        let api_key = if api_key.is_empty() { None } else { Some(api_key.to_string()) };
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent("LeyIA/1.0")
            .build()
            .unwrap_or_default();
        Self { http_client, api_key }
    }

    async fn search(&self, args: &LegalSearchArgs) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            return Ok("Error: El servicio de búsqueda no está configurado.".to_string());
        };

        let final_query = build_query(args);
        info!(query = %final_query, "legal document search");

        let request = TavilySearchRequest {
            api_key: api_key.clone(),
            query: final_query,
            search_depth: "advanced".to_string(),
            max_results: MAX_RESULTS,
            // Snippets only; raw page content is wasted tokens here.
            include_raw_content: false,
        };

        let response = match self.http_client.post(TAVILY_URL).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                return Ok(format!(
                    "Error al procesar la búsqueda en internet. El servicio devolvió el siguiente mensaje: {}",
                    e
                ));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Ok(format!(
                "Error al procesar la búsqueda en internet. El servicio devolvió el siguiente mensaje: {} {}",
                status, body
            ));
        }

        let parsed: TavilySearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                return Ok(format!(
                    "Error al procesar la búsqueda en internet. El servicio devolvió el siguiente mensaje: {}",
                    e
                ));
            }
        };

        if parsed.results.is_empty() {
            return Ok(
                "No se encontraron resultados relevantes para la búsqueda especificada.".to_string()
            );
        }

        let results: Vec<Value> = parsed
            .results
            .iter()
            .map(|r| {
                let snippet: String = r.content.chars().take(MAX_SNIPPET_LENGTH).collect();
                json!({"url": r.url, "title": r.title, "snippet": snippet})
            })
            .collect();

        Ok(serde_json::to_string(&results)?)
    }
}

#[async_trait]
impl Tool for LegalSearchTool {
    fn id(&self) -> ToolId {
        ToolId::BuscarDocumentoLegal
    }

    fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "buscar_documento_legal",
                "description": "Herramienta de búsqueda avanzada para encontrar documentos legales colombianos (leyes, sentencias, gacetas) aplicando la estrategia más adecuada para cada tipo.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "La consulta de búsqueda específica. Para Gacetas, usar solo el número y año, ej: '758 de 2017'. Para Sentencias, el identificador completo, ej: 'Sentencia C-123 de 2023'. Para Leyes, el número y año, ej: 'Ley 1437 de 2011'."
                        },
                        "tipo_documento": {
                            "type": "string",
                            "description": "El tipo de documento legal a buscar. Debe ser uno de: 'gaceta', 'sentencia', 'ley'.",
                            "enum": ["gaceta", "sentencia", "ley"]
                        },
                        "sitio_preferido": {
                            "type": "string",
                            "description": "Opcional. Usar para priorizar dominios de alta autoridad. Ej: 'corteconstitucional.gov.co' para sentencias o 'suin-juriscol.gov.co' para leyes. NO usar para gacetas."
                        }
                    },
                    "required": ["query", "tipo_documento"]
                }
            }
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<String> {
        let args: LegalSearchArgs = serde_json::from_value(arguments)?;
        self.search(&args).await
    }
}
