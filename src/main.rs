// src/main.rs

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use leyia::chat::ResponseEngine;
use leyia::config::CONFIG;
use leyia::ingest::FileIngestor;
use leyia::janitor::{self, JanitorConfig};
use leyia::notebook::NotebookStore;
use leyia::ocr::{OcrPipeline, TesseractEngine};
use leyia::openai::OpenAiClient;
use leyia::session::{SessionHandle, ToastLevel, UiEvent, WELCOME_MESSAGE};
use leyia::tools::{LegalSearchTool, Tool, ToolRegistry};

const HELP: &str = "Comandos:\n  /subir <ruta> [ruta...]  sube documentos\n  /archivos                lista los archivos de la sesión\n  /borrar <file_id>        elimina un archivo\n  /notebook <título>       exporta la conversación\n  /limpiar                 reinicia el chat\n  /salir                   termina";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let level = Level::from_str(&CONFIG.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting LeyIA legal assistant");
    info!("Assistant: {}", CONFIG.assistant_id);
    if !CONFIG.has_credentials() {
        warn!("OpenAI credentials missing; conversation features disabled");
    }

    let options = SqliteConnectOptions::from_str(&CONFIG.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    let notebooks = NotebookStore::new(pool).await?;

    let api = Arc::new(OpenAiClient::new(&CONFIG.openai_api_key, &CONFIG.openai_base_url));

    let tools: Vec<Box<dyn Tool>> = vec![Box::new(LegalSearchTool::new(
        &CONFIG.tavily_api_key,
        Duration::from_secs(CONFIG.search_timeout),
    ))];
    let registry = Arc::new(ToolRegistry::new(
        tools,
        Duration::from_secs(CONFIG.tool_timeout),
    )?);

    let (updates, mut events) = mpsc::unbounded_channel();
    let session = SessionHandle::new(
        api,
        &CONFIG.assistant_id,
        CONFIG.has_credentials(),
        Duration::from_secs(CONFIG.thinking_timeout),
        updates,
    );

    // Display updates render on their own task so responses stream while the
    // REPL waits for input.
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render(event);
        }
    });

    let engine = ResponseEngine::new(
        session.clone(),
        registry,
        Duration::from_secs(CONFIG.run_timeout),
    );
    let ingestor = FileIngestor::new(
        session.clone(),
        OcrPipeline::new(
            CONFIG.ocr_dpi,
            Box::new(TesseractEngine::new(&CONFIG.ocr_languages)),
        ),
    );

    let mut janitors = Vec::new();
    if session.has_credentials() {
        janitors = janitor::spawn(
            session.clone(),
            JanitorConfig {
                liveness_interval: Duration::from_secs(CONFIG.liveness_interval),
                age_sweep_interval: Duration::from_secs(CONFIG.age_sweep_interval),
                max_file_age: Duration::from_secs(CONFIG.max_file_age),
            },
        );
        info!(
            "janitors running every {}s / {}s",
            CONFIG.liveness_interval, CONFIG.age_sweep_interval
        );
    }

    println!("{}\n", WELCOME_MESSAGE);
    println!("{}\n", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_whitespace().next() {
            Some("/salir") => break,
            Some("/subir") => {
                let paths: Vec<PathBuf> = line
                    .split_whitespace()
                    .skip(1)
                    .map(PathBuf::from)
                    .collect();
                ingestor.upload(&paths).await;
            }
            Some("/archivos") => {
                let state = session.read().await;
                if state.session_files.is_empty() {
                    println!("No hay archivos subidos.");
                }
                for file in &state.session_files {
                    println!(
                        "{}  {}  ({})",
                        file.file_id,
                        file.filename,
                        file.uploaded_at.format("%d/%m/%Y %H:%M")
                    );
                }
            }
            Some("/borrar") => match line.split_whitespace().nth(1) {
                Some(file_id) => session.delete_file(file_id).await,
                None => println!("Uso: /borrar <file_id>"),
            },
            Some("/notebook") => {
                let title = line.strip_prefix("/notebook").unwrap_or("").trim();
                let messages = session.read().await.messages.clone();
                match notebooks.export_chat(&messages, title).await {
                    Ok(_) => session.toast(
                        ToastLevel::Success,
                        format!("Notebook '{}' creado exitosamente.", title),
                    ),
                    Err(e) => session.toast(ToastLevel::Error, format!("Error creando notebook: {}", e)),
                }
            }
            Some("/limpiar") => {
                session.clear_chat().await;
                println!("{}\n", WELCOME_MESSAGE);
            }
            Some("/ayuda") => println!("{}", HELP),
            _ => engine.send_message(line).await,
        }
    }

    info!("shutting down");
    session.cleanup_session_files().await;
    session.shutdown();
    for handle in janitors {
        let _ = handle.await;
    }
    drop(session);
    drop(engine);
    drop(ingestor);
    let _ = renderer.await;
    Ok(())
}

fn render(event: UiEvent) {
    match event {
        UiEvent::MessageAppended(message) => {
            println!("[{:?}] {}", message.role, message.content);
        }
        UiEvent::AssistantText(text) => println!("{}", text),
        UiEvent::Toast { level, text } => match level {
            ToastLevel::Success => println!("✔ {}", text),
            ToastLevel::Warning => println!("⚠ {}", text),
            ToastLevel::Error => println!("✖ {}", text),
        },
        UiEvent::OcrProgress(line) => println!("{}", line),
        UiEvent::UploadProgress(percent) => println!("Subiendo... {}%", percent),
        UiEvent::Reset => {}
        UiEvent::ScrollToBottom | UiEvent::FocusInput => {}
    }
}
