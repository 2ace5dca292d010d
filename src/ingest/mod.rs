//! Upload pipeline: local file to extracted text to remote assistant file.
//!
//! Each upload is extracted directly first; PDFs with almost no text layer go
//! through the OCR pass. Whatever text survives is written to a
//! `<stem>_processed.txt` artifact and uploaded with purpose `assistants`.

pub mod extract;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::ocr::{OcrPipeline, OcrProgress};
use crate::session::{FileInfo, SessionHandle, ToastLevel, UiEvent};

pub use extract::{FileFormat, OCR_THRESHOLD, extract_text, needs_ocr};

pub struct FileIngestor {
    session: SessionHandle,
    ocr: OcrPipeline,
}

impl FileIngestor {
    pub fn new(session: SessionHandle, ocr: OcrPipeline) -> Self {
        Self { session, ocr }
    }

    /// Processes a batch of local files. Individual failures are reported as
    /// toasts and skip to the next file; the batch itself never aborts.
    pub async fn upload(&self, paths: &[PathBuf]) {
        self.session.write().await.upload_error.clear();
        if paths.is_empty() {
            self.fail_upload("No se seleccionaron archivos.").await;
            return;
        }

        {
            let mut session = self.session.write().await;
            session.uploading = true;
            session.upload_progress = 0;
        }
        self.session.publish(UiEvent::UploadProgress(0));

        if !self.session.has_credentials() {
            self.fail_upload("Credenciales de OpenAI no configuradas.").await;
            self.session.write().await.uploading = false;
            return;
        }

        let total = paths.len();
        for (i, path) in paths.iter().enumerate() {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let duplicate = self
                .session
                .read()
                .await
                .file_info_list
                .iter()
                .any(|f| f.filename == filename);
            if duplicate {
                self.fail_upload(&format!("El archivo '{}' ya fue subido.", filename)).await;
            } else if let Err(e) = self.ingest_one(path, &filename).await {
                self.fail_upload(&format!("Error procesando '{}': {}", filename, e)).await;
            }

            let progress = (((i + 1) as f64 / total as f64) * 100.0).round() as u8;
            self.session.write().await.upload_progress = progress;
            self.session.publish(UiEvent::UploadProgress(progress));
        }

        {
            let mut session = self.session.write().await;
            session.uploading = false;
            session.ocr_progress.clear();
        }
        info!(files = total, "upload batch finished");
    }

    async fn ingest_one(&self, path: &Path, filename: &str) -> Result<()> {
        info!(file = %filename, "processing upload");
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("No se pudo leer '{}'", path.display()))?;

        let owned_name = filename.to_string();
        let extracted = tokio::task::spawn_blocking(move || {
            // A broken text layer is not fatal for PDFs; OCR gets its chance.
            match extract::extract_text(&bytes, &owned_name) {
                Ok(text) => Ok((bytes, text)),
                Err(e) if owned_name.to_lowercase().ends_with(".pdf") => {
                    warn!(file = %owned_name, error = %e, "direct extraction failed");
                    Ok((bytes, Some(String::new())))
                }
                Err(e) => Err(e),
            }
        })
        .await??;
        let (bytes, text) = extracted;

        let Some(mut text) = text else {
            self.fail_upload(&format!("Formato no soportado: '{}'.", filename)).await;
            return Ok(());
        };

        if extract::needs_ocr(filename, &text) {
            text = self.ocr_pass(&bytes, filename).await?;
            if text.trim().is_empty() {
                self.session
                    .toast(ToastLevel::Error, &format!("Falló el OCR para '{}'", filename));
                return Ok(());
            }
        }

        if text.trim().is_empty() {
            let message = format!("No se pudo extraer texto de '{}'.", filename);
            warn!("{}", message);
            self.session.write().await.upload_error = message.clone();
            self.session.toast(ToastLevel::Warning, &message);
            return Ok(());
        }

        let artifact = write_artifact(filename, &text)?;
        let remote_name = format!("{}_processed.txt", file_stem(filename));

        match self.session.api.upload_file(artifact.path(), &remote_name).await {
            Ok(file_id) => {
                let info = FileInfo {
                    file_id: file_id.clone(),
                    filename: filename.to_string(),
                    uploaded_at: Utc::now(),
                };
                {
                    let mut session = self.session.write().await;
                    session.file_info_list.push(info.clone());
                    session.session_files.push(info);
                    session.upload_error.clear();
                }
                info!(file = %filename, file_id = %file_id, "file uploaded");
                self.session
                    .toast(ToastLevel::Success, &format!("'{}' procesado y subido.", filename));
            }
            Err(e) => {
                self.fail_upload(&format!("Error al subir '{}': {}", filename, e)).await;
            }
        }
        Ok(())
    }

    /// Writes the PDF bytes to a scratch file, runs the OCR pipeline over it
    /// and forwards page progress into the session.
    async fn ocr_pass(&self, bytes: &[u8], filename: &str) -> Result<String> {
        let mut scratch = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .context("No se pudo crear el archivo temporal para OCR")?;
        scratch.write_all(bytes)?;
        scratch.flush()?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = self.session.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let line = match event {
                    OcrProgress::Started { filename } => {
                        format!("Iniciando OCR en '{}'...", filename)
                    }
                    OcrProgress::Page { current, total, filename } => {
                        format!("OCR: Pág {}/{} de '{}'", current, total, filename)
                    }
                    OcrProgress::Finished => String::new(),
                };
                session.write().await.ocr_progress = line.clone();
                if !line.is_empty() {
                    info!("{}", line);
                    session.publish(UiEvent::OcrProgress(line));
                }
            }
        });

        let text = self.ocr.extract_text(scratch.path(), filename, &tx).await;
        drop(tx);
        let _ = forwarder.await;
        Ok(text)
    }

    async fn fail_upload(&self, message: &str) {
        error!("{}", message);
        self.session.write().await.upload_error = message.to_string();
        self.session.toast(ToastLevel::Error, message);
    }
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// `demanda.pdf` becomes a `demanda_processed.txt` scratch file holding the
/// extracted text; the file is removed when the guard drops.
fn write_artifact(filename: &str, text: &str) -> Result<tempfile::NamedTempFile> {
    let mut artifact = tempfile::Builder::new()
        .prefix(&format!("{}_processed", file_stem(filename)))
        .suffix(".txt")
        .tempfile()
        .context("No se pudo crear el archivo temporal")?;
    artifact.write_all(text.as_bytes())?;
    artifact.flush()?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_carries_stem_and_txt_suffix() {
        let artifact = write_artifact("demanda.pdf", "contenido").unwrap();
        let name = artifact.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("demanda_processed"));
        assert!(name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(artifact.path()).unwrap(), "contenido");
    }

    #[test]
    fn artifact_without_extension_still_gets_processed_name() {
        let artifact = write_artifact("LICENSE", "texto").unwrap();
        let name = artifact.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("LICENSE_processed"));
    }
}
