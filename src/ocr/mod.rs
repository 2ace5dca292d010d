//! OCR fallback for scanned PDFs
//!
//! Rasterizes pages with `pdftoppm` and recognizes them with `tesseract`,
//! reporting per-page progress over a channel. Any failure degrades to an
//! empty result so the caller can surface a single upload error.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Progress events emitted while a PDF is being recognized.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrProgress {
    Started { filename: String },
    Page { current: usize, total: usize, filename: String },
    Finished,
}

/// Recognizes text in a single rasterized page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String>;
}

/// `tesseract <image> stdout -l <languages>`
pub struct TesseractEngine {
    languages: String,
}

impl TesseractEngine {
    pub fn new(languages: &str) -> Self {
        Self { languages: languages.to_string() }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &Path) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run tesseract")?;

        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Renders PDF pages to PNG via `pdftoppm`.
pub struct PdfRasterizer {
    dpi: u32,
}

impl PdfRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    /// Renders every page into `out_dir`, returning the images in page order.
    pub async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let prefix = out_dir.join("page");
        let output = Command::new("pdftoppm")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(&prefix)
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run pdftoppm")?;

        if !output.status.success() {
            bail!(
                "pdftoppm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "png") {
                pages.push(path);
            }
        }
        Ok(sort_pages(pages))
    }
}

/// pdftoppm zero-pads page numbers within a run, so filename order is page
/// order.
fn sort_pages(mut pages: Vec<PathBuf>) -> Vec<PathBuf> {
    pages.sort();
    pages
}

pub struct OcrPipeline {
    rasterizer: PdfRasterizer,
    engine: Box<dyn OcrEngine>,
}

impl OcrPipeline {
    pub fn new(dpi: u32, engine: Box<dyn OcrEngine>) -> Self {
        Self { rasterizer: PdfRasterizer::new(dpi), engine }
    }

    /// Runs the full OCR pass over `pdf`. Returns the joined page text, or an
    /// empty string when rasterization or recognition fails.
    pub async fn extract_text(
        &self,
        pdf: &Path,
        filename: &str,
        progress: &mpsc::UnboundedSender<OcrProgress>,
    ) -> String {
        let _ = progress.send(OcrProgress::Started { filename: filename.to_string() });
        let text = self.run(pdf, filename, progress).await.unwrap_or_else(|e| {
            error!(file = %filename, error = %e, "OCR failed");
            String::new()
        });
        let _ = progress.send(OcrProgress::Finished);
        text
    }

    async fn run(
        &self,
        pdf: &Path,
        filename: &str,
        progress: &mpsc::UnboundedSender<OcrProgress>,
    ) -> Result<String> {
        let workdir = tempfile::tempdir().context("Failed to create OCR workdir")?;
        let pages = self.rasterizer.rasterize(pdf, workdir.path()).await?;
        let total = pages.len();
        info!(file = %filename, pages = total, "starting OCR");

        let mut parts = Vec::with_capacity(total);
        for (i, page) in pages.iter().enumerate() {
            let _ = progress.send(OcrProgress::Page {
                current: i + 1,
                total,
                filename: filename.to_string(),
            });
            parts.push(self.engine.recognize(page).await?);
        }
        Ok(parts.join("\n"))
    }
}
