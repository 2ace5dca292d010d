// src/ingest/extract.rs
// Direct text extraction for PDF, DOCX and TXT uploads. PDF extraction here
// is the cheap pass; scanned documents get escalated to OCR by the caller.

use std::io::{Cursor, Read};

use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::info;

/// Below this many characters of extracted text, a PDF is treated as scanned.
pub const OCR_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    Txt,
}

impl FileFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".docx") {
            Some(Self::Docx)
        } else if lower.ends_with(".txt") {
            Some(Self::Txt)
        } else {
            None
        }
    }
}

/// Extracts text from uploaded bytes according to the filename's extension.
/// Returns `None` for unsupported formats. Blocking; call from
/// `spawn_blocking`.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<Option<String>> {
    let Some(format) = FileFormat::from_filename(filename) else {
        return Ok(None);
    };
    info!(file = %filename, ?format, "extracting text");
    let text = match format {
        FileFormat::Pdf => pdf_text(bytes)?,
        FileFormat::Docx => docx_text(bytes)?,
        FileFormat::Txt => String::from_utf8_lossy(bytes).into_owned(),
    };
    Ok(Some(text.trim().to_string()))
}

/// A PDF whose text layer came out nearly empty needs the OCR pass.
pub fn needs_ocr(filename: &str, text: &str) -> bool {
    FileFormat::from_filename(filename) == Some(FileFormat::Pdf)
        && text.trim().chars().count() < OCR_THRESHOLD
}

fn pdf_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).context("Failed to read PDF text layer")
}

/// DOCX stores paragraphs as `<w:p>` elements with runs of `<w:t>` text.
fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Not a valid DOCX archive")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX is missing word/document.xml")?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => out.push_str(&t.unescape()?),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => bail!("Malformed DOCX document XML: {}", e),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn extension_detection_is_case_insensitive() {
        assert_eq!(FileFormat::from_filename("Demanda.PDF"), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_filename("acta.docx"), Some(FileFormat::Docx));
        assert_eq!(FileFormat::from_filename("notas.TXT"), Some(FileFormat::Txt));
        assert_eq!(FileFormat::from_filename("foto.png"), None);
    }

    #[test]
    fn unsupported_format_returns_none() {
        assert!(extract_text(b"...", "imagen.jpg").unwrap().is_none());
    }

    #[test]
    fn txt_is_decoded_lossily_and_trimmed() {
        let text = extract_text(b"  hola mundo \xff\n", "notas.txt").unwrap().unwrap();
        assert_eq!(text, "hola mundo \u{fffd}");
    }

    #[test]
    fn docx_paragraphs_join_with_newlines() {
        let xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Primer p&#225;rrafo</w:t></w:r></w:p>
                <w:p><w:r><w:t>Segundo</w:t></w:r><w:r><w:t> p&#225;rrafo</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let text = extract_text(&docx_bytes(xml), "acta.docx").unwrap().unwrap();
        assert_eq!(text, "Primer párrafo\nSegundo párrafo");
    }

    #[test]
    fn short_pdf_text_triggers_ocr() {
        assert!(needs_ocr("escaneo.pdf", "   \n"));
        assert!(needs_ocr("escaneo.pdf", &"x".repeat(OCR_THRESHOLD - 1)));
        assert!(!needs_ocr("escaneo.pdf", &"x".repeat(OCR_THRESHOLD)));
        // Only PDFs escalate; a short TXT is taken as-is.
        assert!(!needs_ocr("notas.txt", "corto"));
    }
}
