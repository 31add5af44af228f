//! Text extraction for uploaded PDFs.
//!
//! Two strategies, selected by `[extraction].strategy`:
//! - **text**: the PDF's embedded text layer via `pdf-extract`.
//! - **ocr**: the text layer first; when it is empty or unreadable, pages are
//!   rendered with `pdftoppm` and read back with `tesseract`.
//!
//! Both OCR tools are external programs. Their names are configurable so a
//! wrapper script or an absolute path can stand in for them.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Config, ExtractionConfig, ExtractionStrategy};
use crate::session::truncate_document;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("could not read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("no readable text found in {}", .0.display())]
    NoText(PathBuf),
}

/// Turns a document on disk into plain text.
pub trait DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Builds the extractor named by the config.
pub fn create_extractor(config: &ExtractionConfig) -> Box<dyn DocumentExtractor> {
    match config.strategy {
        ExtractionStrategy::Text => Box::new(PdfTextExtractor),
        ExtractionStrategy::Ocr => Box::new(OcrFallbackExtractor::new(config)),
    }
}

/// Reads the embedded text layer only.
pub struct PdfTextExtractor;

impl DocumentExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = read_file(path)?;
        let text = extract_pdf(&bytes)?;
        non_empty(text, path)
    }
}

/// Text layer first, OCR over rendered pages when that yields nothing.
pub struct OcrFallbackExtractor {
    pdftoppm_command: String,
    tesseract_command: String,
    dpi: u32,
}

impl OcrFallbackExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            pdftoppm_command: config.pdftoppm_command.clone(),
            tesseract_command: config.tesseract_command.clone(),
            dpi: config.dpi,
        }
    }

    fn ocr(&self, path: &Path) -> Result<String, ExtractError> {
        let workdir = tempfile::TempDir::new()
            .map_err(|e| ExtractError::Ocr(format!("failed to create temp dir: {}", e)))?;
        let prefix = workdir.path().join("page");

        let output = Command::new(&self.pdftoppm_command)
            .args(["-r", &self.dpi.to_string(), "-png"])
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                ExtractError::Ocr(format!("failed to run '{}': {}", self.pdftoppm_command, e))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "{} failed: {}",
                self.pdftoppm_command,
                stderr.trim()
            )));
        }

        let pages = rendered_pages(workdir.path())?;
        tracing::debug!(pages = pages.len(), "running OCR over rendered pages");

        let mut text = String::new();
        for page in &pages {
            let output = Command::new(&self.tesseract_command)
                .arg(page)
                .arg("stdout")
                .output()
                .map_err(|e| {
                    ExtractError::Ocr(format!(
                        "failed to run '{}': {}",
                        self.tesseract_command, e
                    ))
                })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ExtractError::Ocr(format!(
                    "{} failed on {}: {}",
                    self.tesseract_command,
                    page.display(),
                    stderr.trim()
                )));
            }
            text.push_str(&String::from_utf8_lossy(&output.stdout));
            text.push('\n');
        }
        Ok(text)
    }
}

impl DocumentExtractor for OcrFallbackExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = read_file(path)?;
        match extract_pdf(&bytes) {
            Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
            Ok(_) => tracing::info!(path = %path.display(), "no text layer, switching to OCR"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "text extraction failed, switching to OCR"
            ),
        }
        eprintln!("📄 No readable text found. Switching to OCR...");
        let text = self.ocr(path)?;
        non_empty(text, path)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn non_empty(text: String, path: &Path) -> Result<String, ExtractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::NoText(path.to_path_buf()));
    }
    Ok(trimmed.to_string())
}

/// PNG pages written by `pdftoppm`, in page order. Page numbers are
/// zero-padded to the width of the page count, so sort numerically.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ExtractError::Ocr(format!("failed to list rendered pages: {}", e)))?;
    let mut pages: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    pages.sort_by_key(|p| {
        p.file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.rsplit('-').next())
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(u32::MAX)
    });
    Ok(pages)
}

/// CLI entry point: extracts `path` with the configured strategy and prints
/// the text an upload would store (the whole text with `full`).
pub fn run_extract(config: &Config, path: &Path, full: bool) -> anyhow::Result<()> {
    let extractor = create_extractor(&config.extraction);
    let text = extractor.extract(path)?;
    if full {
        println!("{}", text);
    } else {
        println!("{}", truncate_document(&text, config.session.max_doc_length));
    }
    eprintln!("extracted {} chars from {}", text.chars().count(), path.display());
    Ok(())
}
