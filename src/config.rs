//! TOML configuration.
//!
//! Every section is optional; an absent file or section falls back to the
//! defaults below, which reproduce the stock local Ollama setup.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a highly precise AI assistant. \
You always reference uploaded documents for relevant questions. \
If a document is uploaded, assume it contains important user information. \
Always give priority to the answers in chat history rather then searching it online. \
If the answer is not in the document, say 'I couldn't find that information.'";

pub const DEFAULT_DOCUMENT_UPLOADED: &str = "A document has been uploaded. \
Answer ONLY based on this document. \
If the answer is not in the document, say 'I couldn't find that information.'";

pub const DEFAULT_DOCUMENT_REMINDER: &str = "Remember, answer ONLY from the uploaded document. \
If unsure, say 'I couldn't find that information.'";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Unset means the request may block for as long as the model streams.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            model: default_model(),
            timeout_secs: None,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:11500/api/chat".to_string()
}
fn default_model() -> String {
    "mistral".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default = "default_max_doc_length")]
    pub max_doc_length: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            max_doc_length: default_max_doc_length(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("chat_history.json")
}
fn default_max_doc_length() -> usize {
    5000
}
fn default_preview_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    #[serde(default = "default_system")]
    pub system: String,
    #[serde(default = "default_document_uploaded")]
    pub document_uploaded: String,
    #[serde(default = "default_document_reminder")]
    pub document_reminder: String,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: default_system(),
            document_uploaded: default_document_uploaded(),
            document_reminder: default_document_reminder(),
            assistant_name: default_assistant_name(),
        }
    }
}

fn default_system() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
fn default_document_uploaded() -> String {
    DEFAULT_DOCUMENT_UPLOADED.to_string()
}
fn default_document_reminder() -> String {
    DEFAULT_DOCUMENT_REMINDER.to_string()
}
fn default_assistant_name() -> String {
    "Buddy".to_string()
}

/// How uploaded PDFs are turned into text.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// Embedded text layer only.
    #[default]
    Text,
    /// Text layer first, then OCR over rendered pages when it is empty.
    Ocr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub strategy: ExtractionStrategy,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_command: String,
    #[serde(default = "default_tesseract")]
    pub tesseract_command: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategy::default(),
            pdftoppm_command: default_pdftoppm(),
            tesseract_command: default_tesseract(),
            dpi: default_dpi(),
        }
    }
}

fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}
fn default_tesseract() -> String {
    "tesseract".to_string()
}
fn default_dpi() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Program plus arguments that records speech and prints the transcript
    /// on stdout. Speech input is off when unset.
    #[serde(default)]
    pub speech_command: Option<Vec<String>>,
    /// Upper bound on one run of the speech command, capture and
    /// transcription together.
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_secs: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            speech_command: None,
            listen_timeout_secs: default_listen_timeout(),
        }
    }
}

fn default_listen_timeout() -> u64 {
    15
}

impl InputConfig {
    pub fn speech_enabled(&self) -> bool {
        self.speech_command
            .as_ref()
            .is_some_and(|cmd| !cmd.is_empty())
    }
}

/// Loads the config file, or the defaults when `path` does not exist.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.api.url.trim().is_empty() {
        bail!("api.url must not be empty");
    }

    if config.api.model.trim().is_empty() {
        bail!("api.model must not be empty");
    }

    if config.session.max_doc_length == 0 {
        bail!("session.max_doc_length must be > 0");
    }

    if config.api.timeout_secs == Some(0) {
        bail!("api.timeout_secs must be > 0 when set");
    }

    if let Some(cmd) = &config.input.speech_command {
        if cmd.is_empty() {
            bail!("input.speech_command must name a program when set");
        }
    }

    Ok(config)
}
