//! Chat API transport.
//!
//! [`OllamaTransport`] posts the whole conversation to an Ollama-style
//! `/api/chat` endpoint and reads the newline-delimited JSON stream it sends
//! back. Each line may carry a `message.content` fragment; fragments are
//! concatenated in arrival order into the assistant's reply.
//!
//! Lines that are not valid JSON are skipped with a warning and reading
//! continues. The request has no timeout unless `api.timeout_secs` is set.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;

use crate::config::ApiConfig;
use crate::models::Message;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to chat API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed reading chat API response: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends a conversation and returns the assistant's full reply.
pub trait ChatTransport {
    fn send(&self, messages: &[Message]) -> Result<String, TransportError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct StreamFragment {
    #[serde(default)]
    message: Option<FragmentMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct FragmentMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OllamaTransport {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl OllamaTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
        })
    }
}

impl ChatTransport for OllamaTransport {
    fn send(&self, messages: &[Message]) -> Result<String, TransportError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
        };
        tracing::debug!(url = %self.url, messages = messages.len(), "sending chat request");

        let response = self.client.post(&self.url).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(assemble_stream(BufReader::new(response))?)
    }
}

/// Concatenates the `message.content` fragments of an NDJSON stream.
pub fn assemble_stream<R: BufRead>(mut reader: R) -> std::io::Result<String> {
    let mut reply = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<StreamFragment>(line) {
            Ok(fragment) => {
                if let Some(err) = fragment.error {
                    tracing::warn!(error = %err, "chat API reported an error in the stream");
                }
                if let Some(content) = fragment.message.and_then(|m| m.content) {
                    reply.push_str(&content);
                }
            }
            Err(e) => {
                tracing::warn!(chunk = %line, error = %e, "skipping invalid JSON chunk");
            }
        }
    }
    Ok(reply)
}
