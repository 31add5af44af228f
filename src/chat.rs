//! The interactive chat loop.
//!
//! Each turn: refresh the system prompt, read a line, handle `exit`/`quit`,
//! ingest an uploaded document if the line asks for one, append the user's
//! text, remind the model about the active document, send, append and show
//! the reply. The session is saved after every step that changes it, and a
//! failed save ends the program.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::directive::parse_upload_directive;
use crate::extract::{create_extractor, DocumentExtractor};
use crate::input::{InputSource, SpeechInput, TerminalInput};
use crate::session::{Session, SessionStore};
use crate::transport::{ChatTransport, OllamaTransport};

/// What the loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue,
    Exit,
}

pub struct ChatLoop<'a> {
    store: &'a SessionStore,
    transport: &'a dyn ChatTransport,
    extractor: &'a dyn DocumentExtractor,
    assistant_name: String,
    preview_chars: usize,
}

impl<'a> ChatLoop<'a> {
    pub fn new(
        store: &'a SessionStore,
        transport: &'a dyn ChatTransport,
        extractor: &'a dyn DocumentExtractor,
    ) -> Self {
        Self {
            store,
            transport,
            extractor,
            assistant_name: "Buddy".to_string(),
            preview_chars: 1000,
        }
    }

    pub fn assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    /// Runs turns until `exit`/`quit` or end of input.
    pub fn run(&self, session: &mut Session, input: &mut dyn InputSource) -> Result<()> {
        loop {
            let line = match input.read_input()? {
                Some(line) => line,
                None => {
                    println!();
                    return self.finish(session);
                }
            };
            if self.handle_line(session, &line)? == TurnOutcome::Exit {
                return Ok(());
            }
        }
    }

    /// Handles one line of user input.
    pub fn handle_line(&self, session: &mut Session, line: &str) -> Result<TurnOutcome> {
        self.store.refresh_system_prompt(session);

        let line = line.trim();
        if is_exit_command(line) {
            self.finish(session)?;
            return Ok(TurnOutcome::Exit);
        }

        let mut uploaded = false;
        let message = match parse_upload_directive(line) {
            Some(directive) => {
                let path = match directive.ensure_exists() {
                    Ok(path) => path,
                    Err(e) => {
                        println!("❌ {}. Provide a valid path.", e);
                        return Ok(TurnOutcome::Continue);
                    }
                };
                match self.extractor.extract(path) {
                    Ok(text) => {
                        self.ingest(session, &text)?;
                        uploaded = true;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "document extraction failed"
                        );
                        println!("❌ Error processing PDF: {}", e);
                    }
                }
                directive.remainder
            }
            None => line.to_string(),
        };

        if message.is_empty() && !uploaded {
            return Ok(TurnOutcome::Continue);
        }

        if !message.is_empty() {
            session.append_user_message(message);
            self.save(session)?;
        }

        if self.store.add_document_reminder(session) {
            self.save(session)?;
        }

        match self.transport.send(session.messages()) {
            Ok(reply) => {
                println!("🤖 {}: {}", self.assistant_name, reply.trim());
                session.append_assistant_message(reply);
                self.save(session)?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                println!("❌ {}", e);
            }
        }

        Ok(TurnOutcome::Continue)
    }

    fn ingest(&self, session: &mut Session, text: &str) -> Result<()> {
        println!(
            "📄 Extracted Text (Preview):\n{}",
            preview(text, self.preview_chars)
        );
        let stored = self.store.ingest_document(session, text);
        tracing::debug!(chars = stored.chars().count(), "document context updated");
        self.save(session)
    }

    fn finish(&self, session: &Session) -> Result<()> {
        self.save(session)?;
        println!("Goodbye! 👋");
        Ok(())
    }

    fn save(&self, session: &Session) -> Result<()> {
        self.store.save(session).with_context(|| {
            format!(
                "Failed to save chat history to {}",
                self.store.path().display()
            )
        })
    }
}

pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// CLI entry point: loads the session and runs the loop on the terminal.
pub fn run_chat(config: &Config) -> Result<()> {
    let store = SessionStore::from_config(config);
    let transport =
        OllamaTransport::new(&config.api).with_context(|| "Failed to build HTTP client")?;
    let extractor = create_extractor(&config.extraction);

    let mut session = store.load();
    tracing::debug!(
        path = %store.path().display(),
        messages = session.messages().len(),
        has_document = session.has_document(),
        "session loaded"
    );

    let mut input: Box<dyn InputSource> = match SpeechInput::from_config(&config.input) {
        Some(speech) => Box::new(speech),
        None => Box::new(TerminalInput::stdin()),
    };

    if atty::is(atty::Stream::Stdin) {
        println!(
            "🤖 Chat with {}! Type 'exit' to quit. Type 'upload [filename.pdf]' to analyze a PDF.",
            config.api.model
        );
    }

    ChatLoop::new(&store, &transport, extractor.as_ref())
        .assistant_name(config.prompts.assistant_name.clone())
        .preview_chars(config.session.preview_chars)
        .run(&mut session, input.as_mut())
}
