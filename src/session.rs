//! Session persistence and document-context merging.
//!
//! A [`Session`] is the whole conversational state: the ordered message list
//! and the text of the most recently uploaded document. [`SessionStore`] owns
//! the process-side policy around it (canonical system prompt, truncation
//! limit, document prompts) and the backing file.
//!
//! # File format
//!
//! ```json
//! {
//!     "chat_history": [ { "role": "system", "content": "..." } ],
//!     "pdf_context": "..."
//! }
//! ```
//!
//! A file holding only the message array is read as a session with no
//! document context. Unreadable or malformed files yield a fresh session.
//!
//! # Durability
//!
//! [`SessionStore::save`] writes a temp file in the target directory, syncs
//! it, then renames it over the target, so a reader never observes a
//! half-written session and a completed save survives a crash.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::{Message, Role, SessionFile, StoredSession};

/// Appended to document text clipped by [`truncate_document`].
pub const TRUNCATION_MARKER: &str = "...\n[Document truncated]";

/// Prefix of the user message that carries an uploaded document.
pub const DOCUMENT_PREFIX: &str = "Document Content:\n";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write session file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The conversation plus the active document context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    messages: Vec<Message>,
    document_context: String,
}

impl Session {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn document_context(&self) -> &str {
        &self.document_context
    }

    pub fn has_document(&self) -> bool {
        !self.document_context.is_empty()
    }

    pub fn append_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn append_assistant_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    fn append_system_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::system(text));
    }
}

/// Prompts the store injects into a session. These belong to the running
/// process, never to the persisted data.
#[derive(Debug, Clone)]
pub struct SessionPrompts {
    pub system: String,
    pub document_uploaded: String,
    pub document_reminder: String,
}

pub struct SessionStore {
    path: PathBuf,
    prompts: SessionPrompts,
    max_doc_length: usize,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, prompts: SessionPrompts, max_doc_length: usize) -> Self {
        Self {
            path: path.into(),
            prompts,
            max_doc_length,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.session.history_path.clone(),
            SessionPrompts {
                system: config.prompts.system.clone(),
                document_uploaded: config.prompts.document_uploaded.clone(),
                document_reminder: config.prompts.document_reminder.clone(),
            },
            config.session.max_doc_length,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the session file, falling back to a fresh session when it is
    /// missing or malformed. The canonical system prompt always ends up first.
    pub fn load(&self) -> Session {
        let file = match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<StoredSession>(&content) {
                Ok(stored) => SessionFile::from(stored),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "session file is malformed, starting a fresh session"
                    );
                    SessionFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionFile::default(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "session file is unreadable, starting a fresh session"
                );
                SessionFile::default()
            }
        };

        let mut session = Session {
            messages: file.chat_history,
            document_context: file.pdf_context,
        };
        self.refresh_system_prompt(&mut session);
        session
    }

    /// Puts the canonical system prompt at `messages[0]`.
    ///
    /// A leading system message is overwritten; any other leading message is
    /// kept and the prompt is inserted before it.
    pub fn refresh_system_prompt(&self, session: &mut Session) {
        let leads_with_system = session
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System);
        if leads_with_system {
            session.messages[0].content.clone_from(&self.prompts.system);
        } else {
            session
                .messages
                .insert(0, Message::system(self.prompts.system.clone()));
        }
    }

    /// Makes `raw_text` the session's document context and announces it to
    /// the model. Returns the stored (possibly truncated) text.
    pub fn ingest_document<'s>(&self, session: &'s mut Session, raw_text: &str) -> &'s str {
        let text = truncate_document(raw_text, self.max_doc_length);
        session.append_system_message(self.prompts.document_uploaded.clone());
        session.append_user_message(format!("{}{}", DOCUMENT_PREFIX, text));
        session.document_context = text;
        &session.document_context
    }

    /// Appends the document-grounding reminder when a document is active.
    pub fn add_document_reminder(&self, session: &mut Session) -> bool {
        if !session.has_document() {
            return false;
        }
        session.append_system_message(self.prompts.document_reminder.clone());
        true
    }

    /// Atomically replaces the session file with the current state.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let bytes = serialize_session(session)?;
        let io_err = |source: std::io::Error| SessionError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        if cfg!(unix) {
            std::fs::File::open(&dir)
                .and_then(|d| d.sync_all())
                .map_err(io_err)?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct SessionFileRef<'a> {
    chat_history: &'a [Message],
    pdf_context: &'a str,
}

/// Four-space indented JSON, the layout existing history files use.
fn serialize_session(session: &Session) -> Result<Vec<u8>, serde_json::Error> {
    let payload = SessionFileRef {
        chat_history: &session.messages,
        pdf_context: &session.document_context,
    };
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    payload.serialize(&mut ser)?;
    Ok(buf)
}

/// Clips `text` to `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was cut. Text at or under the limit is returned unchanged.
pub fn truncate_document(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prompts() -> SessionPrompts {
        SessionPrompts {
            system: "canonical system".to_string(),
            document_uploaded: "doc uploaded".to_string(),
            document_reminder: "doc reminder".to_string(),
        }
    }

    fn store_in(tmp: &TempDir) -> SessionStore {
        SessionStore::new(tmp.path().join("chat_history.json"), prompts(), 10)
    }

    #[test]
    fn missing_file_gives_fresh_session() {
        let tmp = TempDir::new().unwrap();
        let session = store_in(&tmp).load();
        assert_eq!(session.messages(), &[Message::system("canonical system")]);
        assert_eq!(session.document_context(), "");
    }

    #[test]
    fn malformed_file_gives_fresh_session() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.path(), "{ not json").unwrap();
        let session = store.load();
        assert_eq!(session.messages().len(), 1);
        assert!(!session.has_document());
    }

    #[test]
    fn wrong_shape_gives_fresh_session() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.path(), r#""just a string""#).unwrap();
        assert_eq!(store.load().messages().len(), 1);
    }

    #[test]
    fn load_overwrites_stale_system_prompt() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(
            store.path(),
            r#"{"chat_history":[{"role":"system","content":"old prompt"},{"role":"user","content":"hi"}],"pdf_context":"ctx"}"#,
        )
        .unwrap();
        let session = store.load();
        assert_eq!(
            session.messages(),
            &[Message::system("canonical system"), Message::user("hi")]
        );
        assert_eq!(session.document_context(), "ctx");
    }

    #[test]
    fn load_inserts_prompt_before_non_system_first_entry() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.path(), r#"[{"role":"user","content":"hi"}]"#).unwrap();
        let session = store.load();
        assert_eq!(
            session.messages(),
            &[Message::system("canonical system"), Message::user("hi")]
        );
        assert!(!session.has_document());
    }

    #[test]
    fn reload_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut session = store.load();
        session.append_user_message("hello");
        store.ingest_document(&mut session, "some document text");
        store.save(&session).unwrap();

        let first = store.load();
        store.save(&first).unwrap();
        let bytes_a = std::fs::read(store.path()).unwrap();

        let second = store.load();
        store.save(&second).unwrap();
        let bytes_b = std::fs::read(store.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn save_writes_expected_shape() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut session = store.load();
        session.append_user_message("hello");
        store.save(&session).unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("{\n    \"chat_history\": ["));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["chat_history"][1]["role"], "user");
        assert_eq!(value["chat_history"][1]["content"], "hello");
        assert_eq!(value["pdf_context"], "");

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "temp file left behind: {:?}", leftovers);
    }

    #[test]
    fn save_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join("nested/dir/history.json"), prompts(), 10);
        store.save(&store.load()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn save_error_keeps_os_error_as_source_only() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::create_dir_all(store.path()).unwrap();

        let err = store.save(&store.load()).unwrap_err();
        let source = std::error::Error::source(&err).expect("io source").to_string();
        assert!(matches!(err, SessionError::Io { .. }));
        assert!(!err.to_string().contains(&source), "message repeats source: {}", err);
    }

    #[test]
    fn ingest_appends_system_and_document_messages() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut session = store.load();
        let stored = store.ingest_document(&mut session, "short").to_string();

        assert_eq!(stored, "short");
        assert_eq!(session.document_context(), "short");
        assert_eq!(
            &session.messages()[1..],
            &[
                Message::system("doc uploaded"),
                Message::user("Document Content:\nshort"),
            ]
        );
    }

    #[test]
    fn ingest_replaces_previous_context() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut session = store.load();
        store.ingest_document(&mut session, "first");
        store.ingest_document(&mut session, "second");
        assert_eq!(session.document_context(), "second");
        assert_eq!(session.messages().len(), 5);
    }

    #[test]
    fn ingest_truncates_long_documents() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut session = store.load();
        store.ingest_document(&mut session, "abcdefghijKLMNOP");
        assert_eq!(
            session.document_context(),
            format!("abcdefghij{}", TRUNCATION_MARKER)
        );
    }

    #[test]
    fn reminder_only_with_document() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut session = store.load();
        assert!(!store.add_document_reminder(&mut session));
        assert_eq!(session.messages().len(), 1);

        store.ingest_document(&mut session, "doc");
        assert!(store.add_document_reminder(&mut session));
        assert_eq!(
            session.messages().last(),
            Some(&Message::system("doc reminder"))
        );
    }

    #[test]
    fn truncate_keeps_text_at_limit() {
        assert_eq!(truncate_document("12345", 5), "12345");
        assert_eq!(truncate_document("1234", 5), "1234");
        assert_eq!(truncate_document("", 5), "");
    }

    #[test]
    fn truncate_clips_to_exact_char_count() {
        let long = "x".repeat(5001);
        let out = truncate_document(&long, 5000);
        assert_eq!(out.len(), 5000 + TRUNCATION_MARKER.len());
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let out = truncate_document("ééééé", 3);
        assert_eq!(out, format!("ééé{}", TRUNCATION_MARKER));
    }
}
