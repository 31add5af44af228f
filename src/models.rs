//! Core data models used throughout docchat.
//!
//! These types describe the conversation that flows between the terminal,
//! the session file on disk, and the chat API.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role/content pair, serialized exactly as the chat API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// On-disk shape of the session file.
///
/// `chat_history` and `pdf_context` are the field names older clients wrote;
/// they are kept so existing history files stay readable in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub chat_history: Vec<Message>,
    #[serde(default)]
    pub pdf_context: String,
}

/// Every payload shape a session file has been written in.
///
/// Older clients persisted only the bare message array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredSession {
    Legacy(Vec<Message>),
    Current(SessionFile),
}

impl From<StoredSession> for SessionFile {
    fn from(stored: StoredSession) -> Self {
        match stored {
            StoredSession::Current(file) => file,
            StoredSession::Legacy(chat_history) => SessionFile {
                chat_history,
                pdf_context: String::new(),
            },
        }
    }
}
