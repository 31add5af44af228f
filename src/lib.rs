//! # docchat
//!
//! A terminal chat client for locally hosted language models that can ground
//! its answers in an uploaded PDF and keeps the conversation on disk between
//! runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │  Input   │──▶│ Chat loop │──▶│  Transport   │──▶ /api/chat (NDJSON)
//! │ typed/🎤 │   │           │   └──────────────┘
//! └──────────┘   │           │   ┌──────────────┐
//!                │           │──▶│  Extractor   │──▶ pdf-extract / OCR
//!                └─────┬─────┘   └──────────────┘
//!                      ▼
//!               ┌──────────────┐
//!               │ SessionStore │──▶ chat_history.json
//!               └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Messages and the session file schema |
//! | [`session`] | Session load/save, document context, truncation |
//! | [`directive`] | `upload <file>.pdf` parsing |
//! | [`extract`] | PDF text extraction with OCR fallback |
//! | [`transport`] | Streaming chat API client |
//! | [`input`] | Typed and spoken user input |
//! | [`chat`] | The interactive loop |
//! | [`history`] | Printing the saved conversation |

pub mod chat;
pub mod config;
pub mod directive;
pub mod extract;
pub mod history;
pub mod input;
pub mod models;
pub mod session;
pub mod transport;
