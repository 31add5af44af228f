//! `docchat history`: print the persisted conversation.

use anyhow::Result;

use crate::config::Config;
use crate::session::SessionStore;

/// Width of the per-message content shown in the listing.
const SNIPPET_CHARS: usize = 120;

pub fn run_history(config: &Config, json: bool) -> Result<()> {
    let store = SessionStore::from_config(config);
    let session = store.load();

    if json {
        let payload = serde_json::json!({
            "chat_history": session.messages(),
            "pdf_context": session.document_context(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("--- Session ---");
    println!("file:         {}", store.path().display());
    println!("messages:     {}", session.messages().len());
    if session.has_document() {
        println!(
            "document:     {} chars",
            session.document_context().chars().count()
        );
    } else {
        println!("document:     (none)");
    }
    println!();

    println!("--- Messages ---");
    for (i, message) in session.messages().iter().enumerate() {
        println!(
            "[{}] {:<9} {}",
            i,
            message.role.as_str(),
            snippet(&message.content)
        );
    }

    Ok(())
}

fn snippet(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        return flat;
    }
    let clipped: String = flat.chars().take(SNIPPET_CHARS).collect();
    format!("{}…", clipped)
}
