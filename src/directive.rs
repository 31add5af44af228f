//! Upload directive parsing.
//!
//! A chat line may carry `upload <file>.pdf` anywhere in it, in any letter
//! case. The first directive names the document to ingest; the rest of the
//! line (with every directive removed and the ends trimmed) is still sent
//! to the model as the user's message.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error)]
pub enum DirectiveError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

/// An `upload <path>.pdf` request found in user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDirective {
    pub path: PathBuf,
    /// Input with the directive removed; only the outer whitespace is trimmed.
    pub remainder: String,
}

impl UploadDirective {
    /// Fails with [`DirectiveError::FileNotFound`] when the path is not on disk.
    pub fn ensure_exists(&self) -> Result<&Path, DirectiveError> {
        if self.path.exists() {
            Ok(&self.path)
        } else {
            Err(DirectiveError::FileNotFound(self.path.clone()))
        }
    }
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bupload\s+(\S+\.pdf)\b").expect("upload regex is valid"))
}

/// Returns the first upload directive in `input`, if any.
pub fn parse_upload_directive(input: &str) -> Option<UploadDirective> {
    let re = directive_regex();
    let caps = re.captures(input)?;
    let path = PathBuf::from(&caps[1]);
    let remainder = re.replace_all(input, "").trim().to_string();
    Some(UploadDirective { path, remainder })
}
