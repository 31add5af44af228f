//! Where user turns come from.
//!
//! [`TerminalInput`] reads typed lines. [`SpeechInput`] adds voice: an empty
//! typed line runs the configured transcription command and uses whatever
//! it prints. Recognition itself is the command's business; this module
//! only bounds how long it may take and falls back to typing when it fails.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Read, Write};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::InputConfig;

/// Produces one user turn at a time. `Ok(None)` means input is exhausted.
pub trait InputSource {
    fn read_input(&mut self) -> Result<Option<String>>;
}

pub struct TerminalInput<R> {
    reader: R,
    prompt: String,
}

impl TerminalInput<std::io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(std::io::stdin().lock(), "You: ")
    }
}

impl<R: BufRead> TerminalInput<R> {
    pub fn new(reader: R, prompt: impl Into<String>) -> Self {
        Self {
            reader,
            prompt: prompt.into(),
        }
    }

    fn prompt_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead> InputSource for TerminalInput<R> {
    fn read_input(&mut self) -> Result<Option<String>> {
        let prompt = self.prompt.clone();
        self.prompt_line(&prompt)
    }
}

/// Typed input with a spoken fallback on an empty line.
pub struct SpeechInput<R> {
    terminal: TerminalInput<R>,
    command: Vec<String>,
    listen_timeout: Duration,
}

impl SpeechInput<std::io::StdinLock<'static>> {
    /// `None` when the config does not enable speech.
    pub fn from_config(config: &InputConfig) -> Option<Self> {
        if !config.speech_enabled() {
            return None;
        }
        let command = config.speech_command.clone()?;
        Some(Self::new(
            std::io::stdin().lock(),
            command,
            Duration::from_secs(config.listen_timeout_secs),
        ))
    }
}

impl<R: BufRead> SpeechInput<R> {
    pub fn new(reader: R, command: Vec<String>, listen_timeout: Duration) -> Self {
        Self {
            terminal: TerminalInput::new(reader, "Type your message (or press Enter to speak): "),
            command,
            listen_timeout,
        }
    }

    /// Runs the transcription command and returns its trimmed stdout.
    fn transcribe(&self) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .context("speech command is empty")?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start speech command '{}'", program))?;

        // Drained concurrently; a full stderr pipe would otherwise stall the
        // command until the deadline.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.listen_timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                bail!(
                    "speech command timed out after {}s",
                    self.listen_timeout.as_secs_f32()
                );
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        let stdout = join_output(stdout);
        if !status.success() {
            bail!("speech command failed ({}): {}", status, join_output(stderr).trim());
        }
        Ok(stdout.trim().to_string())
    }
}

fn drain<P: Read + Send + 'static>(pipe: Option<P>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

impl<R: BufRead> InputSource for SpeechInput<R> {
    fn read_input(&mut self) -> Result<Option<String>> {
        println!("\n🗣️ Press [Enter] to speak or type your message below.");
        let typed = match self.terminal.read_input()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if !typed.is_empty() {
            return Ok(Some(typed));
        }

        println!("🎤 Speak now...");
        match self.transcribe() {
            Ok(text) if !text.is_empty() => {
                println!("🗣️ You said: {}", text);
                return Ok(Some(text));
            }
            Ok(_) => println!("❌ Could not understand audio. Please type your message."),
            Err(e) => {
                tracing::warn!(error = %e, "speech transcription failed");
                println!("❌ Error with speech recognition. Please type your message.");
            }
        }
        self.terminal.prompt_line("Type here: ")
    }
}
