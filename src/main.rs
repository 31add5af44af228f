//! # docchat CLI
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat` / `docchat chat` | Start the interactive chat loop |
//! | `docchat history` | Print the saved conversation |
//! | `docchat extract <file.pdf>` | Show the text an upload of the file would use |
//! | `docchat completions <shell>` | Print shell completions |
//!
//! Inside the chat loop, `upload <file>.pdf` anywhere in a line makes that
//! document the conversation's context; `exit` or `quit` saves and leaves.

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docchat::{chat, config, extract, history};

/// docchat: chat with a local language model about your PDFs.
///
/// Settings are read from a TOML file; when it does not exist the built-in
/// defaults (Ollama on localhost:11500, model `mistral`) are used.
#[derive(Parser)]
#[command(name = "docchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    /// Log debug diagnostics to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat loop (the default).
    Chat,

    /// Print the saved conversation.
    History {
        /// Print the session file's JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Extract a PDF with the configured strategy and print its text.
    ///
    /// Output is truncated exactly as an upload would store it.
    Extract {
        /// Path to the PDF.
        path: PathBuf,

        /// Print the whole text instead of the stored, truncated form.
        #[arg(long)]
        full: bool,
    },

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("docchat=debug,warn")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "docchat", &mut std::io::stdout());
        }
        Commands::Chat => chat::run_chat(&config::load_or_default(&cli.config)?)?,
        Commands::History { json } => {
            history::run_history(&config::load_or_default(&cli.config)?, json)?
        }
        Commands::Extract { path, full } => {
            extract::run_extract(&config::load_or_default(&cli.config)?, &path, full)?
        }
    }

    Ok(())
}
