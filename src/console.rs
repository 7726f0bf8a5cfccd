//! Console front end: reads lines from stdin, streams replies to stdout.
//!
//! Plain lines are chat turns; lines starting with `/` are commands. Runs
//! until `/quit`, stdin closes, or the `shutdown` token is cancelled (Ctrl-C).
//! A cancelled token also aborts a turn that is still streaming.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::{ChatError, ChatOrchestrator, ContextProvider};
use crate::config::parse_api_keys;
use crate::error::AppError;
use crate::llm::{Generate, Role};

const HELP: &str = "\
Commands:
  /help              Show this help
  /memory            List remembered facts
  /forget            Clear all remembered facts
  /clear             Clear the conversation history
  /keys [k1,k2,...]  Show key count, or replace the API key list
  /model [name]      Show or change the chat model
  /quit              Exit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Memory,
    Forget,
    Clear,
    Keys(Vec<String>),
    Model(Option<&'a str>),
    Quit,
    Say(&'a str),
    Unknown(&'a str),
}

pub fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line);
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "help" | "?" => Command::Help,
        "memory" => Command::Memory,
        "forget" => Command::Forget,
        "clear" => Command::Clear,
        "keys" => Command::Keys(parse_api_keys(arg)),
        "model" => Command::Model((!arg.is_empty()).then_some(arg)),
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other),
    }
}

/// Writes only the unseen suffix of each accumulated text. When the text no
/// longer extends what was printed (a retry restarted from empty), a fresh
/// line is started.
#[derive(Debug, Default)]
pub struct DeltaPrinter {
    printed: String,
}

impl DeltaPrinter {
    pub fn feed(&mut self, accumulated: &str, out: &mut impl Write) {
        let result = match accumulated.strip_prefix(self.printed.as_str()) {
            Some(suffix) => out.write_all(suffix.as_bytes()),
            None => write!(out, "\n[retrying]\n{accumulated}"),
        };
        if let Err(e) = result.and_then(|_| out.flush()) {
            debug!("console write failed: {e}");
        }
        self.printed.clear();
        self.printed.push_str(accumulated);
    }
}

pub async fn run<P: Generate, C: ContextProvider>(
    orchestrator: &mut ChatOrchestrator<P, C>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!("console started");
    println!("─────────────────────────────────");
    println!(" smriti console  (/help, Ctrl-C to quit)");
    println!("─────────────────────────────────");

    for message in orchestrator.history().await? {
        let who = match message.role {
            Role::User => "you",
            Role::Model => "bot",
        };
        let image = if message.image.is_some() { " [image]" } else { "" };
        println!("{who}> {}{image}", message.text.as_deref().unwrap_or(""));
    }

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => line,
        };

        let input = match line {
            Err(e) => {
                warn!("console read error: {e}");
                break;
            }
            Ok(None) => {
                info!("stdin closed");
                break;
            }
            Ok(Some(input)) => input,
        };

        match parse_command(&input) {
            Command::Say("") => continue,
            Command::Say(text) => {
                let mut printer = DeltaPrinter::default();
                let mut stdout = std::io::stdout();
                let result = tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        println!("\n[cancelled]");
                        info!("turn cancelled by shutdown");
                        break;
                    }

                    r = orchestrator.send_turn(text, None, |acc| printer.feed(acc, &mut stdout)) => r,
                };
                match result {
                    Ok(outcome) => {
                        if outcome.text.is_empty() {
                            print!("(no reply)");
                        }
                        println!();
                        debug!(
                            attempts = outcome.attempts,
                            credential_index = outcome.credential_index,
                            memories_stored = outcome.memories_stored,
                            "turn finished"
                        );
                    }
                    Err(ChatError::NoCredentials) => {
                        println!("No API keys configured. Use /keys k1,k2,... to add some.");
                    }
                    Err(e) => println!("\nerror: {e}"),
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Memory => {
                let items = orchestrator.memories().await?;
                if items.is_empty() {
                    println!("(no memories yet)");
                }
                for item in items {
                    println!("- {}", item.text);
                }
            }
            Command::Forget => {
                orchestrator.clear_memories().await?;
                println!("Memory cleared.");
            }
            Command::Clear => {
                orchestrator.clear_history().await?;
                println!("Conversation cleared.");
            }
            Command::Keys(keys) if keys.is_empty() => println!(
                "{} API key(s) loaded; next attempt uses key #{}.",
                orchestrator.credential_count(),
                orchestrator.rotation_pointer() + 1
            ),
            Command::Keys(keys) => {
                orchestrator.set_credentials(keys).await?;
                println!("Saved {} API key(s).", orchestrator.credential_count());
            }
            Command::Model(None) => println!("Model: {}", orchestrator.model().await?),
            Command::Model(Some(name)) => {
                orchestrator.set_model(name).await?;
                println!("Model set to {name}.");
            }
            Command::Quit => break,
            Command::Unknown(name) => println!("Unknown command '/{name}'. Try /help."),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_turn() {
        assert_eq!(parse_command("  hello there "), Command::Say("hello there"));
        assert_eq!(parse_command(""), Command::Say(""));
    }

    #[test]
    fn commands_parse_with_arguments() {
        assert_eq!(parse_command("/memory"), Command::Memory);
        assert_eq!(parse_command("/keys a, b"), Command::Keys(vec!["a".into(), "b".into()]));
        assert_eq!(parse_command("/keys"), Command::Keys(Vec::new()));
        assert_eq!(parse_command("/model gemini-2.5-pro"), Command::Model(Some("gemini-2.5-pro")));
        assert_eq!(parse_command("/model"), Command::Model(None));
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/frobnicate now"), Command::Unknown("frobnicate"));
    }

    #[test]
    fn printer_writes_only_new_suffix() {
        let mut p = DeltaPrinter::default();
        let mut out = Vec::new();
        for acc in ["Hel", "Hello, ", "Hello, world"] {
            p.feed(acc, &mut out);
        }
        assert_eq!(String::from_utf8(out).unwrap(), "Hello, world");
    }

    #[test]
    fn printer_restarts_line_on_retry() {
        let mut p = DeltaPrinter::default();
        let mut out = Vec::new();
        p.feed("partial", &mut out);
        p.feed("Fresh", &mut out);
        p.feed("Fresh start", &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "partial\n[retrying]\nFresh start");
    }
}
