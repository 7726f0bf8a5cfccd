//! Smriti console entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the LLM provider and open the store
//!   6. Open the chat session (credentials, pointer, greeting)
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Run the console until shutdown

use tokio_util::sync::CancellationToken;
use tracing::info;

use smriti::chat::{ChatOrchestrator, SystemContext};
use smriti::error::AppError;
use smriti::llm::{LlmProvider, providers};
use smriti::{config, console, logger, store};

/// Credential handed to the keyless dummy provider.
const OFFLINE_KEY: &str = "offline";

const USAGE: &str = "\
Usage: smriti [OPTIONS]

Options:
  -h, --help             Print help
  -f, --config <PATH>    Configuration file (default: config/default.toml)
  -v, -vv, -vvv, -vvvv   Increase logging verbosity

Environment:
  SMRITI_API_KEYS        API keys, comma or newline separated
  SMRITI_WORK_DIR        Override [app] work_dir
  SMRITI_LOG_LEVEL       Override [app] log_level";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    verbosity: u8,
    config_path: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Run(CliArgs),
    Help,
}

#[tokio::main]
async fn main() {
    let args = match parse_cli_args(std::env::args().skip(1)) {
        Ok(Cli::Run(args)) => args,
        Ok(Cli::Help) => {
            println!("{USAGE}");
            return;
        }
        Err(msg) => {
            eprintln!("error: {msg}\n\n{USAGE}");
            std::process::exit(2);
        }
    };
    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), AppError> {
    // Optional file; a missing .env is not an error.
    let _ = dotenvy::dotenv();

    let mut config = config::load(args.config_path.as_deref())?;

    let (level, prefer_level) = logger::effective_level(args.verbosity, &config.log_level);
    logger::init(level, prefer_level, config.log_file.as_deref())?;

    info!(
        app_name = %config.app_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %level,
        provider = %config.llm.provider,
        store = config.store.backend.as_str(),
        "config loaded"
    );

    let provider = providers::build(&config.llm)
        .map_err(|e| AppError::Config(format!("llm provider: {e}")))?;
    if matches!(provider, LlmProvider::Dummy(_)) && config.api_keys.is_empty() {
        config.api_keys = vec![OFFLINE_KEY.to_string()];
    }
    info!(provider = provider.name(), "llm provider ready");

    let store = store::open(&config.store)?;
    let mut orchestrator = ChatOrchestrator::open(&config, provider, store, SystemContext).await?;

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received; initiating shutdown");
            on_ctrl_c.cancel();
        }
    });

    console::run(&mut orchestrator, shutdown).await?;
    info!("bye");
    Ok(())
}

fn is_verbosity_flag(flag: &str) -> bool {
    flag.strip_prefix('-')
        .is_some_and(|vs| !vs.is_empty() && vs.bytes().all(|b| b == b'v'))
}

fn parse_cli_args(mut argv: impl Iterator<Item = String>) -> Result<Cli, String> {
    let mut args = CliArgs::default();

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--" => break,
            "-h" | "--help" => return Ok(Cli::Help),
            "-f" | "--config" => {
                let path = argv.next().ok_or("-f/--config requires a path argument")?;
                args.config_path = Some(path);
            }
            "--verbose" => args.verbosity = args.verbosity.saturating_add(1),
            flag if is_verbosity_flag(flag) => {
                let count = u8::try_from(flag.len() - 1).unwrap_or(u8::MAX);
                args.verbosity = args.verbosity.saturating_add(count);
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    Ok(Cli::Run(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, String> {
        parse_cli_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_runs_with_defaults() {
        assert_eq!(parse(&[]), Ok(Cli::Run(CliArgs::default())));
    }

    #[test]
    fn verbosity_flags_accumulate() {
        let Ok(Cli::Run(args)) = parse(&["-vv", "--verbose", "-v"]) else {
            panic!("expected run")
        };
        assert_eq!(args.verbosity, 4);
    }

    #[test]
    fn config_path_is_taken() {
        let Ok(Cli::Run(args)) = parse(&["--config", "alt.toml"]) else {
            panic!("expected run")
        };
        assert_eq!(args.config_path.as_deref(), Some("alt.toml"));
        assert!(parse(&["-f"]).is_err());
    }

    #[test]
    fn help_and_unknown() {
        assert_eq!(parse(&["-v", "--help"]), Ok(Cli::Help));
        assert!(parse(&["--frobnicate"]).unwrap_err().contains("--frobnicate"));
        assert!(parse(&["-"]).is_err());
        assert_eq!(parse(&["--", "--frobnicate"]), Ok(Cli::Run(CliArgs::default())));
    }
}
