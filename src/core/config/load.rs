//! Configuration loading with env-var overrides.
//!
//! A config file may name a parent with `[meta] base = "..."`; the chain is
//! read root first and each child table is layered over its parent. Then
//! `SMRITI_WORK_DIR` and `SMRITI_LOG_LEVEL` are applied.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Env var holding the credential list (comma or newline separated).
pub const API_KEYS_ENV: &str = "SMRITI_API_KEYS";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Layer `overlay` onto `base` in place. Nested tables merge key by key; any
/// other value in the overlay replaces the base value.
fn layer_table(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let toml::Value::Table(over) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(toml::Value::Table(inner)) = base.get_mut(&key) {
            layer_table(inner, over);
            continue;
        }
        base.insert(key, toml::Value::Table(over));
    }
}

fn parse_file(path: &Path) -> Result<toml::Table, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str::<toml::Table>(&text)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))
}

/// Where `[meta] base` points, resolved against the including file.
fn base_of(path: &Path, table: &toml::Table) -> Option<PathBuf> {
    let base = table.get("meta")?.get("base")?.as_str()?;
    let base = Path::new(base);
    Some(if base.is_absolute() {
        base.to_path_buf()
    } else {
        path.parent().unwrap_or(Path::new(".")).join(base)
    })
}

/// Read `path` and every ancestor it names, then fold them into one table.
fn read_chain(path: &Path) -> Result<toml::Table, AppError> {
    let mut seen: Vec<PathBuf> = Vec::new();
    let mut chain: Vec<toml::Table> = Vec::new();
    let mut next = Some(path.to_path_buf());

    while let Some(current) = next {
        let id = current.canonicalize().unwrap_or_else(|_| current.clone());
        if seen.contains(&id) {
            return Err(AppError::Config(format!(
                "circular base reference detected at: {}",
                current.display()
            )));
        }
        seen.push(id);

        let table = parse_file(&current)?;
        next = base_of(&current, &table);
        chain.push(table);
    }

    let mut merged = toml::Table::new();
    for table in chain.into_iter().rev() {
        layer_table(&mut merged, table);
    }
    Ok(merged)
}

/// Load config from `config_path`, else `config/default.toml`, else built-in
/// defaults; then apply env-var overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir = env::var("SMRITI_WORK_DIR").ok();
    let log_level = env::var("SMRITI_LOG_LEVEL").ok();

    let path = match config_path {
        Some(p) => Some(PathBuf::from(p)),
        None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };
    match path {
        Some(path) => load_from(&path, work_dir.as_deref(), log_level.as_deref()),
        None => resolve(RawConfig::builtin(), work_dir.as_deref(), log_level.as_deref()),
    }
}

/// Load from an explicit path with explicit overrides. Tests call this
/// directly instead of mutating the process environment.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged = read_chain(path).map_err(|e| config_err(path, e))?;
    let parsed = RawConfig::deserialize(toml::Value::Table(merged)).map_err(|e| config_err(path, e))?;

    resolve(parsed, work_dir_override, log_level_override)
}

fn config_err(path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::Config(format!("config error in {}: {e}", path.display()))
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let RawConfig { app, chat, llm, memory, store } = parsed;

    let work_dir = expand_home(work_dir_override.unwrap_or(&app.work_dir));
    let log_level = log_level_override.map_or(app.log_level, str::to_string);
    let log_file = app.log_file.map(|f| resolve_under(&work_dir, &f));

    let backend = StoreBackend::parse(&store.backend)
        .ok_or_else(|| AppError::Config(format!("unknown store backend: {}", store.backend)))?;
    let store_dir = match store.dir {
        Some(d) => resolve_under(&work_dir, &d),
        None => work_dir.join("store"),
    };

    if memory.retrieval_limit == 0 {
        return Err(AppError::Config("memory.retrieval_limit must be at least 1".into()));
    }

    Ok(Config {
        app_name: app.name,
        work_dir,
        log_level,
        log_file,
        chat: ChatConfig {
            assistant_name: chat.assistant_name,
            default_model: chat.default_model,
            greeting: chat.greeting,
            prompts_dir: PathBuf::from(chat.prompts_dir),
        },
        llm: LlmConfig {
            provider: llm.provider,
            gemini: GeminiConfig {
                api_base_url: llm.gemini.api_base_url,
                timeout_seconds: llm.gemini.timeout_seconds,
            },
            openai: OpenAiConfig {
                api_base_url: llm.openai.api_base_url,
                temperature: llm.openai.temperature,
                timeout_seconds: llm.openai.timeout_seconds,
            },
        },
        memory: MemoryConfig {
            agent_model: memory.agent_model,
            retrieval_limit: memory.retrieval_limit,
            extraction_enabled: memory.extraction_enabled,
        },
        store: StoreConfig { backend, dir: store_dir },
        api_keys: env::var(API_KEYS_ENV)
            .map(|v| parse_api_keys(&v))
            .unwrap_or_default(),
    })
}

/// Split a credential list on commas and newlines, dropping blanks.
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_under(work_dir: &Path, path: &str) -> PathBuf {
    let p = expand_home(path);
    if p.is_absolute() { p } else { work_dir.join(p) }
}

/// Expand `~` or a leading `~/` to the home directory. Anything else, or a
/// host without a home directory, is returned as-is.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path {
        "~" => "",
        p => match p.strip_prefix("~/") {
            Some(rest) => rest,
            None => return PathBuf::from(p),
        },
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}
