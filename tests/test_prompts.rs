//! Tests for the shipped prompt templates in config/prompts

use std::fs;
use std::path::Path;

use smriti::chat::AmbientContext;
use smriti::chat::orchestrator::system_instruction;
use smriti::config::{self, Config};
use smriti::llm::{Role, Turn};
use smriti::memory::MemoryPipeline;

fn shipped_config() -> Config {
    config::load_from(Path::new("config/default.toml"), Some("/tmp/smriti-test"), None).unwrap()
}

#[test]
fn test_system_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/system_instruction.txt").unwrap();
    for var in ["assistant_name", "platform", "client", "local_time", "timezone", "memories"] {
        assert!(
            text.contains(&format!("{{{{{var}}}}}")),
            "system_instruction.txt should contain {{{{{var}}}}}"
        );
    }
}

#[test]
fn test_extraction_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/memory_extraction.txt").unwrap();
    assert!(text.contains("{{conversation}}"), "memory_extraction.txt should contain {{conversation}}");
    assert!(text.contains(r#""memory""#), "memory_extraction.txt should name the memory field");
}

#[test]
fn test_retrieval_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/memory_retrieval.txt").unwrap();
    for var in ["memories", "query", "limit"] {
        assert!(
            text.contains(&format!("{{{{{var}}}}}")),
            "memory_retrieval.txt should contain {{{{{var}}}}}"
        );
    }
    assert!(text.contains(r#""relevant_memories""#));
}

#[test]
fn test_default_config_points_at_prompts() {
    let cfg = shipped_config();
    assert_eq!(cfg.chat.prompts_dir, Path::new("config/prompts"));
    assert_eq!(cfg.llm.provider, "gemini");
    assert_eq!(cfg.memory.retrieval_limit, 5);
}

#[test]
fn test_shipped_templates_render_fully() {
    let cfg = shipped_config();
    let ambient = AmbientContext {
        platform: "linux x86_64".into(),
        client: "smriti".into(),
        local_time: "2025-01-01 00:00:00".into(),
        timezone: "UTC".into(),
    };
    let system = system_instruction(&cfg.chat, &ambient, &["likes tea".into()]);
    assert!(!system.contains("{{"), "unrendered placeholder in: {system}");
    assert!(system.contains("likes tea"));

    let pipeline = MemoryPipeline::new(&cfg.memory, &cfg.chat);
    let extraction = pipeline.extraction_prompt(&[Turn::text(Role::User, "hi")]);
    assert!(!extraction.contains("{{"));
    let retrieval = pipeline.retrieval_prompt(&["likes tea".into()], "drink?");
    assert!(!retrieval.contains("{{"));
    assert!(retrieval.contains("Do not return more than 5 memories."));
}
