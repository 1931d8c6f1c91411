//! Example: a JSON-mode chain against a local Ollama server.
//!
//! Requires Ollama on http://localhost:11434 with `llama3.2:3b` pulled.
//!
//! Run with: `cargo run --example ollama_chain`

use llm_runnable::{
    ChatModelUnit, ExecCtx, JsonOutputParser, ModelConfig, OllamaChatModel, PromptTemplate,
    RunnableExt, Sequence,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Analysis {
    summary: String,
    key_points: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let model = OllamaChatModel::new("llama3.2:3b")
        .with_config(ModelConfig::default().with_temperature(0.2).with_json_mode(true));
    let parser = JsonOutputParser::new().with_required_keys(&["summary", "key_points"]);

    let chain = Sequence::builder("analyze")
        .then(
            PromptTemplate::new("Analyze the following text.\n\n{text}\n\n{format_instruction}")
                .with_partial("format_instruction", parser.format_instructions()),
        )
        .then(ChatModelUnit::new(Arc::new(model)))
        .then(parser)
        .build()?;

    let ctx = ExecCtx::new();
    let analysis: Analysis = chain
        .run_as(
            &ctx,
            json!("Rust is a systems programming language focused on safety and performance."),
        )
        .await?;

    println!("Summary: {}", analysis.summary);
    for point in &analysis.key_points {
        println!("  - {point}");
    }

    Ok(())
}
