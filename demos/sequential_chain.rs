//! Example: a prompt -> model -> parser chain feeding a second chain.
//!
//! Uses `MockChatModel`, so no LLM server is needed.
//!
//! Run with: `cargo run --example sequential_chain`

use llm_runnable::{
    ChatModelUnit, Event, ExecCtx, FnEventHandler, Lambda, MockChatModel, PromptTemplate,
    RunnableExt, Sequence, StrOutputParser,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let model = Arc::new(MockChatModel::new(vec![
        "CRISPR is a gene editing tool adapted from a bacterial immune system.".to_string(),
        "Gene editing, explained: CRISPR cuts DNA where you point it.".to_string(),
    ]));

    // Detailed report, then a one-line summary of it
    let chain = Sequence::builder("report_then_summary")
        .then(PromptTemplate::new("Write a detailed report on {topic}."))
        .then(ChatModelUnit::new(model.clone()).named("writer"))
        .then(StrOutputParser::new())
        .then(PromptTemplate::new("Summarize the following text in one line:\n{text}"))
        .then(ChatModelUnit::new(model.clone()).named("summarizer"))
        .then(StrOutputParser::new())
        .then(Lambda::map("word_count", |v| {
            let text = v.as_str().unwrap_or_default();
            json!({ "summary": text, "words": text.split_whitespace().count() })
        }))
        .build()?;

    println!("Graph:\n{}", chain.graph());

    let ctx = ExecCtx::builder()
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            if let Event::RunEnd { name, elapsed_ms, .. } = event {
                println!("  finished {name} in {elapsed_ms}ms");
            }
        })))
        .build();

    let output = chain.run(&ctx, json!({"topic": "CRISPR"})).await?;
    println!("\nSummary: {}", output["summary"]);
    println!("Words: {}", output["words"]);
    println!("Model calls: {}", model.calls());

    Ok(())
}
