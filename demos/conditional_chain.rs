//! Example: classify feedback, then route it to a matching reply chain.
//!
//! Run with: `cargo run --example conditional_chain`

use llm_runnable::{
    Branch, ChatModelUnit, ExecCtx, JsonOutputParser, Lambda, MockChatModel, Parallel,
    Passthrough, PromptTemplate, RunnableExt, Sequence, StrOutputParser,
};
use serde_json::json;
use std::sync::Arc;

fn reply(name: &str, template: &str) -> Result<Sequence, llm_runnable::RunnableError> {
    Sequence::builder(name)
        .then(PromptTemplate::new(template))
        .then(ChatModelUnit::new(Arc::new(MockChatModel::echo())))
        .then(StrOutputParser::new())
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = Arc::new(MockChatModel::new(vec![
        r#"{"sentiment": "positive"}"#.to_string(),
        "```json\n{\"sentiment\": \"negative\"}\n```".to_string(),
        r#"{"sentiment": "neutral"}"#.to_string(),
    ]));
    let parser = JsonOutputParser::new().with_required_keys(&["sentiment"]);

    let classify = Sequence::builder("classify")
        .then(
            PromptTemplate::new(
                "Classify the sentiment of this feedback as positive or negative:\n{feedback}\n{format_instruction}",
            )
            .with_partial("format_instruction", parser.format_instructions()),
        )
        .then(ChatModelUnit::new(classifier).named("classifier"))
        .then(parser)
        .then(Lambda::new("sentiment", |v| Ok(v["sentiment"].clone())))
        .build()?;

    let chain = Sequence::builder("feedback")
        .then(
            Parallel::builder("annotate")
                .branch("feedback", Passthrough::new())
                .branch("sentiment", classify)
                .build()?,
        )
        .then(
            Branch::builder("respond")
                .when(
                    "positive",
                    |v| v["sentiment"] == "positive",
                    reply("thank", "Thanks for the kind words about: {feedback}")?,
                )
                .when(
                    "negative",
                    |v| v["sentiment"] == "negative",
                    reply("apologize", "Sorry to hear that: {feedback}")?,
                )
                .otherwise(Lambda::map("unknown", |_| json!("Unable to find sentiment.")))
                .build()?,
        )
        .build()?;

    println!("{}", chain.graph().to_mermaid());

    let ctx = ExecCtx::new();
    for feedback in ["Fast and reliable.", "Crashed twice.", "It exists."] {
        let out = chain.run(&ctx, json!(feedback)).await?;
        println!("{feedback:>20} => {out}");
    }

    Ok(())
}
