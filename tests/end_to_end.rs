use llm_runnable::{
    format_documents, Branch, ChatModelUnit, ChatPromptTemplate, Document, Event, ExecCtx,
    FnEventHandler, InMemoryRetriever, JsonOutputParser, Lambda, ListOutputParser,
    MockChatModel, Parallel, Passthrough, Position, PromptTemplate, RetrieverUnit, Runnable,
    RunnableError, RunnableExt, Sequence, StrOutputParser,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn echo_model() -> ChatModelUnit {
    ChatModelUnit::new(Arc::new(MockChatModel::echo()))
}

fn uppercase() -> Lambda {
    Lambda::new("uppercase", |v| {
        let text = v.as_str().ok_or_else(|| anyhow::anyhow!("expected a string"))?;
        Ok(json!(text.to_uppercase()))
    })
}

fn int_lambda(name: &'static str, f: fn(i64) -> i64) -> Lambda {
    Lambda::new(name, move |v| {
        let n = v.as_i64().ok_or_else(|| anyhow::anyhow!("expected an integer"))?;
        Ok(json!(f(n)))
    })
}

fn counting(name: &'static str, calls: &Arc<AtomicUsize>) -> Lambda {
    let calls = calls.clone();
    Lambda::new(name, move |v| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(v)
    })
}

// ── Scenario A: prompt -> echo model -> uppercase ──

#[tokio::test]
async fn scenario_a_prompt_model_uppercase() {
    let chain = Sequence::builder("explain")
        .then(PromptTemplate::new("Tell me about {topic}."))
        .then(echo_model())
        .then(uppercase())
        .build()
        .unwrap();

    let ctx = ExecCtx::new();
    let first = chain.run(&ctx, json!({"topic": "x"})).await.unwrap();
    let second = chain.run(&ctx, json!({"topic": "x"})).await.unwrap();
    assert_eq!(first, json!("TELL ME ABOUT X."));
    assert_eq!(first, second);
}

// ── Scenario B: parallel len + passthrough ──

#[tokio::test]
async fn scenario_b_parallel_len_and_same() {
    let fan = Parallel::builder("describe")
        .branch(
            "len",
            Lambda::new("len", |v| {
                let text = v.as_str().ok_or_else(|| anyhow::anyhow!("expected a string"))?;
                Ok(json!(text.chars().count()))
            }),
        )
        .branch("same", Passthrough::new())
        .build()
        .unwrap();

    let out = fan.run(&ExecCtx::new(), json!("hello")).await.unwrap();
    assert_eq!(out, json!({"len": 5, "same": "hello"}));
    let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["len", "same"]);
}

// ── Scenario C: branch with default ──

#[tokio::test]
async fn scenario_c_branch_double_or_negate() {
    let router = Branch::builder("size")
        .when("big", |v| v.as_i64().is_some_and(|n| n > 10), int_lambda("double", |n| n * 2))
        .otherwise(int_lambda("negate", |n| -n))
        .build()
        .unwrap();

    let ctx = ExecCtx::new();
    assert_eq!(router.run(&ctx, json!(5)).await.unwrap(), json!(-5));
    assert_eq!(router.run(&ctx, json!(20)).await.unwrap(), json!(40));
}

// ── Composition properties ──

#[tokio::test]
async fn sequence_of_two_is_function_composition() {
    let add_one = int_lambda("add_one", |n| n + 1);
    let triple = int_lambda("triple", |n| n * 3);
    let ctx = ExecCtx::new();

    let seq = llm_runnable::sequence_of("pair", add_one.clone(), triple.clone());
    let direct = triple
        .invoke(&ctx, add_one.invoke(&ctx, json!(4)).await.unwrap())
        .await
        .unwrap();
    assert_eq!(seq.run(&ctx, json!(4)).await.unwrap(), direct);
}

#[tokio::test]
async fn failing_member_stops_sequence_and_reports_path() {
    let after = Arc::new(AtomicUsize::new(0));
    let inner = Parallel::builder("study")
        .branch("notes", Passthrough::new())
        .branch("quiz", int_lambda("quiz_maker", |n| n))
        .build()
        .unwrap();
    let chain = Sequence::builder("pipeline")
        .then(Passthrough::named("start"))
        .then(inner)
        .then(counting("after", &after))
        .build()
        .unwrap();

    let err = chain.run(&ExecCtx::new(), json!("not a number")).await.unwrap_err();
    assert_eq!(after.load(Ordering::SeqCst), 0);
    assert_eq!(err.failing_unit(), Some("quiz_maker"));

    let path = err.path();
    assert_eq!(path.len(), 2);
    assert_eq!(path[0].0, "pipeline");
    assert!(matches!(path[0].1, Position::Step(1)));
    assert_eq!(path[1].0, "study");
    assert!(matches!(path[1].1, Position::Key(k) if k == "quiz"));
    assert!(matches!(err.root_cause(), RunnableError::UnitExecution { .. }));
    assert!(err.to_string().contains("branch 'quiz'"));
}

#[tokio::test]
async fn first_matching_route_wins_and_only_it_runs() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let fallback = Arc::new(AtomicUsize::new(0));
    let router = Branch::builder("router")
        .when("any", |_| true, counting("first", &first))
        .when("also_any", |_| true, counting("second", &second))
        .otherwise(counting("fallback", &fallback))
        .build()
        .unwrap();

    router.run(&ExecCtx::new(), json!("x")).await.unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
    assert_eq!(fallback.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shared_pipeline_runs_concurrently() {
    let chain = Arc::new(
        Sequence::builder("shared")
            .then(int_lambda("inc", |n| n + 1))
            .then(int_lambda("square", |n| n * n))
            .build()
            .unwrap(),
    );
    let ctx = ExecCtx::new();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let chain = chain.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { chain.run(&ctx, json!(i)).await })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.await.unwrap().unwrap();
        let expected = (i as i64 + 1) * (i as i64 + 1);
        assert_eq!(out, json!(expected));
    }
}

#[tokio::test]
async fn batch_keeps_input_order() {
    let router = Branch::builder("size")
        .when("big", |v| v.as_i64().is_some_and(|n| n > 10), int_lambda("double", |n| n * 2))
        .otherwise(int_lambda("negate", |n| -n))
        .build()
        .unwrap();
    let ctx = ExecCtx::builder().max_concurrency(2).build();
    let results = router
        .batch(&ctx, vec![json!(1), json!(50), json!("bad"), json!(11)])
        .await;
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap(), &json!(-1));
    assert_eq!(results[1].as_ref().unwrap(), &json!(100));
    assert!(results[2].is_err());
    assert_eq!(results[3].as_ref().unwrap(), &json!(22));
}

#[tokio::test]
async fn run_emits_nested_events() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let ctx = ExecCtx::builder()
        .event_handler(Arc::new(FnEventHandler(move |event: Event| {
            let line = match event {
                Event::RunStart { name, .. } => format!("start:{name}"),
                Event::RunEnd { name, ok, .. } => format!("end:{name}:{ok}"),
                Event::RouteSelected { branch, route } => format!("route:{branch}:{route}"),
            };
            sink.lock().unwrap().push(line);
        })))
        .build();

    let chain = Sequence::builder("chain")
        .then(
            Branch::builder("router")
                .when("big", |v| v.as_i64().is_some_and(|n| n > 10), int_lambda("double", |n| n * 2))
                .otherwise(int_lambda("negate", |n| -n))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    chain.run(&ctx, json!(3)).await.unwrap();
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "start:chain",
            "start:router",
            "route:router:default",
            "start:negate",
            "end:negate:true",
            "end:router:true",
            "end:chain:true",
        ]
    );
}

// ── Graph introspection ──

#[test]
fn graph_is_idempotent_and_never_invokes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let chain = Sequence::builder("study")
        .then(
            Parallel::builder("fan")
                .branch("notes", counting("notes", &calls))
                .branch("quiz", counting("quiz", &calls))
                .build()
                .unwrap(),
        )
        .then(
            Branch::builder("check")
                .when("long", |_| true, counting("summarize", &calls))
                .otherwise(Passthrough::new())
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let first = chain.graph();
    let second = chain.graph();
    assert_eq!(first, second);
    assert_eq!(first.to_text(), second.to_text());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Input, fan, join, notes, quiz, check, summarize, passthrough, Output
    assert_eq!(first.node_count(), 9);
    let check = first.find("check").unwrap();
    let routes: Vec<(bool, Option<String>)> = first
        .successors(check)
        .into_iter()
        .map(|(_, e)| (e.conditional, e.label.clone()))
        .collect();
    assert_eq!(
        routes,
        vec![(true, Some("long".to_string())), (true, Some("default".to_string()))]
    );
    assert!(first.to_mermaid().starts_with("graph TD\n"));
}

// ── Chains with prompts, models and parsers ──

const ARTICLE: &str = "AI has revolutionized molecular docking, a critical technique in drug discovery.";

#[tokio::test]
async fn notes_and_quiz_merge_chain() {
    let notes = Sequence::builder("notes_chain")
        .then(PromptTemplate::new("Generate short and simple notes from the following text: \n {text}"))
        .then(echo_model())
        .then(StrOutputParser::new())
        .build()
        .unwrap();
    let quiz = Sequence::builder("quiz_chain")
        .then(PromptTemplate::new("Generate 5 short question answer quiz from the following text: \n {text}"))
        .then(echo_model())
        .then(StrOutputParser::new())
        .build()
        .unwrap();
    let chain = Sequence::builder("study_guide")
        .then(
            Parallel::builder("notes_and_quiz")
                .branch("notes", notes)
                .branch("quiz", quiz)
                .build()
                .unwrap(),
        )
        .then(PromptTemplate::new(
            "Merge the provided notes and quiz:\n notes -> {notes} \n quiz -> {quiz}",
        ))
        .then(echo_model())
        .then(StrOutputParser::new())
        .build()
        .unwrap();

    let out = chain.run(&ExecCtx::new(), json!({"text": ARTICLE})).await.unwrap();
    let text = out.as_str().unwrap();
    assert!(text.starts_with("Merge the provided notes and quiz:"));
    assert!(text.contains(&format!("notes -> Generate short and simple notes from the following text: \n {ARTICLE}")));
    assert!(text.contains(&format!("quiz -> Generate 5 short question answer quiz from the following text: \n {ARTICLE}")));
}

#[tokio::test]
async fn sentiment_routing_chain() {
    let classifier = Arc::new(MockChatModel::new(vec![
        r#"{"sentiment": "positive"}"#.to_string(),
        "```json\n{\"sentiment\": \"negative\"}\n```".to_string(),
        r#"{"sentiment": "mixed"}"#.to_string(),
    ]));
    let json_parser = JsonOutputParser::new().with_required_keys(&["sentiment"]);
    let classify = Sequence::builder("classify")
        .then(
            PromptTemplate::new(
                "Classify the sentiment of the following feedback text into positive or negative: \n {feedback} \n {format_instruction}",
            )
            .with_partial("format_instruction", json_parser.format_instructions()),
        )
        .then(ChatModelUnit::new(classifier.clone()).named("classifier"))
        .then(json_parser)
        .then(Lambda::new("sentiment", |v| Ok(v["sentiment"].clone())))
        .build()
        .unwrap();

    let reply = |name: &str, template: &str| {
        Sequence::builder(name)
            .then(PromptTemplate::new(template))
            .then(echo_model())
            .then(StrOutputParser::new())
            .build()
            .unwrap()
    };

    let chain = Sequence::builder("feedback")
        .then(
            Parallel::builder("annotate")
                .branch("feedback", Passthrough::new())
                .branch("sentiment", classify)
                .build()
                .unwrap(),
        )
        .then(
            Branch::builder("respond")
                .when(
                    "positive",
                    |v| v["sentiment"] == "positive",
                    reply("positive_reply", "Write a response to this positive feedback: {feedback}"),
                )
                .when(
                    "negative",
                    |v| v["sentiment"] == "negative",
                    reply("negative_reply", "Write a response to this negative feedback: {feedback}"),
                )
                .otherwise(Lambda::map("unknown", |_| json!("Unable to find sentiment.")))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let ctx = ExecCtx::new();
    assert_eq!(
        chain.run(&ctx, json!("Powerful and impactful.")).await.unwrap(),
        json!("Write a response to this positive feedback: Powerful and impactful.")
    );
    assert_eq!(
        chain.run(&ctx, json!("Slow and confusing.")).await.unwrap(),
        json!("Write a response to this negative feedback: Slow and confusing.")
    );
    assert_eq!(
        chain.run(&ctx, json!("Hmm.")).await.unwrap(),
        json!("Unable to find sentiment.")
    );
    assert_eq!(classifier.calls(), 3);
}

#[tokio::test]
async fn retrieval_augmented_chain() {
    let store = InMemoryRetriever::new(vec![
        Document::new("Gene expression profiling is pivotal in cancer biomarker discovery."),
        Document::new("Next-generation sequencing analyses somatic mutations in cancer genomes."),
        Document::new("Protein folding is studied with molecular dynamics."),
    ])
    .with_k(2);

    let chain = Sequence::builder("rag")
        .then(
            Parallel::builder("gather")
                .branch(
                    "context",
                    Sequence::builder("context")
                        .then(RetrieverUnit::new(Arc::new(store)))
                        .then(format_documents())
                        .build()
                        .unwrap(),
                )
                .branch("question", Passthrough::new())
                .build()
                .unwrap(),
        )
        .then(PromptTemplate::new("Context: {context}\nQuestion: {question}"))
        .then(echo_model())
        .then(StrOutputParser::new())
        .build()
        .unwrap();

    let out = chain
        .run(&ExecCtx::new(), json!("Which cancer biomarker methods use gene expression?"))
        .await
        .unwrap();
    assert_eq!(
        out,
        json!(
            "Context: Gene expression profiling is pivotal in cancer biomarker discovery.\n\n\
             Next-generation sequencing analyses somatic mutations in cancer genomes.\n\
             Question: Which cancer biomarker methods use gene expression?"
        )
    );
}

#[derive(Debug, Deserialize)]
struct Tweet {
    tweet: String,
    post: String,
}

#[tokio::test]
async fn chat_prompt_and_typed_output() {
    let writer = |name: &str, instruction: &str| {
        Sequence::builder(name)
            .then(
                ChatPromptTemplate::new()
                    .system("You are a science communicator.")
                    .human(format!("{instruction} about {{topic}}")),
            )
            .then(echo_model())
            .then(StrOutputParser::new())
            .build()
            .unwrap()
    };
    let fan = Parallel::builder("social")
        .branch("tweet", writer("tweet", "Generate a tweet"))
        .branch("post", writer("post", "Write a LinkedIn post"))
        .build()
        .unwrap();

    let out: Tweet = fan
        .run_as(&ExecCtx::new(), json!({"topic": "AI in cancer research"}))
        .await
        .unwrap();
    assert_eq!(out.tweet, "Generate a tweet about AI in cancer research");
    assert_eq!(out.post, "Write a LinkedIn post about AI in cancer research");
}

#[tokio::test]
async fn list_parser_after_model() {
    let model = ChatModelUnit::new(Arc::new(MockChatModel::fixed(
        "<think>listing</think>Here you go:\n1. PDB\n2. UniProt\n3. AlphaFold DB",
    )));
    let chain = Sequence::builder("databases")
        .then(PromptTemplate::new("Name three {kind} databases."))
        .then(model)
        .then(ListOutputParser::new())
        .build()
        .unwrap();
    let out: Value = chain.run(&ExecCtx::new(), json!("protein")).await.unwrap();
    assert_eq!(out, json!(["PDB", "UniProt", "AlphaFold DB"]));
}

#[tokio::test]
async fn model_failure_is_attributed() {
    let chain = Sequence::builder("explain")
        .then(PromptTemplate::new("Explain {topic}"))
        .then(ChatModelUnit::new(Arc::new(MockChatModel::failing("quota exceeded"))).named("llm"))
        .then(StrOutputParser::new())
        .build()
        .unwrap();
    let err = chain.run(&ExecCtx::new(), json!("CRISPR")).await.unwrap_err();
    assert_eq!(err.failing_unit(), Some("llm"));
    assert!(matches!(err.path()[0].1, Position::Step(1)));
    assert!(err.to_string().contains("quota exceeded"));
}
