//! # LLM Runnable
//!
//! Composable execution units for LLM workflows.
//!
//! Everything in this crate is a **runnable**: a unit that maps one
//! `serde_json::Value` input to one output. Leaves do real work (format a
//! prompt, call a model, parse its reply, run a closure); composites combine
//! other runnables and are runnables themselves, so compositions nest to any
//! depth.
//!
//! ## Core Concepts
//!
//! - **[`Runnable`]**: object-safe trait for executable units.
//!   [`RunnableExt`] adds `run`, `run_as::<T>()`, `batch` and `graph`.
//! - **[`ExecCtx`]**: per-call context (concurrency limit, optional event
//!   handler).
//! - **[`Sequence`]**: each output feeds the next input.
//! - **[`Parallel`]**: same input to every named branch, results merged into
//!   one object.
//! - **[`Branch`]**: first matching predicate wins, with a mandatory default.
//! - **[`Lambda`]** and **[`Passthrough`]**: closures and identity as units.
//! - **[`Graph`]**: structural view of a composition, rendered as text or
//!   Mermaid.
//!
//! Prompts ([`PromptTemplate`], [`ChatPromptTemplate`]), models
//! ([`ChatModelUnit`] over a [`ChatModel`]), [`output_parser`]s and
//! [`retriever`]s are leaves that plug into the composites.
//!
//! ## Quick Start
//!
//! ```
//! use llm_runnable::{
//!     ChatModelUnit, ExecCtx, MockChatModel, PromptTemplate, RunnableExt, Sequence,
//!     StrOutputParser,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = Arc::new(MockChatModel::echo());
//!
//! let chain = Sequence::builder("explain")
//!     .then(PromptTemplate::new("Explain {topic} in a few sentences."))
//!     .then(ChatModelUnit::new(model))
//!     .then(StrOutputParser::new())
//!     .build()?;
//!
//! let ctx = ExecCtx::new();
//! let out = tokio_test::block_on(chain.run(&ctx, json!({"topic": "CRISPR"})))?;
//! assert_eq!(out, json!("Explain CRISPR in a few sentences."));
//! # Ok(())
//! # }
//! ```

pub mod branch;
pub mod chat_prompt;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod graph;
pub mod lambda;
pub mod message;
pub mod model;
pub mod output_parser;
pub mod parallel;
pub mod passthrough;
pub mod prompt;
pub mod retriever;
pub mod runnable;
pub mod sequence;

// --- Composition layer ---
pub use branch::{Branch, BranchBuilder, Predicate, DEFAULT_ROUTE};
pub use error::{BoxError, Position, Result, RunnableError};
pub use events::{Event, EventHandler, FnEventHandler};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use graph::{Fragment, Graph, GraphEdge, GraphNode};
pub use lambda::Lambda;
pub use parallel::{Parallel, ParallelBuilder};
pub use passthrough::Passthrough;
pub use runnable::{BoxFut, Runnable, RunnableExt, RunnableRef};
pub use sequence::{sequence_of, Sequence, SequenceBuilder};

// --- Leaves ---
pub use chat_prompt::{ChatPromptTemplate, MessageTemplate};
pub use message::{ChatMessage, Role};
pub use model::{ChatModel, ChatModelUnit, MockChatModel, ModelConfig, ModelError, OllamaChatModel};
pub use output_parser::{JsonOutputParser, ListOutputParser, ParseError, StrOutputParser};
pub use prompt::{PromptError, PromptTemplate};
pub use retriever::{format_documents, Document, InMemoryRetriever, Retriever, RetrieverError, RetrieverUnit};
