//! Document retrieval.
//!
//! A [`Retriever`] maps a query to relevant [`Document`]s. [`RetrieverUnit`]
//! exposes one as a runnable, and [`format_documents`] turns its output into
//! prompt context:
//!
//! ```text
//! query ──► RetrieverUnit ──► [Document, ...] ──► format_documents() ──► "doc\n\ndoc"
//! ```

use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    lambda::Lambda,
    prompt::json_type,
    runnable::{BoxFut, Runnable},
    RunnableError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// A retrievable piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Errors produced by retrievers.
#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("retriever query must be a string or an object with a 'query' or 'question' field, got {0}")]
    InvalidQuery(&'static str),

    #[error("{0}")]
    Other(String),
}

/// Looks up documents relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> std::result::Result<Vec<Document>, RetrieverError>;
}

/// Runnable wrapping a [`Retriever`]: query in, JSON array of documents out.
#[derive(Clone)]
pub struct RetrieverUnit {
    name: String,
    retriever: Arc<dyn Retriever>,
}

impl RetrieverUnit {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            name: "retriever".to_string(),
            retriever,
        }
    }

    /// Set the instance name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl std::fmt::Debug for RetrieverUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieverUnit").field("name", &self.name).finish()
    }
}

/// Query text from a runnable input.
fn query_text(input: &Value) -> std::result::Result<&str, RetrieverError> {
    match input {
        Value::String(q) => Ok(q),
        Value::Object(map) => ["query", "question"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .ok_or(RetrieverError::InvalidQuery("object without a query field")),
        other => Err(RetrieverError::InvalidQuery(json_type(other))),
    }
}

impl Runnable for RetrieverUnit {
    fn kind(&self) -> &'static str {
        "retriever"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move {
            let query = query_text(&input).map_err(|e| RunnableError::unit(&self.name, e))?;
            let docs = self
                .retriever
                .retrieve(query)
                .await
                .map_err(|e| RunnableError::unit(&self.name, e))?;
            tracing::debug!(unit = %self.name, hits = docs.len(), "retrieved documents");
            Ok(serde_json::to_value(docs)?)
        })
    }
}

/// In-memory retriever ranking documents by query term overlap.
///
/// A document's score is the number of distinct query terms it contains
/// (case-insensitive, alphanumeric terms). Documents without any shared
/// term are never returned; ties keep insertion order.
///
/// # Example
///
/// ```
/// use llm_runnable::retriever::{Document, InMemoryRetriever, Retriever};
///
/// let store = InMemoryRetriever::new(vec![
///     Document::new("Next-generation sequencing finds somatic mutations."),
///     Document::new("Pathway enrichment analysis with bioinformatics."),
/// ])
/// .with_k(1);
///
/// let hits = tokio_test::block_on(store.retrieve("bioinformatics pathway")).unwrap();
/// assert_eq!(hits.len(), 1);
/// assert!(hits[0].page_content.starts_with("Pathway"));
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryRetriever {
    documents: Vec<Document>,
    k: usize,
}

impl InMemoryRetriever {
    /// Create a retriever returning up to 4 documents.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents, k: 4 }
    }

    /// Maximum number of documents returned per query.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents ranked for `query`, best first.
    pub fn search(&self, query: &str) -> Vec<Document> {
        let query_terms = terms(query);
        let mut scored: Vec<(usize, &Document)> = self
            .documents
            .iter()
            .map(|doc| (query_terms.intersection(&terms(&doc.page_content)).count(), doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        // sort_by is stable, so equal scores stay in insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(self.k)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn retrieve(&self, query: &str) -> std::result::Result<Vec<Document>, RetrieverError> {
        Ok(self.search(query))
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A lambda joining document contents with blank lines.
///
/// Accepts an array of document objects (as produced by [`RetrieverUnit`])
/// or of plain strings.
pub fn format_documents() -> Lambda {
    Lambda::new("format_docs", |input| {
        let items = match input {
            Value::Array(items) => items,
            other => anyhow::bail!("format_docs expects an array of documents, got {}", json_type(&other)),
        };
        let parts = items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.as_str()),
                other => other
                    .get("page_content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("document without string 'page_content'")),
            })
            .collect::<anyhow::Result<Vec<&str>>>()?;
        Ok(Value::String(parts.join("\n\n")))
    })
}
