//! Parallel fan-out over named branches.
//!
//! [`Parallel`] gives every branch the same input and collects the results
//! into a JSON object keyed by branch name, in declared order.
//!
//! Branches run concurrently on the calling task, at most
//! [`ExecCtx::max_concurrency`] at a time, and the output is only produced
//! once every branch has finished. Side effects across branches are not
//! ordered.

use crate::{
    error::{Position, Result},
    exec_ctx::ExecCtx,
    graph::{Fragment, Graph},
    runnable::{observe, BoxFut, Runnable, RunnableRef},
    RunnableError,
};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Runs named branches against one input and returns `{name: output}`.
///
/// # Example
///
/// ```ignore
/// use llm_runnable::{Parallel, Passthrough, Lambda};
///
/// let fan = Parallel::builder("describe")
///     .branch("description", Passthrough::new())
///     .branch("word_count", Lambda::new("word_count", |v| {
///         Ok(json!(v.as_str().unwrap_or_default().split_whitespace().count()))
///     }))
///     .build()?;
/// ```
pub struct Parallel {
    name: String,
    branches: Vec<(String, RunnableRef)>,
}

impl Parallel {
    /// Start building a parallel.
    pub fn builder(name: impl Into<String>) -> ParallelBuilder {
        ParallelBuilder {
            name: name.into(),
            branches: Vec::new(),
        }
    }

    /// Branch names in declared order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|(k, _)| k.as_str())
    }

    /// Run every branch and merge the results.
    ///
    /// If any branch fails the whole call fails; the reported branch is the
    /// first failing one in declared order.
    pub async fn execute(&self, ctx: &ExecCtx, input: Value) -> Result<Value> {
        let limit = ctx.concurrency_limit(self.branches.len());
        tracing::trace!(parallel = %self.name, branches = self.branches.len(), limit, "fanning out");

        let calls: Vec<BoxFut<'_, Result<Value>>> = self
            .branches
            .iter()
            .map(|(_, branch)| {
                Box::pin(observe(ctx, branch.as_ref(), input.clone())) as BoxFut<'_, Result<Value>>
            })
            .collect();
        let results: Vec<Result<Value>> = futures::stream::iter(calls)
            .buffered(limit)
            .collect()
            .await;

        let mut merged = Map::with_capacity(self.branches.len());
        for ((key, _), result) in self.branches.iter().zip(results) {
            let value = result.map_err(|e| {
                RunnableError::nested(&self.name, "parallel", Position::Key(key.clone()), e)
            })?;
            merged.insert(key.clone(), value);
        }
        Ok(Value::Object(merged))
    }
}

impl Runnable for Parallel {
    fn kind(&self) -> &'static str {
        "parallel"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(self.execute(ctx, input))
    }

    fn add_to_graph(&self, graph: &mut Graph) -> Fragment {
        let fan_out = graph.add_node(self.kind(), self.name());
        let join = graph.add_node("join", format!("{} (join)", self.name));
        for (key, branch) in &self.branches {
            let fragment = graph.add_child(branch);
            graph.connect_labeled(fan_out, fragment.entry, key.as_str());
            for exit in fragment.exits {
                graph.connect(exit, join);
            }
        }
        Fragment {
            entry: fan_out,
            exits: vec![join],
        }
    }
}

/// Builder for [`Parallel`].
pub struct ParallelBuilder {
    name: String,
    branches: Vec<(String, RunnableRef)>,
}

impl ParallelBuilder {
    /// Add a named branch.
    pub fn branch(mut self, key: impl Into<String>, unit: impl Runnable + 'static) -> Self {
        self.branches.push((key.into(), Arc::new(unit)));
        self
    }

    /// Add a named branch that is shared with other compositions.
    pub fn branch_shared(mut self, key: impl Into<String>, unit: RunnableRef) -> Self {
        self.branches.push((key.into(), unit));
        self
    }

    /// Build the parallel. Fails on zero branches or a repeated key.
    pub fn build(self) -> Result<Parallel> {
        if self.branches.is_empty() {
            return Err(RunnableError::Composition(format!(
                "parallel '{}' has no branches",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for (key, _) in &self.branches {
            if !seen.insert(key.as_str()) {
                return Err(RunnableError::Composition(format!(
                    "parallel '{}' declares branch '{}' more than once",
                    self.name, key
                )));
            }
        }
        Ok(Parallel {
            name: self.name,
            branches: self.branches,
        })
    }
}
