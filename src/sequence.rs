//! Sequential composition of runnables.
//!
//! [`Sequence`] passes each member's output as the next member's input and
//! returns the last member's output. It is itself a [`Runnable`], so
//! sequences nest inside any other composite.

use crate::{
    error::{Position, Result},
    exec_ctx::ExecCtx,
    graph::{Fragment, Graph},
    runnable::{observe, BoxFut, Runnable, RunnableRef},
    RunnableError,
};
use serde_json::Value;
use std::sync::Arc;

/// A sequential pipeline of runnables.
///
/// Guarantees exactly one invocation per member per call, in declared
/// order. The first failing member stops the sequence; later members are
/// not invoked.
///
/// # Example
///
/// ```ignore
/// use llm_runnable::{Sequence, PromptTemplate, ChatModelUnit, StrOutputParser};
///
/// let chain = Sequence::builder("explain")
///     .then(PromptTemplate::new("Explain {topic} in a few sentences."))
///     .then(ChatModelUnit::new(model))
///     .then(StrOutputParser::new())
///     .build()?;
///
/// let out = chain.run(&ctx, json!({"topic": "CRISPR"})).await?;
/// ```
pub struct Sequence {
    name: String,
    steps: Vec<RunnableRef>,
}

impl Sequence {
    /// Start building a sequence.
    pub fn builder(name: impl Into<String>) -> SequenceBuilder {
        SequenceBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always `false` for a built sequence; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Members in order.
    pub fn steps(&self) -> &[RunnableRef] {
        &self.steps
    }

    /// Execute all members, returning every intermediate output.
    ///
    /// The first member receives `input`; the last element of the returned
    /// vector is the sequence's output.
    pub async fn invoke_all(&self, ctx: &ExecCtx, input: Value) -> Result<Vec<Value>> {
        let mut outputs = Vec::with_capacity(self.steps.len());
        let mut current = input;

        for (index, step) in self.steps.iter().enumerate() {
            tracing::trace!(sequence = %self.name, step = index, unit = step.name(), "invoking step");
            let output = observe(ctx, step.as_ref(), current)
                .await
                .map_err(|e| RunnableError::nested(&self.name, "sequence", Position::Step(index), e))?;
            current = output.clone();
            outputs.push(output);
        }

        Ok(outputs)
    }

    /// Execute the sequence and return the last member's output.
    pub async fn execute(&self, ctx: &ExecCtx, input: Value) -> Result<Value> {
        let mut current = input;
        for (index, step) in self.steps.iter().enumerate() {
            tracing::trace!(sequence = %self.name, step = index, unit = step.name(), "invoking step");
            current = observe(ctx, step.as_ref(), current)
                .await
                .map_err(|e| RunnableError::nested(&self.name, "sequence", Position::Step(index), e))?;
        }
        Ok(current)
    }
}

impl Runnable for Sequence {
    fn kind(&self) -> &'static str {
        "sequence"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(self.execute(ctx, input))
    }

    fn add_to_graph(&self, graph: &mut Graph) -> Fragment {
        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            // unreachable for built sequences
            return Fragment::single(graph.add_node(self.kind(), self.name()));
        };

        let head = graph.add_child(first);
        let mut exits = head.exits;
        for step in steps {
            let fragment = graph.add_child(step);
            for exit in &exits {
                graph.connect(*exit, fragment.entry);
            }
            exits = fragment.exits;
        }

        Fragment {
            entry: head.entry,
            exits,
        }
    }
}

/// Builder for [`Sequence`].
pub struct SequenceBuilder {
    name: String,
    steps: Vec<RunnableRef>,
}

impl SequenceBuilder {
    /// Append a runnable.
    pub fn then(mut self, step: impl Runnable + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append a runnable that is shared with other compositions.
    pub fn then_shared(mut self, step: RunnableRef) -> Self {
        self.steps.push(step);
        self
    }

    /// Build the sequence. Fails if no member was added.
    pub fn build(self) -> Result<Sequence> {
        if self.steps.is_empty() {
            return Err(RunnableError::Composition(format!(
                "sequence '{}' has no members",
                self.name
            )));
        }
        Ok(Sequence {
            name: self.name,
            steps: self.steps,
        })
    }
}

/// Two-member sequence: `second(first(x))`.
pub fn sequence_of(
    name: impl Into<String>,
    first: impl Runnable + 'static,
    second: impl Runnable + 'static,
) -> Sequence {
    Sequence {
        name: name.into(),
        steps: vec![Arc::new(first), Arc::new(second)],
    }
}
