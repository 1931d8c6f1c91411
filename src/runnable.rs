//! Core runnable trait and invocation helpers.
//!
//! Runnables are the single abstraction of this crate. Each runnable takes a
//! `serde_json::Value` input and returns a `Value` output or fails. The
//! composites ([`Sequence`](crate::Sequence), [`Parallel`](crate::Parallel),
//! [`Branch`](crate::Branch)) are runnables too, so compositions nest freely.

use crate::error::Result;
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::graph::{Fragment, Graph};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// A boxed, pinned, Send future -- the return type of [`Runnable::invoke`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared handle to a runnable, as stored inside composites.
pub type RunnableRef = Arc<dyn Runnable>;

/// Object-safe trait for executable units.
///
/// A runnable maps one input value to one output value, or fails with a
/// [`RunnableError`](crate::RunnableError). Implementations must not keep
/// invocation state on `self`; the same instance may be invoked concurrently
/// and may appear in several composites.
pub trait Runnable: Send + Sync {
    /// Stable identifier for the runnable type (e.g. `"lambda"`, `"sequence"`).
    fn kind(&self) -> &'static str;

    /// Instance name (for logging, events, graphs and error attribution).
    fn name(&self) -> &str;

    /// Execute the runnable.
    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>>;

    /// Add this runnable's nodes and edges to `graph`.
    ///
    /// Leaves contribute a single node. Composites override this to lay out
    /// their children.
    fn add_to_graph(&self, graph: &mut Graph) -> Fragment {
        Fragment::single(graph.add_node(self.kind(), self.name()))
    }
}

impl<R: Runnable + ?Sized> Runnable for Arc<R> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        (**self).invoke(ctx, input)
    }

    fn add_to_graph(&self, graph: &mut Graph) -> Fragment {
        (**self).add_to_graph(graph)
    }
}

/// Invoke `unit` inside a tracing span, emitting start/end events.
///
/// Composites use this for every child so that nested invocations are
/// observable without each runnable doing its own bookkeeping.
pub(crate) async fn observe<R: Runnable + ?Sized>(
    ctx: &ExecCtx,
    unit: &R,
    input: Value,
) -> Result<Value> {
    let span = tracing::debug_span!("runnable", kind = unit.kind(), name = unit.name());
    async {
        emit(
            &ctx.event_handler,
            Event::RunStart {
                name: unit.name().to_string(),
                kind: unit.kind(),
            },
        );
        let started = Instant::now();
        let result = unit.invoke(ctx, input).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::trace!(elapsed_ms, "runnable finished"),
            Err(e) => tracing::debug!(elapsed_ms, error = %e, "runnable failed"),
        }
        emit(
            &ctx.event_handler,
            Event::RunEnd {
                name: unit.name().to_string(),
                kind: unit.kind(),
                ok: result.is_ok(),
                elapsed_ms,
            },
        );
        result
    }
    .instrument(span)
    .await
}

/// Convenience methods available on every [`Runnable`].
pub trait RunnableExt: Runnable {
    /// Invoke with lifecycle events and a tracing span.
    fn run<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(observe(ctx, self, input))
    }

    /// Invoke and deserialize the output into `T`.
    ///
    /// This is the primary way to extract typed data at the edge of a
    /// composition.
    ///
    /// ```ignore
    /// let summary: Summary = chain.run_as(&ctx, json!({"topic": "CRISPR"})).await?;
    /// ```
    fn run_as<'a, T>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<T>>
    where
        T: DeserializeOwned + 'a,
    {
        Box::pin(async move {
            let value = observe(ctx, self, input).await?;
            Ok(serde_json::from_value(value)?)
        })
    }

    /// Invoke once per input, running up to `ctx.max_concurrency` at a time.
    ///
    /// Results come back in input order; one failing input does not affect
    /// the others.
    fn batch<'a>(&'a self, ctx: &'a ExecCtx, inputs: Vec<Value>) -> BoxFut<'a, Vec<Result<Value>>> {
        Box::pin(async move {
            let limit = ctx.concurrency_limit(inputs.len());
            let calls: Vec<BoxFut<'a, Result<Value>>> = inputs
                .into_iter()
                .map(|input| Box::pin(observe(ctx, self, input)) as BoxFut<'a, Result<Value>>)
                .collect();
            futures::stream::iter(calls).buffered(limit).collect().await
        })
    }

    /// Derive the static node/edge shape of this runnable.
    ///
    /// Never invokes anything.
    fn graph(&self) -> Graph {
        Graph::of(self)
    }
}

impl<R: Runnable + ?Sized> RunnableExt for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FnEventHandler;
    use crate::RunnableError;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    /// Wraps the input in an object tagged with the unit's name.
    struct Tag(&'static str);

    impl Runnable for Tag {
        fn kind(&self) -> &'static str {
            "tag"
        }
        fn name(&self) -> &str {
            self.0
        }
        fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
            Box::pin(async move {
                if input.is_null() {
                    return Err(RunnableError::unit(self.0, anyhow::anyhow!("null input")));
                }
                Ok(json!({ "tag": self.0, "input": input }))
            })
        }
    }

    #[derive(Debug, Deserialize)]
    struct Tagged {
        tag: String,
        input: String,
    }

    #[tokio::test]
    async fn test_arc_delegates() {
        let shared: RunnableRef = Arc::new(Tag("a"));
        assert_eq!(shared.kind(), "tag");
        assert_eq!(shared.name(), "a");
        let out = shared.invoke(&ExecCtx::new(), json!("x")).await.unwrap();
        assert_eq!(out["tag"], "a");
    }

    #[tokio::test]
    async fn test_run_as_typed() {
        let out: Tagged = Tag("t").run_as(&ExecCtx::new(), json!("hi")).await.unwrap();
        assert_eq!(out.tag, "t");
        assert_eq!(out.input, "hi");
    }

    #[tokio::test]
    async fn test_run_as_wrong_shape_is_json_error() {
        let result: Result<Vec<u32>> = Tag("t").run_as(&ExecCtx::new(), json!("hi")).await;
        assert!(matches!(result, Err(RunnableError::Json(_))));
    }

    #[tokio::test]
    async fn test_run_emits_start_and_end() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ctx = ExecCtx::builder()
            .event_handler(Arc::new(FnEventHandler(move |event: Event| {
                let label = match event {
                    Event::RunStart { name, .. } => format!("start:{}", name),
                    Event::RunEnd { name, ok, .. } => format!("end:{}:{}", name, ok),
                    Event::RouteSelected { .. } => "route".to_string(),
                };
                sink.lock().unwrap().push(label);
            })))
            .build();

        Tag("t").run(&ctx, json!(1)).await.unwrap();
        let _ = Tag("t").run(&ctx, Value::Null).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["start:t", "end:t:true", "start:t", "end:t:false"]
        );
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let ctx = ExecCtx::builder().max_concurrency(2).build();
        let results = Tag("b")
            .batch(&ctx, vec![json!("one"), Value::Null, json!("three")])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap()["input"], "one");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap()["input"], "three");
    }

    #[test]
    fn test_default_graph_is_single_node() {
        let graph = Tag("leaf").graph();
        // Input, leaf, Output
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }
}
