//! Execution context shared across runnable invocations.
//!
//! [`ExecCtx`] carries call-scoped settings that every runnable in a
//! composition can see: the parallelism limit and an optional event handler.
//! It holds no invocation state, so one context can serve any number of
//! concurrent calls. External clients (HTTP, vector stores) are not part of
//! the context; leaf runnables receive them at construction.

use crate::events::EventHandler;
use std::sync::Arc;

/// Shared execution context for runnable invocations.
///
/// # Example
///
/// ```
/// use llm_runnable::ExecCtx;
///
/// let ctx = ExecCtx::builder().max_concurrency(4).build();
/// assert_eq!(ctx.concurrency_limit(10), 4);
/// ```
#[derive(Clone, Default)]
pub struct ExecCtx {
    /// Upper bound on concurrently running children of a parallel or batch.
    /// `None` runs all of them at once.
    pub max_concurrency: Option<usize>,
    /// Optional event handler for lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Context with no concurrency limit and no event handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder.
    pub fn builder() -> ExecCtxBuilder {
        ExecCtxBuilder::default()
    }

    /// Number of children that may run at once out of `pending`.
    ///
    /// Never returns 0, so a misconfigured limit still makes progress.
    pub fn concurrency_limit(&self, pending: usize) -> usize {
        self.max_concurrency
            .map_or(pending, |max| max.min(pending))
            .max(1)
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("max_concurrency", &self.max_concurrency)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
#[derive(Default)]
pub struct ExecCtxBuilder {
    max_concurrency: Option<usize>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtxBuilder {
    /// Limit how many parallel branches or batch items run at once.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> ExecCtx {
        ExecCtx {
            max_concurrency: self.max_concurrency,
            event_handler: self.event_handler,
        }
    }
}
