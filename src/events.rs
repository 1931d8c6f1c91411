//! Event system for runnable lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe invocations.
//! Runnables invoked through [`RunnableExt::run`](crate::runnable::RunnableExt::run),
//! and every child invoked by a composite, emit start/end events; branches
//! also report which route they selected.

use std::sync::Arc;

/// Events emitted during runnable execution.
#[derive(Debug, Clone)]
pub enum Event {
    /// A runnable has started executing.
    RunStart {
        /// Instance name of the runnable.
        name: String,
        /// Stable type identifier (e.g. `"sequence"`, `"chat_model"`).
        kind: &'static str,
    },
    /// A runnable has finished executing.
    RunEnd {
        /// Instance name of the runnable.
        name: String,
        /// Stable type identifier.
        kind: &'static str,
        /// Whether execution succeeded.
        ok: bool,
        /// Wall-clock time spent in the runnable, in milliseconds.
        elapsed_ms: u64,
    },
    /// A branch picked the route it is about to execute.
    RouteSelected {
        /// Instance name of the branch.
        branch: String,
        /// Label of the selected route, or `"default"`.
        route: String,
    },
}

/// Handler for runnable lifecycle events.
///
/// This is entirely optional -- runnables work without an event handler.
///
/// # Example
///
/// ```
/// use llm_runnable::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::RunStart { name, .. } => println!("[start] {}", name),
///             Event::RunEnd { name, ok, .. } => println!("[end] {} ok={}", name, ok),
///             Event::RouteSelected { branch, route } => println!("[route] {} -> {}", branch, route),
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when a runnable emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_runnable::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::RouteSelected { route, .. } = event {
///         println!("took {}", route);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
