//! Conditional routing between runnables.
//!
//! [`Branch`] evaluates its predicates in declared order against the input
//! and runs the runnable paired with the first predicate that holds, or the
//! default runnable when none does. Exactly one runnable executes per call.

use crate::{
    error::{Position, Result},
    events::{emit, Event},
    exec_ctx::ExecCtx,
    graph::{Fragment, Graph},
    runnable::{observe, BoxFut, Runnable, RunnableRef},
    RunnableError,
};
use serde_json::Value;
use std::sync::Arc;

/// Type alias for a route predicate.
pub type Predicate = Arc<dyn Fn(&Value) -> anyhow::Result<bool> + Send + Sync>;

/// Label used for the default route in events and graphs.
pub const DEFAULT_ROUTE: &str = "default";

struct Route {
    label: String,
    predicate: Predicate,
    unit: RunnableRef,
}

/// Routes each input to exactly one of several runnables.
///
/// # Example
///
/// ```ignore
/// use llm_runnable::{Branch, Lambda};
///
/// let router = Branch::builder("sentiment")
///     .when("positive", |v| v["sentiment"] == "positive", positive_reply)
///     .when("negative", |v| v["sentiment"] == "negative", negative_reply)
///     .otherwise(Lambda::map("unknown", |_| json!("Unable to find sentiment.")))
///     .build()?;
/// ```
pub struct Branch {
    name: String,
    routes: Vec<Route>,
    default: RunnableRef,
}

impl Branch {
    /// Start building a branch.
    pub fn builder(name: impl Into<String>) -> BranchBuilder {
        BranchBuilder {
            name: name.into(),
            routes: Vec::new(),
            default: None,
        }
    }

    /// Route labels in evaluation order (the default is not included).
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.label.as_str())
    }

    /// Index of the route that would run for `input`, `None` for the default.
    ///
    /// Evaluates predicates in order and stops at the first that holds.
    pub fn select(&self, input: &Value) -> Result<Option<usize>> {
        for (index, route) in self.routes.iter().enumerate() {
            match (route.predicate)(input) {
                Ok(true) => return Ok(Some(index)),
                Ok(false) => continue,
                Err(e) => {
                    return Err(RunnableError::nested(
                        &self.name,
                        "branch",
                        Position::Predicate(index),
                        RunnableError::unit(&route.label, e),
                    ))
                }
            }
        }
        Ok(None)
    }

    /// Select a route and run it.
    pub async fn execute(&self, ctx: &ExecCtx, input: Value) -> Result<Value> {
        let (label, position, unit) = match self.select(&input)? {
            Some(index) => {
                let route = &self.routes[index];
                (route.label.as_str(), Position::Route(index), &route.unit)
            }
            None => (DEFAULT_ROUTE, Position::Default, &self.default),
        };

        tracing::debug!(branch = %self.name, route = label, "route selected");
        emit(
            &ctx.event_handler,
            Event::RouteSelected {
                branch: self.name.clone(),
                route: label.to_string(),
            },
        );

        observe(ctx, unit.as_ref(), input)
            .await
            .map_err(|e| RunnableError::nested(&self.name, "branch", position, e))
    }
}

impl Runnable for Branch {
    fn kind(&self) -> &'static str {
        "branch"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(self.execute(ctx, input))
    }

    fn add_to_graph(&self, graph: &mut Graph) -> Fragment {
        let decision = graph.add_node(self.kind(), self.name());
        let mut exits = Vec::new();

        let candidates = self
            .routes
            .iter()
            .map(|r| (r.label.as_str(), &r.unit))
            .chain(std::iter::once((DEFAULT_ROUTE, &self.default)));
        for (label, unit) in candidates {
            let fragment = graph.add_child(unit);
            graph.connect_conditional(decision, fragment.entry, label);
            for exit in fragment.exits {
                if !exits.contains(&exit) {
                    exits.push(exit);
                }
            }
        }

        Fragment {
            entry: decision,
            exits,
        }
    }
}

/// Builder for [`Branch`].
pub struct BranchBuilder {
    name: String,
    routes: Vec<Route>,
    default: Option<RunnableRef>,
}

impl BranchBuilder {
    /// Add a route guarded by an infallible predicate.
    pub fn when(
        self,
        label: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
        unit: impl Runnable + 'static,
    ) -> Self {
        self.try_when(label, move |v| Ok(predicate(v)), unit)
    }

    /// Add a route guarded by a predicate that may fail.
    ///
    /// A failing predicate fails the whole branch call, reported at
    /// [`Position::Predicate`].
    pub fn try_when(
        self,
        label: impl Into<String>,
        predicate: impl Fn(&Value) -> anyhow::Result<bool> + Send + Sync + 'static,
        unit: impl Runnable + 'static,
    ) -> Self {
        self.route_shared(label, Arc::new(predicate), Arc::new(unit))
    }

    /// Add a route whose predicate and runnable are shared elsewhere.
    pub fn route_shared(mut self, label: impl Into<String>, predicate: Predicate, unit: RunnableRef) -> Self {
        self.routes.push(Route {
            label: label.into(),
            predicate,
            unit,
        });
        self
    }

    /// Set the default runnable, used when no predicate holds.
    pub fn otherwise(mut self, unit: impl Runnable + 'static) -> Self {
        self.default = Some(Arc::new(unit));
        self
    }

    /// Set a shared default runnable.
    pub fn otherwise_shared(mut self, unit: RunnableRef) -> Self {
        self.default = Some(unit);
        self
    }

    /// Build the branch. A default is mandatory.
    pub fn build(self) -> Result<Branch> {
        let Some(default) = self.default else {
            if self.routes.is_empty() {
                return Err(RunnableError::Composition(format!(
                    "branch '{}' has no routes and no default",
                    self.name
                )));
            }
            return Err(RunnableError::RoutingExhausted { branch: self.name });
        };
        Ok(Branch {
            name: self.name,
            routes: self.routes,
            default,
        })
    }
}
