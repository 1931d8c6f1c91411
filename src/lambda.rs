//! Arbitrary functions as runnables.

use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    runnable::{BoxFut, Runnable},
    RunnableError,
};
use serde_json::Value;
use std::sync::Arc;

/// Type alias for the function wrapped by a [`Lambda`].
pub type LambdaFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Wraps a single-argument function as a runnable.
///
/// Errors returned by the function are reported as
/// [`RunnableError::UnitExecution`] attributed to the lambda's name.
/// The function should be a pure transform; it receives its own copy of the
/// input value.
///
/// # Example
///
/// ```
/// use llm_runnable::{ExecCtx, Lambda, Runnable};
/// use serde_json::json;
///
/// let len = Lambda::new("len", |v| {
///     let text = v.as_str().ok_or_else(|| anyhow::anyhow!("expected a string"))?;
///     Ok(json!(text.chars().count()))
/// });
///
/// let out = tokio_test::block_on(len.invoke(&ExecCtx::new(), json!("hello"))).unwrap();
/// assert_eq!(out, json!(5));
/// ```
#[derive(Clone)]
pub struct Lambda {
    name: String,
    func: LambdaFn,
}

impl Lambda {
    /// Wrap a fallible function.
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(f),
        }
    }

    /// Wrap a function that cannot fail.
    pub fn map(name: impl Into<String>, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self::new(name, move |v| Ok(f(v)))
    }
}

impl std::fmt::Debug for Lambda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lambda").field("name", &self.name).finish()
    }
}

impl Runnable for Lambda {
    fn kind(&self) -> &'static str {
        "lambda"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move { (self.func)(input).map_err(|e| RunnableError::unit(&self.name, e)) })
    }
}
