//! Identity runnable.

use crate::{
    error::Result,
    exec_ctx::ExecCtx,
    runnable::{BoxFut, Runnable},
};
use serde_json::Value;

/// Returns its input unchanged.
///
/// Mostly useful as a [`Parallel`](crate::Parallel) branch, to keep the
/// original input next to values derived from it, or as a
/// [`Branch`](crate::Branch) default that leaves the value alone.
#[derive(Debug, Clone)]
pub struct Passthrough {
    name: String,
}

impl Passthrough {
    pub fn new() -> Self {
        Self::named("passthrough")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Runnable for Passthrough {
    fn kind(&self) -> &'static str {
        "passthrough"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<Value>> {
        Box::pin(async move { Ok(input) })
    }
}
