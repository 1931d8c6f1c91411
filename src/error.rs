use std::fmt;
use thiserror::Error;

/// Boxed underlying cause carried by [`RunnableError::UnitExecution`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Where inside a composite a child failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// Member index inside a sequence (0-based).
    Step(usize),
    /// Branch key inside a parallel.
    Key(String),
    /// Route index inside a branch (0-based).
    Route(usize),
    /// Predicate index inside a branch (0-based).
    Predicate(usize),
    /// The default route of a branch.
    Default,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Step(i) => write!(f, "step {}", i),
            Position::Key(key) => write!(f, "branch '{}'", key),
            Position::Route(i) => write!(f, "route {}", i),
            Position::Predicate(i) => write!(f, "predicate {}", i),
            Position::Default => write!(f, "default route"),
        }
    }
}

/// Errors produced while building or invoking runnables.
#[derive(Error, Debug)]
pub enum RunnableError {
    /// A leaf unit's own logic failed.
    #[error("unit '{unit}' failed: {source}")]
    UnitExecution {
        /// Instance name of the failing unit.
        unit: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// A child of a composite failed; the composite adds its own position.
    #[error("{position} of {kind} '{parent}' failed: {source}")]
    Nested {
        /// Instance name of the composite.
        parent: String,
        /// Kind of the composite (`"sequence"`, `"parallel"`, `"branch"`).
        kind: &'static str,
        /// Where the failing child sits in the composite.
        position: Position,
        /// The child's error, unchanged.
        #[source]
        source: Box<RunnableError>,
    },

    /// Structural misuse detected at construction time.
    #[error("invalid composition: {0}")]
    Composition(String),

    /// A branch was built so that no route could run for some inputs.
    #[error("branch '{branch}' has no default route")]
    RoutingExhausted {
        /// Instance name of the branch.
        branch: String,
    },

    /// Typed extraction of an output value failed.
    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunnableError {
    /// Wrap a leaf failure, attributing it to `unit`.
    pub fn unit(unit: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RunnableError::UnitExecution {
            unit: unit.into(),
            source: source.into(),
        }
    }

    /// Annotate a child failure with the composite's position.
    pub fn nested(
        parent: impl Into<String>,
        kind: &'static str,
        position: Position,
        source: RunnableError,
    ) -> Self {
        RunnableError::Nested {
            parent: parent.into(),
            kind,
            position,
            source: Box::new(source),
        }
    }

    /// The innermost error, past every composite annotation.
    pub fn root_cause(&self) -> &RunnableError {
        let mut current = self;
        while let RunnableError::Nested { source, .. } = current {
            current = source;
        }
        current
    }

    /// Composite positions from the outermost composite down to the failing child.
    pub fn path(&self) -> Vec<(&str, &Position)> {
        let mut path = Vec::new();
        let mut current = self;
        while let RunnableError::Nested {
            parent,
            position,
            source,
            ..
        } = current
        {
            path.push((parent.as_str(), position));
            current = source;
        }
        path
    }

    /// Name of the leaf unit that failed, if the failure came from one.
    pub fn failing_unit(&self) -> Option<&str> {
        match self.root_cause() {
            RunnableError::UnitExecution { unit, .. } => Some(unit),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnableError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> RunnableError {
        RunnableError::unit("parser", anyhow::anyhow!("bad json"))
    }

    #[test]
    fn test_unit_error_display() {
        assert_eq!(leaf().to_string(), "unit 'parser' failed: bad json");
    }

    #[test]
    fn test_nested_display_names_position() {
        let err = RunnableError::nested("study", "parallel", Position::Key("quiz".into()), leaf());
        assert_eq!(
            err.to_string(),
            "branch 'quiz' of parallel 'study' failed: unit 'parser' failed: bad json"
        );
    }

    #[test]
    fn test_path_and_root_cause() {
        let inner = RunnableError::nested("inner", "sequence", Position::Step(2), leaf());
        let outer = RunnableError::nested("outer", "branch", Position::Default, inner);

        let path = outer.path();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], ("outer", &Position::Default));
        assert_eq!(path[1], ("inner", &Position::Step(2)));
        assert!(matches!(
            outer.root_cause(),
            RunnableError::UnitExecution { .. }
        ));
        assert_eq!(outer.failing_unit(), Some("parser"));
    }

    #[test]
    fn test_composition_has_no_failing_unit() {
        let err = RunnableError::Composition("empty".into());
        assert!(err.path().is_empty());
        assert_eq!(err.failing_unit(), None);
    }
}
