//! Expressions evaluated against a node, with declared dependencies.

use std::fmt;
use std::sync::Arc;

use vigil_model::{NodeId, ObjectGraph, PathExpr};

use crate::error::ConditionResult;

type Evaluator<T> = Arc<dyn Fn(&ObjectGraph, NodeId) -> ConditionResult<T> + Send + Sync>;

/// A value computed from a node, plus the path of properties it reads.
///
/// The path is what rules re-evaluate on; the evaluator itself is opaque.
pub struct ModelExpression<T> {
    path: Option<PathExpr>,
    evaluate: Evaluator<T>,
}

impl<T> ModelExpression<T> {
    /// Create an expression that reads the properties named by `path`.
    ///
    /// An empty `path` declares no dependencies.
    pub fn new<F>(path: &str, evaluate: F) -> ConditionResult<Self>
    where
        F: Fn(&ObjectGraph, NodeId) -> ConditionResult<T> + Send + Sync + 'static,
    {
        let path = match path.trim() {
            "" => None,
            text => Some(PathExpr::parse(text)?),
        };
        Ok(Self {
            path,
            evaluate: Arc::new(evaluate),
        })
    }

    /// Create an expression from an infallible function.
    pub fn infallible<F>(path: &str, evaluate: F) -> ConditionResult<Self>
    where
        F: Fn(&ObjectGraph, NodeId) -> T + Send + Sync + 'static,
    {
        Self::new(path, move |graph, node| Ok(evaluate(graph, node)))
    }

    /// Create an expression that ignores the graph.
    pub fn constant(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self {
            path: None,
            evaluate: Arc::new(move |_, _| Ok(value.clone())),
        }
    }

    pub fn path(&self) -> Option<&PathExpr> {
        self.path.as_ref()
    }

    pub fn evaluate(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<T> {
        (self.evaluate)(graph, node)
    }
}

impl<T> Clone for ModelExpression<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            evaluate: Arc::clone(&self.evaluate),
        }
    }
}

impl<T> fmt::Debug for ModelExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelExpression")
            .field("path", &self.path.as_ref().map(ToString::to_string))
            .finish_non_exhaustive()
    }
}
