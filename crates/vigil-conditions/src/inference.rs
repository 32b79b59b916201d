//! Predicate dependency inference.
//!
//! A governing predicate is an opaque boolean function over a node. To know
//! when it must be re-evaluated, the engine needs the names of the properties
//! it reads. Those are either listed by the caller or inferred by a
//! [`PredicateInference`] implementation.
//!
//! [`SourceInference`] works from the predicate's definition text, which the
//! [`predicate!`](crate::predicate) macro records alongside the closure:
//!
//! ```
//! use vigil_conditions::{predicate, PredicateInference, SourceInference};
//!
//! let empty = predicate!(|graph, node| graph.list(node, "LineItems").is_empty());
//! let names = SourceInference::new().infer(&empty, &|name| name == "LineItems");
//! assert_eq!(names, vec!["LineItems".to_string()]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;
use vigil_model::{NodeId, ObjectGraph};

type PredicateFn = Arc<dyn Fn(&ObjectGraph, NodeId) -> bool + Send + Sync>;

/// A boolean function over a node, optionally carrying its definition text.
#[derive(Clone)]
pub struct Predicate {
    source: Option<&'static str>,
    test: PredicateFn,
}

impl Predicate {
    /// Wrap a function with no recorded definition.
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(&ObjectGraph, NodeId) -> bool + Send + Sync + 'static,
    {
        Self {
            source: None,
            test: Arc::new(test),
        }
    }

    /// Wrap a function together with its definition text.
    ///
    /// Usually called through [`predicate!`](crate::predicate).
    pub fn with_source<F>(source: &'static str, test: F) -> Self
    where
        F: Fn(&ObjectGraph, NodeId) -> bool + Send + Sync + 'static,
    {
        Self {
            source: Some(source),
            test: Arc::new(test),
        }
    }

    pub fn source(&self) -> Option<&'static str> {
        self.source
    }

    pub fn test(&self, graph: &ObjectGraph, node: NodeId) -> bool {
        (self.test)(graph, node)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Build a [`Predicate`] from a closure, recording the closure's text.
#[macro_export]
macro_rules! predicate {
    ($($body:tt)+) => {
        $crate::Predicate::with_source(stringify!($($body)+), $($body)+)
    };
}

/// Derives the property names a predicate depends on.
pub trait PredicateInference: Send + Sync {
    /// Ordered, duplicate-free property names read by `predicate` that `filter` accepts.
    ///
    /// An empty result means the dependencies are unknown.
    fn infer(&self, predicate: &Predicate, filter: &dyn Fn(&str) -> bool) -> Vec<String>;
}

/// Never infers anything; dependencies must be listed explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplicitDependencies;

impl PredicateInference for ExplicitDependencies {
    fn infer(&self, _predicate: &Predicate, _filter: &dyn Fn(&str) -> bool) -> Vec<String> {
        Vec::new()
    }
}

/// Infers dependencies from a predicate's definition text.
///
/// Every string literal and identifier in the text is a candidate; the filter
/// keeps those that name properties of the root type. Candidates are cached
/// per definition.
#[derive(Debug, Default)]
pub struct SourceInference {
    cache: RwLock<HashMap<&'static str, Arc<Vec<String>>>>,
}

impl SourceInference {
    pub fn new() -> Self {
        Self::default()
    }

    fn candidates(&self, source: &'static str) -> Arc<Vec<String>> {
        if let Some(cached) = self.cache.read().get(source) {
            return Arc::clone(cached);
        }
        let tokens = Arc::new(tokens(source));
        trace!(source, candidates = tokens.len(), "Scanned predicate source");
        self.cache.write().insert(source, Arc::clone(&tokens));
        tokens
    }

    /// Number of cached definitions.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

impl PredicateInference for SourceInference {
    fn infer(&self, predicate: &Predicate, filter: &dyn Fn(&str) -> bool) -> Vec<String> {
        let Some(source) = predicate.source() else {
            return Vec::new();
        };
        self.candidates(source)
            .iter()
            .filter(|name| filter(name))
            .cloned()
            .collect()
    }
}

/// String literal contents and identifiers, in order of first appearance.
fn tokens(source: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |token: String| {
        if !token.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    };

    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            let mut literal = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            literal.push(escaped);
                        }
                    }
                    '"' => break,
                    c => literal.push(c),
                }
            }
            push(literal);
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::from(c);
            while let Some(&next) = chars.peek() {
                if !(next.is_alphanumeric() || next == '_') {
                    break;
                }
                ident.push(next);
                chars.next();
            }
            push(ident);
        } else if c.is_ascii_digit() {
            while chars.peek().is_some_and(|n| n.is_alphanumeric() || *n == '_') {
                chars.next();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::order_graph;

    fn order_properties(name: &str) -> bool {
        matches!(name, "Number" | "Customer" | "LineItems" | "Total")
    }

    #[test]
    fn test_tokens_scan_literals_and_identifiers() {
        let found = tokens(r#"|g, n| g.value(n, "Total").is_none() && Total2 > 10"#);
        assert_eq!(found, vec!["g", "n", "value", "Total", "is_none", "Total2"]);
    }

    #[test]
    fn test_source_inference_filters_to_properties() {
        let p = predicate!(|g, n| g.is_unset(n, "Customer") && g.list(n, "LineItems").is_empty());
        let inferred = SourceInference::new().infer(&p, &order_properties);
        assert_eq!(inferred, vec!["Customer".to_string(), "LineItems".to_string()]);
    }

    #[test]
    fn test_source_inference_caches_per_definition() {
        let inference = SourceInference::new();
        let p = predicate!(|g, n| g.is_unset(n, "Number"));

        assert_eq!(inference.infer(&p, &order_properties), vec!["Number".to_string()]);
        assert_eq!(inference.infer(&p.clone(), &order_properties), vec!["Number".to_string()]);
        assert_eq!(inference.cached(), 1);
    }

    #[test]
    fn test_predicate_without_source_infers_nothing() {
        let p = Predicate::new(|g, n| g.is_unset(n, "Number"));
        assert!(SourceInference::new().infer(&p, &order_properties).is_empty());
        assert!(ExplicitDependencies.infer(&p, &order_properties).is_empty());
    }

    #[test]
    fn test_predicate_evaluates() {
        let (graph, order) = order_graph(0);
        let p = predicate!(|g, n| g.list(n, "LineItems").is_empty());
        assert!(p.test(&graph, order));
    }
}
