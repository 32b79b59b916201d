//! Path expressions over model properties.
//!
//! A path names a property on the root type or on nodes reached through
//! relationships. The grammar is small:
//!
//! ```text
//! expr := term (',' term)*
//! term := '{' expr '}' | name ( '.' term | '{' expr '}' )?
//! name := [A-Za-z_][A-Za-z0-9_]*
//! ```
//!
//! Parsing produces a [`PathExpr`] tree. Resolving a tree against a [`Schema`]
//! produces a [`ModelPath`]: ordered [`PathStep`]s where steps through the same
//! property at the same level are merged.

use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::graph::ObjectGraph;
use crate::schema::{PropertyDef, Schema};
use crate::NodeId;

/// Marker separating a relationship from the path continued on its targets.
pub const NESTING_MARKER: char = '.';

/// Marker opening a union group.
pub const UNION_OPEN: char = '{';

/// Marker closing a union group.
pub const UNION_CLOSE: char = '}';

/// Parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathExpr {
    /// A property on the current type.
    Leaf(String),
    /// A relationship followed by a path on its target type.
    Nested(String, Box<PathExpr>),
    /// Two independent paths on the same type.
    Union(Box<PathExpr>, Box<PathExpr>),
}

impl PathExpr {
    /// Parse a path expression.
    pub fn parse(text: &str) -> ModelResult<Self> {
        Parser::new(text).parse()
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self::Leaf(name.into())
    }

    pub fn nested(name: impl Into<String>, rest: PathExpr) -> Self {
        Self::Nested(name.into(), Box::new(rest))
    }

    /// Combine expressions into one union group. `None` when `exprs` is empty.
    pub fn union_of(exprs: impl IntoIterator<Item = PathExpr>) -> Option<Self> {
        exprs
            .into_iter()
            .reduce(|left, right| Self::Union(Box::new(left), Box::new(right)))
    }

    /// Whether a property string uses nesting or union syntax.
    ///
    /// Plain names need no parsing and always address the root node.
    pub fn is_path_syntax(text: &str) -> bool {
        text.contains(NESTING_MARKER) || text.contains(UNION_OPEN)
    }

    /// The members of a union group, flattened; a non-union is its own single member.
    pub fn members(&self) -> Vec<&PathExpr> {
        let mut members = Vec::new();
        self.collect_members(&mut members);
        members
    }

    /// Owned variant of [`members`](Self::members).
    pub fn into_members(self) -> Vec<PathExpr> {
        match self {
            Self::Union(left, right) => {
                let mut members = left.into_members();
                members.extend(right.into_members());
                members
            }
            other => vec![other],
        }
    }

    /// Names of the properties this expression starts from, in order, without duplicates.
    pub fn root_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for member in self.members() {
            let name = match member {
                Self::Leaf(name) | Self::Nested(name, _) => name.as_str(),
                Self::Union(..) => continue,
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a PathExpr>) {
        match self {
            Self::Union(left, right) => {
                left.collect_members(out);
                right.collect_members(out);
            }
            other => out.push(other),
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(name) => write!(f, "{name}"),
            Self::Nested(name, rest) => match rest.as_ref() {
                Self::Union(..) => write!(f, "{name}{rest}"),
                _ => write!(f, "{name}{NESTING_MARKER}{rest}"),
            },
            Self::Union(..) => {
                write!(f, "{UNION_OPEN}")?;
                for (i, member) in self.members().into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, "{UNION_CLOSE}")
            }
        }
    }
}

impl std::str::FromStr for PathExpr {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> ModelResult<PathExpr> {
        let expr = self.expr()?;
        self.skip_whitespace();
        match self.peek() {
            None => Ok(expr),
            Some(c) => Err(self.error(format!("unexpected '{c}'"))),
        }
    }

    fn expr(&mut self) -> ModelResult<PathExpr> {
        let mut expr = self.term()?;
        loop {
            self.skip_whitespace();
            if !self.eat(',') {
                return Ok(expr);
            }
            let right = self.term()?;
            expr = PathExpr::Union(Box::new(expr), Box::new(right));
        }
    }

    fn term(&mut self) -> ModelResult<PathExpr> {
        self.skip_whitespace();
        if self.eat(UNION_OPEN) {
            return self.group();
        }

        let name = self.name()?;
        self.skip_whitespace();
        if self.eat(NESTING_MARKER) {
            let rest = self.term()?;
            Ok(PathExpr::nested(name, rest))
        } else if self.eat(UNION_OPEN) {
            let rest = self.group()?;
            Ok(PathExpr::nested(name, rest))
        } else {
            Ok(PathExpr::Leaf(name))
        }
    }

    /// Parse the inside of a union group; the opening brace is already consumed.
    fn group(&mut self) -> ModelResult<PathExpr> {
        let expr = self.expr()?;
        self.skip_whitespace();
        if self.eat(UNION_CLOSE) {
            Ok(expr)
        } else {
            Err(self.error(format!("expected '{UNION_CLOSE}'")))
        }
    }

    fn name(&mut self) -> ModelResult<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let valid = if self.pos == start {
                c.is_ascii_alphabetic() || c == '_'
            } else {
                c.is_ascii_alphanumeric() || c == '_'
            };
            if !valid {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected property name"));
        }
        Ok(self.chars[start..self.pos].iter().map(|(_, c)| c).collect())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ModelError {
        let offset = self
            .chars
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.text.len());
        ModelError::path_syntax(self.text, offset, message)
    }
}

/// One traversal step of a resolved path.
#[derive(Debug, Clone)]
pub struct PathStep {
    id: usize,
    property: PropertyDef,
    next: Vec<PathStep>,
}

impl PathStep {
    /// Identifier unique within the owning [`ModelPath`].
    pub fn id(&self) -> usize {
        self.id
    }

    /// Property this step reads.
    pub fn property(&self) -> &PropertyDef {
        &self.property
    }

    /// Steps continuing from the nodes this step reaches.
    pub fn next_steps(&self) -> &[PathStep] {
        &self.next
    }

    /// Whether the path ends at this step.
    pub fn is_leaf(&self) -> bool {
        self.next.is_empty()
    }

    /// Nodes reached from `origin` through this step's property.
    pub fn instances(&self, graph: &ObjectGraph, origin: NodeId) -> Vec<NodeId> {
        graph.related(origin, &self.property.name)
    }
}

/// A path expression resolved against a root type.
#[derive(Debug, Clone)]
pub struct ModelPath {
    root_type: String,
    expr: PathExpr,
    steps: Vec<PathStep>,
    step_count: usize,
}

impl ModelPath {
    /// Parse and resolve a path in one go.
    pub fn parse(schema: &Schema, root_type: &str, text: &str) -> ModelResult<Self> {
        Self::resolve(schema, root_type, &PathExpr::parse(text)?)
    }

    /// Resolve an expression against `root_type`.
    pub fn resolve(schema: &Schema, root_type: &str, expr: &PathExpr) -> ModelResult<Self> {
        schema.require(root_type)?;
        let mut steps = Vec::new();
        let mut next_id = 0;
        build_steps(schema, root_type, expr, &mut steps, &mut next_id)?;
        Ok(Self {
            root_type: root_type.to_string(),
            expr: expr.clone(),
            steps,
            step_count: next_id,
        })
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    pub fn expr(&self) -> &PathExpr {
        &self.expr
    }

    /// Steps taken from the root node.
    pub fn first_steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Total number of distinct steps in the path tree.
    pub fn step_count(&self) -> usize {
        self.step_count
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

fn build_steps(
    schema: &Schema,
    type_name: &str,
    expr: &PathExpr,
    steps: &mut Vec<PathStep>,
    next_id: &mut usize,
) -> ModelResult<()> {
    match expr {
        PathExpr::Leaf(name) => {
            step_for(schema, type_name, name, steps, next_id)?;
        }
        PathExpr::Nested(name, rest) => {
            let step = step_for(schema, type_name, name, steps, next_id)?;
            let target = step
                .property
                .target_type()
                .ok_or_else(|| ModelError::NotARelationship {
                    type_name: type_name.to_string(),
                    property: name.clone(),
                    expected: "navigable",
                })?
                .to_string();
            build_steps(schema, &target, rest, &mut step.next, next_id)?;
        }
        PathExpr::Union(left, right) => {
            build_steps(schema, type_name, left, steps, next_id)?;
            build_steps(schema, type_name, right, steps, next_id)?;
        }
    }
    Ok(())
}

fn step_for<'s>(
    schema: &Schema,
    type_name: &str,
    name: &str,
    steps: &'s mut Vec<PathStep>,
    next_id: &mut usize,
) -> ModelResult<&'s mut PathStep> {
    let index = match steps.iter().position(|s| s.property.name == name) {
        Some(index) => index,
        None => {
            let property = schema.property(type_name, name)?.clone();
            steps.push(PathStep {
                id: *next_id,
                property,
                next: Vec::new(),
            });
            *next_id += 1;
            steps.len() - 1
        }
    };
    Ok(&mut steps[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ModelType;

    fn leaf(name: &str) -> PathExpr {
        PathExpr::leaf(name)
    }

    #[test]
    fn test_parse_leaf_and_nested() {
        assert_eq!(PathExpr::parse("Name").unwrap(), leaf("Name"));
        assert_eq!(
            PathExpr::parse("Child.Name").unwrap(),
            PathExpr::nested("Child", leaf("Name"))
        );
        assert_eq!(
            PathExpr::parse(" Order . Customer . Name ").unwrap(),
            PathExpr::nested("Order", PathExpr::nested("Customer", leaf("Name")))
        );
    }

    #[test]
    fn test_parse_union_groups() {
        let expr = PathExpr::parse("{A,B.C}").unwrap();
        assert_eq!(
            expr,
            PathExpr::Union(
                Box::new(leaf("A")),
                Box::new(PathExpr::nested("B", leaf("C")))
            )
        );

        let braces = PathExpr::parse("Items{Qty,Price}").unwrap();
        let dotted = PathExpr::parse("Items.{Qty,Price}").unwrap();
        assert_eq!(braces, dotted);
        assert_eq!(braces.to_string(), "Items{Qty,Price}");
    }

    #[test]
    fn test_top_level_comma_is_a_union() {
        let expr = PathExpr::parse("A, B, C").unwrap();
        assert_eq!(expr.members().len(), 3);
        assert_eq!(expr.to_string(), "{A,B,C}");
    }

    #[test]
    fn test_parse_errors_report_position() {
        let cases = [("", 0), ("Child.", 6), ("{A,B", 4), ("A}", 1), ("1abc", 0)];
        for (text, expected) in cases {
            match PathExpr::parse(text) {
                Err(ModelError::PathSyntax { position, .. }) => {
                    assert_eq!(position, expected, "position for {text:?}")
                }
                other => panic!("expected syntax error for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_union_of_and_members() {
        let expr = PathExpr::union_of(vec![leaf("A"), leaf("B"), leaf("C")]).unwrap();
        let names: Vec<_> = expr.members().iter().map(|m| m.to_string()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(PathExpr::union_of(Vec::new()).is_none());

        let nested = PathExpr::parse("{A.X,A.Y,B}").unwrap();
        assert_eq!(nested.root_names(), vec!["A", "B"]);
    }

    #[test]
    fn test_is_path_syntax() {
        assert!(!PathExpr::is_path_syntax("Name"));
        assert!(PathExpr::is_path_syntax("Child.Name"));
        assert!(PathExpr::is_path_syntax("{Name}"));
    }

    fn schema() -> Schema {
        Schema::new()
            .with_type(
                ModelType::new("Parent")
                    .with_value("Name")
                    .with_reference("Child", "Child")
                    .with_list("Children", "Child"),
            )
            .and_then(|s| {
                s.with_type(
                    ModelType::new("Child")
                        .with_value("Name")
                        .with_value("Age")
                        .with_reference("Parent", "Parent"),
                )
            })
            .unwrap()
    }

    #[test]
    fn test_resolve_merges_shared_steps() {
        let path = ModelPath::parse(&schema(), "Parent", "{Child.Name,Child.Age,Name}").unwrap();
        let steps = path.first_steps();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].property().name, "Child");
        assert!(!steps[0].is_leaf());
        let next: Vec<_> = steps[0]
            .next_steps()
            .iter()
            .map(|s| s.property().name.as_str())
            .collect();
        assert_eq!(next, vec!["Name", "Age"]);
        assert!(steps[1].is_leaf());
        assert_eq!(path.step_count(), 4);
    }

    #[test]
    fn test_resolve_errors() {
        let schema = schema();
        assert!(matches!(
            ModelPath::parse(&schema, "Parent", "Missing"),
            Err(ModelError::UnknownProperty { .. })
        ));
        assert!(matches!(
            ModelPath::parse(&schema, "Parent", "Name.Length"),
            Err(ModelError::NotARelationship { .. })
        ));
        assert!(matches!(
            ModelPath::parse(&schema, "Nope", "Name"),
            Err(ModelError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_step_instances() {
        let schema = schema();
        let mut graph = ObjectGraph::new(schema.clone());
        let parent = graph.add_node("Parent").unwrap();
        let a = graph.add_node("Child").unwrap();
        let b = graph.add_node("Child").unwrap();
        graph.push(parent, "Children", a).unwrap();
        graph.push(parent, "Children", b).unwrap();

        let path = ModelPath::parse(&schema, "Parent", "Children.Name").unwrap();
        let step = &path.first_steps()[0];
        assert_eq!(step.instances(&graph, parent), vec![a, b]);
        assert!(step.next_steps()[0].instances(&graph, a).is_empty());
    }
}
