//! Query language syntax tree.
//!
//! A parsed query is a closed set of forms. `Display` renders the canonical
//! stringified form, e.g. `Pipeline(Map(Field(children)) | Reduce(Call(count)))`.

pub mod parser;

pub use parser::{parse, ParseError};

use std::fmt;

/// Parsed query expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DslNode {
    /// Stages applied left to right
    Pipeline(Vec<DslNode>),
    /// Apply to each input node, concatenating results
    Map(Box<DslNode>),
    /// Apply to every node of each input subtree
    RMap(Box<DslNode>),
    /// Keep input nodes whose predicate is true
    Filter(Box<DslNode>),
    /// Keep every node of each input subtree whose predicate is true
    RFilter(Box<DslNode>),
    /// Aggregate the whole input
    Reduce(Box<DslNode>),
    /// Field path, one entry per segment
    Field(Vec<String>),
    /// String, number or boolean in its textual form
    Literal(String),
    /// Operator or function application
    Call { name: String, args: Vec<DslNode> },
}

impl DslNode {
    pub fn field<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Field(segments.into_iter().map(Into::into).collect())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<DslNode>) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    /// Whether this is the bare `.children` field
    pub fn is_children_field(&self) -> bool {
        matches!(self, Self::Field(path) if path.len() == 1 && path[0] == "children")
    }

    /// Variant name, used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "Pipeline",
            Self::Map(_) => "Map",
            Self::RMap(_) => "RMap",
            Self::Filter(_) => "Filter",
            Self::RFilter(_) => "RFilter",
            Self::Reduce(_) => "Reduce",
            Self::Field(_) => "Field",
            Self::Literal(_) => "Literal",
            Self::Call { .. } => "Call",
        }
    }
}

impl fmt::Display for DslNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline(stages) => {
                write!(f, "Pipeline(")?;
                for (i, stage) in stages.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", stage)?;
                }
                write!(f, ")")
            }
            Self::Map(expr) => write!(f, "Map({})", expr),
            Self::RMap(expr) => write!(f, "RMap({})", expr),
            Self::Filter(expr) => write!(f, "Filter({})", expr),
            Self::RFilter(expr) => write!(f, "RFilter({})", expr),
            Self::Reduce(expr) => write!(f, "Reduce({})", expr),
            Self::Field(path) => write!(f, "Field({})", path.join(".")),
            Self::Literal(value) => write!(f, "Literal({})", value),
            Self::Call { name, args } => {
                write!(f, "Call({}", name)?;
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        let pipeline = DslNode::Pipeline(vec![
            DslNode::Map(Box::new(DslNode::field(["children"]))),
            DslNode::Filter(Box::new(DslNode::call(
                "==",
                vec![DslNode::field(["type"]), DslNode::literal("FunctionDecl")],
            ))),
        ]);
        assert_eq!(
            pipeline.to_string(),
            "Pipeline(Map(Field(children)) | Filter(Call(==, Field(type), Literal(FunctionDecl))))"
        );

        let count = DslNode::Reduce(Box::new(DslNode::call("count", vec![])));
        assert_eq!(count.to_string(), "Reduce(Call(count))");
        assert_eq!(DslNode::literal("").to_string(), "Literal()");
        assert_eq!(DslNode::field(["props", "a", "b"]).to_string(), "Field(props.a.b)");
    }

    #[test]
    fn test_children_field() {
        assert!(DslNode::field(["children"]).is_children_field());
        assert!(!DslNode::field(["children", "type"]).is_children_field());
        assert!(!DslNode::literal("children").is_children_field());
    }
}
