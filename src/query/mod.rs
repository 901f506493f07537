//! Query execution.
//!
//! A parsed [`DslNode`](crate::DslNode) is lowered by the [`lower::Compiler`]
//! into a [`QueryFunc`]: a composable function from a sequence of nodes to a
//! sequence of nodes. Operators and field access are looked up in registries
//! owned by the compiler.

pub mod engine;
pub mod fields;
pub mod lower;
pub mod operators;

pub use engine::{CompiledQuery, QueryEngine};
pub use fields::{FieldAccess, FieldRegistry};
pub use lower::Compiler;
pub use operators::OperatorRegistry;

use std::borrow::Cow;
use std::sync::Arc;

use crate::node::{Node, NodePool};

/// A query value: a node of the queried tree, or one the query synthesized
pub type NodeRef<'a> = Cow<'a, Node>;

/// Executable query stage
pub trait QueryFn: Send + Sync {
    /// Map an input sequence to an output sequence
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>>;
}

/// Shared handle to a lowered query
pub type QueryFunc = Arc<dyn QueryFn>;

/// Failure while lowering a parsed query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("operator {op} expects {expected} argument(s), got {found}")]
    Arity {
        op: String,
        expected: usize,
        found: usize,
    },

    #[error("unsupported reduce {0}: only count is supported")]
    UnsupportedReduce(String),

    #[error("empty pipeline")]
    EmptyPipeline,

    #[error("invalid field: empty path")]
    InvalidField,
}

/// Truthiness of a predicate result: its first value is the literal `"true"`
pub fn is_true(result: &[NodeRef<'_>]) -> bool {
    result
        .first()
        .is_some_and(|node| node.is_literal() && node.token == "true")
}

/// Synthesize a `"true"` / `"false"` literal
pub(crate) fn bool_literal<'a>(pool: &NodePool, value: bool) -> NodeRef<'a> {
    Cow::Owned(pool.literal(if value { "true" } else { "false" }))
}

/// Children of a query value, borrowed when the value is borrowed
pub(crate) fn children_of<'a>(node: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    match node {
        Cow::Borrowed(borrowed) => {
            let borrowed: &'a Node = *borrowed;
            borrowed.children.iter().map(Cow::Borrowed).collect()
        }
        Cow::Owned(owned) => owned.children.iter().cloned().map(Cow::Owned).collect(),
    }
}
