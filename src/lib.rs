//! # uastq - Universal AST query engine
//!
//! Language-agnostic syntax trees and a small pipe-composed query language
//! for extracting and filtering their nodes.
//!
//! uastq provides:
//! - A universal tree model (`Node`) with iterative traversal, transforms and stable ids
//! - A query DSL (`map`, `filter`, `rmap`, `rfilter`, `reduce`, field access, operators)
//! - A compiler lowering parsed queries into reusable query functions
//! - A lock-free node pool for the literal values queries synthesize
//!
//! ```no_run
//! use uastq::{Node, QueryEngine};
//!
//! let tree = Node::builder()
//!     .node_type("File")
//!     .child(Node::with_token("Function", "main"))
//!     .build();
//!
//! let engine = QueryEngine::default();
//! let functions = engine.query(&tree, "rfilter(.type == \"Function\")").unwrap();
//! assert_eq!(functions.len(), 1);
//! ```

pub mod config;
pub mod dsl;
pub mod node;
pub mod query;

// Re-exports for convenient access
pub use config::EngineConfig;
pub use dsl::{parse, DslNode, ParseError};
pub use node::{Node, NodeBuilder, NodeKey, NodePool, Positions};
pub use query::engine::{CompiledQuery, QueryEngine};
pub use query::{LowerError, NodeRef, QueryFn, QueryFunc};

/// Result type alias for uastq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for uastq operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("empty query")]
    EmptyQuery,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("lowering error: {0}")]
    Lower(#[from] LowerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
