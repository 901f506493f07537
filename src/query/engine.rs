//! Query engine implementation
//!
//! Ties the pipeline together:
//! - Parse the query string
//! - Lower it into a reusable [`CompiledQuery`]
//! - Pick the initial input for a root node and execute

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use super::lower::Compiler;
use super::{NodeRef, QueryFunc};
use crate::config::EngineConfig;
use crate::dsl::{self, DslNode};
use crate::node::{Node, NodePool};
use crate::{Error, Result};

/// A parsed and lowered query, reusable across trees and threads
#[derive(Clone)]
pub struct CompiledQuery {
    source: String,
    ast: DslNode,
    func: QueryFunc,
}

impl CompiledQuery {
    /// The query text this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &DslNode {
        &self.ast
    }

    pub fn func(&self) -> &QueryFunc {
        &self.func
    }

    /// Run against an explicit input sequence
    pub fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        self.func.run(input)
    }

    /// Run against a root node, choosing the initial input from the query shape
    pub fn execute<'a>(&self, root: &'a Node) -> Vec<NodeRef<'a>> {
        let input = initial_input(&self.ast, root);
        let inputs = input.len();
        let output = self.func.run(input);
        tracing::trace!(query = %self.source, inputs, outputs = output.len(), "executed query");
        output
    }
}

impl std::fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("source", &self.source)
            .field("ast", &self.ast.to_string())
            .finish()
    }
}

/// Input sequence a query starts from when run against `root`.
///
/// A top-level `filter`, or a pipeline not starting with `map(.children)`,
/// works on the root's children. Everything else starts at the root.
pub fn initial_input<'a>(ast: &DslNode, root: &'a Node) -> Vec<NodeRef<'a>> {
    let from_children = match ast {
        DslNode::Filter(_) => true,
        DslNode::Pipeline(stages) => !matches!(
            stages.first(),
            Some(DslNode::Map(expr)) if expr.is_children_field()
        ),
        _ => false,
    };

    if from_children {
        root.children.iter().map(Cow::Borrowed).collect()
    } else {
        vec![Cow::Borrowed(root)]
    }
}

/// Query engine: parser, compiler and node pool
pub struct QueryEngine {
    compiler: Compiler,
}

impl QueryEngine {
    /// Create an engine from validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(NodePool::from_config(&config));
        Ok(Self::with_compiler(Compiler::new(pool)))
    }

    /// Create an engine around a custom compiler (custom operators or fields)
    pub fn with_compiler(compiler: Compiler) -> Self {
        Self { compiler }
    }

    /// Process-wide engine with the default configuration
    pub fn shared() -> &'static QueryEngine {
        static SHARED: OnceLock<QueryEngine> = OnceLock::new();
        SHARED.get_or_init(QueryEngine::default)
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn pool(&self) -> &NodePool {
        self.compiler.pool()
    }

    /// Parse and lower a query
    pub fn compile(&self, query: &str) -> Result<CompiledQuery> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let ast = dsl::parse(query)?;
        let func = self.compiler.lower(&ast)?;
        tracing::debug!(query, ast = %ast, "compiled query");

        Ok(CompiledQuery {
            source: query.to_string(),
            ast,
            func,
        })
    }

    /// Compile `query` and run it against `root`
    pub fn query<'a>(&self, root: &'a Node, query: &str) -> Result<Vec<NodeRef<'a>>> {
        Ok(self.compile(query)?.execute(root))
    }

    /// Hand synthesized result values back to the pool
    pub fn release(&self, results: Vec<NodeRef<'_>>) {
        self.pool().recycle(results);
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::with_compiler(Compiler::new(Arc::new(NodePool::default())))
    }
}

impl Node {
    /// Run a query on the shared engine with this node as root
    pub fn find_dsl(&self, query: &str) -> Result<Vec<NodeRef<'_>>> {
        QueryEngine::shared().query(self, query)
    }
}
