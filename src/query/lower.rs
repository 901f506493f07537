//! Lowering of parsed queries into executable query functions.

use std::borrow::Cow;
use std::sync::Arc;

use super::fields::FieldRegistry;
use super::operators::OperatorRegistry;
use super::{is_true, LowerError, NodeRef, QueryFn, QueryFunc};
use crate::dsl::DslNode;
use crate::node::{Node, NodePool};

/// Turns [`DslNode`] trees into [`QueryFunc`]s.
///
/// The compiler owns the registries that give operators and fields their
/// meaning, plus the pool that literal values are drawn from.
pub struct Compiler {
    operators: OperatorRegistry,
    fields: Arc<FieldRegistry>,
    pool: Arc<NodePool>,
}

impl Compiler {
    /// Compiler with the built-in operators and fields
    pub fn new(pool: Arc<NodePool>) -> Self {
        Self::with_registries(OperatorRegistry::default(), FieldRegistry::default(), pool)
    }

    pub fn with_registries(operators: OperatorRegistry, fields: FieldRegistry, pool: Arc<NodePool>) -> Self {
        Self {
            operators,
            fields: Arc::new(fields),
            pool,
        }
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.pool
    }

    /// Lower one syntax node
    pub fn lower(&self, node: &DslNode) -> Result<QueryFunc, LowerError> {
        tracing::trace!(kind = node.kind(), "lowering");
        match node {
            DslNode::Field(path) => self.lower_field(path),
            DslNode::Literal(value) => Ok(Arc::new(LiteralQuery {
                value: value.clone(),
                pool: Arc::clone(&self.pool),
            })),
            DslNode::Map(expr) if expr.is_children_field() => Ok(Arc::new(ChildrenQuery {
                pool: Arc::clone(&self.pool),
            })),
            DslNode::Map(expr) => Ok(Arc::new(MapQuery {
                expr: self.lower(expr)?,
            })),
            DslNode::Filter(pred) => Ok(Arc::new(FilterQuery {
                pred: self.lower(pred)?,
                pool: Arc::clone(&self.pool),
            })),
            DslNode::RMap(expr) => Ok(Arc::new(RMapQuery {
                expr: self.lower(expr)?,
            })),
            DslNode::RFilter(pred) => Ok(Arc::new(RFilterQuery {
                pred: self.lower(pred)?,
                pool: Arc::clone(&self.pool),
            })),
            DslNode::Reduce(expr) => self.lower_reduce(expr),
            DslNode::Pipeline(stages) => self.lower_pipeline(stages),
            DslNode::Call { name, args } => self.operators.lower(self, name, args),
        }
    }

    fn lower_field(&self, path: &[String]) -> Result<QueryFunc, LowerError> {
        if path.is_empty() || path.iter().any(String::is_empty) {
            return Err(LowerError::InvalidField);
        }
        Ok(Arc::new(FieldQuery {
            path: path.to_vec(),
            fields: Arc::clone(&self.fields),
            pool: Arc::clone(&self.pool),
        }))
    }

    fn lower_reduce(&self, expr: &DslNode) -> Result<QueryFunc, LowerError> {
        match expr {
            DslNode::Call { name, .. } if name == "count" => Ok(Arc::new(CountQuery {
                pool: Arc::clone(&self.pool),
            })),
            DslNode::Call { name, .. } => Err(LowerError::UnsupportedReduce(name.clone())),
            other => Err(LowerError::UnsupportedReduce(other.to_string())),
        }
    }

    fn lower_pipeline(&self, stages: &[DslNode]) -> Result<QueryFunc, LowerError> {
        if stages.is_empty() {
            return Err(LowerError::EmptyPipeline);
        }
        let stages = stages
            .iter()
            .map(|stage| self.lower(stage))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(PipelineQuery { stages }))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Arc::new(NodePool::default()))
    }
}

// ========== Stage Functions ==========

struct FieldQuery {
    path: Vec<String>,
    fields: Arc<FieldRegistry>,
    pool: Arc<NodePool>,
}

impl QueryFn for FieldQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for node in &input {
            out.extend(self.fields.resolve(node, &self.path, &self.pool));
        }
        out
    }
}

struct LiteralQuery {
    value: String,
    pool: Arc<NodePool>,
}

impl QueryFn for LiteralQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        self.pool.recycle(input);
        vec![Cow::Owned(self.pool.literal(&self.value))]
    }
}

/// `map(.children)`: flatten the children of every input
struct ChildrenQuery {
    pool: Arc<NodePool>,
}

impl QueryFn for ChildrenQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for node in input {
            match node {
                Cow::Borrowed(parent) => out.extend(parent.children.iter().map(Cow::Borrowed)),
                Cow::Owned(mut owned) => {
                    out.extend(owned.children.drain(..).map(Cow::Owned));
                    self.pool.release(owned);
                }
            }
        }
        out
    }
}

struct MapQuery {
    expr: QueryFunc,
}

impl QueryFn for MapQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::with_capacity(input.len());
        for node in input {
            out.extend(self.expr.run(vec![node]));
        }
        out
    }
}

/// Evaluate a predicate against one node, returning its literal values to the pool
fn holds(pred: &QueryFunc, pool: &NodePool, node: &Node) -> bool {
    let verdict = pred.run(vec![Cow::Borrowed(node)]);
    let keep = is_true(&verdict);
    pool.recycle(verdict);
    keep
}

struct FilterQuery {
    pred: QueryFunc,
    pool: Arc<NodePool>,
}

impl QueryFn for FilterQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::with_capacity(input.len());
        for node in input {
            if holds(&self.pred, &self.pool, &node) {
                out.push(node);
            } else {
                self.pool.recycle(Some(node));
            }
        }
        out
    }
}

struct RMapQuery {
    expr: QueryFunc,
}

impl QueryFn for RMapQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for node in input {
            match node {
                Cow::Borrowed(root) => {
                    out.reserve(root.subtree_size());
                    for visited in root.pre_order() {
                        out.extend(self.expr.run(vec![Cow::Borrowed(visited)]));
                    }
                }
                Cow::Owned(root) => {
                    // Results may borrow from `root`, which dies here
                    for visited in root.pre_order() {
                        let results = self.expr.run(vec![Cow::Borrowed(visited)]);
                        out.extend(results.into_iter().map(|r| Cow::Owned(r.into_owned())));
                    }
                }
            }
        }
        out
    }
}

struct RFilterQuery {
    pred: QueryFunc,
    pool: Arc<NodePool>,
}

impl QueryFn for RFilterQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for node in input {
            match node {
                Cow::Borrowed(root) => out.extend(
                    root.pre_order()
                        .filter(|visited| holds(&self.pred, &self.pool, visited))
                        .map(Cow::Borrowed),
                ),
                Cow::Owned(root) => out.extend(
                    root.pre_order()
                        .filter(|visited| holds(&self.pred, &self.pool, visited))
                        .map(|visited| Cow::Owned(visited.clone())),
                ),
            }
        }
        out
    }
}

struct CountQuery {
    pool: Arc<NodePool>,
}

impl QueryFn for CountQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let count = input.len();
        self.pool.recycle(input);
        vec![Cow::Owned(self.pool.literal(&count.to_string()))]
    }
}

struct PipelineQuery {
    stages: Vec<QueryFunc>,
}

impl QueryFn for PipelineQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        self.stages.iter().fold(input, |values, stage| stage.run(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;
    use crate::node::types;

    fn compile(query: &str) -> QueryFunc {
        Compiler::default().lower(&parse(query).unwrap()).unwrap()
    }

    fn tokens(values: &[NodeRef<'_>]) -> Vec<String> {
        values.iter().map(|v| v.token.clone()).collect()
    }

    // File
    // ├── Function(f)   [param a, param b]
    // ├── Variable(v)
    // └── Function(g)   [param x]
    fn tree() -> Node {
        let function = |name: &str, params: &[&str]| {
            Node::builder()
                .node_type(types::FUNCTION)
                .token(name)
                .children(params.iter().map(|p| Node::with_token(types::PARAMETER, *p)))
                .build()
        };
        Node::builder()
            .node_type(types::FILE)
            .child(function("f", &["a", "b"]))
            .child(Node::with_token(types::VARIABLE, "v"))
            .child(function("g", &["x"]))
            .build()
    }

    #[test]
    fn test_field_and_literal() {
        let root = tree();
        let out = compile(".type").run(vec![Cow::Borrowed(&root)]);
        assert_eq!(tokens(&out), vec!["File"]);

        let out = compile("\"hi\"").run(vec![Cow::Borrowed(&root), Cow::Borrowed(&root)]);
        assert_eq!(tokens(&out), vec!["hi"]);
        assert!(out[0].is_literal());
    }

    #[test]
    fn test_map_children_stays_borrowed() {
        let root = tree();
        let out = compile("map(.children)").run(vec![Cow::Borrowed(&root)]);
        assert_eq!(tokens(&out), vec!["f", "v", "g"]);
        assert!(out.iter().all(|n| matches!(n, Cow::Borrowed(_))));
        assert!(std::ptr::eq(out[0].as_ref(), &root.children[0]));
    }

    #[test]
    fn test_map_children_of_owned_input() {
        let out = compile("map(.children)").run(vec![Cow::Owned(tree())]);
        assert_eq!(tokens(&out), vec!["f", "v", "g"]);
    }

    #[test]
    fn test_map_and_filter() {
        let root = tree();
        let functions = compile("map(.children) |> filter(.type == \"Function\")").run(vec![Cow::Borrowed(&root)]);
        assert_eq!(tokens(&functions), vec!["f", "g"]);

        let names = compile("map(.token)").run(functions);
        assert_eq!(tokens(&names), vec!["f", "g"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let root = tree();
        let input: Vec<NodeRef<'_>> = root.children.iter().map(Cow::Borrowed).collect();
        let once = compile("filter(.type == \"Function\")").run(input.clone());
        let twice = compile("filter(.type == \"Function\") |> filter(.type == \"Function\")").run(input);
        assert_eq!(tokens(&once), tokens(&twice));
    }

    #[test]
    fn test_pipeline_is_associative() {
        let root = tree();
        let stages = ["rfilter(.type == \"Function\")", "map(.children)", "map(.token)"];

        let left_first = compile(&format!("{} |> {}", stages[0], stages[1])).run(vec![Cow::Borrowed(&root)]);
        let left = compile(stages[2]).run(left_first);

        let right_rest = compile(&format!("{} |> {}", stages[1], stages[2]));
        let right = right_rest.run(compile(stages[0]).run(vec![Cow::Borrowed(&root)]));

        let all = compile(&stages.join(" |> ")).run(vec![Cow::Borrowed(&root)]);
        assert_eq!(tokens(&left), vec!["a", "b", "x"]);
        assert_eq!(tokens(&left), tokens(&right));
        assert_eq!(tokens(&left), tokens(&all));
    }

    #[test]
    fn test_rmap_visits_pre_order() {
        let root = tree();
        let out = compile("rmap(.token)").run(vec![Cow::Borrowed(&root)]);
        assert_eq!(tokens(&out), vec!["", "f", "a", "b", "v", "g", "x"]);

        let owned = compile("rmap(.token)").run(vec![Cow::Owned(tree())]);
        assert_eq!(tokens(&owned), tokens(&out));
    }

    #[test]
    fn test_rfilter_includes_root() {
        let root = tree();
        let out = compile("rfilter(.type == \"File\" || .type == \"Parameter\")").run(vec![Cow::Borrowed(&root)]);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].node_type, "File");
        assert!(std::ptr::eq(out[0].as_ref(), &root));
    }

    #[test]
    fn test_reduce_count() {
        let root = tree();
        let out = compile("rfilter(.type == \"Parameter\") |> reduce(count)").run(vec![Cow::Borrowed(&root)]);
        assert_eq!(tokens(&out), vec!["3"]);

        let empty = compile("filter(.type == \"Nope\") |> reduce(count)").run(vec![Cow::Borrowed(&root)]);
        assert_eq!(tokens(&empty), vec!["0"]);
        assert!(empty[0].is_literal());
    }

    #[test]
    fn test_lowering_errors() {
        let compiler = Compiler::default();
        assert_eq!(
            compiler.lower(&parse("reduce(sum)").unwrap()).err(),
            Some(LowerError::UnsupportedReduce("sum".to_string()))
        );
        assert_eq!(
            compiler.lower(&DslNode::Pipeline(vec![])).err(),
            Some(LowerError::EmptyPipeline)
        );
        assert_eq!(
            compiler.lower(&DslNode::Field(vec![])).err(),
            Some(LowerError::InvalidField)
        );
        assert_eq!(
            compiler
                .lower(&DslNode::Reduce(Box::new(DslNode::literal("count"))))
                .err(),
            Some(LowerError::UnsupportedReduce("Literal(count)".to_string()))
        );
    }

    #[test]
    fn test_predicate_literals_are_recycled() {
        let pool = Arc::new(NodePool::new(32));
        let compiler = Compiler::new(Arc::clone(&pool));
        let root = tree();
        let func = compiler.lower(&parse("rfilter(.type == \"Parameter\")").unwrap()).unwrap();

        let out = func.run(vec![Cow::Borrowed(&root)]);
        assert_eq!(out.len(), 3);
        assert!(!pool.is_empty());
    }
}
