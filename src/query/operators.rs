//! Operator registry and the built-in operators.
//!
//! Every operator is evaluated per input node and yields one `"true"` or
//! `"false"` literal for it. Operands are lowered through the compiler, so
//! they can be any query expression.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::lower::Compiler;
use super::{bool_literal, is_true, LowerError, NodeRef, QueryFn, QueryFunc};
use crate::dsl::DslNode;
use crate::node::{Node, NodePool};

/// Lowers the arguments of one operator call into a query function
pub type OperatorHandler =
    Box<dyn Fn(&Compiler, &[DslNode]) -> Result<QueryFunc, LowerError> + Send + Sync>;

/// Name → operator handler table
pub struct OperatorRegistry {
    handlers: HashMap<String, OperatorHandler>,
}

impl OperatorRegistry {
    /// Create a registry without any operators
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register (or override) an operator
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Compiler, &[DslNode]) -> Result<QueryFunc, LowerError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered operator names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Lower a call to the named operator
    pub fn lower(&self, compiler: &Compiler, name: &str, args: &[DslNode]) -> Result<QueryFunc, LowerError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| LowerError::UnsupportedOperator(name.to_string()))?;
        handler(compiler, args)
    }
}

impl Default for OperatorRegistry {
    /// Registry with the built-in logical, comparison and membership operators
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("||", |c: &Compiler, args: &[DslNode]| lower_logical(c, "||", Logic::Or, args));
        registry.register("&&", |c: &Compiler, args: &[DslNode]| lower_logical(c, "&&", Logic::And, args));
        registry.register("==", |c: &Compiler, args: &[DslNode]| lower_equality(c, "==", false, args));
        registry.register("!=", |c: &Compiler, args: &[DslNode]| lower_equality(c, "!=", true, args));
        registry.register(">", |c: &Compiler, args: &[DslNode]| lower_compare(c, ">", Compare::Gt, args));
        registry.register(">=", |c: &Compiler, args: &[DslNode]| lower_compare(c, ">=", Compare::Ge, args));
        registry.register("<", |c: &Compiler, args: &[DslNode]| lower_compare(c, "<", Compare::Lt, args));
        registry.register("<=", |c: &Compiler, args: &[DslNode]| lower_compare(c, "<=", Compare::Le, args));
        registry.register("!", lower_not);
        registry.register("has", lower_has);
        registry
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry").field("operators", &self.names()).finish()
    }
}

// ========== Argument Helpers ==========

/// Check arity and lower the operands of a binary operator
pub fn binary_operands(
    compiler: &Compiler,
    op: &str,
    args: &[DslNode],
) -> Result<(QueryFunc, QueryFunc), LowerError> {
    match args {
        [left, right] => Ok((compiler.lower(left)?, compiler.lower(right)?)),
        _ => Err(LowerError::Arity {
            op: op.to_string(),
            expected: 2,
            found: args.len(),
        }),
    }
}

/// Check arity and lower the operand of a unary operator
pub fn unary_operand(compiler: &Compiler, op: &str, args: &[DslNode]) -> Result<QueryFunc, LowerError> {
    match args {
        [arg] => compiler.lower(arg),
        _ => Err(LowerError::Arity {
            op: op.to_string(),
            expected: 1,
            found: args.len(),
        }),
    }
}

/// Evaluate `func` with `node` as its only input
fn eval_on<'n>(func: &QueryFunc, node: &'n Node) -> Vec<NodeRef<'n>> {
    func.run(vec![Cow::Borrowed(node)])
}

// ========== Logical ==========

#[derive(Debug, Clone, Copy)]
enum Logic {
    And,
    Or,
}

struct LogicalQuery {
    logic: Logic,
    left: QueryFunc,
    right: QueryFunc,
    pool: Arc<NodePool>,
}

impl QueryFn for LogicalQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::with_capacity(input.len());
        for node in &input {
            // Both sides are always evaluated
            let left = eval_on(&self.left, node);
            let right = eval_on(&self.right, node);
            let value = match self.logic {
                Logic::And => is_true(&left) && is_true(&right),
                Logic::Or => is_true(&left) || is_true(&right),
            };
            self.pool.recycle(left);
            self.pool.recycle(right);
            out.push(bool_literal(&self.pool, value));
        }
        self.pool.recycle(input);
        out
    }
}

fn lower_logical(compiler: &Compiler, op: &str, logic: Logic, args: &[DslNode]) -> Result<QueryFunc, LowerError> {
    let (left, right) = binary_operands(compiler, op, args)?;
    Ok(Arc::new(LogicalQuery {
        logic,
        left,
        right,
        pool: Arc::clone(compiler.pool()),
    }))
}

struct NotQuery {
    operand: QueryFunc,
    pool: Arc<NodePool>,
}

impl QueryFn for NotQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::with_capacity(input.len());
        for node in &input {
            let result = eval_on(&self.operand, node);
            let value = !is_true(&result);
            self.pool.recycle(result);
            out.push(bool_literal(&self.pool, value));
        }
        self.pool.recycle(input);
        out
    }
}

fn lower_not(compiler: &Compiler, args: &[DslNode]) -> Result<QueryFunc, LowerError> {
    let operand = unary_operand(compiler, "!", args)?;
    Ok(Arc::new(NotQuery {
        operand,
        pool: Arc::clone(compiler.pool()),
    }))
}

// ========== Equality ==========

struct EqualityQuery {
    negate: bool,
    left: QueryFunc,
    right: QueryFunc,
    pool: Arc<NodePool>,
}

impl QueryFn for EqualityQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::with_capacity(input.len());
        for node in &input {
            let left = eval_on(&self.left, node);
            let right = eval_on(&self.right, node);
            let value = match (left.first(), right.first()) {
                (Some(l), Some(r)) => (l.token == r.token) != self.negate,
                // A missing side is never equal
                _ => self.negate,
            };
            self.pool.recycle(left);
            self.pool.recycle(right);
            out.push(bool_literal(&self.pool, value));
        }
        self.pool.recycle(input);
        out
    }
}

fn lower_equality(compiler: &Compiler, op: &str, negate: bool, args: &[DslNode]) -> Result<QueryFunc, LowerError> {
    let (left, right) = binary_operands(compiler, op, args)?;
    Ok(Arc::new(EqualityQuery {
        negate,
        left,
        right,
        pool: Arc::clone(compiler.pool()),
    }))
}

// ========== Ordering ==========

#[derive(Debug, Clone, Copy)]
enum Compare {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Compare {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Compare::Gt => ordering == Ordering::Greater,
            Compare::Ge => ordering != Ordering::Less,
            Compare::Lt => ordering == Ordering::Less,
            Compare::Le => ordering != Ordering::Greater,
        }
    }
}

/// Numeric when both tokens parse as numbers, lexical otherwise
fn compare_tokens(left: &str, right: &str) -> Option<Ordering> {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r),
        _ => Some(left.cmp(right)),
    }
}

struct CompareQuery {
    compare: Compare,
    left: QueryFunc,
    right: QueryFunc,
    pool: Arc<NodePool>,
}

impl QueryFn for CompareQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        let mut out = Vec::with_capacity(input.len());
        for node in &input {
            let left = eval_on(&self.left, node);
            let right = eval_on(&self.right, node);
            let value = match (left.first(), right.first()) {
                (Some(l), Some(r)) => compare_tokens(&l.token, &r.token)
                    .is_some_and(|ordering| self.compare.holds(ordering)),
                _ => false,
            };
            self.pool.recycle(left);
            self.pool.recycle(right);
            out.push(bool_literal(&self.pool, value));
        }
        self.pool.recycle(input);
        out
    }
}

fn lower_compare(compiler: &Compiler, op: &str, compare: Compare, args: &[DslNode]) -> Result<QueryFunc, LowerError> {
    let (left, right) = binary_operands(compiler, op, args)?;
    Ok(Arc::new(CompareQuery {
        compare,
        left,
        right,
        pool: Arc::clone(compiler.pool()),
    }))
}

// ========== Membership ==========

struct HasQuery {
    left: QueryFunc,
    right: QueryFunc,
    pool: Arc<NodePool>,
}

impl QueryFn for HasQuery {
    fn run<'a>(&self, input: Vec<NodeRef<'a>>) -> Vec<NodeRef<'a>> {
        // The right side does not depend on the current node
        let wanted = self.right.run(Vec::new());
        let mut out = Vec::with_capacity(input.len());
        for node in &input {
            let present = eval_on(&self.left, node);
            let value = present
                .iter()
                .any(|p| wanted.iter().any(|w| w.token == p.token));
            self.pool.recycle(present);
            out.push(bool_literal(&self.pool, value));
        }
        self.pool.recycle(wanted);
        self.pool.recycle(input);
        out
    }
}

fn lower_has(compiler: &Compiler, args: &[DslNode]) -> Result<QueryFunc, LowerError> {
    let (left, right) = binary_operands(compiler, "has", args)?;
    Ok(Arc::new(HasQuery {
        left,
        right,
        pool: Arc::clone(compiler.pool()),
    }))
}
