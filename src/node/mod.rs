//! Node - Universal syntax tree element
//!
//! Every language is mapped into the same tree shape:
//! - `type`: what the node is (`Function`, `If`, `Identifier`)
//! - `token`: source text for leaf and value nodes
//! - `roles`: semantic tags (`Declaration`, `Exported`)
//! - `props`: language-specific metadata
//!
//! Children are owned exclusively by their parent, so a `Node` is always a
//! strict tree. Deep trees are safe: traversal, cloning, comparison and drop
//! all use explicit stacks instead of recursion.

pub mod pool;
pub mod serialize;
pub mod stable_id;
pub mod traverse;

pub use pool::NodePool;
pub use traverse::{PostOrder, PreOrder};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known node types shared by all language mappings.
pub mod types {
    pub const FILE: &str = "File";
    pub const FUNCTION: &str = "Function";
    pub const FUNCTION_DECL: &str = "FunctionDecl";
    pub const METHOD: &str = "Method";
    pub const CLASS: &str = "Class";
    pub const INTERFACE: &str = "Interface";
    pub const STRUCT: &str = "Struct";
    pub const ENUM: &str = "Enum";
    pub const VARIABLE: &str = "Variable";
    pub const PARAMETER: &str = "Parameter";
    pub const BLOCK: &str = "Block";
    pub const IF: &str = "If";
    pub const LOOP: &str = "Loop";
    pub const SWITCH: &str = "Switch";
    pub const CASE: &str = "Case";
    pub const RETURN: &str = "Return";
    pub const BREAK: &str = "Break";
    pub const CONTINUE: &str = "Continue";
    pub const ASSIGNMENT: &str = "Assignment";
    pub const CALL: &str = "Call";
    pub const IDENTIFIER: &str = "Identifier";
    pub const LITERAL: &str = "Literal";
    pub const BINARY_OP: &str = "BinaryOp";
    pub const UNARY_OP: &str = "UnaryOp";
    pub const IMPORT: &str = "Import";
    pub const PACKAGE: &str = "Package";
    pub const COMMENT: &str = "Comment";
    pub const DOC_STRING: &str = "DocString";
    pub const FIELD: &str = "Field";
    pub const LAMBDA: &str = "Lambda";
    pub const TRY: &str = "Try";
    pub const CATCH: &str = "Catch";
    pub const THROW: &str = "Throw";
    pub const MODULE: &str = "Module";
    pub const MATCH: &str = "Match";
    pub const SYNTHETIC: &str = "Synthetic";
}

/// Well-known roles shared by all language mappings.
pub mod roles {
    pub const FUNCTION: &str = "Function";
    pub const DECLARATION: &str = "Declaration";
    pub const NAME: &str = "Name";
    pub const REFERENCE: &str = "Reference";
    pub const ASSIGNMENT: &str = "Assignment";
    pub const CALL: &str = "Call";
    pub const PARAMETER: &str = "Parameter";
    pub const ARGUMENT: &str = "Argument";
    pub const CONDITION: &str = "Condition";
    pub const BODY: &str = "Body";
    pub const EXPORTED: &str = "Exported";
    pub const PUBLIC: &str = "Public";
    pub const PRIVATE: &str = "Private";
    pub const STATIC: &str = "Static";
    pub const CONSTANT: &str = "Constant";
    pub const LITERAL: &str = "Literal";
    pub const VARIABLE: &str = "Variable";
    pub const LOOP: &str = "Loop";
    pub const BRANCH: &str = "Branch";
    pub const IMPORT: &str = "Import";
    pub const DOC: &str = "Doc";
    pub const COMMENT: &str = "Comment";
    pub const TYPE: &str = "Type";
    pub const CLASS: &str = "Class";
    pub const MEMBER: &str = "Member";
    pub const RETURN: &str = "Return";
}

/// Source span of a node.
///
/// Lines and columns are 1-based, offsets are byte offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Positions {
    pub start_line: u32,
    pub start_col: u32,
    pub start_offset: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub end_offset: u32,
}

impl Positions {
    /// Create a span from start and end (line, column, offset) triples
    pub fn new(start: (u32, u32, u32), end: (u32, u32, u32)) -> Self {
        Self {
            start_line: start.0,
            start_col: start.1,
            start_offset: start.2,
            end_line: end.0,
            end_col: end.1,
            end_offset: end.2,
        }
    }
}

/// Identity handle for a node inside a tree.
///
/// Two keys are equal only when they were taken from the same node instance,
/// never because two nodes look alike. A key stays valid while the tree
/// holding the node is not structurally mutated; it is never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

/// A universal syntax tree node.
#[derive(Default, Serialize, Deserialize)]
pub struct Node {
    /// Stable content-derived identifier (empty until assigned)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Node type (e.g. `Function`, `Identifier`)
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Source text for leaf/value nodes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Language-specific properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
    /// Semantic roles; membership matters, order is kept for stable output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Source position, written as all zeros when absent
    #[serde(
        default,
        serialize_with = "serialize::positions_or_zero",
        deserialize_with = "serialize::zero_as_none"
    )]
    pub pos: Option<Positions>,
    /// Ordered, exclusively owned children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a structural node of the given type
    pub fn new(node_type: impl Into<String>) -> Self {
        let mut node = Self::default();
        node.node_type = node_type.into();
        node
    }

    /// Create a node with a type and a token
    pub fn with_token(node_type: impl Into<String>, token: impl Into<String>) -> Self {
        let mut node = Self::new(node_type);
        node.token = token.into();
        node
    }

    /// Create a `Literal` value node
    pub fn literal(token: impl Into<String>) -> Self {
        Self::with_token(types::LITERAL, token)
    }

    /// Start building a node
    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// Identity handle of this node
    pub fn key(&self) -> NodeKey {
        NodeKey(self as *const Node as usize)
    }

    /// Check whether this node is the instance behind `key`
    pub fn is(&self, key: NodeKey) -> bool {
        self.key() == key
    }

    /// Check whether this is a `Literal` value node
    pub fn is_literal(&self) -> bool {
        self.node_type == types::LITERAL
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn props(&self) -> &BTreeMap<String, String> {
        &self.props
    }

    pub fn pos(&self) -> Option<&Positions> {
        self.pos.as_ref()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Look up a property
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    // ========== Role & Type Checks ==========

    /// Check if the node carries the given role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the node carries at least one of the given roles
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    /// Check if the node carries every one of the given roles.
    ///
    /// A node without roles never matches, even for an empty request.
    pub fn has_all_roles(&self, roles: &[&str]) -> bool {
        !self.roles.is_empty() && roles.iter().all(|role| self.has_role(role))
    }

    /// Check if the node type is one of the given types
    pub fn has_any_type(&self, node_types: &[&str]) -> bool {
        node_types.iter().any(|t| self.node_type == *t)
    }

    // ========== Child Mutation ==========

    /// Append a child
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Detach the child identified by `key`.
    ///
    /// Returns the removed child, or `None` when no direct child matched.
    pub fn remove_child(&mut self, key: NodeKey) -> Option<Node> {
        let index = self.child_index(key)?;
        Some(self.children.remove(index))
    }

    /// Swap the child identified by `key` for `replacement`.
    ///
    /// Returns the detached child, or `None` (dropping `replacement`) when
    /// no direct child matched.
    pub fn replace_child(&mut self, key: NodeKey, replacement: Node) -> Option<Node> {
        let index = self.child_index(key)?;
        Some(std::mem::replace(&mut self.children[index], replacement))
    }

    fn child_index(&self, key: NodeKey) -> Option<usize> {
        self.children.iter().position(|c| c.is(key))
    }

    /// Copy every field except children, which are supplied by the caller
    pub(crate) fn copy_with_children(&self, children: Vec<Node>) -> Node {
        Node {
            id: self.id.clone(),
            node_type: self.node_type.clone(),
            token: self.token.clone(),
            props: self.props.clone(),
            roles: self.roles.clone(),
            pos: self.pos,
            children,
        }
    }

    /// Clear all fields, keeping allocated capacity for reuse
    pub(crate) fn reset(&mut self) {
        self.id.clear();
        self.node_type.clear();
        self.token.clear();
        self.props.clear();
        self.roles.clear();
        self.pos = None;
        self.children.clear();
    }

    fn same_content(&self, other: &Node) -> bool {
        self.id == other.id
            && self.node_type == other.node_type
            && self.token == other.token
            && self.props == other.props
            && self.roles == other.roles
            && self.pos == other.pos
            && self.children.len() == other.children.len()
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        self.transform(|node| node)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if !a.same_content(b) {
                return false;
            }
            pending.extend(a.children.iter().zip(b.children.iter()));
        }
        true
    }
}

impl Eq for Node {}

impl Drop for Node {
    fn drop(&mut self) {
        // Flatten the subtree so dropping a 10k-deep chain never recurses
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut child) = pending.pop() {
            pending.append(&mut child.children);
        }
    }
}

/// Flat pre-order listing; each entry carries its depth instead of nesting.
impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            list.entry(&DebugEntry { node, depth });
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        }
        list.finish()
    }
}

struct DebugEntry<'a> {
    node: &'a Node,
    depth: usize,
}

impl fmt::Debug for DebugEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node;
        f.debug_struct("Node")
            .field("depth", &self.depth)
            .field("id", &node.id)
            .field("node_type", &node.node_type)
            .field("token", &node.token)
            .field("props", &node.props)
            .field("roles", &node.roles)
            .field("pos", &node.pos)
            .field("children", &node.children.len())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node{{Type:{}", self.node_type)?;
        if !self.token.is_empty() {
            write!(f, ",Token:{}", self.token)?;
        }
        if !self.roles.is_empty() {
            write!(f, ",Roles:[{}]", self.roles.join(" "))?;
        }
        if !self.props.is_empty() {
            let props: Vec<String> = self.props.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
            write!(f, ",Props:{{{}}}", props.join(" "))?;
        }
        if !self.children.is_empty() {
            write!(f, ",Children:{}", self.children.len())?;
        }
        write!(f, "}}")
    }
}

/// Fluent builder for [`Node`]
#[derive(Debug, Default)]
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    /// Start from a recycled node instead of a fresh allocation
    pub fn from_pool(pool: &NodePool) -> Self {
        Self { node: pool.acquire() }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.node.id = id.into();
        self
    }

    pub fn node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node.node_type = node_type.into();
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.node.token = token.into();
        self
    }

    /// Add a single role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.node.roles.push(role.into());
        self
    }

    /// Add several roles
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn pos(mut self, pos: Positions) -> Self {
        self.node.pos = Some(pos);
        self
    }

    /// Set a single property
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.node.props.insert(key.into(), value.into());
        self
    }

    pub fn props(mut self, props: BTreeMap<String, String>) -> Self {
        self.node.props = props;
        self
    }

    /// Append a child
    pub fn child(mut self, child: Node) -> Self {
        self.node.children.push(child);
        self
    }

    /// Append several children
    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.node.children.extend(children);
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}
