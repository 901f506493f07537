//! Field access strategies.
//!
//! `.name` in a query resolves through the [`FieldRegistry`]. Reserved names
//! read node attributes; any other name reads the property of that name.

use std::borrow::Cow;
use std::collections::HashMap;

use super::{children_of, NodeRef};
use crate::node::NodePool;

pub const CHILDREN: &str = "children";
pub const TOKEN: &str = "token";
pub const ID: &str = "id";
pub const ROLES: &str = "roles";
pub const TYPE: &str = "type";
pub const PROPS: &str = "props";

/// Pseudo-field giving the size of `token`, `id`, `type` or `roles`
pub const LENGTH: &str = "length";

/// Reads one named field of a node
pub trait FieldAccess: Send + Sync {
    fn access<'a>(&self, node: &NodeRef<'a>, pool: &NodePool) -> Vec<NodeRef<'a>>;
}

struct ChildrenField;

impl FieldAccess for ChildrenField {
    fn access<'a>(&self, node: &NodeRef<'a>, _pool: &NodePool) -> Vec<NodeRef<'a>> {
        children_of(node)
    }
}

struct TokenField;

impl FieldAccess for TokenField {
    fn access<'a>(&self, node: &NodeRef<'a>, pool: &NodePool) -> Vec<NodeRef<'a>> {
        vec![Cow::Owned(pool.literal(&node.token))]
    }
}

struct IdField;

impl FieldAccess for IdField {
    fn access<'a>(&self, node: &NodeRef<'a>, pool: &NodePool) -> Vec<NodeRef<'a>> {
        vec![Cow::Owned(pool.literal(&node.id))]
    }
}

struct TypeField;

impl FieldAccess for TypeField {
    fn access<'a>(&self, node: &NodeRef<'a>, pool: &NodePool) -> Vec<NodeRef<'a>> {
        if node.node_type.is_empty() {
            return Vec::new();
        }
        vec![Cow::Owned(pool.literal(&node.node_type))]
    }
}

struct RolesField;

impl FieldAccess for RolesField {
    fn access<'a>(&self, node: &NodeRef<'a>, pool: &NodePool) -> Vec<NodeRef<'a>> {
        node.roles
            .iter()
            .map(|role| Cow::Owned(pool.literal(role)))
            .collect()
    }
}

// `.props` alone selects nothing; `.props.key` is handled by path resolution
struct PropsField;

impl FieldAccess for PropsField {
    fn access<'a>(&self, _node: &NodeRef<'a>, _pool: &NodePool) -> Vec<NodeRef<'a>> {
        Vec::new()
    }
}

/// Name → field strategy table
pub struct FieldRegistry {
    strategies: HashMap<String, Box<dyn FieldAccess>>,
}

impl FieldRegistry {
    /// Create a registry without any reserved fields
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register (or override) the strategy for a field name
    pub fn register(&mut self, name: impl Into<String>, strategy: impl FieldAccess + 'static) {
        self.strategies.insert(name.into(), Box::new(strategy));
    }

    /// Whether `name` has a dedicated strategy
    pub fn is_reserved(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered field names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Read a single field; unknown names read the property of that name
    pub fn access<'a>(&self, node: &NodeRef<'a>, name: &str, pool: &NodePool) -> Vec<NodeRef<'a>> {
        match self.strategies.get(name) {
            Some(strategy) => strategy.access(node, pool),
            None => prop_value(node, name, pool),
        }
    }

    /// Resolve a field path against one node.
    ///
    /// Missing data yields an empty result, never an error. Multi-segment
    /// paths follow these rules:
    ///
    /// - `children.<rest>` resolves `<rest>` on every child
    /// - `props.<rest>` reads the property named by the dotted `<rest>`
    /// - `token.length`, `id.length`, `type.length` and `roles.length` count
    /// - any other registered field continues the path on its output
    /// - an unregistered first segment reads the property keyed by the whole
    ///   dotted path, so `.deep.key` looks up `"deep.key"` rather than
    ///   descending into a `deep` property
    pub fn resolve<'a>(&self, node: &NodeRef<'a>, path: &[String], pool: &NodePool) -> Vec<NodeRef<'a>> {
        match path {
            [] => vec![node.clone()],
            [name] => self.access(node, name, pool),
            [first, rest @ ..] => self.resolve_nested(node, first, rest, pool),
        }
    }

    fn resolve_nested<'a>(
        &self,
        node: &NodeRef<'a>,
        first: &str,
        rest: &[String],
        pool: &NodePool,
    ) -> Vec<NodeRef<'a>> {
        match (first, rest) {
            (PROPS, _) => prop_value(node, &rest.join("."), pool),
            (CHILDREN, _) => children_of(node)
                .iter()
                .flat_map(|child| self.resolve(child, rest, pool))
                .collect(),
            (TOKEN, [last]) if last == LENGTH => count_literal(node.token.chars().count(), pool),
            (ID, [last]) if last == LENGTH => count_literal(node.id.chars().count(), pool),
            (TYPE, [last]) if last == LENGTH => count_literal(node.node_type.chars().count(), pool),
            (ROLES, [last]) if last == LENGTH => count_literal(node.roles.len(), pool),
            _ if self.is_reserved(first) => {
                // Continue the path on whatever the strategy produced
                let values = self.access(node, first, pool);
                let resolved = values
                    .iter()
                    .flat_map(|value| self.resolve(value, rest, pool))
                    .collect();
                pool.recycle(values);
                resolved
            }
            _ => {
                let mut key = String::from(first);
                for segment in rest {
                    key.push('.');
                    key.push_str(segment);
                }
                prop_value(node, &key, pool)
            }
        }
    }
}

impl Default for FieldRegistry {
    /// Registry with the reserved node fields
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(CHILDREN, ChildrenField);
        registry.register(TOKEN, TokenField);
        registry.register(ID, IdField);
        registry.register(TYPE, TypeField);
        registry.register(ROLES, RolesField);
        registry.register(PROPS, PropsField);
        registry
    }
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRegistry").field("fields", &self.names()).finish()
    }
}

fn prop_value<'a>(node: &NodeRef<'a>, key: &str, pool: &NodePool) -> Vec<NodeRef<'a>> {
    match node.props.get(key) {
        Some(value) => vec![Cow::Owned(pool.literal(value))],
        None => Vec::new(),
    }
}

fn count_literal<'a>(count: usize, pool: &NodePool) -> Vec<NodeRef<'a>> {
    vec![Cow::Owned(pool.literal(&count.to_string()))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{roles, types, Node, Positions};

    fn function() -> Node {
        Node::builder()
            .id("f1")
            .node_type(types::FUNCTION)
            .token("main")
            .roles([roles::FUNCTION, roles::EXPORTED])
            .prop("name", "main")
            .prop("props.weird", "dotted")
            .prop("deep.key", "nested")
            .child(
                Node::builder()
                    .node_type(types::PARAMETER)
                    .token("argc")
                    .prop("kind", "int")
                    .build(),
            )
            .child(Node::with_token(types::PARAMETER, "argv"))
            .build()
    }

    fn tokens(values: &[NodeRef<'_>]) -> Vec<String> {
        values.iter().map(|v| v.token.clone()).collect()
    }

    fn resolve(node: &Node, path: &[&str]) -> Vec<String> {
        let registry = FieldRegistry::default();
        let pool = NodePool::new(16);
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        tokens(&registry.resolve(&Cow::Borrowed(node), &path, &pool))
    }

    #[test]
    fn test_reserved_fields() {
        let node = function();
        assert_eq!(resolve(&node, &["token"]), vec!["main"]);
        assert_eq!(resolve(&node, &["id"]), vec!["f1"]);
        assert_eq!(resolve(&node, &["type"]), vec!["Function"]);
        assert_eq!(resolve(&node, &["roles"]), vec!["Function", "Exported"]);
        assert_eq!(resolve(&node, &["children"]), vec!["argc", "argv"]);
        assert!(resolve(&node, &["props"]).is_empty());
        assert!(resolve(&Node::default(), &["type"]).is_empty());
    }

    #[test]
    fn test_property_fallback() {
        let node = function();
        assert_eq!(resolve(&node, &["name"]), vec!["main"]);
        assert!(resolve(&node, &["missing"]).is_empty());
        assert_eq!(resolve(&node, &["deep", "key"]), vec!["nested"]);
    }

    #[test]
    fn test_nested_paths() {
        let node = function();
        assert_eq!(resolve(&node, &["props", "name"]), vec!["main"]);
        assert_eq!(resolve(&node, &["props", "props", "weird"]), vec!["dotted"]);
        assert_eq!(resolve(&node, &["children", "token"]), vec!["argc", "argv"]);
        assert_eq!(resolve(&node, &["children", "kind"]), vec!["int"]);
        assert_eq!(resolve(&node, &["token", "length"]), vec!["4"]);
        assert_eq!(resolve(&node, &["roles", "length"]), vec!["2"]);
        assert_eq!(resolve(&node, &["type", "length"]), vec!["8"]);
        assert!(resolve(&node, &["token", "other"]).is_empty());
        assert!(resolve(&node, &["children", "missing"]).is_empty());
    }

    #[test]
    fn test_children_stay_borrowed() {
        let node = function();
        let registry = FieldRegistry::default();
        let pool = NodePool::new(4);
        let children = registry.access(&Cow::Borrowed(&node), CHILDREN, &pool);
        assert!(children.iter().all(|c| matches!(c, Cow::Borrowed(_))));
    }

    struct StartLine;

    impl FieldAccess for StartLine {
        fn access<'a>(&self, node: &NodeRef<'a>, pool: &NodePool) -> Vec<NodeRef<'a>> {
            match node.pos {
                Some(pos) => vec![Cow::Owned(pool.literal(&pos.start_line.to_string()))],
                None => Vec::new(),
            }
        }
    }

    #[test]
    fn test_custom_strategy() {
        let mut registry = FieldRegistry::default();
        registry.register("line", StartLine);
        assert!(registry.is_reserved("line"));

        let pool = NodePool::new(4);
        let node = Node::builder()
            .node_type(types::IF)
            .pos(Positions::new((12, 5, 100), (14, 6, 140)))
            .build();
        let values = registry.access(&Cow::Borrowed(&node), "line", &pool);
        assert_eq!(tokens(&values), vec!["12"]);
    }
}
