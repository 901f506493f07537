//! Bounded pool of recycled nodes.
//!
//! Query execution synthesizes many short-lived literal nodes (`"true"`,
//! `"false"`, counts, field values). The pool hands back cleared instances
//! so their string and collection buffers are reused.

use crossbeam::queue::ArrayQueue;

use super::{types, Node};
use crate::config::EngineConfig;
use crate::query::NodeRef;
use std::borrow::Cow;

/// Lock-free, thread-safe node pool
pub struct NodePool {
    free: ArrayQueue<Node>,
}

impl NodePool {
    /// Create a pool holding at most `capacity` idle nodes
    pub fn new(capacity: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Create and prewarm a pool from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        let pool = Self::new(config.pool_capacity);
        pool.prewarm(config.prewarm);
        pool
    }

    /// Fill the pool with up to `count` fresh nodes
    pub fn prewarm(&self, count: usize) {
        let target = if count > self.capacity() {
            tracing::warn!(
                requested = count,
                capacity = self.capacity(),
                "prewarm exceeds pool capacity, clamping"
            );
            self.capacity()
        } else {
            count
        };

        let mut added = 0;
        while self.free.len() < target && self.free.push(Node::default()).is_ok() {
            added += 1;
        }
        tracing::debug!(added, idle = self.free.len(), "prewarmed node pool");
    }

    /// Take a cleared node, allocating when the pool is empty
    pub fn acquire(&self) -> Node {
        self.free.pop().unwrap_or_default()
    }

    /// Build a `Literal` node from a recycled instance
    pub fn literal(&self, token: &str) -> Node {
        let mut node = self.acquire();
        node.node_type.push_str(types::LITERAL);
        node.token.push_str(token);
        node
    }

    /// Return a node and its whole subtree to the pool.
    ///
    /// Every field is cleared first. Nodes that do not fit are dropped.
    pub fn release(&self, node: Node) {
        let mut pending = vec![node];
        while let Some(mut node) = pending.pop() {
            pending.extend(node.children.drain(..));
            node.reset();
            // Full pool: let it drop
            let _ = self.free.push(node);
        }
    }

    /// Release every node yielded by `nodes`
    pub fn release_all(&self, nodes: impl IntoIterator<Item = Node>) {
        for node in nodes {
            self.release(node);
        }
    }

    /// Release the synthesized (owned) values of a query result.
    ///
    /// Borrowed values belong to the queried tree and are left alone.
    pub fn recycle<'a>(&self, values: impl IntoIterator<Item = NodeRef<'a>>) {
        for value in values {
            if let Cow::Owned(node) = value {
                self.release(node);
            }
        }
    }

    /// Number of idle nodes
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Maximum number of idle nodes
    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }
}

impl Default for NodePool {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl std::fmt::Debug for NodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePool")
            .field("idle", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{roles, Positions};
    use std::sync::Arc;

    #[test]
    fn test_released_nodes_come_back_cleared() {
        let pool = NodePool::new(8);
        let node = Node::builder()
            .id("abc")
            .node_type(types::FUNCTION)
            .token("main")
            .role(roles::EXPORTED)
            .prop("name", "main")
            .pos(Positions::new((1, 1, 0), (1, 5, 4)))
            .child(Node::with_token(types::IDENTIFIER, "x"))
            .build();

        pool.release(node);
        assert_eq!(pool.len(), 2);

        let reused = pool.acquire();
        assert_eq!(reused, Node::default());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_literal_from_pool() {
        let pool = NodePool::new(4);
        pool.release(Node::with_token(types::CLASS, "old"));

        let lit = pool.literal("true");
        assert!(lit.is_literal());
        assert_eq!(lit.token, "true");
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = NodePool::new(2);
        pool.release_all((0..5).map(|i| Node::literal(i.to_string())));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn test_prewarm_clamps_to_capacity() {
        let pool = NodePool::new(3);
        pool.prewarm(10);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_recycle_skips_borrowed() {
        let pool = NodePool::new(4);
        let tree_node = Node::new(types::FILE);
        let values: Vec<NodeRef<'_>> = vec![Cow::Borrowed(&tree_node), Cow::Owned(Node::literal("1"))];
        pool.recycle(values);
        assert_eq!(pool.len(), 1);
        assert_eq!(tree_node.node_type, "File");
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = Arc::new(NodePool::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        let node = pool.literal(&format!("{}-{}", t, i));
                        assert!(node.is_literal());
                        assert!(node.children.is_empty());
                        pool.release(node);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.len() <= 64);
    }
}
