//! Tree traversal and structural transforms.
//!
//! Everything here walks the tree with an explicit stack, so arbitrarily
//! deep trees never exhaust the call stack.

use super::{Node, NodeKey};

/// Lazy pre-order (parent before children) iterator
pub struct PreOrder<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Lazy post-order (children before parent) iterator
pub struct PostOrder<'a> {
    // (node, index of the next child to descend into)
    stack: Vec<(&'a Node, usize)>,
}

impl<'a> Iterator for PostOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        loop {
            let frame = self.stack.last_mut()?;
            let node: &'a Node = frame.0;
            if frame.1 < node.children.len() {
                let child = &node.children[frame.1];
                frame.1 += 1;
                self.stack.push((child, 0));
            } else {
                self.stack.pop();
                return Some(node);
            }
        }
    }
}

impl Node {
    /// Iterate the subtree in pre-order, starting with this node
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Iterate the subtree in post-order, ending with this node
    pub fn post_order(&self) -> PostOrder<'_> {
        PostOrder {
            stack: vec![(self, 0)],
        }
    }

    /// Call `visit` for each node in pre-order
    pub fn visit_pre_order<F: FnMut(&Node)>(&self, visit: F) {
        self.pre_order().for_each(visit);
    }

    /// Call `visit` for each node in post-order
    pub fn visit_post_order<F: FnMut(&Node)>(&self, visit: F) {
        self.post_order().for_each(visit);
    }

    /// Collect every node of the subtree (root included) matching `predicate`, in pre-order
    pub fn find<P: FnMut(&Node) -> bool>(&self, mut predicate: P) -> Vec<&Node> {
        self.pre_order().filter(|node| predicate(node)).collect()
    }

    /// Number of nodes in this subtree, including this node
    pub fn subtree_size(&self) -> usize {
        self.pre_order().count()
    }

    /// Path from this node down to the parent of `target`.
    ///
    /// Empty when the target is this node or is not in the subtree.
    pub fn ancestors(&self, target: NodeKey) -> Vec<&Node> {
        let mut path: Vec<&Node> = Vec::new();
        let mut stack: Vec<(&Node, usize)> = vec![(self, 0)];

        while let Some((node, depth)) = stack.pop() {
            path.truncate(depth);
            if node.is(target) {
                return path;
            }
            path.push(node);
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        }

        Vec::new()
    }

    /// Build a transformed deep copy of this tree.
    ///
    /// `f` sees each copied node after its children were already
    /// transformed. The source tree is left untouched.
    pub fn transform<F: FnMut(Node) -> Node>(&self, mut f: F) -> Node {
        let mut frames: Vec<(&Node, usize)> = vec![(self, 0)];
        let mut built: Vec<Node> = Vec::new();

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if frame.1 < node.children.len() {
                let child = &node.children[frame.1];
                frame.1 += 1;
                frames.push((child, 0));
                continue;
            }
            frames.pop();
            let children = built.split_off(built.len() - node.children.len());
            built.push(f(node.copy_with_children(children)));
        }

        built.pop().unwrap_or_default()
    }

    /// Mutate the tree in place, pre-order.
    ///
    /// `f` returns whether to descend into the node's children; returning
    /// `false` prunes the walk below that node, nothing else.
    pub fn transform_in_place<F: FnMut(&mut Node) -> bool>(&mut self, mut f: F) {
        let mut stack: Vec<&mut Node> = vec![self];
        while let Some(node) = stack.pop() {
            if f(&mut *node) {
                stack.extend(node.children.iter_mut().rev());
            }
        }
    }
}
