//! Content-derived stable node ids.
//!
//! An id hashes the node's type, token, position, roles and the ids of its
//! children in order, so identical subtrees share an id and any change
//! propagates to every ancestor. Ids are the first 8 bytes of a blake3
//! digest, hex encoded.

use super::Node;

/// Length of a rendered id in hex characters
pub const STABLE_ID_LEN: usize = 16;

impl Node {
    /// Compute and store stable ids for every node in this subtree
    pub fn assign_stable_ids(&mut self) {
        let mut ids = compute_ids(self).into_iter();
        self.transform_in_place(|node| {
            if let Some(id) = ids.next() {
                node.id = id;
            }
            true
        });
        tracing::trace!(root = %self.id, "assigned stable ids");
    }

    /// Stable id of this subtree without touching the tree
    pub fn stable_id(&self) -> String {
        compute_ids(self).into_iter().next().unwrap_or_default()
    }
}

/// Ids of the whole subtree, indexed by pre-order position.
fn compute_ids(root: &Node) -> Vec<String> {
    let mut ids = vec![String::new(); root.subtree_size()];
    // (node, next child, pre-order index)
    let mut frames: Vec<(&Node, usize, usize)> = vec![(root, 0, 0)];
    let mut next_index = 1;
    let mut finished: Vec<String> = Vec::new();

    while let Some(frame) = frames.last_mut() {
        let node = frame.0;
        if frame.1 < node.children.len() {
            let child = &node.children[frame.1];
            frame.1 += 1;
            frames.push((child, 0, next_index));
            next_index += 1;
            continue;
        }
        let index = frame.2;
        frames.pop();
        let child_ids = finished.split_off(finished.len() - node.children.len());
        let id = hash_node(node, &child_ids);
        ids[index] = id.clone();
        finished.push(id);
    }

    ids
}

fn hash_node(node: &Node, child_ids: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    write_str(&mut hasher, &node.node_type);
    write_str(&mut hasher, &node.token);

    if let Some(pos) = &node.pos {
        for field in [
            pos.start_line,
            pos.start_col,
            pos.start_offset,
            pos.end_line,
            pos.end_col,
            pos.end_offset,
        ] {
            hasher.update(&u64::from(field).to_le_bytes());
        }
    }

    hasher.update(&(node.roles.len() as u64).to_le_bytes());
    for role in &node.roles {
        write_str(&mut hasher, role);
    }

    hasher.update(&(child_ids.len() as u64).to_le_bytes());
    for id in child_ids {
        write_str(&mut hasher, id);
    }

    let digest = hasher.finalize();
    digest.as_bytes()[..STABLE_ID_LEN / 2]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// Length-prefixed so ("ab", "c") and ("a", "bc") never collide
fn write_str(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
