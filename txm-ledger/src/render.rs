//! Plain-text rendering of a built tree
//!
//! ```text
//! ROOT 5b1f0e2a
//! ├── H 9c41d7aa  [path]
//! │   ├── TX 1 0f3e9b12  [selected]
//! │   └── TX 2 77a0c4d9  [sibling]
//! └── H e2b64a10  [sibling]
//!     ├── TX 3 1a2b3c4d
//!     └── TX 4 5e6f7a8b
//! ```

use std::fmt::{self, Display, Formatter};
use txm_core::{MerkleTree, Node};

/// Hex characters shown per hash
pub const SHORT_HASH: usize = 8;

/// Render `tree` top-down. With `selected`, the leaf with that key is
/// marked along with the nodes on its path to the root and the siblings
/// its inclusion proof carries.
pub fn render_tree<K>(tree: &MerkleTree<K>, selected: Option<&K>) -> String
where
    K: Clone + Eq + std::hash::Hash + std::fmt::Debug + Display,
{
    TreeView { tree, selected }.to_string()
}

/// One line per level, root first, each listing its nodes' short hashes
pub fn render_levels<K>(tree: &MerkleTree<K>) -> String
where
    K: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    LevelView { tree }.to_string()
}

/// Nested view of a tree, see [`render_tree`]
pub struct TreeView<'a, K> {
    pub tree: &'a MerkleTree<K>,
    pub selected: Option<&'a K>,
}

impl<K> Display for TreeView<'_, K>
where
    K: Clone + Eq + std::hash::Hash + std::fmt::Debug + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let target = self.selected.and_then(|key| self.tree.leaf_index(key));
        let root = self.tree.root_node();

        // The root is on every path; only a single-leaf root gets a mark
        let role = match Role::of(root, 0, target, false) {
            Role::Path => Role::Plain,
            role => role,
        };
        writeln!(
            f,
            "ROOT {}{}",
            root.hash().short_hex(SHORT_HASH),
            marker(root, role)
        )?;

        match root.children() {
            Some((left, right)) => write_children(f, "", left, right, 0, target),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Plain,
    Path,
    Sibling,
    Selected,
}

impl Role {
    /// `start` is the index of the node's first leaf; `parent_on_path`
    /// says whether the parent lies on the selected leaf's path
    fn of<K>(node: &Node<K>, start: usize, target: Option<usize>, parent_on_path: bool) -> Role {
        let Some(target) = target else {
            return Role::Plain;
        };

        let covers = target >= start && target < start + node.leaf_count();
        match (covers, node.is_leaf()) {
            (true, true) => Role::Selected,
            (true, false) => Role::Path,
            (false, _) if parent_on_path => Role::Sibling,
            _ => Role::Plain,
        }
    }
}

fn marker<K>(node: &Node<K>, role: Role) -> String {
    let mut suffix = String::new();
    if matches!(node, Node::Replica { .. }) {
        suffix.push_str(" (duplicate)");
    }
    match role {
        Role::Plain => {}
        Role::Path => suffix.push_str("  [path]"),
        Role::Sibling => suffix.push_str("  [sibling]"),
        Role::Selected => suffix.push_str("  [selected]"),
    }
    suffix
}

fn write_children<K: Display>(
    f: &mut Formatter<'_>,
    prefix: &str,
    left: &Node<K>,
    right: &Node<K>,
    start: usize,
    target: Option<usize>,
) -> fmt::Result {
    write_node(f, prefix, left, start, target, false)?;
    write_node(f, prefix, right, start + left.leaf_count(), target, true)
}

fn write_node<K: Display>(
    f: &mut Formatter<'_>,
    prefix: &str,
    node: &Node<K>,
    start: usize,
    target: Option<usize>,
    last: bool,
) -> fmt::Result {
    let branch = if last { "└── " } else { "├── " };
    let label = match node {
        Node::Leaf { key, .. } => format!("TX {}", key),
        Node::Internal { .. } | Node::Replica { .. } => "H".to_string(),
    };
    // Only nodes whose parent covers the target are reached with it set
    let role = Role::of(node, start, target, target.is_some());

    writeln!(
        f,
        "{}{}{} {}{}",
        prefix,
        branch,
        label,
        node.hash().short_hex(SHORT_HASH),
        marker(node, role)
    )?;

    match node.children() {
        Some((left, right)) => {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            let child_target = target.filter(|_| role == Role::Path);
            write_children(f, &child_prefix, left, right, start, child_target)
        }
        None => Ok(()),
    }
}

/// Per-level view of a tree, see [`render_levels`]
pub struct LevelView<'a, K> {
    pub tree: &'a MerkleTree<K>,
}

impl<K> Display for LevelView<'_, K>
where
    K: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut level = vec![self.tree.root_node()];

        while !level.is_empty() {
            let hashes: Vec<String> = level
                .iter()
                .map(|node| node.hash().short_hex(SHORT_HASH))
                .collect();
            writeln!(f, "L{}: {}", level[0].level(), hashes.join(" "))?;

            level = level
                .iter()
                .filter_map(|node| node.children())
                .flat_map(|(left, right)| [left, right])
                .collect();
        }

        Ok(())
    }
}
