//! Merkle tree construction and inclusion proof generation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use txm_types::{Digest, Proof, ProofStep, Side};

use crate::codec::{CanonicalJson, Record, RecordCodec};
use crate::error::{MerkleError, Result};
use crate::hash::{Blake3Hash, HashFunction};

/// What to do with the unpaired node at the end of an odd-width level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OddNodePolicy {
    /// Move the lone node up to the next level unchanged
    #[default]
    Promote,
    /// Pair the lone node with a copy of itself: H(x || x)
    Duplicate,
}

/// A node in a built tree. Children are owned by their parent; there are
/// no back-references.
#[derive(Debug, Clone)]
pub enum Node<K> {
    Leaf {
        hash: Digest,
        key: K,
        /// Position of the record in the input sequence
        index: usize,
    },
    Internal {
        hash: Digest,
        level: u32,
        /// Number of leaves below this node
        leaf_count: usize,
        left: Box<Node<K>>,
        right: Box<Node<K>>,
    },
    /// Hash-only copy standing in as the right child under
    /// [`OddNodePolicy::Duplicate`]. Owns no leaves.
    Replica { hash: Digest, level: u32 },
}

impl<K> Node<K> {
    pub fn hash(&self) -> &Digest {
        match self {
            Node::Leaf { hash, .. } | Node::Internal { hash, .. } | Node::Replica { hash, .. } => {
                hash
            }
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { level, .. } | Node::Replica { level, .. } => *level,
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Internal { leaf_count, .. } => *leaf_count,
            Node::Replica { .. } => 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn children(&self) -> Option<(&Node<K>, &Node<K>)> {
        match self {
            Node::Internal { left, right, .. } => Some((left, right)),
            _ => None,
        }
    }

    fn replica(&self) -> Node<K> {
        Node::Replica {
            hash: *self.hash(),
            level: self.level(),
        }
    }

    fn join<H: HashFunction>(hasher: &H, left: Node<K>, right: Node<K>) -> Node<K> {
        Node::Internal {
            hash: hasher.hash_pair(left.hash(), right.hash()),
            level: 1 + left.level().max(right.level()),
            leaf_count: left.leaf_count() + right.leaf_count(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Shape of a tree, enough to predict every proof it can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeContext {
    pub leaf_count: u64,
    pub policy: OddNodePolicy,
}

impl TreeContext {
    pub fn new(leaf_count: u64, policy: OddNodePolicy) -> Self {
        Self { leaf_count, policy }
    }

    /// Sibling sides, leaf to root, of the path for `leaf_index`.
    /// `None` if the index is outside the tree.
    pub fn sibling_sides(&self, leaf_index: u64) -> Option<Vec<Side>> {
        if leaf_index >= self.leaf_count {
            return None;
        }

        let mut sides = Vec::new();
        let mut index = leaf_index;
        let mut width = self.leaf_count;

        while width > 1 {
            if index % 2 == 1 {
                sides.push(Side::Left);
            } else if index + 1 < width {
                sides.push(Side::Right);
            } else if self.policy == OddNodePolicy::Duplicate {
                // Lone last node paired with its replica
                sides.push(Side::Right);
            }
            index /= 2;
            width = width.div_ceil(2);
        }

        Some(sides)
    }

    /// Number of proof steps for `leaf_index`
    pub fn path_len(&self, leaf_index: u64) -> Option<usize> {
        self.sibling_sides(leaf_index).map(|sides| sides.len())
    }

    /// ceil(log2 n), 0 for trees of at most one leaf
    pub fn depth(&self) -> u32 {
        if self.leaf_count <= 1 {
            0
        } else {
            u64::BITS - (self.leaf_count - 1).leading_zeros()
        }
    }
}

/// A built, non-empty Merkle tree
#[derive(Debug, Clone)]
pub struct MerkleTree<K> {
    root: Node<K>,
    policy: OddNodePolicy,
    /// Record key to leaf index
    keys: HashMap<K, usize>,
}

impl<K> MerkleTree<K>
where
    K: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    /// Get the root hash
    pub fn root(&self) -> &Digest {
        self.root.hash()
    }

    pub fn root_node(&self) -> &Node<K> {
        &self.root
    }

    /// Get the number of leaves
    pub fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }

    /// ceil(log2 n), 0 for a single leaf
    pub fn depth(&self) -> u32 {
        self.root.level()
    }

    pub fn policy(&self) -> OddNodePolicy {
        self.policy
    }

    pub fn context(&self) -> TreeContext {
        TreeContext::new(self.leaf_count() as u64, self.policy)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains_key(key)
    }

    /// Leaf index of the record carrying `key`
    pub fn leaf_index(&self, key: &K) -> Option<usize> {
        self.keys.get(key).copied()
    }

    /// Length of the proof for the leaf at `index`
    pub fn leaf_depth(&self, index: usize) -> Option<usize> {
        self.context().path_len(index as u64)
    }

    /// Get the hash of the leaf at `index`
    pub fn leaf_hash(&self, index: usize) -> Option<&Digest> {
        self.leaf_at(index).map(Node::hash)
    }

    /// Leaves in insertion order as `(key, hash)` pairs
    pub fn leaves(&self) -> Vec<(&K, &Digest)> {
        let mut out = Vec::with_capacity(self.leaf_count());
        let mut stack = vec![&self.root];

        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf { hash, key, .. } => out.push((key, hash)),
                Node::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
                Node::Replica { .. } => {}
            }
        }

        out
    }

    /// Generate the inclusion proof for the record carrying `key`
    pub fn prove(&self, key: &K) -> Result<Proof> {
        let index = self.leaf_index(key).ok_or_else(|| MerkleError::NotFound {
            key: format!("{:?}", key),
        })?;
        self.prove_index(index)
    }

    /// Generate the inclusion proof for the leaf at `index`.
    ///
    /// Descends from the root along the target's path only, so unrelated
    /// subtrees are never visited.
    pub fn prove_index(&self, index: usize) -> Result<Proof> {
        if index >= self.leaf_count() {
            return Err(MerkleError::NotFound {
                key: format!("leaf index {}", index),
            });
        }

        let mut steps = Vec::with_capacity(self.depth() as usize);
        let mut node = &self.root;
        let mut offset = index;

        while let Node::Internal { left, right, .. } = node {
            let left_count = left.leaf_count();
            if offset < left_count {
                steps.push(ProofStep {
                    hash: *right.hash(),
                    side: Side::Right,
                });
                node = left;
            } else {
                steps.push(ProofStep {
                    hash: *left.hash(),
                    side: Side::Left,
                });
                offset -= left_count;
                node = right;
            }
        }

        // Collected root to leaf
        steps.reverse();

        Ok(Proof::new(index as u64, steps))
    }

    fn leaf_at(&self, index: usize) -> Option<&Node<K>> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut node = &self.root;
        let mut offset = index;

        while let Node::Internal { left, right, .. } = node {
            let left_count = left.leaf_count();
            if offset < left_count {
                node = left;
            } else {
                offset -= left_count;
                node = right;
            }
        }

        Some(node)
    }
}

/// Result of building over a record sequence. Zero records is a valid,
/// explicit state with no root.
#[derive(Debug, Clone)]
pub enum Tree<K> {
    Empty,
    Built(MerkleTree<K>),
}

impl<K> Tree<K>
where
    K: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    pub fn is_empty(&self) -> bool {
        matches!(self, Tree::Empty)
    }

    pub fn root(&self) -> Option<&Digest> {
        self.as_built().map(MerkleTree::root)
    }

    pub fn leaf_count(&self) -> usize {
        self.as_built().map_or(0, MerkleTree::leaf_count)
    }

    /// 0 for an empty tree
    pub fn depth(&self) -> u32 {
        self.as_built().map_or(0, MerkleTree::depth)
    }

    pub fn as_built(&self) -> Option<&MerkleTree<K>> {
        match self {
            Tree::Empty => None,
            Tree::Built(tree) => Some(tree),
        }
    }

    pub fn prove(&self, key: &K) -> Result<Proof> {
        match self {
            Tree::Built(tree) => tree.prove(key),
            Tree::Empty => Err(MerkleError::NotFound {
                key: format!("{:?}", key),
            }),
        }
    }
}

/// Builder for Merkle trees with a fixed hash function, codec and
/// odd-node policy
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder<H, C> {
    hasher: H,
    codec: C,
    policy: OddNodePolicy,
}

impl<H: HashFunction, C> TreeBuilder<H, C> {
    pub fn new(hasher: H, codec: C) -> Self {
        Self {
            hasher,
            codec,
            policy: OddNodePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OddNodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn policy(&self) -> OddNodePolicy {
        self.policy
    }

    /// H(encode(record))
    pub fn leaf_hash<R: ?Sized>(&self, record: &R) -> Result<Digest>
    where
        C: RecordCodec<R>,
    {
        let bytes = self.codec.encode(record)?;
        Ok(self.hasher.hash(&bytes))
    }

    /// Build the tree over `records` in order
    pub fn build<'a, R, I>(&self, records: I) -> Result<Tree<R::Key>>
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
        C: RecordCodec<R>,
    {
        let mut keys = HashMap::new();
        let mut leaves = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            let key = record.key();
            let hash = self.leaf_hash(record)?;

            if let Some(first) = keys.insert(key.clone(), index) {
                return Err(MerkleError::DuplicateKey {
                    key: format!("{:?}", key),
                    first,
                    second: index,
                });
            }

            leaves.push(Node::Leaf { hash, key, index });
        }

        Ok(match combine_levels(&self.hasher, self.policy, leaves) {
            Some(root) => Tree::Built(MerkleTree {
                root,
                policy: self.policy,
                keys,
            }),
            None => Tree::Empty,
        })
    }
}

/// Build with BLAKE3, canonical JSON and odd-node promotion
pub fn build<R>(records: &[R]) -> Result<Tree<R::Key>>
where
    R: Record + Serialize,
{
    TreeBuilder::new(Blake3Hash, CanonicalJson).build(records)
}

/// Pair nodes level by level until one remains
fn combine_levels<K, H: HashFunction>(
    hasher: &H,
    policy: OddNodePolicy,
    leaves: Vec<Node<K>>,
) -> Option<Node<K>> {
    let mut level = leaves;

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut nodes = level.into_iter();

        while let Some(left) = nodes.next() {
            let parent = match nodes.next() {
                Some(right) => Node::join(hasher, left, right),
                None => match policy {
                    OddNodePolicy::Promote => left,
                    OddNodePolicy::Duplicate => {
                        let right = left.replica();
                        Node::join(hasher, left, right)
                    }
                },
            };
            next.push(parent);
        }

        level = next;
    }

    level.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha256Hash;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Serialize)]
    struct Entry {
        id: u32,
        body: String,
    }

    impl Record for Entry {
        type Key = u32;

        fn key(&self) -> u32 {
            self.id
        }
    }

    fn entries(n: u32) -> Vec<Entry> {
        (0..n)
            .map(|id| Entry {
                id,
                body: format!("entry-{}", id),
            })
            .collect()
    }

    fn leaf(hasher: &Blake3Hash, entry: &Entry) -> Digest {
        hasher.hash(&CanonicalJson.encode(entry).unwrap())
    }

    fn built(tree: Tree<u32>) -> MerkleTree<u32> {
        match tree {
            Tree::Built(tree) => tree,
            Tree::Empty => panic!("expected a built tree"),
        }
    }

    #[test]
    fn test_empty_tree() {
        let tree = build::<Entry>(&[]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.leaf_count(), 0);
        assert!(matches!(tree.prove(&0), Err(MerkleError::NotFound { .. })));
    }

    #[test]
    fn test_single_leaf_tree() {
        let records = entries(1);
        let tree = built(build(&records).unwrap());

        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), &leaf(&Blake3Hash, &records[0]));

        let proof = tree.prove(&0).unwrap();
        assert!(proof.is_empty());
    }

    #[test]
    fn test_four_leaf_scenario() {
        let h = Blake3Hash;
        let records = entries(4);
        let tree = built(build(&records).unwrap());

        let [a, b, c, d] = [0, 1, 2, 3].map(|i| leaf(&h, &records[i]));
        let p1 = h.hash_pair(&a, &b);
        let p2 = h.hash_pair(&c, &d);
        assert_eq!(tree.root(), &h.hash_pair(&p1, &p2));
        assert_eq!(tree.depth(), 2);

        let proof = tree.prove(&0).unwrap();
        assert_eq!(
            proof.steps,
            vec![
                ProofStep { hash: b, side: Side::Right },
                ProofStep { hash: p2, side: Side::Right },
            ]
        );

        let proof_d = tree.prove(&3).unwrap();
        assert_eq!(
            proof_d.steps,
            vec![
                ProofStep { hash: c, side: Side::Left },
                ProofStep { hash: p1, side: Side::Left },
            ]
        );
    }

    #[test]
    fn test_odd_node_promoted() {
        let h = Blake3Hash;
        let records = entries(3);
        let tree = built(build(&records).unwrap());

        let [a, b, c] = [0, 1, 2].map(|i| leaf(&h, &records[i]));
        let p1 = h.hash_pair(&a, &b);
        assert_eq!(tree.root(), &h.hash_pair(&p1, &c));
        assert_eq!(tree.depth(), 2);

        // The promoted leaf skips a level
        let proof = tree.prove(&2).unwrap();
        assert_eq!(proof.steps, vec![ProofStep { hash: p1, side: Side::Left }]);
        assert_eq!(tree.leaf_depth(2), Some(1));
        assert_eq!(tree.leaf_depth(0), Some(2));
    }

    #[test]
    fn test_odd_node_duplicated() {
        let h = Blake3Hash;
        let records = entries(3);
        let builder = TreeBuilder::new(h, CanonicalJson).with_policy(OddNodePolicy::Duplicate);
        let tree = built(builder.build(&records).unwrap());

        let [a, b, c] = [0, 1, 2].map(|i| leaf(&h, &records[i]));
        let p1 = h.hash_pair(&a, &b);
        let p2 = h.hash_pair(&c, &c);
        assert_eq!(tree.root(), &h.hash_pair(&p1, &p2));
        assert_eq!(tree.leaf_count(), 3);

        let proof = tree.prove(&2).unwrap();
        assert_eq!(
            proof.steps,
            vec![
                ProofStep { hash: c, side: Side::Right },
                ProofStep { hash: p1, side: Side::Left },
            ]
        );
    }

    #[test]
    fn test_policies_give_different_roots() {
        let records = entries(5);
        let promote = build(&records).unwrap();
        let duplicate = TreeBuilder::new(Blake3Hash, CanonicalJson)
            .with_policy(OddNodePolicy::Duplicate)
            .build(&records)
            .unwrap();
        assert_ne!(promote.root(), duplicate.root());
    }

    #[test]
    fn test_leaves_in_insertion_order() {
        let records = entries(11);
        let tree = built(build(&records).unwrap());
        let leaves = tree.leaves();

        assert_eq!(leaves.len(), 11);
        for (i, (key, hash)) in leaves.into_iter().enumerate() {
            assert_eq!(*key, i as u32);
            assert_eq!(hash, &leaf(&Blake3Hash, &records[i]));
            assert_eq!(tree.leaf_hash(i), Some(hash));
        }
        assert_eq!(tree.leaf_hash(11), None);
    }

    #[test]
    fn test_unknown_key_not_found() {
        let tree = built(build(&entries(4)).unwrap());
        let err = tree.prove(&99).unwrap_err();
        assert!(matches!(err, MerkleError::NotFound { ref key } if key == "99"));
        assert!(matches!(tree.prove_index(4), Err(MerkleError::NotFound { .. })));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut records = entries(3);
        records.push(Entry {
            id: 1,
            body: "again".into(),
        });
        let err = build(&records).unwrap_err();
        assert!(matches!(
            err,
            MerkleError::DuplicateKey { first: 1, second: 3, .. }
        ));
    }

    #[test]
    fn test_hash_function_is_pluggable() {
        let records = entries(6);
        let blake = build(&records).unwrap();
        let sha = TreeBuilder::new(Sha256Hash, CanonicalJson)
            .build(&records)
            .unwrap();
        assert_ne!(blake.root(), sha.root());
    }

    #[test]
    fn test_context_depth() {
        for (n, depth) in [(1u64, 0u32), (2, 1), (3, 2), (4, 2), (5, 3), (8, 3), (9, 4)] {
            assert_eq!(TreeContext::new(n, OddNodePolicy::Promote).depth(), depth, "n = {}", n);
        }
    }

    #[test]
    fn test_large_tree() {
        let records = entries(100);
        let tree = built(build(&records).unwrap());
        assert_eq!(tree.depth(), 7);

        for i in [0u32, 42, 63, 64, 99] {
            let proof = tree.prove(&i).unwrap();
            let leaf_hash = leaf(&Blake3Hash, &records[i as usize]);
            assert_eq!(
                proof.compute_root(&leaf_hash, |l, r| Blake3Hash.hash_pair(l, r)),
                *tree.root(),
                "Path verification failed for leaf {}",
                i
            );
        }
    }

    fn arb_policy() -> impl Strategy<Value = OddNodePolicy> {
        prop_oneof![Just(OddNodePolicy::Promote), Just(OddNodePolicy::Duplicate)]
    }

    proptest! {
        #[test]
        fn prop_build_deterministic(n in 1u32..64, policy in arb_policy()) {
            let records = entries(n);
            let builder = TreeBuilder::new(Blake3Hash, CanonicalJson).with_policy(policy);
            let first = builder.build(&records).unwrap();
            let second = builder.build(&records).unwrap();
            prop_assert_eq!(first.root(), second.root());
        }

        #[test]
        fn prop_depth_is_ceil_log2(n in 1u32..300, policy in arb_policy()) {
            let builder = TreeBuilder::new(Blake3Hash, CanonicalJson).with_policy(policy);
            let tree = built(builder.build(&entries(n)).unwrap());
            let expected = (n as f64).log2().ceil() as u32;
            prop_assert_eq!(tree.depth(), expected);
            prop_assert_eq!(tree.context().depth(), expected);
        }

        #[test]
        fn prop_proof_matches_context(n in 1u32..130, policy in arb_policy()) {
            let builder = TreeBuilder::new(Blake3Hash, CanonicalJson).with_policy(policy);
            let tree = built(builder.build(&entries(n)).unwrap());
            let context = tree.context();

            for i in 0..n {
                let proof = tree.prove(&i).unwrap();
                let sides: Vec<Side> = proof.steps.iter().map(|s| s.side).collect();
                prop_assert_eq!(Some(sides), context.sibling_sides(i as u64));
                prop_assert_eq!(proof.leaf_index, i as u64);
                prop_assert!(proof.len() <= tree.depth() as usize);
                if policy == OddNodePolicy::Duplicate || n.is_power_of_two() {
                    prop_assert_eq!(proof.len(), tree.depth() as usize);
                }
            }
        }

        #[test]
        fn prop_every_path_reaches_root(n in 1u32..100, policy in arb_policy()) {
            let records = entries(n);
            let builder = TreeBuilder::new(Blake3Hash, CanonicalJson).with_policy(policy);
            let tree = built(builder.build(&records).unwrap());

            for record in &records {
                let proof = tree.prove(&record.id).unwrap();
                let root = proof.compute_root(&leaf(&Blake3Hash, record), |l, r| {
                    Blake3Hash.hash_pair(l, r)
                });
                prop_assert_eq!(&root, tree.root());
            }
        }

        #[test]
        fn prop_swapping_records_changes_root(n in 2u32..40, i in 0u32..40, j in 0u32..40) {
            let (i, j) = (i % n, j % n);
            prop_assume!(i != j);
            let records = entries(n);
            let mut swapped = records.clone();
            swapped.swap(i as usize, j as usize);

            let (tree_a, tree_b) = (build(&records).unwrap(), build(&swapped).unwrap());
            prop_assert_ne!(tree_a.root(), tree_b.root());
        }
    }
}
