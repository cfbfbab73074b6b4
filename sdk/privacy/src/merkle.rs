//! Merkle Tree for Note Commitments
//!
//! Append-only sparse tree over SHA-256, with every node truncated to the node width.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    H23          H(l, r) = low_bits(SHA256(l_27 || r_27))
//!                /  \   /   \
//!               H0  H1 H2   H3
//!               |   |   |    |
//!              C0  C1  C2   C3  (commitments, truncated)
//! ```
//!
//! Position bit `i` of a path is set when the node at level `i` is a right child,
//! so the packed positions word equals the leaf index.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use thiserror::Error;

use crate::commitment::Commitment;
use crate::field::{FieldWord, WORD_BYTES, zero_msbs_to};

/// Sibling levels in a path
pub const TREE_DEPTH: usize = 32;

/// Default node width in bits
pub const NODE_BITS: u32 = 216;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("tree is full ({capacity} leaves)")]
    TreeFull { capacity: u64 },
}

/// A Merkle path proving inclusion of a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerklePath {
    /// Sibling nodes from leaf level to just below the root
    pub elements: Vec<FieldWord>,
    /// `true` when the current node is the right child at that level
    pub positions: Vec<bool>,
    /// Leaf index
    pub index: u64,
}

impl MerklePath {
    /// Position bits for a leaf index, leaf level first
    pub fn positions_for(index: u64, depth: usize) -> Vec<bool> {
        (0..depth)
            .map(|level| level < 64 && (index >> level) & 1 == 1)
            .collect()
    }

    /// Positions packed into one word, bit `i` for level `i`
    pub fn positions_word(&self) -> u128 {
        self.positions
            .iter()
            .take(128)
            .enumerate()
            .filter(|(_, right)| **right)
            .fold(0u128, |acc, (level, _)| acc | (1u128 << level))
    }

    /// Recompute the root implied by this path for `leaf`
    pub fn compute_root(&self, hasher: &MerkleHasher, leaf: &Commitment) -> FieldWord {
        hasher.compute_root_from_path(&hasher.leaf(leaf), &self.elements, &self.positions)
    }

    /// Check that this path proves inclusion of `leaf` under `root`
    pub fn verify(&self, hasher: &MerkleHasher, leaf: &Commitment, root: &FieldWord) -> bool {
        &self.compute_root(hasher, leaf) == root
    }
}

/// Node hashing and precomputed empty subtrees
#[derive(Debug, Clone)]
pub struct MerkleHasher {
    node_bits: u32,
    depth: usize,
    /// Root of an empty subtree at each height, `empty_roots[0]` is the empty leaf
    empty_roots: Vec<FieldWord>,
}

impl MerkleHasher {
    pub fn new(node_bits: u32, depth: usize) -> Self {
        let node_bits = node_bits.min((WORD_BYTES * 8) as u32);
        let mut hasher = Self {
            node_bits,
            depth,
            empty_roots: Vec::with_capacity(depth + 1),
        };

        let mut current = FieldWord::ZERO;
        hasher.empty_roots.push(current);
        for _ in 0..depth {
            current = hasher.hash_pair(&current, &current);
            hasher.empty_roots.push(current);
        }

        hasher
    }

    pub fn node_bits(&self) -> u32 {
        self.node_bits
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn node_bytes(&self) -> usize {
        self.node_bits.div_ceil(8) as usize
    }

    /// Truncate a word to the node width
    pub fn truncate(&self, bytes: [u8; WORD_BYTES]) -> FieldWord {
        FieldWord::from_normalized(zero_msbs_to(self.node_bits, bytes))
    }

    /// Leaf value for a commitment
    pub fn leaf(&self, commitment: &Commitment) -> FieldWord {
        self.truncate(*commitment.as_bytes())
    }

    /// Hash two children to get the parent
    pub fn hash_pair(&self, left: &FieldWord, right: &FieldWord) -> FieldWord {
        use sha2::{Digest, Sha256};

        let width = self.node_bytes();
        let mut sha = Sha256::new();
        sha.update(left.low_bytes(width));
        sha.update(right.low_bytes(width));
        self.truncate(sha.finalize().into())
    }

    /// Empty subtree root at a given height
    pub fn empty_root(&self, height: usize) -> &FieldWord {
        &self.empty_roots[height.min(self.depth)]
    }

    /// Fold a leaf up through its siblings
    pub fn compute_root_from_path(
        &self,
        leaf: &FieldWord,
        siblings: &[FieldWord],
        positions: &[bool],
    ) -> FieldWord {
        siblings
            .iter()
            .zip(positions.iter())
            .fold(*leaf, |current, (sibling, is_right)| {
                if *is_right {
                    self.hash_pair(sibling, &current)
                } else {
                    self.hash_pair(&current, sibling)
                }
            })
    }
}

impl Default for MerkleHasher {
    fn default() -> Self {
        Self::new(NODE_BITS, TREE_DEPTH)
    }
}

/// Sparse Merkle tree of note commitments
///
/// Only non-empty nodes are stored.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// (level, index) -> node
    nodes: HashMap<(usize, u64), FieldWord>,
    next_index: u64,
    hasher: MerkleHasher,
    root: FieldWord,
}

impl MerkleTree {
    pub fn new(hasher: MerkleHasher) -> Self {
        let root = *hasher.empty_root(hasher.depth());
        Self {
            nodes: HashMap::new(),
            next_index: 0,
            hasher,
            root,
        }
    }

    pub fn hasher(&self) -> &MerkleHasher {
        &self.hasher
    }

    pub fn root(&self) -> FieldWord {
        self.root
    }

    /// Number of leaves inserted so far
    pub fn len(&self) -> u64 {
        self.next_index
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    pub fn capacity(&self) -> u64 {
        if self.hasher.depth() >= 64 {
            u64::MAX
        } else {
            1u64 << self.hasher.depth()
        }
    }

    /// Append a commitment, returning its leaf index
    pub fn insert(&mut self, commitment: &Commitment) -> Result<u64, MerkleError> {
        if self.next_index >= self.capacity() {
            return Err(MerkleError::TreeFull {
                capacity: self.capacity(),
            });
        }

        let index = self.next_index;
        let mut current = self.hasher.leaf(commitment);
        self.nodes.insert((0, index), current);

        let mut node_index = index;
        for level in 0..self.hasher.depth() {
            let sibling = self.sibling(level, node_index);
            current = if node_index & 1 == 1 {
                self.hasher.hash_pair(&sibling, &current)
            } else {
                self.hasher.hash_pair(&current, &sibling)
            };
            node_index /= 2;
            self.nodes.insert((level + 1, node_index), current);
        }

        self.root = current;
        self.next_index += 1;
        Ok(index)
    }

    /// Authentication path for a leaf
    pub fn path(&self, index: u64) -> Option<MerklePath> {
        if index >= self.next_index {
            return None;
        }

        let depth = self.hasher.depth();
        let mut elements = Vec::with_capacity(depth);
        let mut node_index = index;
        for level in 0..depth {
            elements.push(self.sibling(level, node_index));
            node_index /= 2;
        }

        Some(MerklePath {
            elements,
            positions: MerklePath::positions_for(index, depth),
            index,
        })
    }

    /// Leaf stored at an index
    pub fn get(&self, index: u64) -> Option<FieldWord> {
        self.nodes.get(&(0, index)).copied()
    }

    pub fn contains(&self, index: u64, commitment: &Commitment) -> bool {
        self.get(index) == Some(self.hasher.leaf(commitment))
    }

    fn sibling(&self, level: usize, node_index: u64) -> FieldWord {
        self.nodes
            .get(&(level, node_index ^ 1))
            .copied()
            .unwrap_or_else(|| *self.hasher.empty_root(level))
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::new(MerkleHasher::default())
    }
}

/// Recent roots, most recent first
///
/// Proofs built against a slightly older root stay acceptable.
#[derive(Debug, Clone, Default)]
pub struct RootHistory {
    roots: VecDeque<FieldWord>,
    max_size: usize,
}

impl RootHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            roots: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, root: FieldWord) {
        self.roots.push_front(root);
        self.roots.truncate(self.max_size.max(1));
    }

    /// Current or recent
    pub fn is_valid(&self, root: &FieldWord) -> bool {
        self.roots.contains(root)
    }

    pub fn current(&self) -> Option<&FieldWord> {
        self.roots.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldCodec;

    fn commitment(byte: u8) -> Commitment {
        Commitment::from_word(FieldCodec::default().normalize([byte; 32]))
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::default();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), *tree.hasher().empty_root(TREE_DEPTH));
        assert_ne!(tree.root(), FieldWord::ZERO);
    }

    #[test]
    fn test_nodes_are_truncated() {
        let hasher = MerkleHasher::default();
        let node = hasher.hash_pair(&FieldWord::ZERO, &FieldWord::ZERO);
        assert_eq!(&node.as_bytes()[..5], &[0u8; 5]);
    }

    #[test]
    fn test_insert_and_path() {
        let mut tree = MerkleTree::default();
        let c1 = commitment(1);
        let c2 = commitment(2);

        assert_eq!(tree.insert(&c1).unwrap(), 0);
        assert_eq!(tree.insert(&c2).unwrap(), 1);

        let hasher = tree.hasher().clone();
        let root = tree.root();

        let path1 = tree.path(0).unwrap();
        assert_eq!(path1.elements.len(), TREE_DEPTH);
        assert!(path1.verify(&hasher, &c1, &root));

        let path2 = tree.path(1).unwrap();
        assert!(path2.verify(&hasher, &c2, &root));
        assert!(!path2.verify(&hasher, &c1, &root));
    }

    #[test]
    fn test_path_unknown_index() {
        let mut tree = MerkleTree::default();
        tree.insert(&commitment(1)).unwrap();
        assert!(tree.path(1).is_none());
    }

    #[test]
    fn test_positions_word_matches_index() {
        let mut tree = MerkleTree::default();
        for i in 0..6u8 {
            tree.insert(&commitment(i + 1)).unwrap();
        }

        let path = tree.path(5).unwrap();
        assert_eq!(path.positions_word(), 5);
        assert_eq!(&path.positions[..3], &[true, false, true]);
    }

    #[test]
    fn test_root_changes() {
        let mut tree = MerkleTree::default();
        let root0 = tree.root();
        tree.insert(&commitment(1)).unwrap();
        let root1 = tree.root();
        tree.insert(&commitment(2)).unwrap();

        assert_ne!(root0, root1);
        assert_ne!(root1, tree.root());
    }

    #[test]
    fn test_stale_path_fails_against_new_root() {
        let mut tree = MerkleTree::default();
        let c1 = commitment(1);
        tree.insert(&c1).unwrap();
        let old_path = tree.path(0).unwrap();

        tree.insert(&commitment(2)).unwrap();
        let hasher = tree.hasher().clone();
        assert!(!old_path.verify(&hasher, &c1, &tree.root()));
        assert!(tree.path(0).unwrap().verify(&hasher, &c1, &tree.root()));
    }

    #[test]
    fn test_tree_full() {
        let mut tree = MerkleTree::new(MerkleHasher::new(NODE_BITS, 1));
        tree.insert(&commitment(1)).unwrap();
        tree.insert(&commitment(2)).unwrap();
        assert_eq!(
            tree.insert(&commitment(3)),
            Err(MerkleError::TreeFull { capacity: 2 })
        );
    }

    #[test]
    fn test_root_history() {
        let codec = FieldCodec::default();
        let r = |b: u8| codec.normalize([b; 32]);
        let mut history = RootHistory::new(2);

        history.push(r(1));
        history.push(r(2));
        history.push(r(3));

        assert!(!history.is_valid(&r(1)));
        assert!(history.is_valid(&r(2)));
        assert_eq!(history.current(), Some(&r(3)));
    }
}
