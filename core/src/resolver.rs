//! Merkle path resolution
//!
//! Fetches sibling nodes from the ledger, normalizes them to the node width and checks
//! them against a root before they go anywhere near a proof.

use tracing::{debug, warn};
use umbra_privacy::{Commitment, FieldWord, MerkleHasher, MerklePath};

use crate::error::{Result, ShieldError};
use crate::ledger::Ledger;

#[derive(Debug, Clone, Default)]
pub struct MerklePathResolver {
    hasher: MerkleHasher,
}

impl MerklePathResolver {
    pub fn new(hasher: MerkleHasher) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &MerkleHasher {
        &self.hasher
    }

    /// Path for the leaf holding `commitment` at `index`
    pub async fn compute_path(
        &self,
        ledger: &dyn Ledger,
        commitment: &Commitment,
        index: u64,
    ) -> Result<MerklePath> {
        let nodes = ledger.path_query(commitment, index).await?;

        let depth = self.hasher.depth();
        if nodes.len() != depth {
            return Err(ShieldError::LedgerRejected {
                reason: format!("path has {} nodes, expected {depth}", nodes.len()),
            });
        }

        let elements = nodes
            .into_iter()
            .map(|node| self.hasher.truncate(node))
            .collect();

        debug!(index, "resolved merkle path");
        Ok(MerklePath {
            elements,
            positions: MerklePath::positions_for(index, depth),
            index,
        })
    }

    /// Whether `path` leads from `commitment` to `root`
    pub fn check_root(&self, commitment: &Commitment, path: &MerklePath, root: &FieldWord) -> bool {
        path.verify(&self.hasher, commitment, root)
    }

    /// Like [`check_root`](Self::check_root) but reports the computed root on failure
    pub fn ensure_root(
        &self,
        commitment: &Commitment,
        path: &MerklePath,
        root: &FieldWord,
    ) -> Result<()> {
        let computed = path.compute_root(&self.hasher, commitment);
        if computed == *root {
            return Ok(());
        }

        warn!(index = path.index, %computed, claimed = %root, "merkle root mismatch");
        Err(ShieldError::RootMismatch {
            computed,
            claimed: *root,
        })
    }
}
