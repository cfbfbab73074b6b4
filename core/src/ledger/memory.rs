//! In-process ledger
//!
//! Keeps the commitment tree, recent roots, spent nullifiers and public balances
//! behind one lock. Proofs are checked for shape and for the public input hash they
//! commit to, not cryptographically.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use umbra_privacy::{
    Address, Commitment, CommitmentScheme, FieldCodec, FieldWord, MerkleHasher, MerkleTree,
    Nullifier, NullifierSet, RootHistory,
};
use umbra_prover::vector::{
    batch_input_hash, burn_input_hash, mint_input_hash, transfer_input_hash,
};
use umbra_prover::{CircuitKind, CircuitRegistry};

use super::{
    BatchTransferSubmission, BurnSubmission, Ledger, LedgerError, LedgerReceipt, MintSubmission,
    ProofEnvelope, TransferSubmission,
};

#[derive(Debug)]
struct ShieldState {
    tree: MerkleTree,
    roots: RootHistory,
    nullifiers: NullifierSet,
    commitments: HashSet<Commitment>,
    balances: HashMap<Address, u128>,
}

impl ShieldState {
    fn ensure_known_root(&self, root: &FieldWord) -> Result<(), LedgerError> {
        if self.roots.is_valid(root) {
            Ok(())
        } else {
            Err(LedgerError::rejected(format!("unknown root {root}")))
        }
    }

    fn ensure_unspent(&self, nullifiers: &[Nullifier]) -> Result<(), LedgerError> {
        for (i, nullifier) in nullifiers.iter().enumerate() {
            if self.nullifiers.contains(nullifier) {
                return Err(LedgerError::rejected(format!(
                    "nullifier {nullifier} already spent"
                )));
            }
            if nullifiers[..i].contains(nullifier) {
                return Err(LedgerError::rejected(format!(
                    "nullifier {nullifier} repeated in submission"
                )));
            }
        }
        Ok(())
    }

    fn ensure_fresh(&self, commitments: &[Commitment]) -> Result<(), LedgerError> {
        for (i, commitment) in commitments.iter().enumerate() {
            if self.commitments.contains(commitment) || commitments[..i].contains(commitment) {
                return Err(LedgerError::rejected(format!(
                    "commitment {commitment} already exists"
                )));
            }
        }
        let free = self.tree.capacity() - self.tree.len();
        if (commitments.len() as u64) > free {
            return Err(LedgerError::rejected("commitment tree is full"));
        }
        Ok(())
    }

    /// Apply a validated update: spend nullifiers, insert commitments, record the root
    fn apply(
        &mut self,
        nullifiers: &[Nullifier],
        commitments: &[Commitment],
    ) -> Result<LedgerReceipt, LedgerError> {
        for nullifier in nullifiers {
            self.nullifiers.insert(*nullifier);
        }

        let mut indices = Vec::with_capacity(commitments.len());
        for commitment in commitments {
            let index = self
                .tree
                .insert(commitment)
                .map_err(|e| LedgerError::rejected(e.to_string()))?;
            self.commitments.insert(*commitment);
            indices.push(index);
        }

        let root = self.tree.root();
        self.roots.push(root);
        Ok(LedgerReceipt { indices, root })
    }
}

/// Ledger kept in memory, for tests and local runs
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<ShieldState>,
    registry: CircuitRegistry,
    scheme: CommitmentScheme,
}

impl InMemoryLedger {
    pub fn new(
        hasher: MerkleHasher,
        root_history: usize,
        registry: CircuitRegistry,
        scheme: CommitmentScheme,
    ) -> Self {
        let tree = MerkleTree::new(hasher);
        let mut roots = RootHistory::new(root_history);
        roots.push(tree.root());

        Self {
            state: Mutex::new(ShieldState {
                tree,
                roots,
                nullifiers: NullifierSet::new(),
                commitments: HashSet::new(),
                balances: HashMap::new(),
            }),
            registry,
            scheme,
        }
    }

    /// Add public funds to an account
    pub async fn credit(&self, account: Address, amount: u128) {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub async fn balance_of(&self, account: &Address) -> u128 {
        let state = self.state.lock().await;
        state.balances.get(account).copied().unwrap_or_default()
    }

    pub async fn root(&self) -> FieldWord {
        self.state.lock().await.tree.root()
    }

    pub async fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.state.lock().await.nullifiers.contains(nullifier)
    }

    /// Leaves inserted so far
    pub async fn commitment_count(&self) -> u64 {
        self.state.lock().await.tree.len()
    }

    /// Check the envelope against the registry and the expected public input hash
    fn check_envelope(
        &self,
        circuit: CircuitKind,
        envelope: &ProofEnvelope,
        expected_hash: &FieldWord,
    ) -> Result<(), LedgerError> {
        match self.registry.vk_id(circuit) {
            Some(vk_id) if vk_id == envelope.vk_id => {}
            Some(_) => {
                return Err(LedgerError::rejected(format!(
                    "vk id {} is not registered for {circuit}",
                    envelope.vk_id
                )));
            }
            None => {
                return Err(LedgerError::rejected(format!(
                    "no verification key for {circuit}"
                )));
            }
        }

        if envelope.proof.is_empty() {
            return Err(LedgerError::rejected("empty proof"));
        }

        let packing = self.scheme.codec().packing_size();
        let claimed = FieldCodec::unpack(&envelope.public_inputs, packing);
        if claimed != expected_hash.to_biguint() {
            return Err(LedgerError::rejected("public input hash does not match"));
        }
        Ok(())
    }

    fn reject<T>(circuit: CircuitKind, err: LedgerError) -> Result<T, LedgerError> {
        warn!(circuit = %circuit, "submission rejected: {}", err);
        Err(err)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(
            MerkleHasher::default(),
            100,
            CircuitRegistry::local(),
            CommitmentScheme::default(),
        )
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn latest_root(&self) -> Result<FieldWord, LedgerError> {
        Ok(self.root().await)
    }

    async fn path_query(
        &self,
        commitment: &Commitment,
        index: u64,
    ) -> Result<Vec<[u8; 32]>, LedgerError> {
        let state = self.state.lock().await;
        let path = state
            .tree
            .path(index)
            .ok_or(LedgerError::UnknownIndex(index))?;
        if !state.tree.contains(index, commitment) {
            return Err(LedgerError::LeafMismatch { index });
        }

        debug!(index, "served path query");
        Ok(path.elements.iter().map(|node| *node.as_bytes()).collect())
    }

    async fn mint(&self, submission: &MintSubmission) -> Result<LedgerReceipt, LedgerError> {
        let circuit = CircuitKind::FtMint;
        let expected = mint_input_hash(&self.scheme, submission.value, &submission.commitment);
        if let Err(err) = self.check_envelope(circuit, &submission.envelope, &expected) {
            return Self::reject(circuit, err);
        }

        let mut state = self.state.lock().await;
        let account = submission.envelope.account;
        let amount = submission.value.as_u128();
        let balance = state.balances.get(&account).copied().unwrap_or_default();
        if balance < amount {
            return Self::reject(
                circuit,
                LedgerError::rejected(format!(
                    "account {account} holds {balance:#x}, mint needs {amount:#x}"
                )),
            );
        }
        if let Err(err) = state.ensure_fresh(&[submission.commitment]) {
            return Self::reject(circuit, err);
        }

        let receipt = state.apply(&[], &[submission.commitment])?;
        state.balances.insert(account, balance - amount);

        info!(
            commitment = %submission.commitment,
            index = receipt.indices[0],
            "minted"
        );
        Ok(receipt)
    }

    async fn transfer(
        &self,
        submission: &TransferSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        let circuit = CircuitKind::FtTransfer;
        let expected = transfer_input_hash(
            &self.scheme,
            &submission.root,
            &submission.nullifiers,
            &submission.commitments,
        );
        if let Err(err) = self.check_envelope(circuit, &submission.envelope, &expected) {
            return Self::reject(circuit, err);
        }

        let mut state = self.state.lock().await;
        let checks = state
            .ensure_known_root(&submission.root)
            .and_then(|_| state.ensure_unspent(&submission.nullifiers))
            .and_then(|_| state.ensure_fresh(&submission.commitments));
        if let Err(err) = checks {
            return Self::reject(circuit, err);
        }

        let receipt = state.apply(&submission.nullifiers, &submission.commitments)?;
        info!(indices = ?receipt.indices, root = %receipt.root, "transfer accepted");
        Ok(receipt)
    }

    async fn simple_batch_transfer(
        &self,
        submission: &BatchTransferSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        let circuit = CircuitKind::FtBatchTransfer;
        let expected = batch_input_hash(
            &self.scheme,
            &submission.root,
            &submission.nullifier,
            &submission.commitments,
        );
        if let Err(err) = self.check_envelope(circuit, &submission.envelope, &expected) {
            return Self::reject(circuit, err);
        }

        let mut state = self.state.lock().await;
        let nullifiers = [submission.nullifier];
        let checks = state
            .ensure_known_root(&submission.root)
            .and_then(|_| state.ensure_unspent(&nullifiers))
            .and_then(|_| state.ensure_fresh(&submission.commitments));
        if let Err(err) = checks {
            return Self::reject(circuit, err);
        }

        let receipt = state.apply(&nullifiers, &submission.commitments)?;
        info!(
            outputs = receipt.indices.len(),
            root = %receipt.root,
            "batch transfer accepted"
        );
        Ok(receipt)
    }

    async fn burn(&self, submission: &BurnSubmission) -> Result<LedgerReceipt, LedgerError> {
        let circuit = CircuitKind::FtBurn;
        let expected = burn_input_hash(
            &self.scheme,
            &submission.root,
            &submission.nullifier,
            submission.value,
            &submission.payout,
        );
        if let Err(err) = self.check_envelope(circuit, &submission.envelope, &expected) {
            return Self::reject(circuit, err);
        }

        let mut state = self.state.lock().await;
        let nullifiers = [submission.nullifier];
        let checks = state
            .ensure_known_root(&submission.root)
            .and_then(|_| state.ensure_unspent(&nullifiers));
        if let Err(err) = checks {
            return Self::reject(circuit, err);
        }

        let payout = submission.payout;
        let balance = state.balances.get(&payout).copied().unwrap_or_default();
        let Some(credited) = balance.checked_add(submission.value.as_u128()) else {
            return Self::reject(circuit, LedgerError::rejected("payout balance overflow"));
        };

        let receipt = state.apply(&nullifiers, &[])?;
        state.balances.insert(payout, credited);

        info!(payout = %payout, value = %submission.value, "burned");
        Ok(receipt)
    }
}
