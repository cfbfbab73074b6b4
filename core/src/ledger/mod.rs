//! Ledger Interface
//!
//! ```text
//! ┌──────────────┐  latest_root / path_query   ┌─────────────────┐
//! │ Orchestrator │ ──────────────────────────► │    dyn Ledger   │
//! │              │  mint / transfer / burn     │  (InMemoryLedger│
//! │              │ ──────────────────────────► │   or a chain)   │
//! └──────────────┘ ◄────────── receipt ─────── └─────────────────┘
//! ```
//!
//! The ledger verifies proofs, keeps the nullifier set and the commitment tree,
//! and moves public funds. Nothing here trusts the client's tree view.

mod memory;

pub use memory::InMemoryLedger;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use umbra_privacy::{Address, Commitment, FieldElement, FieldWord, NoteValue, Nullifier};
use umbra_prover::{Proof, VkId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0}")]
    Rejected(String),

    /// The leaf at `index` is not the queried commitment
    #[error("leaf {index} does not hold the queried commitment")]
    LeafMismatch { index: u64 },

    #[error("no leaf at index {0}")]
    UnknownIndex(u64),
}

impl LedgerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        LedgerError::Rejected(reason.into())
    }
}

/// Fields every submission carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofEnvelope {
    pub proof: Proof,
    /// Packed public input hash, as laid out in the proof vector
    pub public_inputs: Vec<FieldElement>,
    pub vk_id: VkId,
    /// Public account paying for or receiving funds
    pub account: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintSubmission {
    pub envelope: ProofEnvelope,
    pub value: NoteValue,
    pub commitment: Commitment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSubmission {
    pub envelope: ProofEnvelope,
    pub root: FieldWord,
    pub nullifiers: [Nullifier; 2],
    pub commitments: [Commitment; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchTransferSubmission {
    pub envelope: ProofEnvelope,
    pub root: FieldWord,
    pub nullifier: Nullifier,
    pub commitments: Vec<Commitment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnSubmission {
    pub envelope: ProofEnvelope,
    pub root: FieldWord,
    pub nullifier: Nullifier,
    pub value: NoteValue,
    pub payout: Address,
}

/// What the ledger reports after accepting a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    /// Leaf indices of inserted commitments, in submission order
    pub indices: Vec<u64>,
    /// Tree root after the update
    pub root: FieldWord,
}

/// The on-chain side of the shield
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current root of the commitment tree
    async fn latest_root(&self) -> Result<FieldWord, LedgerError>;

    /// Sibling nodes for the leaf at `index`, leaf level first, as stored
    async fn path_query(
        &self,
        commitment: &Commitment,
        index: u64,
    ) -> Result<Vec<[u8; 32]>, LedgerError>;

    async fn mint(&self, submission: &MintSubmission) -> Result<LedgerReceipt, LedgerError>;

    async fn transfer(&self, submission: &TransferSubmission)
    -> Result<LedgerReceipt, LedgerError>;

    async fn simple_batch_transfer(
        &self,
        submission: &BatchTransferSubmission,
    ) -> Result<LedgerReceipt, LedgerError>;

    async fn burn(&self, submission: &BurnSubmission) -> Result<LedgerReceipt, LedgerError>;
}
