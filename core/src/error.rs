//! Error taxonomy for shielded operations.
//!
//! Three families:
//! - input errors: the request itself is wrong and retrying it cannot help
//! - staleness: the caller's view of the tree is behind the ledger; refresh and retry
//! - external: the prover or the ledger refused
use num_bigint::BigUint;
use thiserror::Error;
use umbra_privacy::{CodecError, Commitment, FieldWord};
use umbra_prover::{CircuitKind, ProverError, VectorError};

use crate::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum ShieldError {
    #[error("Value does not fit its encoding: {0}")]
    EncodingOverflow(CodecError),

    /// Inputs and outputs of a transfer do not sum to the same amount
    #[error("Value not conserved: inputs total {inputs}, outputs total {outputs}")]
    ValueConservation { inputs: BigUint, outputs: BigUint },

    /// A transfer total exceeds what the circuit's adder can hold
    #[error("Total {total} exceeds the circuit limit {limit}")]
    ValueTooLarge { total: BigUint, limit: u128 },

    #[error("Batch expects {expected} outputs, got {actual}")]
    BatchSizeMismatch { expected: usize, actual: usize },

    /// Two outputs of one operation commit to the same note
    #[error("Duplicate output commitment {0}")]
    DuplicateCommitment(Commitment),

    /// An input note's value, salt or owner does not reproduce its commitment
    #[error("Note at index {index} does not open its commitment: claimed {claimed}, computed {computed}")]
    NoteMismatch {
        index: u64,
        claimed: Commitment,
        computed: Commitment,
    },

    #[error("Merkle root mismatch: computed {computed}, claimed {claimed}")]
    RootMismatch {
        computed: FieldWord,
        claimed: FieldWord,
    },

    #[error("Merkle state is stale: {0}")]
    StaleMerkleState(String),

    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(#[source] ProverError),

    #[error("Ledger rejected the operation: {reason}")]
    LedgerRejected { reason: String },

    #[error("No verification key registered for {0}")]
    UnregisteredCircuit(CircuitKind),

    /// Parameters did not fit the circuit's argument layout
    #[error("Invalid circuit arguments: {0}")]
    Layout(VectorError),
}

impl ShieldError {
    /// The caller should refresh its Merkle view and retry
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            ShieldError::RootMismatch { .. } | ShieldError::StaleMerkleState(_)
        )
    }

    /// The request was invalid before anything external was contacted
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ShieldError::EncodingOverflow(_)
                | ShieldError::ValueConservation { .. }
                | ShieldError::ValueTooLarge { .. }
                | ShieldError::BatchSizeMismatch { .. }
                | ShieldError::DuplicateCommitment(_)
                | ShieldError::NoteMismatch { .. }
        )
    }
}

impl From<CodecError> for ShieldError {
    fn from(err: CodecError) -> Self {
        ShieldError::EncodingOverflow(err)
    }
}

impl From<VectorError> for ShieldError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::Codec(codec) => ShieldError::EncodingOverflow(codec),
            other => ShieldError::Layout(other),
        }
    }
}

impl From<ProverError> for ShieldError {
    fn from(err: ProverError) -> Self {
        ShieldError::ProofGenerationFailed(err)
    }
}

impl From<LedgerError> for ShieldError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(reason) => ShieldError::LedgerRejected { reason },
            stale @ (LedgerError::LeafMismatch { .. } | LedgerError::UnknownIndex(_)) => {
                ShieldError::StaleMerkleState(stale.to_string())
            }
        }
    }
}

/// Result type for shielded operations
pub type Result<T> = std::result::Result<T, ShieldError>;
