//! Transfer Orchestrator
//!
//! Runs one shielded operation end to end.
//!
//! ```text
//! ┌──────────┐  ┌────────┐  ┌──────────────┐  ┌───────┐  ┌───────┐  ┌────────┐
//! │ validate │─▶│ derive │─▶│ resolve paths│─▶│ build │─▶│ prove │─▶│ submit │
//! └──────────┘  └────────┘  └──────────────┘  └───────┘  └───────┘  └────────┘
//!   no I/O        hashes      ledger reads      vector     prover     ledger
//! ```
//!
//! Validation reopens every input note against the spender's key, so a note with a
//! wrong value or salt is refused before any ledger read or proof.
//!
//! Nothing is written to the ledger before the final step, so any failure up to and
//! including proving leaves it untouched. There are no retries: stale state and ledger
//! rejections go back to the caller, who re-resolves and tries again.

use std::sync::Arc;

use num_bigint::BigUint;
use serde::Serialize;
use tracing::{debug, info, warn};
use umbra_privacy::{
    Address, Commitment, CommitmentScheme, CreatedNote, FieldWord, InputNote, NoteValue,
    Nullifier, OutputNote, PublicKey, Salt, SecretKey,
};
use umbra_prover::{
    BatchTransferParams, BurnParams, CircuitKind, CircuitParams, CircuitRegistry, CommittedNote,
    MintParams, Proof, ProofVector, ProofVectorBuilder, Prover, SpentNote, TransferParams, VkId,
};

use crate::context::ShieldContext;
use crate::error::{Result, ShieldError};
use crate::ledger::{
    BatchTransferSubmission, BurnSubmission, Ledger, LedgerError, LedgerReceipt, MintSubmission,
    ProofEnvelope, TransferSubmission,
};
use crate::resolver::MerklePathResolver;

// ============================================================================
// Requests and Outcomes
// ============================================================================

/// Spend two notes into two new ones
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub inputs: [InputNote; 2],
    /// Output 0 goes to `receiver`, output 1 comes back to the sender as change
    pub outputs: [OutputNote; 2],
    pub receiver: PublicKey,
    pub secret_key: SecretKey,
}

/// Spend one note into exactly `batch_size` new ones
#[derive(Debug, Clone)]
pub struct BatchTransferRequest {
    pub input: InputNote,
    pub outputs: Vec<OutputNote>,
    /// One owner per output
    pub receivers: Vec<PublicKey>,
    pub secret_key: SecretKey,
}

#[derive(Debug, Clone)]
pub struct BurnRequest {
    pub note: InputNote,
    pub secret_key: SecretKey,
    /// Defaults to the operating account
    pub payout: Option<Address>,
}

/// Whether a note opens its commitment and sits where it claims in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectnessReport {
    pub index: u64,
    /// `commit(value, owner, salt)` as recomputed from the note's opening
    pub computed: Commitment,
    pub commitment_correct: bool,
    /// The ledger holds the note's commitment at `index`
    pub on_ledger: bool,
}

impl CorrectnessReport {
    pub fn is_correct(&self) -> bool {
        self.commitment_correct && self.on_ledger
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintOutcome {
    pub commitment: Commitment,
    pub index: u64,
}

impl MintOutcome {
    /// The minted note as a spendable input
    pub fn into_input(self, value: NoteValue, salt: Salt) -> InputNote {
        InputNote {
            value,
            salt,
            commitment: self.commitment,
            index: self.index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    /// Receiver's note, then the sender's change
    pub outputs: [CreatedNote; 2],
    pub nullifiers: [Nullifier; 2],
    pub receipt: LedgerReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchTransferOutcome {
    pub outputs: Vec<CreatedNote>,
    pub nullifier: Nullifier,
    pub receipt: LedgerReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnOutcome {
    /// The burned note
    pub commitment: Commitment,
    pub index: u64,
    pub nullifier: Nullifier,
    pub payout: Address,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct TransferOrchestrator {
    prover: Arc<dyn Prover>,
    builder: ProofVectorBuilder,
    resolver: MerklePathResolver,
    registry: CircuitRegistry,
    adder_limit: u128,
}

impl TransferOrchestrator {
    pub fn new(context: &ShieldContext, prover: Arc<dyn Prover>) -> Self {
        Self {
            prover,
            builder: context.vector_builder(),
            resolver: context.resolver(),
            registry: context.registry.clone(),
            adder_limit: context.adder_limit,
        }
    }

    /// Use the prover the context is configured for
    pub fn from_context(context: &ShieldContext) -> Self {
        Self::new(context, context.build_prover())
    }

    pub fn scheme(&self) -> &CommitmentScheme {
        self.builder.scheme()
    }

    pub fn batch_size(&self) -> usize {
        self.builder.packing().batch_size
    }

    /// Check a note against its owner's key and against the ledger's tree
    pub async fn check_correctness(
        &self,
        ledger: &dyn Ledger,
        note: &InputNote,
        owner: &PublicKey,
    ) -> Result<CorrectnessReport> {
        let computed = self.scheme().commit(note.value, owner, &note.salt);
        let on_ledger = match ledger.path_query(&note.commitment, note.index).await {
            Ok(_) => true,
            Err(LedgerError::LeafMismatch { .. } | LedgerError::UnknownIndex(_)) => false,
            Err(err) => return Err(err.into()),
        };

        let report = CorrectnessReport {
            index: note.index,
            computed,
            commitment_correct: computed == note.commitment,
            on_ledger,
        };
        debug!(
            index = report.index,
            commitment_correct = report.commitment_correct,
            on_ledger = report.on_ledger,
            "checked note"
        );
        Ok(report)
    }

    /// Move `value` from `account` into a new note owned by `owner`
    pub async fn mint(
        &self,
        ledger: &dyn Ledger,
        account: Address,
        value: NoteValue,
        owner: &PublicKey,
        salt: Salt,
    ) -> Result<MintOutcome> {
        let circuit = CircuitKind::FtMint;
        let vk_id = self.vk_id(circuit)?;

        let commitment = self.scheme().commit(value, owner, &salt);
        debug!(%commitment, value = %value, "derived mint commitment");

        let vector = self.builder.build(&CircuitParams::Mint(MintParams {
            value,
            public_key: *owner,
            salt,
            commitment,
        }))?;
        let proof = self.prove(circuit, &vector).await?;

        let submission = MintSubmission {
            envelope: Self::envelope(proof, &vector, vk_id, account),
            value,
            commitment,
        };
        let receipt = ledger
            .mint(&submission)
            .await
            .map_err(|e| Self::submission_failed(circuit, e))?;
        let index = Self::indices(&receipt, 1)?[0];

        info!(%commitment, index, "mint complete");
        Ok(MintOutcome { commitment, index })
    }

    /// Spend two notes: one output to the receiver, the other back to the sender
    pub async fn transfer(
        &self,
        ledger: &dyn Ledger,
        account: Address,
        request: &TransferRequest,
    ) -> Result<TransferOutcome> {
        let circuit = CircuitKind::FtTransfer;

        let sender = self.scheme().public_key(&request.secret_key);
        for note in &request.inputs {
            self.open_note(note, &sender)?;
        }
        let inputs_total = total(request.inputs.iter().map(|n| n.value));
        let outputs_total = total(request.outputs.iter().map(|n| n.value));
        self.check_adder(&inputs_total)?;
        self.check_adder(&outputs_total)?;
        if inputs_total != outputs_total {
            return Err(ShieldError::ValueConservation {
                inputs: inputs_total,
                outputs: outputs_total,
            });
        }
        let vk_id = self.vk_id(circuit)?;

        let scheme = self.scheme();
        let owners = [request.receiver, sender];
        let outputs: [CommittedNote; 2] =
            std::array::from_fn(|i| self.commit_output(&request.outputs[i], &owners[i]));
        let commitments = [outputs[0].commitment, outputs[1].commitment];
        ensure_distinct(&commitments)?;
        let nullifiers: [Nullifier; 2] =
            std::array::from_fn(|i| scheme.nullifier(&request.inputs[i].salt, &request.secret_key));
        debug!(
            nullifier0 = %nullifiers[0],
            nullifier1 = %nullifiers[1],
            "derived transfer values"
        );

        let root = ledger.latest_root().await?;
        let inputs = [
            self.resolve(ledger, &request.inputs[0], &root).await?,
            self.resolve(ledger, &request.inputs[1], &root).await?,
        ];

        let vector = self.builder.build(&CircuitParams::Transfer(TransferParams {
            secret_key: request.secret_key,
            inputs,
            nullifiers,
            outputs: outputs.clone(),
            receiver: request.receiver,
            sender,
            root,
        }))?;
        let proof = self.prove(circuit, &vector).await?;

        let submission = TransferSubmission {
            envelope: Self::envelope(proof, &vector, vk_id, account),
            root,
            nullifiers,
            commitments,
        };
        let receipt = ledger
            .transfer(&submission)
            .await
            .map_err(|e| Self::submission_failed(circuit, e))?;

        let indices = Self::indices(&receipt, 2)?;
        let [out0, out1] = outputs;
        let outputs = [created(out0, indices[0]), created(out1, indices[1])];

        info!(
            receiver_index = outputs[0].index,
            change_index = outputs[1].index,
            "transfer complete"
        );
        Ok(TransferOutcome {
            outputs,
            nullifiers,
            receipt,
        })
    }

    /// Spend one note into `batch_size` outputs, one per receiver
    pub async fn simple_batch_transfer(
        &self,
        ledger: &dyn Ledger,
        account: Address,
        request: &BatchTransferRequest,
    ) -> Result<BatchTransferOutcome> {
        let circuit = CircuitKind::FtBatchTransfer;

        let expected = self.batch_size();
        for actual in [request.outputs.len(), request.receivers.len()] {
            if actual != expected {
                return Err(ShieldError::BatchSizeMismatch { expected, actual });
            }
        }
        let sender = self.scheme().public_key(&request.secret_key);
        self.open_note(&request.input, &sender)?;
        let inputs_total = BigUint::from(request.input.value.as_u128());
        let outputs_total = total(request.outputs.iter().map(|n| n.value));
        if inputs_total != outputs_total {
            return Err(ShieldError::ValueConservation {
                inputs: inputs_total,
                outputs: outputs_total,
            });
        }
        let vk_id = self.vk_id(circuit)?;

        let scheme = self.scheme();
        let outputs: Vec<CommittedNote> = request
            .outputs
            .iter()
            .zip(&request.receivers)
            .map(|(output, owner)| self.commit_output(output, owner))
            .collect();
        let commitments: Vec<Commitment> = outputs.iter().map(|n| n.commitment).collect();
        ensure_distinct(&commitments)?;
        let nullifier = scheme.nullifier(&request.input.salt, &request.secret_key);
        debug!(%nullifier, outputs = outputs.len(), "derived batch values");

        let root = ledger.latest_root().await?;
        let input = self.resolve(ledger, &request.input, &root).await?;

        let vector = self
            .builder
            .build(&CircuitParams::BatchTransfer(BatchTransferParams {
                secret_key: request.secret_key,
                input,
                nullifier,
                outputs: outputs.clone(),
                receivers: request.receivers.clone(),
                root,
            }))?;
        let proof = self.prove(circuit, &vector).await?;

        let submission = BatchTransferSubmission {
            envelope: Self::envelope(proof, &vector, vk_id, account),
            root,
            nullifier,
            commitments,
        };
        let receipt = ledger
            .simple_batch_transfer(&submission)
            .await
            .map_err(|e| Self::submission_failed(circuit, e))?;

        let indices = Self::indices(&receipt, outputs.len())?;
        let outputs: Vec<CreatedNote> = outputs
            .into_iter()
            .zip(indices)
            .map(|(note, index)| created(note, *index))
            .collect();

        info!(outputs = outputs.len(), "batch transfer complete");
        Ok(BatchTransferOutcome {
            outputs,
            nullifier,
            receipt,
        })
    }

    /// Spend a note and pay its value out to a public account
    pub async fn burn(
        &self,
        ledger: &dyn Ledger,
        account: Address,
        request: &BurnRequest,
    ) -> Result<BurnOutcome> {
        let circuit = CircuitKind::FtBurn;

        let owner = self.scheme().public_key(&request.secret_key);
        self.open_note(&request.note, &owner)?;
        let vk_id = self.vk_id(circuit)?;

        let payout = request.payout.unwrap_or(account);
        let nullifier = self
            .scheme()
            .nullifier(&request.note.salt, &request.secret_key);
        debug!(%nullifier, %payout, "derived burn values");

        let root = ledger.latest_root().await?;
        let note = self.resolve(ledger, &request.note, &root).await?;

        let value = request.note.value;
        let vector = self.builder.build(&CircuitParams::Burn(BurnParams {
            secret_key: request.secret_key,
            note,
            nullifier,
            root,
            payout,
        }))?;
        let proof = self.prove(circuit, &vector).await?;

        let submission = BurnSubmission {
            envelope: Self::envelope(proof, &vector, vk_id, account),
            root,
            nullifier,
            value,
            payout,
        };
        ledger
            .burn(&submission)
            .await
            .map_err(|e| Self::submission_failed(circuit, e))?;

        info!(index = request.note.index, %payout, "burn complete");
        Ok(BurnOutcome {
            commitment: request.note.commitment,
            index: request.note.index,
            nullifier,
            payout,
        })
    }

    // ------------------------------------------------------------------------
    // Pipeline steps
    // ------------------------------------------------------------------------

    fn vk_id(&self, circuit: CircuitKind) -> Result<VkId> {
        self.registry
            .vk_id(circuit)
            .ok_or(ShieldError::UnregisteredCircuit(circuit))
    }

    fn check_adder(&self, sum: &BigUint) -> Result<()> {
        if *sum > BigUint::from(self.adder_limit) {
            return Err(ShieldError::ValueTooLarge {
                total: sum.clone(),
                limit: self.adder_limit,
            });
        }
        Ok(())
    }

    /// The note's opening must reproduce its commitment under `owner`
    fn open_note(&self, note: &InputNote, owner: &PublicKey) -> Result<()> {
        let computed = self.scheme().commit(note.value, owner, &note.salt);
        if computed != note.commitment {
            warn!(index = note.index, "input note does not open its commitment");
            return Err(ShieldError::NoteMismatch {
                index: note.index,
                claimed: note.commitment,
                computed,
            });
        }
        Ok(())
    }

    fn commit_output(&self, output: &OutputNote, owner: &PublicKey) -> CommittedNote {
        CommittedNote {
            value: output.value,
            salt: output.salt,
            commitment: self.scheme().commit(output.value, owner, &output.salt),
        }
    }

    /// Fetch a path for `note` and check it leads to `root`
    async fn resolve(
        &self,
        ledger: &dyn Ledger,
        note: &InputNote,
        root: &FieldWord,
    ) -> Result<SpentNote> {
        let path = self
            .resolver
            .compute_path(ledger, &note.commitment, note.index)
            .await?;

        if let Err(err) = self.resolver.ensure_root(&note.commitment, &path, root) {
            warn!(index = note.index, "input path does not reach the latest root");
            return Err(ShieldError::StaleMerkleState(err.to_string()));
        }

        Ok(SpentNote {
            value: note.value,
            salt: note.salt,
            path,
        })
    }

    async fn prove(&self, circuit: CircuitKind, vector: &ProofVector) -> Result<Proof> {
        info!(
            circuit = %circuit,
            prover = self.prover.name(),
            elements = vector.len(),
            "generating proof"
        );
        self.prover.prove(circuit, vector).await.map_err(|e| {
            warn!(circuit = %circuit, "proof generation failed: {}", e);
            ShieldError::ProofGenerationFailed(e)
        })
    }

    fn envelope(proof: Proof, vector: &ProofVector, vk_id: VkId, account: Address) -> ProofEnvelope {
        ProofEnvelope {
            proof,
            public_inputs: vector.public_inputs().to_vec(),
            vk_id,
            account,
        }
    }

    fn submission_failed(circuit: CircuitKind, err: LedgerError) -> ShieldError {
        warn!(circuit = %circuit, "ledger refused submission: {}", err);
        ShieldError::from(err)
    }

    fn indices(receipt: &LedgerReceipt, expected: usize) -> Result<&[u64]> {
        if receipt.indices.len() != expected {
            return Err(ShieldError::LedgerRejected {
                reason: format!(
                    "receipt lists {} leaf indices, expected {expected}",
                    receipt.indices.len()
                ),
            });
        }
        Ok(&receipt.indices)
    }
}

/// Arbitrary-precision sum, so the limit check itself cannot wrap
fn total(values: impl Iterator<Item = NoteValue>) -> BigUint {
    values.map(|v| BigUint::from(v.as_u128())).sum()
}

fn ensure_distinct(commitments: &[Commitment]) -> Result<()> {
    for (i, commitment) in commitments.iter().enumerate() {
        if commitments[..i].contains(commitment) {
            return Err(ShieldError::DuplicateCommitment(*commitment));
        }
    }
    Ok(())
}

fn created(note: CommittedNote, index: u64) -> CreatedNote {
    CreatedNote {
        value: note.value,
        salt: note.salt,
        commitment: note.commitment,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_does_not_wrap() {
        let sum = total([NoteValue(u128::MAX), NoteValue(1)].into_iter());
        assert_eq!(sum, BigUint::from(u128::MAX) + 1u32);
    }

    #[test]
    fn test_ensure_distinct() {
        let codec = umbra_privacy::FieldCodec::default();
        let a = Commitment::parse(&codec, "0x01").unwrap();
        let b = Commitment::parse(&codec, "0x02").unwrap();

        assert!(ensure_distinct(&[a, b]).is_ok());
        assert!(matches!(
            ensure_distinct(&[a, b, a]),
            Err(ShieldError::DuplicateCommitment(c)) if c == a
        ));
    }

    #[test]
    fn test_check_adder_boundary() {
        let orchestrator = TransferOrchestrator::from_context(&ShieldContext::local());

        assert!(orchestrator.check_adder(&BigUint::from(0xFFFF_FFFFu64)).is_ok());
        assert!(matches!(
            orchestrator.check_adder(&BigUint::from(0x1_0000_0000u64)),
            Err(ShieldError::ValueTooLarge { limit: 0xFFFF_FFFF, .. })
        ));
    }
}
