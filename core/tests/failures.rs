mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{ALICE, TestFixture};
use umbra_core::{
    BatchTransferRequest, BatchTransferSubmission, BurnRequest, BurnSubmission, InMemoryLedger, Ledger, LedgerError,
    LedgerReceipt, MintSubmission, ShieldError, TransferRequest, TransferSubmission,
};
use umbra_privacy::{Address, Commitment, FieldWord, NoteValue};
use umbra_prover::{CircuitKind, Proof, ProofVector, Prover, ProverError};

/// Prover whose toolchain always fails
struct FailingProver;

#[async_trait]
impl Prover for FailingProver {
    async fn prove(
        &self,
        _circuit: CircuitKind,
        _vector: &ProofVector,
    ) -> Result<Proof, ProverError> {
        Err(ProverError::CommandFailed {
            command: "zokrates generate-proof".into(),
            stderr: "out of memory".into(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Ledger that reports a root from before the latest insertions
struct StaleRootLedger<'a> {
    inner: &'a InMemoryLedger,
    root: FieldWord,
}

#[async_trait]
impl<'a> Ledger for StaleRootLedger<'a> {
    async fn latest_root(&self) -> Result<FieldWord, LedgerError> {
        Ok(self.root)
    }

    async fn path_query(
        &self,
        commitment: &Commitment,
        index: u64,
    ) -> Result<Vec<[u8; 32]>, LedgerError> {
        self.inner.path_query(commitment, index).await
    }

    async fn mint(&self, submission: &MintSubmission) -> Result<LedgerReceipt, LedgerError> {
        self.inner.mint(submission).await
    }

    async fn transfer(
        &self,
        submission: &TransferSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.inner.transfer(submission).await
    }

    async fn simple_batch_transfer(
        &self,
        submission: &BatchTransferSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.inner.simple_batch_transfer(submission).await
    }

    async fn burn(&self, submission: &BurnSubmission) -> Result<LedgerReceipt, LedgerError> {
        self.inner.burn(submission).await
    }
}

#[tokio::test]
async fn test_spent_notes_cannot_be_respent() {
    let mut f = TestFixture::new().await;
    let alice_pk = f.alice.pk;
    let c = f.mint(ALICE, alice_pk, 0x20).await;
    let d = f.mint(ALICE, alice_pk, 0x30).await;

    let request = TransferRequest {
        inputs: [c.clone(), d.clone()],
        outputs: [f.output(0x40), f.output(0x10)],
        receiver: f.bob.pk,
        secret_key: f.alice.sk,
    };
    let first = f
        .orchestrator
        .transfer(&f.ledger, ALICE, &request)
        .await
        .unwrap();
    let root = f.ledger.root().await;

    // Same inputs, fresh outputs: the proof is valid but the nullifiers are spent
    let replay = TransferRequest {
        outputs: [f.output(0x40), f.output(0x10)],
        ..request
    };
    let replayed = [
        f.ctx.scheme.nullifier(&replay.inputs[0].salt, &replay.secret_key),
        f.ctx.scheme.nullifier(&replay.inputs[1].salt, &replay.secret_key),
    ];
    assert_eq!(replayed, first.nullifiers);
    assert_eq!(
        replayed,
        [
            f.ctx.scheme.nullifier(&c.salt, &f.alice.sk),
            f.ctx.scheme.nullifier(&d.salt, &f.alice.sk),
        ]
    );

    let err = f
        .orchestrator
        .transfer(&f.ledger, ALICE, &replay)
        .await
        .unwrap_err();
    match &err {
        ShieldError::LedgerRejected { reason } => assert!(reason.contains("already spent")),
        other => panic!("expected LedgerRejected, got {other:?}"),
    }
    assert!(!err.is_stale());
    assert_eq!(f.ledger.root().await, root);
    assert_eq!(f.ledger.commitment_count().await, 4);
}

#[tokio::test]
async fn test_same_note_twice_in_one_transfer() {
    let mut f = TestFixture::new().await;
    let alice_pk = f.alice.pk;
    let c = f.mint(ALICE, alice_pk, 0x20).await;

    let request = TransferRequest {
        inputs: [c.clone(), c.clone()],
        outputs: [f.output(0x30), f.output(0x10)],
        receiver: f.bob.pk,
        secret_key: f.alice.sk,
    };
    let err = f
        .orchestrator
        .transfer(&f.ledger, ALICE, &request)
        .await
        .unwrap_err();
    match err {
        ShieldError::LedgerRejected { reason } => assert!(reason.contains("repeated")),
        other => panic!("expected LedgerRejected, got {other:?}"),
    }

    let nullifier = f.ctx.scheme.nullifier(&c.salt, &f.alice.sk);
    assert!(!f.ledger.is_spent(&nullifier).await);
}

#[tokio::test]
async fn test_double_burn_rejected() {
    let mut f = TestFixture::new().await;
    let alice_pk = f.alice.pk;
    let note = f.mint(ALICE, alice_pk, 0x20).await;
    let request = BurnRequest {
        note,
        secret_key: f.alice.sk,
        payout: None,
    };

    f.orchestrator.burn(&f.ledger, ALICE, &request).await.unwrap();
    let balance = f.ledger.balance_of(&ALICE).await;

    let err = f
        .orchestrator
        .burn(&f.ledger, ALICE, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, ShieldError::LedgerRejected { .. }));
    assert_eq!(f.ledger.balance_of(&ALICE).await, balance);
}

#[tokio::test]
async fn test_mint_without_funds_rejected() {
    let mut f = TestFixture::new().await;
    let broke = Address::new([0x00; 20]);
    let salt = f.salt();

    let err = f
        .orchestrator
        .mint(&f.ledger, broke, NoteValue(1), &f.alice.pk, salt)
        .await
        .unwrap_err();
    assert!(matches!(err, ShieldError::LedgerRejected { .. }));
    assert_eq!(f.ledger.commitment_count().await, 0);
}

#[tokio::test]
async fn test_prover_failure_leaves_ledger_untouched() {
    let mut f = TestFixture::new().await;
    let alice_pk = f.alice.pk;
    let c = f.mint(ALICE, alice_pk, 0x20).await;
    let d = f.mint(ALICE, alice_pk, 0x30).await;
    let root = f.ledger.root().await;
    let balance = f.ledger.balance_of(&ALICE).await;

    let failing = f.orchestrator_with(Arc::new(FailingProver));
    let request = TransferRequest {
        inputs: [c.clone(), d],
        outputs: [f.output(0x40), f.output(0x10)],
        receiver: f.bob.pk,
        secret_key: f.alice.sk,
    };
    let err = failing
        .transfer(&f.ledger, ALICE, &request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShieldError::ProofGenerationFailed(ProverError::CommandFailed { .. })
    ));

    let salt = f.salt();
    let err = failing
        .mint(&f.ledger, ALICE, NoteValue(5), &alice_pk, salt)
        .await
        .unwrap_err();
    assert!(matches!(err, ShieldError::ProofGenerationFailed(_)));

    assert_eq!(f.ledger.root().await, root);
    assert_eq!(f.ledger.commitment_count().await, 2);
    assert_eq!(f.ledger.balance_of(&ALICE).await, balance);
    let nullifier = f.ctx.scheme.nullifier(&c.salt, &f.alice.sk);
    assert!(!f.ledger.is_spent(&nullifier).await);
}

#[tokio::test]
async fn test_stale_root_aborts_before_proving() {
    let mut f = TestFixture::new().await;
    let alice_pk = f.alice.pk;
    let c = f.mint(ALICE, alice_pk, 0x20).await;
    let stale_root = f.ledger.root().await;
    let d = f.mint(ALICE, alice_pk, 0x30).await;

    let request = TransferRequest {
        inputs: [c, d],
        outputs: [f.output(0x40), f.output(0x10)],
        receiver: f.bob.pk,
        secret_key: f.alice.sk,
    };
    // With a failing prover, only an abort before proving yields a staleness error
    let failing = f.orchestrator_with(Arc::new(FailingProver));
    let stale = StaleRootLedger {
        inner: &f.ledger,
        root: stale_root,
    };

    let err = failing
        .transfer(&stale, ALICE, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, ShieldError::StaleMerkleState(_)));
    assert!(err.is_stale());
}

#[tokio::test]
async fn test_wrong_leaf_index_is_stale() {
    let mut f = TestFixture::new().await;
    let alice_pk = f.alice.pk;
    let mut note = f.mint(ALICE, alice_pk, 0x20).await;
    f.mint(ALICE, alice_pk, 0x30).await;
    note.index = 1;

    let err = f
        .orchestrator
        .burn(
            &f.ledger,
            ALICE,
            &BurnRequest {
                note,
                secret_key: f.alice.sk,
                payout: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ShieldError::StaleMerkleState(_)));
}

#[tokio::test]
async fn test_tampered_note_refused_before_proving() {
    let mut f = TestFixture::with_batch_size(2).await;
    let alice_pk = f.alice.pk;
    let c = f.mint(ALICE, alice_pk, 0x20).await;
    let d = f.mint(ALICE, alice_pk, 0x30).await;
    let root = f.ledger.root().await;
    let balance = f.ledger.balance_of(&ALICE).await;

    // Claims more than was minted; sums still balance
    let mut inflated = c.clone();
    inflated.value = NoteValue(0x120);

    // A failing prover means only a check ahead of proving can yield NoteMismatch
    let failing = f.orchestrator_with(Arc::new(FailingProver));
    let transfer = TransferRequest {
        inputs: [inflated.clone(), d.clone()],
        outputs: [f.output(0x140), f.output(0x10)],
        receiver: f.bob.pk,
        secret_key: f.alice.sk,
    };
    let err = failing
        .transfer(&f.ledger, ALICE, &transfer)
        .await
        .unwrap_err();
    match &err {
        ShieldError::NoteMismatch {
            index,
            claimed,
            computed,
        } => {
            assert_eq!(*index, 0);
            assert_eq!(*claimed, c.commitment);
            assert_eq!(
                *computed,
                f.ctx.scheme.commit(NoteValue(0x120), &alice_pk, &c.salt)
            );
        }
        other => panic!("expected NoteMismatch, got {other:?}"),
    }
    assert!(err.is_input_error());

    let batch = BatchTransferRequest {
        input: inflated.clone(),
        outputs: vec![f.output(0x100), f.output(0x20)],
        receivers: vec![f.bob.pk, f.eve.pk],
        secret_key: f.alice.sk,
    };
    let err = failing
        .simple_batch_transfer(&f.ledger, ALICE, &batch)
        .await
        .unwrap_err();
    assert!(matches!(err, ShieldError::NoteMismatch { index: 0, .. }));

    let burn = BurnRequest {
        note: inflated,
        secret_key: f.alice.sk,
        payout: None,
    };
    let err = failing.burn(&f.ledger, ALICE, &burn).await.unwrap_err();
    assert!(matches!(err, ShieldError::NoteMismatch { index: 0, .. }));

    // Someone else's key does not open Alice's note either
    let stolen = BurnRequest {
        note: d,
        secret_key: f.bob.sk,
        payout: None,
    };
    let err = failing.burn(&f.ledger, ALICE, &stolen).await.unwrap_err();
    assert!(matches!(err, ShieldError::NoteMismatch { index: 1, .. }));

    assert_eq!(f.ledger.root().await, root);
    assert_eq!(f.ledger.commitment_count().await, 2);
    assert_eq!(f.ledger.balance_of(&ALICE).await, balance);
    let nullifier = f.ctx.scheme.nullifier(&c.salt, &f.alice.sk);
    assert!(!f.ledger.is_spent(&nullifier).await);
}
