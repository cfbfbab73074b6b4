#![allow(dead_code)]

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use umbra_core::{InMemoryLedger, ShieldContext, TransferOrchestrator};
use umbra_privacy::{Address, InputNote, NoteValue, OutputNote, PublicKey, Salt, SecretKey};
use umbra_prover::{MockProver, Prover};

pub const SK_ALICE: &str = "0x0000000000111111111111111111111111111111111111111111111111111111";
pub const SK_BOB: &str = "0x0000000000222222222222222222222222222222222222222222222222222222";
pub const SK_EVE: &str = "0x0000000000333333333333333333333333333333333333333333333333333333";

pub const ALICE: Address = Address::new([0xa1; 20]);
pub const BOB: Address = Address::new([0xb0; 20]);
pub const EVE: Address = Address::new([0xe5; 20]);

pub const STARTING_BALANCE: u128 = 0x1_0000_0000_0000;

pub struct Party {
    pub account: Address,
    pub sk: SecretKey,
    pub pk: PublicKey,
}

pub struct TestFixture {
    pub ctx: ShieldContext,
    pub ledger: InMemoryLedger,
    pub orchestrator: TransferOrchestrator,
    pub alice: Party,
    pub bob: Party,
    pub eve: Party,
    rng: StdRng,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_context(ShieldContext::local()).await
    }

    pub async fn with_batch_size(batch_size: usize) -> Self {
        let mut ctx = ShieldContext::local();
        ctx.packing.batch_size = batch_size;
        Self::with_context(ctx).await
    }

    pub async fn with_context(ctx: ShieldContext) -> Self {
        let orchestrator = TransferOrchestrator::new(&ctx, Arc::new(MockProver::new()));
        let ledger = ctx.ledger();
        for account in [ALICE, BOB, EVE] {
            ledger.credit(account, STARTING_BALANCE).await;
        }

        let party = |account, sk: &str| {
            let sk = SecretKey::parse(ctx.codec(), sk).unwrap();
            Party {
                account,
                sk,
                pk: ctx.scheme.public_key(&sk),
            }
        };
        let alice = party(ALICE, SK_ALICE);
        let bob = party(BOB, SK_BOB);
        let eve = party(EVE, SK_EVE);

        Self {
            orchestrator,
            ledger,
            alice,
            bob,
            eve,
            rng: StdRng::seed_from_u64(7),
            ctx,
        }
    }

    /// Orchestrator over the same context with a different prover
    pub fn orchestrator_with(&self, prover: Arc<dyn Prover>) -> TransferOrchestrator {
        TransferOrchestrator::new(&self.ctx, prover)
    }

    pub fn salt(&mut self) -> Salt {
        Salt::random(self.ctx.codec(), &mut self.rng)
    }

    pub fn output(&mut self, value: u128) -> OutputNote {
        OutputNote::random(NoteValue(value), self.ctx.codec(), &mut self.rng)
    }

    /// Mint a note for `owner` out of `account`'s public balance
    pub async fn mint(&mut self, account: Address, owner: PublicKey, value: u128) -> InputNote {
        let salt = self.salt();
        self.orchestrator
            .mint(&self.ledger, account, NoteValue(value), &owner, salt)
            .await
            .unwrap()
            .into_input(NoteValue(value), salt)
    }

    /// A note that was never minted, for checks that fail before any ledger access
    pub fn phantom_note(&mut self, value: u128, index: u64) -> InputNote {
        let salt = self.salt();
        InputNote {
            value: NoteValue(value),
            salt,
            commitment: self.ctx.scheme.commit(NoteValue(value), &self.alice.pk, &salt),
            index,
        }
    }
}
