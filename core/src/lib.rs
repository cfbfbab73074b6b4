//! Umbra Core
//!
//! Client engine for shielded fungible tokens: mint public funds into notes, transfer
//! notes privately, burn notes back to a public account.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     TransferOrchestrator                       │
//! │                                                                │
//! │  ┌─────────────┐   ┌────────────────────┐   ┌───────────────┐  │
//! │  │ Commitment  │   │ MerklePathResolver │   │ ProofVector   │  │
//! │  │ Scheme      │   │  (ledger paths)    │   │ Builder       │  │
//! │  └─────────────┘   └────────────────────┘   └───────────────┘  │
//! │                             │                       │          │
//! └─────────────────────────────┼───────────────────────┼──────────┘
//!                               ▼                       ▼
//!                        ┌─────────────┐         ┌─────────────┐
//!                        │ dyn Ledger  │         │ dyn Prover  │
//!                        └─────────────┘         └─────────────┘
//! ```
//!
//! The ledger and prover are passed in explicitly; nothing here keeps global state.

pub mod context;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod resolver;

pub use context::ShieldContext;
pub use error::{Result, ShieldError};
pub use ledger::{
    BatchTransferSubmission, BurnSubmission, InMemoryLedger, Ledger, LedgerError, LedgerReceipt,
    MintSubmission, ProofEnvelope, TransferSubmission,
};
pub use orchestrator::{
    BatchTransferOutcome, BatchTransferRequest, BurnOutcome, BurnRequest, CorrectnessReport,
    MintOutcome, TransferOrchestrator, TransferOutcome, TransferRequest,
};
pub use resolver::MerklePathResolver;
