pub mod circuit;
pub mod errors;
pub mod mock;
pub mod prover;
pub mod vector;
pub mod zokrates;

// Re-export key types for external usage
pub use circuit::{CircuitKind, CircuitRegistry, RegisteredCircuit, VkId};
pub use errors::{ProverError, VectorError};
pub use mock::MockProver;
pub use prover::{Proof, Prover, ProverMode, ProverSettings, ZokratesSettings, build_prover};
pub use vector::{
    BatchTransferParams, BurnParams, CircuitParams, CommittedNote, MintParams, PackingConfig,
    ProofVector, ProofVectorBuilder, SlotKind, SpentNote, TransferParams, VectorLayout,
};
pub use zokrates::ZokratesProver;
