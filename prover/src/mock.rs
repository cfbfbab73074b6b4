//! Mock Prover
//!
//! Derives a proof-shaped output from a BLAKE3 hash of the vector. Same vector in,
//! same proof out, no toolchain needed. Nothing about it is zero-knowledge.

use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use tracing::debug;
use umbra_privacy::FieldElement;

use crate::circuit::CircuitKind;
use crate::errors::Result;
use crate::prover::{Proof, Prover};
use crate::vector::ProofVector;

/// Points in a GM17 proof: a (2), b (2x2), c (2)
pub const MOCK_PROOF_POINTS: usize = 8;

/// Bytes per mock point, small enough to sit in any prime field in use
const POINT_BYTES: usize = 31;

#[derive(Debug, Clone, Default)]
pub struct MockProver {
    /// Simulated proving time
    delay: Duration,
}

impl MockProver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with simulated proving time (for testing)
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    /// The proof this prover returns for a vector
    pub fn expected_proof(circuit: CircuitKind, vector: &ProofVector) -> Proof {
        let mut hasher = blake3::Hasher::new();
        hasher.update(circuit.name().as_bytes());
        for element in vector.elements() {
            let bytes = element.to_bytes_be();
            hasher.update(&(bytes.len() as u32).to_be_bytes());
            hasher.update(&bytes);
        }

        let mut stream = hasher.finalize_xof();
        let points = (0..MOCK_PROOF_POINTS)
            .map(|_| {
                let mut buf = [0u8; POINT_BYTES];
                stream.fill(&mut buf);
                FieldElement::from_biguint(BigUint::from_bytes_be(&buf))
            })
            .collect();

        Proof {
            points,
            prover: "mock",
        }
    }
}

#[async_trait]
impl Prover for MockProver {
    async fn prove(&self, circuit: CircuitKind, vector: &ProofVector) -> Result<Proof> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let proof = Self::expected_proof(circuit, vector);
        debug!(circuit = %circuit, elements = vector.len(), "mock proof generated");
        Ok(proof)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
