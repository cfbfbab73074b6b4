//! Prover Interface
//!
//! ```text
//! ┌──────────────┐   ProofVector   ┌──────────────────────┐
//! │ Orchestrator │ ──────────────► │  dyn Prover          │
//! │              │ ◄────────────── │  ├─ MockProver       │
//! └──────────────┘      Proof      │  └─ ZokratesProver   │
//!                                  └──────────────────────┘
//! ```
//!
//! The back-end is picked once from configuration by [`build_prover`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use umbra_privacy::FieldElement;

use crate::circuit::CircuitKind;
use crate::errors::Result;
use crate::mock::MockProver;
use crate::vector::ProofVector;
use crate::zokrates::ZokratesProver;

/// A generated proof, flattened to field elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proof {
    pub points: Vec<FieldElement>,
    /// Back-end that produced it
    pub prover: &'static str,
}

impl Proof {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Proof generation back-end
#[async_trait]
pub trait Prover: Send + Sync {
    /// Prove `vector` against `circuit`
    async fn prove(&self, circuit: CircuitKind, vector: &ProofVector) -> Result<Proof>;

    /// Short back-end name for logs
    fn name(&self) -> &'static str;
}

/// Which back-end to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProverMode {
    /// In-process deterministic proofs
    #[default]
    Mock,
    /// ZoKrates toolchain in a subprocess
    Zokrates,
}

/// ZoKrates invocation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZokratesSettings {
    pub binary: String,
    /// Prepended to every command, e.g. `docker exec <container>`
    pub command_prefix: Vec<String>,
    pub proving_scheme: String,
    /// One sub-directory per circuit, holding `out` and `proving.key`
    pub artifacts_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for ZokratesSettings {
    fn default() -> Self {
        Self {
            binary: "zokrates".into(),
            command_prefix: Vec::new(),
            proving_scheme: "gm17".into(),
            artifacts_dir: PathBuf::from("./zkp/code/gm17"),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Back-end selection plus per-back-end settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProverSettings {
    pub mode: ProverMode,
    pub zokrates: ZokratesSettings,
    pub mock_delay: Duration,
}

/// Build the configured back-end
pub fn build_prover(settings: &ProverSettings) -> Arc<dyn Prover> {
    let prover: Arc<dyn Prover> = match settings.mode {
        ProverMode::Mock => Arc::new(MockProver::with_delay(settings.mock_delay)),
        ProverMode::Zokrates => Arc::new(ZokratesProver::new(settings.zokrates.clone())),
    };
    info!("Using {} prover", prover.name());
    prover
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prover_by_mode() {
        let mock = build_prover(&ProverSettings::default());
        assert_eq!(mock.name(), "mock");

        let zokrates = build_prover(&ProverSettings {
            mode: ProverMode::Zokrates,
            ..ProverSettings::default()
        });
        assert_eq!(zokrates.name(), "zokrates");
    }
}
