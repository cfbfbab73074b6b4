//! ZoKrates Prover
//!
//! Wraps the `zokrates` CLI to generate proofs from proof vectors.
//!
//! ```text
//! <artifacts_dir>/<Circuit>/
//!   ├── out            compiled circuit
//!   ├── proving.key
//!   └── run-<pid>-<n>/  per-proof scratch (removed afterwards)
//!         ├── witness
//!         └── proof.json
//! ```
//!
//! With a command prefix such as `docker exec zokrates`, the artifacts directory must be
//! mounted at the same path inside the container.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, error, info};
use umbra_privacy::FieldElement;

use crate::circuit::CircuitKind;
use crate::errors::{ProverError, Result};
use crate::prover::{Proof, Prover, ZokratesSettings};
use crate::vector::ProofVector;

const CODE_FILE: &str = "out";
const PROVING_KEY_FILE: &str = "proving.key";
const WITNESS_FILE: &str = "witness";
const PROOF_FILE: &str = "proof.json";

#[derive(Debug)]
pub struct ZokratesProver {
    settings: ZokratesSettings,
    runs: AtomicU64,
}

impl ZokratesProver {
    pub fn new(settings: ZokratesSettings) -> Self {
        Self {
            settings,
            runs: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &ZokratesSettings {
        &self.settings
    }

    /// Artifacts directory of one circuit
    pub fn circuit_dir(&self, circuit: CircuitKind) -> PathBuf {
        self.settings.artifacts_dir.join(circuit.name())
    }

    async fn prove_in(
        &self,
        circuit_dir: &Path,
        run_dir: &Path,
        vector: &ProofVector,
    ) -> Result<Vec<FieldElement>> {
        let code = circuit_dir.join(CODE_FILE);
        let proving_key = circuit_dir.join(PROVING_KEY_FILE);
        let witness = run_dir.join(WITNESS_FILE);
        let proof_path = run_dir.join(PROOF_FILE);

        // Step 1: witness
        let mut args = vec![
            "compute-witness".to_string(),
            "-i".into(),
            path_arg(&code),
            "-o".into(),
            path_arg(&witness),
            "-a".into(),
        ];
        args.extend(vector.to_args());
        self.run("compute-witness", args).await?;

        // Step 2: proof
        let args = vec![
            "generate-proof".to_string(),
            "-i".into(),
            path_arg(&code),
            "-w".into(),
            path_arg(&witness),
            "-p".into(),
            path_arg(&proving_key),
            "-s".into(),
            self.settings.proving_scheme.clone(),
            "-j".into(),
            path_arg(&proof_path),
        ];
        self.run("generate-proof", args).await?;

        // Step 3: read and flatten
        if !proof_path.exists() {
            return Err(ProverError::MalformedProof(format!(
                "proof file not written: {}",
                proof_path.display()
            )));
        }
        let json = tokio::fs::read_to_string(&proof_path).await?;
        parse_proof_json(&json)
    }

    async fn run(&self, step: &'static str, args: Vec<String>) -> Result<()> {
        let settings = &self.settings;
        let (program, mut argv) = match settings.command_prefix.split_first() {
            Some((first, prefix)) => {
                let mut argv = prefix.to_vec();
                argv.push(settings.binary.clone());
                (first, argv)
            }
            None => (&settings.binary, Vec::new()),
        };
        argv.extend(args);

        info!("Executing zokrates {}...", step);
        let output = Command::new(program)
            .args(&argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("zokrates {} failed: {}", step, stderr);
            return Err(ProverError::CommandFailed {
                command: format!("zokrates {step}"),
                stderr: stderr.trim().to_string(),
            });
        }

        debug!(
            "zokrates {} output: {}",
            step,
            String::from_utf8_lossy(&output.stdout)
        );
        Ok(())
    }
}

#[async_trait]
impl Prover for ZokratesProver {
    async fn prove(&self, circuit: CircuitKind, vector: &ProofVector) -> Result<Proof> {
        let circuit_dir = self.circuit_dir(circuit);
        for artifact in [CODE_FILE, PROVING_KEY_FILE] {
            let path = circuit_dir.join(artifact);
            if !path.exists() {
                return Err(ProverError::ArtifactsMissing(path));
            }
        }

        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        let run_dir = circuit_dir.join(format!("run-{}-{}", std::process::id(), run));
        tokio::fs::create_dir_all(&run_dir).await?;

        info!(
            "Generating {} proof ({} elements, scheme {})",
            circuit,
            vector.len(),
            self.settings.proving_scheme
        );

        let outcome = tokio::time::timeout(
            self.settings.timeout,
            self.prove_in(&circuit_dir, &run_dir, vector),
        )
        .await;

        let _ = tokio::fs::remove_dir_all(&run_dir).await;

        let points = match outcome {
            Ok(result) => result?,
            Err(_) => {
                error!("{} proof timed out", circuit);
                return Err(ProverError::Timeout(self.settings.timeout.as_secs()));
            }
        };

        info!("Proof generated: {} points", points.len());
        Ok(Proof {
            points,
            prover: "zokrates",
        })
    }

    fn name(&self) -> &'static str {
        "zokrates"
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Flatten the `proof` object of a ZoKrates `proof.json` into field elements
pub fn parse_proof_json(json: &str) -> Result<Vec<FieldElement>> {
    let doc: Value =
        serde_json::from_str(json).map_err(|e| ProverError::MalformedProof(e.to_string()))?;
    let proof = doc
        .get("proof")
        .ok_or_else(|| ProverError::MalformedProof("missing 'proof' object".into()))?;

    let mut points = Vec::new();
    flatten(proof, &mut points)?;
    if points.is_empty() {
        return Err(ProverError::MalformedProof("proof has no points".into()));
    }
    Ok(points)
}

fn flatten(value: &Value, out: &mut Vec<FieldElement>) -> Result<()> {
    match value {
        Value::String(s) => out.push(
            FieldElement::parse(s).map_err(|e| ProverError::MalformedProof(e.to_string()))?,
        ),
        Value::Number(n) => {
            let n = n
                .as_u64()
                .ok_or_else(|| ProverError::MalformedProof(format!("bad number {n}")))?;
            out.push(FieldElement::from(n));
        }
        Value::Array(items) => {
            for item in items {
                flatten(item, out)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                flatten(item, out)?;
            }
        }
        other => {
            return Err(ProverError::MalformedProof(format!(
                "unexpected value {other}"
            )));
        }
    }
    Ok(())
}
