//! Protocol context
//!
//! Everything an operation needs that comes from configuration: widths, hashing,
//! the vk-id registry and the prover selection. Built once and handed out explicitly.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use umbra_config::{ProverModeToml, UmbraConfig};
use umbra_privacy::{CommitmentScheme, FieldCodec, MerkleHasher};
use umbra_prover::{
    CircuitRegistry, PackingConfig, ProofVectorBuilder, Prover, ProverMode, ProverSettings,
    ZokratesSettings, build_prover,
};

use crate::ledger::InMemoryLedger;
use crate::resolver::MerklePathResolver;

#[derive(Debug, Clone)]
pub struct ShieldContext {
    pub packing: PackingConfig,
    pub scheme: CommitmentScheme,
    pub hasher: MerkleHasher,
    pub registry: CircuitRegistry,
    pub prover: ProverSettings,
    /// Largest sum a transfer circuit can add
    pub adder_limit: u128,
    /// Recent roots a ledger built from this context accepts
    pub root_history: usize,
}

impl ShieldContext {
    pub fn from_config(config: &UmbraConfig) -> Result<Self> {
        config.validate()?;
        let protocol = &config.protocol;

        let packing = PackingConfig {
            packing_size: protocol.packing_size,
            narrow_bits: protocol.usable_bits,
            node_bits: protocol.merkle_node_bits,
            mint_input_hash_bits: protocol.mint_input_hash_bits,
            input_hash_bits: protocol.input_hash_bits,
            depth: protocol.merkle_depth,
            batch_size: protocol.batch_size,
            ..PackingConfig::default()
        };

        let registry = match &config.registry.vk_ids_path {
            Some(path) => CircuitRegistry::load(Path::new(path))
                .with_context(|| format!("Failed to load vk ids from {path}"))?,
            None => CircuitRegistry::local(),
        };

        let prover = ProverSettings {
            mode: match config.prover.mode {
                ProverModeToml::Mock => ProverMode::Mock,
                ProverModeToml::Zokrates => ProverMode::Zokrates,
            },
            zokrates: ZokratesSettings {
                binary: config.prover.zokrates_binary.clone(),
                command_prefix: config.prover.command_prefix.clone(),
                proving_scheme: config.prover.proving_scheme.clone(),
                artifacts_dir: config.prover.artifacts_dir.clone().into(),
                timeout: Duration::from_secs(config.prover.proof_timeout_secs),
            },
            mock_delay: Duration::from_millis(config.prover.mock_delay_ms),
        };

        info!(
            batch_size = packing.batch_size,
            depth = packing.depth,
            circuits = registry.len(),
            "shield context ready"
        );

        Ok(Self {
            packing,
            scheme: CommitmentScheme::new(FieldCodec::new(
                protocol.packing_size,
                protocol.usable_bits,
            )),
            hasher: MerkleHasher::new(protocol.merkle_node_bits, protocol.merkle_depth),
            registry,
            prover,
            adder_limit: protocol.adder_limit(),
            root_history: protocol.root_history,
        })
    }

    /// Defaults throughout, mock prover, derived vk ids
    pub fn local() -> Self {
        Self {
            packing: PackingConfig::default(),
            scheme: CommitmentScheme::default(),
            hasher: MerkleHasher::default(),
            registry: CircuitRegistry::local(),
            prover: ProverSettings::default(),
            adder_limit: 0xFFFF_FFFF,
            root_history: 100,
        }
    }

    pub fn codec(&self) -> &FieldCodec {
        self.scheme.codec()
    }

    pub fn vector_builder(&self) -> ProofVectorBuilder {
        ProofVectorBuilder::new(self.packing, self.scheme)
    }

    pub fn resolver(&self) -> MerklePathResolver {
        MerklePathResolver::new(self.hasher.clone())
    }

    pub fn build_prover(&self) -> Arc<dyn Prover> {
        build_prover(&self.prover)
    }

    /// Fresh in-memory ledger with this context's tree shape and registry
    pub fn ledger(&self) -> InMemoryLedger {
        InMemoryLedger::new(
            self.hasher.clone(),
            self.root_history,
            self.registry.clone(),
            self.scheme,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_prover::CircuitKind;

    #[test]
    fn test_from_default_config_matches_local() {
        let ctx = ShieldContext::from_config(&UmbraConfig::default()).unwrap();
        let local = ShieldContext::local();

        assert_eq!(ctx.packing, local.packing);
        assert_eq!(ctx.adder_limit, local.adder_limit);
        assert_eq!(ctx.prover, local.prover);
        assert_eq!(
            ctx.registry.vk_id(CircuitKind::FtTransfer),
            local.registry.vk_id(CircuitKind::FtTransfer)
        );
    }

    #[test]
    fn test_from_config_loads_vk_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vkIds.json");
        std::fs::write(
            &path,
            r#"{"MintCoin": {"vkId": "0x01"}, "TransferCoin": {"vkId": "0x02"}}"#,
        )
        .unwrap();

        let mut config = UmbraConfig::default();
        config.registry.vk_ids_path = Some(path.display().to_string());
        config.prover.mode = ProverModeToml::Zokrates;
        config.protocol.batch_size = 4;

        let ctx = ShieldContext::from_config(&config).unwrap();
        assert_eq!(ctx.registry.len(), 2);
        assert!(ctx.registry.vk_id(CircuitKind::FtBurn).is_none());
        assert_eq!(ctx.prover.mode, ProverMode::Zokrates);
        assert_eq!(ctx.packing.batch_size, 4);
        assert_eq!(ctx.build_prover().name(), "zokrates");
    }

    #[test]
    fn test_from_config_missing_vk_file() {
        let mut config = UmbraConfig::default();
        config.registry.vk_ids_path = Some("/nonexistent/vkIds.json".into());
        assert!(ShieldContext::from_config(&config).is_err());
    }
}
