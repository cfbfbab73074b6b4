//! Umbra Configuration
//!
//! Shared configuration crate for all Umbra components.
//!
//! Handles loading configuration from:
//! 1. UMBRA_CONFIG env var (explicit path)
//! 2. ./umbra.toml (current directory)
//! 3. ~/.umbra/umbra.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "umbra.toml";
const CONFIG_DIR_NAME: &str = ".umbra";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_PACKING_SIZE: u32 = 128;
const DEFAULT_USABLE_BITS: u32 = 216;
const DEFAULT_MERKLE_NODE_BITS: u32 = 216;
const DEFAULT_MERKLE_DEPTH: usize = 32;
const DEFAULT_MINT_INPUT_HASH_BITS: u32 = 248;
const DEFAULT_INPUT_HASH_BITS: u32 = 216;
const DEFAULT_BATCH_SIZE: usize = 20;
const DEFAULT_ADDER_LIMIT_BITS: u32 = 32;
const DEFAULT_ROOT_HISTORY: usize = 100;

const DEFAULT_ZOKRATES_BINARY: &str = "zokrates";
const DEFAULT_PROVING_SCHEME: &str = "gm17";
const DEFAULT_ARTIFACTS_DIR: &str = "./zkp/code/gm17";
const DEFAULT_PROOF_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmbraConfig {
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Widths and sizes fixed by the circuits
///
/// Changing any of these without recompiling the circuits produces proofs the
/// ledger will reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_packing_size")]
    pub packing_size: u32,
    #[serde(default = "default_usable_bits")]
    pub usable_bits: u32,
    #[serde(default = "default_merkle_node_bits")]
    pub merkle_node_bits: u32,
    #[serde(default = "default_merkle_depth")]
    pub merkle_depth: usize,
    #[serde(default = "default_mint_input_hash_bits")]
    pub mint_input_hash_bits: u32,
    #[serde(default = "default_input_hash_bits")]
    pub input_hash_bits: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_adder_limit_bits")]
    pub adder_limit_bits: u32,
    #[serde(default = "default_root_history")]
    pub root_history: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            packing_size: DEFAULT_PACKING_SIZE,
            usable_bits: DEFAULT_USABLE_BITS,
            merkle_node_bits: DEFAULT_MERKLE_NODE_BITS,
            merkle_depth: DEFAULT_MERKLE_DEPTH,
            mint_input_hash_bits: DEFAULT_MINT_INPUT_HASH_BITS,
            input_hash_bits: DEFAULT_INPUT_HASH_BITS,
            batch_size: DEFAULT_BATCH_SIZE,
            adder_limit_bits: DEFAULT_ADDER_LIMIT_BITS,
            root_history: DEFAULT_ROOT_HISTORY,
        }
    }
}

impl ProtocolConfig {
    /// Largest sum a transfer circuit can add without wrapping
    pub fn adder_limit(&self) -> u128 {
        if self.adder_limit_bits >= 128 {
            u128::MAX
        } else {
            (1u128 << self.adder_limit_bits) - 1
        }
    }
}

fn default_packing_size() -> u32 {
    DEFAULT_PACKING_SIZE
}
fn default_usable_bits() -> u32 {
    DEFAULT_USABLE_BITS
}
fn default_merkle_node_bits() -> u32 {
    DEFAULT_MERKLE_NODE_BITS
}
fn default_merkle_depth() -> usize {
    DEFAULT_MERKLE_DEPTH
}
fn default_mint_input_hash_bits() -> u32 {
    DEFAULT_MINT_INPUT_HASH_BITS
}
fn default_input_hash_bits() -> u32 {
    DEFAULT_INPUT_HASH_BITS
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_adder_limit_bits() -> u32 {
    DEFAULT_ADDER_LIMIT_BITS
}
fn default_root_history() -> usize {
    DEFAULT_ROOT_HISTORY
}

/// Prover mode for TOML config
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProverModeToml {
    #[default]
    Mock,
    Zokrates,
}

/// Proving back-end configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default)]
    pub mode: ProverModeToml,
    #[serde(default = "default_zokrates_binary")]
    pub zokrates_binary: String,
    /// Prepended to every prover command, e.g. `["docker", "exec", "zokrates"]`
    #[serde(default)]
    pub command_prefix: Vec<String>,
    #[serde(default = "default_proving_scheme")]
    pub proving_scheme: String,
    /// Holds one `<CircuitName>/` directory of compiled artifacts per circuit
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
    #[serde(default = "default_proof_timeout")]
    pub proof_timeout_secs: u64,
    #[serde(default)]
    pub mock_delay_ms: u64,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            mode: ProverModeToml::Mock,
            zokrates_binary: DEFAULT_ZOKRATES_BINARY.into(),
            command_prefix: Vec::new(),
            proving_scheme: DEFAULT_PROVING_SCHEME.into(),
            artifacts_dir: DEFAULT_ARTIFACTS_DIR.into(),
            proof_timeout_secs: DEFAULT_PROOF_TIMEOUT_SECS,
            mock_delay_ms: 0,
        }
    }
}

fn default_zokrates_binary() -> String {
    DEFAULT_ZOKRATES_BINARY.into()
}
fn default_proving_scheme() -> String {
    DEFAULT_PROVING_SCHEME.into()
}
fn default_artifacts_dir() -> String {
    DEFAULT_ARTIFACTS_DIR.into()
}
fn default_proof_timeout() -> u64 {
    DEFAULT_PROOF_TIMEOUT_SECS
}

/// Verification-key registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// JSON file mapping circuit names to registered vk ids
    #[serde(default)]
    pub vk_ids_path: Option<String>,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Set field from env var if present
fn env_string(lookup: Lookup<'_>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(lookup: Lookup<'_>, key: &str, field: &mut Option<String>) {
    if let Some(v) = lookup(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str, field: &mut T) {
    match lookup(key).map(|v| v.parse()) {
        Some(Ok(parsed)) => *field = parsed,
        Some(Err(_)) => log::warn!("Ignoring unparseable value for {}", key),
        None => {}
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl UmbraConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check UMBRA_CONFIG env var
        if let Ok(path) = env::var("UMBRA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("UMBRA_CONFIG points to missing file: {}", path.display());
        }

        // 2. Check ./umbra.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.umbra/umbra.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(&|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: Lookup<'_>) {
        // Prover
        if let Some(v) = lookup("UMBRA_PROVER_MODE") {
            self.prover.mode = match v.to_ascii_lowercase().as_str() {
                "zokrates" => ProverModeToml::Zokrates,
                "mock" => ProverModeToml::Mock,
                other => {
                    log::warn!("Unknown prover mode '{}', keeping {:?}", other, self.prover.mode);
                    self.prover.mode
                }
            };
        }
        env_string(lookup, "UMBRA_ZOKRATES_BIN", &mut self.prover.zokrates_binary);
        env_string(lookup, "UMBRA_ARTIFACTS_DIR", &mut self.prover.artifacts_dir);
        env_parse(
            lookup,
            "UMBRA_PROOF_TIMEOUT_SECS",
            &mut self.prover.proof_timeout_secs,
        );
        if let Some(v) = lookup("UMBRA_COMMAND_PREFIX") {
            self.prover.command_prefix = v.split_whitespace().map(String::from).collect();
        }

        // Protocol
        env_parse(lookup, "UMBRA_BATCH_SIZE", &mut self.protocol.batch_size);

        // Registry
        env_option_string(lookup, "UMBRA_VK_IDS", &mut self.registry.vk_ids_path);
    }

    /// Reject settings no circuit could have been compiled with
    pub fn validate(&self) -> Result<()> {
        let p = &self.protocol;
        ensure!(p.packing_size > 0, "protocol.packing_size must be non-zero");
        ensure!(
            p.usable_bits > 0 && p.usable_bits <= 256,
            "protocol.usable_bits must be in 1..=256, got {}",
            p.usable_bits
        );
        ensure!(
            p.merkle_node_bits % 8 == 0 && p.merkle_node_bits <= 256,
            "protocol.merkle_node_bits must be a whole number of bytes up to 256, got {}",
            p.merkle_node_bits
        );
        ensure!(
            p.merkle_depth > 0 && p.merkle_depth <= 63,
            "protocol.merkle_depth must be in 1..=63, got {}",
            p.merkle_depth
        );
        ensure!(p.batch_size > 0, "protocol.batch_size must be non-zero");
        ensure!(
            p.adder_limit_bits > 0 && p.adder_limit_bits <= 128,
            "protocol.adder_limit_bits must be in 1..=128, got {}",
            p.adder_limit_bits
        );
        ensure!(
            self.prover.proof_timeout_secs > 0,
            "prover.proof_timeout_secs must be non-zero"
        );
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.registry.vk_ids_path = Some("./vkIds.json".into());
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
