//! Circuits and Verification Keys
//!
//! Every circuit the shield accepts is registered on the ledger under a verification-key
//! id. The registry file has one entry per circuit:
//!
//! ```text
//! {
//!   "MintCoin":     { "vkId": "0x…", "Address": "0x…" },
//!   "TransferCoin": { "vkId": "0x…", "Address": "0x…" },
//!   ...
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use umbra_privacy::field::decode_hex;

use crate::errors::{ProverError, Result};

/// Circuits known to the shield contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CircuitKind {
    FtMint,
    FtTransfer,
    FtBatchTransfer,
    FtBurn,
    NftMint,
    NftTransfer,
    NftBurn,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 7] = [
        CircuitKind::FtMint,
        CircuitKind::FtTransfer,
        CircuitKind::FtBatchTransfer,
        CircuitKind::FtBurn,
        CircuitKind::NftMint,
        CircuitKind::NftTransfer,
        CircuitKind::NftBurn,
    ];

    /// Registry key, also the artifacts sub-directory name
    pub fn name(&self) -> &'static str {
        match self {
            CircuitKind::FtMint => "MintCoin",
            CircuitKind::FtTransfer => "TransferCoin",
            CircuitKind::FtBatchTransfer => "SimpleBatchTransferCoin",
            CircuitKind::FtBurn => "BurnCoin",
            CircuitKind::NftMint => "MintToken",
            CircuitKind::NftTransfer => "TransferToken",
            CircuitKind::NftBurn => "BurnToken",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Fungible-token circuit
    pub fn is_fungible(&self) -> bool {
        matches!(
            self,
            CircuitKind::FtMint
                | CircuitKind::FtTransfer
                | CircuitKind::FtBatchTransfer
                | CircuitKind::FtBurn
        )
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Verification-key identifier as registered on the ledger
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VkId(pub [u8; 32]);

impl VkId {
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = decode_hex(s)?;
        if bytes.len() > 32 {
            return Err(ProverError::Registry(format!("vk id too long: {s}")));
        }
        let mut id = [0u8; 32];
        id[32 - bytes.len()..].copy_from_slice(&bytes);
        Ok(Self(id))
    }

    /// Deterministic id for local ledgers
    pub fn derive(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for VkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VkId({})", self.to_hex())
    }
}

impl fmt::Display for VkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for VkId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// One entry of the vk-id file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VkEntry {
    #[serde(rename = "vkId")]
    vk_id: String,
    #[serde(rename = "Address", default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

/// A circuit's registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCircuit {
    pub vk_id: VkId,
    /// Verifier contract the key was loaded into
    pub verifier: Option<String>,
}

/// Circuit to vk-id lookup
#[derive(Debug, Clone, Default)]
pub struct CircuitRegistry {
    entries: HashMap<CircuitKind, RegisteredCircuit>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every circuit registered under a derived id
    pub fn local() -> Self {
        let mut registry = Self::new();
        for kind in CircuitKind::ALL {
            registry.register(kind, VkId::derive(kind.name()));
        }
        registry
    }

    pub fn register(&mut self, kind: CircuitKind, vk_id: VkId) {
        self.entries.insert(
            kind,
            RegisteredCircuit {
                vk_id,
                verifier: None,
            },
        );
    }

    pub fn vk_id(&self, kind: CircuitKind) -> Option<VkId> {
        self.entries.get(&kind).map(|entry| entry.vk_id)
    }

    pub fn get(&self, kind: CircuitKind) -> Option<&RegisteredCircuit> {
        self.entries.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the vk-id JSON format
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, VkEntry> =
            serde_json::from_str(json).map_err(|e| ProverError::Registry(e.to_string()))?;

        let mut entries = HashMap::new();
        for (name, entry) in raw {
            let Some(kind) = CircuitKind::from_name(&name) else {
                debug!("Skipping unknown circuit '{}' in vk-id file", name);
                continue;
            };
            entries.insert(
                kind,
                RegisteredCircuit {
                    vk_id: VkId::from_hex(&entry.vk_id)?,
                    verifier: entry.address,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Load the vk-id JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let registry = Self::from_json_str(&json)?;
        info!(
            "Loaded {} verification key ids from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Render in the vk-id JSON format
    pub fn to_json(&self) -> Result<String> {
        let raw: BTreeMap<&str, VkEntry> = self
            .entries
            .iter()
            .map(|(kind, entry)| {
                (
                    kind.name(),
                    VkEntry {
                        vk_id: entry.vk_id.to_hex(),
                        address: entry.verifier.clone(),
                    },
                )
            })
            .collect();
        serde_json::to_string_pretty(&raw).map_err(|e| ProverError::Registry(e.to_string()))
    }
}
