//! Proof Vectors
//!
//! Lays out the private and public arguments of a circuit as the ordered list of field
//! elements the proving toolchain reads.
//!
//! ```text
//!   CircuitParams ──► named slot values ──► VectorLayout (order + widths) ──► ProofVector
//!                                                │
//!                                                └─► public inputs (the input-hash slot)
//! ```
//!
//! [`VectorLayout::for_circuit`] is the only place the order of a circuit's arguments is
//! written down. Parameters are matched to slots by label, so a missing or miscounted
//! argument is an error rather than a silently shifted vector.

use std::collections::HashMap;

use tracing::debug;
use umbra_privacy::{
    Address, Commitment, CommitmentScheme, FieldElement, FieldWord, MerklePath, NoteValue,
    Nullifier, PublicKey, Salt, SecretKey,
};

use crate::circuit::CircuitKind;
use crate::errors::VectorError;

// ============================================================================
// Packing
// ============================================================================

/// Bit widths the circuits were compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingConfig {
    pub packing_size: u32,
    pub word_bits: u32,
    pub value_bits: u32,
    /// Width of a word passed as a single element
    pub narrow_bits: u32,
    pub node_bits: u32,
    pub positions_bits: u32,
    pub mint_input_hash_bits: u32,
    pub input_hash_bits: u32,
    /// Sibling levels in a Merkle path
    pub depth: usize,
    /// Outputs of a simple batch transfer
    pub batch_size: usize,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            packing_size: 128,
            word_bits: 256,
            value_bits: 128,
            narrow_bits: 216,
            node_bits: 216,
            positions_bits: 128,
            mint_input_hash_bits: 248,
            input_hash_bits: 216,
            depth: 32,
            batch_size: 20,
        }
    }
}

// ============================================================================
// Layout
// ============================================================================

/// How one argument is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Public input hash, one element of the given width
    InputHash { bits: u32 },
    /// 128-bit value, one element
    Value,
    /// Full word split at the packing size
    Word,
    /// Word as a single element at the narrow width
    NarrowWord,
    PathNode,
    Positions,
}

impl SlotKind {
    /// `(bit_width, packing)` for this kind
    pub fn encoding(&self, cfg: &PackingConfig) -> (u32, u32) {
        match *self {
            SlotKind::InputHash { bits } => (bits, bits),
            SlotKind::Value => (cfg.value_bits, cfg.value_bits),
            SlotKind::Word => (cfg.word_bits, cfg.packing_size),
            SlotKind::NarrowWord => (cfg.narrow_bits, cfg.narrow_bits),
            SlotKind::PathNode => (cfg.node_bits, cfg.node_bits),
            SlotKind::Positions => (cfg.positions_bits, cfg.positions_bits),
        }
    }

    /// Field elements per item
    pub fn width(&self, cfg: &PackingConfig) -> usize {
        let (bits, packing) = self.encoding(cfg);
        bits.div_ceil(packing.max(1)) as usize
    }
}

/// A labelled argument position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub label: &'static str,
    pub kind: SlotKind,
    /// Items in this slot (path length, batch size, or 1)
    pub count: usize,
}

impl Slot {
    const fn one(label: &'static str, kind: SlotKind) -> Self {
        Self {
            label,
            kind,
            count: 1,
        }
    }

    const fn many(label: &'static str, kind: SlotKind, count: usize) -> Self {
        Self { label, kind, count }
    }
}

/// Argument order of one circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorLayout {
    circuit: CircuitKind,
    slots: Vec<Slot>,
}

impl VectorLayout {
    pub fn for_circuit(circuit: CircuitKind, cfg: &PackingConfig) -> Result<Self, VectorError> {
        use SlotKind::*;

        let depth = cfg.depth;
        let n = cfg.batch_size;
        let pih = InputHash {
            bits: cfg.input_hash_bits,
        };

        let slots = match circuit {
            CircuitKind::FtMint => vec![
                Slot::one(
                    "publicInputHash",
                    InputHash {
                        bits: cfg.mint_input_hash_bits,
                    },
                ),
                Slot::one("value", Value),
                Slot::one("publicKey", Word),
                Slot::one("salt", Word),
                Slot::one("commitment", Word),
            ],
            CircuitKind::FtTransfer => vec![
                Slot::one("publicInputHash", pih),
                Slot::one("inputValue0", Value),
                Slot::one("secretKey", Word),
                Slot::one("inputSalt0", Word),
                Slot::many("path0", PathNode, depth),
                Slot::one("positions0", Positions),
                Slot::one("inputValue1", Value),
                Slot::one("inputSalt1", Word),
                Slot::many("path1", PathNode, depth),
                Slot::one("positions1", Positions),
                Slot::one("nullifier0", Word),
                Slot::one("nullifier1", Word),
                Slot::one("outputValue0", Value),
                Slot::one("receiverPublicKey", Word),
                Slot::one("outputSalt0", Word),
                Slot::one("outputCommitment0", Word),
                Slot::one("outputValue1", Value),
                Slot::one("senderPublicKey", Word),
                Slot::one("outputSalt1", Word),
                Slot::one("outputCommitment1", Word),
                Slot::one("root", Word),
            ],
            CircuitKind::FtBurn => vec![
                Slot::one("publicInputHash", pih),
                Slot::one("payTo", Word),
                Slot::one("value", Value),
                Slot::one("secretKey", Word),
                Slot::one("salt", Word),
                Slot::many("path", PathNode, depth),
                Slot::one("positions", Positions),
                Slot::one("nullifier", Word),
                Slot::one("root", Word),
            ],
            CircuitKind::FtBatchTransfer => vec![
                Slot::one("publicInputHash", pih),
                Slot::one("value", Value),
                Slot::one("secretKey", NarrowWord),
                Slot::one("salt", NarrowWord),
                Slot::many("path", PathNode, depth),
                Slot::one("positions", Positions),
                Slot::one("nullifier", NarrowWord),
                Slot::many("outputValues", Value, n),
                Slot::many("receiverPublicKeys", NarrowWord, n),
                Slot::many("outputSalts", NarrowWord, n),
                Slot::many("outputCommitments", NarrowWord, n),
                Slot::one("root", NarrowWord),
            ],
            other => return Err(VectorError::NoLayout(other.name())),
        };

        Ok(Self { circuit, slots })
    }

    pub fn circuit(&self) -> CircuitKind {
        self.circuit
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Total field elements in a vector with this layout
    pub fn element_count(&self, cfg: &PackingConfig) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.count * slot.kind.width(cfg))
            .sum()
    }

    /// Element offset of a slot's first item
    pub fn offset_of(&self, label: &str, cfg: &PackingConfig) -> Option<usize> {
        let mut offset = 0;
        for slot in &self.slots {
            if slot.label == label {
                return Some(offset);
            }
            offset += slot.count * slot.kind.width(cfg);
        }
        None
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// A note being spent, with its membership path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentNote {
    pub value: NoteValue,
    pub salt: Salt,
    pub path: MerklePath,
}

/// A note being created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedNote {
    pub value: NoteValue,
    pub salt: Salt,
    pub commitment: Commitment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintParams {
    pub value: NoteValue,
    pub public_key: PublicKey,
    pub salt: Salt,
    pub commitment: Commitment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub secret_key: SecretKey,
    pub inputs: [SpentNote; 2],
    pub nullifiers: [Nullifier; 2],
    /// Output 0 to the receiver, output 1 back to the sender
    pub outputs: [CommittedNote; 2],
    pub receiver: PublicKey,
    pub sender: PublicKey,
    pub root: FieldWord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnParams {
    pub secret_key: SecretKey,
    pub note: SpentNote,
    pub nullifier: Nullifier,
    pub root: FieldWord,
    pub payout: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTransferParams {
    pub secret_key: SecretKey,
    pub input: SpentNote,
    pub nullifier: Nullifier,
    pub outputs: Vec<CommittedNote>,
    pub receivers: Vec<PublicKey>,
    pub root: FieldWord,
}

/// Arguments of one circuit invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitParams {
    Mint(MintParams),
    Transfer(TransferParams),
    Burn(BurnParams),
    BatchTransfer(BatchTransferParams),
}

impl CircuitParams {
    pub fn circuit(&self) -> CircuitKind {
        match self {
            CircuitParams::Mint(_) => CircuitKind::FtMint,
            CircuitParams::Transfer(_) => CircuitKind::FtTransfer,
            CircuitParams::Burn(_) => CircuitKind::FtBurn,
            CircuitParams::BatchTransfer(_) => CircuitKind::FtBatchTransfer,
        }
    }
}

// ============================================================================
// Public Input Hashes
// ============================================================================

/// `H(value || commitment)`
pub fn mint_input_hash(
    scheme: &CommitmentScheme,
    value: NoteValue,
    commitment: &Commitment,
) -> FieldWord {
    scheme.public_input_hash(&[&value.to_be_bytes(), commitment.as_bytes()])
}

/// `H(root || n0 || n1 || z0 || z1)`
pub fn transfer_input_hash(
    scheme: &CommitmentScheme,
    root: &FieldWord,
    nullifiers: &[Nullifier; 2],
    commitments: &[Commitment; 2],
) -> FieldWord {
    scheme.public_input_hash(&[
        root.as_bytes(),
        nullifiers[0].as_bytes(),
        nullifiers[1].as_bytes(),
        commitments[0].as_bytes(),
        commitments[1].as_bytes(),
    ])
}

/// `H(root || n || value || payout)`, payout left-padded to a full word
pub fn burn_input_hash(
    scheme: &CommitmentScheme,
    root: &FieldWord,
    nullifier: &Nullifier,
    value: NoteValue,
    payout: &Address,
) -> FieldWord {
    scheme.public_input_hash(&[
        root.as_bytes(),
        nullifier.as_bytes(),
        &value.to_be_bytes(),
        &payout.to_word_bytes(),
    ])
}

/// `H(root || n || z_0 || ... || z_{N-1})`
pub fn batch_input_hash(
    scheme: &CommitmentScheme,
    root: &FieldWord,
    nullifier: &Nullifier,
    commitments: &[Commitment],
) -> FieldWord {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(commitments.len() + 2);
    parts.push(root.as_bytes());
    parts.push(nullifier.as_bytes());
    parts.extend(commitments.iter().map(|c| c.as_bytes().as_slice()));
    scheme.public_input_hash(&parts)
}

// ============================================================================
// Builder
// ============================================================================

/// Ordered field elements for one proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofVector {
    circuit: CircuitKind,
    public_input_hash: FieldWord,
    elements: Vec<FieldElement>,
    public_inputs: Vec<FieldElement>,
}

impl ProofVector {
    pub fn circuit(&self) -> CircuitKind {
        self.circuit
    }

    pub fn public_input_hash(&self) -> &FieldWord {
        &self.public_input_hash
    }

    pub fn elements(&self) -> &[FieldElement] {
        &self.elements
    }

    /// The elements the ledger sees alongside the proof
    pub fn public_inputs(&self) -> &[FieldElement] {
        &self.public_inputs
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Decimal strings, as passed on a prover command line
    pub fn to_args(&self) -> Vec<String> {
        self.elements.iter().map(ToString::to_string).collect()
    }
}

/// Named slot values waiting to be laid out
#[derive(Debug, Default)]
struct SlotValues {
    items: HashMap<&'static str, Vec<Vec<u8>>>,
}

impl SlotValues {
    fn put(&mut self, label: &'static str, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.items
            .entry(label)
            .or_default()
            .push(bytes.as_ref().to_vec());
        self
    }

    fn put_all<I, B>(&mut self, label: &'static str, items: I) -> &mut Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let entry = self.items.entry(label).or_default();
        entry.extend(items.into_iter().map(|b| b.as_ref().to_vec()));
        self
    }

    fn put_path(
        &mut self,
        path_label: &'static str,
        positions_label: &'static str,
        path: &MerklePath,
    ) -> &mut Self {
        self.put_all(path_label, path.elements.iter())
            .put(positions_label, path.positions_word().to_be_bytes())
    }
}

/// Turns circuit parameters into proof vectors
#[derive(Debug, Clone, Default)]
pub struct ProofVectorBuilder {
    packing: PackingConfig,
    scheme: CommitmentScheme,
}

impl ProofVectorBuilder {
    pub fn new(packing: PackingConfig, scheme: CommitmentScheme) -> Self {
        Self { packing, scheme }
    }

    pub fn packing(&self) -> &PackingConfig {
        &self.packing
    }

    pub fn scheme(&self) -> &CommitmentScheme {
        &self.scheme
    }

    pub fn layout(&self, circuit: CircuitKind) -> Result<VectorLayout, VectorError> {
        VectorLayout::for_circuit(circuit, &self.packing)
    }

    /// Build the vector for one invocation
    pub fn build(&self, params: &CircuitParams) -> Result<ProofVector, VectorError> {
        let circuit = params.circuit();
        let layout = self.layout(circuit)?;
        let (public_input_hash, values) = self.collect(params);
        let codec = self.scheme.codec();

        let mut elements = Vec::with_capacity(layout.element_count(&self.packing));
        let mut public_inputs = Vec::new();

        for slot in layout.slots() {
            let items = values
                .items
                .get(slot.label)
                .ok_or(VectorError::MissingSlot(slot.label))?;
            if items.len() != slot.count {
                return Err(VectorError::SlotCount {
                    label: slot.label,
                    expected: slot.count,
                    actual: items.len(),
                });
            }

            let (bits, packing) = slot.kind.encoding(&self.packing);
            for item in items {
                let packed = codec.pack(item, bits, packing)?;
                if matches!(slot.kind, SlotKind::InputHash { .. }) {
                    public_inputs.extend(packed.iter().cloned());
                }
                elements.extend(packed);
            }
        }

        debug!(
            circuit = %circuit,
            elements = elements.len(),
            public_input_hash = %public_input_hash,
            "built proof vector"
        );

        Ok(ProofVector {
            circuit,
            public_input_hash,
            elements,
            public_inputs,
        })
    }

    fn collect(&self, params: &CircuitParams) -> (FieldWord, SlotValues) {
        let scheme = &self.scheme;
        let mut v = SlotValues::default();

        let pih = match params {
            CircuitParams::Mint(p) => {
                let pih = mint_input_hash(scheme, p.value, &p.commitment);
                v.put("value", p.value.to_be_bytes())
                    .put("publicKey", p.public_key)
                    .put("salt", p.salt)
                    .put("commitment", p.commitment);
                pih
            }
            CircuitParams::Transfer(p) => {
                let commitments = [p.outputs[0].commitment, p.outputs[1].commitment];
                let pih = transfer_input_hash(scheme, &p.root, &p.nullifiers, &commitments);
                let [in0, in1] = &p.inputs;
                let [out0, out1] = &p.outputs;

                v.put("inputValue0", in0.value.to_be_bytes())
                    .put("secretKey", p.secret_key)
                    .put("inputSalt0", in0.salt)
                    .put_path("path0", "positions0", &in0.path)
                    .put("inputValue1", in1.value.to_be_bytes())
                    .put("inputSalt1", in1.salt)
                    .put_path("path1", "positions1", &in1.path)
                    .put("nullifier0", p.nullifiers[0])
                    .put("nullifier1", p.nullifiers[1])
                    .put("outputValue0", out0.value.to_be_bytes())
                    .put("receiverPublicKey", p.receiver)
                    .put("outputSalt0", out0.salt)
                    .put("outputCommitment0", out0.commitment)
                    .put("outputValue1", out1.value.to_be_bytes())
                    .put("senderPublicKey", p.sender)
                    .put("outputSalt1", out1.salt)
                    .put("outputCommitment1", out1.commitment)
                    .put("root", p.root);
                pih
            }
            CircuitParams::Burn(p) => {
                let pih = burn_input_hash(scheme, &p.root, &p.nullifier, p.note.value, &p.payout);
                v.put("payTo", p.payout.to_word_bytes())
                    .put("value", p.note.value.to_be_bytes())
                    .put("secretKey", p.secret_key)
                    .put("salt", p.note.salt)
                    .put_path("path", "positions", &p.note.path)
                    .put("nullifier", p.nullifier)
                    .put("root", p.root);
                pih
            }
            CircuitParams::BatchTransfer(p) => {
                let commitments: Vec<Commitment> =
                    p.outputs.iter().map(|out| out.commitment).collect();
                let pih = batch_input_hash(scheme, &p.root, &p.nullifier, &commitments);
                v.put("value", p.input.value.to_be_bytes())
                    .put("secretKey", p.secret_key)
                    .put("salt", p.input.salt)
                    .put_path("path", "positions", &p.input.path)
                    .put("nullifier", p.nullifier)
                    .put_all(
                        "outputValues",
                        p.outputs.iter().map(|out| out.value.to_be_bytes()),
                    )
                    .put_all("receiverPublicKeys", p.receivers.iter())
                    .put_all("outputSalts", p.outputs.iter().map(|out| out.salt))
                    .put_all("outputCommitments", commitments.iter())
                    .put("root", p.root);
                pih
            }
        };

        v.put("publicInputHash", pih);
        (pih, v)
    }
}
