//! Umbra Privacy SDK
//!
//! Shielded fungible-token primitives: field-safe words, SHA-256 commitments and
//! nullifiers, and the commitment Merkle tree.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Shielded Operation                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐  │
//! │  │  Nullifiers  │  │ Commitments  │  │   Merkle path + root  │  │
//! │  │  (spent)     │  │  (new notes) │  │   (membership)        │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘  │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              FieldCodec (zeroMSB + packing)             │    │
//! │  │  • every word clamped to the usable width               │    │
//! │  │  • values split into fixed-width field elements         │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod field;
pub mod merkle;
pub mod note;
pub mod nullifier;

pub use commitment::{Commitment, CommitmentScheme};
pub use field::{CodecError, FieldCodec, FieldElement, FieldWord, WORD_BYTES, zero_msbs_to};
pub use merkle::{MerkleError, MerkleHasher, MerklePath, MerkleTree, RootHistory, TREE_DEPTH};
pub use note::{Address, CreatedNote, InputNote, NoteValue, OutputNote, PublicKey, Salt, SecretKey};
pub use nullifier::{Nullifier, NullifierSet};
