//! Shielded Notes
//!
//! A note is a private claim on an amount of the underlying fungible token.
//!
//! ```text
//! Note = {
//!     value: u128,        // 16 bytes on the wire
//!     salt:  [u8; 32],    // blinding factor, field-safe
//!     owner: PublicKey,   // zeroMSB(SHA256(secret_key))
//!     index: u64,         // leaf position (set once the ledger accepts it)
//! }
//! ```

use std::fmt;

use num_bigint::BigUint;
use rand::RngCore;
use serde::{Deserialize, Serialize, Serializer};

use crate::commitment::Commitment;
use crate::field::{CodecError, FieldCodec, WORD_BYTES, decode_hex, field_word_newtype};

/// Byte width of an encoded note value
pub const VALUE_BYTES: usize = 16;

/// Byte width of a ledger account address
pub const ADDRESS_BYTES: usize = 20;

/// Note value, 128 bits wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteValue(pub u128);

impl NoteValue {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    /// Parse from hex, `0x` optional; more than 128 significant bits is an overflow
    pub fn from_hex(hex_value: &str) -> Result<Self, CodecError> {
        let bytes = decode_hex(hex_value)?;
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[start..];
        if significant.len() > VALUE_BYTES {
            return Err(CodecError::EncodingOverflow {
                bits: BigUint::from_bytes_be(significant).bits(),
                width: (VALUE_BYTES * 8) as u32,
            });
        }

        let mut buf = [0u8; VALUE_BYTES];
        buf[VALUE_BYTES - significant.len()..].copy_from_slice(significant);
        Ok(Self(u128::from_be_bytes(buf)))
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// 16-byte big-endian encoding used in hashes and vectors
    pub fn to_be_bytes(&self) -> [u8; VALUE_BYTES] {
        self.0.to_be_bytes()
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl From<u128> for NoteValue {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

field_word_newtype!(
    /// Spending secret. Whoever holds it can nullify the owner's notes.
    SecretKey
);

field_word_newtype!(
    /// Receiving key, `zeroMSB(SHA256(secret_key))`
    PublicKey
);

field_word_newtype!(
    /// Commitment blinding factor
    Salt
);

impl SecretKey {
    pub fn random<R: RngCore + ?Sized>(codec: &FieldCodec, rng: &mut R) -> Self {
        Self(codec.normalize(random_word(rng)))
    }
}

impl Salt {
    pub fn random<R: RngCore + ?Sized>(codec: &FieldCodec, rng: &mut R) -> Self {
        Self(codec.normalize(random_word(rng)))
    }
}

fn random_word<R: RngCore + ?Sized>(rng: &mut R) -> [u8; WORD_BYTES] {
    let mut bytes = [0u8; WORD_BYTES];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Ledger account identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex_value: &str) -> Result<Self, CodecError> {
        let bytes = decode_hex(hex_value)?;
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[start..];
        if significant.len() > ADDRESS_BYTES {
            return Err(CodecError::EncodingOverflow {
                bits: BigUint::from_bytes_be(significant).bits(),
                width: (ADDRESS_BYTES * 8) as u32,
            });
        }

        let mut out = [0u8; ADDRESS_BYTES];
        out[ADDRESS_BYTES - significant.len()..].copy_from_slice(significant);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Left-padded to a full word, as it appears inside public input hashes
    pub fn to_word_bytes(&self) -> [u8; WORD_BYTES] {
        let mut out = [0u8; WORD_BYTES];
        out[WORD_BYTES - ADDRESS_BYTES..].copy_from_slice(&self.0);
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

// ============================================================================
// Notes
// ============================================================================

/// A note already on the ledger that the caller can spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputNote {
    pub value: NoteValue,
    pub salt: Salt,
    pub commitment: Commitment,
    /// Leaf index in the commitment tree
    pub index: u64,
}

/// A note to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputNote {
    pub value: NoteValue,
    pub salt: Salt,
}

impl OutputNote {
    pub fn new(value: NoteValue, salt: Salt) -> Self {
        Self { value, salt }
    }

    /// Output with a fresh random salt
    pub fn random<R: RngCore + ?Sized>(value: NoteValue, codec: &FieldCodec, rng: &mut R) -> Self {
        Self {
            value,
            salt: Salt::random(codec, rng),
        }
    }
}

/// A note the ledger has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedNote {
    pub value: NoteValue,
    pub salt: Salt,
    pub commitment: Commitment,
    pub index: u64,
}

impl CreatedNote {
    /// Turn into a spendable input
    pub fn into_input(self) -> InputNote {
        InputNote {
            value: self.value,
            salt: self.salt,
            commitment: self.commitment,
            index: self.index,
        }
    }
}
