//! Field Packing
//!
//! Converts byte values into the fixed-width field elements the circuits consume,
//! and clamps externally supplied 256-bit words into the usable field width.
//!
//! ```text
//!          value (bit_width bits, big-endian)
//!   ┌──────────────┬──────────────┬──────────────┐
//!   │   chunk 0    │   chunk 1    │     ...      │   ceil(bit_width / packing) chunks
//!   └──────────────┴──────────────┴──────────────┘
//!     most significant first, zero-padded on the left
//! ```
//!
//! Every word that enters hashing goes through [`FieldCodec::normalize`] first.
//! [`FieldWord`] has no public constructor, so "already field-safe" is a type-level fact.

use std::fmt;

use num_bigint::BigUint;
use num_traits::One;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Width of every key, salt, commitment and node word
pub const WORD_BYTES: usize = 32;

/// Default chunk width for multi-element encodings
pub const DEFAULT_PACKING_SIZE: u32 = 128;

/// Default usable width of a word (bits above are zeroed)
pub const DEFAULT_USABLE_BITS: u32 = 216;

/// Errors raised while encoding values for a circuit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("value needs {bits} bits but the encoding holds only {width}")]
    EncodingOverflow { bits: u64, width: u32 },

    #[error("invalid hex input: {0}")]
    InvalidHex(String),

    #[error("packing size must be non-zero")]
    ZeroPacking,
}

// ============================================================================
// Field Element
// ============================================================================

/// An element of the prover's scalar field
///
/// Rendered in decimal, which is what the proving toolchain reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(BigUint);

impl FieldElement {
    pub fn from_biguint(value: BigUint) -> Self {
        Self(value)
    }

    pub fn from_u128(value: u128) -> Self {
        Self(BigUint::from(value))
    }

    /// Parse a `0x`-prefixed hex or plain decimal string
    pub fn parse(s: &str) -> Result<Self, CodecError> {
        let s = s.trim();
        if s.starts_with("0x") || s.starts_with("0X") {
            return Ok(Self(BigUint::from_bytes_be(&decode_hex(s)?)));
        }
        BigUint::parse_bytes(s.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| CodecError::InvalidHex(s.to_string()))
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

// ============================================================================
// Field Word
// ============================================================================

/// A 256-bit big-endian word whose bits above the usable width are zero
///
/// Only [`FieldCodec`] can build one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldWord([u8; WORD_BYTES]);

impl FieldWord {
    pub const ZERO: Self = Self([0u8; WORD_BYTES]);

    pub(crate) fn from_normalized(bytes: [u8; WORD_BYTES]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; WORD_BYTES] {
        &self.0
    }

    /// The `n` least significant bytes
    pub fn low_bytes(&self, n: usize) -> &[u8] {
        &self.0[WORD_BYTES - n.min(WORD_BYTES)..]
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// `0x`-prefixed, 64 hex digits
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for FieldWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldWord({})", self.to_hex())
    }
}

impl fmt::Display for FieldWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for FieldWord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for FieldWord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Packing and normalization rules shared with the circuits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCodec {
    packing_size: u32,
    usable_bits: u32,
}

impl FieldCodec {
    pub fn new(packing_size: u32, usable_bits: u32) -> Self {
        Self {
            packing_size,
            usable_bits: usable_bits.min((WORD_BYTES * 8) as u32),
        }
    }

    pub fn packing_size(&self) -> u32 {
        self.packing_size
    }

    pub fn usable_bits(&self) -> u32 {
        self.usable_bits
    }

    /// Split a big-endian value into `ceil(bit_width / packing)` field elements
    pub fn pack(
        &self,
        bytes: &[u8],
        bit_width: u32,
        packing: u32,
    ) -> Result<Vec<FieldElement>, CodecError> {
        if packing == 0 {
            return Err(CodecError::ZeroPacking);
        }

        let value = BigUint::from_bytes_be(bytes);
        let bits = value.bits();
        if bits > u64::from(bit_width) {
            return Err(CodecError::EncodingOverflow {
                bits,
                width: bit_width,
            });
        }

        let chunks = bit_width.div_ceil(packing);
        let mask = (BigUint::one() << packing) - 1u32;

        Ok((0..chunks)
            .rev()
            .map(|i| FieldElement((&value >> (packing * i)) & &mask))
            .collect())
    }

    /// Pack a hex string (`0x` optional)
    pub fn pack_hex(
        &self,
        hex_value: &str,
        bit_width: u32,
        packing: u32,
    ) -> Result<Vec<FieldElement>, CodecError> {
        self.pack(&decode_hex(hex_value)?, bit_width, packing)
    }

    /// Pack a full word at the codec's packing size
    pub fn pack_word(&self, word: &FieldWord) -> Result<Vec<FieldElement>, CodecError> {
        self.pack(word.as_bytes(), (WORD_BYTES * 8) as u32, self.packing_size)
    }

    /// Reverse of [`pack`](Self::pack)
    pub fn unpack(elements: &[FieldElement], packing: u32) -> BigUint {
        elements
            .iter()
            .fold(BigUint::default(), |acc, e| (acc << packing) + &e.0)
    }

    /// Clear every bit above the usable width
    pub fn normalize(&self, bytes: [u8; WORD_BYTES]) -> FieldWord {
        FieldWord(zero_msbs_to(self.usable_bits, bytes))
    }

    /// Normalize a byte string of at most 32 significant bytes
    pub fn normalize_slice(&self, bytes: &[u8]) -> Result<FieldWord, CodecError> {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[start..];
        if significant.len() > WORD_BYTES {
            return Err(CodecError::EncodingOverflow {
                bits: BigUint::from_bytes_be(significant).bits(),
                width: (WORD_BYTES * 8) as u32,
            });
        }

        let mut word = [0u8; WORD_BYTES];
        word[WORD_BYTES - significant.len()..].copy_from_slice(significant);
        Ok(self.normalize(word))
    }

    /// Normalize a hex string, tolerating stripped leading zeros
    pub fn normalize_hex(&self, hex_value: &str) -> Result<FieldWord, CodecError> {
        self.normalize_slice(&decode_hex(hex_value)?)
    }
}

impl Default for FieldCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PACKING_SIZE, DEFAULT_USABLE_BITS)
    }
}

/// Keep the `bits` least significant bits of a word
pub fn zero_msbs_to(bits: u32, bytes: [u8; WORD_BYTES]) -> [u8; WORD_BYTES] {
    let bits = (bits as usize).min(WORD_BYTES * 8);
    let clear = WORD_BYTES * 8 - bits;
    let full = clear / 8;

    let mut out = bytes;
    out[..full].fill(0);
    let rem = clear % 8;
    if rem > 0 {
        out[full] &= 0xff >> rem;
    }
    out
}

/// Declares a newtype over [`FieldWord`] with the usual accessors
macro_rules! field_word_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        pub struct $name($crate::field::FieldWord);

        impl $name {
            pub fn from_word(word: $crate::field::FieldWord) -> Self {
                Self(word)
            }

            /// Parse and normalize a hex word
            pub fn parse(
                codec: &$crate::field::FieldCodec,
                hex_value: &str,
            ) -> Result<Self, $crate::field::CodecError> {
                codec.normalize_hex(hex_value).map(Self)
            }

            pub fn as_word(&self) -> &$crate::field::FieldWord {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; $crate::field::WORD_BYTES] {
                self.0.as_bytes()
            }

            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_ref()
            }
        }
    };
}

pub(crate) use field_word_newtype;

/// Decode hex with an optional `0x` prefix; odd lengths get a leading zero
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };

    hex::decode(digits).map_err(|_| CodecError::InvalidHex(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_single_value_chunk() {
        let codec = FieldCodec::default();
        let packed = codec.pack_hex("0x00000000000000000000000000000020", 128, 128).unwrap();
        assert_eq!(packed, vec![FieldElement::from_u128(0x20)]);
    }

    #[test]
    fn test_pack_word_splits_big_endian() {
        let codec = FieldCodec::default();
        let mut bytes = [0u8; 32];
        bytes[15] = 1; // high chunk = 1
        bytes[31] = 2; // low chunk = 2

        let word = codec.normalize(bytes);
        let packed = codec.pack_word(&word).unwrap();

        assert_eq!(packed, vec![FieldElement::from(1), FieldElement::from(2)]);
    }

    #[test]
    fn test_pack_pads_most_significant_side() {
        let codec = FieldCodec::default();
        // 0x05 needs one chunk, but a 256-bit slot always gets two
        let packed = codec.pack_hex("0x05", 256, 128).unwrap();
        assert_eq!(packed, vec![FieldElement::from(0), FieldElement::from(5)]);
    }

    #[test]
    fn test_pack_is_lossless() {
        let codec = FieldCodec::default();
        let input = "0x0000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let packed = codec.pack_hex(input, 256, 128).unwrap();
        let expected = BigUint::from_bytes_be(&decode_hex(input).unwrap());

        assert_eq!(FieldCodec::unpack(&packed, 128), expected);
    }

    #[test]
    fn test_pack_uneven_width() {
        let codec = FieldCodec::default();
        // 216 bits at 128 per chunk: an 88-bit head and a 128-bit tail
        let packed = codec.pack(&[0xff; 27], 216, 128).unwrap();
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].as_biguint().bits(), 88);
        assert_eq!(packed[1].as_biguint().bits(), 128);
    }

    #[test]
    fn test_pack_overflow() {
        let codec = FieldCodec::default();
        let err = codec.pack(&[0x01; 17], 128, 128).unwrap_err();
        assert_eq!(
            err,
            CodecError::EncodingOverflow {
                bits: 129,
                width: 128
            }
        );
    }

    #[test]
    fn test_pack_rejects_zero_packing() {
        let codec = FieldCodec::default();
        assert_eq!(codec.pack(&[1], 8, 0), Err(CodecError::ZeroPacking));
    }

    #[test]
    fn test_normalize_clears_high_bits() {
        let codec = FieldCodec::default();
        let word = codec.normalize([0xff; 32]);

        assert_eq!(&word.as_bytes()[..5], &[0u8; 5]);
        assert_eq!(&word.as_bytes()[5..], &[0xff; 27]);
        assert_eq!(word.to_biguint().bits(), 216);
    }

    #[test]
    fn test_normalize_partial_byte() {
        let out = zero_msbs_to(250, [0xff; 32]);
        assert_eq!(out[0], 0x03);
        assert_eq!(out[1], 0xff);
    }

    #[test]
    fn test_normalize_hex_stripped_leading_zeros() {
        let codec = FieldCodec::default();
        let a = codec.normalize_hex("0x20").unwrap();
        let b = codec
            .normalize_hex("0x0000000000000000000000000000000000000000000000000000000000000020")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_hex_too_long() {
        let codec = FieldCodec::default();
        let long = format!("0x01{}", "00".repeat(32));
        assert!(matches!(
            codec.normalize_hex(&long),
            Err(CodecError::EncodingOverflow { .. })
        ));
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(decode_hex("0xzz"), Err(CodecError::InvalidHex(_))));
    }

    #[test]
    fn test_field_element_parse() {
        assert_eq!(FieldElement::parse("0x10").unwrap(), FieldElement::from(16));
        assert_eq!(FieldElement::parse("42").unwrap(), FieldElement::from(42));
        assert!(FieldElement::parse("nope").is_err());
    }
}
