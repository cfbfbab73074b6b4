//! Note Commitments
//!
//! SHA-256 commitments, truncated to the usable field width.
//!
//! ```text
//! PublicKey  = zeroMSB(SHA256(sk))
//! Commitment = zeroMSB(SHA256(value_16 || pk_32 || salt_32))
//! Nullifier  = zeroMSB(SHA256(salt_32 || sk_32))
//! ```
//!
//! Every argument is hashed at its declared byte width, so the digests match the
//! ones the circuits recompute.

use sha2::{Digest, Sha256};

use crate::field::{FieldCodec, FieldWord, WORD_BYTES, field_word_newtype};
use crate::note::{NoteValue, PublicKey, Salt, SecretKey};
use crate::nullifier::Nullifier;

field_word_newtype!(
    /// A note commitment
    Commitment
);

/// Hashing rules shared by keys, commitments, nullifiers and public inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitmentScheme {
    codec: FieldCodec,
}

impl CommitmentScheme {
    pub fn new(codec: FieldCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    /// `zeroMSB(SHA256(parts[0] || parts[1] || ...))`
    pub fn hash(&self, parts: &[&[u8]]) -> FieldWord {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let digest: [u8; WORD_BYTES] = hasher.finalize().into();
        self.codec.normalize(digest)
    }

    pub fn public_key(&self, secret_key: &SecretKey) -> PublicKey {
        PublicKey::from_word(self.hash(&[secret_key.as_bytes()]))
    }

    /// Commit to a note owned by `owner`
    pub fn commit(&self, value: NoteValue, owner: &PublicKey, salt: &Salt) -> Commitment {
        let value = value.to_be_bytes();
        Commitment::from_word(self.hash(&[&value, owner.as_bytes(), salt.as_bytes()]))
    }

    /// Nullifier for the note blinded by `salt`
    pub fn nullifier(&self, salt: &Salt, secret_key: &SecretKey) -> Nullifier {
        Nullifier::from_word(self.hash(&[salt.as_bytes(), secret_key.as_bytes()]))
    }

    /// Digest that binds a circuit's public inputs
    pub fn public_input_hash(&self, parts: &[&[u8]]) -> FieldWord {
        self.hash(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SK_A: &str = "0x0000000000111111111111111111111111111111111111111111111111111111";
    const SALT: &str = "0x0000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn fixtures() -> (CommitmentScheme, SecretKey, Salt) {
        let scheme = CommitmentScheme::default();
        let sk = SecretKey::parse(scheme.codec(), SK_A).unwrap();
        let salt = Salt::parse(scheme.codec(), SALT).unwrap();
        (scheme, sk, salt)
    }

    #[test]
    fn test_public_key_golden() {
        let (scheme, sk, _) = fixtures();
        assert_eq!(
            scheme.public_key(&sk).to_hex(),
            "0x0000000000e0e49d2c0257ebc2b04bbd138f9db120b46bee14812df30624d78a"
        );
    }

    #[test]
    fn test_commitment_golden() {
        let (scheme, sk, salt) = fixtures();
        let pk = scheme.public_key(&sk);
        let commitment = scheme.commit(NoteValue(0x20), &pk, &salt);

        assert_eq!(
            commitment.to_hex(),
            "0x0000000000ed4593bd96285780ee8880b535348e33bc2b0314d4df46e9a79261"
        );
    }

    #[test]
    fn test_nullifier_golden() {
        let (scheme, sk, salt) = fixtures();
        assert_eq!(
            scheme.nullifier(&salt, &sk).to_hex(),
            "0x0000000000374cdcc7d849281de07269c6571e2892cacabd9229433bfe8b6b54"
        );
    }

    #[test]
    fn test_mint_input_hash_golden() {
        let (scheme, sk, salt) = fixtures();
        let pk = scheme.public_key(&sk);
        let commitment = scheme.commit(NoteValue(0x20), &pk, &salt);

        let pih =
            scheme.public_input_hash(&[&NoteValue(0x20).to_be_bytes(), commitment.as_bytes()]);
        assert_eq!(
            pih.to_hex(),
            "0x0000000000141e8fc5c4e22f47111d659508f79d1d0649026f9762b0575fc699"
        );
    }

    #[test]
    fn test_high_bit_salt_golden() {
        let (scheme, sk, _) = fixtures();
        let pk = scheme.public_key(&sk);

        // Bits above the usable width are dropped, redundant leading zero bytes too
        let high = Salt::parse(scheme.codec(), &format!("0x{}", "ff".repeat(32))).unwrap();
        let padded = Salt::parse(scheme.codec(), &format!("0x0000{}", "ff".repeat(32))).unwrap();
        assert_eq!(high, padded);
        assert_eq!(
            high.to_hex(),
            "0x0000000000ffffffffffffffffffffffffffffffffffffffffffffffffffffff"
        );

        assert_eq!(
            scheme.commit(NoteValue(0x20), &pk, &high).to_hex(),
            "0x0000000000d5218d185ed12b0d765fab6ff804e0b55d23b4c2bcc82c27039782"
        );
        assert_eq!(
            scheme.nullifier(&high, &sk).to_hex(),
            "0x0000000000eaca7734a54dbc6d8daef199fb17e8522583af16a2a55ae31254d1"
        );

        let too_long = format!("0x01{}", "ff".repeat(32));
        assert!(Salt::parse(scheme.codec(), &too_long).is_err());
    }

    #[test]
    fn test_commitment_deterministic_and_hiding() {
        let (scheme, sk, salt) = fixtures();
        let pk = scheme.public_key(&sk);

        let c1 = scheme.commit(NoteValue(0x20), &pk, &salt);
        let c2 = scheme.commit(NoteValue(0x20), &pk, &salt);
        let c3 = scheme.commit(NoteValue(0x21), &pk, &salt);

        assert_eq!(c1, c2);
        assert_ne!(c1, c3);
    }

    #[test]
    fn test_outputs_are_field_safe() {
        let (scheme, sk, salt) = fixtures();
        let pk = scheme.public_key(&sk);

        for word in [
            *pk.as_word(),
            *scheme.commit(NoteValue(1), &pk, &salt).as_word(),
            *scheme.nullifier(&salt, &sk).as_word(),
        ] {
            assert!(word.to_biguint().bits() <= 216);
        }
    }
}
