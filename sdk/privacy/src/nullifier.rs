//! Nullifiers
//!
//! ```text
//! Nullifier = zeroMSB(SHA256(salt || secret_key))
//! ```
//!
//! Publishing a nullifier spends the note blinded by that salt. The ledger keeps the set
//! of published nullifiers and refuses a second spend. Derivation lives on
//! [`CommitmentScheme::nullifier`](crate::CommitmentScheme::nullifier).

use std::collections::HashSet;

use crate::field::field_word_newtype;

field_word_newtype!(
    /// Unique spend tag for a note
    Nullifier
);

/// Set of spent nullifiers
#[derive(Debug, Default, Clone)]
pub struct NullifierSet {
    spent: HashSet<Nullifier>,
}

impl NullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, nullifier: &Nullifier) -> bool {
        self.spent.contains(nullifier)
    }

    /// Mark as spent. Returns `false` if it already was.
    pub fn insert(&mut self, nullifier: Nullifier) -> bool {
        self.spent.insert(nullifier)
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommitmentScheme, Salt, SecretKey};

    #[test]
    fn test_nullifier_depends_on_salt_and_key() {
        let scheme = CommitmentScheme::default();
        let codec = scheme.codec();
        let sk_a = SecretKey::parse(codec, "0x11").unwrap();
        let sk_b = SecretKey::parse(codec, "0x22").unwrap();
        let salt_1 = Salt::parse(codec, "0x01").unwrap();
        let salt_2 = Salt::parse(codec, "0x02").unwrap();

        let n = scheme.nullifier(&salt_1, &sk_a);
        assert_eq!(n, scheme.nullifier(&salt_1, &sk_a));
        assert_ne!(n, scheme.nullifier(&salt_2, &sk_a));
        assert_ne!(n, scheme.nullifier(&salt_1, &sk_b));
    }

    #[test]
    fn test_nullifier_set_rejects_reuse() {
        let scheme = CommitmentScheme::default();
        let codec = scheme.codec();
        let n = scheme.nullifier(
            &Salt::parse(codec, "0x01").unwrap(),
            &SecretKey::parse(codec, "0x11").unwrap(),
        );

        let mut set = NullifierSet::new();
        assert!(set.insert(n));
        assert!(!set.insert(n));
        assert!(set.contains(&n));
        assert_eq!(set.len(), 1);
    }
}
