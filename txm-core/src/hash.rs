//! Pluggable tree hash functions

use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::fmt;
use txm_types::Digest;

/// Deterministic, fixed-width digest over arbitrary bytes.
///
/// Implementations must be collision resistant for proofs to be
/// tamper-evident; the tree mechanics alone do not provide that guarantee.
pub trait HashFunction {
    /// Hash a byte sequence
    fn hash(&self, data: &[u8]) -> Digest;

    /// Hash a pair of nodes: H(left || right)
    fn hash_pair(&self, left: &Digest, right: &Digest) -> Digest {
        let mut buf = [0u8; 2 * Digest::LEN];
        buf[..Digest::LEN].copy_from_slice(left.as_bytes());
        buf[Digest::LEN..].copy_from_slice(right.as_bytes());
        self.hash(&buf)
    }
}

impl<H: HashFunction + ?Sized> HashFunction for &H {
    fn hash(&self, data: &[u8]) -> Digest {
        (**self).hash(data)
    }

    fn hash_pair(&self, left: &Digest, right: &Digest) -> Digest {
        (**self).hash_pair(left, right)
    }
}

/// BLAKE3 (32 byte output)
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hash;

impl HashFunction for Blake3Hash {
    fn hash(&self, data: &[u8]) -> Digest {
        Digest::new(*blake3::hash(data).as_bytes())
    }

    fn hash_pair(&self, left: &Digest, right: &Digest) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        Digest::new(*hasher.finalize().as_bytes())
    }
}

/// SHA-256
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hash;

impl HashFunction for Sha256Hash {
    fn hash(&self, data: &[u8]) -> Digest {
        let out = sha2::Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&out);
        Digest::new(bytes)
    }

    fn hash_pair(&self, left: &Digest, right: &Digest) -> Digest {
        let mut hasher = sha2::Sha256::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Digest::new(bytes)
    }
}

/// Hash function selected at runtime, e.g. from a config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashFunction for HashAlgorithm {
    fn hash(&self, data: &[u8]) -> Digest {
        match self {
            HashAlgorithm::Blake3 => Blake3Hash.hash(data),
            HashAlgorithm::Sha256 => Sha256Hash.hash(data),
        }
    }

    fn hash_pair(&self, left: &Digest, right: &Digest) -> Digest {
        match self {
            HashAlgorithm::Blake3 => Blake3Hash.hash_pair(left, right),
            HashAlgorithm::Sha256 => Sha256Hash.hash_pair(left, right),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Blake3 => write!(f, "blake3"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            Sha256Hash.hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_blake3_known_vector() {
        // BLAKE3("")
        assert_eq!(
            Blake3Hash.hash(b"").to_hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_algorithm_dispatch() {
        assert_eq!(HashAlgorithm::Blake3.hash(b"x"), Blake3Hash.hash(b"x"));
        assert_eq!(HashAlgorithm::Sha256.hash(b"x"), Sha256Hash.hash(b"x"));
        assert_ne!(HashAlgorithm::Blake3.hash(b"x"), HashAlgorithm::Sha256.hash(b"x"));
    }

    #[test]
    fn test_algorithm_serde_names() {
        assert_eq!(serde_json::to_string(&HashAlgorithm::Sha256).unwrap(), "\"sha256\"");
        let parsed: HashAlgorithm = serde_json::from_str("\"blake3\"").unwrap();
        assert_eq!(parsed, HashAlgorithm::Blake3);
    }

    prop_compose! {
        fn arb_digest()(bytes in prop::array::uniform32(any::<u8>())) -> Digest {
            Digest::new(bytes)
        }
    }

    proptest! {
        #[test]
        fn prop_hash_pair_matches_concatenation(a in arb_digest(), b in arb_digest()) {
            let mut concat = a.as_bytes().to_vec();
            concat.extend_from_slice(b.as_bytes());
            prop_assert_eq!(Blake3Hash.hash_pair(&a, &b), Blake3Hash.hash(&concat));
            prop_assert_eq!(Sha256Hash.hash_pair(&a, &b), Sha256Hash.hash(&concat));
        }

        #[test]
        fn prop_hash_pair_non_commutative(a in arb_digest(), b in arb_digest()) {
            prop_assume!(a != b);
            prop_assert_ne!(Blake3Hash.hash_pair(&a, &b), Blake3Hash.hash_pair(&b, &a));
        }

        #[test]
        fn prop_hash_deterministic(data in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(Blake3Hash.hash(&data), Blake3Hash.hash(&data));
            prop_assert_eq!(Sha256Hash.hash(&data), Sha256Hash.hash(&data));
        }
    }
}
