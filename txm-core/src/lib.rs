//! Core Merkle engine for txm (transaction Merkle trees)
//!
//! This crate provides:
//! - Pluggable hash functions and canonical record encoding
//! - Merkle tree construction over an ordered record sequence
//! - Inclusion proof generation and verification
//! - A lazily rebuilt, thread-safe tree store

pub mod codec;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod store;
pub mod verify;

pub use codec::{CanonicalJson, EncodingError, Record, RecordCodec};
pub use error::{MerkleError, Result};
pub use hash::{Blake3Hash, HashAlgorithm, HashFunction, Sha256Hash};
pub use merkle::{build, MerkleTree, Node, OddNodePolicy, Tree, TreeBuilder, TreeContext};
pub use store::TreeStore;
pub use verify::{check_path_shape, Verifier};

pub use txm_types::{Digest, Proof, ProofStep, Side};
