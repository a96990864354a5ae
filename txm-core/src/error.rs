//! Error types for the Merkle engine

use thiserror::Error;

use crate::codec::EncodingError;

pub type Result<T> = std::result::Result<T, MerkleError>;

/// Failures surfaced by build, prove and verify.
///
/// A proof that simply does not match a root is not an error; verification
/// reports it as `Ok(false)`.
#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("Record encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("No leaf carries record key {key}")]
    NotFound { key: String },

    #[error("Duplicate record key {key} at positions {first} and {second}")]
    DuplicateKey {
        key: String,
        first: usize,
        second: usize,
    },

    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

impl From<txm_types::Error> for MerkleError {
    fn from(err: txm_types::Error) -> Self {
        match err {
            txm_types::Error::MalformedProof(reason) => MerkleError::MalformedProof(reason),
            other => MerkleError::MalformedProof(other.to_string()),
        }
    }
}
