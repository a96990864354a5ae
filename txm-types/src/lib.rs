//! Core types for txm (transaction Merkle trees)
//!
//! This crate defines the digest and inclusion-proof formats shared by the
//! tree builder, the verifier and any host that stores or transports proofs.

pub mod error;
pub mod primitives;
pub mod proof;

pub use error::{Error, Result};
pub use primitives::{Digest, Side};
pub use proof::{Proof, ProofStep};
