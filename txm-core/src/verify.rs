//! Inclusion proof verification

use txm_types::{Digest, Proof};

use crate::codec::{CanonicalJson, RecordCodec};
use crate::error::{MerkleError, Result};
use crate::hash::{Blake3Hash, HashFunction};
use crate::merkle::{TreeBuilder, TreeContext};

/// Recomputes roots from records and proofs.
///
/// Must be configured with the same hash function and codec the tree was
/// built with.
#[derive(Debug, Clone, Default)]
pub struct Verifier<H = Blake3Hash, C = CanonicalJson> {
    hasher: H,
    codec: C,
}

impl<H: HashFunction, C> Verifier<H, C> {
    pub fn new(hasher: H, codec: C) -> Self {
        Self { hasher, codec }
    }

    /// Recompute the root a proof commits to, starting from a leaf hash
    pub fn compute_root(&self, leaf_hash: &Digest, proof: &Proof) -> Digest {
        proof.compute_root(leaf_hash, |left, right| self.hasher.hash_pair(left, right))
    }

    /// Verify that `record` is included under `expected_root`.
    ///
    /// This performs the following checks:
    /// 1. Rejects paths no tree could have produced (`MalformedProof`)
    /// 2. Computes the leaf hash H(encode(record))
    /// 3. Folds the path upward and compares against `expected_root`
    ///
    /// A mismatch returns `Ok(false)`. The proof length is not checked
    /// against any tree shape; use [`Verifier::verify_in_context`] when the
    /// tree's leaf count and policy are known.
    pub fn verify<R: ?Sized>(&self, record: &R, proof: &Proof, expected_root: &Digest) -> Result<bool>
    where
        C: RecordCodec<R>,
    {
        proof.check_structure()?;

        let leaf_hash = self.hasher.hash(&self.codec.encode(record)?);
        Ok(self.compute_root(&leaf_hash, proof) == *expected_root)
    }

    /// Like [`Verifier::verify`], but first requires the proof to have
    /// exactly the shape the described tree gives the proven leaf, which
    /// rejects truncated or padded paths.
    pub fn verify_in_context<R: ?Sized>(
        &self,
        record: &R,
        proof: &Proof,
        expected_root: &Digest,
        context: &TreeContext,
    ) -> Result<bool>
    where
        C: RecordCodec<R>,
    {
        check_path_shape(proof, context)?;
        self.verify(record, proof, expected_root)
    }
}

impl<H: HashFunction + Clone, C: Clone> From<&TreeBuilder<H, C>> for Verifier<H, C> {
    fn from(builder: &TreeBuilder<H, C>) -> Self {
        Self::new(builder.hasher().clone(), builder.codec().clone())
    }
}

/// Check that a proof's length and sibling sides are the ones the tree
/// described by `context` produces for `proof.leaf_index`
pub fn check_path_shape(proof: &Proof, context: &TreeContext) -> Result<()> {
    let expected = context.sibling_sides(proof.leaf_index).ok_or_else(|| {
        MerkleError::MalformedProof(format!(
            "leaf index {} outside a tree of {} leaves",
            proof.leaf_index, context.leaf_count
        ))
    })?;

    if expected.len() != proof.len() {
        return Err(MerkleError::MalformedProof(format!(
            "path has {} steps, leaf {} of a {}-leaf tree needs {}",
            proof.len(),
            proof.leaf_index,
            context.leaf_count,
            expected.len()
        )));
    }

    for (i, (step, side)) in proof.steps.iter().zip(expected).enumerate() {
        if step.side != side {
            return Err(MerkleError::MalformedProof(format!(
                "step {} has its sibling on the {}, expected {}",
                i, step.side, side
            )));
        }
    }

    Ok(())
}
