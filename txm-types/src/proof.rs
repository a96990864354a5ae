//! Inclusion proof (verification path) format

use crate::error::{Error, Result};
use crate::primitives::{Digest, Side};
use serde::{Deserialize, Serialize};

/// Inclusion proof from a leaf to the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Proof {
    /// Position of the proven leaf in the record sequence
    pub leaf_index: u64,
    /// Sibling hashes ordered leaf to root: the first entry is the
    /// immediate sibling of the leaf, the last is a child of the root
    pub steps: Vec<ProofStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProofStep {
    pub hash: Digest,
    /// Side the sibling occupies relative to the node being folded upward
    pub side: Side,
}

impl Proof {
    /// Longest path any tree over a `u64`-indexed record sequence can have
    pub const MAX_STEPS: usize = 64;

    pub fn new(leaf_index: u64, steps: Vec<ProofStep>) -> Self {
        Self { leaf_index, steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Reject paths no tree could have produced
    pub fn check_structure(&self) -> Result<()> {
        if self.steps.len() > Self::MAX_STEPS {
            return Err(Error::MalformedProof(format!(
                "path has {} steps, at most {} are possible",
                self.steps.len(),
                Self::MAX_STEPS
            )));
        }
        Ok(())
    }

    /// Fold the path over a leaf hash with the given pair hash,
    /// yielding the root this proof commits to
    pub fn compute_root<F>(&self, leaf_hash: &Digest, mut hash_pair: F) -> Digest
    where
        F: FnMut(&Digest, &Digest) -> Digest,
    {
        let mut current = *leaf_hash;

        for step in &self.steps {
            current = match step.side {
                Side::Left => hash_pair(&step.hash, &current),
                Side::Right => hash_pair(&current, &step.hash),
            };
        }

        current
    }

    /// Decode a proof received over a transport. Any shape problem,
    /// including a missing or unknown side marker, is `MalformedProof`.
    pub fn from_json(json: &str) -> Result<Self> {
        let proof: Proof =
            serde_json::from_str(json).map_err(|e| Error::MalformedProof(e.to_string()))?;
        proof.check_structure()?;
        Ok(proof)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
