//! Self-contained inclusion receipts
//!
//! A receipt carries everything needed to check a transaction's inclusion
//! offline: the transaction, its proof, the root it was issued against, the
//! shape of that tree and the hash function used to build it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use txm_core::{CanonicalJson, Digest, HashAlgorithm, MerkleError, Proof, TreeContext, Verifier};

use crate::transaction::Transaction;
use crate::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction: Transaction,
    pub proof: Proof,
    pub root: Digest,
    pub context: TreeContext,
    pub hash: HashAlgorithm,
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    fn verifier(&self) -> Verifier<HashAlgorithm, CanonicalJson> {
        Verifier::new(self.hash, CanonicalJson)
    }

    /// Check the receipt's transaction against the root it was issued for
    pub fn verify(&self) -> Result<bool> {
        self.verify_record(&self.transaction)
    }

    /// Check the receipt's transaction against another root, e.g. the
    /// ledger's current one. Only meaningful while the ledger still has the
    /// shape recorded in the receipt.
    pub fn verify_against(&self, root: &Digest) -> Result<bool> {
        Ok(self
            .verifier()
            .verify_in_context(&self.transaction, &self.proof, root, &self.context)?)
    }

    /// Check a caller-supplied transaction using this receipt's proof
    pub fn verify_record(&self, tx: &Transaction) -> Result<bool> {
        Ok(self
            .verifier()
            .verify_in_context(tx, &self.proof, &self.root, &self.context)?)
    }

    /// Same receipt with the amount raised by ten
    pub fn tampered(&self) -> Self {
        Self {
            transaction: self.transaction.tampered(),
            ..self.clone()
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let receipt: Receipt =
            serde_json::from_str(json).map_err(|e| LedgerError::MalformedReceipt(e.to_string()))?;
        receipt.proof.check_structure().map_err(MerkleError::from)?;
        Ok(receipt)
    }
}
