//! Persistent storage for transactions and receipts

use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use crate::receipt::Receipt;
use crate::transaction::Transaction;
use crate::{LedgerError, Result};

const TRANSACTIONS: &str = "transactions";
const RECEIPTS: &str = "receipts";

/// sled-backed ledger storage.
///
/// Transactions are keyed by their position in the ledger so that reloading
/// reproduces the insertion order the tree was built over. Receipts are keyed
/// by transaction id; a receipt replaces the stored one unless that one was
/// issued against a larger tree.
pub struct LedgerStorage {
    db: Db,
    transactions: Tree,
    receipts: Tree,
}

impl LedgerStorage {
    /// Open or create storage at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;
        let transactions = db
            .open_tree(TRANSACTIONS)
            .map_err(|e| LedgerError::Storage(format!("Failed to open {} tree: {}", TRANSACTIONS, e)))?;
        let receipts = db
            .open_tree(RECEIPTS)
            .map_err(|e| LedgerError::Storage(format!("Failed to open {} tree: {}", RECEIPTS, e)))?;

        Ok(Self {
            db,
            transactions,
            receipts,
        })
    }

    /// Append a transaction after the last stored one
    pub fn append_transaction(&self, tx: &Transaction) -> Result<()> {
        let position = self.next_position()?;
        let value = serde_json::to_vec(tx)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize transaction: {}", e)))?;

        self.transactions
            .insert(position.to_be_bytes(), value)
            .map_err(|e| LedgerError::Storage(format!("Failed to store transaction: {}", e)))?;
        debug!("Stored transaction {} at position {}", tx.id, position);

        self.flush()
    }

    fn next_position(&self) -> Result<u64> {
        let last = self
            .transactions
            .last()
            .map_err(|e| LedgerError::Storage(format!("Failed to read last transaction: {}", e)))?;

        match last {
            Some((key, _)) => {
                let bytes = <[u8; 8]>::try_from(&key[..]).map_err(|_| {
                    LedgerError::Storage(format!("Invalid transaction key of {} bytes", key.len()))
                })?;
                Ok(u64::from_be_bytes(bytes) + 1)
            }
            None => Ok(0),
        }
    }

    /// All stored transactions in ledger order
    pub fn load_transactions(&self) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();

        for item in self.transactions.iter() {
            let (_, value) = item
                .map_err(|e| LedgerError::Storage(format!("Failed to iterate transactions: {}", e)))?;
            let tx = serde_json::from_slice(&value).map_err(|e| {
                LedgerError::Storage(format!("Failed to deserialize transaction: {}", e))
            })?;
            transactions.push(tx);
        }

        Ok(transactions)
    }

    /// Store a receipt for its transaction. Returns `false` when the stored
    /// receipt covers a larger tree and is kept instead.
    ///
    /// The comparison and the write are one atomic update, so concurrent
    /// callers issuing against different snapshots settle on the newest.
    pub fn store_receipt(&self, receipt: &Receipt) -> Result<bool> {
        let value = serde_json::to_vec(receipt)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize receipt: {}", e)))?;
        let mut replaced = true;

        self.receipts
            .fetch_and_update(receipt.transaction.id.to_be_bytes(), |current| {
                replaced = current.map_or(true, |bytes| {
                    stored_leaf_count(bytes) <= Some(receipt.context.leaf_count)
                });
                if replaced {
                    Some(value.clone())
                } else {
                    current.map(|bytes| bytes.to_vec())
                }
            })
            .map_err(|e| LedgerError::Storage(format!("Failed to store receipt: {}", e)))?;

        if !replaced {
            debug!(
                "Kept stored receipt for transaction {}, it covers a larger tree",
                receipt.transaction.id
            );
        }
        self.flush()?;
        Ok(replaced)
    }

    /// Retrieve the stored receipt for a transaction id
    pub fn get_receipt(&self, id: u64) -> Result<Option<Receipt>> {
        let value = self
            .receipts
            .get(id.to_be_bytes())
            .map_err(|e| LedgerError::Storage(format!("Failed to retrieve receipt: {}", e)))?;

        match value {
            Some(bytes) => {
                let receipt = serde_json::from_slice(&bytes)
                    .map_err(|e| LedgerError::Storage(format!("Failed to deserialize receipt: {}", e)))?;
                Ok(Some(receipt))
            }
            None => Ok(None),
        }
    }

    /// All stored receipts ordered by transaction id
    pub fn list_receipts(&self) -> Result<Vec<Receipt>> {
        let mut receipts = Vec::new();

        for item in self.receipts.iter() {
            let (_, value) = item
                .map_err(|e| LedgerError::Storage(format!("Failed to iterate receipts: {}", e)))?;
            let receipt = serde_json::from_slice(&value)
                .map_err(|e| LedgerError::Storage(format!("Failed to deserialize receipt: {}", e)))?;
            receipts.push(receipt);
        }

        Ok(receipts)
    }

    /// Remove every transaction and receipt
    pub fn clear(&self) -> Result<()> {
        self.transactions
            .clear()
            .map_err(|e| LedgerError::Storage(format!("Failed to clear transactions: {}", e)))?;
        self.receipts
            .clear()
            .map_err(|e| LedgerError::Storage(format!("Failed to clear receipts: {}", e)))?;

        self.flush()
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

/// Leaf count of a stored receipt, `None` if it no longer decodes
fn stored_leaf_count(bytes: &[u8]) -> Option<u64> {
    serde_json::from_slice::<Receipt>(bytes)
        .ok()
        .map(|receipt| receipt.context.leaf_count)
}
