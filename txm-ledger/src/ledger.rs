//! Append-only transaction ledger over a Merkle tree store

use chrono::Utc;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use txm_core::{
    CanonicalJson, Digest, HashAlgorithm, MerkleError, OddNodePolicy, Tree, TreeBuilder,
    TreeStore, Verifier,
};

use crate::config::{LedgerConfig, TreeConfig};
use crate::receipt::Receipt;
use crate::storage::LedgerStorage;
use crate::transaction::Transaction;
use crate::{LedgerError, Result};

type Store = TreeStore<Transaction, HashAlgorithm, CanonicalJson>;

/// Transaction ledger
///
/// Writes are serialized so that assigned ids, the in-memory order and the
/// persisted order always agree. A transaction reaches the tree only after
/// it is on disk. Reads go straight to the tree store and see a complete
/// snapshot.
pub struct Ledger {
    tree: TreeConfig,
    store: Store,
    storage: Option<LedgerStorage>,
    /// Next free id, `None` once `u64::MAX` has been used; held for the
    /// duration of every write
    next_id: Mutex<Option<u64>>,
}

impl Ledger {
    /// A ledger that lives only in memory
    pub fn in_memory(tree: TreeConfig) -> Self {
        Self {
            tree,
            store: Self::new_store(tree),
            storage: None,
            next_id: Mutex::new(Some(1)),
        }
    }

    /// Open the persistent ledger described by `config`, reloading every
    /// stored transaction
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let storage = LedgerStorage::open(&config.storage.path)?;
        let transactions = storage.load_transactions()?;
        let count = transactions.len();
        let next_id = transactions
            .iter()
            .map(|tx| tx.id)
            .max()
            .map_or(Some(1), |max| max.checked_add(1));

        let store = Store::with_records(
            TreeBuilder::new(config.tree.hash, CanonicalJson)
                .with_policy(config.tree.odd_node_policy),
            transactions,
        )?;
        info!(
            "Opened ledger at {} with {} transactions ({}, {:?})",
            config.storage.path.display(),
            count,
            config.tree.hash,
            config.tree.odd_node_policy
        );

        Ok(Self {
            tree: config.tree,
            store,
            storage: Some(storage),
            next_id: Mutex::new(next_id),
        })
    }

    fn new_store(tree: TreeConfig) -> Store {
        TreeStore::new(TreeBuilder::new(tree.hash, CanonicalJson).with_policy(tree.odd_node_policy))
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.tree.hash
    }

    pub fn policy(&self) -> OddNodePolicy {
        self.tree.odd_node_policy
    }

    /// Verifier matching this ledger's hash function and codec
    pub fn verifier(&self) -> Verifier<HashAlgorithm, CanonicalJson> {
        Verifier::from(self.store.builder())
    }

    /// Append a transfer under the next free id
    pub fn add(&self, from: &str, to: &str, amount: u64) -> Result<Transaction> {
        let mut next_id = self.lock_writer()?;
        let tx = Transaction::new(Self::free_id(*next_id)?, from, to, amount);
        self.append(&mut next_id, tx.clone())?;
        Ok(tx)
    }

    /// Append a generated `User{id} -> User{id+1}` transfer
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Transaction> {
        let mut next_id = self.lock_writer()?;
        let tx = Transaction::generated(Self::free_id(*next_id)?, rng);
        self.append(&mut next_id, tx.clone())?;
        Ok(tx)
    }

    /// Append a transaction with a caller-chosen id
    pub fn add_transaction(&self, tx: Transaction) -> Result<()> {
        let mut next_id = self.lock_writer()?;
        self.append(&mut next_id, tx)
    }

    /// Append the four demo transfers
    pub fn seed(&self) -> Result<()> {
        let mut next_id = self.lock_writer()?;
        for tx in Transaction::seed() {
            self.append(&mut next_id, tx)?;
        }
        Ok(())
    }

    /// Drop every transaction and receipt
    pub fn reset(&mut self) -> Result<()> {
        if let Some(storage) = &self.storage {
            storage.clear()?;
        }
        self.store = Self::new_store(self.tree);
        *self.lock_writer()? = Some(1);
        warn!("Ledger reset, all transactions removed");
        Ok(())
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.store.records()?)
    }

    pub fn get(&self, id: u64) -> Result<Option<Transaction>> {
        Ok(self.store.get(&id)?)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.store.is_empty()?)
    }

    /// Current root, `None` for an empty ledger
    pub fn root(&self) -> Result<Option<Digest>> {
        Ok(self.store.root()?)
    }

    /// Snapshot of the current tree
    pub fn tree(&self) -> Result<Arc<Tree<u64>>> {
        Ok(self.store.current_tree()?)
    }

    /// Issue a receipt for transaction `id` against the current tree. The
    /// receipt is persisted when the ledger has storage.
    pub fn prove(&self, id: u64) -> Result<Receipt> {
        let tree = self.store.current_tree()?;
        let built = tree.as_built().ok_or_else(|| MerkleError::NotFound {
            key: id.to_string(),
        })?;

        let proof = built.prove(&id)?;
        let transaction = self.store.get(&id)?.ok_or_else(|| MerkleError::NotFound {
            key: id.to_string(),
        })?;

        let receipt = Receipt {
            transaction,
            proof,
            root: *built.root(),
            context: built.context(),
            hash: self.tree.hash,
            issued_at: Utc::now(),
        };

        if let Some(storage) = &self.storage {
            storage.store_receipt(&receipt)?;
        }
        info!(
            "Issued receipt for transaction {} ({} steps, root: {})",
            id,
            receipt.proof.len(),
            receipt.root
        );

        Ok(receipt)
    }

    /// Stored receipt for transaction `id` covering the largest tree it
    /// was issued against
    pub fn receipt(&self, id: u64) -> Result<Option<Receipt>> {
        match &self.storage {
            Some(storage) => storage.get_receipt(id),
            None => Ok(None),
        }
    }

    /// Check a receipt on its own terms and report whether it was issued
    /// against the ledger's current root
    pub fn check_receipt(&self, receipt: &Receipt) -> Result<ReceiptCheck> {
        if receipt.hash != self.tree.hash {
            warn!(
                "Receipt uses {}, ledger is configured for {}",
                receipt.hash, self.tree.hash
            );
        }

        Ok(ReceiptCheck {
            valid: receipt.verify()?,
            current: self.root()? == Some(receipt.root),
        })
    }

    fn free_id(next_id: Option<u64>) -> Result<u64> {
        next_id.ok_or(LedgerError::IdsExhausted)
    }

    fn append(&self, next_id: &mut Option<u64>, tx: Transaction) -> Result<()> {
        let id = tx.id;

        // Holding the writer lock keeps the check valid until the append
        self.store.check(&tx)?;
        if let Some(storage) = &self.storage {
            storage.append_transaction(&tx)?;
        }
        self.store.append(tx)?;

        if let Some(next) = *next_id {
            if id >= next {
                *next_id = id.checked_add(1);
            }
        }
        info!("Appended transaction {}", id);

        Ok(())
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Option<u64>>> {
        self.next_id
            .lock()
            .map_err(|_| LedgerError::Merkle(MerkleError::LockPoisoned))
    }
}

/// Outcome of [`Ledger::check_receipt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptCheck {
    /// Transaction and proof hash to the receipt's root
    pub valid: bool,
    /// The receipt's root is the ledger's current root
    pub current: bool,
}
