//! Record store that owns the tree lifecycle
//!
//! The store is the only mutable state in the engine. Appends mark the
//! cached tree stale; the next reader rebuilds it under the write lock and
//! publishes it as an immutable snapshot. Readers holding an older snapshot
//! keep a complete tree for as long as they need it.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use txm_types::{Digest, Proof};

use crate::codec::{Record, RecordCodec};
use crate::error::{MerkleError, Result};
use crate::hash::HashFunction;
use crate::merkle::{Tree, TreeBuilder};

struct StoreState<R: Record> {
    records: Vec<R>,
    keys: HashSet<R::Key>,
    /// `None` while stale
    tree: Option<Arc<Tree<R::Key>>>,
}

/// Ordered record sequence plus its most recently built tree
pub struct TreeStore<R: Record, H, C> {
    builder: TreeBuilder<H, C>,
    state: RwLock<StoreState<R>>,
}

impl<R, H, C> TreeStore<R, H, C>
where
    R: Record,
    H: HashFunction,
    C: RecordCodec<R>,
{
    pub fn new(builder: TreeBuilder<H, C>) -> Self {
        Self {
            builder,
            state: RwLock::new(StoreState {
                records: Vec::new(),
                keys: HashSet::new(),
                tree: None,
            }),
        }
    }

    /// Create a store holding `records`, validated as if appended in order
    pub fn with_records<I>(builder: TreeBuilder<H, C>, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
    {
        let store = Self::new(builder);
        store.extend(records)?;
        Ok(store)
    }

    pub fn builder(&self) -> &TreeBuilder<H, C> {
        &self.builder
    }

    /// Append a record and mark the tree stale.
    ///
    /// The record is encoded up front and its key checked for uniqueness, so
    /// a rejected record leaves the store unchanged and never breaks a later
    /// rebuild.
    pub fn append(&self, record: R) -> Result<()> {
        self.builder.leaf_hash(&record)?;

        let mut state = self.write()?;
        let key = record.key();
        Self::check_key(&state, &key)?;

        state.keys.insert(key);
        state.records.push(record);
        state.tree = None;
        debug!("Appended record, {} records pending rebuild", state.records.len());

        Ok(())
    }

    /// Run the checks `append` would, without appending.
    ///
    /// Callers that must commit a record elsewhere first (to disk, say) check
    /// it here, commit, then append. The verdict only holds while no other
    /// writer appends in between.
    pub fn check(&self, record: &R) -> Result<()> {
        self.builder.leaf_hash(record)?;
        Self::check_key(&*self.read()?, &record.key())
    }

    fn check_key(state: &StoreState<R>, key: &R::Key) -> Result<()> {
        if !state.keys.contains(key) {
            return Ok(());
        }

        let first = state
            .records
            .iter()
            .position(|r| &r.key() == key)
            .unwrap_or_default();
        Err(MerkleError::DuplicateKey {
            key: format!("{:?}", key),
            first,
            second: state.records.len(),
        })
    }

    /// Append records in order, stopping at the first rejected one
    pub fn extend<I>(&self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
    {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// The tree over the current records, rebuilt first if stale
    pub fn current_tree(&self) -> Result<Arc<Tree<R::Key>>> {
        if let Some(tree) = &self.read()?.tree {
            return Ok(Arc::clone(tree));
        }

        let mut state = self.write()?;

        // Another caller may have rebuilt while we waited for the lock
        if let Some(tree) = &state.tree {
            return Ok(Arc::clone(tree));
        }

        let tree = Arc::new(self.builder.build(state.records.iter())?);
        match tree.root() {
            Some(root) => info!(
                "Rebuilt tree with {} leaves, depth {}, root: {}",
                tree.leaf_count(),
                tree.depth(),
                root
            ),
            None => info!("Rebuilt empty tree"),
        }

        state.tree = Some(Arc::clone(&tree));
        Ok(tree)
    }

    /// Root of the current tree, `None` when there are no records
    pub fn root(&self) -> Result<Option<Digest>> {
        Ok(self.current_tree()?.root().copied())
    }

    /// Inclusion proof for `key` against the current tree
    pub fn prove(&self, key: &R::Key) -> Result<Proof> {
        self.current_tree()?.prove(key)
    }

    pub fn get(&self, key: &R::Key) -> Result<Option<R>>
    where
        R: Clone,
    {
        Ok(self.read()?.records.iter().find(|r| &r.key() == key).cloned())
    }

    /// Copy of the current record sequence
    pub fn records(&self) -> Result<Vec<R>>
    where
        R: Clone,
    {
        Ok(self.read()?.records.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// True when an append has happened since the last rebuild
    pub fn is_stale(&self) -> Result<bool> {
        Ok(self.read()?.tree.is_none())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState<R>>> {
        self.state.read().map_err(|_| MerkleError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState<R>>> {
        self.state.write().map_err(|_| MerkleError::LockPoisoned)
    }
}
