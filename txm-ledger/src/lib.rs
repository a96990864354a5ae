//! txm ledger
//!
//! Host application for the txm Merkle engine: an append-only ledger of
//! transactions with persistent storage, self-contained inclusion receipts
//! and a text rendering of the tree.

pub mod config;
pub mod ledger;
pub mod receipt;
pub mod render;
pub mod storage;
pub mod transaction;

pub use config::LedgerConfig;
pub use ledger::{Ledger, ReceiptCheck};
pub use receipt::Receipt;
pub use storage::LedgerStorage;
pub use transaction::Transaction;

use thiserror::Error;
use txm_core::MerkleError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Transaction ids exhausted, {} has been assigned", u64::MAX)]
    IdsExhausted,

    #[error("Malformed receipt: {0}")]
    MalformedReceipt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
