//! The ledger's record type

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use txm_core::Record;

/// A value transfer between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub from: String,
    pub to: String,
    pub amount: u64,
}

impl Record for Transaction {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }
}

impl Transaction {
    pub fn new(id: u64, from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Self {
            id,
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    /// Placeholder transfer `User{id} -> User{id+1}` with a random amount in
    /// 1..=10. The recipient of `u64::MAX` wraps around to `User0`.
    pub fn generated<R: Rng + ?Sized>(id: u64, rng: &mut R) -> Self {
        Self::new(
            id,
            format!("User{}", id),
            format!("User{}", id.wrapping_add(1)),
            rng.gen_range(1..=10),
        )
    }

    /// Copy with the amount raised by ten, for tamper demonstrations
    pub fn tampered(&self) -> Self {
        Self {
            amount: self.amount.saturating_add(10),
            ..self.clone()
        }
    }

    /// The four transfers a fresh demo ledger starts with
    pub fn seed() -> Vec<Transaction> {
        vec![
            Transaction::new(1, "Alice", "Bob", 5),
            Transaction::new(2, "Bob", "Charlie", 3),
            Transaction::new(3, "Charlie", "Dave", 8),
            Transaction::new(4, "Dave", "Alice", 2),
        ]
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} -> {}: {} ETH", self.id, self.from, self.to, self.amount)
    }
}
