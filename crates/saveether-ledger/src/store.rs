use saveether_types::{AccountId, Amount, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage for the balance registers.
/// Provides an abstraction that can be implemented for in-memory, database, or on-chain storage
pub trait BalanceStore {
    /// Balance of `account`, zero if it has never been written
    fn balance(&self, account: &AccountId) -> Amount;

    /// Overwrite the balance of `account`, creating the entry if needed
    fn set_balance(&mut self, account: &AccountId, amount: Amount);

    /// Drop the entry for `account`, used to undo its creation
    fn remove_balance(&mut self, account: &AccountId);

    /// Whether `account` has an entry (it has deposited at some point)
    fn contains(&self, account: &AccountId) -> bool;

    /// List all accounts with an entry
    fn accounts(&self) -> Vec<AccountId>;

    /// Sum of all tracked balances
    fn tracked_total(&self) -> Result<Amount> {
        Amount::checked_sum(self.accounts().iter().map(|account| self.balance(account)))
    }

    /// Copy of all balances, for export
    fn snapshot(&self) -> StoreSnapshot;

    /// Replace all balances with an exported snapshot
    fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<()>;
}

/// Exported copy of the balance registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub balances: BTreeMap<AccountId, Amount>,
}

/// In-memory balance store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    balances: BTreeMap<AccountId, Amount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            balances: BTreeMap::new(),
        }
    }

    /// Initialize with pre-funded accounts
    pub fn with_balances(balances: BTreeMap<AccountId, Amount>) -> Self {
        MemoryStore { balances }
    }
}

impl BalanceStore for MemoryStore {
    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    fn set_balance(&mut self, account: &AccountId, amount: Amount) {
        self.balances.insert(*account, amount);
    }

    fn remove_balance(&mut self, account: &AccountId) {
        self.balances.remove(account);
    }

    fn contains(&self, account: &AccountId) -> bool {
        self.balances.contains_key(account)
    }

    fn accounts(&self) -> Vec<AccountId> {
        self.balances.keys().copied().collect()
    }

    fn tracked_total(&self) -> Result<Amount> {
        Amount::checked_sum(self.balances.values().copied())
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            balances: self.balances.clone(),
        }
    }

    fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<()> {
        self.balances = snapshot.balances.clone();
        Ok(())
    }
}
