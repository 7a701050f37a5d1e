use saveether_types::{AccountId, Amount, SavingsError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::ledger::SaveEther;
use crate::store::{BalanceStore, MemoryStore};

/// Why the environment refused to move value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferRejection {
    #[error("recipient {0} refused the payment")]
    Refused(AccountId),

    #[error("recipient callback failed: {0}")]
    Callback(String),

    #[error("channel error: {0}")]
    Channel(String),
}

impl From<SavingsError> for TransferRejection {
    fn from(err: SavingsError) -> Self {
        TransferRejection::Callback(err.to_string())
    }
}

/// The environment's value-transfer mechanism.
///
/// `send_value` is handed the ledger mutably: the recipient may run arbitrary
/// code on receipt, including calls back into the ledger. Returning `Err`
/// makes the calling ledger operation revert.
pub trait ValueChannel<S: BalanceStore = MemoryStore> {
    fn send_value(
        &mut self,
        ledger: &mut SaveEther<S>,
        to: &AccountId,
        amount: Amount,
    ) -> std::result::Result<(), TransferRejection>;
}

/// Code run by a recipient when it is paid
pub type ReentryHook<S = MemoryStore> = Box<
    dyn FnMut(&mut SaveEther<S>, &mut MemoryChannel<S>, Amount) -> std::result::Result<(), TransferRejection>,
>;

/// One value transfer that reached its recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: AccountId,
    pub amount: Amount,
    /// Ledger call depth at which the payout was issued
    pub depth: usize,
}

/// In-memory value channel.
/// Records what each account received, can refuse payments to chosen accounts,
/// and runs per-account reentry hooks on receipt.
pub struct MemoryChannel<S: BalanceStore = MemoryStore> {
    received: BTreeMap<AccountId, Amount>,
    refusing: BTreeSet<AccountId>,
    hooks: BTreeMap<AccountId, ReentryHook<S>>,
    payouts: Vec<Payout>,
}

impl<S: BalanceStore> MemoryChannel<S> {
    pub fn new() -> Self {
        MemoryChannel {
            received: BTreeMap::new(),
            refusing: BTreeSet::new(),
            hooks: BTreeMap::new(),
            payouts: Vec::new(),
        }
    }

    /// Make `account` reject every incoming payment
    pub fn refuse(&mut self, account: AccountId) {
        self.refusing.insert(account);
    }

    pub fn accept(&mut self, account: &AccountId) {
        self.refusing.remove(account);
    }

    /// Install the code `account` runs when paid.
    ///
    /// The hook is detached while it runs, so payouts to the same account
    /// from inside the hook do not trigger it again.
    pub fn on_receive<F>(&mut self, account: AccountId, hook: F)
    where
        F: FnMut(&mut SaveEther<S>, &mut MemoryChannel<S>, Amount) -> std::result::Result<(), TransferRejection>
            + 'static,
    {
        self.hooks.insert(account, Box::new(hook));
    }

    pub fn clear_hook(&mut self, account: &AccountId) {
        self.hooks.remove(account);
    }

    /// Total value `account` has received through this channel
    pub fn received(&self, account: &AccountId) -> Amount {
        self.received.get(account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn received_by_account(&self) -> &BTreeMap<AccountId, Amount> {
        &self.received
    }

    pub fn total_received(&self) -> saveether_types::Result<Amount> {
        Amount::checked_sum(self.received.values().copied())
    }

    /// Completed payouts, in the order they were issued
    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    fn credit(&mut self, to: &AccountId, amount: Amount) -> std::result::Result<(), TransferRejection> {
        let entry = self.received.entry(*to).or_insert(Amount::ZERO);
        *entry = entry
            .checked_add(amount)
            .map_err(|e| TransferRejection::Channel(e.to_string()))?;
        Ok(())
    }

    /// Undo every payout recorded after `mark`
    fn rollback(&mut self, mark: usize) {
        for payout in self.payouts.drain(mark..).rev() {
            if let Some(entry) = self.received.get_mut(&payout.recipient) {
                *entry = entry.checked_sub(payout.amount).unwrap_or(Amount::ZERO);
            }
        }
    }
}

impl<S: BalanceStore> Default for MemoryChannel<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BalanceStore> fmt::Debug for MemoryChannel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("received", &self.received)
            .field("refusing", &self.refusing)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("payouts", &self.payouts)
            .finish()
    }
}

impl<S: BalanceStore> ValueChannel<S> for MemoryChannel<S> {
    fn send_value(
        &mut self,
        ledger: &mut SaveEther<S>,
        to: &AccountId,
        amount: Amount,
    ) -> std::result::Result<(), TransferRejection> {
        if self.refusing.contains(to) {
            return Err(TransferRejection::Refused(*to));
        }

        let mark = self.payouts.len();
        self.credit(to, amount)?;
        self.payouts.push(Payout {
            recipient: *to,
            amount,
            depth: ledger.depth(),
        });

        if let Some(mut hook) = self.hooks.remove(to) {
            let outcome = hook(ledger, self, amount);
            // a hook installed from inside the hook wins
            self.hooks.entry(*to).or_insert(hook);
            if let Err(rejection) = outcome {
                self.rollback(mark);
                return Err(rejection);
            }
        }

        Ok(())
    }
}
