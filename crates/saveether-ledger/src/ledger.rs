use saveether_types::{AccountId, Amount, Result, SavingEvent, SavingsError};
use serde::{Deserialize, Serialize};

use crate::channel::ValueChannel;
use crate::config::{EmptyWithdrawal, LedgerConfig};
use crate::store::{BalanceStore, MemoryStore};

/// Running totals of value that entered and left the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Totals {
    deposited: Amount,
    paid_out: Amount,
}

/// Prior value of a balance register, `None` if the entry did not exist
type JournalEntry = (AccountId, Option<Amount>);

/// Marks taken before an operation runs. Reverting undoes the journal back to
/// `journal_len`, so a checkpoint costs the same however many accounts exist.
struct Checkpoint {
    journal_len: usize,
    totals: Totals,
    events_len: usize,
}

/// Conservation check over the whole ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub accounts: usize,
    pub tracked_total: Amount,
    pub total_deposited: Amount,
    pub total_paid_out: Amount,
    /// Value held by the ledger: deposited minus paid out
    pub custody: Amount,
}

impl AuditReport {
    /// Tracked balances never exceed what the ledger holds
    pub fn is_conserved(&self) -> bool {
        self.total_paid_out <= self.total_deposited && self.tracked_total <= self.custody
    }
}

/// Custodial savings ledger.
///
/// Every mutating operation is all-or-nothing: state is checkpointed on entry
/// and restored if the operation fails, including anything done by reentrant
/// calls made while it was running. Balance mutations are committed before
/// value leaves through the channel, so a reentrant call only ever sees the
/// already-debited balance.
#[derive(Debug)]
pub struct SaveEther<S: BalanceStore = MemoryStore> {
    store: S,
    config: LedgerConfig,
    totals: Totals,
    events: Vec<SavingEvent>,
    /// Undo log of balance writes made by operations still in flight
    journal: Vec<JournalEntry>,
    depth: usize,
}

impl SaveEther<MemoryStore> {
    /// Create an empty in-memory ledger with the default config
    pub fn new() -> Self {
        Self::from_parts(MemoryStore::new(), LedgerConfig::default(), Amount::ZERO)
    }

    /// Create an empty in-memory ledger. Fails with `ConfigError` if `config` is invalid.
    pub fn with_config(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(MemoryStore::new(), config, Amount::ZERO))
    }
}

impl Default for SaveEther<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BalanceStore> SaveEther<S> {
    /// Host the ledger on `store`. Balances already in the store are treated as
    /// previously deposited.
    pub fn with_store(store: S, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let deposited = store.tracked_total()?;
        Ok(Self::from_parts(store, config, deposited))
    }

    fn from_parts(store: S, config: LedgerConfig, deposited: Amount) -> Self {
        SaveEther {
            store,
            config,
            totals: Totals {
                deposited,
                paid_out: Amount::ZERO,
            },
            events: Vec::new(),
            journal: Vec::new(),
            depth: 0,
        }
    }

    /// Credit `amount` (the value attached to the call) to `caller`
    pub fn deposit(&mut self, caller: &AccountId, amount: Amount) -> Result<()> {
        self.atomically("deposit", |ledger| {
            ensure_caller(caller)?;
            if amount.is_zero() {
                return Err(SavingsError::ZeroAmount);
            }

            let balance = ledger.store.balance(caller).checked_add(amount)?;
            let deposited = ledger.totals.deposited.checked_add(amount)?;

            ledger.write_balance(caller, balance);
            ledger.totals.deposited = deposited;
            ledger.emit(SavingEvent::SavingSuccessful {
                depositor: *caller,
                amount,
            });

            tracing::info!(%caller, %amount, %balance, "deposit");
            Ok(())
        })
    }

    /// Current balance of `account`, zero if it never deposited
    pub fn check_savings(&self, account: &AccountId) -> Amount {
        self.store.balance(account)
    }

    /// Pay the caller's whole balance out to the caller. Returns the amount paid.
    pub fn withdraw<C>(&mut self, caller: &AccountId, channel: &mut C) -> Result<Amount>
    where
        C: ValueChannel<S> + ?Sized,
    {
        self.atomically("withdraw", |ledger| {
            ensure_caller(caller)?;

            let amount = ledger.store.balance(caller);
            if amount.is_zero() {
                return match ledger.config.empty_withdrawal {
                    EmptyWithdrawal::NoOp => {
                        tracing::debug!(%caller, "withdraw of empty balance");
                        Ok(Amount::ZERO)
                    }
                    EmptyWithdrawal::Reject => Err(SavingsError::InsufficientBalance {
                        account: *caller,
                        available: Amount::ZERO,
                        requested: Amount::ZERO,
                    }),
                };
            }

            let paid_out = ledger.totals.paid_out.checked_add(amount)?;
            ledger.write_balance(caller, Amount::ZERO);
            ledger.totals.paid_out = paid_out;

            ledger.pay(channel, caller, amount)?;

            if ledger.config.emit_payout_events {
                ledger.emit(SavingEvent::WithdrawalSuccessful {
                    account: *caller,
                    amount,
                });
            }
            tracing::info!(%caller, %amount, "withdraw");
            Ok(amount)
        })
    }

    /// Pay `amount` of the caller's balance out to `recipient`
    pub fn send_out_saving<C>(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: Amount,
        channel: &mut C,
    ) -> Result<()>
    where
        C: ValueChannel<S> + ?Sized,
    {
        self.atomically("send_out_saving", |ledger| {
            ensure_caller(caller)?;
            if recipient.is_zero() {
                return Err(SavingsError::InvalidRecipient);
            }

            let available = ledger.store.balance(caller);
            let remaining = available.checked_sub(amount).ok_or(
                SavingsError::InsufficientBalance {
                    account: *caller,
                    available,
                    requested: amount,
                },
            )?;
            if amount.is_zero() {
                return Ok(());
            }

            let paid_out = ledger.totals.paid_out.checked_add(amount)?;
            ledger.write_balance(caller, remaining);
            ledger.totals.paid_out = paid_out;

            ledger.pay(channel, recipient, amount)?;

            if ledger.config.emit_payout_events {
                ledger.emit(SavingEvent::SavingSentOut {
                    sender: *caller,
                    recipient: *recipient,
                    amount,
                });
            }
            tracing::info!(%caller, %recipient, %amount, remaining = %remaining, "send out saving");
            Ok(())
        })
    }

    /// Accounts that have ever deposited
    pub fn accounts(&self) -> Vec<AccountId> {
        self.store.accounts()
    }

    pub fn total_deposited(&self) -> Amount {
        self.totals.deposited
    }

    pub fn total_paid_out(&self) -> Amount {
        self.totals.paid_out
    }

    /// Value the ledger currently holds on behalf of its accounts
    pub fn custody(&self) -> Amount {
        debug_assert!(
            self.totals.paid_out <= self.totals.deposited,
            "paid out {} exceeds deposited {}",
            self.totals.paid_out,
            self.totals.deposited
        );
        self.totals
            .deposited
            .checked_sub(self.totals.paid_out)
            .unwrap_or(Amount::ZERO)
    }

    /// Notifications of committed operations, oldest first
    pub fn events(&self) -> &[SavingEvent] {
        &self.events
    }

    /// Drain the notification log. Returns nothing while an operation is in
    /// flight, since its events are not committed yet.
    pub fn take_events(&mut self) -> Vec<SavingEvent> {
        if self.depth > 0 {
            tracing::debug!(depth = self.depth, "event log not drained during a call");
            return Vec::new();
        }
        std::mem::take(&mut self.events)
    }

    pub fn audit(&self) -> Result<AuditReport> {
        Ok(AuditReport {
            accounts: self.store.accounts().len(),
            tracked_total: self.store.tracked_total()?,
            total_deposited: self.totals.deposited,
            total_paid_out: self.totals.paid_out,
            custody: self.custody(),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of ledger calls currently executing (0 between top-level calls)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `op` as one all-or-nothing unit
    fn atomically<T, F>(&mut self, name: &'static str, op: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if self.depth >= self.config.max_call_depth {
            return Err(SavingsError::CallDepthExceeded(self.config.max_call_depth));
        }

        let checkpoint = self.checkpoint();
        self.depth += 1;
        let result = op(self);
        self.depth -= 1;

        match &result {
            Err(err) => {
                tracing::warn!(operation = name, depth = self.depth, error = %err, "reverting");
                self.revert(checkpoint);
            }
            // top-level commit: nothing left that could revert these writes
            Ok(_) if self.depth == 0 => self.journal.clear(),
            Ok(_) => {}
        }
        result
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            journal_len: self.journal.len(),
            totals: self.totals,
            events_len: self.events.len(),
        }
    }

    fn revert(&mut self, checkpoint: Checkpoint) {
        for (account, prior) in self.journal.drain(checkpoint.journal_len..).rev() {
            match prior {
                Some(amount) => self.store.set_balance(&account, amount),
                None => self.store.remove_balance(&account),
            }
        }
        self.totals = checkpoint.totals;
        self.events.truncate(checkpoint.events_len);
    }

    /// Write a balance register, journaling its prior value
    fn write_balance(&mut self, account: &AccountId, amount: Amount) {
        let prior = if self.store.contains(account) {
            Some(self.store.balance(account))
        } else {
            None
        };
        self.journal.push((*account, prior));
        self.store.set_balance(account, amount);
    }

    /// Pending undo entries; empty between top-level calls
    #[cfg(test)]
    pub(crate) fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Hand `amount` to the channel. Must be the last fallible step of an operation.
    fn pay<C>(&mut self, channel: &mut C, to: &AccountId, amount: Amount) -> Result<()>
    where
        C: ValueChannel<S> + ?Sized,
    {
        tracing::debug!(%to, %amount, depth = self.depth, "issuing payout");
        channel
            .send_value(self, to, amount)
            .map_err(|rejection| SavingsError::TransferFailed {
                recipient: *to,
                reason: rejection.to_string(),
            })
    }

    fn emit(&mut self, event: SavingEvent) {
        tracing::debug!(event = %event, "emit");
        self.events.push(event);
    }
}

fn ensure_caller(caller: &AccountId) -> Result<()> {
    if caller.is_zero() {
        return Err(SavingsError::InvalidCaller);
    }
    Ok(())
}
