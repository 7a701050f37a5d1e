use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccountId, Amount};

/// Notification emitted by a committed ledger operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SavingEvent {
    /// A deposit was credited to `depositor`
    SavingSuccessful { depositor: AccountId, amount: Amount },

    /// `account` withdrew its full balance
    WithdrawalSuccessful { account: AccountId, amount: Amount },

    /// `sender` paid part of its balance out to `recipient`
    SavingSentOut {
        sender: AccountId,
        recipient: AccountId,
        amount: Amount,
    },
}

impl SavingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SavingEvent::SavingSuccessful { .. } => "SavingSuccessful",
            SavingEvent::WithdrawalSuccessful { .. } => "WithdrawalSuccessful",
            SavingEvent::SavingSentOut { .. } => "SavingSentOut",
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            SavingEvent::SavingSuccessful { amount, .. }
            | SavingEvent::WithdrawalSuccessful { amount, .. }
            | SavingEvent::SavingSentOut { amount, .. } => *amount,
        }
    }
}

impl fmt::Display for SavingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavingEvent::SavingSuccessful { depositor, amount } => {
                write!(f, "SavingSuccessful({}, {})", depositor, amount)
            }
            SavingEvent::WithdrawalSuccessful { account, amount } => {
                write!(f, "WithdrawalSuccessful({}, {})", account, amount)
            }
            SavingEvent::SavingSentOut { sender, recipient, amount } => {
                write!(f, "SavingSentOut({}, {}, {})", sender, recipient, amount)
            }
        }
    }
}
