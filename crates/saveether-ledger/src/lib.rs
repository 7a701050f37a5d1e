mod store;
mod config;
mod channel;
mod ledger;

pub use store::{BalanceStore, MemoryStore, StoreSnapshot};
pub use config::{EmptyWithdrawal, LedgerConfig};
pub use channel::{MemoryChannel, Payout, ReentryHook, TransferRejection, ValueChannel};
pub use ledger::{AuditReport, SaveEther};
