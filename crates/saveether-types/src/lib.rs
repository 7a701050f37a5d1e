mod account;
mod amount;
mod event;
mod error;

pub use account::AccountId;
pub use amount::Amount;
pub use event::SavingEvent;
pub use error::{SavingsError, Result};

#[cfg(test)]
mod tests;
