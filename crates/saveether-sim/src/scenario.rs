use saveether_ledger::LedgerConfig;
use saveether_types::{AccountId, Amount, Result, SavingsError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Account reference inside a scenario file: a label (`"alice"`), a hex
/// address, or `"null"` for the zero address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRef(String);

impl AccountRef {
    pub fn new(s: impl Into<String>) -> Self {
        AccountRef(s.into())
    }

    pub fn null() -> Self {
        AccountRef("null".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resolve(&self) -> Result<AccountId> {
        match self.0.as_str() {
            "" => Err(SavingsError::InvalidAccountId("empty account reference".to_string())),
            "null" => Ok(AccountId::ZERO),
            s if s.starts_with("0x") || s.starts_with("0X") => AccountId::from_hex(s),
            label => Ok(AccountId::from_label(label)),
        }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountRef {
    fn from(s: &str) -> Self {
        AccountRef(s.to_string())
    }
}

/// What a recipient does when it gets paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ReentryAction {
    /// Withdraw its own balance again
    Withdraw,
    /// Send part of its own balance to `recipient`
    SendOut { recipient: AccountRef, amount: Amount },
}

/// One scripted call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Deposit { caller: AccountRef, amount: Amount },
    Withdraw { caller: AccountRef },
    SendOut {
        caller: AccountRef,
        recipient: AccountRef,
        amount: Amount,
    },
    Check {
        account: AccountRef,
        #[serde(default)]
        expect: Option<Amount>,
    },
    RefusePayments { account: AccountRef },
    AcceptPayments { account: AccountRef },
    /// Install reentrant recipient code for `account`
    Reenter {
        account: AccountRef,
        action: ReentryAction,
        /// Reject the payment when the nested call fails
        #[serde(default)]
        reject_on_error: bool,
    },
}

impl Step {
    pub fn describe(&self) -> String {
        match self {
            Step::Deposit { caller, amount } => format!("deposit {} from {}", amount, caller),
            Step::Withdraw { caller } => format!("withdraw by {}", caller),
            Step::SendOut { caller, recipient, amount } => {
                format!("send out {} from {} to {}", amount, caller, recipient)
            }
            Step::Check { account, .. } => format!("check savings of {}", account),
            Step::RefusePayments { account } => format!("{} refuses payments", account),
            Step::AcceptPayments { account } => format!("{} accepts payments", account),
            Step::Reenter { account, action, .. } => match action {
                ReentryAction::Withdraw => format!("{} re-enters withdraw on receipt", account),
                ReentryAction::SendOut { recipient, amount } => format!(
                    "{} re-enters send out {} to {} on receipt",
                    account, amount, recipient
                ),
            },
        }
    }
}

/// Expected outcomes for scenario validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedOutcomes {
    /// Ledger balances after the last step
    pub final_balances: BTreeMap<AccountRef, Amount>,

    /// Value received through the channel by the end of the run
    pub received: BTreeMap<AccountRef, Amount>,

    /// Indices of the steps that must fail; `None` skips the check
    pub failed_steps: Option<Vec<usize>>,
}

/// Scripted ledger session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Option<LedgerConfig>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expected: Option<ExpectedOutcomes>,
}

impl Scenario {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let scenario = serde_json::from_str(&raw).map_err(|e| {
            SavingsError::SerializationError(format!("{}: {}", path.display(), e))
        })?;
        Ok(scenario)
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &["deposit_withdraw", "send_out", "reentrant_withdraw", "refused_payout"]
    }

    pub fn builtin(name: &str) -> Option<Scenario> {
        match name {
            "deposit_withdraw" => Some(Self::deposit_withdraw()),
            "send_out" => Some(Self::send_out()),
            "reentrant_withdraw" => Some(Self::reentrant_withdraw()),
            "refused_payout" => Some(Self::refused_payout()),
            _ => None,
        }
    }

    /// Deposit 4, withdraw everything, withdraw again
    pub fn deposit_withdraw() -> Self {
        Scenario {
            name: "deposit_withdraw".to_string(),
            description: "Deposit 4 wei, withdraw it all, then withdraw an empty balance".to_string(),
            config: None,
            steps: vec![
                Step::Deposit { caller: "owner".into(), amount: Amount::from_wei(4) },
                Step::Check { account: "owner".into(), expect: Some(Amount::from_wei(4)) },
                Step::Withdraw { caller: "owner".into() },
                Step::Check { account: "owner".into(), expect: Some(Amount::ZERO) },
                Step::Withdraw { caller: "owner".into() },
            ],
            expected: Some(ExpectedOutcomes {
                final_balances: BTreeMap::from([("owner".into(), Amount::ZERO)]),
                received: BTreeMap::from([("owner".into(), Amount::from_wei(4))]),
                failed_steps: Some(vec![]),
            }),
        }
    }

    /// Deposit 4, send 3 to another account, try to overspend and pay the null address
    pub fn send_out() -> Self {
        Scenario {
            name: "send_out".to_string(),
            description: "Send part of a balance out; overspending and the null recipient fail".to_string(),
            config: None,
            steps: vec![
                Step::Deposit { caller: "owner".into(), amount: Amount::from_wei(4) },
                Step::SendOut {
                    caller: "owner".into(),
                    recipient: "other".into(),
                    amount: Amount::from_wei(3),
                },
                Step::Check { account: "owner".into(), expect: Some(Amount::from_wei(1)) },
                Step::SendOut {
                    caller: "owner".into(),
                    recipient: "other".into(),
                    amount: Amount::from_wei(2),
                },
                Step::SendOut {
                    caller: "owner".into(),
                    recipient: AccountRef::null(),
                    amount: Amount::from_wei(1),
                },
            ],
            expected: Some(ExpectedOutcomes {
                final_balances: BTreeMap::from([
                    ("owner".into(), Amount::from_wei(1)),
                    ("other".into(), Amount::ZERO),
                ]),
                received: BTreeMap::from([("other".into(), Amount::from_wei(3))]),
                failed_steps: Some(vec![3, 4]),
            }),
        }
    }

    /// The payee re-enters withdraw while being paid and gets nothing extra
    pub fn reentrant_withdraw() -> Self {
        Scenario {
            name: "reentrant_withdraw".to_string(),
            description: "A recipient calls withdraw again from inside its payout".to_string(),
            config: None,
            steps: vec![
                Step::Reenter {
                    account: "attacker".into(),
                    action: ReentryAction::Withdraw,
                    reject_on_error: false,
                },
                Step::Deposit { caller: "victim".into(), amount: Amount::from_wei(10) },
                Step::Deposit { caller: "attacker".into(), amount: Amount::from_wei(4) },
                Step::Withdraw { caller: "attacker".into() },
                Step::Check { account: "attacker".into(), expect: Some(Amount::ZERO) },
                Step::Check { account: "victim".into(), expect: Some(Amount::from_wei(10)) },
            ],
            expected: Some(ExpectedOutcomes {
                final_balances: BTreeMap::from([
                    ("attacker".into(), Amount::ZERO),
                    ("victim".into(), Amount::from_wei(10)),
                ]),
                received: BTreeMap::from([("attacker".into(), Amount::from_wei(4))]),
                failed_steps: Some(vec![]),
            }),
        }
    }

    /// A payee refuses payment and the withdrawal is rolled back
    pub fn refused_payout() -> Self {
        Scenario {
            name: "refused_payout".to_string(),
            description: "A refused payment reverts the withdrawal; a later retry succeeds".to_string(),
            config: Some(LedgerConfig {
                max_call_depth: 8,
                ..LedgerConfig::default()
            }),
            steps: vec![
                Step::Deposit { caller: "owner".into(), amount: Amount::from_wei(4) },
                Step::RefusePayments { account: "owner".into() },
                Step::Withdraw { caller: "owner".into() },
                Step::Check { account: "owner".into(), expect: Some(Amount::from_wei(4)) },
                Step::AcceptPayments { account: "owner".into() },
                Step::Withdraw { caller: "owner".into() },
            ],
            expected: Some(ExpectedOutcomes {
                final_balances: BTreeMap::from([("owner".into(), Amount::ZERO)]),
                received: BTreeMap::from([("owner".into(), Amount::from_wei(4))]),
                failed_steps: Some(vec![2]),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_ref_resolution() {
        assert_eq!(AccountRef::null().resolve().unwrap(), AccountId::ZERO);
        assert_eq!(
            AccountRef::from("alice").resolve().unwrap(),
            AccountId::from_label("alice")
        );

        let hex = AccountId::from_label("bob").to_string();
        assert_eq!(
            AccountRef::new(hex).resolve().unwrap(),
            AccountId::from_label("bob")
        );

        assert!(AccountRef::from("0x12").resolve().is_err());
        assert!(AccountRef::from("").resolve().is_err());
    }

    #[test]
    fn test_step_json_shape() {
        let json = r#"[
            { "op": "deposit", "caller": "owner", "amount": 4 },
            { "op": "send_out", "caller": "owner", "recipient": "other", "amount": 3 },
            { "op": "check", "account": "owner" },
            { "op": "reenter", "account": "other", "action": { "call": "send_out", "recipient": "owner", "amount": 1 } }
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(json).unwrap();

        assert_eq!(
            steps[0],
            Step::Deposit { caller: "owner".into(), amount: Amount::from_wei(4) }
        );
        assert_eq!(steps[2], Step::Check { account: "owner".into(), expect: None });
        assert!(matches!(
            &steps[3],
            Step::Reenter { action: ReentryAction::SendOut { .. }, reject_on_error: false, .. }
        ));
    }

    #[test]
    fn test_builtins_are_registered() {
        for name in Scenario::builtin_names() {
            let scenario = Scenario::builtin(name).unwrap();
            assert_eq!(scenario.name, *name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::builtin("nope").is_none());
    }
}
