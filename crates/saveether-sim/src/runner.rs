use crate::{ReentryAction, Scenario, Step};
use saveether_ledger::{AuditReport, LedgerConfig, MemoryChannel, SaveEther, TransferRejection};
use saveether_types::{AccountId, Amount, Result, SavingEvent};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: Step,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Ok {
        /// Value paid out by the step, for withdraw and send-out
        #[serde(skip_serializing_if = "Option::is_none")]
        paid: Option<Amount>,
        /// Balance read by a check step
        #[serde(skip_serializing_if = "Option::is_none")]
        balance: Option<Amount>,
    },
    Failed {
        error: String,
    },
}

impl StepStatus {
    fn done() -> Self {
        StepStatus::Ok { paid: None, balance: None }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepStatus::Failed { .. })
    }
}

/// A call made by reentry code while it was being paid.
/// Recorded when attempted, whether or not the enclosing operation later committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedCall {
    /// Index of the top-level step during which the call happened
    pub step: usize,
    pub account: AccountId,
    pub action: ReentryAction,
    pub depth: usize,
    /// Balance of `account` seen on entry
    pub observed_balance: Amount,
    pub paid: Option<Amount>,
    pub error: Option<String>,
}

/// Result of a scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimResult {
    pub scenario_name: String,
    pub outcomes: Vec<StepOutcome>,
    pub nested_calls: Vec<NestedCall>,
    pub final_balances: BTreeMap<AccountId, Amount>,
    pub received: BTreeMap<AccountId, Amount>,
    pub events: Vec<SavingEvent>,
    pub audit: AuditReport,
    /// Human labels of the accounts referenced by the scenario
    pub labels: BTreeMap<AccountId, String>,
    pub passed: bool,
    pub failure_reasons: Vec<String>,
}

impl SimResult {
    pub fn label(&self, account: &AccountId) -> String {
        self.labels
            .get(account)
            .cloned()
            .unwrap_or_else(|| account.to_string())
    }
}

/// Replays scenarios against a fresh ledger and value channel
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    config_override: Option<LedgerConfig>,
}

impl ScenarioRunner {
    pub fn new() -> Self {
        Self { config_override: None }
    }

    /// Use `config` instead of whatever the scenario embeds
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            config_override: Some(config),
        }
    }

    /// Run a scenario. Ledger failures are recorded per step; only a malformed
    /// scenario (bad account reference, invalid config) returns `Err`.
    pub fn run(&self, scenario: &Scenario) -> Result<SimResult> {
        let config = self
            .config_override
            .clone()
            .or_else(|| scenario.config.clone())
            .unwrap_or_default();

        tracing::info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");

        let mut ledger = SaveEther::with_config(config)?;
        let labels = collect_labels(scenario)?;
        let mut channel: MemoryChannel = MemoryChannel::new();
        let nested: Rc<RefCell<Vec<NestedCall>>> = Rc::new(RefCell::new(Vec::new()));
        let current_step = Rc::new(RefCell::new(0usize));

        let mut outcomes = Vec::with_capacity(scenario.steps.len());
        let mut failure_reasons = Vec::new();

        for (index, step) in scenario.steps.iter().enumerate() {
            *current_step.borrow_mut() = index;

            let status = match step {
                Step::Deposit { caller, amount } => {
                    let caller = caller.resolve()?;
                    status_of(ledger.deposit(&caller, *amount).map(|_| StepStatus::done()))
                }
                Step::Withdraw { caller } => {
                    let caller = caller.resolve()?;
                    status_of(ledger.withdraw(&caller, &mut channel).map(|paid| StepStatus::Ok {
                        paid: Some(paid),
                        balance: None,
                    }))
                }
                Step::SendOut { caller, recipient, amount } => {
                    let caller = caller.resolve()?;
                    let recipient = recipient.resolve()?;
                    status_of(
                        ledger
                            .send_out_saving(&caller, &recipient, *amount, &mut channel)
                            .map(|_| StepStatus::Ok {
                                paid: Some(*amount),
                                balance: None,
                            }),
                    )
                }
                Step::Check { account, expect } => {
                    let resolved = account.resolve()?;
                    let balance = ledger.check_savings(&resolved);
                    if let Some(expected) = expect {
                        if *expected != balance {
                            failure_reasons.push(format!(
                                "step {}: expected {} to hold {}, found {}",
                                index, account, expected, balance
                            ));
                        }
                    }
                    StepStatus::Ok { paid: None, balance: Some(balance) }
                }
                Step::RefusePayments { account } => {
                    channel.refuse(account.resolve()?);
                    StepStatus::done()
                }
                Step::AcceptPayments { account } => {
                    channel.accept(&account.resolve()?);
                    StepStatus::done()
                }
                Step::Reenter { account, action, reject_on_error } => {
                    install_reentry(
                        &mut channel,
                        account.resolve()?,
                        action.clone(),
                        *reject_on_error,
                        Rc::clone(&nested),
                        Rc::clone(&current_step),
                    )?;
                    StepStatus::done()
                }
            };

            if let StepStatus::Failed { error } = &status {
                tracing::debug!(index, step = %step.describe(), %error, "step failed");
            }
            outcomes.push(StepOutcome {
                index,
                step: step.clone(),
                status,
            });
        }

        let audit = ledger.audit()?;
        if !audit.is_conserved() {
            failure_reasons.push(format!(
                "conservation violated: tracked {} > custody {}",
                audit.tracked_total, audit.custody
            ));
        }

        let final_balances: BTreeMap<AccountId, Amount> = ledger
            .accounts()
            .into_iter()
            .map(|account| (account, ledger.check_savings(&account)))
            .collect();

        if let Some(expected) = &scenario.expected {
            for (account, amount) in &expected.final_balances {
                let actual = ledger.check_savings(&account.resolve()?);
                if actual != *amount {
                    failure_reasons.push(format!(
                        "final balance of {}: expected {}, found {}",
                        account, amount, actual
                    ));
                }
            }
            for (account, amount) in &expected.received {
                let actual = channel.received(&account.resolve()?);
                if actual != *amount {
                    failure_reasons.push(format!(
                        "received by {}: expected {}, found {}",
                        account, amount, actual
                    ));
                }
            }
            if let Some(failed) = &expected.failed_steps {
                let expected_failed: BTreeSet<usize> = failed.iter().copied().collect();
                let actual_failed: BTreeSet<usize> = outcomes
                    .iter()
                    .filter(|o| o.status.is_failed())
                    .map(|o| o.index)
                    .collect();
                if expected_failed != actual_failed {
                    failure_reasons.push(format!(
                        "failed steps: expected {:?}, found {:?}",
                        expected_failed, actual_failed
                    ));
                }
            }
        }

        let passed = failure_reasons.is_empty();
        if passed {
            tracing::info!(scenario = %scenario.name, "scenario passed");
        } else {
            tracing::warn!(scenario = %scenario.name, failures = failure_reasons.len(), "scenario failed");
        }

        let nested_calls = nested.borrow().clone();
        Ok(SimResult {
            scenario_name: scenario.name.clone(),
            outcomes,
            nested_calls,
            final_balances,
            received: channel.received_by_account().clone(),
            events: ledger.take_events(),
            audit,
            labels,
            passed,
            failure_reasons,
        })
    }
}

fn status_of(result: Result<StepStatus>) -> StepStatus {
    result.unwrap_or_else(|err| StepStatus::Failed {
        error: err.to_string(),
    })
}

/// Every account named in the scenario, by resolved address
fn collect_labels(scenario: &Scenario) -> Result<BTreeMap<AccountId, String>> {
    let mut refs = Vec::new();
    for step in &scenario.steps {
        match step {
            Step::Deposit { caller, .. } | Step::Withdraw { caller } => refs.push(caller),
            Step::SendOut { caller, recipient, .. } => {
                refs.push(caller);
                refs.push(recipient);
            }
            Step::Check { account, .. }
            | Step::RefusePayments { account }
            | Step::AcceptPayments { account } => refs.push(account),
            Step::Reenter { account, action, .. } => {
                refs.push(account);
                if let ReentryAction::SendOut { recipient, .. } = action {
                    refs.push(recipient);
                }
            }
        }
    }

    let mut labels = BTreeMap::new();
    for account_ref in refs {
        labels.insert(account_ref.resolve()?, account_ref.as_str().to_string());
    }
    Ok(labels)
}

/// Make `account` call back into the ledger with `action` whenever it is paid
fn install_reentry(
    channel: &mut MemoryChannel,
    account: AccountId,
    action: ReentryAction,
    reject_on_error: bool,
    log: Rc<RefCell<Vec<NestedCall>>>,
    current_step: Rc<RefCell<usize>>,
) -> Result<()> {
    let target = match &action {
        ReentryAction::Withdraw => None,
        ReentryAction::SendOut { recipient, amount } => Some((recipient.resolve()?, *amount)),
    };

    channel.on_receive(account, move |ledger, channel, _amount| {
        let depth = ledger.depth();
        let observed_balance = ledger.check_savings(&account);
        let outcome = match target {
            None => ledger.withdraw(&account, channel),
            Some((recipient, amount)) => ledger
                .send_out_saving(&account, &recipient, amount, channel)
                .map(|_| amount),
        };

        log.borrow_mut().push(NestedCall {
            step: *current_step.borrow(),
            account,
            action: action.clone(),
            depth,
            observed_balance,
            paid: outcome.as_ref().ok().copied(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        });

        match outcome {
            Err(err) if reject_on_error => Err(TransferRejection::from(err)),
            _ => Ok(()),
        }
    });
    Ok(())
}
