use anyhow::{bail, Context};
use clap::Parser;
use saveether_ledger::LedgerConfig;
use saveether_sim::{Scenario, ScenarioRunner, SimResult, StepStatus};
use tracing_subscriber::EnvFilter;

/// Replay a scripted session against a fresh SaveEther ledger
#[derive(Debug, Parser)]
#[command(name = "saveether-sim", version)]
struct Args {
    /// Scenario JSON file
    #[arg(long, conflicts_with = "builtin")]
    scenario: Option<std::path::PathBuf>,

    /// Name of a built-in scenario
    #[arg(long)]
    builtin: Option<String>,

    /// Ledger config JSON file; overrides the scenario's own config
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list {
        for name in Scenario::builtin_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let scenario = match (&args.scenario, &args.builtin) {
        (Some(path), _) => Scenario::from_json_file(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        (None, Some(name)) => match Scenario::builtin(name) {
            Some(scenario) => scenario,
            None => bail!(
                "unknown built-in scenario {:?} (available: {})",
                name,
                Scenario::builtin_names().join(", ")
            ),
        },
        (None, None) => bail!("pass --scenario <file>, --builtin <name> or --list"),
    };

    let runner = match &args.config {
        Some(path) => ScenarioRunner::with_config(
            LedgerConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
        ),
        None => ScenarioRunner::new(),
    };

    let result = runner.run(&scenario).context("running scenario")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&scenario, &result);
    }

    if !result.passed {
        bail!("scenario {} failed", result.scenario_name);
    }
    Ok(())
}

fn print_report(scenario: &Scenario, result: &SimResult) {
    println!("Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        println!("  {}", scenario.description);
    }

    println!("\nSteps:");
    for outcome in &result.outcomes {
        let status = match &outcome.status {
            StepStatus::Ok { paid: Some(paid), .. } => format!("ok, paid {}", paid),
            StepStatus::Ok { balance: Some(balance), .. } => format!("ok, balance {}", balance),
            StepStatus::Ok { .. } => "ok".to_string(),
            StepStatus::Failed { error } => format!("FAILED: {}", error),
        };
        println!("  [{}] {} -> {}", outcome.index, outcome.step.describe(), status);
    }

    if !result.nested_calls.is_empty() {
        println!("\nReentrant calls:");
        for call in &result.nested_calls {
            let outcome = match (&call.paid, &call.error) {
                (Some(paid), _) => format!("paid {}", paid),
                (None, Some(error)) => format!("failed: {}", error),
                (None, None) => "no effect".to_string(),
            };
            println!(
                "  step {} depth {}: {} saw balance {} -> {}",
                call.step,
                call.depth,
                result.label(&call.account),
                call.observed_balance,
                outcome
            );
        }
    }

    println!("\nBalances:");
    for (account, amount) in &result.final_balances {
        println!("  {:<12} {}", result.label(account), amount);
    }

    println!("\nReceived:");
    for (account, amount) in &result.received {
        println!("  {:<12} {}", result.label(account), amount);
    }

    println!("\nEvents:");
    for event in &result.events {
        println!("  {}", event);
    }

    println!(
        "\nAudit: tracked {} / custody {} (deposited {}, paid out {})",
        result.audit.tracked_total,
        result.audit.custody,
        result.audit.total_deposited,
        result.audit.total_paid_out
    );

    if result.passed {
        println!("Status: PASS");
    } else {
        println!("Status: FAIL");
        for reason in &result.failure_reasons {
            println!("  - {}", reason);
        }
    }
}
