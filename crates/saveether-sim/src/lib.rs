mod scenario;
mod runner;

pub use scenario::{AccountRef, ExpectedOutcomes, ReentryAction, Scenario, Step};
pub use runner::{NestedCall, ScenarioRunner, SimResult, StepOutcome, StepStatus};
