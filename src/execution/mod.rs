// Order sequencing and the per-alert decision cycle
pub mod coordinator;
pub mod cycle;

pub use coordinator::{ExecutionContext, ExecutionCoordinator, ExecutionOutcome};
pub use cycle::{CycleReport, DecisionCycle};
