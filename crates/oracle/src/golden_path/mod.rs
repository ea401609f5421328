//! Scripted critical-path replay.

mod runner;
mod script;
mod trace;

pub use runner::{FailureReport, GoldenPathRunner, RunStatus};
pub use script::{
    Milestone, MilestoneKind, ScriptDocument, ScriptLoadError, DEFAULT_DAMAGE_BUDGET,
    DEFAULT_SIM_SPEED,
};
pub use trace::{TrajectoryDigest, TrajectorySample};
