//! Batch audits run on demand against a loaded level.

mod coverage;
mod encounter;
mod progression;

pub use coverage::{CoverageReport, RegionCoverageAuditor};
pub use encounter::{
    EncounterAuditor, ATTACK_REACH, MAX_GLOBAL_CAP, MAX_REGION_CAP, MIN_ATTACKABLE_RATIO,
};
pub use progression::{authored_ability_order, ProgressionAuditor};
