pub mod audit;
pub mod entities;
pub mod geometry;
pub mod golden_path;
pub mod host;
pub mod nav;
pub mod playability;
pub mod reachability;
pub mod repair;
pub mod report;
pub mod rng;
pub mod sandbox;
pub mod validity;
pub mod world;

#[cfg(test)]
mod test_support;

pub use audit::{
    authored_ability_order, CoverageReport, EncounterAuditor, ProgressionAuditor,
    RegionCoverageAuditor,
};
pub use entities::{
    Archetype, BossState, EnemyKind, EnemyState, EntityId, InputIntents, PlayerState, SpawnRules,
    Upgrade,
};
pub use geometry::{Body, Rect, TileCoord, TileRect, Vec2};
pub use golden_path::{
    FailureReport, GoldenPathRunner, Milestone, MilestoneKind, RunStatus, ScriptDocument,
    ScriptLoadError, TrajectoryDigest,
};
pub use host::GameHost;
pub use nav::{GridReachability, MovementProfile};
pub use playability::{ActionFeedback, InvariantMonitor, InvariantStatus, MonitorConfig};
pub use reachability::{PathPlan, ReachabilityGraph, ReachabilityOracle};
pub use repair::{
    AutoRepair, RepairLoadError, RepairPlan, RepairTarget, DEFAULT_REPAIR_ATTEMPTS,
};
pub use report::{AuditReport, TestSuite, Verdict};
pub use rng::{MinStdRng, RandomSlot};
pub use sandbox::{
    FixtureError, LevelFixture, PlaytestSession, RunOutcome, SandboxGame, Simulation,
};
pub use validity::{ValidityReport, WorldValidityGate};
pub use world::{AbilitySet, GridWorld, GridWorldError, LevelWorld};
