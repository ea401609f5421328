use crate::entities::{BossState, EnemyState, InputIntents, PlayerState, SpawnRules};
use crate::playability::ActionFeedback;
use crate::reachability::ReachabilityOracle;
use crate::report::{TestSuite, Verdict};
use crate::rng::RandomSlot;
use crate::world::{AbilitySet, LevelWorld};

/// The live game as seen by the runner and the monitor.
///
/// Everything is read-only except the random slot and the explicit sinks at the bottom; the
/// oracle never moves entities through this trait.
pub trait GameHost {
    fn world(&self) -> &dyn LevelWorld;
    fn oracle(&self) -> &dyn ReachabilityOracle;
    fn player(&self) -> &PlayerState;
    fn enemies(&self) -> &[EnemyState];
    fn boss(&self) -> Option<&BossState>;
    fn abilities(&self) -> &AbilitySet;
    fn spawn_rules(&self) -> SpawnRules;
    /// Simulation time in seconds.
    fn clock(&self) -> f64;
    fn harness_active(&self) -> bool;
    fn editor_mode(&self) -> bool;
    fn action_feedback(&self) -> Option<&ActionFeedback>;

    fn random(&mut self) -> &mut RandomSlot;
    fn set_virtual_input(&mut self, intents: InputIntents);
    fn clear_virtual_input(&mut self);
    fn set_simulation_active(&mut self, active: bool);
    fn declare_victory(&mut self);
    fn publish_result(&mut self, suite: TestSuite, verdict: Verdict);
}
