use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::entities::{
    BossState, EnemyState, EntityId, InputIntents, PlayerState, SpawnRules,
};
use crate::geometry::{standing_position, Body, TileCoord};
use crate::host::GameHost;
use crate::nav::GridReachability;
use crate::playability::ActionFeedback;
use crate::reachability::ReachabilityOracle;
use crate::report::{TestSuite, Verdict};
use crate::rng::RandomSlot;
use crate::world::{AbilitySet, GridWorld, LevelWorld};

pub(crate) const TILE: f32 = 32.0;
pub(crate) const PLAYER_WIDTH: f32 = 20.0;
pub(crate) const PLAYER_HEIGHT: f32 = 28.0;

/// Static host: nothing moves unless a test moves it.
#[derive(Debug)]
pub(crate) struct FixtureHost {
    pub world: GridWorld,
    pub oracle: GridReachability,
    pub player: PlayerState,
    pub enemies: Vec<EnemyState>,
    pub boss: Option<BossState>,
    pub abilities: AbilitySet,
    pub spawn_rules: SpawnRules,
    pub clock: f64,
    pub harness: bool,
    pub editor: bool,
    pub feedback: Option<ActionFeedback>,
    pub random: RandomSlot,
    pub intents: InputIntents,
    pub simulation_active: bool,
    pub victory: bool,
    pub results: BTreeMap<TestSuite, Verdict>,
}

impl FixtureHost {
    pub fn new(rows: &[&str], player_tile: TileCoord) -> Self {
        let world = GridWorld::from_rows(rows, TILE, &BTreeMap::new()).expect("fixture world");
        let body = Body::new(
            standing_position(player_tile, TILE, PLAYER_HEIGHT),
            PLAYER_WIDTH,
            PLAYER_HEIGHT,
        );
        let mut player = PlayerState::new(EntityId(0), body, 100.0);
        player.on_ground = true;
        Self {
            world,
            oracle: GridReachability::default(),
            player,
            enemies: Vec::new(),
            boss: None,
            abilities: AbilitySet::new(),
            spawn_rules: SpawnRules::default(),
            clock: 0.0,
            harness: false,
            editor: false,
            feedback: None,
            random: RandomSlot::new(Box::new(StdRng::seed_from_u64(99))),
            intents: InputIntents::default(),
            simulation_active: true,
            victory: false,
            results: BTreeMap::new(),
        }
    }
}

impl GameHost for FixtureHost {
    fn world(&self) -> &dyn LevelWorld {
        &self.world
    }

    fn oracle(&self) -> &dyn ReachabilityOracle {
        &self.oracle
    }

    fn player(&self) -> &PlayerState {
        &self.player
    }

    fn enemies(&self) -> &[EnemyState] {
        &self.enemies
    }

    fn boss(&self) -> Option<&BossState> {
        self.boss.as_ref()
    }

    fn abilities(&self) -> &AbilitySet {
        &self.abilities
    }

    fn spawn_rules(&self) -> SpawnRules {
        self.spawn_rules
    }

    fn clock(&self) -> f64 {
        self.clock
    }

    fn harness_active(&self) -> bool {
        self.harness
    }

    fn editor_mode(&self) -> bool {
        self.editor
    }

    fn action_feedback(&self) -> Option<&ActionFeedback> {
        self.feedback.as_ref()
    }

    fn random(&mut self) -> &mut RandomSlot {
        &mut self.random
    }

    fn set_virtual_input(&mut self, intents: InputIntents) {
        self.intents = intents;
    }

    fn clear_virtual_input(&mut self) {
        self.intents = InputIntents::default();
    }

    fn set_simulation_active(&mut self, active: bool) {
        self.simulation_active = active;
    }

    fn declare_victory(&mut self) {
        self.victory = true;
    }

    fn publish_result(&mut self, suite: TestSuite, verdict: Verdict) {
        self.results.insert(suite, verdict);
    }
}
