//! Deterministic kinematic platformer that implements [`GameHost`] for tests and the CLI.

mod fixture;
mod physics;
mod session;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

pub use fixture::{
    BossSpawn, EnemySpawn, FixtureError, LevelFixture, PickupSpawn, PlayerSpawn, SaveSpawn,
    DEFAULT_AMBIENT_SEED, DEFAULT_MAX_HEALTH, DEFAULT_TILE_SIZE,
};
pub use physics::{move_body, touching, Contacts};
pub use session::{PlaytestSession, RunOutcome, Simulation, StepEvents};

use crate::audit::{CoverageReport, EncounterAuditor, ProgressionAuditor, RegionCoverageAuditor};
use crate::entities::{
    Archetype, BossState, EnemyKind, EnemyState, EntityId, InputIntents, PlayerState, SpawnRules,
};
use crate::geometry::{standing_position, tile_center, world_to_tile, Body, Rect, TileCoord, Vec2};
use crate::host::GameHost;
use crate::nav::{GridReachability, MovementProfile};
use crate::playability::{ActionFeedback, FeedbackChannel};
use crate::reachability::ReachabilityOracle;
use crate::repair::RepairTarget;
use crate::report::{AuditReport, TestSuite, Verdict};
use crate::rng::RandomSlot;
use crate::validity::{ValidityReport, WorldValidityGate};
use crate::world::{AbilityPickup, AbilitySet, GridWorld, GridWorldError, LevelWorld, SavePoint};

pub const PLAYER_WIDTH: f32 = 20.0;
pub const PLAYER_HEIGHT: f32 = 28.0;
pub const ENEMY_SIZE: f32 = 24.0;
pub const RUN_SPEED: f32 = 180.0;
pub const GRAVITY: f32 = 1200.0;
pub const JUMP_SPEED: f32 = 460.0;
pub const MAX_FALL_SPEED: f32 = 600.0;
pub const DASH_SPEED: f32 = 620.0;
pub const DASH_DURATION: f32 = 0.12;
pub const DASH_COOLDOWN: f32 = 0.5;
pub const COYOTE_SECONDS: f32 = 0.1;

const DASH_ABILITY: &str = "dash";
const ANCHOR_ABILITY: &str = "anchor";
const FLAME_ABILITY: &str = "flame";
const PICKUP_RADIUS: f32 = 24.0;
const SAVE_INTERACT_RADIUS: f32 = 36.0;
const ATTACK_RANGE: f32 = 48.0;
const ATTACK_DAMAGE: f32 = 1.0;
const CONTACT_DAMAGE: f32 = 10.0;
const INVULNERABLE_SECONDS: f32 = 1.0;
const ENEMY_WALK_SPEED: f32 = 60.0;
const ENEMY_WANDER_RANGE: f32 = 48.0;
const ENEMY_RETARGET_SECONDS: f32 = 1.5;
const BOSS_REACH: f32 = 72.0;
const BOSS_PHASES: u8 = 3;
const BOSS_HITS_PER_PHASE: u8 = 2;
const REV_EXPOSE_SECONDS: f32 = 0.25;
const CORE_EXPOSED_SECONDS: f32 = 2.0;
/// Falling this far below the grid counts as a death.
const KILL_PLANE_MARGIN: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SandboxSystem {
    Movement,
    Interaction,
    Ai,
    Combat,
    Boss,
    Cleanup,
}

const SYSTEM_ORDER: [SandboxSystem; 6] = [
    SandboxSystem::Movement,
    SandboxSystem::Interaction,
    SandboxSystem::Ai,
    SandboxSystem::Combat,
    SandboxSystem::Boss,
    SandboxSystem::Cleanup,
];

#[derive(Debug, Clone, Copy, Default)]
struct EnemyMotion {
    home: Vec2,
    target: Vec2,
    fall_speed: f32,
    retarget: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct BossCombat {
    hits: u8,
    rev_timer: f32,
    exposed_timer: f32,
}

#[derive(Debug)]
pub struct SandboxGame {
    name: String,
    world: GridWorld,
    oracle: GridReachability,
    spawn: Vec2,
    respawn: Vec2,
    player: PlayerState,
    velocity: Vec2,
    facing: f32,
    dash_timer: f32,
    invulnerable: f32,
    enemies: Vec<EnemyState>,
    motion: Vec<EnemyMotion>,
    boss: Option<BossState>,
    boss_combat: BossCombat,
    abilities: AbilitySet,
    spawn_rules: SpawnRules,
    clock: f64,
    harness: bool,
    editor: bool,
    feedback: ActionFeedback,
    random: RandomSlot,
    intents: InputIntents,
    simulation_active: bool,
    victory: bool,
    results: BTreeMap<TestSuite, Verdict>,
    events: StepEvents,
}

impl SandboxGame {
    pub fn from_fixture(fixture: &LevelFixture) -> Result<Self, FixtureError> {
        let max_health = fixture.player.max_health;
        if max_health.is_nan() || max_health <= 0.0 {
            return Err(FixtureError::MaxHealth(max_health));
        }
        let tile_size = fixture.tile_size;
        let gates = fixture.gate_glyphs()?;
        let world = GridWorld::from_rows(&fixture.rows, tile_size, &gates)?
            .with_regions(fixture.regions.clone())
            .with_save_points(
                fixture
                    .save_points
                    .iter()
                    .map(|save| SavePoint {
                        id: save.id.clone(),
                        position: tile_center(save.tile, tile_size),
                        active: false,
                    })
                    .collect(),
            )
            .with_ability_pickups(
                fixture
                    .ability_pickups
                    .iter()
                    .map(|pickup| AbilityPickup {
                        ability: pickup.ability.clone(),
                        position: tile_center(pickup.tile, tile_size),
                        collected: false,
                    })
                    .collect(),
            )
            .with_boss_gate(fixture.boss_gate.map(|tile| tile_center(tile, tile_size)));

        let spawn = standing_position(fixture.player.tile, tile_size, PLAYER_HEIGHT);
        let mut player = PlayerState::new(
            EntityId(0),
            Body::new(spawn, PLAYER_WIDTH, PLAYER_HEIGHT),
            max_health,
        );
        player.equipped_upgrades = fixture.upgrades.clone();

        let enemies = fixture
            .enemies
            .iter()
            .enumerate()
            .map(|(index, spawn)| {
                let position = match spawn.kind.archetype() {
                    Archetype::Grounded => standing_position(spawn.tile, tile_size, ENEMY_SIZE),
                    Archetype::Airborne => tile_center(spawn.tile, tile_size),
                };
                EnemyState::new(
                    EntityId(index as u64 + 1),
                    spawn.kind,
                    Body::new(position, ENEMY_SIZE, ENEMY_SIZE),
                )
            })
            .collect::<Vec<_>>();
        let motion = enemies
            .iter()
            .map(|enemy| EnemyMotion {
                home: enemy.position(),
                target: enemy.position(),
                ..EnemyMotion::default()
            })
            .collect();

        let boss = fixture.boss.as_ref().map(|boss| BossState {
            position: tile_center(boss.tile, tile_size),
            phase: 0,
            core_exposed: false,
            dead: false,
        });

        let profile = MovementProfile::from_kinematics(
            tile_size,
            RUN_SPEED,
            JUMP_SPEED,
            GRAVITY,
            DASH_SPEED,
            DASH_DURATION,
        );
        let mut game = Self {
            name: fixture.name.clone(),
            world,
            oracle: GridReachability::new(profile),
            spawn,
            respawn: spawn,
            player,
            velocity: Vec2::default(),
            facing: 1.0,
            dash_timer: 0.0,
            invulnerable: 0.0,
            enemies,
            motion,
            boss,
            boss_combat: BossCombat::default(),
            abilities: fixture.abilities.clone(),
            spawn_rules: fixture.spawn_rules,
            clock: 0.0,
            harness: false,
            editor: false,
            feedback: ActionFeedback::new(),
            random: RandomSlot::new(Box::new(StdRng::seed_from_u64(fixture.ambient_seed))),
            intents: InputIntents::default(),
            simulation_active: true,
            victory: false,
            results: BTreeMap::new(),
            events: StepEvents::default(),
        };
        game.player.on_ground = touching(
            &game.world,
            &game.player.body,
            Vec2::new(0.0, 1.0),
            &game.abilities,
        );
        info!(
            level = %game.name,
            width = game.world.width(),
            height = game.world.height(),
            enemies = game.enemies.len(),
            boss = game.boss.is_some(),
            "sandbox_built"
        );
        Ok(game)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spawn(&self) -> Vec2 {
        self.spawn
    }

    pub fn intents(&self) -> InputIntents {
        self.intents
    }

    pub fn victory(&self) -> bool {
        self.victory
    }

    pub fn simulation_active(&self) -> bool {
        self.simulation_active
    }

    pub fn result(&self, suite: TestSuite) -> Option<Verdict> {
        self.results.get(&suite).copied()
    }

    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.player
    }

    pub fn enemies_mut(&mut self) -> &mut [EnemyState] {
        &mut self.enemies
    }

    pub fn feedback_mut(&mut self) -> &mut ActionFeedback {
        &mut self.feedback
    }

    pub fn set_harness_active(&mut self, active: bool) {
        self.harness = active;
    }

    pub fn set_editor_mode(&mut self, editor: bool) {
        self.editor = editor;
    }

    /// Validates the spawn, relocates embedded entities and moves the player to the final spawn.
    pub fn run_world_validity(&mut self) -> ValidityReport {
        let result = WorldValidityGate::new().run(
            &self.world,
            &mut self.player,
            self.spawn,
            &self.abilities,
            &mut self.enemies,
        );
        self.spawn = result.spawn;
        self.respawn = result.spawn;
        for (enemy, motion) in self.enemies.iter().zip(self.motion.iter_mut()) {
            motion.home = enemy.position();
            motion.target = enemy.position();
        }
        self.publish_result(TestSuite::WorldValidity, result.status());
        result
    }

    pub fn run_room_coverage(&mut self) -> CoverageReport {
        let origin = self.player.body.standing_tile(self.world.tile_size());
        let result =
            RegionCoverageAuditor::new().run(&self.world, &self.oracle, origin, &self.abilities);
        self.publish_result(TestSuite::RoomCoverage, result.report.status);
        result
    }

    /// Ability caches in `order` (authored pickup order when empty), then the boss gate.
    pub fn run_progression_audit(&mut self, order: &[String]) -> AuditReport {
        let origin = self.player.body.standing_tile(self.world.tile_size());
        let report = ProgressionAuditor::new().run(
            &self.world,
            &self.oracle,
            origin,
            &self.abilities,
            order,
        );
        self.publish_result(TestSuite::Progression, report.status);
        report
    }

    pub fn run_encounter_audit(&mut self) -> AuditReport {
        let report = EncounterAuditor::new().run(
            &self.world,
            &self.oracle,
            &self.player,
            &self.enemies,
            self.spawn_rules,
            &self.abilities,
        );
        self.publish_result(TestSuite::Encounters, report.status);
        report
    }

    fn run_system(&mut self, system: SandboxSystem, dt: f32) {
        match system {
            SandboxSystem::Movement => self.run_movement(dt),
            SandboxSystem::Interaction => self.run_interaction(),
            SandboxSystem::Ai => self.run_enemy_ai(dt),
            SandboxSystem::Combat => self.run_combat(),
            SandboxSystem::Boss => self.run_boss(dt),
            SandboxSystem::Cleanup => self.run_cleanup(),
        }
    }

    fn run_movement(&mut self, dt: f32) {
        let intents = self.intents;
        let now = self.clock;
        let player = &mut self.player;
        player.dash_cooldown = (player.dash_cooldown - dt).max(0.0);
        self.invulnerable = (self.invulnerable - dt).max(0.0);

        let direction = f32::from(i8::from(intents.right) - i8::from(intents.left));
        if direction != 0.0 {
            self.facing = direction;
            emit(&mut self.feedback, "move", now);
        }
        if intents.flame && self.abilities.has(FLAME_ABILITY) {
            player.flame_mode = !player.flame_mode;
        }
        if intents.dash
            && self.dash_timer <= 0.0
            && player.dash_cooldown <= 0.0
            && self.abilities.has(DASH_ABILITY)
        {
            self.dash_timer = DASH_DURATION;
            player.dash_cooldown = DASH_COOLDOWN;
            emit(&mut self.feedback, "dash", now);
        }
        if intents.jump && (player.on_ground || player.coyote > 0.0 || player.on_wall != 0) {
            self.velocity.y = -JUMP_SPEED;
            player.coyote = 0.0;
            player.on_ground = false;
            emit(&mut self.feedback, "jump", now);
        }

        if self.dash_timer > 0.0 {
            self.dash_timer -= dt;
            self.velocity = Vec2::new(self.facing * DASH_SPEED, 0.0);
        } else {
            self.velocity.x = direction * RUN_SPEED;
            self.velocity.y = (self.velocity.y + GRAVITY * dt).min(MAX_FALL_SPEED);
        }

        let was_grounded = player.on_ground;
        let delta = Vec2::new(self.velocity.x * dt, self.velocity.y * dt);
        let contacts = move_body(&self.world, &mut player.body, delta, &self.abilities);
        if contacts.floor && self.velocity.y >= 0.0 {
            self.velocity.y = 0.0;
            player.on_ground = true;
            player.coyote = COYOTE_SECONDS;
            if !was_grounded {
                emit(&mut self.feedback, "land", now);
            }
        } else {
            player.on_ground = false;
            player.coyote = (player.coyote - dt).max(0.0);
        }
        if contacts.ceiling && self.velocity.y < 0.0 {
            self.velocity.y = 0.0;
        }
        player.on_wall = contacts.wall;
    }

    fn run_interaction(&mut self) {
        let now = self.clock;
        let position = self.player.position();
        for pickup in self.world.ability_pickups_mut() {
            if pickup.collected || pickup.position.distance(position) > PICKUP_RADIUS {
                continue;
            }
            pickup.collected = true;
            self.abilities.grant(pickup.ability.clone());
            emit(&mut self.feedback, "pickup", now);
            info!(ability = %pickup.ability, "ability_collected");
        }

        if !self.intents.interact {
            return;
        }
        emit(&mut self.feedback, "interact", now);
        let tile_size = self.world.tile_size();
        for save in self.world.save_points_mut() {
            if save.position.distance(position) > SAVE_INTERACT_RADIUS {
                continue;
            }
            if !save.active {
                info!(save = %save.id, "save_point_activated");
            }
            save.active = true;
            self.player.health = self.player.max_health;
            self.respawn =
                standing_position(world_to_tile(save.position, tile_size), tile_size, PLAYER_HEIGHT);
        }
    }

    fn run_enemy_ai(&mut self, dt: f32) {
        for (enemy, motion) in self.enemies.iter_mut().zip(self.motion.iter_mut()) {
            if enemy.dead {
                continue;
            }
            motion.retarget -= dt;
            let arrived = (motion.target.x - enemy.body.position.x).abs() < 1.0;
            if motion.retarget <= 0.0 || arrived {
                let roll = self.random.next_unit() as f32;
                motion.target.x = motion.home.x + (roll * 2.0 - 1.0) * ENEMY_WANDER_RANGE;
                if enemy.kind.archetype() == Archetype::Airborne {
                    let bob = self.random.next_unit() as f32;
                    motion.target.y = motion.home.y + (bob * 2.0 - 1.0) * ENEMY_WANDER_RANGE / 2.0;
                }
                motion.retarget = ENEMY_RETARGET_SECONDS;
            }

            let step = ENEMY_WALK_SPEED * dt;
            let dx = motion.target.x - enemy.body.position.x;
            let move_x = dx.signum() * step.min(dx.abs());
            let contacts = match enemy.kind.archetype() {
                Archetype::Grounded => {
                    motion.fall_speed = (motion.fall_speed + GRAVITY * dt).min(MAX_FALL_SPEED);
                    let delta = Vec2::new(move_x, motion.fall_speed * dt);
                    let contacts = move_body(&self.world, &mut enemy.body, delta, &self.abilities);
                    if contacts.floor {
                        motion.fall_speed = 0.0;
                    }
                    contacts
                }
                Archetype::Airborne => {
                    let dy = motion.target.y - enemy.body.position.y;
                    let delta = Vec2::new(move_x, dy.signum() * step.min(dy.abs()));
                    move_body(&self.world, &mut enemy.body, delta, &self.abilities)
                }
            };
            if contacts.wall != 0 {
                motion.retarget = 0.0;
            }
        }
    }

    fn run_combat(&mut self) {
        let now = self.clock;
        let intents = self.intents;
        let player_rect = self.player.body.rect();
        let position = self.player.position();
        let can_pierce = self.player.can_pierce();
        if intents.rev {
            emit(&mut self.feedback, "chainsaw rev", now);
        }
        if intents.attack {
            emit(&mut self.feedback, "chainsaw bite", now);
        }

        for enemy in self.enemies.iter_mut().filter(|enemy| !enemy.dead) {
            let in_range = enemy.position().distance(position) <= ATTACK_RANGE;
            if enemy.kind == EnemyKind::Bulwark {
                enemy.open = intents.rev && in_range;
            }
            if intents.attack && in_range {
                if enemy.is_killable_with(can_pierce) {
                    enemy.health -= ATTACK_DAMAGE;
                    self.events.enemy_hits += 1;
                    emit(&mut self.feedback, "hit", now);
                    if enemy.health <= 0.0 {
                        enemy.dead = true;
                        emit(&mut self.feedback, "execute", now);
                        info!(enemy = %enemy.label(), "enemy_defeated");
                    }
                } else {
                    emit(&mut self.feedback, "stagger", now);
                }
            }
            if !enemy.dead && self.invulnerable <= 0.0 && overlaps(enemy.body.rect(), player_rect) {
                self.player.health -= CONTACT_DAMAGE;
                self.invulnerable = INVULNERABLE_SECONDS;
                self.events.player_damage += CONTACT_DAMAGE;
                emit(&mut self.feedback, "take damage", now);
                debug!(enemy = %enemy.label(), health = self.player.health, "player_damaged");
            }
        }
    }

    fn run_boss(&mut self, dt: f32) {
        let intents = self.intents;
        let now = self.clock;
        let Some(boss) = self.boss.as_mut() else {
            return;
        };
        if boss.dead {
            return;
        }
        let combat = &mut self.boss_combat;
        let in_reach = boss.position.distance(self.player.position()) <= BOSS_REACH;
        combat.exposed_timer = (combat.exposed_timer - dt).max(0.0);

        if in_reach && !boss.core_exposed {
            combat.rev_timer = if intents.rev { combat.rev_timer + dt } else { 0.0 };
            let opened = match boss.phase {
                0 => intents.throw && self.abilities.has(ANCHOR_ABILITY),
                1 => intents.rev && self.player.flame_mode,
                _ => false,
            };
            if opened || combat.rev_timer >= REV_EXPOSE_SECONDS {
                boss.core_exposed = true;
                combat.exposed_timer = CORE_EXPOSED_SECONDS;
                combat.rev_timer = 0.0;
                debug!(phase = boss.phase, "boss_core_exposed");
            }
        }

        if boss.core_exposed && in_reach && intents.attack {
            combat.hits += 1;
            self.events.enemy_hits += 1;
            emit(&mut self.feedback, "hit", now);
            if combat.hits >= BOSS_HITS_PER_PHASE {
                combat.hits = 0;
                boss.core_exposed = false;
                boss.phase += 1;
                if boss.phase >= BOSS_PHASES {
                    boss.dead = true;
                    emit(&mut self.feedback, "execute", now);
                    info!("boss_defeated");
                } else {
                    info!(phase = boss.phase, "boss_phase_advanced");
                }
            }
        }
        if boss.core_exposed && combat.exposed_timer <= 0.0 {
            boss.core_exposed = false;
        }
    }

    fn run_cleanup(&mut self) {
        let floor_limit = self.world.height() as f32 * self.world.tile_size() + KILL_PLANE_MARGIN;
        if self.player.health > 0.0 && self.player.position().y < floor_limit {
            return;
        }
        info!(
            x = self.respawn.x,
            y = self.respawn.y,
            health = self.player.health,
            "player_respawned"
        );
        self.player.body.position = self.respawn;
        self.player.health = self.player.max_health;
        self.velocity = Vec2::default();
        self.dash_timer = 0.0;
    }
}

fn emit(feedback: &mut ActionFeedback, action: &str, time: f64) {
    feedback.record(action, FeedbackChannel::Visual, time);
    feedback.record(action, FeedbackChannel::Audio, time);
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x < b.x + b.w && b.x < a.x + a.w && a.y < b.y + b.h && b.y < a.y + a.h
}

impl Simulation for SandboxGame {
    fn step(&mut self, dt: f32) -> StepEvents {
        self.events = StepEvents::default();
        if !self.simulation_active || dt <= 0.0 {
            return self.events;
        }
        self.clock += f64::from(dt);
        for system in SYSTEM_ORDER {
            self.run_system(system, dt);
        }
        self.events
    }
}

impl RepairTarget for SandboxGame {
    fn patch_tile(&mut self, tile: TileCoord, glyph: char) -> Result<(), GridWorldError> {
        self.world.set_glyph(tile, glyph)
    }

    fn tweak_movement(&mut self, key: &str, value: i32) -> bool {
        let mut profile = self.oracle.profile();
        if !profile.set(key, value) {
            return false;
        }
        self.oracle.set_profile(profile);
        true
    }

    fn override_spawn(&mut self, tile: TileCoord) -> Vec2 {
        let spawn = standing_position(tile, self.world.tile_size(), PLAYER_HEIGHT);
        self.spawn = spawn;
        self.respawn = spawn;
        self.player.body.position = spawn;
        self.velocity = Vec2::default();
        self.player.on_ground =
            touching(&self.world, &self.player.body, Vec2::new(0.0, 1.0), &self.abilities);
        spawn
    }
}

impl GameHost for SandboxGame {
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
        Some(&self.feedback)
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
        if !self.victory {
            info!(level = %self.name, "victory_declared");
        }
        self.victory = true;
    }

    fn publish_result(&mut self, suite: TestSuite, verdict: Verdict) {
        self.results.insert(suite, verdict);
    }
}
