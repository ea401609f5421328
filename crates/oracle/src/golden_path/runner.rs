use std::path::Path;

use tracing::{debug, info, warn};

use crate::entities::InputIntents;
use crate::geometry::{standing_position, world_to_tile, Vec2};
use crate::host::GameHost;
use crate::playability::{InvariantMonitor, InvariantStatus};
use crate::reachability::{FailureDetail, PathPlan};
use crate::report::{AuditReport, TestSuite, Verdict};

use super::script::{Milestone, MilestoneKind, ScriptDocument};
use super::trace::TrajectorySample;

const WAYPOINT_REACHED_DISTANCE: f32 = 18.0;
const HORIZONTAL_DEADZONE: f32 = 6.0;
const JUMP_RISE_THRESHOLD: f32 = -24.0;
const JUMP_COOLDOWN_SECONDS: f32 = 0.2;
const DASH_MIN_DISTANCE: f32 = 80.0;
const CHECKPOINT_INTERACT_DISTANCE: f32 = 36.0;
const INTERACT_COOLDOWN_SECONDS: f32 = 0.4;
const BOSS_ABILITY_COOLDOWN_SECONDS: f32 = 0.6;
const ATTACK_COOLDOWN_SECONDS: f32 = 0.3;
const BOSS_GATE_REACHED_DISTANCE: f32 = 40.0;
const STUCK_PROGRESS_EPSILON: f32 = 1.0;
const STUCK_LIMIT_SECONDS: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Idle,
    Running,
    Pass,
    Fail,
}

impl RunStatus {
    pub fn verdict(self) -> Verdict {
        match self {
            RunStatus::Idle => Verdict::Idle,
            RunStatus::Running => Verdict::Running,
            RunStatus::Pass => Verdict::Pass,
            RunStatus::Fail => Verdict::Fail,
        }
    }
}

/// Snapshot taken at the moment a run fails.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub stage: String,
    pub target: String,
    pub region: String,
    pub last_stable: Vec2,
    pub constraint: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct RunState {
    stage_index: usize,
    path: Vec<Vec2>,
    path_index: usize,
    last_stable: Vec2,
    attack_timer: f32,
    jump_cooldown: f32,
    interact_cooldown: f32,
    throw_cooldown: f32,
    flame_toggle_cooldown: f32,
    damage_taken: f32,
    last_health: f32,
    last_distance: Option<f32>,
    stuck_timer: f32,
}

/// Scripted agent that walks the critical path milestone by milestone.
///
/// A runner without a script is inert: `start` reports the missing data and every other hook is
/// a no-op.
#[derive(Debug, Clone)]
pub struct GoldenPathRunner {
    script: Option<ScriptDocument>,
    active: bool,
    status: RunStatus,
    run: RunState,
    failure: Option<FailureReport>,
}

impl Default for GoldenPathRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl GoldenPathRunner {
    pub fn new() -> Self {
        Self {
            script: None,
            active: false,
            status: RunStatus::Idle,
            run: RunState::default(),
            failure: None,
        }
    }

    pub fn with_script(script: ScriptDocument) -> Self {
        Self {
            script: Some(script),
            ..Self::new()
        }
    }

    /// Loads the script at `path`. Unreadable or invalid scripts leave the runner disabled.
    pub fn load(path: &Path) -> Self {
        match ScriptDocument::from_path(path) {
            Ok(script) => {
                info!(
                    path = %path.display(),
                    milestones = script.milestones.len(),
                    seed = script.seed,
                    "golden_path_script_loaded"
                );
                Self::with_script(script)
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "golden_path_script_unavailable");
                Self::new()
            }
        }
    }

    pub fn script(&self) -> Option<&ScriptDocument> {
        self.script.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.script.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn stage_index(&self) -> usize {
        self.run.stage_index
    }

    pub fn path(&self) -> &[Vec2] {
        &self.run.path
    }

    pub fn path_index(&self) -> usize {
        self.run.path_index
    }

    pub fn last_stable(&self) -> Vec2 {
        self.run.last_stable
    }

    pub fn damage_taken(&self) -> f32 {
        self.run.damage_taken
    }

    pub fn failure_report(&self) -> Option<&FailureReport> {
        self.failure.as_ref()
    }

    pub fn current_milestone(&self) -> Option<&Milestone> {
        self.script
            .as_ref()
            .and_then(|script| script.milestones.get(self.run.stage_index))
    }

    pub fn sample(&self) -> TrajectorySample {
        TrajectorySample {
            status: self.status,
            stage_index: self.run.stage_index,
            path: self.run.path.clone(),
            path_index: self.run.path_index,
        }
    }

    /// Multiplier the host applies to its own delta time.
    pub fn time_scale(&self) -> f32 {
        match (&self.script, self.active && self.status == RunStatus::Running) {
            (Some(script), true) => script.sim_speed,
            _ => 1.0,
        }
    }

    /// Resets the run and installs the seeded random source. Starting while a run is in
    /// progress stops it first.
    pub fn start(&mut self, host: &mut dyn GameHost) -> AuditReport {
        let Some(seed) = self.script.as_ref().map(|script| script.seed) else {
            warn!("golden_path_start_without_script");
            let mut report = AuditReport::new(Verdict::Fail);
            report.fail_line("Golden path data missing.");
            report.detail_line("Fix: verify the critical path script file.");
            return report;
        };
        if self.active {
            debug!(stage = self.run.stage_index, "golden_path_restart");
            self.stop(host);
        }

        let player = host.player();
        self.run = RunState {
            last_stable: player.position(),
            last_health: player.health,
            ..RunState::default()
        };
        self.failure = None;
        self.active = true;
        self.status = RunStatus::Running;
        host.random().install(seed);
        host.set_simulation_active(true);
        host.publish_result(TestSuite::GoldenPath, Verdict::Running);
        info!(
            seed,
            milestones = self.script.as_ref().map_or(0, |script| script.milestones.len()),
            "golden_path_started"
        );

        let mut report = AuditReport::new(Verdict::Running);
        report
            .lines
            .push("… Golden path simulation running.".to_string());
        report
    }

    /// Safe at any time. Restores the ambient random source and clears synthesized input.
    pub fn stop(&mut self, host: &mut dyn GameHost) {
        let was_active = self.active;
        self.active = false;
        self.status = RunStatus::Idle;
        self.run = RunState::default();
        self.failure = None;
        if host.random().restore() {
            debug!("golden_path_random_restored");
        }
        host.clear_virtual_input();
        host.publish_result(TestSuite::GoldenPath, Verdict::Idle);
        if was_active {
            info!("golden_path_stopped");
        }
    }

    pub fn pre_update(&mut self, dt: f32, host: &mut dyn GameHost) {
        if !self.active {
            return;
        }
        if self.status != RunStatus::Running {
            host.clear_virtual_input();
            return;
        }
        let Some(milestone) = self.current_milestone().cloned() else {
            self.pass(host);
            return;
        };
        if self.is_milestone_complete(&milestone, host) {
            self.advance_stage(host, &milestone);
            return;
        }
        if self.run.path.is_empty() || self.run.path_index >= self.run.path.len() {
            self.plan_path(host, &milestone);
            if self.status != RunStatus::Running {
                return;
            }
        }
        let intents = self.compute_intents(dt, host, &milestone);
        if self.status == RunStatus::Running {
            host.set_virtual_input(intents);
        }
    }

    pub fn post_update(&mut self, dt: f32, host: &mut dyn GameHost, monitor: &InvariantMonitor) {
        if !self.active || self.status != RunStatus::Running {
            return;
        }
        let run = &mut self.run;
        run.attack_timer = (run.attack_timer - dt).max(0.0);
        run.jump_cooldown = (run.jump_cooldown - dt).max(0.0);
        run.interact_cooldown = (run.interact_cooldown - dt).max(0.0);

        let player = host.player();
        if player.health < run.last_health {
            run.damage_taken += run.last_health - player.health;
        }
        run.last_health = player.health;

        let budget = self
            .script
            .as_ref()
            .map_or(super::script::DEFAULT_DAMAGE_BUDGET, |script| script.damage_budget)
            * player.max_health;
        if run.damage_taken > budget {
            self.fail(
                host,
                FailureDetail::new("damage funnel exceeded budget", "layout or combat balance"),
            );
            return;
        }

        if monitor.status() == InvariantStatus::Fail {
            let constraint = monitor
                .log()
                .last()
                .map(|entry| entry.to_string())
                .unwrap_or_else(|| "playability invariant failed".to_string());
            self.fail(
                host,
                FailureDetail::new(constraint, "layout or collision integrity"),
            );
        }
    }

    pub fn dashboard_report(&self) -> AuditReport {
        match self.status {
            RunStatus::Idle => AuditReport::new(Verdict::Idle),
            RunStatus::Running => {
                let mut report = AuditReport::new(Verdict::Running);
                report
                    .lines
                    .push("… Golden path simulation running.".to_string());
                report
            }
            RunStatus::Pass => {
                let mut report = AuditReport::new(Verdict::Pass);
                report.pass_line("Golden path completed.");
                report.pass_line("Mission victory reached.");
                report
            }
            RunStatus::Fail => {
                let mut report = AuditReport::new(Verdict::Fail);
                report.fail_line("Golden path failed.");
                if let Some(failure) = &self.failure {
                    report.detail_line(format_args!("Stage: {}", failure.stage));
                    report.detail_line(format_args!("Target: {}", failure.target));
                    report.detail_line(format_args!("Region: {}", failure.region));
                    report.detail_line(format_args!(
                        "Last stable: {:.1},{:.1}",
                        failure.last_stable.x, failure.last_stable.y
                    ));
                    report.detail_line(format_args!("Constraint: {}", failure.constraint));
                    report.detail_line(format_args!("Suggestion: {}", failure.suggestion));
                }
                report
            }
        }
    }

    fn advance_stage(&mut self, host: &dyn GameHost, completed: &Milestone) {
        self.run.stage_index += 1;
        self.run.path.clear();
        self.run.path_index = 0;
        self.run.last_distance = None;
        self.run.stuck_timer = 0.0;
        info!(
            stage = %completed.id,
            next_stage = self.run.stage_index,
            "golden_path_stage_complete"
        );
        let entering_checkpoint = matches!(
            self.current_milestone().map(|milestone| &milestone.kind),
            Some(MilestoneKind::Checkpoint { .. })
        );
        if entering_checkpoint {
            self.run.damage_taken = 0.0;
            self.run.last_health = host.player().health;
        }
    }

    fn is_milestone_complete(&self, milestone: &Milestone, host: &dyn GameHost) -> bool {
        match &milestone.kind {
            MilestoneKind::Ability { ability } => host.abilities().has(ability),
            MilestoneKind::Checkpoint { checkpoint_id } => host
                .world()
                .save_points()
                .iter()
                .find(|save| &save.id == checkpoint_id)
                .is_some_and(|save| save.active),
            MilestoneKind::BossGate => match host.world().boss_gate() {
                Some(gate) => gate.distance(host.player().position()) < BOSS_GATE_REACHED_DISTANCE,
                None => true,
            },
            MilestoneKind::Boss => host.boss().is_some_and(|boss| boss.dead),
        }
    }

    fn resolve_target(&self, milestone: &Milestone, host: &dyn GameHost) -> Option<Vec2> {
        let world = host.world();
        match &milestone.kind {
            MilestoneKind::Ability { ability } => {
                let pickups = world.ability_pickups();
                pickups
                    .iter()
                    .find(|pickup| &pickup.ability == ability && !pickup.collected)
                    .or_else(|| pickups.iter().find(|pickup| &pickup.ability == ability))
                    .map(|pickup| pickup.position)
            }
            MilestoneKind::Checkpoint { checkpoint_id } => world
                .save_points()
                .iter()
                .find(|save| &save.id == checkpoint_id)
                .map(|save| save.position),
            MilestoneKind::BossGate => world
                .boss_gate()
                .or_else(|| host.boss().map(|boss| boss.position)),
            MilestoneKind::Boss => host.boss().map(|boss| boss.position),
        }
    }

    fn checkpoint_position(&self, checkpoint_id: &str, host: &dyn GameHost) -> Option<Vec2> {
        host.world()
            .save_points()
            .iter()
            .find(|save| save.id == checkpoint_id)
            .map(|save| save.position)
    }

    fn plan_path(&mut self, host: &mut dyn GameHost, milestone: &Milestone) {
        let Some(target) = self.resolve_target(milestone, host) else {
            self.fail(
                host,
                FailureDetail::new("missing target", "objective scripting"),
            );
            return;
        };
        let world = host.world();
        let tile_size = world.tile_size();
        let player = host.player();
        let start = player.body.standing_tile(tile_size);
        let target_tile = world_to_tile(target, tile_size);
        let plan = host
            .oracle()
            .plan_path(world, start, target_tile, host.abilities());
        match plan {
            PathPlan::Found(tiles) => {
                let height = player.body.height;
                self.run.path = tiles
                    .into_iter()
                    .map(|tile| standing_position(tile, tile_size, height))
                    .collect();
                self.run.path_index = 0;
                debug!(
                    stage = %milestone.id,
                    waypoints = self.run.path.len(),
                    "golden_path_planned"
                );
            }
            PathPlan::Failed { reason, detail } => {
                let detail = detail.unwrap_or_else(|| FailureDetail::new(reason, "layout"));
                self.fail(host, detail);
            }
        }
    }

    fn compute_intents(
        &mut self,
        dt: f32,
        host: &mut dyn GameHost,
        milestone: &Milestone,
    ) -> InputIntents {
        let mut intents = InputIntents::default();
        let Some(target) = self.run.path.get(self.run.path_index).copied() else {
            return intents;
        };
        let run = &mut self.run;
        run.throw_cooldown = (run.throw_cooldown - dt).max(0.0);
        run.flame_toggle_cooldown = (run.flame_toggle_cooldown - dt).max(0.0);

        let player = host.player();
        let position = player.position();
        let dx = target.x - position.x;
        let dy = target.y - position.y;
        let distance = dx.hypot(dy);
        let close_enough = distance < WAYPOINT_REACHED_DISTANCE;
        if close_enough {
            run.last_stable = position;
            run.path_index = (run.path_index + 1).min(run.path.len() - 1);
        }

        let mut stalled = false;
        if let Some(last_distance) = run.last_distance {
            if distance > last_distance - STUCK_PROGRESS_EPSILON {
                run.stuck_timer += dt;
            } else {
                run.stuck_timer = (run.stuck_timer - dt * 2.0).max(0.0);
            }
            stalled = run.stuck_timer > STUCK_LIMIT_SECONDS;
        }
        run.last_distance = Some(distance);

        intents.left = dx < -HORIZONTAL_DEADZONE;
        intents.right = dx > HORIZONTAL_DEADZONE;

        let can_jump = player.on_ground || player.coyote > 0.0 || player.on_wall != 0;
        if dy < JUMP_RISE_THRESHOLD && can_jump && run.jump_cooldown <= 0.0 {
            intents.jump = true;
            run.jump_cooldown = JUMP_COOLDOWN_SECONDS;
        }

        if dx.abs() > DASH_MIN_DISTANCE && player.on_ground && player.dash_cooldown <= 0.0 {
            intents.dash = true;
        }

        match &milestone.kind {
            MilestoneKind::Checkpoint { checkpoint_id } => {
                let near_save = self
                    .checkpoint_position(checkpoint_id, host)
                    .is_some_and(|save| save.distance(position) < CHECKPOINT_INTERACT_DISTANCE);
                if near_save && self.run.interact_cooldown <= 0.0 {
                    intents.interact = true;
                    self.run.interact_cooldown = INTERACT_COOLDOWN_SECONDS;
                }
            }
            MilestoneKind::Boss => {
                let run = &mut self.run;
                if let Some(boss) = host.boss() {
                    if boss.phase == 0
                        && host.abilities().has("anchor")
                        && run.throw_cooldown <= 0.0
                    {
                        intents.throw = true;
                        run.throw_cooldown = BOSS_ABILITY_COOLDOWN_SECONDS;
                    }
                    if boss.phase == 1
                        && host.abilities().has("flame")
                        && !player.flame_mode
                        && run.flame_toggle_cooldown <= 0.0
                    {
                        intents.flame = true;
                        run.flame_toggle_cooldown = BOSS_ABILITY_COOLDOWN_SECONDS;
                    }
                }
                intents.rev = true;
                if host.boss().is_some_and(|boss| boss.core_exposed) && run.attack_timer <= 0.0 {
                    intents.attack = true;
                    run.attack_timer = ATTACK_COOLDOWN_SECONDS;
                }
            }
            MilestoneKind::Ability { .. } | MilestoneKind::BossGate => {}
        }

        if stalled {
            self.fail(
                host,
                FailureDetail::new("stalled movement", "layout or physics constants"),
            );
        }
        intents
    }

    fn fail(&mut self, host: &mut dyn GameHost, detail: FailureDetail) {
        if self.status == RunStatus::Fail {
            return;
        }
        let milestone = self.current_milestone();
        let position = host.player().position();
        let failure = FailureReport {
            stage: milestone.map_or_else(|| "unknown".to_string(), |milestone| milestone.id.clone()),
            target: milestone
                .map(|milestone| milestone.label.clone())
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            region: host.world().region_at(position).name,
            last_stable: self.run.last_stable,
            constraint: detail
                .constraint
                .unwrap_or_else(|| "unknown constraint".to_string()),
            suggestion: detail.suggestion.unwrap_or_else(|| "layout".to_string()),
        };
        warn!(
            stage = %failure.stage,
            target = %failure.target,
            region = %failure.region,
            constraint = %failure.constraint,
            suggestion = %failure.suggestion,
            "golden_path_fail"
        );
        self.status = RunStatus::Fail;
        self.failure = Some(failure);
        self.finish(host, Verdict::Fail);
    }

    fn pass(&mut self, host: &mut dyn GameHost) {
        if self.status != RunStatus::Running {
            return;
        }
        info!(stages = self.run.stage_index, "golden_path_pass");
        self.status = RunStatus::Pass;
        host.declare_victory();
        self.finish(host, Verdict::Pass);
    }

    fn finish(&mut self, host: &mut dyn GameHost, verdict: Verdict) {
        host.clear_virtual_input();
        host.set_simulation_active(false);
        host.random().restore();
        host.publish_result(TestSuite::GoldenPath, verdict);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BossState;
    use crate::geometry::{tile_center, TileCoord};
    use crate::test_support::{FixtureHost, TILE};
    use crate::world::{AbilityPickup, SavePoint};

    const DT: f32 = 1.0 / 60.0;
    const HALL: [&str; 5] = [
        "##########",
        "#........#",
        "#........#",
        "#........#",
        "##########",
    ];

    fn host() -> FixtureHost {
        FixtureHost::new(&HALL, TileCoord::new(2, 3))
    }

    fn script(milestones: Vec<Milestone>) -> ScriptDocument {
        ScriptDocument {
            seed: 42,
            sim_speed: 1.6,
            damage_budget: 0.7,
            milestones,
        }
    }

    fn boss_fight() -> Milestone {
        Milestone::new("boss", "Boss", MilestoneKind::Boss)
    }

    fn live_boss() -> BossState {
        BossState {
            position: tile_center(TileCoord::new(7, 3), TILE),
            phase: 0,
            core_exposed: false,
            dead: false,
        }
    }

    fn tick(runner: &mut GoldenPathRunner, host: &mut FixtureHost, monitor: &InvariantMonitor) {
        runner.pre_update(DT, host);
        runner.post_update(DT, host, monitor);
    }

    /// Started runner whose next waypoint sits at `offset` from the player.
    fn aimed(host: &mut FixtureHost, milestone: Milestone, offset: Vec2) -> GoldenPathRunner {
        let mut runner = GoldenPathRunner::with_script(script(vec![milestone]));
        runner.start(host);
        let position = host.player.position();
        runner.run.path = vec![Vec2::new(position.x + offset.x, position.y + offset.y)];
        runner
    }

    fn failing_monitor() -> InvariantMonitor {
        let mut embedded = host();
        let y = embedded.player.body.position.y;
        embedded.player.body.position = Vec2::new(32.0, y);
        let mut monitor = InvariantMonitor::default();
        for _ in 0..3 {
            monitor.run_checks(&embedded);
        }
        assert_eq!(monitor.status(), InvariantStatus::Fail);
        monitor
    }

    #[test]
    fn idle_boss_fight_is_a_stall() {
        let mut host = host();
        host.boss = Some(live_boss());
        let monitor = InvariantMonitor::default();
        let mut runner = GoldenPathRunner::with_script(script(vec![boss_fight()]));
        runner.start(&mut host);

        let mut ticks = 0;
        while runner.status() == RunStatus::Running && ticks < 600 {
            tick(&mut runner, &mut host, &monitor);
            ticks += 1;
        }

        assert_eq!(runner.status(), RunStatus::Fail);
        assert!((145..=160).contains(&ticks), "failed after {ticks} ticks");
        let failure = runner.failure_report().expect("failure report");
        assert_eq!(failure.constraint, "stalled movement");
        assert_eq!(failure.suggestion, "layout or physics constants");
        assert_eq!(failure.stage, "boss");
    }

    #[test]
    fn stuck_timer_decays_twice_as_fast_as_it_grows() {
        let mut host = host();
        host.world = host
            .world
            .clone()
            .with_boss_gate(Some(tile_center(TileCoord::new(8, 3), TILE)));
        let monitor = InvariantMonitor::default();
        let gate = Milestone::new("gate", "Gate", MilestoneKind::BossGate);
        let mut runner = GoldenPathRunner::with_script(script(vec![gate]));
        runner.start(&mut host);

        for _ in 0..61 {
            tick(&mut runner, &mut host, &monitor);
        }
        let stalled = runner.run.stuck_timer;
        assert!((stalled - 60.0 * DT).abs() < 1e-3, "{stalled}");

        let target = runner.path()[runner.path_index()];
        assert!(target.distance(host.player.position()) > 30.0);
        for _ in 0..5 {
            let step = 2.0 * (target.x - host.player.body.position.x).signum();
            host.player.body.position.x += step;
            tick(&mut runner, &mut host, &monitor);
        }
        let decayed = runner.run.stuck_timer;
        assert!((stalled - decayed - 10.0 * DT).abs() < 1e-3, "{stalled} -> {decayed}");
        assert_eq!(runner.status(), RunStatus::Running);
    }

    #[test]
    fn damage_past_the_budget_fails_the_run() {
        let mut host = host();
        host.boss = Some(live_boss());
        let monitor = InvariantMonitor::default();
        let mut runner = GoldenPathRunner::with_script(script(vec![boss_fight()]));
        runner.start(&mut host);

        host.player.health = 60.0;
        runner.post_update(DT, &mut host, &monitor);
        assert_eq!(runner.status(), RunStatus::Running);
        assert_eq!(runner.damage_taken(), 40.0);

        host.player.health = 25.0;
        runner.post_update(DT, &mut host, &monitor);
        assert_eq!(runner.status(), RunStatus::Fail);
        let failure = runner.failure_report().expect("failure report");
        assert_eq!(failure.constraint, "damage funnel exceeded budget");
        assert_eq!(failure.suggestion, "layout or combat balance");
    }

    fn dash_then(next: Milestone) -> (FixtureHost, GoldenPathRunner) {
        let mut host = host();
        host.world = host
            .world
            .clone()
            .with_ability_pickups(vec![AbilityPickup {
                ability: "dash".to_string(),
                position: tile_center(TileCoord::new(5, 3), TILE),
                collected: false,
            }])
            .with_save_points(vec![SavePoint {
                id: "camp".to_string(),
                position: tile_center(TileCoord::new(7, 3), TILE),
                active: false,
            }]);
        let dash = Milestone::new(
            "dash",
            "Dash",
            MilestoneKind::Ability {
                ability: "dash".to_string(),
            },
        );
        let runner = GoldenPathRunner::with_script(script(vec![dash, next]));
        (host, runner)
    }

    #[test]
    fn entering_a_checkpoint_stage_opens_a_fresh_damage_window() {
        let camp = Milestone::new(
            "camp",
            "Camp",
            MilestoneKind::Checkpoint {
                checkpoint_id: "camp".to_string(),
            },
        );
        let (mut host, mut runner) = dash_then(camp);
        let monitor = InvariantMonitor::default();
        runner.start(&mut host);
        tick(&mut runner, &mut host, &monitor);

        host.player.health = 50.0;
        runner.post_update(DT, &mut host, &monitor);
        assert_eq!(runner.damage_taken(), 50.0);

        host.abilities.grant("dash");
        runner.pre_update(DT, &mut host);
        assert_eq!(runner.stage_index(), 1);
        assert_eq!(runner.damage_taken(), 0.0);

        host.player.health = 20.0;
        runner.post_update(DT, &mut host, &monitor);
        assert_eq!(runner.damage_taken(), 30.0);
        assert_eq!(runner.status(), RunStatus::Running);
    }

    #[test]
    fn other_stages_keep_the_damage_window() {
        let gate = Milestone::new("gate", "Gate", MilestoneKind::BossGate);
        let (mut host, mut runner) = dash_then(gate);
        host.world = host
            .world
            .clone()
            .with_boss_gate(Some(tile_center(TileCoord::new(8, 3), TILE)));
        let monitor = InvariantMonitor::default();
        runner.start(&mut host);

        host.player.health = 50.0;
        runner.post_update(DT, &mut host, &monitor);
        host.abilities.grant("dash");
        runner.pre_update(DT, &mut host);
        assert_eq!(runner.stage_index(), 1);
        assert_eq!(runner.damage_taken(), 50.0);

        host.player.health = 20.0;
        runner.post_update(DT, &mut host, &monitor);
        assert_eq!(runner.status(), RunStatus::Fail);
    }

    #[test]
    fn monitor_failure_becomes_the_run_constraint() {
        let mut host = host();
        host.boss = Some(live_boss());
        let monitor = failing_monitor();
        let mut runner = GoldenPathRunner::with_script(script(vec![boss_fight()]));
        runner.start(&mut host);

        runner.post_update(DT, &mut host, &monitor);
        assert_eq!(runner.status(), RunStatus::Fail);
        let failure = runner.failure_report().expect("failure report");
        let last = monitor.log().last().map(ToString::to_string);
        assert_eq!(Some(failure.constraint.clone()), last);
        assert_eq!(failure.suggestion, "layout or collision integrity");
    }

    #[test]
    fn restarting_stops_the_previous_run_first() {
        let mut host = host();
        host.boss = Some(live_boss());
        let monitor = InvariantMonitor::default();
        let mut runner = GoldenPathRunner::with_script(script(vec![boss_fight()]));
        runner.start(&mut host);
        let first_draw = host.random.next_unit();
        for _ in 0..10 {
            tick(&mut runner, &mut host, &monitor);
        }
        assert!(!runner.path().is_empty());

        let report = runner.start(&mut host);
        assert_eq!(report.status, Verdict::Running);
        assert_eq!(runner.status(), RunStatus::Running);
        assert!(runner.path().is_empty());
        assert_eq!(runner.stage_index(), 0);
        assert!(host.random.is_overridden());
        assert_eq!(host.random.next_unit(), first_draw);
        assert!((runner.time_scale() - 1.6).abs() < f32::EPSILON);
    }

    #[test]
    fn stopping_an_idle_runner_changes_nothing() {
        let mut host = host();
        let ambient = {
            let mut twin = self::host();
            twin.random.next_unit()
        };
        let mut runner = GoldenPathRunner::with_script(script(vec![boss_fight()]));
        runner.stop(&mut host);

        assert_eq!(runner.status(), RunStatus::Idle);
        assert!(!runner.is_active());
        assert!(runner.failure_report().is_none());
        assert!(!host.random.is_overridden());
        assert_eq!(host.random.next_unit(), ambient);
        assert_eq!(runner.time_scale(), 1.0);
    }

    #[test]
    fn failure_is_reported_once_and_terminal_hooks_are_inert() {
        let mut host = host();
        host.boss = Some(live_boss());
        let monitor = InvariantMonitor::default();
        let mut runner = GoldenPathRunner::with_script(script(vec![boss_fight()]));
        runner.start(&mut host);
        host.player.health = 10.0;
        runner.post_update(DT, &mut host, &monitor);
        let first = runner.failure_report().cloned().expect("failure report");
        assert!(!host.simulation_active);
        assert!(!host.random.is_overridden());
        assert_eq!(host.results.get(&TestSuite::GoldenPath), Some(&Verdict::Fail));

        host.player.health = 0.0;
        host.intents.right = true;
        runner.post_update(DT, &mut host, &failing_monitor());
        runner.pre_update(DT, &mut host);
        runner.fail(&mut host, FailureDetail::new("later", "elsewhere"));

        assert_eq!(runner.status(), RunStatus::Fail);
        assert_eq!(runner.failure_report(), Some(&first));
        assert!(host.intents.is_empty());
        assert_eq!(runner.time_scale(), 1.0);
        let dashboard = runner.dashboard_report();
        assert!(dashboard
            .lines
            .contains(&"  Constraint: damage funnel exceeded budget".to_string()));
    }

    #[test]
    fn exhausted_script_passes_once() {
        let mut host = host();
        let monitor = InvariantMonitor::default();
        let mut runner = GoldenPathRunner::with_script(script(Vec::new()));
        runner.start(&mut host);
        tick(&mut runner, &mut host, &monitor);
        assert_eq!(runner.status(), RunStatus::Pass);
        assert!(host.victory);

        host.victory = false;
        tick(&mut runner, &mut host, &monitor);
        assert_eq!(runner.status(), RunStatus::Pass);
        assert!(!host.victory);
        assert!(runner.failure_report().is_none());
        assert_eq!(host.results.get(&TestSuite::GoldenPath), Some(&Verdict::Pass));
    }

    #[test]
    fn horizontal_intent_ignores_the_deadzone() {
        let mut host = host();
        let gate = Milestone::new("gate", "Gate", MilestoneKind::BossGate);
        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(5.0, 0.0));
        let intents = runner.compute_intents(DT, &mut host, &gate);
        assert!(!intents.left && !intents.right);

        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(7.0, 0.0));
        assert!(runner.compute_intents(DT, &mut host, &gate).right);
        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(-7.0, 0.0));
        assert!(runner.compute_intents(DT, &mut host, &gate).left);
    }

    #[test]
    fn jump_needs_a_high_waypoint_footing_and_cooldown() {
        let mut host = host();
        let monitor = InvariantMonitor::default();
        let gate = Milestone::new("gate", "Gate", MilestoneKind::BossGate);

        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(0.0, -23.0));
        assert!(!runner.compute_intents(DT, &mut host, &gate).jump);

        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(0.0, -25.0));
        assert!(runner.compute_intents(DT, &mut host, &gate).jump);
        assert!(!runner.compute_intents(DT, &mut host, &gate).jump);
        for _ in 0..13 {
            runner.post_update(DT, &mut host, &monitor);
        }
        assert!(runner.compute_intents(DT, &mut host, &gate).jump);

        host.player.on_ground = false;
        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(0.0, -25.0));
        assert!(!runner.compute_intents(DT, &mut host, &gate).jump);
        host.player.on_wall = 1;
        assert!(runner.compute_intents(DT, &mut host, &gate).jump);
    }

    #[test]
    fn dash_needs_distance_footing_and_a_ready_cooldown() {
        let mut host = host();
        let gate = Milestone::new("gate", "Gate", MilestoneKind::BossGate);
        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(79.0, 0.0));
        assert!(!runner.compute_intents(DT, &mut host, &gate).dash);

        let mut runner = aimed(&mut host, gate.clone(), Vec2::new(-81.0, 0.0));
        assert!(runner.compute_intents(DT, &mut host, &gate).dash);

        host.player.dash_cooldown = 0.1;
        assert!(!runner.compute_intents(DT, &mut host, &gate).dash);
        host.player.dash_cooldown = 0.0;
        host.player.on_ground = false;
        assert!(!runner.compute_intents(DT, &mut host, &gate).dash);
    }

    #[test]
    fn interact_fires_near_the_save_point_with_cooldown() {
        let mut host = host();
        let monitor = InvariantMonitor::default();
        let player = host.player.position();
        host.world = host.world.clone().with_save_points(vec![
            SavePoint {
                id: "near".to_string(),
                position: Vec2::new(player.x + 30.0, player.y),
                active: false,
            },
            SavePoint {
                id: "far".to_string(),
                position: Vec2::new(player.x + 40.0, player.y),
                active: false,
            },
        ]);
        let near = Milestone::new(
            "near",
            "Near",
            MilestoneKind::Checkpoint {
                checkpoint_id: "near".to_string(),
            },
        );
        let far = Milestone::new(
            "far",
            "Far",
            MilestoneKind::Checkpoint {
                checkpoint_id: "far".to_string(),
            },
        );

        let mut runner = aimed(&mut host, far.clone(), Vec2::new(40.0, 0.0));
        assert!(!runner.compute_intents(DT, &mut host, &far).interact);

        let mut runner = aimed(&mut host, near.clone(), Vec2::new(30.0, 0.0));
        assert!(runner.compute_intents(DT, &mut host, &near).interact);
        assert!(!runner.compute_intents(DT, &mut host, &near).interact);
        for _ in 0..25 {
            runner.post_update(DT, &mut host, &monitor);
        }
        assert!(runner.compute_intents(DT, &mut host, &near).interact);
    }

    #[test]
    fn boss_intents_follow_phase_and_abilities() {
        let mut host = host();
        host.boss = Some(live_boss());
        let boss = boss_fight();

        let mut runner = aimed(&mut host, boss.clone(), Vec2::default());
        let intents = runner.compute_intents(DT, &mut host, &boss);
        assert!(intents.rev);
        assert!(!intents.throw && !intents.flame && !intents.attack);

        host.abilities.grant("anchor");
        host.abilities.grant("flame");
        let mut runner = aimed(&mut host, boss.clone(), Vec2::default());
        let intents = runner.compute_intents(DT, &mut host, &boss);
        assert!(intents.throw && !intents.flame);
        assert!(!runner.compute_intents(DT, &mut host, &boss).throw);

        if let Some(state) = host.boss.as_mut() {
            state.phase = 1;
        }
        let mut runner = aimed(&mut host, boss.clone(), Vec2::default());
        let intents = runner.compute_intents(DT, &mut host, &boss);
        assert!(intents.flame && !intents.throw);
        host.player.flame_mode = true;
        let mut runner = aimed(&mut host, boss.clone(), Vec2::default());
        assert!(!runner.compute_intents(DT, &mut host, &boss).flame);

        if let Some(state) = host.boss.as_mut() {
            state.core_exposed = true;
        }
        let intents = runner.compute_intents(DT, &mut host, &boss);
        assert!(intents.attack && intents.rev);
        assert!(!runner.compute_intents(DT, &mut host, &boss).attack);
    }
}
