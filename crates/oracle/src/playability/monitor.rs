use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::entities::EntityId;
use crate::geometry::{overlapped_tiles, world_to_tile, Body, TileCoord};
use crate::host::GameHost;
use crate::reachability::ReachabilityGraph;
use crate::world::{AbilitySet, LevelWorld};

use super::feedback::FeedbackStatus;
use super::log::{InvariantLog, LogEntry, LogLevel};

const PLAYER_LABEL: &str = "player";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    pub throttle_seconds: f32,
    pub log_capacity: usize,
    pub debounce_frames: u32,
    pub overlap_inset: f32,
    pub recovery_radius_tiles: u32,
    pub combat_radius: f32,
    pub combat_silence_seconds: f64,
    pub emphasis_seconds: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            throttle_seconds: 0.6,
            log_capacity: 12,
            debounce_frames: 3,
            overlap_inset: 0.5,
            recovery_radius_tiles: 18,
            combat_radius: 140.0,
            combat_silence_seconds: 6.0,
            emphasis_seconds: 3.0,
        }
    }
}

/// Ordered so that `max` is "worse".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvariantStatus {
    #[default]
    Ok,
    Warn,
    Fail,
}

impl InvariantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvariantStatus::Ok => "ok",
            InvariantStatus::Warn => "warn",
            InvariantStatus::Fail => "fail",
        }
    }
}

/// Live playability audit.
///
/// Every pass starts at [`InvariantStatus::Ok`] and each check can only escalate it. Passes run
/// every tick while the monitor is toggled on, under the test harness, or in the editor, and
/// every `throttle_seconds` otherwise.
#[derive(Debug, Clone)]
pub struct InvariantMonitor {
    config: MonitorConfig,
    active: bool,
    status: InvariantStatus,
    log: InvariantLog,
    check_timer: f32,
    status_timer: f32,
    passes: u64,
    overlap_frames: BTreeMap<(EntityId, TileCoord), u32>,
    overlap_highlights: Vec<TileCoord>,
    seen_entities: BTreeSet<EntityId>,
    spawn_issue_logged: BTreeSet<(EntityId, TileCoord)>,
    region_exit_logged: BTreeSet<String>,
    last_damage_time: f64,
}

impl Default for InvariantMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl InvariantMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            active: false,
            status: InvariantStatus::Ok,
            log: InvariantLog::new(config.log_capacity),
            check_timer: 0.0,
            status_timer: 0.0,
            passes: 0,
            overlap_frames: BTreeMap::new(),
            overlap_highlights: Vec::new(),
            seen_entities: BTreeSet::new(),
            spawn_issue_logged: BTreeSet::new(),
            region_exit_logged: BTreeSet::new(),
            last_damage_time: 0.0,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn toggle(&mut self) {
        self.active = !self.active;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self) -> InvariantStatus {
        self.status
    }

    pub fn log(&self) -> &InvariantLog {
        &self.log
    }

    /// Solid tiles found overlapping entities in the latest pass.
    pub fn overlap_highlights(&self) -> &[TileCoord] {
        &self.overlap_highlights
    }

    /// True shortly after a new log line, for UI emphasis only.
    pub fn recently_changed(&self) -> bool {
        self.status_timer > 0.0
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn debounce_count(&self, entity: EntityId, tile: TileCoord) -> Option<u32> {
        self.overlap_frames.get(&(entity, tile)).copied()
    }

    pub fn record_enemy_hit(&mut self, time: f64) {
        self.last_damage_time = time;
    }

    /// Returns whether a check pass ran this call.
    pub fn update(&mut self, dt: f32, host: &dyn GameHost) -> bool {
        let continuous = self.active || host.harness_active() || host.editor_mode();
        let ran = if continuous {
            self.run_checks(host);
            true
        } else {
            self.check_timer -= dt;
            if self.check_timer <= 0.0 {
                self.run_checks(host);
                self.check_timer = self.config.throttle_seconds;
                true
            } else {
                false
            }
        };
        self.status_timer = (self.status_timer - dt).max(0.0);
        ran
    }

    pub fn run_checks(&mut self, host: &dyn GameHost) {
        self.status = InvariantStatus::Ok;
        self.overlap_highlights.clear();
        self.passes += 1;

        let world = host.world();
        let abilities = host.abilities();
        let origin = host.player().body.standing_tile(world.tile_size());
        let survey = host.oracle().survey(world, origin, abilities);

        self.check_collision_integrity(host);
        self.check_spawns(host, &survey);
        self.check_recovery(host, &survey);
        self.check_combat_lock(host);
        self.check_spawn_caps(host);
        self.check_region_exits(world, abilities);
        self.check_action_feedback(host);
    }

    fn check_collision_integrity(&mut self, host: &dyn GameHost) {
        let world = host.world();
        let abilities = host.abilities();
        let player = host.player();
        let mut bodies = vec![(player.id, PLAYER_LABEL.to_string(), player.body)];
        bodies.extend(
            host.enemies()
                .iter()
                .filter(|enemy| !enemy.dead && enemy.solid)
                .map(|enemy| (enemy.id, enemy.label(), enemy.body)),
        );

        let mut observed = BTreeSet::new();
        for (id, label, body) in bodies {
            for tile in solid_overlaps(world, &body, abilities, self.config.overlap_inset) {
                self.overlap_highlights.push(tile);
                observed.insert((id, tile));
                let count = self.overlap_frames.entry((id, tile)).or_insert(0);
                *count += 1;
                if *count >= self.config.debounce_frames {
                    self.fail(format!(
                        "Collision overlap {label} with solid tile {},{}",
                        tile.x, tile.y
                    ));
                }
            }
        }
        self.overlap_frames.retain(|key, _| observed.contains(key));
    }

    fn check_spawns(&mut self, host: &dyn GameHost, survey: &ReachabilityGraph) {
        let world = host.world();
        let abilities = host.abilities();
        let tile_size = world.tile_size();
        let player = host.player();
        let mut entities = vec![(player.id, PLAYER_LABEL.to_string(), player.body)];
        entities.extend(
            host.enemies()
                .iter()
                .map(|enemy| (enemy.id, enemy.label(), enemy.body)),
        );

        for (id, label, body) in entities {
            if !self.seen_entities.insert(id) {
                continue;
            }
            let tile = body.standing_tile(tile_size);
            if world.is_solid(tile, abilities) {
                self.fail(format!(
                    "Spawn inside solid tile ({},{}) for {label}",
                    tile.x, tile.y
                ));
            }
            if !survey.is_reachable(tile) && self.spawn_issue_logged.insert((id, tile)) {
                self.warn(format!(
                    "Spawn sealed from reachable space for {label} at {},{}",
                    tile.x, tile.y
                ));
            }
        }
    }

    fn check_recovery(&mut self, host: &dyn GameHost, survey: &ReachabilityGraph) {
        let world = host.world();
        let tile_size = world.tile_size();
        let player_tile = host.player().body.standing_tile(tile_size);
        let radius = self.config.recovery_radius_tiles;
        let has_recovery = world.save_points().iter().any(|save| {
            let tile = world_to_tile(save.position, tile_size);
            survey.is_reachable(tile) && tile.manhattan(player_tile) < radius
        });
        if !has_recovery {
            self.warn(format!(
                "No nearby recovery point reachable within {radius} tiles"
            ));
        }
    }

    fn check_combat_lock(&mut self, host: &dyn GameHost) {
        let player = host.player();
        let now = host.clock();
        let nearby = host
            .enemies()
            .iter()
            .filter(|enemy| {
                !enemy.dead && enemy.position().distance(player.position()) < self.config.combat_radius
            })
            .collect::<Vec<_>>();
        if nearby.is_empty() {
            return;
        }

        let can_pierce = player.can_pierce();
        if !nearby.iter().any(|enemy| enemy.is_killable_with(can_pierce)) {
            self.warn("No killable enemy types in combat range with current kit");
        }
        let since_damage = now - self.last_damage_time;
        if since_damage > self.config.combat_silence_seconds {
            let mut kinds = Vec::<&str>::new();
            for enemy in &nearby {
                if !kinds.contains(&enemy.kind.name()) {
                    kinds.push(enemy.kind.name());
                }
            }
            self.warn(format!(
                "No enemy damage for {since_damage:.1}s near: {}",
                kinds.join(", ")
            ));
        }
    }

    fn check_spawn_caps(&mut self, host: &dyn GameHost) {
        let rules = host.spawn_rules();
        let world = host.world();
        let alive = host
            .enemies()
            .iter()
            .filter(|enemy| !enemy.dead)
            .collect::<Vec<_>>();
        if alive.len() > rules.global_max as usize {
            self.fail(format!(
                "Global enemy cap exceeded ({}/{})",
                alive.len(),
                rules.global_max
            ));
        }
        let mut per_region = BTreeMap::<String, u32>::new();
        for enemy in alive {
            *per_region
                .entry(world.region_at(enemy.position()).id)
                .or_insert(0) += 1;
        }
        for (region, count) in per_region {
            if count > rules.per_region {
                self.warn(format!(
                    "Region {region} exceeds cap ({count}/{})",
                    rules.per_region
                ));
            }
        }
    }

    fn check_region_exits(&mut self, world: &dyn LevelWorld, abilities: &AbilitySet) {
        for region in world.regions() {
            if self.region_exit_logged.contains(&region.id) {
                continue;
            }
            if perimeter_exits(world, region.rect, abilities) == 0 {
                self.region_exit_logged.insert(region.id.clone());
                self.warn(format!(
                    "Region {} has no obvious exit on perimeter",
                    region.name
                ));
            }
        }
    }

    fn check_action_feedback(&mut self, host: &dyn GameHost) {
        if !host.harness_active() {
            return;
        }
        let Some(feedback) = host.action_feedback() else {
            return;
        };
        let summary = feedback.summary(host.clock());
        let with_status = |status: FeedbackStatus| {
            summary
                .iter()
                .filter(|result| result.status == status)
                .map(|result| result.action)
                .collect::<Vec<_>>()
        };
        let missing = with_status(FeedbackStatus::Fail);
        let partial = with_status(FeedbackStatus::Warn);
        if !missing.is_empty() {
            self.fail(format!("Action feedback missing: {}", missing.join(", ")));
        } else if !partial.is_empty() {
            self.warn(format!("Action feedback incomplete: {}", partial.join(", ")));
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.status = self.status.max(InvariantStatus::Fail);
        self.push_log(LogLevel::Fail, message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.status = self.status.max(InvariantStatus::Warn);
        self.push_log(LogLevel::Warn, message.into());
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        let entry = LogEntry { level, message };
        let line = entry.to_string();
        if !self.log.push(entry) {
            return;
        }
        match level {
            LogLevel::Fail => warn!(entry = %line, "playability_log"),
            LogLevel::Warn => info!(entry = %line, "playability_log"),
        }
        self.status_timer = self.config.emphasis_seconds;
    }
}

fn solid_overlaps(
    world: &dyn LevelWorld,
    body: &Body,
    abilities: &AbilitySet,
    inset: f32,
) -> Vec<TileCoord> {
    overlapped_tiles(body.rect(), world.tile_size(), inset)
        .filter(|tile| world.is_solid(*tile, abilities))
        .collect()
}

/// Open perimeter tiles whose outward neighbour is also open.
fn perimeter_exits(
    world: &dyn LevelWorld,
    rect: crate::geometry::TileRect,
    abilities: &AbilitySet,
) -> usize {
    let open = |tile: TileCoord| !world.is_solid(tile, abilities);
    let crossing = |edge: TileCoord, outward: TileCoord| open(edge) && open(outward);
    let mut exits = 0;
    for x in rect.x..=rect.x + rect.w {
        exits += usize::from(crossing(TileCoord::new(x, rect.y), TileCoord::new(x, rect.y - 1)));
        exits += usize::from(crossing(
            TileCoord::new(x, rect.y + rect.h),
            TileCoord::new(x, rect.y + rect.h + 1),
        ));
    }
    for y in rect.y..=rect.y + rect.h {
        exits += usize::from(crossing(TileCoord::new(rect.x, y), TileCoord::new(rect.x - 1, y)));
        exits += usize::from(crossing(
            TileCoord::new(rect.x + rect.w, y),
            TileCoord::new(rect.x + rect.w + 1, y),
        ));
    }
    exits
}
