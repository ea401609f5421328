//! Data-driven level repairs: persistent tile patches, movement tweaks, a spawn override, and a
//! bounded loop that applies one auto fix at a time until an audit suite passes.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geometry::{TileCoord, Vec2};
use crate::report::{AuditReport, Verdict};
use crate::world::GridWorldError;

pub const DEFAULT_REPAIR_ATTEMPTS: usize = 3;
pub const REPAIR_MARK: &str = "↺";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairPlan {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub spawn_override: Option<TileCoord>,
    #[serde(default)]
    pub tile_patches: Vec<TilePatch>,
    #[serde(default)]
    pub movement_tweaks: BTreeMap<String, i32>,
    #[serde(default)]
    pub auto_fixes: Vec<AutoFix>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePatch {
    pub id: String,
    #[serde(default)]
    pub changes: Vec<TileChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileChange {
    pub x: i32,
    pub y: i32,
    pub value: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoFix {
    pub id: String,
    #[serde(flatten)]
    pub action: FixAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FixAction {
    TilePatch {
        #[serde(rename = "ref")]
        patch: String,
    },
    MovementTweaks {
        #[serde(default)]
        values: BTreeMap<String, i32>,
    },
}

#[derive(Debug, Error)]
pub enum RepairLoadError {
    #[error("failed to read repairs {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse repairs at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RepairPlan {
    pub fn from_json(raw: &str) -> Result<Self, RepairLoadError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            RepairLoadError::Parse {
                path: error.path().to_string(),
                source: error.into_inner(),
            }
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, RepairLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| RepairLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }
}

/// Host side of a repair: the level and movement model it is allowed to change.
pub trait RepairTarget {
    fn patch_tile(&mut self, tile: TileCoord, glyph: char) -> Result<(), GridWorldError>;

    /// Returns false for an unknown movement key.
    fn tweak_movement(&mut self, key: &str, value: i32) -> bool;

    /// Moves the spawn and the player to `tile` and returns the new spawn position.
    fn override_spawn(&mut self, tile: TileCoord) -> Vec2;
}

/// Applies a [`RepairPlan`]. Every patch and fix is applied at most once per instance, and a
/// disabled plan applies nothing.
#[derive(Debug, Clone, Default)]
pub struct AutoRepair {
    plan: RepairPlan,
    applied: BTreeSet<String>,
    logs: Vec<String>,
}

impl AutoRepair {
    pub fn new(plan: RepairPlan) -> Self {
        Self {
            plan,
            applied: BTreeSet::new(),
            logs: Vec::new(),
        }
    }

    /// Unreadable or invalid plans leave the repairs disabled.
    pub fn load(path: &Path) -> Self {
        match RepairPlan::from_path(path) {
            Ok(plan) => {
                info!(
                    path = %path.display(),
                    enabled = plan.enabled,
                    patches = plan.tile_patches.len(),
                    fixes = plan.auto_fixes.len(),
                    "repair_plan_loaded"
                );
                Self::new(plan)
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "repair_plan_unavailable");
                Self::default()
            }
        }
    }

    pub fn plan(&self) -> &RepairPlan {
        &self.plan
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn is_applied(&self, id: &str) -> bool {
        self.applied.contains(id)
    }

    pub fn apply_persistent_patches<T: RepairTarget>(&mut self, target: &mut T) {
        self.logs.clear();
        if !self.plan.enabled {
            return;
        }
        let tweaks = self.plan.movement_tweaks.clone();
        self.apply_movement_tweaks(target, &tweaks);
        let patches = self.plan.tile_patches.clone();
        for patch in &patches {
            self.apply_tile_patch(target, patch);
        }
    }

    pub fn apply_spawn_override<T: RepairTarget>(&mut self, target: &mut T) -> bool {
        if !self.plan.enabled {
            return false;
        }
        let Some(tile) = self.plan.spawn_override else {
            return false;
        };
        let spawn = target.override_spawn(tile);
        info!(tile = %tile, x = spawn.x, y = spawn.y, "spawn_override_applied");
        self.logs
            .push(format!("Applied spawn override to {},{}.", tile.x, tile.y));
        true
    }

    /// Runs `run_suite`, then applies one auto fix and reruns it while the suite fails, up to
    /// `max_attempts` fixes. The returned report carries the repair log as `↺` lines.
    pub fn run_repair_loop<T, F>(
        &mut self,
        target: &mut T,
        max_attempts: usize,
        mut run_suite: F,
    ) -> AuditReport
    where
        T: RepairTarget,
        F: FnMut(&mut T) -> AuditReport,
    {
        let mut attempts = 0;
        let mut report = run_suite(target);
        while report.status == Verdict::Fail && attempts < max_attempts {
            if !self.apply_next_fix(target) {
                break;
            }
            report = run_suite(target);
            attempts += 1;
        }
        if report.status == Verdict::Fail {
            report.fail_line("Auto-repair exceeded attempts.");
        }
        report
            .lines
            .extend(self.logs.iter().map(|line| format!("{REPAIR_MARK} {line}")));
        info!(status = %report.status, attempts, "repair_loop_complete");
        report
    }

    fn apply_next_fix<T: RepairTarget>(&mut self, target: &mut T) -> bool {
        if !self.plan.enabled {
            return false;
        }
        let Some(fix) = self
            .plan
            .auto_fixes
            .iter()
            .find(|fix| !self.applied.contains(&fix.id))
            .cloned()
        else {
            return false;
        };
        self.applied.insert(fix.id.clone());
        match &fix.action {
            FixAction::TilePatch { patch } => {
                let Some(patch) = self
                    .plan
                    .tile_patches
                    .iter()
                    .find(|candidate| &candidate.id == patch)
                    .cloned()
                else {
                    warn!(fix = %fix.id, patch = %patch, "repair_patch_missing");
                    return false;
                };
                self.apply_tile_patch(target, &patch);
            }
            FixAction::MovementTweaks { values } => {
                self.apply_movement_tweaks(target, values);
            }
        }
        debug!(fix = %fix.id, "repair_fix_applied");
        true
    }

    fn apply_tile_patch<T: RepairTarget>(&mut self, target: &mut T, patch: &TilePatch) {
        if patch.changes.is_empty() || !self.applied.insert(patch.id.clone()) {
            return;
        }
        for change in &patch.changes {
            let tile = TileCoord::new(change.x, change.y);
            if let Err(error) = target.patch_tile(tile, change.value) {
                warn!(patch = %patch.id, tile = %tile, error = %error, "repair_change_skipped");
            }
        }
        info!(patch = %patch.id, changes = patch.changes.len(), "repair_patch_applied");
        self.logs.push(format!("Patch applied: {}", patch.id));
    }

    fn apply_movement_tweaks<T: RepairTarget>(
        &mut self,
        target: &mut T,
        tweaks: &BTreeMap<String, i32>,
    ) {
        for (key, value) in tweaks {
            if target.tweak_movement(key, *value) {
                self.logs.push(format!("Movement tweak: {key} -> {value}"));
            } else {
                warn!(key = %key, "repair_tweak_unknown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::nav::MovementProfile;
    use crate::world::{AbilitySet, GridWorld, LevelWorld};

    #[derive(Debug)]
    struct Bench {
        world: GridWorld,
        profile: MovementProfile,
        spawn: Option<TileCoord>,
    }

    impl Bench {
        fn new(rows: &[&str]) -> Self {
            Self {
                world: GridWorld::from_rows(rows, 32.0, &BTreeMap::new()).expect("world"),
                profile: MovementProfile::default(),
                spawn: None,
            }
        }

        fn open(&self, x: i32, y: i32) -> bool {
            !self.world.is_solid(TileCoord::new(x, y), &AbilitySet::new())
        }
    }

    impl RepairTarget for Bench {
        fn patch_tile(&mut self, tile: TileCoord, glyph: char) -> Result<(), GridWorldError> {
            self.world.set_glyph(tile, glyph)
        }

        fn tweak_movement(&mut self, key: &str, value: i32) -> bool {
            self.profile.set(key, value)
        }

        fn override_spawn(&mut self, tile: TileCoord) -> Vec2 {
            self.spawn = Some(tile);
            Vec2::new(tile.x as f32 * 32.0 + 16.0, tile.y as f32 * 32.0 + 16.0)
        }
    }

    /// Passes once the wall tile at 2,1 is open.
    fn wall_suite(bench: &mut Bench) -> AuditReport {
        let mut report = AuditReport::new(Verdict::Pass);
        if bench.open(2, 1) {
            report.pass_line("Wall open.");
        } else {
            report.fail_line("Wall closed.");
        }
        report
    }

    fn plan(raw: serde_json::Value) -> RepairPlan {
        serde_json::from_value(raw).expect("plan")
    }

    fn walled() -> Bench {
        Bench::new(&["#####", "#.#.#", "#####"])
    }

    #[test]
    fn plan_parses_fixes_of_both_kinds() {
        let plan = RepairPlan::from_json(
            &serde_json::json!({
                "enabled": true,
                "spawnOverride": { "x": 3, "y": 1 },
                "tilePatches": [ { "id": "door", "changes": [ { "x": 2, "y": 1, "value": "." } ] } ],
                "movementTweaks": { "dashDistance": 4 },
                "autoFixes": [
                    { "id": "fix-door", "type": "tilePatch", "ref": "door" },
                    { "id": "fix-jump", "type": "movementTweaks", "values": { "maxJumpHeight": 3 } }
                ]
            })
            .to_string(),
        )
        .expect("plan");
        assert_eq!(plan.spawn_override, Some(TileCoord::new(3, 1)));
        assert_eq!(plan.tile_patches[0].changes[0].value, '.');
        assert_eq!(
            plan.auto_fixes[0].action,
            FixAction::TilePatch {
                patch: "door".to_string()
            }
        );
        assert_eq!(
            plan.auto_fixes[1].action,
            FixAction::MovementTweaks {
                values: BTreeMap::from([("maxJumpHeight".to_string(), 3)])
            }
        );
    }

    #[test]
    fn parse_errors_name_the_field() {
        let raw = serde_json::json!({ "enabled": true, "autoFixes": [ { "id": "x", "type": "reboot" } ] })
            .to_string();
        let error = RepairPlan::from_json(&raw).expect_err("unknown fix type");
        let RepairLoadError::Parse { path, .. } = &error else {
            panic!("expected parse error, got {error:?}");
        };
        assert!(path.starts_with("autoFixes[0]"), "{path}");
    }

    #[test]
    fn missing_file_leaves_repairs_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut repair = AutoRepair::load(&dir.path().join("absent.json"));
        assert!(!repair.plan().enabled);
        let mut bench = walled();
        let report = repair.run_repair_loop(&mut bench, DEFAULT_REPAIR_ATTEMPTS, wall_suite);
        assert_eq!(report.status, Verdict::Fail);
        assert_eq!(
            report.lines,
            ["✗ Wall closed.", "✗ Auto-repair exceeded attempts."]
        );
    }

    #[test]
    fn loop_applies_fixes_until_the_suite_passes() {
        let mut repair = AutoRepair::new(plan(serde_json::json!({
            "enabled": true,
            "tilePatches": [ { "id": "door", "changes": [ { "x": 2, "y": 1, "value": "." } ] } ],
            "autoFixes": [
                { "id": "fix-jump", "type": "movementTweaks", "values": { "maxJumpHeight": 3 } },
                { "id": "fix-door", "type": "tilePatch", "ref": "door" },
                { "id": "fix-dash", "type": "movementTweaks", "values": { "dashDistance": 5 } }
            ]
        })));
        let mut bench = walled();
        let mut runs = 0;
        let report = repair.run_repair_loop(&mut bench, DEFAULT_REPAIR_ATTEMPTS, |bench| {
            runs += 1;
            wall_suite(bench)
        });

        assert_eq!(report.status, Verdict::Pass, "{}", report.render());
        assert_eq!(runs, 3);
        assert_eq!(
            report.lines,
            [
                "✓ Wall open.",
                "↺ Movement tweak: maxJumpHeight -> 3",
                "↺ Patch applied: door",
            ]
        );
        assert_eq!(bench.profile.max_jump_height, 3);
        assert_eq!(bench.profile.dash_distance, MovementProfile::default().dash_distance);
        assert!(repair.is_applied("fix-door") && repair.is_applied("door"));
        assert!(!repair.is_applied("fix-dash"));
    }

    #[test]
    fn loop_gives_up_after_max_attempts() {
        let mut repair = AutoRepair::new(plan(serde_json::json!({
            "enabled": true,
            "autoFixes": [
                { "id": "a", "type": "movementTweaks", "values": { "maxJumpHeight": 3 } },
                { "id": "b", "type": "movementTweaks", "values": { "maxJumpHeight": 4 } },
                { "id": "c", "type": "movementTweaks", "values": { "maxJumpHeight": 5 } },
                { "id": "d", "type": "movementTweaks", "values": { "maxJumpHeight": 6 } }
            ]
        })));
        let mut bench = walled();
        let mut runs = 0;
        let report = repair.run_repair_loop(&mut bench, DEFAULT_REPAIR_ATTEMPTS, |bench| {
            runs += 1;
            wall_suite(bench)
        });
        assert_eq!(runs, 4);
        assert_eq!(report.status, Verdict::Fail);
        assert_eq!(report.lines[1], "✗ Auto-repair exceeded attempts.");
        assert_eq!(report.lines.len(), 5);
        assert_eq!(bench.profile.max_jump_height, 5);
        assert!(!repair.is_applied("d"));
    }

    #[test]
    fn persistent_patches_apply_once_and_reset_the_log() {
        let mut repair = AutoRepair::new(plan(serde_json::json!({
            "enabled": true,
            "tilePatches": [
                { "id": "door", "changes": [ { "x": 2, "y": 1, "value": "." }, { "x": 9, "y": 9, "value": "." } ] },
                { "id": "empty", "changes": [] }
            ],
            "movementTweaks": { "maxDropDistance": 8, "gravity": 3 }
        })));
        let mut bench = walled();
        repair.apply_persistent_patches(&mut bench);
        assert!(bench.open(2, 1));
        assert_eq!(bench.profile.max_drop_distance, 8);
        assert_eq!(
            repair.logs(),
            ["Movement tweak: maxDropDistance -> 8", "Patch applied: door"]
        );

        bench.world.set_glyph(TileCoord::new(2, 1), '#').expect("close");
        repair.apply_persistent_patches(&mut bench);
        assert!(!bench.open(2, 1));
        assert_eq!(repair.logs(), ["Movement tweak: maxDropDistance -> 8"]);
    }

    #[test]
    fn spawn_override_needs_an_enabled_plan() {
        let raw = serde_json::json!({ "enabled": false, "spawnOverride": { "x": 3, "y": 1 } });
        let mut disabled = AutoRepair::new(plan(raw));
        let mut bench = walled();
        assert!(!disabled.apply_spawn_override(&mut bench));
        assert_eq!(bench.spawn, None);

        let raw = serde_json::json!({ "enabled": true, "spawnOverride": { "x": 3, "y": 1 } });
        let mut enabled = AutoRepair::new(plan(raw));
        assert!(enabled.apply_spawn_override(&mut bench));
        assert_eq!(bench.spawn, Some(TileCoord::new(3, 1)));
        assert_eq!(enabled.logs(), ["Applied spawn override to 3,1."]);

        let mut bench = walled();
        let report = enabled.run_repair_loop(&mut bench, DEFAULT_REPAIR_ATTEMPTS, wall_suite);
        assert_eq!(report.lines.last().map(String::as_str), Some("↺ Applied spawn override to 3,1."));
    }
}
