use tracing::info;

use crate::entities::{Archetype, EnemyState, PlayerState, SpawnRules};
use crate::geometry::{tile_center, world_to_tile, TileCoord};
use crate::reachability::{PathPlan, ReachabilityGraph, ReachabilityOracle};
use crate::report::{AuditReport, Verdict};
use crate::world::{AbilitySet, LevelWorld};

pub const MIN_ATTACKABLE_RATIO: f32 = 0.6;
pub const ATTACK_REACH: f32 = 60.0;
pub const MAX_GLOBAL_CAP: u32 = 16;
pub const MAX_REGION_CAP: u32 = 6;
const LISTED_UNREACHABLE: usize = 4;

/// Batch check that live encounters can actually be fought and spawn tuning is sane.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncounterAuditor;

impl EncounterAuditor {
    pub fn new() -> Self {
        Self
    }

    pub fn run(
        &self,
        world: &dyn LevelWorld,
        oracle: &dyn ReachabilityOracle,
        player: &PlayerState,
        enemies: &[EnemyState],
        spawn_rules: SpawnRules,
        abilities: &AbilitySet,
    ) -> AuditReport {
        let mut report = AuditReport::new(Verdict::Pass);
        let active = enemies.iter().filter(|enemy| !enemy.dead).collect::<Vec<_>>();
        let grounded = active
            .iter()
            .filter(|enemy| enemy.kind.archetype() == Archetype::Grounded)
            .collect::<Vec<_>>();
        let airborne = active.len() - grounded.len();

        if grounded.is_empty() {
            report.fail_line("No grounded enemy archetypes present.");
        } else {
            report.pass_line(format_args!("Grounded enemies active: {}.", grounded.len()));
            let tile_size = world.tile_size();
            let anchored = grounded.iter().any(|enemy| {
                let tile = world_to_tile(enemy.position(), tile_size);
                world.is_solid(tile.offset(0, 1), abilities)
            });
            if !anchored {
                report.fail_line("Grounded enemies are not anchored to floor tiles.");
            }
        }

        if airborne == 0 {
            report.fail_line("No airborne enemy archetypes present.");
        } else {
            report.pass_line(format_args!("Airborne enemies active: {airborne}."));
        }

        self.check_encounters(&mut report, world, oracle, player, &active, abilities);
        check_spawn_rules(&mut report, spawn_rules);

        if report.status == Verdict::Pass {
            report.pass_line("Encounter audit pass.");
        }
        info!(
            status = %report.status,
            enemies = active.len(),
            "encounter_audit_complete"
        );
        report
    }

    fn check_encounters(
        &self,
        report: &mut AuditReport,
        world: &dyn LevelWorld,
        oracle: &dyn ReachabilityOracle,
        player: &PlayerState,
        enemies: &[&EnemyState],
        abilities: &AbilitySet,
    ) {
        if enemies.is_empty() {
            report.fail_line("No active enemies to audit.");
            return;
        }

        let (attackable, unreachable): (Vec<&EnemyState>, Vec<&EnemyState>) = enemies
            .iter()
            .copied()
            .partition(|enemy| is_attackable(world, oracle, player, enemy, abilities));
        let ratio = attackable.len() as f32 / enemies.len() as f32;
        if ratio >= MIN_ATTACKABLE_RATIO {
            report.pass_line(format_args!(
                "Attackable encounters: {}/{}.",
                attackable.len(),
                enemies.len()
            ));
            return;
        }

        report.fail_line(format_args!(
            "Only {}/{} encounters are attackable.",
            attackable.len(),
            enemies.len()
        ));
        let tile_size = world.tile_size();
        let origin = player.body.standing_tile(tile_size);
        let survey = oracle.survey(world, origin, abilities);
        for enemy in unreachable.iter().take(LISTED_UNREACHABLE) {
            let tile = world_to_tile(enemy.position(), tile_size);
            report.detail_line(format_args!(
                "Unreachable: {} near {}.{}",
                enemy.kind.name(),
                tile,
                nearest_hint(world, oracle, &survey, tile, abilities)
            ));
        }
        if unreachable.len() > LISTED_UNREACHABLE {
            report.detail_line("Additional unreachable encounters omitted.");
        }
    }
}

/// A path exists from the player and ends within reach of the enemy.
fn is_attackable(
    world: &dyn LevelWorld,
    oracle: &dyn ReachabilityOracle,
    player: &PlayerState,
    enemy: &EnemyState,
    abilities: &AbilitySet,
) -> bool {
    let tile_size = world.tile_size();
    let start = player.body.standing_tile(tile_size);
    let target = world_to_tile(enemy.position(), tile_size);
    let PathPlan::Found(path) = oracle.plan_path(world, start, target, abilities) else {
        return false;
    };
    path.last().is_some_and(|last| {
        tile_center(*last, tile_size).distance(enemy.position()) <= ATTACK_REACH
    })
}

fn nearest_hint(
    world: &dyn LevelWorld,
    oracle: &dyn ReachabilityOracle,
    survey: &ReachabilityGraph,
    tile: TileCoord,
    abilities: &AbilitySet,
) -> String {
    let nearest = oracle.find_nearest_node(&survey.nodes, Some(&survey.reachable), tile);
    let detail = oracle.diagnose_failure(world, nearest.as_ref(), tile, abilities);
    match (nearest, detail.constraint) {
        (Some(nearest), Some(constraint)) => {
            format!(" Nearest reachable {}: {constraint}.", nearest.node.tile)
        }
        (Some(nearest), None) => format!(" Nearest reachable {}.", nearest.node.tile),
        (None, Some(constraint)) => format!(" {constraint}."),
        (None, None) => String::new(),
    }
}

fn check_spawn_rules(report: &mut AuditReport, rules: SpawnRules) {
    if rules.global_max > MAX_GLOBAL_CAP || rules.per_region > MAX_REGION_CAP {
        report.fail_line("Spawn caps too high.");
    } else {
        report.pass_line("Spawn caps enforced.");
    }
    if rules.cooldown <= 0.0 || rules.backoff_low_health <= 0.0 {
        report.fail_line("Spawn cooldown/backoff invalid.");
    } else {
        report.pass_line("Spawn cooldown/backoff enforced.");
    }
}
