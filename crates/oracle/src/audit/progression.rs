use tracing::{debug, info};

use crate::geometry::{world_to_tile, TileCoord};
use crate::reachability::ReachabilityOracle;
use crate::report::{AuditReport, Verdict};
use crate::world::{AbilitySet, LevelWorld};

/// Abilities in the order their pickups are authored, without repeats.
pub fn authored_ability_order(world: &dyn LevelWorld) -> Vec<String> {
    let mut order = Vec::<String>::new();
    for pickup in world.ability_pickups() {
        if !order.contains(&pickup.ability) {
            order.push(pickup.ability.clone());
        }
    }
    order
}

/// Checks that each ability cache can be reached with the abilities gathered before it, and
/// that the boss gate can be reached once every cache is collected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressionAuditor;

impl ProgressionAuditor {
    pub fn new() -> Self {
        Self
    }

    /// An empty `order` falls back to [`authored_ability_order`].
    pub fn run(
        &self,
        world: &dyn LevelWorld,
        oracle: &dyn ReachabilityOracle,
        origin: TileCoord,
        abilities: &AbilitySet,
        order: &[String],
    ) -> AuditReport {
        let order = if order.is_empty() {
            authored_ability_order(world)
        } else {
            order.to_vec()
        };
        let tile_size = world.tile_size();
        let mut report = AuditReport::new(Verdict::Pass);
        let mut gathered = abilities.clone();
        let mut survey = oracle.survey(world, origin, &gathered);
        let mut checked = 0usize;

        for ability in &order {
            let Some(cache) = world
                .ability_pickups()
                .iter()
                .find(|pickup| &pickup.ability == ability)
            else {
                debug!(ability = %ability, "progression_cache_missing");
                continue;
            };
            checked += 1;
            let tile = world_to_tile(cache.position, tile_size);
            if survey.is_reachable(tile) {
                report.pass_line(format_args!("{ability} cache reachable"));
            } else {
                report.fail_line(format_args!("{ability} cache reachable"));
            }
            gathered.grant(ability.clone());
            survey = oracle.survey(world, origin, &gathered);
        }

        if let Some(gate) = world.boss_gate() {
            checked += 1;
            if survey.is_reachable(world_to_tile(gate, tile_size)) {
                report.pass_line("final boss gate reachable");
            } else {
                report.fail_line("final boss gate reachable");
            }
        }

        if checked == 0 {
            report.pass_line("No ability caches or boss gate to check.");
        }
        info!(
            status = %report.status,
            caches = order.len(),
            checked,
            "progression_audit_complete"
        );
        report
    }
}
