use std::collections::BTreeMap;

use tracing::info;

use crate::geometry::TileCoord;
use crate::reachability::{GraphNode, ReachabilityOracle};
use crate::report::{AuditReport, Verdict};
use crate::world::{AbilitySet, LevelWorld, Region};

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub report: AuditReport,
    /// Region id to whether any of its nodes is reachable.
    pub region_status: BTreeMap<String, bool>,
}

/// Checks that every authored region has at least one reachable standable node.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionCoverageAuditor;

impl RegionCoverageAuditor {
    pub fn new() -> Self {
        Self
    }

    pub fn run(
        &self,
        world: &dyn LevelWorld,
        oracle: &dyn ReachabilityOracle,
        origin: TileCoord,
        abilities: &AbilitySet,
    ) -> CoverageReport {
        let survey = oracle.survey(world, origin, abilities);
        let mut report = AuditReport::new(Verdict::Pass);
        let mut region_status = BTreeMap::new();

        for region in world.regions() {
            let candidates = survey
                .nodes
                .values()
                .filter(|node| region.rect.contains(node.tile))
                .collect::<Vec<_>>();
            if candidates.is_empty() {
                region_status.insert(region.id.clone(), false);
                report.fail_line(format_args!("{}: no standable tiles in region.", region.name));
                continue;
            }
            if candidates.iter().any(|node| survey.is_reachable(node.tile)) {
                region_status.insert(region.id.clone(), true);
                report.pass_line(format_args!("{} reachable.", region.name));
                continue;
            }

            region_status.insert(region.id.clone(), false);
            let target = representative(&candidates, region);
            let nearest = oracle.find_nearest_node(&survey.nodes, Some(&survey.reachable), target);
            let detail = oracle.diagnose_failure(world, nearest.as_ref(), target, abilities);
            report.fail_line(format_args!("{} unreachable.", region.name));
            match nearest {
                Some(nearest) => report.detail_line(format_args!("Blocked near {}.", nearest.node.tile)),
                None => report.detail_line("Blocked near unknown."),
            }
            if let Some(constraint) = &detail.constraint {
                report.detail_line(format_args!("Cause: {constraint}."));
            }
            if let Some(suggestion) = &detail.suggestion {
                report.detail_line(format_args!("Fix: {suggestion}."));
            }
        }

        if report.status == Verdict::Pass {
            report.pass_line("Room coverage pass.");
        }
        info!(
            status = %report.status,
            regions = region_status.len(),
            unreachable = region_status.values().filter(|reachable| !**reachable).count(),
            "room_coverage_complete"
        );
        CoverageReport {
            report,
            region_status,
        }
    }
}

/// Candidate closest to the region centre; the first one wins ties.
fn representative(candidates: &[&GraphNode], region: &Region) -> TileCoord {
    let center = region.rect.center();
    let mut best = candidates[0].tile;
    let mut best_distance = u32::MAX;
    for node in candidates {
        let distance = node.tile.manhattan(center);
        if distance < best_distance {
            best = node.tile;
            best_distance = distance;
        }
    }
    best
}
