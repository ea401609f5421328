//! World validity gate: spawn validation and relocation of entities embedded in geometry.
//!
//! Relocation is a breadth-first search over 4-connected tiles from the entity's own tile,
//! bounded by `width * height` expansions. The first tile that fits the entity's footprint wins,
//! so results are always at the smallest BFS depth that has any valid candidate.

use std::collections::{BTreeSet, VecDeque};

use tracing::{info, warn};

use crate::entities::{EnemyState, EntityId, PlayerState};
use crate::geometry::{
    overlapped_tiles, standing_position, Body, Rect, TileCoord, Vec2, CONTACT_INSET,
};
use crate::report::{AuditReport, Verdict};
use crate::world::{AbilitySet, LevelWorld};

pub const DEFAULT_CLEARANCE_TILES: i32 = 2;

/// Whether any solid tile intersects `rect`. Edges touching a tile boundary do not count.
pub fn intersects_solid(world: &dyn LevelWorld, rect: Rect, abilities: &AbilitySet) -> bool {
    overlapped_tiles(rect, world.tile_size(), CONTACT_INSET).any(|tile| world.is_solid(tile, abilities))
}

/// Open tile with solid footing where a `width` x `height` body standing on the floor fits and
/// has headroom.
pub fn is_standable(
    world: &dyn LevelWorld,
    tile: TileCoord,
    abilities: &AbilitySet,
    width: f32,
    height: f32,
) -> bool {
    if world.is_solid(tile, abilities) || !world.is_solid(tile.offset(0, 1), abilities) {
        return false;
    }
    let tile_size = world.tile_size();
    let position = standing_position(tile, tile_size, height);
    if intersects_solid(world, Rect::centered(position, width, height), abilities) {
        return false;
    }
    let clearance = DEFAULT_CLEARANCE_TILES.max((height / tile_size).ceil() as i32);
    (1..=clearance).all(|dy| !world.is_solid(tile.offset(0, -dy), abilities))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found { tile: TileCoord, depth: u32 },
    Exhausted { expanded: usize },
}

impl SearchOutcome {
    pub fn tile(self) -> Option<TileCoord> {
        match self {
            SearchOutcome::Found { tile, .. } => Some(tile),
            SearchOutcome::Exhausted { .. } => None,
        }
    }
}

/// One bounded search for a standable tile near `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandableQuery {
    pub start: TileCoord,
    pub width: f32,
    pub height: f32,
}

impl StandableQuery {
    pub fn new(start: TileCoord, width: f32, height: f32) -> Self {
        Self {
            start,
            width,
            height,
        }
    }

    pub fn for_body(body: &Body, tile_size: f32) -> Self {
        Self::new(body.standing_tile(tile_size), body.width, body.height)
    }

    pub fn search(&self, world: &dyn LevelWorld, abilities: &AbilitySet) -> SearchOutcome {
        let budget = (world.width().max(0) as usize) * (world.height().max(0) as usize);
        let in_bounds = |tile: TileCoord| {
            tile.x >= 0 && tile.y >= 0 && tile.x < world.width() && tile.y < world.height()
        };

        let mut visited = BTreeSet::from([self.start]);
        let mut frontier = VecDeque::from([(self.start, 0_u32)]);
        let mut expanded = 0_usize;
        while expanded < budget {
            let Some((tile, depth)) = frontier.pop_front() else {
                break;
            };
            if is_standable(world, tile, abilities, self.width, self.height) {
                return SearchOutcome::Found { tile, depth };
            }
            for next in [
                tile.offset(1, 0),
                tile.offset(-1, 0),
                tile.offset(0, 1),
                tile.offset(0, -1),
            ] {
                if in_bounds(next) && visited.insert(next) {
                    frontier.push_back((next, depth + 1));
                }
            }
            expanded += 1;
        }
        SearchOutcome::Exhausted { expanded }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relocation {
    pub entity: EntityId,
    pub from: Vec2,
    pub to: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidityReport {
    pub report: AuditReport,
    /// Spawn point after any relocation.
    pub spawn: Vec2,
    pub relocations: Vec<Relocation>,
}

impl ValidityReport {
    pub fn status(&self) -> Verdict {
        self.report.status
    }
}

/// Validates the player spawn and pulls embedded entities out of solid geometry.
///
/// Entities are processed in order and each one is moved as soon as its search succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldValidityGate;

impl WorldValidityGate {
    pub fn new() -> Self {
        Self
    }

    pub fn run(
        &self,
        world: &dyn LevelWorld,
        player: &mut PlayerState,
        spawn: Vec2,
        abilities: &AbilitySet,
        enemies: &mut [EnemyState],
    ) -> ValidityReport {
        let tile_size = world.tile_size();
        let mut report = AuditReport::new(Verdict::Pass);
        let mut relocations = Vec::new();
        let mut spawn = spawn;

        let spawn_body = Body::new(spawn, player.body.width, player.body.height);
        let spawn_tile = spawn_body.standing_tile(tile_size);
        let spawn_valid = is_standable(world, spawn_tile, abilities, spawn_body.width, spawn_body.height)
            && !intersects_solid(world, spawn_body.rect(), abilities);
        if spawn_valid {
            report.pass_line("Spawn valid.");
        } else {
            report.flag_line("Spawn invalid. Attempting relocation.");
            match StandableQuery::for_body(&spawn_body, tile_size).search(world, abilities) {
                SearchOutcome::Found { tile, depth } => {
                    spawn = standing_position(tile, tile_size, spawn_body.height);
                    info!(tile = %tile, depth, "spawn_relocated");
                    report.pass_line(format_args!("Spawn relocated to {},{}.", tile.x, tile.y));
                }
                SearchOutcome::Exhausted { expanded } => {
                    warn!(tile = %spawn_tile, expanded, "spawn_unresolvable");
                    report.fail_line("No valid spawn location found.");
                    return ValidityReport {
                        report,
                        spawn,
                        relocations,
                    };
                }
            }
        }

        let from = player.body.position;
        player.body.position = spawn;
        if intersects_solid(world, player.body.rect(), abilities) {
            match StandableQuery::for_body(&player.body, tile_size).search(world, abilities) {
                SearchOutcome::Found { tile, .. } => {
                    player.body.position = standing_position(tile, tile_size, player.body.height);
                }
                SearchOutcome::Exhausted { .. } => {
                    report.fail_line("Player collision unresolved: player stuck in solid");
                }
            }
        }
        if player.body.position != from {
            relocations.push(Relocation {
                entity: player.id,
                from,
                to: player.body.position,
            });
        }

        let embedded = enemies
            .iter()
            .enumerate()
            .filter(|(_, enemy)| {
                enemy.solid && intersects_solid(world, enemy.body.rect(), abilities)
            })
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        if embedded.is_empty() {
            report.pass_line("Enemies clear of solids.");
        } else {
            report.flag_line(format_args!(
                "{} solid enemies intersect walls. Attempting fix.",
                embedded.len()
            ));
            for index in embedded {
                let enemy = &mut enemies[index];
                let from = enemy.body.position;
                match StandableQuery::for_body(&enemy.body, tile_size).search(world, abilities) {
                    SearchOutcome::Found { tile, depth } => {
                        enemy.body.position = standing_position(tile, tile_size, enemy.body.height);
                        info!(enemy = %enemy.label(), tile = %tile, depth, "enemy_relocated");
                        relocations.push(Relocation {
                            entity: enemy.id,
                            from,
                            to: enemy.body.position,
                        });
                        report.pass_line(format_args!("Enemy {} relocated.", enemy.kind.name()));
                    }
                    SearchOutcome::Exhausted { expanded } => {
                        warn!(enemy = %enemy.label(), expanded, "enemy_still_embedded");
                        report.fail_line(format_args!("Enemy {} still embedded.", enemy.kind.name()));
                    }
                }
            }
        }

        if report.status == Verdict::Pass {
            report.pass_line("World validity pass.");
        }
        info!(
            status = %report.status,
            relocations = relocations.len(),
            "world_validity_complete"
        );
        ValidityReport {
            report,
            spawn,
            relocations,
        }
    }
}
