use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::geometry::{world_to_tile, TileCoord};
use crate::reachability::{
    EdgeMap, FailureDetail, GraphNode, NearestNode, NodeKind, NodeMap, PathPlan,
    ReachabilityOracle, ReachableSet,
};
use crate::world::{AbilitySet, LevelWorld};

const DEFAULT_JUMP_HEIGHT_TILES: i32 = 2;
const DEFAULT_JUMP_DISTANCE_TILES: i32 = 3;
const DEFAULT_DROP_DISTANCE_TILES: i32 = 6;
const DEFAULT_DASH_DISTANCE_TILES: i32 = 3;

/// Movement envelope in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementProfile {
    pub max_jump_height: i32,
    pub max_jump_distance: i32,
    pub max_drop_distance: i32,
    pub dash_distance: i32,
}

impl Default for MovementProfile {
    fn default() -> Self {
        Self {
            max_jump_height: DEFAULT_JUMP_HEIGHT_TILES,
            max_jump_distance: DEFAULT_JUMP_DISTANCE_TILES,
            max_drop_distance: DEFAULT_DROP_DISTANCE_TILES,
            dash_distance: DEFAULT_DASH_DISTANCE_TILES,
        }
    }
}

impl MovementProfile {
    /// Derives the envelope from kinematic constants (units per second, units per second^2).
    pub fn from_kinematics(
        tile_size: f32,
        run_speed: f32,
        jump_speed: f32,
        gravity: f32,
        dash_speed: f32,
        dash_duration: f32,
    ) -> Self {
        let jump_height = jump_speed * jump_speed / (2.0 * gravity);
        Self {
            max_jump_height: ((jump_height / tile_size).floor() as i32).max(DEFAULT_JUMP_HEIGHT_TILES),
            max_jump_distance: ((run_speed * 0.45 / tile_size).ceil() as i32)
                .max(DEFAULT_JUMP_DISTANCE_TILES),
            max_drop_distance: DEFAULT_DROP_DISTANCE_TILES,
            dash_distance: ((dash_speed * dash_duration / tile_size).ceil() as i32)
                .max(DEFAULT_DASH_DISTANCE_TILES),
        }
    }

    /// Sets the field named by its camelCase key. Unknown keys change nothing.
    pub fn set(&mut self, key: &str, value: i32) -> bool {
        let field = match key {
            "maxJumpHeight" => &mut self.max_jump_height,
            "maxJumpDistance" => &mut self.max_jump_distance,
            "maxDropDistance" => &mut self.max_drop_distance,
            "dashDistance" => &mut self.dash_distance,
            _ => return false,
        };
        *field = value;
        true
    }

    fn for_abilities(self, abilities: &AbilitySet) -> Self {
        let bonus = i32::from(abilities.has("magboots") || abilities.has("anchor"));
        Self {
            max_jump_height: self.max_jump_height + bonus,
            ..self
        }
    }
}

/// Reference oracle over any [`LevelWorld`]: nodes are open tiles with solid footing plus
/// authored markers, edges are walk/jump/drop/dash moves whose trajectory stays clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridReachability {
    profile: MovementProfile,
}

impl GridReachability {
    pub fn new(profile: MovementProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> MovementProfile {
        self.profile
    }

    pub fn set_profile(&mut self, profile: MovementProfile) {
        self.profile = profile;
    }

    /// Rise first then travel for upward moves, travel first then fall for downward moves.
    fn clear_trajectory(
        &self,
        world: &dyn LevelWorld,
        from: TileCoord,
        to: TileCoord,
        abilities: &AbilitySet,
    ) -> bool {
        let corner = if to.y < from.y {
            TileCoord::new(from.x, to.y)
        } else {
            TileCoord::new(to.x, from.y)
        };
        segment_clear(world, from, corner, abilities) && segment_clear(world, corner, to, abilities)
    }

    fn nearest_any(&self, nodes: &NodeMap, tile: TileCoord) -> Option<NearestNode> {
        if let Some(node) = nodes.get(&tile) {
            return Some(NearestNode {
                node: *node,
                distance: 0,
            });
        }
        self.find_nearest_node(nodes, None, tile)
    }
}

fn segment_clear(
    world: &dyn LevelWorld,
    from: TileCoord,
    to: TileCoord,
    abilities: &AbilitySet,
) -> bool {
    let step_x = (to.x - from.x).signum();
    let step_y = (to.y - from.y).signum();
    let mut cursor = from;
    while cursor != to {
        cursor = cursor.offset(step_x, step_y);
        if world.is_solid(cursor, abilities) {
            return false;
        }
    }
    true
}

fn add_node(nodes: &mut NodeMap, tile: TileCoord, kind: NodeKind) {
    nodes.entry(tile).or_insert(GraphNode { tile, kind });
}

fn breadth_first(
    edges: &EdgeMap,
    start: TileCoord,
    goal: Option<TileCoord>,
) -> (ReachableSet, BTreeMap<TileCoord, TileCoord>) {
    let mut discovered = BTreeSet::from([start]);
    let mut parent = BTreeMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if Some(current) == goal {
            break;
        }
        for next in edges.get(&current).into_iter().flatten() {
            if discovered.insert(*next) {
                parent.insert(*next, current);
                queue.push_back(*next);
            }
        }
    }
    (discovered, parent)
}

impl ReachabilityOracle for GridReachability {
    fn collect_nodes(&self, world: &dyn LevelWorld, abilities: &AbilitySet) -> NodeMap {
        let mut nodes = NodeMap::new();
        for y in 0..world.height() {
            for x in 0..world.width() {
                let tile = TileCoord::new(x, y);
                if world.is_solid(tile, abilities) || !world.is_solid(tile.offset(0, 1), abilities)
                {
                    continue;
                }
                add_node(&mut nodes, tile, NodeKind::Floor);
            }
        }
        let tile_size = world.tile_size();
        for save in world.save_points() {
            add_node(&mut nodes, world_to_tile(save.position, tile_size), NodeKind::Save);
        }
        for pickup in world.ability_pickups() {
            add_node(
                &mut nodes,
                world_to_tile(pickup.position, tile_size),
                NodeKind::Ability,
            );
        }
        if let Some(gate) = world.boss_gate() {
            add_node(&mut nodes, world_to_tile(gate, tile_size), NodeKind::Boss);
        }
        nodes
    }

    fn build_edges(
        &self,
        world: &dyn LevelWorld,
        nodes: &NodeMap,
        abilities: &AbilitySet,
    ) -> EdgeMap {
        let profile = self.profile.for_abilities(abilities);
        let mut edges = EdgeMap::new();
        for tile in nodes.keys() {
            let mut list = Vec::<TileCoord>::new();
            let push = |target: TileCoord, list: &mut Vec<TileCoord>| {
                if nodes.contains_key(&target) && !list.contains(&target) {
                    list.push(target);
                }
            };

            for dx in [1, -1] {
                push(tile.offset(dx, 0), &mut list);
            }
            for dx in -profile.max_jump_distance..=profile.max_jump_distance {
                for dy in -profile.max_jump_height..=profile.max_drop_distance {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let target = tile.offset(dx, dy);
                    if !nodes.contains_key(&target)
                        || !self.clear_trajectory(world, *tile, target, abilities)
                    {
                        continue;
                    }
                    push(target, &mut list);
                }
            }
            for dx in -profile.dash_distance..=profile.dash_distance {
                if dx == 0 {
                    continue;
                }
                let target = tile.offset(dx, 0);
                if nodes.contains_key(&target) && segment_clear(world, *tile, target, abilities) {
                    push(target, &mut list);
                }
            }
            edges.insert(*tile, list);
        }
        edges
    }

    fn walk_graph(
        &self,
        _world: &dyn LevelWorld,
        nodes: &NodeMap,
        edges: &EdgeMap,
        origin: TileCoord,
        _abilities: &AbilitySet,
    ) -> ReachableSet {
        let Some(start) = self.nearest_any(nodes, origin) else {
            return ReachableSet::new();
        };
        breadth_first(edges, start.node.tile, None).0
    }

    fn plan_path(
        &self,
        world: &dyn LevelWorld,
        start: TileCoord,
        target: TileCoord,
        abilities: &AbilitySet,
    ) -> PathPlan {
        let nodes = self.collect_nodes(world, abilities);
        let edges = self.build_edges(world, &nodes, abilities);
        let (Some(start_node), Some(target_node)) =
            (self.nearest_any(&nodes, start), self.nearest_any(&nodes, target))
        else {
            let start_node = self.nearest_any(&nodes, start);
            return PathPlan::Failed {
                reason: "no nodes nearby".to_string(),
                detail: Some(self.diagnose_failure(world, start_node.as_ref(), target, abilities)),
            };
        };

        let start_tile = start_node.node.tile;
        let goal_tile = target_node.node.tile;
        let (discovered, parent) = breadth_first(&edges, start_tile, Some(goal_tile));
        if !discovered.contains(&goal_tile) {
            let reachable = breadth_first(&edges, start_tile, None).0;
            let nearest = self.find_nearest_node(&nodes, Some(&reachable), target);
            return PathPlan::Failed {
                reason: "target unreachable".to_string(),
                detail: Some(self.diagnose_failure(world, nearest.as_ref(), target, abilities)),
            };
        }

        let mut path = vec![goal_tile];
        let mut cursor = goal_tile;
        while cursor != start_tile {
            let Some(previous) = parent.get(&cursor) else {
                break;
            };
            cursor = *previous;
            path.push(cursor);
        }
        path.reverse();
        PathPlan::Found(path)
    }

    fn diagnose_failure(
        &self,
        _world: &dyn LevelWorld,
        nearest: Option<&NearestNode>,
        target: TileCoord,
        abilities: &AbilitySet,
    ) -> FailureDetail {
        let Some(nearest) = nearest else {
            return FailureDetail::new("no reachable nodes", "layout");
        };
        let profile = self.profile.for_abilities(abilities);
        let dx = target.x.abs_diff(nearest.node.tile.x) as i32;
        let dy = target.y - nearest.node.tile.y;
        if dy < -profile.max_jump_height {
            FailureDetail::new("jump height too high", "layout or physics constants")
        } else if dy > profile.max_drop_distance {
            FailureDetail::new("drop too far", "layout")
        } else if dx > profile.max_jump_distance {
            FailureDetail::new("gap too wide", "layout or physics constants")
        } else {
            FailureDetail::new("blocked trajectory", "layout")
        }
    }
}
