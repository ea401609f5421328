use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::TileCoord;
use crate::world::{AbilitySet, LevelWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Floor,
    Save,
    Ability,
    Boss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    pub tile: TileCoord,
    pub kind: NodeKind,
}

pub type NodeMap = BTreeMap<TileCoord, GraphNode>;
pub type EdgeMap = BTreeMap<TileCoord, Vec<TileCoord>>;
pub type ReachableSet = BTreeSet<TileCoord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearestNode {
    pub node: GraphNode,
    pub distance: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDetail {
    pub constraint: Option<String>,
    pub suggestion: Option<String>,
}

impl FailureDetail {
    pub fn new(constraint: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            constraint: Some(constraint.into()),
            suggestion: Some(suggestion.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPlan {
    /// Node tiles from the start node to the target node, both inclusive.
    Found(Vec<TileCoord>),
    Failed {
        reason: String,
        detail: Option<FailureDetail>,
    },
}

/// One snapshot of the traversal graph for a given ability set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReachabilityGraph {
    pub nodes: NodeMap,
    pub edges: EdgeMap,
    pub reachable: ReachableSet,
}

impl ReachabilityGraph {
    pub fn is_reachable(&self, tile: TileCoord) -> bool {
        self.reachable.contains(&tile)
    }
}

/// Graph builder, walker and path planner the audits consult. Implementations decide what a
/// node is and which moves connect nodes; the oracle components only read the results.
pub trait ReachabilityOracle {
    fn collect_nodes(&self, world: &dyn LevelWorld, abilities: &AbilitySet) -> NodeMap;

    fn build_edges(
        &self,
        world: &dyn LevelWorld,
        nodes: &NodeMap,
        abilities: &AbilitySet,
    ) -> EdgeMap;

    fn walk_graph(
        &self,
        world: &dyn LevelWorld,
        nodes: &NodeMap,
        edges: &EdgeMap,
        origin: TileCoord,
        abilities: &AbilitySet,
    ) -> ReachableSet;

    fn plan_path(
        &self,
        world: &dyn LevelWorld,
        start: TileCoord,
        target: TileCoord,
        abilities: &AbilitySet,
    ) -> PathPlan;

    fn diagnose_failure(
        &self,
        world: &dyn LevelWorld,
        nearest: Option<&NearestNode>,
        target: TileCoord,
        abilities: &AbilitySet,
    ) -> FailureDetail;

    /// Closest node by Manhattan distance, optionally restricted to `reachable`. Ties keep the
    /// first node in tile order.
    fn find_nearest_node(
        &self,
        nodes: &NodeMap,
        reachable: Option<&ReachableSet>,
        tile: TileCoord,
    ) -> Option<NearestNode> {
        let mut best: Option<NearestNode> = None;
        for node in nodes.values() {
            if reachable.is_some_and(|set| !set.contains(&node.tile)) {
                continue;
            }
            let distance = node.tile.manhattan(tile);
            if best.map_or(true, |current| distance < current.distance) {
                best = Some(NearestNode {
                    node: *node,
                    distance,
                });
            }
        }
        best
    }

    fn survey(
        &self,
        world: &dyn LevelWorld,
        origin: TileCoord,
        abilities: &AbilitySet,
    ) -> ReachabilityGraph {
        let nodes = self.collect_nodes(world, abilities);
        let edges = self.build_edges(world, &nodes, abilities);
        let reachable = self.walk_graph(world, &nodes, &edges, origin, abilities);
        ReachabilityGraph {
            nodes,
            edges,
            reachable,
        }
    }
}
