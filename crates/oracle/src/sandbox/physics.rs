use crate::geometry::{overlapped_tiles, Body, Vec2, CONTACT_INSET};
use crate::validity::intersects_solid;
use crate::world::{AbilitySet, LevelWorld};

/// Largest distance moved per collision sub-step, well under a tile so nothing tunnels.
const MAX_SUBSTEP: f32 = 8.0;
/// Tiles whose near edge is this far behind the leading edge are treated as already behind us.
const LEADING_EDGE_SLOP: f32 = 0.5;
const PROBE_DISTANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contacts {
    pub floor: bool,
    pub ceiling: bool,
    /// -1 blocked on the left, 1 on the right, 0 free.
    pub wall: i8,
}

/// Moves `body` by `delta`, horizontal axis first, snapping flush against any solid tile hit.
pub fn move_body(
    world: &dyn LevelWorld,
    body: &mut Body,
    delta: Vec2,
    abilities: &AbilitySet,
) -> Contacts {
    let mut contacts = Contacts::default();
    let steps = (delta.x.abs().max(delta.y.abs()) / MAX_SUBSTEP).ceil().max(1.0) as u32;
    let step = Vec2::new(delta.x / steps as f32, delta.y / steps as f32);
    for _ in 0..steps {
        if step.x != 0.0 && contacts.wall == 0 && step_x(world, body, step.x, abilities) {
            contacts.wall = if step.x > 0.0 { 1 } else { -1 };
        }
        if step.y > 0.0 && !contacts.floor && step_y(world, body, step.y, abilities) {
            contacts.floor = true;
        }
        if step.y < 0.0 && !contacts.ceiling && step_y(world, body, step.y, abilities) {
            contacts.ceiling = true;
        }
    }

    contacts.floor |= touching(world, body, Vec2::new(0.0, PROBE_DISTANCE), abilities);
    if contacts.wall == 0 {
        if touching(world, body, Vec2::new(-PROBE_DISTANCE, 0.0), abilities) {
            contacts.wall = -1;
        } else if touching(world, body, Vec2::new(PROBE_DISTANCE, 0.0), abilities) {
            contacts.wall = 1;
        }
    }
    contacts
}

/// Whether `body` shifted by `offset` would intersect solid geometry.
pub fn touching(world: &dyn LevelWorld, body: &Body, offset: Vec2, abilities: &AbilitySet) -> bool {
    let shifted = Vec2::new(body.position.x + offset.x, body.position.y + offset.y);
    intersects_solid(world, body.rect_at(shifted), abilities)
}

fn step_x(world: &dyn LevelWorld, body: &mut Body, dx: f32, abilities: &AbilitySet) -> bool {
    let tile_size = world.tile_size();
    let half = body.width / 2.0;
    let leading = body.position.x + dx.signum() * half;
    let mut next = body.position;
    next.x += dx;
    let solid = overlapped_tiles(body.rect_at(next), tile_size, CONTACT_INSET)
        .filter(|tile| world.is_solid(*tile, abilities));
    let edge = if dx > 0.0 {
        solid
            .map(|tile| tile.x as f32 * tile_size)
            .filter(|edge| *edge >= leading - LEADING_EDGE_SLOP)
            .fold(None, |best: Option<f32>, edge| Some(best.map_or(edge, |b| b.min(edge))))
            .map(|edge| edge - half)
    } else {
        solid
            .map(|tile| (tile.x + 1) as f32 * tile_size)
            .filter(|edge| *edge <= leading + LEADING_EDGE_SLOP)
            .fold(None, |best: Option<f32>, edge| Some(best.map_or(edge, |b| b.max(edge))))
            .map(|edge| edge + half)
    };
    match edge {
        Some(x) => {
            body.position.x = x;
            true
        }
        None => {
            body.position = next;
            false
        }
    }
}

fn step_y(world: &dyn LevelWorld, body: &mut Body, dy: f32, abilities: &AbilitySet) -> bool {
    let tile_size = world.tile_size();
    let half = body.height / 2.0;
    let leading = body.position.y + dy.signum() * half;
    let mut next = body.position;
    next.y += dy;
    let solid = overlapped_tiles(body.rect_at(next), tile_size, CONTACT_INSET)
        .filter(|tile| world.is_solid(*tile, abilities));
    let edge = if dy > 0.0 {
        solid
            .map(|tile| tile.y as f32 * tile_size)
            .filter(|edge| *edge >= leading - LEADING_EDGE_SLOP)
            .fold(None, |best: Option<f32>, edge| Some(best.map_or(edge, |b| b.min(edge))))
            .map(|edge| edge - half)
    } else {
        solid
            .map(|tile| (tile.y + 1) as f32 * tile_size)
            .filter(|edge| *edge <= leading + LEADING_EDGE_SLOP)
            .fold(None, |best: Option<f32>, edge| Some(best.map_or(edge, |b| b.max(edge))))
            .map(|edge| edge + half)
    };
    match edge {
        Some(y) => {
            body.position.y = y;
            true
        }
        None => {
            body.position = next;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::geometry::{standing_position, TileCoord};
    use crate::world::GridWorld;

    fn world(rows: &[&str]) -> GridWorld {
        GridWorld::from_rows(rows, 32.0, &BTreeMap::new()).expect("world")
    }

    #[test]
    fn falling_body_lands_flush_on_the_floor() {
        let world = world(&["....", "....", "####"]);
        let mut body = Body::new(Vec2::new(48.0, 20.0), 20.0, 28.0);
        let contacts = move_body(&world, &mut body, Vec2::new(0.0, 100.0), &AbilitySet::new());
        assert!(contacts.floor);
        assert_eq!(body.position.y, 50.0);
        assert!(!intersects_solid(&world, body.rect(), &AbilitySet::new()));
    }

    #[test]
    fn fast_horizontal_move_stops_at_the_wall() {
        let world = world(&[".....#", ".....#", "######"]);
        let start = standing_position(TileCoord::new(1, 1), 32.0, 28.0);
        let mut body = Body::new(start, 20.0, 28.0);
        let contacts = move_body(&world, &mut body, Vec2::new(200.0, 0.0), &AbilitySet::new());
        assert_eq!(contacts.wall, 1);
        assert!(contacts.floor);
        assert_eq!(body.position.x, 160.0 - 10.0);
        assert_eq!(body.position.y, start.y);
    }

    #[test]
    fn rising_body_bumps_the_ceiling() {
        let world = world(&["####", "....", "....", "####"]);
        let start = standing_position(TileCoord::new(1, 2), 32.0, 28.0);
        let mut body = Body::new(start, 20.0, 28.0);
        let contacts = move_body(&world, &mut body, Vec2::new(0.0, -60.0), &AbilitySet::new());
        assert!(contacts.ceiling);
        assert_eq!(body.position.y, 32.0 + 14.0);
    }

    #[test]
    fn open_gate_lets_the_body_through() {
        let mut gates = BTreeMap::new();
        gates.insert('D', "dash".to_string());
        let world = GridWorld::from_rows(&["..D...", "######"], 32.0, &gates).expect("world");
        let start = standing_position(TileCoord::new(0, 0), 32.0, 28.0);

        let mut blocked = Body::new(start, 20.0, 28.0);
        move_body(&world, &mut blocked, Vec2::new(100.0, 0.0), &AbilitySet::new());
        assert_eq!(blocked.position.x, 64.0 - 10.0);

        let mut free = Body::new(start, 20.0, 28.0);
        let abilities = AbilitySet::from_iter(["dash"]);
        move_body(&world, &mut free, Vec2::new(100.0, 0.0), &abilities);
        assert!((free.position.x - (start.x + 100.0)).abs() < 1e-3);
    }
}
