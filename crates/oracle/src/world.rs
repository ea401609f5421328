use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{world_to_tile, TileCoord, TileRect, Vec2};

/// Capability flags owned by the player, keyed by ability name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilitySet(BTreeSet<String>);

impl AbilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, ability: &str) -> bool {
        self.0.contains(ability)
    }

    pub fn grant(&mut self, ability: impl Into<String>) -> bool {
        self.0.insert(ability.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AbilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub rect: TileRect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePoint {
    pub id: String,
    pub position: Vec2,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityPickup {
    pub ability: String,
    pub position: Vec2,
    #[serde(default)]
    pub collected: bool,
}

/// Read-only view of the level geometry and its authored points of interest.
pub trait LevelWorld {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn tile_size(&self) -> f32;
    /// Out-of-bounds tiles are solid.
    fn is_solid(&self, tile: TileCoord, abilities: &AbilitySet) -> bool;
    fn regions(&self) -> &[Region];
    /// Region containing `point`, or a synthetic "outside" region.
    fn region_at(&self, point: Vec2) -> Region;
    fn save_points(&self) -> &[SavePoint];
    fn ability_pickups(&self) -> &[AbilityPickup];
    fn boss_gate(&self) -> Option<Vec2>;
}

pub const OUTSIDE_REGION_ID: &str = "outside";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridTile {
    Open,
    Solid,
    /// Index into `GridWorld::gate_abilities`; solid until that ability is owned.
    Gate(u16),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridWorldError {
    #[error("grid has no rows")]
    Empty,
    #[error("row {row} has width {actual}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown tile glyph '{glyph}' at {x},{y}")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(f32),
    #[error("tile {x},{y} is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
}

/// Tile grid built from ASCII rows: `#` solid, `.` open, any other glyph must be mapped to the
/// ability that opens it.
#[derive(Debug, Clone, PartialEq)]
pub struct GridWorld {
    width: i32,
    height: i32,
    tile_size: f32,
    tiles: Vec<GridTile>,
    gate_glyphs: BTreeMap<char, String>,
    gate_abilities: Vec<String>,
    regions: Vec<Region>,
    save_points: Vec<SavePoint>,
    ability_pickups: Vec<AbilityPickup>,
    boss_gate: Option<Vec2>,
}

impl GridWorld {
    pub fn from_rows<S: AsRef<str>>(
        rows: &[S],
        tile_size: f32,
        gates: &BTreeMap<char, String>,
    ) -> Result<Self, GridWorldError> {
        if tile_size.is_nan() || tile_size <= 0.0 {
            return Err(GridWorldError::InvalidTileSize(tile_size));
        }
        let first = rows.first().ok_or(GridWorldError::Empty)?;
        let expected = first.as_ref().chars().count();
        if expected == 0 {
            return Err(GridWorldError::Empty);
        }

        let mut world = Self {
            width: expected as i32,
            height: rows.len() as i32,
            tile_size,
            tiles: Vec::with_capacity(expected * rows.len()),
            gate_glyphs: gates.clone(),
            gate_abilities: Vec::new(),
            regions: Vec::new(),
            save_points: Vec::new(),
            ability_pickups: Vec::new(),
            boss_gate: None,
        };
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let actual = row.chars().count();
            if actual != expected {
                return Err(GridWorldError::RaggedRow {
                    row: y,
                    expected,
                    actual,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let tile = world
                    .tile_for(glyph)
                    .ok_or(GridWorldError::UnknownGlyph { glyph, x, y })?;
                world.tiles.push(tile);
            }
        }
        Ok(world)
    }

    /// Replaces one tile using the same glyph legend the grid was built with.
    pub fn set_glyph(&mut self, tile: TileCoord, glyph: char) -> Result<(), GridWorldError> {
        let index = self.index_of(tile).ok_or(GridWorldError::OutOfBounds {
            x: tile.x,
            y: tile.y,
        })?;
        let resolved = self.tile_for(glyph).ok_or(GridWorldError::UnknownGlyph {
            glyph,
            x: tile.x.max(0) as usize,
            y: tile.y.max(0) as usize,
        })?;
        self.tiles[index] = resolved;
        Ok(())
    }

    fn tile_for(&mut self, glyph: char) -> Option<GridTile> {
        match glyph {
            '#' => Some(GridTile::Solid),
            '.' => Some(GridTile::Open),
            other => {
                let ability = self.gate_glyphs.get(&other)?;
                let index = match self.gate_abilities.iter().position(|known| known == ability) {
                    Some(index) => index,
                    None => {
                        self.gate_abilities.push(ability.clone());
                        self.gate_abilities.len() - 1
                    }
                };
                Some(GridTile::Gate(index as u16))
            }
        }
    }

    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_save_points(mut self, save_points: Vec<SavePoint>) -> Self {
        self.save_points = save_points;
        self
    }

    pub fn with_ability_pickups(mut self, pickups: Vec<AbilityPickup>) -> Self {
        self.ability_pickups = pickups;
        self
    }

    pub fn with_boss_gate(mut self, boss_gate: Option<Vec2>) -> Self {
        self.boss_gate = boss_gate;
        self
    }

    pub fn save_points_mut(&mut self) -> &mut [SavePoint] {
        &mut self.save_points
    }

    pub fn ability_pickups_mut(&mut self) -> &mut [AbilityPickup] {
        &mut self.ability_pickups
    }

    fn index_of(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 || tile.x >= self.width || tile.y >= self.height {
            return None;
        }
        Some(tile.y as usize * self.width as usize + tile.x as usize)
    }
}

impl LevelWorld for GridWorld {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn tile_size(&self) -> f32 {
        self.tile_size
    }

    fn is_solid(&self, tile: TileCoord, abilities: &AbilitySet) -> bool {
        let Some(index) = self.index_of(tile) else {
            return true;
        };
        match self.tiles[index] {
            GridTile::Open => false,
            GridTile::Solid => true,
            GridTile::Gate(gate) => self
                .gate_abilities
                .get(gate as usize)
                .map_or(true, |ability| !abilities.has(ability)),
        }
    }

    fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn region_at(&self, point: Vec2) -> Region {
        let tile = world_to_tile(point, self.tile_size);
        self.regions
            .iter()
            .find(|region| region.rect.contains(tile))
            .cloned()
            .unwrap_or_else(|| Region {
                id: OUTSIDE_REGION_ID.to_string(),
                name: "Outside".to_string(),
                rect: TileRect {
                    x: 0,
                    y: 0,
                    w: self.width - 1,
                    h: self.height - 1,
                },
            })
    }

    fn save_points(&self) -> &[SavePoint] {
        &self.save_points
    }

    fn ability_pickups(&self) -> &[AbilityPickup] {
        &self.ability_pickups
    }

    fn boss_gate(&self) -> Option<Vec2> {
        self.boss_gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gates(pairs: &[(char, &str)]) -> BTreeMap<char, String> {
        pairs
            .iter()
            .map(|(glyph, ability)| (*glyph, ability.to_string()))
            .collect()
    }

    #[test]
    fn out_of_bounds_tiles_are_solid() {
        let world = GridWorld::from_rows(&["..", ".."], 32.0, &BTreeMap::new()).expect("world");
        let none = AbilitySet::new();
        assert!(!world.is_solid(TileCoord::new(1, 1), &none));
        assert!(world.is_solid(TileCoord::new(-1, 0), &none));
        assert!(world.is_solid(TileCoord::new(0, 2), &none));
    }

    #[test]
    fn gate_tiles_open_only_with_their_ability() {
        let world = GridWorld::from_rows(&[".M."], 32.0, &gates(&[('M', "magboots")])).expect("world");
        let gate = TileCoord::new(1, 0);
        assert!(world.is_solid(gate, &AbilitySet::new()));
        let owned = ["magboots"].into_iter().collect::<AbilitySet>();
        assert!(!world.is_solid(gate, &owned));
    }

    #[test]
    fn set_glyph_uses_the_build_legend() {
        let mut world =
            GridWorld::from_rows(&["#.#"], 32.0, &gates(&[('M', "magboots")])).expect("world");
        let none = AbilitySet::new();
        world.set_glyph(TileCoord::new(0, 0), '.').expect("open");
        assert!(!world.is_solid(TileCoord::new(0, 0), &none));
        world.set_glyph(TileCoord::new(1, 0), 'M').expect("gate");
        assert!(world.is_solid(TileCoord::new(1, 0), &none));
        let owned = ["magboots"].into_iter().collect::<AbilitySet>();
        assert!(!world.is_solid(TileCoord::new(1, 0), &owned));

        assert_eq!(
            world.set_glyph(TileCoord::new(3, 0), '.'),
            Err(GridWorldError::OutOfBounds { x: 3, y: 0 })
        );
        assert!(matches!(
            world.set_glyph(TileCoord::new(2, 0), 'q'),
            Err(GridWorldError::UnknownGlyph { glyph: 'q', .. })
        ));
        assert!(world.is_solid(TileCoord::new(2, 0), &none));
    }

    #[test]
    fn ragged_rows_and_unknown_glyphs_are_rejected() {
        assert_eq!(
            GridWorld::from_rows(&["...", ".."], 32.0, &BTreeMap::new()),
            Err(GridWorldError::RaggedRow {
                row: 1,
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            GridWorld::from_rows(&[".x."], 32.0, &BTreeMap::new()),
            Err(GridWorldError::UnknownGlyph {
                glyph: 'x',
                x: 1,
                y: 0
            })
        );
    }

    #[test]
    fn region_lookup_falls_back_to_outside() {
        let world = GridWorld::from_rows(&["....", "...."], 32.0, &BTreeMap::new())
            .expect("world")
            .with_regions(vec![Region {
                id: "r1".to_string(),
                name: "Entry".to_string(),
                rect: TileRect {
                    x: 0,
                    y: 0,
                    w: 1,
                    h: 1,
                },
            }]);
        assert_eq!(world.region_at(Vec2::new(10.0, 10.0)).name, "Entry");
        assert_eq!(world.region_at(Vec2::new(100.0, 10.0)).id, OUTSIDE_REGION_ID);
    }
}
