use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::entities::{EnemyKind, SpawnRules, Upgrade};
use crate::geometry::TileCoord;
use crate::world::{AbilitySet, GridWorldError, Region};

pub const DEFAULT_TILE_SIZE: f32 = 32.0;
pub const DEFAULT_MAX_HEALTH: f32 = 100.0;
pub const DEFAULT_AMBIENT_SEED: u64 = 0x5eed;

/// On-disk level description the sandbox is built from. Positions are authored in tiles.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LevelFixture {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    pub rows: Vec<String>,
    /// Single-character glyph to the ability that opens it.
    #[serde(default)]
    pub gates: BTreeMap<String, String>,
    pub player: PlayerSpawn,
    #[serde(default)]
    pub enemies: Vec<EnemySpawn>,
    #[serde(default)]
    pub boss: Option<BossSpawn>,
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub save_points: Vec<SaveSpawn>,
    #[serde(default)]
    pub ability_pickups: Vec<PickupSpawn>,
    #[serde(default)]
    pub boss_gate: Option<TileCoord>,
    #[serde(default)]
    pub spawn_rules: SpawnRules,
    #[serde(default)]
    pub abilities: AbilitySet,
    #[serde(default)]
    pub upgrades: Vec<Upgrade>,
    #[serde(default = "default_ambient_seed")]
    pub ambient_seed: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlayerSpawn {
    pub tile: TileCoord,
    #[serde(default = "default_max_health")]
    pub max_health: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnemySpawn {
    pub kind: EnemyKind,
    pub tile: TileCoord,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BossSpawn {
    pub tile: TileCoord,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveSpawn {
    pub id: String,
    pub tile: TileCoord,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PickupSpawn {
    pub ability: String,
    pub tile: TileCoord,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixtureError {
    #[error("gate key '{0}' must be a single character")]
    GateGlyph(String),
    #[error("invalid level grid: {0}")]
    World(#[from] GridWorldError),
    #[error("max health must be positive, got {0}")]
    MaxHealth(f32),
}

impl LevelFixture {
    pub(crate) fn gate_glyphs(&self) -> Result<BTreeMap<char, String>, FixtureError> {
        let mut glyphs = BTreeMap::new();
        for (key, ability) in &self.gates {
            let mut chars = key.chars();
            let (Some(glyph), None) = (chars.next(), chars.next()) else {
                return Err(FixtureError::GateGlyph(key.clone()));
            };
            glyphs.insert(glyph, ability.clone());
        }
        Ok(glyphs)
    }
}

fn default_tile_size() -> f32 {
    DEFAULT_TILE_SIZE
}

fn default_max_health() -> f32 {
    DEFAULT_MAX_HEALTH
}

fn default_ambient_seed() -> u64 {
    DEFAULT_AMBIENT_SEED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_fixture_fills_defaults() {
        let fixture: LevelFixture = serde_json::from_value(
            serde_json::json!({ "rows": ["...", "###"], "player": { "tile": { "x": 0, "y": 0 } } }),
        )
        .expect("fixture");
        assert_eq!(fixture.tile_size, DEFAULT_TILE_SIZE);
        assert_eq!(fixture.player.max_health, DEFAULT_MAX_HEALTH);
        assert_eq!(fixture.spawn_rules, SpawnRules::default());
        assert!(fixture.enemies.is_empty());
        assert!(fixture.gate_glyphs().expect("glyphs").is_empty());
    }

    #[test]
    fn gate_keys_must_be_single_glyphs() {
        let fixture: LevelFixture = serde_json::from_value(
            serde_json::json!({
                "rows": ["..", "##"],
                "gates": { "DD": "dash" },
                "player": { "tile": { "x": 0, "y": 0 } }
            }),
        )
        .expect("fixture");
        assert_eq!(
            fixture.gate_glyphs(),
            Err(FixtureError::GateGlyph("DD".to_string()))
        );
    }

    #[test]
    fn unknown_enemy_kind_is_rejected() {
        let result = serde_json::from_value::<LevelFixture>(
            serde_json::json!({
                "rows": ["..", "##"],
                "player": { "tile": { "x": 0, "y": 0 } },
                "enemies": [ { "kind": "dragon", "tile": { "x": 1, "y": 0 } } ]
            }),
        );
        assert!(result.is_err());
    }
}
