use serde::{Deserialize, Serialize};

use crate::geometry::{Body, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Archetype {
    Grounded,
    Airborne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnemyKind {
    Skitter,
    Bulwark,
    Slicer,
    Practice,
    Spitter,
    Hivenode,
    Bouncer,
    Pouncer,
    Coward,
    Ranger,
    Floater,
    Drifter,
    Bobber,
    Harrier,
    Sentinel,
    Finalboss,
}

impl EnemyKind {
    pub const fn archetype(self) -> Archetype {
        match self {
            EnemyKind::Skitter
            | EnemyKind::Bulwark
            | EnemyKind::Slicer
            | EnemyKind::Practice
            | EnemyKind::Spitter
            | EnemyKind::Hivenode
            | EnemyKind::Bouncer
            | EnemyKind::Pouncer
            | EnemyKind::Coward
            | EnemyKind::Ranger => Archetype::Grounded,
            EnemyKind::Floater
            | EnemyKind::Drifter
            | EnemyKind::Bobber
            | EnemyKind::Harrier
            | EnemyKind::Sentinel
            | EnemyKind::Finalboss => Archetype::Airborne,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            EnemyKind::Skitter => "skitter",
            EnemyKind::Bulwark => "bulwark",
            EnemyKind::Slicer => "slicer",
            EnemyKind::Practice => "practice",
            EnemyKind::Spitter => "spitter",
            EnemyKind::Hivenode => "hivenode",
            EnemyKind::Bouncer => "bouncer",
            EnemyKind::Pouncer => "pouncer",
            EnemyKind::Coward => "coward",
            EnemyKind::Ranger => "ranger",
            EnemyKind::Floater => "floater",
            EnemyKind::Drifter => "drifter",
            EnemyKind::Bobber => "bobber",
            EnemyKind::Harrier => "harrier",
            EnemyKind::Sentinel => "sentinel",
            EnemyKind::Finalboss => "finalboss",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrade {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Upgrade {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: EntityId,
    pub body: Body,
    pub health: f32,
    pub max_health: f32,
    pub on_ground: bool,
    /// Remaining coyote time in seconds.
    pub coyote: f32,
    /// -1 touching a wall on the left, 1 on the right, 0 none.
    pub on_wall: i8,
    pub dash_cooldown: f32,
    pub flame_mode: bool,
    pub equipped_upgrades: Vec<Upgrade>,
}

impl PlayerState {
    pub fn new(id: EntityId, body: Body, max_health: f32) -> Self {
        Self {
            id,
            body,
            health: max_health,
            max_health,
            on_ground: false,
            coyote: 0.0,
            on_wall: 0,
            dash_cooldown: 0.0,
            flame_mode: false,
            equipped_upgrades: Vec::new(),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.body.position
    }

    pub fn can_pierce(&self) -> bool {
        self.equipped_upgrades
            .iter()
            .any(|upgrade| upgrade.has_tag("pierce"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyState {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub body: Body,
    pub health: f32,
    pub solid: bool,
    pub dead: bool,
    /// Guard dropped; only meaningful for bulwarks.
    pub open: bool,
}

impl EnemyState {
    pub fn new(id: EntityId, kind: EnemyKind, body: Body) -> Self {
        Self {
            id,
            kind,
            body,
            health: 1.0,
            solid: true,
            dead: false,
            open: false,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.body.position
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.kind.name(), self.id.0)
    }

    pub fn is_killable_with(&self, can_pierce: bool) -> bool {
        match self.kind {
            EnemyKind::Bulwark => self.open || can_pierce,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossState {
    pub position: Vec2,
    pub phase: u8,
    pub core_exposed: bool,
    pub dead: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRules {
    pub global_max: u32,
    pub per_region: u32,
    pub cooldown: f32,
    pub backoff_low_health: f32,
}

impl Default for SpawnRules {
    fn default() -> Self {
        Self {
            global_max: 12,
            per_region: 4,
            cooldown: 2.5,
            backoff_low_health: 1.5,
        }
    }
}

/// Per-tick input synthesized for the player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputIntents {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub dash: bool,
    pub interact: bool,
    pub throw: bool,
    pub flame: bool,
    pub rev: bool,
    pub attack: bool,
}

impl InputIntents {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
