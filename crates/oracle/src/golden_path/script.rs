use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SIM_SPEED: f32 = 1.6;
pub const DEFAULT_DAMAGE_BUDGET: f32 = 0.7;

/// Critical-path script: a seed for the random override plus the ordered milestones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDocument {
    pub seed: i64,
    #[serde(default = "default_sim_speed")]
    pub sim_speed: f32,
    #[serde(default = "default_damage_budget")]
    pub damage_budget: f32,
    pub milestones: Vec<Milestone>,
}

fn default_sim_speed() -> f32 {
    DEFAULT_SIM_SPEED
}

fn default_damage_budget() -> f32 {
    DEFAULT_DAMAGE_BUDGET
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: MilestoneKind,
}

impl Milestone {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: MilestoneKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MilestoneKind {
    Ability {
        ability: String,
    },
    Checkpoint {
        #[serde(rename = "checkpointId")]
        checkpoint_id: String,
    },
    BossGate,
    Boss,
}

#[derive(Debug, Error)]
pub enum ScriptLoadError {
    #[error("failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse script{}: {source}", at_path(.path))]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("script field {field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
}

fn at_path(path: &str) -> String {
    if path.is_empty() || path == "." {
        String::new()
    } else {
        format!(" at {path}")
    }
}

impl ScriptDocument {
    pub fn from_json(raw: &str) -> Result<Self, ScriptLoadError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let document: ScriptDocument = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|error| {
                let path = error.path().to_string();
                ScriptLoadError::Parse {
                    path,
                    source: error.into_inner(),
                }
            })?;
        document.validate()?;
        Ok(document)
    }

    pub fn from_path(path: &Path) -> Result<Self, ScriptLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ScriptLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Abilities named by ability milestones, in script order without repeats.
    pub fn ability_order(&self) -> Vec<String> {
        let mut order = Vec::<String>::new();
        for milestone in &self.milestones {
            if let MilestoneKind::Ability { ability } = &milestone.kind {
                if !order.contains(ability) {
                    order.push(ability.clone());
                }
            }
        }
        order
    }

    fn validate(&self) -> Result<(), ScriptLoadError> {
        for (field, value) in [
            ("simSpeed", self.sim_speed),
            ("damageBudget", self.damage_budget),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ScriptLoadError::NonPositive { field, value });
            }
        }
        Ok(())
    }
}
