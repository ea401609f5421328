use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use level_oracle::{FixtureError, LevelFixture, SandboxGame};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub(crate) enum LevelLoadError {
    #[error("failed to read level {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse level {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("level {path} cannot be built: {source}")]
    Build {
        path: PathBuf,
        #[source]
        source: FixtureError,
    },
}

pub(crate) fn parse_level(raw: &str, path: &Path) -> Result<LevelFixture, LevelLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| LevelLoadError::Parse {
        path: path.to_path_buf(),
        field: error.path().to_string(),
        source: error.into_inner(),
    })
}

/// Reads the fixture at `path` and builds a fresh sandbox from it.
pub(crate) fn load_level(path: &Path) -> Result<SandboxGame, LevelLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LevelLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let fixture = parse_level(&raw, path)?;
    let game = SandboxGame::from_fixture(&fixture).map_err(|source| LevelLoadError::Build {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), level = %game.name(), "level_loaded");
    Ok(game)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use level_oracle::GameHost;

    use super::*;

    const SHIPPED_LEVEL: &str = include_str!("../../../../assets/levels/foundry.json");

    #[test]
    fn shipped_level_parses_and_builds() {
        let fixture = parse_level(SHIPPED_LEVEL, Path::new("foundry.json")).expect("fixture");
        assert_eq!(fixture.name, "foundry");
        assert!(fixture.rows.iter().all(|row| row.len() == fixture.rows[0].len()));
        let game = SandboxGame::from_fixture(&fixture).expect("sandbox");
        assert!(game.player().on_ground);
        assert_eq!(game.world().regions().len(), 2);
    }

    #[test]
    fn parse_errors_name_the_offending_field() {
        let raw = serde_json::json!({
            "rows": ["..", "##"],
            "player": { "tile": { "x": "left", "y": 0 } }
        })
        .to_string();
        let error = parse_level(&raw, Path::new("broken.json")).expect_err("should fail");
        let LevelLoadError::Parse { field, .. } = &error else {
            panic!("expected parse error, got {error:?}");
        };
        assert_eq!(field, "player.tile.x");
    }

    #[test]
    fn ragged_grid_is_a_build_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        let raw = serde_json::json!({
            "rows": ["...", "##"],
            "player": { "tile": { "x": 0, "y": 0 } }
        });
        file.write_all(raw.to_string().as_bytes()).expect("write");
        let error = load_level(file.path()).expect_err("should fail");
        assert!(matches!(error, LevelLoadError::Build { .. }), "{error}");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = load_level(&dir.path().join("absent.json")).expect_err("should fail");
        assert!(matches!(error, LevelLoadError::Read { .. }));
    }
}
