use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

const ROOT_ENV_VAR: &str = "LEVEL_ORACLE_ROOT";
const MAX_TICKS_ENV_VAR: &str = "LEVEL_ORACLE_MAX_TICKS";
const DEFAULT_MAX_TICKS: u64 = 20_000;
const DEFAULT_TICKS_PER_SECOND: u32 = 60;
const DEFAULT_LEVEL: &str = "assets/levels/foundry.json";
const DEFAULT_SCRIPT: &str = "assets/scripts/critical_path.json";
const DEFAULT_REPAIRS: &str = "assets/repairs.json";

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("invalid {var} value '{value}' (expected a positive integer)")]
    InvalidTickBudget { var: &'static str, value: String },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{env_var} is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf, env_var: &'static str },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/level-oracle\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Everything a command needs to find its inputs and bound its run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaytestConfig {
    pub(crate) root: PathBuf,
    pub(crate) level_path: PathBuf,
    pub(crate) script_path: PathBuf,
    pub(crate) repair_path: PathBuf,
    pub(crate) max_ticks: u64,
    pub(crate) ticks_per_second: u32,
}

impl PlaytestConfig {
    pub(crate) fn for_root(root: PathBuf) -> Self {
        Self {
            level_path: root.join(DEFAULT_LEVEL),
            script_path: root.join(DEFAULT_SCRIPT),
            repair_path: root.join(DEFAULT_REPAIRS),
            root,
            max_ticks: DEFAULT_MAX_TICKS,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }

    /// Root from the environment or executable location, tick budget from the environment.
    pub(crate) fn from_env() -> Result<Self, StartupError> {
        let mut config = Self::for_root(resolve_root()?);
        if let Some(max_ticks) = max_ticks_from_env()? {
            config.max_ticks = max_ticks;
        }
        Ok(config)
    }

    pub(crate) fn base_dt(&self) -> f32 {
        1.0 / self.ticks_per_second.max(1) as f32
    }
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn max_ticks_from_env() -> Result<Option<u64>, StartupError> {
    match env::var(MAX_TICKS_ENV_VAR) {
        Ok(value) => parse_tick_budget(&value).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(StartupError::EnvVar {
            var: MAX_TICKS_ENV_VAR,
            source,
        }),
    }
}

fn parse_tick_budget(value: &str) -> Result<u64, StartupError> {
    match value.trim().parse::<u64>() {
        Ok(ticks) if ticks > 0 => Ok(ticks),
        _ => Err(StartupError::InvalidTickBudget {
            var: MAX_TICKS_ENV_VAR,
            value: value.to_string(),
        }),
    }
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
