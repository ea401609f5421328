use level_oracle::{
    AuditReport, AutoRepair, GameHost, GoldenPathRunner, InvariantMonitor, InvariantStatus,
    PlaytestSession, RunOutcome, SandboxGame, ScriptDocument, TestSuite, Verdict,
    DEFAULT_REPAIR_ATTEMPTS,
};
use tracing::{info, warn};

use super::bootstrap::PlaytestConfig;
use super::level_file::{load_level, LevelLoadError};

const REPLAY_KEY: &str = "replay";
const REPAIR_KEY: &str = "repair";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Validate,
    Coverage,
    Progression,
    Encounters,
    Golden,
    ReplayCheck,
    Repair,
    All,
}

impl Command {
    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name {
            "validate" => Some(Self::Validate),
            "coverage" => Some(Self::Coverage),
            "progression" => Some(Self::Progression),
            "encounters" => Some(Self::Encounters),
            "golden" => Some(Self::Golden),
            "replay-check" => Some(Self::ReplayCheck),
            "repair" => Some(Self::Repair),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Coverage => "coverage",
            Self::Progression => "progression",
            Self::Encounters => "encounters",
            Self::Golden => "golden",
            Self::ReplayCheck => "replay-check",
            Self::Repair => "repair",
            Self::All => "all",
        }
    }
}

/// One dashboard slot and the report published under it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SuiteRun {
    pub(crate) key: &'static str,
    pub(crate) report: AuditReport,
}

impl SuiteRun {
    fn new(suite: TestSuite, report: AuditReport) -> Self {
        Self {
            key: suite.key(),
            report,
        }
    }

    pub(crate) fn render(&self) -> String {
        let header = format!("[{}] {}", self.key, self.report.status.as_str().to_uppercase());
        if self.report.lines.is_empty() {
            header
        } else {
            format!("{header}\n{}", self.report.render())
        }
    }
}

pub(crate) fn any_failed(runs: &[SuiteRun]) -> bool {
    runs.iter().any(|run| run.report.status.is_failure())
}

pub(crate) fn execute(
    command: Command,
    config: &PlaytestConfig,
) -> Result<Vec<SuiteRun>, LevelLoadError> {
    info!(
        command = command.name(),
        root = %config.root.display(),
        level = %config.level_path.display(),
        "command_started"
    );
    let mut runs = Vec::new();
    match command {
        Command::Validate => {
            let mut game = load_level(&config.level_path)?;
            runs.push(validate(&mut game));
        }
        Command::Coverage => {
            let mut game = load_level(&config.level_path)?;
            runs.push(coverage(&mut game));
        }
        Command::Progression => {
            let mut game = load_level(&config.level_path)?;
            runs.push(progression(&mut game, config));
        }
        Command::Encounters => {
            let mut game = load_level(&config.level_path)?;
            runs.push(encounters(&mut game));
        }
        Command::Golden => {
            let mut game = load_level(&config.level_path)?;
            runs.extend(golden(&mut game, config).1);
        }
        Command::ReplayCheck => runs.push(replay_check(config)?),
        Command::Repair => {
            let mut game = load_level(&config.level_path)?;
            runs.push(repair(&mut game, config));
        }
        Command::All => {
            let mut game = load_level(&config.level_path)?;
            runs.push(validate(&mut game));
            runs.push(coverage(&mut game));
            runs.push(progression(&mut game, config));
            runs.push(encounters(&mut game));
            runs.extend(golden(&mut game, config).1);
        }
    }
    info!(
        command = command.name(),
        suites = runs.len(),
        failed = any_failed(&runs),
        "command_complete"
    );
    Ok(runs)
}

fn validate(game: &mut SandboxGame) -> SuiteRun {
    SuiteRun::new(TestSuite::WorldValidity, game.run_world_validity().report)
}

fn coverage(game: &mut SandboxGame) -> SuiteRun {
    SuiteRun::new(TestSuite::RoomCoverage, game.run_room_coverage().report)
}

/// Cache order from the script's ability milestones, or the level's authored order when the
/// script cannot be read.
fn ability_order(config: &PlaytestConfig) -> Vec<String> {
    match ScriptDocument::from_path(&config.script_path) {
        Ok(script) => script.ability_order(),
        Err(error) => {
            warn!(error = %error, "progression_order_from_level");
            Vec::new()
        }
    }
}

fn progression(game: &mut SandboxGame, config: &PlaytestConfig) -> SuiteRun {
    SuiteRun::new(
        TestSuite::Progression,
        game.run_progression_audit(&ability_order(config)),
    )
}

/// Applies the repair plan, then reruns the static audits after each auto fix until they pass.
fn repair(game: &mut SandboxGame, config: &PlaytestConfig) -> SuiteRun {
    let order = ability_order(config);
    let mut repairs = AutoRepair::load(&config.repair_path);
    repairs.apply_persistent_patches(game);
    repairs.apply_spawn_override(game);
    let report = repairs.run_repair_loop(game, DEFAULT_REPAIR_ATTEMPTS, |game| {
        let mut report = game.run_world_validity().report;
        report.merge(game.run_room_coverage().report);
        report.merge(game.run_progression_audit(&order));
        report
    });
    SuiteRun {
        key: REPAIR_KEY,
        report,
    }
}

fn encounters(game: &mut SandboxGame) -> SuiteRun {
    SuiteRun::new(TestSuite::Encounters, game.run_encounter_audit())
}

/// Scripted run followed by the monitor's verdict over the same ticks.
fn golden(game: &mut SandboxGame, config: &PlaytestConfig) -> (RunOutcome, [SuiteRun; 2]) {
    let runner = GoldenPathRunner::load(&config.script_path);
    let mut session = PlaytestSession::new(runner, InvariantMonitor::default());
    let outcome = session.run_golden_path(game, config.base_dt(), config.max_ticks);

    let mut report = outcome.report.clone();
    if outcome.ticks > 0 {
        report.detail_line(format_args!("Ticks: {}. Digest: {}.", outcome.ticks, outcome.digest));
    }
    let playability = playability_report(session.monitor());
    game.publish_result(TestSuite::Playability, playability.status);
    (
        outcome,
        [
            SuiteRun::new(TestSuite::GoldenPath, report),
            SuiteRun::new(TestSuite::Playability, playability),
        ],
    )
}

fn playability_report(monitor: &InvariantMonitor) -> AuditReport {
    let status = monitor.status();
    let summary = format!(
        "Playability invariants {} after {} passes.",
        status.as_str(),
        monitor.passes()
    );
    let mut report = AuditReport::new(Verdict::Pass);
    match status {
        InvariantStatus::Ok => report.pass_line(summary),
        InvariantStatus::Warn => {
            report.status = Verdict::Warn;
            report.flag_line(summary);
        }
        InvariantStatus::Fail => report.fail_line(summary),
    }
    for entry in monitor.log().iter() {
        report.detail_line(entry);
    }
    report
}

/// Runs the level twice from fresh sandboxes and compares trajectory digests.
fn replay_check(config: &PlaytestConfig) -> Result<SuiteRun, LevelLoadError> {
    let mut outcomes = Vec::with_capacity(2);
    for _ in 0..2 {
        let mut game = load_level(&config.level_path)?;
        game.run_world_validity();
        outcomes.push(golden(&mut game, config).0);
    }

    let mut report = AuditReport::new(Verdict::Pass);
    let (first, second) = (&outcomes[0], &outcomes[1]);
    if first.verdict == Verdict::Fail && first.ticks == 0 {
        report.fail_line("Replay skipped: golden path did not start.");
        report.lines.extend(first.report.lines.iter().cloned());
    } else if first.digest == second.digest && first.ticks == second.ticks {
        report.pass_line(format_args!("Replay digests match: {}.", first.digest));
        report.detail_line(format_args!("Ticks: {}. Verdict: {}.", first.ticks, first.verdict));
    } else {
        report.fail_line("Replay digests differ.");
        report.detail_line(format_args!("First: {} after {} ticks.", first.digest, first.ticks));
        report.detail_line(format_args!("Second: {} after {} ticks.", second.digest, second.ticks));
    }
    Ok(SuiteRun {
        key: REPLAY_KEY,
        report,
    })
}
