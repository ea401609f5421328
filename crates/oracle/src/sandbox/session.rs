use tracing::{info, warn};

use crate::golden_path::{GoldenPathRunner, RunStatus, TrajectoryDigest};
use crate::host::GameHost;
use crate::playability::InvariantMonitor;
use crate::report::{AuditReport, Verdict};

/// What happened inside one host step that the oracle cannot observe from state alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepEvents {
    pub enemy_hits: u32,
    pub player_damage: f32,
}

/// A host the session can advance by one tick.
pub trait Simulation: GameHost {
    fn step(&mut self, dt: f32) -> StepEvents;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub verdict: Verdict,
    pub ticks: u64,
    pub digest: String,
    pub report: AuditReport,
}

/// Owns the runner and the monitor and orders their hooks around each host step.
#[derive(Debug)]
pub struct PlaytestSession {
    runner: GoldenPathRunner,
    monitor: InvariantMonitor,
    digest: TrajectoryDigest,
    ticks: u64,
}

impl PlaytestSession {
    pub fn new(runner: GoldenPathRunner, monitor: InvariantMonitor) -> Self {
        Self {
            runner,
            monitor,
            digest: TrajectoryDigest::new(),
            ticks: 0,
        }
    }

    pub fn runner(&self) -> &GoldenPathRunner {
        &self.runner
    }

    pub fn monitor(&self) -> &InvariantMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut InvariantMonitor {
        &mut self.monitor
    }

    pub fn digest(&self) -> &TrajectoryDigest {
        &self.digest
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn start<H: Simulation>(&mut self, host: &mut H) -> AuditReport {
        self.digest = TrajectoryDigest::new();
        self.ticks = 0;
        self.runner.start(host)
    }

    pub fn stop<H: Simulation>(&mut self, host: &mut H) {
        self.runner.stop(host);
    }

    /// One frame: runner input, host step, monitor pass, runner bookkeeping.
    pub fn tick<H: Simulation>(&mut self, host: &mut H, base_dt: f32) {
        let dt = base_dt * self.runner.time_scale();
        let recording = self.runner.is_active() && self.runner.status() == RunStatus::Running;

        self.runner.pre_update(dt, host);
        let events = host.step(dt);
        if events.enemy_hits > 0 {
            self.monitor.record_enemy_hit(host.clock());
        }
        self.monitor.update(dt, &*host);
        self.runner.post_update(dt, host, &self.monitor);

        if recording {
            self.digest.record(&self.runner.sample());
        }
        self.ticks += 1;
    }

    /// Starts the golden path and ticks until it settles or `max_ticks` is spent. A run still
    /// going at the limit is stopped and reported as failed.
    pub fn run_golden_path<H: Simulation>(
        &mut self,
        host: &mut H,
        base_dt: f32,
        max_ticks: u64,
    ) -> RunOutcome {
        let started = self.start(host);
        if started.status == Verdict::Fail {
            return RunOutcome {
                verdict: Verdict::Fail,
                ticks: 0,
                digest: self.digest.finish_hex(),
                report: started,
            };
        }

        while self.runner.status() == RunStatus::Running && self.ticks < max_ticks {
            self.tick(host, base_dt);
        }

        let digest = self.digest.finish_hex();
        if self.runner.status() == RunStatus::Running {
            warn!(
                ticks = self.ticks,
                stage = self.runner.stage_index(),
                "golden_path_tick_budget_exhausted"
            );
            self.runner.stop(host);
            let mut report = AuditReport::new(Verdict::Fail);
            report.fail_line("Golden path failed.");
            report.detail_line(format_args!("Tick budget exhausted after {} ticks.", self.ticks));
            return RunOutcome {
                verdict: Verdict::Fail,
                ticks: self.ticks,
                digest,
                report,
            };
        }

        let report = self.runner.dashboard_report();
        info!(
            status = %report.status,
            ticks = self.ticks,
            samples = self.digest.samples(),
            digest = %digest,
            "golden_path_run_complete"
        );
        RunOutcome {
            verdict: report.status,
            ticks: self.ticks,
            digest,
            report,
        }
    }
}
