use std::fmt;

pub const PASS_MARK: &str = "✓";
pub const FAIL_MARK: &str = "✗";

/// Status string shown on the test dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verdict {
    Idle,
    Running,
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Idle => "idle",
            Verdict::Running => "running",
            Verdict::Pass => "pass",
            Verdict::Warn => "warn",
            Verdict::Fail => "fail",
        }
    }

    pub fn is_failure(self) -> bool {
        self == Verdict::Fail
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard slot a report is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestSuite {
    GoldenPath,
    Playability,
    WorldValidity,
    RoomCoverage,
    Progression,
    Encounters,
}

impl TestSuite {
    pub fn key(self) -> &'static str {
        match self {
            TestSuite::GoldenPath => "golden",
            TestSuite::Playability => "playability",
            TestSuite::WorldValidity => "worldValidity",
            TestSuite::RoomCoverage => "roomCoverage",
            TestSuite::Progression => "progression",
            TestSuite::Encounters => "encounters",
        }
    }
}

/// Line-oriented report consumed verbatim by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub status: Verdict,
    pub lines: Vec<String>,
}

impl AuditReport {
    pub fn new(status: Verdict) -> Self {
        Self {
            status,
            lines: Vec::new(),
        }
    }

    pub fn pass_line(&mut self, text: impl fmt::Display) {
        self.lines.push(format!("{PASS_MARK} {text}"));
    }

    /// Records a failing line and marks the whole report failed.
    pub fn fail_line(&mut self, text: impl fmt::Display) {
        self.status = Verdict::Fail;
        self.lines.push(format!("{FAIL_MARK} {text}"));
    }

    /// Failing line that leaves the report status alone, for problems the caller goes on to fix.
    pub fn flag_line(&mut self, text: impl fmt::Display) {
        self.lines.push(format!("{FAIL_MARK} {text}"));
    }

    /// Indented diagnostic under the previous line.
    pub fn detail_line(&mut self, text: impl fmt::Display) {
        self.lines.push(format!("  {text}"));
    }

    /// Appends `other` below this report; the worse status wins.
    pub fn merge(&mut self, other: AuditReport) {
        self.status = self.status.max(other.status);
        self.lines.extend(other.lines);
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_line_downgrades_report() {
        let mut report = AuditReport::new(Verdict::Pass);
        report.pass_line("Spawn valid.");
        assert_eq!(report.status, Verdict::Pass);
        report.fail_line("Enemy skitter still embedded.");
        report.detail_line("Cause: blocked trajectory.");
        assert_eq!(report.status, Verdict::Fail);
        assert_eq!(
            report.render(),
            "✓ Spawn valid.\n✗ Enemy skitter still embedded.\n  Cause: blocked trajectory."
        );
    }

    #[test]
    fn merge_keeps_the_worse_status() {
        let mut suite = AuditReport::new(Verdict::Pass);
        suite.pass_line("Spawn valid.");
        let mut coverage = AuditReport::new(Verdict::Pass);
        coverage.fail_line("Crucible unreachable.");
        suite.merge(coverage);
        suite.merge(AuditReport::new(Verdict::Warn));
        assert_eq!(suite.status, Verdict::Fail);
        assert_eq!(suite.lines, ["✓ Spawn valid.", "✗ Crucible unreachable."]);
    }
}
