//! Run reports.
//!
//! One [`TestRecord`] per bound test, collected into a [`RunReport`] that
//! renders as a console summary or serializes to JSON.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io;
use std::path::Path;

use crate::error::FailureKind;
use crate::exit::ExitCode;
use crate::logging::{LogEntry, format_entry};

/// Outcome of one bound test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Every assertion held.
    Passed,
    /// An assertion, liveness or cancellation check failed, or the test panicked.
    Failed,
    /// The test does not apply to the implementation's declared capabilities.
    Skipped,
}

/// Result of running one bound test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    /// Suite (contract) name.
    pub suite: String,
    /// Implementation name.
    pub implementation: String,
    /// Test id within the contract.
    pub id: String,
    /// Test name.
    pub name: String,
    /// Outcome.
    pub status: TestStatus,
    /// Failure classification, when failed.
    pub failure_kind: Option<FailureKind>,
    /// Failure message or skip reason.
    pub message: Option<String>,
    /// Wall-clock duration.
    pub duration_ms: u64,
    /// Checkpoints recorded by a failed test.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}

impl TestRecord {
    /// `suite/implementation/id`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}/{}", self.suite, self.implementation, self.id)
    }

    /// One-line console rendering.
    #[must_use]
    pub fn render_line(&self) -> String {
        let status = match self.status {
            TestStatus::Passed => "ok",
            TestStatus::Failed => "FAILED",
            TestStatus::Skipped => "skipped",
        };
        let mut line = format!(
            "{} ... {status} ({}ms)",
            self.qualified_name(),
            self.duration_ms
        );
        if let (TestStatus::Skipped, Some(reason)) = (self.status, &self.message) {
            let _ = write!(line, ": {reason}");
        }
        line
    }
}

/// Results of a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of tests run.
    pub total: usize,
    /// Tests that passed.
    pub passed: usize,
    /// Tests that failed.
    pub failed: usize,
    /// Tests skipped for capability reasons.
    pub skipped: usize,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// Per-test records in execution order.
    pub records: Vec<TestRecord>,
}

impl RunReport {
    /// Adds a record and updates the totals.
    pub fn push(&mut self, record: TestRecord) {
        self.total += 1;
        match record.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
        self.records.push(record);
    }

    /// Whether no test failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Process exit code for this report.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::TEST_FAILURE
        }
    }

    /// Failed records.
    pub fn failures(&self) -> impl Iterator<Item = &TestRecord> {
        self.records.iter().filter(|r| r.status == TestStatus::Failed)
    }

    /// Looks up a record by qualified name.
    #[must_use]
    pub fn record(&self, qualified_name: &str) -> Option<&TestRecord> {
        self.records
            .iter()
            .find(|r| r.qualified_name() == qualified_name)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary: failures with their messages and logs, then totals.
    #[must_use]
    pub fn render_console_summary(&self) -> String {
        let mut out = String::new();
        if self.failed > 0 {
            let _ = writeln!(out, "\nfailures:");
            for record in self.failures() {
                let kind = record
                    .failure_kind
                    .map_or_else(String::new, |k| format!(" [{k}]"));
                let _ = writeln!(out, "\n---- {}{kind} ----", record.qualified_name());
                if let Some(message) = &record.message {
                    let _ = writeln!(out, "{message}");
                }
                for entry in &record.logs {
                    let _ = writeln!(out, "  {}", format_entry(entry));
                }
            }
        }
        let verdict = if self.is_success() { "ok" } else { "FAILED" };
        let _ = writeln!(
            out,
            "\ntest result: {verdict}. {} passed; {} failed; {} skipped; finished in {}ms",
            self.passed, self.failed, self.skipped, self.duration_ms
        );
        out
    }
}

/// Writes `report` as pretty JSON to `path`, creating parent directories.
pub fn write_json_report(report: &RunReport, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = report.to_json().map_err(io::Error::other)?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: TestStatus) -> TestRecord {
        TestRecord {
            suite: "queue".into(),
            implementation: "seg-queue".into(),
            id: id.into(),
            name: id.into(),
            status,
            failure_kind: (status == TestStatus::Failed).then_some(FailureKind::Contract),
            message: match status {
                TestStatus::Passed => None,
                TestStatus::Failed => Some("boom".into()),
                TestStatus::Skipped => Some("not concurrent".into()),
            },
            duration_ms: 3,
            logs: Vec::new(),
        }
    }

    #[test]
    fn totals_and_exit_code() {
        let mut report = RunReport::default();
        report.push(record("queue-001", TestStatus::Passed));
        report.push(record("queue-002", TestStatus::Skipped));
        assert!(report.is_success());
        assert_eq!(report.exit_code(), ExitCode::SUCCESS);

        report.push(record("queue-003", TestStatus::Failed));
        assert_eq!(report.total, 3);
        assert_eq!((report.passed, report.failed, report.skipped), (1, 1, 1));
        assert_eq!(report.exit_code(), ExitCode::TEST_FAILURE);
        assert_eq!(report.failures().count(), 1);
        assert!(report.record("queue/seg-queue/queue-003").is_some());
    }

    #[test]
    fn console_summary_lists_failures() {
        let mut report = RunReport::default();
        report.push(record("queue-001", TestStatus::Passed));
        report.push(record("queue-003", TestStatus::Failed));
        let summary = report.render_console_summary();
        assert!(summary.contains("---- queue/seg-queue/queue-003 [contract] ----"));
        assert!(summary.contains("boom"));
        assert!(summary.contains("1 passed; 1 failed; 0 skipped"));
        assert!(record("queue-002", TestStatus::Skipped)
            .render_line()
            .ends_with(": not concurrent"));
    }

    #[test]
    fn json_report_shape() {
        let mut report = RunReport::default();
        report.push(record("queue-003", TestStatus::Failed));
        let value: serde_json::Value =
            serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["failed"], 1);
        let first = &value["records"][0];
        assert_eq!(first["status"], "failed");
        assert_eq!(first["failure_kind"], "contract");
        assert_eq!(first["implementation"], "seg-queue");
        assert!(first.get("logs").is_none());
    }
}
