//! Sequential test runner.
//!
//! Every bound test runs on the calling thread with its own [`TestCx`]. A
//! failure, panic included, is confined to that test; after the body returns
//! the runner verifies that every auxiliary thread it started has terminated.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::config::{Delays, TckConfig};
use crate::context::TestCx;
use crate::error::{Failure, panic_message};
use crate::registry::{BoundTest, Registry};
use crate::report::{RunReport, TestRecord, TestStatus, write_json_report};

/// Runs bound tests and collects a [`RunReport`].
#[derive(Debug, Clone)]
pub struct Runner {
    config: TckConfig,
    delays: Delays,
}

impl Runner {
    /// Creates a runner for `config`.
    #[must_use]
    pub fn new(config: TckConfig) -> Self {
        let delays = config.delays();
        Self { config, delays }
    }

    /// The delays handed to every test.
    #[must_use]
    pub const fn delays(&self) -> &Delays {
        &self.delays
    }

    /// Whether `test` passes the configured filter.
    #[must_use]
    pub fn selects(&self, test: &BoundTest) -> bool {
        self.config
            .filter
            .as_deref()
            .is_none_or(|filter| test.qualified_name().contains(filter))
    }

    /// Runs every selected test of `registry`, in registration order.
    ///
    /// Writes the JSON report when a report path is configured; a write
    /// failure is logged and does not change the outcome of the run.
    pub fn run(&self, registry: &Registry) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::default();
        for test in registry.tests().filter(|t| self.selects(t)) {
            report.push(self.run_test(test));
        }
        report.duration_ms = millis(start.elapsed());

        tracing::info!(
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "run complete"
        );
        if let Some(path) = &self.config.report_path {
            if let Err(err) = write_json_report(&report, path) {
                tracing::error!(path = %path.display(), error = %err, "failed to write JSON report");
            }
        }
        report
    }

    /// Runs one bound test in a fresh context.
    pub fn run_test(&self, test: &BoundTest) -> TestRecord {
        let name = test.qualified_name();
        let span = tracing::info_span!("contract_test", test = %name);
        let _guard = span.enter();

        let cx = TestCx::new(self.delays);
        cx.log().info(format!("starting {name}"));
        tracing::info!("test started");

        let start = Instant::now();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| test.run(&cx))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(Failure::Panicked(panic_message(payload.as_ref()))),
        };
        // stragglers are checked even after a failure so they get interrupted
        let leftover = cx.finish();
        let outcome = outcome.and(leftover);
        let duration_ms = millis(start.elapsed());

        let meta = test.meta();
        let mut record = TestRecord {
            suite: test.suite().to_string(),
            implementation: test.implementation().to_string(),
            id: meta.id.clone(),
            name: meta.name.clone(),
            status: TestStatus::Passed,
            failure_kind: None,
            message: None,
            duration_ms,
            logs: Vec::new(),
        };

        match outcome {
            Ok(()) => match cx.skip_reason() {
                Some(reason) => {
                    tracing::info!(%reason, "test skipped");
                    record.status = TestStatus::Skipped;
                    record.message = Some(reason);
                }
                None => tracing::info!(duration_ms, "test passed"),
            },
            Err(failure) => {
                tracing::warn!(kind = %failure.kind(), %failure, "test failed");
                cx.log().warn(format!("failed: {failure}"));
                record.status = TestStatus::Failed;
                record.failure_kind = Some(failure.kind());
                record.message = Some(failure.to_string());
                record.logs = cx.log().drain();
            }
        }
        record
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(TckConfig::default())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Capabilities, Descriptor};
    use crate::error::FailureKind;
    use crate::registry::{Contract, ContractTest, TestCategory, TestMeta};

    #[derive(Debug, Clone)]
    struct Fake;

    impl Descriptor for Fake {
        fn name(&self) -> &str {
            "fake"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }
    }

    fn meta(id: &str) -> TestMeta {
        TestMeta {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: TestCategory::Collection,
            tags: Vec::new(),
            expected: String::new(),
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.bind(
            Contract::new(
                "fake",
                vec![
                    ContractTest::new(meta("f-001"), |_: &Fake, _| Ok(())),
                    ContractTest::new(meta("f-002"), |_: &Fake, cx| {
                        cx.log().debug("about to fail");
                        fail!("broken on purpose")
                    }),
                    ContractTest::new(meta("f-003"), |_: &Fake, _| panic!("kaboom")),
                    ContractTest::new(meta("f-004"), |_: &Fake, cx| {
                        cx.skip("not applicable");
                        Ok(())
                    }),
                ],
            ),
            Fake,
        );
        registry
    }

    #[test]
    fn failures_are_local_and_classified() {
        let report = Runner::default().run(&registry());
        assert_eq!(report.total, 4);
        assert_eq!((report.passed, report.failed, report.skipped), (1, 2, 1));

        let failed = report.record("fake/fake/f-002").unwrap();
        assert_eq!(failed.failure_kind, Some(FailureKind::Contract));
        assert!(failed.message.as_deref().unwrap().contains("broken on purpose"));
        assert!(failed.logs.iter().any(|e| e.message == "about to fail"));

        let panicked = report.record("fake/fake/f-003").unwrap();
        assert_eq!(panicked.failure_kind, Some(FailureKind::Panic));
        assert!(panicked.message.as_deref().unwrap().contains("kaboom"));

        let skipped = report.record("fake/fake/f-004").unwrap();
        assert_eq!(skipped.message.as_deref(), Some("not applicable"));
        assert!(skipped.logs.is_empty());
    }

    #[test]
    fn filter_selects_by_qualified_name() {
        let runner = Runner::new(TckConfig::default().filter(Some("f-001".into())));
        let report = runner.run(&registry());
        assert_eq!(report.total, 1);
        assert!(report.is_success());
    }

    #[test]
    fn leaked_thread_fails_the_test() {
        let mut registry = Registry::new();
        registry.bind(
            Contract::new(
                "leak",
                vec![ContractTest::new(meta("l-001"), |_: &Fake, cx| {
                    let _detached = cx.spawn("sleeper", |interrupt| {
                        while interrupt.park_timeout(Duration::from_secs(60)).is_ok() {}
                        Ok(())
                    });
                    Ok(())
                })],
            ),
            Fake,
        );
        let runner = Runner::new(TckConfig::default().delay_factor(0.01));
        let report = runner.run(&registry);
        let record = report.record("leak/fake/l-001").unwrap();
        assert_eq!(record.status, TestStatus::Failed);
        assert_eq!(record.failure_kind, Some(FailureKind::Liveness));
    }
}
