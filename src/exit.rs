//! Semantic exit codes for the `tck` runner.
//!
//! Codes stay in the range 0-125; higher codes are reserved by shells.

/// Exit codes for a test run.
pub struct ExitCode;

impl ExitCode {
    /// Every selected test passed or was skipped.
    pub const SUCCESS: i32 = 0;

    /// At least one test failed.
    pub const TEST_FAILURE: i32 = 1;

    /// Bad arguments or environment configuration; nothing ran.
    pub const CONFIG_ERROR: i32 = 2;

    /// The run completed but its report could not be written.
    pub const REPORT_ERROR: i32 = 3;

    /// Human-readable description of an exit code.
    #[must_use]
    pub const fn description(code: i32) -> &'static str {
        match code {
            0 => "success",
            1 => "test failure",
            2 => "configuration error",
            3 => "report error",
            _ => "unknown",
        }
    }

    /// Whether `code` indicates success.
    #[must_use]
    pub const fn is_success(code: i32) -> bool {
        code == Self::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_described() {
        let codes = [
            ExitCode::SUCCESS,
            ExitCode::TEST_FAILURE,
            ExitCode::CONFIG_ERROR,
            ExitCode::REPORT_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(ExitCode::description(*a), "unknown");
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(ExitCode::is_success(0));
        assert!(!ExitCode::is_success(ExitCode::TEST_FAILURE));
        assert_eq!(ExitCode::description(99), "unknown");
    }
}
