//! `tck`: runs the contract suites against the bundled implementations.
//!
//! ```text
//! tck [--suite <NAME>] [--filter <TEXT>] [--json <FILE>] [--delay-factor <F>] [--log-level <LEVEL>]
//! tck --list
//! ```
//!
//! Environment variables (`TCK_DELAY_FACTOR`, `TCK_FILTER`, `TEST_LOG_LEVEL`,
//! `TCK_REPORT`) are applied first; flags override them.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use contract_tck::report::write_json_report;
use contract_tck::{ConfigError, ExitCode, LogLevel, Runner, TckConfig, init_logging};
use contract_tck_conformance::default_registry;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "tck", about = "Run collection, queue and concurrency contract suites.")]
struct Cli {
    /// Print the qualified name of every test and exit.
    #[arg(long)]
    list: bool,
    /// Only run tests whose `suite/implementation/id` contains this text.
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,
    /// Only run this suite.
    #[arg(long, value_name = "NAME")]
    suite: Option<String>,
    /// Write the run report as JSON to this file.
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,
    /// Multiplier for every timing delay; raise it on slow machines.
    #[arg(long, value_name = "F")]
    delay_factor: Option<f64>,
    /// Minimum level for log output (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,
}

impl Cli {
    /// Environment configuration overlaid with the flags.
    fn config(&self) -> Result<TckConfig, ConfigError> {
        let mut config = TckConfig::from_env()?;
        if let Some(factor) = self.delay_factor {
            config = config.delay_factor(factor);
        }
        if self.filter.is_some() {
            config = config.filter(self.filter.clone());
        }
        if let Some(level) = self.log_level {
            config = config.log_level(level);
        }
        if self.json.is_some() {
            config = config.report_path(self.json.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> process::ExitCode {
    let code = run(&Cli::parse());
    process::ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}

fn run(cli: &Cli) -> i32 {
    let mut config = match cli.config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("tck: {err}");
            return ExitCode::CONFIG_ERROR;
        }
    };
    init_logging(config.log_level);

    let mut registry = default_registry();
    if let Some(suite) = &cli.suite {
        if registry.suite(suite).is_none() {
            let known: Vec<&str> = registry.suites().iter().map(|s| s.name()).collect();
            eprintln!("tck: unknown suite '{suite}' (known: {})", known.join(", "));
            return ExitCode::CONFIG_ERROR;
        }
        registry = registry.only_suite(suite);
    }

    if cli.list {
        for name in registry.test_names() {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    // the report is written here so that a write failure changes the exit code
    let report_path = config.report_path.take();
    let runner = Runner::new(config);
    let report = runner.run(&registry);
    for record in &report.records {
        println!("{}", record.render_line());
    }
    print!("{}", report.render_console_summary());

    if let Some(path) = report_path {
        if let Err(err) = write_json_report(&report, &path) {
            eprintln!("tck: failed to write {}: {err}", path.display());
            return ExitCode::REPORT_ERROR;
        }
        tracing::info!(path = %path.display(), "JSON report written");
    }
    report.exit_code()
}
