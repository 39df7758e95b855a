//! Command-line driver for suite binaries.
//!
//! A test binary collects its [`SuiteDefinition`]s and hands them to
//! [`run`]:
//!
//! ```rust,no_run
//! use bramble::runner::SuiteDefinition;
//!
//! fn main() -> std::process::ExitCode {
//!     bramble::cli::run(vec![SuiteDefinition::new("math", |s| {
//!         s.it("adds", |t| {
//!             t.should_be(1 + 1, 2)?;
//!             Ok(())
//!         })
//!     })])
//! }
//! ```
//!
//! Logs go to stderr, filtered by `BRAMBLE_LOG` (default `warn`); stdout
//! carries only the report.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::assertions::read_registry;
use crate::errors::Result;
use crate::report::{NullReporter, Reporter, SuiteOutcome};
use crate::runner::{SuiteDefinition, SuiteRunner};

pub mod args;
pub mod output;

use args::{BrambleArgs, Command};
use output::ConsoleReporter;

/// Parses the process arguments, runs the requested command and returns the
/// exit code: 0 on success, 1 on any failure.
pub fn run(suites: Vec<SuiteDefinition>) -> ExitCode {
    init_tracing();
    let args = BrambleArgs::parse();
    match execute(&args, &suites) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(1)
        }
    }
}

/// Runs one command. Returns whether everything succeeded.
pub fn execute(args: &BrambleArgs, suites: &[SuiteDefinition]) -> Result<bool> {
    let config = args.run_config()?;
    let output = config.output;
    let runner = SuiteRunner::new(config);
    let mut console = ConsoleReporter::stdout(output);

    match args.command() {
        Command::Operators => {
            let names = read_registry(runner.registry())?.list();
            console.operators(&names);
            Ok(true)
        }
        Command::Discover => {
            let mut ok = true;
            for suite in suites {
                let report = runner.discover(suite, &mut NullReporter)?;
                console.tree(&report.suite, &report.tree);
                for failure in &report.invalid_declarations {
                    console.invalid_declaration(&report.suite, failure);
                }
                if let SuiteOutcome::SetupFailed(failures) = &report.outcome {
                    for failure in failures {
                        console.setup_failure(&report.suite, failure);
                    }
                }
                ok &= report.is_success();
            }
            Ok(ok)
        }
        Command::Run => {
            let summary = runner.run_all(suites, &mut console)?;
            console.totals(&summary.totals, summary.failed_suites());
            Ok(summary.is_success())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BRAMBLE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
