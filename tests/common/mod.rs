//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use bramble::config::RunConfig;
use bramble::report::{RecordingReporter, SuiteReport};
use bramble::{OperatorRegistry, SuiteDefinition, SuiteRunner, TestContext};

/// Ordered trace of what bodies and hooks ran.
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A body that appends `entry` to `log` and passes.
pub fn note(log: &Log, entry: &str) -> impl Fn(&mut TestContext<'_>) -> bramble::Result<()> + 'static {
    let log = Rc::clone(log);
    let entry = entry.to_string();
    move |_| {
        log.borrow_mut().push(entry.clone());
        Ok(())
    }
}

/// A runner with its own registry so tests never touch the global one.
pub fn runner(config: RunConfig) -> SuiteRunner {
    SuiteRunner::new(config).with_registry(OperatorRegistry::with_std().into_shared())
}

pub fn run(definition: &SuiteDefinition) -> (SuiteReport, RecordingReporter) {
    run_with(RunConfig::default(), definition)
}

pub fn run_with(config: RunConfig, definition: &SuiteDefinition) -> (SuiteReport, RecordingReporter) {
    let mut reporter = RecordingReporter::new();
    let report = runner(config)
        .run_suite(definition, &mut reporter)
        .unwrap();
    (report, reporter)
}
