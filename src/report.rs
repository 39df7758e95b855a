//! Reporting interface.
//!
//! The core emits events; it never formats them. The console renderer lives
//! in `cli::output`, and [`RecordingReporter`] keeps events in memory for
//! tests.

use crate::assertions::AssertionResult;
use crate::errors::BrambleError;
use crate::tree::{BlockNode, BlockTree};

/// How a failed Leaf failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// One or more recorded assertions did not succeed.
    Assertions(Vec<String>),
    /// The body returned an error or panicked.
    Fault(String),
    /// A `before_all` hook or enclosing group failed before the body ran.
    Setup(String),
}

impl Failure {
    pub fn messages(&self) -> Vec<&str> {
        match self {
            Failure::Assertions(messages) => messages.iter().map(String::as_str).collect(),
            Failure::Fault(message) | Failure::Setup(message) => vec![message.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Passed,
    Failed(Failure),
    Skipped,
    /// Excluded by a filter or by focus.
    NotRun,
}

impl TestOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TestOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed(_) => "failed",
            TestOutcome::Skipped => "skipped",
            TestOutcome::NotRun => "not run",
        }
    }
}

/// A failure raised while building the tree. Aborts the suite's Run phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupFailure {
    /// Dotted path of the block whose body failed; empty for the suite script.
    pub path: String,
    pub message: String,
}

/// Counters over Leaf outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_run: usize,
    /// Group-level faults: failing hooks or group bodies.
    pub block_faults: usize,
    /// Declarations rejected as malformed. Each fails only itself.
    pub invalid_declarations: usize,
}

impl TestSummary {
    pub fn record(&mut self, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed(_) => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
            TestOutcome::NotRun => self.not_run += 1,
        }
    }

    pub fn merge(&mut self, other: &TestSummary) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.not_run += other.not_run;
        self.block_faults += other.block_faults;
        self.invalid_declarations += other.invalid_declarations;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.block_faults > 0 || self.invalid_declarations > 0
    }

    /// Leaves that actually executed.
    pub fn total_tests(&self) -> usize {
        self.passed + self.failed
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_tests() == 0 {
            return 0.0;
        }
        (self.passed as f64 / self.total_tests() as f64) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuiteOutcome {
    Completed,
    SetupFailed(Vec<SetupFailure>),
    Diverged(String),
}

/// Result of running one suite through both phases.
#[derive(Debug)]
pub struct SuiteReport {
    pub suite: String,
    pub outcome: SuiteOutcome,
    pub summary: TestSummary,
    pub tree: BlockTree,
    /// Declarations skipped at Discovery because they were malformed.
    pub invalid_declarations: Vec<SetupFailure>,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.outcome == SuiteOutcome::Completed && !self.summary.has_failures()
    }
}

/// Receiver of execution events. Every method defaults to a no-op.
pub trait Reporter {
    fn suite_started(&mut self, _suite: &str) {}
    fn discovery_finished(&mut self, _suite: &str, _tree: &BlockTree) {}
    fn setup_failure(&mut self, _suite: &str, _failure: &SetupFailure) {}
    fn invalid_declaration(&mut self, _suite: &str, _failure: &SetupFailure) {}
    fn block_started(&mut self, _node: &BlockNode) {}
    fn block_fault(&mut self, _node: &BlockNode, _error: &BrambleError) {}
    fn assertion(&mut self, _node: &BlockNode, _result: &AssertionResult) {}
    fn test_finished(&mut self, _node: &BlockNode, _outcome: &TestOutcome) {}
    fn suite_finished(&mut self, _report: &SuiteReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    SuiteStarted { suite: String },
    DiscoveryFinished { suite: String, nodes: usize },
    SetupFailure { suite: String, failure: SetupFailure },
    InvalidDeclaration { suite: String, failure: SetupFailure },
    BlockStarted { path: String },
    BlockFault { path: String, message: String },
    Assertion { path: String, result: AssertionResult },
    TestFinished { path: String, outcome: TestOutcome },
    SuiteFinished { suite: String, outcome: SuiteOutcome, summary: TestSummary },
}

/// Keeps every event in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome of the Leaf at dotted `path`, if it was reported.
    pub fn outcome_of(&self, path: &str) -> Option<&TestOutcome> {
        self.events.iter().find_map(|e| match e {
            ReportEvent::TestFinished { path: p, outcome } if p == path => Some(outcome),
            _ => None,
        })
    }

    /// `(path, outcome)` for every finished Leaf, in report order.
    pub fn finished(&self) -> Vec<(&str, &TestOutcome)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::TestFinished { path, outcome } => Some((path.as_str(), outcome)),
                _ => None,
            })
            .collect()
    }

    pub fn started_blocks(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::BlockStarted { path } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn invalid_declarations(&self) -> Vec<&SetupFailure> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::InvalidDeclaration { failure, .. } => Some(failure),
                _ => None,
            })
            .collect()
    }

    pub fn faults(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::BlockFault { path, message } => Some((path.as_str(), message.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn suite_started(&mut self, suite: &str) {
        self.events.push(ReportEvent::SuiteStarted {
            suite: suite.to_string(),
        });
    }

    fn discovery_finished(&mut self, suite: &str, tree: &BlockTree) {
        self.events.push(ReportEvent::DiscoveryFinished {
            suite: suite.to_string(),
            nodes: tree.len() - 1,
        });
    }

    fn setup_failure(&mut self, suite: &str, failure: &SetupFailure) {
        self.events.push(ReportEvent::SetupFailure {
            suite: suite.to_string(),
            failure: failure.clone(),
        });
    }

    fn invalid_declaration(&mut self, suite: &str, failure: &SetupFailure) {
        self.events.push(ReportEvent::InvalidDeclaration {
            suite: suite.to_string(),
            failure: failure.clone(),
        });
    }

    fn block_started(&mut self, node: &BlockNode) {
        self.events.push(ReportEvent::BlockStarted {
            path: node.full_name.clone(),
        });
    }

    fn block_fault(&mut self, node: &BlockNode, error: &BrambleError) {
        self.events.push(ReportEvent::BlockFault {
            path: node.full_name.clone(),
            message: error.to_string(),
        });
    }

    fn assertion(&mut self, node: &BlockNode, result: &AssertionResult) {
        self.events.push(ReportEvent::Assertion {
            path: node.full_name.clone(),
            result: result.clone(),
        });
    }

    fn test_finished(&mut self, node: &BlockNode, outcome: &TestOutcome) {
        self.events.push(ReportEvent::TestFinished {
            path: node.full_name.clone(),
            outcome: outcome.clone(),
        });
    }

    fn suite_finished(&mut self, report: &SuiteReport) {
        self.events.push(ReportEvent::SuiteFinished {
            suite: report.suite.clone(),
            outcome: report.outcome.clone(),
            summary: report.summary,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = TestSummary::default();
        summary.record(&TestOutcome::Passed);
        summary.record(&TestOutcome::Passed);
        summary.record(&TestOutcome::Failed(Failure::Fault("boom".into())));
        summary.record(&TestOutcome::Skipped);
        summary.record(&TestOutcome::NotRun);
        assert_eq!(summary.total_tests(), 3);
        assert!(summary.has_failures());
        assert!((summary.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn invalid_declarations_count_as_failures() {
        let mut summary = TestSummary::default();
        summary.record(&TestOutcome::Passed);
        assert!(!summary.has_failures());
        let mut other = TestSummary::default();
        other.invalid_declarations = 1;
        summary.merge(&other);
        assert!(summary.has_failures());
        assert_eq!(summary.total_tests(), 1);
    }

    #[test]
    fn empty_summary_has_zero_rate() {
        assert_eq!(TestSummary::default().success_rate(), 0.0);
    }

    #[test]
    fn failure_messages_flatten() {
        let failure = Failure::Assertions(vec!["a".into(), "b".into()]);
        assert_eq!(failure.messages(), ["a", "b"]);
        assert_eq!(Failure::Setup("s".into()).messages(), ["s"]);
    }
}
