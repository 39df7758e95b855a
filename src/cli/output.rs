//! Console rendering of run events.
//!
//! `ConsoleReporter` writes to any `termcolor::WriteColor`; the CLI uses
//! stdout, tests use an in-memory buffer.

use std::io::Write;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::assertions::AssertionResult;
use crate::config::OutputLevel;
use crate::errors::BrambleError;
use crate::report::{Reporter, SetupFailure, SuiteOutcome, SuiteReport, TestOutcome, TestSummary};
use crate::tree::{BlockNode, BlockTree, NodeKind, Selection};

/// Colors only when stdout is a terminal.
pub fn color_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

pub struct ConsoleReporter<W: WriteColor = StandardStream> {
    out: W,
    level: OutputLevel,
}

impl ConsoleReporter<StandardStream> {
    pub fn stdout(level: OutputLevel) -> Self {
        Self::with_writer(StandardStream::stdout(color_choice()), level)
    }
}

impl<W: WriteColor> ConsoleReporter<W> {
    pub fn with_writer(out: W, level: OutputLevel) -> Self {
        Self { out, level }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn quiet(&self) -> bool {
        self.level == OutputLevel::None
    }

    fn detailed(&self) -> bool {
        self.level == OutputLevel::Detailed
    }

    fn line(&mut self, color: Option<Color>, bold: bool, text: &str) {
        let _ = self.out.set_color(ColorSpec::new().set_fg(color).set_bold(bold));
        let _ = write!(self.out, "{}", text);
        let _ = self.out.reset();
        let _ = writeln!(self.out);
    }

    fn diff(&mut self, expected: &str, actual: &str) {
        let changeset = Changeset::new(expected, actual, "\n");
        for diff in &changeset.diffs {
            match diff {
                Difference::Same(x) => self.line(None, false, &format!("      {}", x)),
                Difference::Add(x) => self.line(Some(Color::Green), false, &format!("    + {}", x)),
                Difference::Rem(x) => self.line(Some(Color::Red), false, &format!("    - {}", x)),
            }
        }
    }

    /// Final line across every suite.
    pub fn totals(&mut self, totals: &TestSummary, failed_suites: usize) {
        if self.quiet() {
            return;
        }
        let color = if totals.has_failures() || failed_suites > 0 {
            Color::Red
        } else {
            Color::Green
        };
        self.line(
            Some(color),
            true,
            &format!(
                "Tests Passed: {}, Failed: {}, Skipped: {}, NotRun: {}",
                totals.passed, totals.failed, totals.skipped, totals.not_run
            ),
        );
        if totals.invalid_declarations > 0 {
            self.line(
                Some(Color::Red),
                true,
                &format!("Invalid declarations: {}", totals.invalid_declarations),
            );
        }
        if failed_suites > 0 {
            self.line(Some(Color::Red), true, &format!("Suites failed: {}", failed_suites));
        }
    }

    /// Outline of a discovered tree with each Leaf's planned selection.
    pub fn tree(&mut self, suite: &str, tree: &BlockTree) {
        self.line(None, true, suite);
        for node in tree.iter().skip(1) {
            // Top-level blocks sit directly under the root.
            let depth = tree.ancestors(node.id).count() - 1;
            let marker = match node.kind {
                NodeKind::Group => "+",
                NodeKind::Leaf => "-",
            };
            let (color, note) = match (node.kind, node.selection) {
                (_, Selection::Skipped) => (Some(Color::Yellow), " (skip)"),
                (NodeKind::Leaf, Selection::Filtered) => (Some(Color::Cyan), " (not run)"),
                _ => (None, ""),
            };
            let tags = if node.tags.is_empty() {
                String::new()
            } else {
                let tags: Vec<&str> = node.tags.iter().map(String::as_str).collect();
                format!(" [{}]", tags.join(", "))
            };
            self.line(
                color,
                false,
                &format!("{}{} {}{}{}", "  ".repeat(depth), marker, node.name, tags, note),
            );
        }
    }

    pub fn operators(&mut self, names: &[String]) {
        for name in names {
            self.line(None, false, name);
        }
    }
}

impl<W: WriteColor> Reporter for ConsoleReporter<W> {
    fn suite_started(&mut self, suite: &str) {
        if !self.quiet() {
            self.line(Some(Color::Magenta), true, &format!("Suite {}", suite));
        }
    }

    fn discovery_finished(&mut self, suite: &str, tree: &BlockTree) {
        if self.detailed() {
            let leaves = tree.leaves(tree.root()).len();
            self.line(
                None,
                false,
                &format!("Discovered {} block(s), {} test(s) in {}", tree.len() - 1, leaves, suite),
            );
        }
    }

    fn setup_failure(&mut self, _suite: &str, failure: &SetupFailure) {
        if self.quiet() {
            return;
        }
        let at = if failure.path.is_empty() {
            String::new()
        } else {
            format!(" in {}", failure.path)
        };
        self.line(
            Some(Color::Red),
            true,
            &format!("[!] Discovery failed{}: {}", at, failure.message),
        );
    }

    fn invalid_declaration(&mut self, _suite: &str, failure: &SetupFailure) {
        if self.quiet() {
            return;
        }
        self.line(
            Some(Color::Red),
            true,
            &format!("[-] Invalid declaration in {}: {}", failure.path, failure.message),
        );
    }

    fn block_started(&mut self, node: &BlockNode) {
        if self.detailed() && node.kind == NodeKind::Group {
            self.line(None, true, &format!("Describing {}", node.full_name));
        }
    }

    fn block_fault(&mut self, node: &BlockNode, error: &BrambleError) {
        if !self.quiet() {
            self.line(
                Some(Color::Red),
                true,
                &format!("[!] {} failed: {}", node.full_name, error),
            );
        }
    }

    fn assertion(&mut self, _node: &BlockNode, result: &AssertionResult) {
        if !self.detailed() || result.succeeded {
            return;
        }
        if let (Some(expected), Some(actual)) = (&result.expected, &result.actual) {
            if expected.contains('\n') || actual.contains('\n') {
                self.diff(expected, actual);
            }
        }
    }

    fn test_finished(&mut self, node: &BlockNode, outcome: &TestOutcome) {
        if self.quiet() {
            return;
        }
        match outcome {
            TestOutcome::Passed => {
                self.line(Some(Color::Green), false, &format!("[+] {}", node.full_name));
            }
            TestOutcome::Failed(failure) => {
                self.line(Some(Color::Red), true, &format!("[-] {}", node.full_name));
                for message in failure.messages() {
                    self.line(Some(Color::Red), false, &format!("    {}", message));
                }
            }
            TestOutcome::Skipped => {
                self.line(Some(Color::Yellow), false, &format!("[!] {} (skipped)", node.full_name));
            }
            TestOutcome::NotRun => {
                if self.detailed() {
                    self.line(Some(Color::Cyan), false, &format!("[ ] {} (not run)", node.full_name));
                }
            }
        }
    }

    fn suite_finished(&mut self, report: &SuiteReport) {
        if self.quiet() {
            return;
        }
        match &report.outcome {
            SuiteOutcome::Completed => {}
            SuiteOutcome::SetupFailed(failures) => self.line(
                Some(Color::Red),
                true,
                &format!("Suite {} not run: {} discovery failure(s)", report.suite, failures.len()),
            ),
            SuiteOutcome::Diverged(detail) => self.line(
                Some(Color::Red),
                true,
                &format!("Suite {} aborted: discovery/run divergence: {}", report.suite, detail),
            ),
        }
        if self.detailed() {
            let s = report.summary;
            self.line(
                None,
                false,
                &format!(
                    "{}: {} passed, {} failed, {} skipped, {} not run",
                    report.suite, s.passed, s.failed, s.skipped, s.not_run
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Failure;
    use crate::tree::NodeSpec;
    use termcolor::Buffer;

    fn leaf_tree() -> BlockTree {
        let mut tree = BlockTree::new("suite");
        let g = tree
            .add_child(
                tree.root(),
                NodeSpec {
                    name: "Math".into(),
                    declared_name: "Math".into(),
                    kind: Some(NodeKind::Group),
                    ..NodeSpec::default()
                },
            )
            .unwrap();
        tree.add_child(
            g,
            NodeSpec {
                name: "adds".into(),
                declared_name: "adds".into(),
                kind: Some(NodeKind::Leaf),
                ..NodeSpec::default()
            },
        )
        .unwrap();
        tree
    }

    fn output(reporter: ConsoleReporter<Buffer>) -> String {
        String::from_utf8(reporter.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn failures_print_their_messages() {
        let tree = leaf_tree();
        let leaf = tree.node(tree.leaves(tree.root())[0]);
        let mut reporter = ConsoleReporter::with_writer(Buffer::no_color(), OutputLevel::Normal);
        reporter.test_finished(
            leaf,
            &TestOutcome::Failed(Failure::Assertions(vec!["Expected 1 to be 2".into()])),
        );
        let text = output(reporter);
        assert!(text.contains("[-] Math.adds"));
        assert!(text.contains("    Expected 1 to be 2"));
    }

    #[test]
    fn quiet_level_prints_nothing() {
        let tree = leaf_tree();
        let leaf = tree.node(tree.leaves(tree.root())[0]);
        let mut reporter = ConsoleReporter::with_writer(Buffer::no_color(), OutputLevel::None);
        reporter.test_finished(leaf, &TestOutcome::Passed);
        assert!(output(reporter).is_empty());
    }

    #[test]
    fn tree_outline_is_indented() {
        let tree = leaf_tree();
        let mut reporter = ConsoleReporter::with_writer(Buffer::no_color(), OutputLevel::Normal);
        reporter.tree("suite", &tree);
        assert_eq!(output(reporter), "suite\n+ Math\n  - adds\n");
    }

    #[test]
    fn multi_line_values_are_diffed_in_detailed_mode() {
        let tree = leaf_tree();
        let leaf = tree.node(tree.leaves(tree.root())[0]);
        let mut reporter = ConsoleReporter::with_writer(Buffer::no_color(), OutputLevel::Detailed);
        let result = AssertionResult {
            succeeded: false,
            failure_message: Some("differs".into()),
            expected: Some("a\nb".into()),
            actual: Some("a\nc".into()),
        };
        reporter.assertion(leaf, &result);
        let text = output(reporter);
        assert!(text.contains("    - b"));
        assert!(text.contains("    + c"));
    }
}
