//! Suite orchestration.
//!
//! [`SuiteRunner`] drives each [`SuiteDefinition`] through Discovery and Run:
//!
//! 1. seal the operator registry (no registration once a suite starts)
//! 2. Discovery: run the script, building the block tree
//! 3. abort with [`SuiteOutcome::SetupFailed`] if any group body failed
//! 4. plan selection (skip, filters, focus)
//! 5. Run: replay the script against the tree, executing stored test bodies
//!
//! A tree that changes shape between the phases ends the suite with
//! [`SuiteOutcome::Diverged`]; other suites still run.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info};

use crate::assertions::{global_registry, write_registry, SharedRegistry};
use crate::config::RunConfig;
use crate::errors::Result;
use crate::report::{Reporter, SuiteOutcome, SuiteReport, TestSummary};
use crate::suite::{GroupBody, Suite};
use crate::value::Value;

/// A named suite script plus the parameters it binds itself.
#[derive(Clone)]
pub struct SuiteDefinition {
    name: String,
    script: GroupBody,
    parameters: BTreeMap<String, Value>,
}

impl SuiteDefinition {
    pub fn new<F>(name: &str, script: F) -> Self
    where
        F: Fn(&mut Suite<'_>) -> Result<()> + 'static,
    {
        Self {
            name: name.to_string(),
            script: Rc::new(script),
            parameters: BTreeMap::new(),
        }
    }

    /// Binds a suite parameter. Invocation parameters never override it.
    pub fn parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reports for every suite in one invocation.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SuiteReport>,
    pub totals: TestSummary,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(SuiteReport::is_success)
    }

    pub fn failed_suites(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_success()).count()
    }
}

pub struct SuiteRunner {
    config: RunConfig,
    registry: SharedRegistry,
}

impl SuiteRunner {
    /// A runner over the process-wide operator registry.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            registry: global_registry(),
        }
    }

    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    fn seal_registry(&self) -> Result<()> {
        let mut registry = write_registry(&self.registry)?;
        if !registry.is_sealed() {
            debug!(operators = registry.len(), "sealing operator registry");
            registry.seal();
        }
        Ok(())
    }

    fn suite<'r>(&self, definition: &SuiteDefinition, reporter: &'r mut dyn Reporter) -> Suite<'r> {
        Suite::declarative(&definition.name, Arc::clone(&self.registry), reporter)
            .with_filter(self.config.filter())
            .with_bound_parameters(definition.parameters.clone())
            .with_invocation_parameters(self.config.parameters.clone())
    }

    /// Runs Discovery only and plans selection; no test body executes.
    pub fn discover(
        &self,
        definition: &SuiteDefinition,
        reporter: &mut dyn Reporter,
    ) -> Result<SuiteReport> {
        self.seal_registry()?;
        reporter.suite_started(&definition.name);
        let mut suite = self.suite(definition, reporter);
        suite.discover(&definition.script);
        suite.plan();
        suite.report_discovery();
        let outcome = match suite.setup_failures() {
            [] => SuiteOutcome::Completed,
            failures => SuiteOutcome::SetupFailed(failures.to_vec()),
        };
        let invalid_declarations = suite.invalid_declarations().to_vec();
        let (tree, summary) = suite.into_parts();
        Ok(SuiteReport {
            suite: definition.name.clone(),
            outcome,
            summary,
            tree,
            invalid_declarations,
        })
    }

    /// Runs one suite through both phases.
    pub fn run_suite(
        &self,
        definition: &SuiteDefinition,
        reporter: &mut dyn Reporter,
    ) -> Result<SuiteReport> {
        self.seal_registry()?;
        reporter.suite_started(&definition.name);
        info!(suite = %definition.name, "running suite");

        let (outcome, tree, summary, invalid_declarations) = {
            let mut suite = self.suite(definition, &mut *reporter);
            suite.discover(&definition.script);
            suite.report_discovery();
            let outcome = if !suite.setup_failures().is_empty() {
                SuiteOutcome::SetupFailed(suite.setup_failures().to_vec())
            } else {
                let result = suite.run(&definition.script);
                match (result, suite.divergence()) {
                    (_, Some(detail)) => SuiteOutcome::Diverged(detail.to_string()),
                    (Err(e), None) => SuiteOutcome::Diverged(e.to_string()),
                    (Ok(()), None) => SuiteOutcome::Completed,
                }
            };
            let invalid_declarations = suite.invalid_declarations().to_vec();
            let (tree, summary) = suite.into_parts();
            (outcome, tree, summary, invalid_declarations)
        };

        info!(
            suite = %definition.name,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            not_run = summary.not_run,
            outcome = ?outcome,
            "suite finished"
        );
        let report = SuiteReport {
            suite: definition.name.clone(),
            outcome,
            summary,
            tree,
            invalid_declarations,
        };
        reporter.suite_finished(&report);
        Ok(report)
    }

    /// Runs every suite in order; one suite failing does not stop the rest.
    pub fn run_all(
        &self,
        definitions: &[SuiteDefinition],
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for definition in definitions {
            let report = self.run_suite(definition, reporter)?;
            summary.totals.merge(&report.summary);
            summary.reports.push(report);
        }
        Ok(summary)
    }
}
