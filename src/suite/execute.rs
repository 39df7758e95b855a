//! Phase-aware handling of declarations.
//!
//! Discovery adds nodes and invokes group bodies; Run matches each declaration
//! against the stored children of the current node (by position, then kind,
//! name and expansion count) and executes stored test bodies; Interactive mode
//! builds and executes in one go.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::assertions::AssertionResult;
use crate::errors::{panic_to_fault, BrambleError, ErrorCategory, Result};
use crate::report::{Failure, SetupFailure, TestOutcome, TestSummary};
use crate::tree::expand::{self, DataBinding, Expansion};
use crate::tree::{BlockNode, NodeId, NodeKind, NodeSpec, Selection};
use crate::value::Value;

use super::context::{failed_as_error, TestContext};
use super::{DeclBody, Declaration, GroupBody, HookKind, Mode, Phase, Suite, TestBody};

/// One concrete node produced by a declaration.
struct Instance {
    name: String,
    data: Option<DataBinding>,
    expansion: Option<Expansion>,
}

fn instances(decl: &Declaration) -> Vec<Instance> {
    match &decl.data {
        None => vec![Instance {
            name: decl.name.clone(),
            data: None,
            expansion: None,
        }],
        Some(items) => expand::expand(&decl.name, items)
            .into_iter()
            .map(|item| Instance {
                name: item.name,
                data: Some(item.binding),
                expansion: Some(item.expansion),
            })
            .collect(),
    }
}

fn node_spec(decl: &Declaration, instance: Instance, body: &DeclBody) -> NodeSpec {
    NodeSpec {
        name: instance.name,
        declared_name: decl.name.clone(),
        kind: Some(decl.kind),
        tags: decl.tags.clone(),
        skip: decl.skip,
        focus: decl.focus,
        line: decl.line,
        data: instance.data,
        expansion: instance.expansion,
        body: match body {
            DeclBody::Test(test) => Some(Rc::clone(test)),
            DeclBody::Group(_) => None,
        },
    }
}

/// Runs a body, turning a panic into a `Fault`.
fn guarded<F: FnOnce() -> Result<()>>(f: F) -> Result<()> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(panic_to_fault(payload)))
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Group => "group",
        NodeKind::Leaf => "test",
    }
}

fn leaf_outcome(fault: Option<BrambleError>, results: &[AssertionResult]) -> TestOutcome {
    let mut messages: Vec<String> = results
        .iter()
        .filter(|r| !r.succeeded)
        .filter_map(|r| r.failure_message.clone())
        .collect();
    match fault {
        Some(BrambleError::AssertionFailed { message }) => {
            if !messages.contains(&message) {
                messages.push(message);
            }
            TestOutcome::Failed(Failure::Assertions(messages))
        }
        Some(error) => TestOutcome::Failed(Failure::Fault(error.to_string())),
        None if messages.is_empty() => TestOutcome::Passed,
        None => TestOutcome::Failed(Failure::Assertions(messages)),
    }
}

impl<'r> Suite<'r> {
    /// Declares a group or test.
    ///
    /// Authoring mistakes are returned as errors and fail only this
    /// declaration. In Run, a declaration that does not match the tree built
    /// at Discovery returns `DiscoveryRunDivergence`.
    pub fn declare(&mut self, decl: Declaration) -> Result<()> {
        let body = match decl.validate() {
            Ok(body) => body,
            Err(e) => {
                self.authoring_error(&e);
                return Err(e);
            }
        };
        match (self.mode, self.state.phase) {
            (Mode::Interactive, _) => self.declare_interactive(&decl, body),
            (Mode::Declarative, Phase::Discovery) => self.declare_discovery(&decl, body),
            (Mode::Declarative, Phase::Run) => self.declare_run(&decl, body),
        }
    }

    /// Data binding visible to the current group body.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.tree.binding(self.state.current())?.get(key)
    }

    pub(crate) fn hook(&mut self, kind: HookKind, body: TestBody) -> Result<()> {
        let current = self.state.current();
        match (self.mode, self.state.phase, kind) {
            (Mode::Declarative, Phase::Run, _) => Ok(()),
            (Mode::Interactive, _, HookKind::BeforeAll) => {
                if self.state.tree.is_skipped(current) {
                    return Ok(());
                }
                let result = self.run_hook_bodies(current, &[body]);
                if let Err(e) = &result {
                    self.block_fault(current, e);
                }
                result
            }
            _ => {
                self.state.tree.node_mut(current).hooks.push(kind, body);
                Ok(())
            }
        }
    }

    /// Ends an interactive session: runs root-level `after_all` hooks and
    /// returns the counters. Open scopes are released when the suite drops.
    pub fn finish(mut self) -> TestSummary {
        if self.mode == Mode::Interactive {
            let root = self.state.tree.root();
            if let Err(e) = self.run_hooks(root, HookKind::AfterAll) {
                self.block_fault(root, &e);
            }
        }
        self.summary
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Builds the tree by running `script` with group bodies invoked and test
    /// bodies stored.
    pub(crate) fn discover(&mut self, script: &GroupBody) {
        self.state.enter(Phase::Discovery);
        debug!(suite = %self.name, "discovery started");
        let root = self.state.tree.root();
        self.discover_group(root, script);
        debug!(
            suite = %self.name,
            nodes = self.state.tree.len() - 1,
            failures = self.setup_failures.len(),
            invalid = self.invalid_declarations.len(),
            "discovery finished"
        );
        trace!(suite = %self.name, "discovered tree:\n{}", self.state.tree.render());
    }

    fn declare_discovery(&mut self, decl: &Declaration, body: DeclBody) -> Result<()> {
        let parent = self.state.current();
        self.backfill_parameters(parent, decl.kind);
        for instance in instances(decl) {
            let spec = node_spec(decl, instance, &body);
            let id = self.state.tree.add_child(parent, spec)?;
            debug!(
                suite = %self.name,
                node = %id,
                path = %self.state.tree.node(id).full_name,
                kind = kind_label(decl.kind),
                "discovered block"
            );
            if let DeclBody::Group(group) = &body {
                self.discover_group(id, group);
            }
        }
        Ok(())
    }

    fn discover_group(&mut self, id: NodeId, body: &GroupBody) {
        self.state.push(id);
        let scope = self.scopes.open(&self.state.tree.node(id).full_name);
        let result = guarded(|| body(self));
        self.scopes.close(scope);
        self.state.pop();
        if let Err(e) = result {
            self.record_setup_failure(id, &e);
        }
    }

    fn record_setup_failure(&mut self, id: NodeId, error: &BrambleError) {
        // Authoring errors were recorded where they were raised.
        if error.category() == ErrorCategory::Authoring {
            return;
        }
        let path = self.state.tree.node(id).full_name.clone();
        warn!(suite = %self.name, path = %path, error = %error, "discovery failed");
        self.setup_failures.push(SetupFailure {
            path,
            message: error.to_string(),
        });
    }

    fn authoring_error(&mut self, error: &BrambleError) {
        if self.mode == Mode::Declarative && self.state.phase == Phase::Run {
            return;
        }
        let failure = SetupFailure {
            path: self.state.tree.node(self.state.current()).full_name.clone(),
            message: error.to_string(),
        };
        warn!(suite = %self.name, path = %failure.path, error = %error, "invalid declaration");
        if self.mode == Mode::Interactive {
            self.reporter.invalid_declaration(&self.name, &failure);
        }
        self.summary.invalid_declarations += 1;
        self.invalid_declarations.push(failure);
    }

    /// Fills invocation parameters the suite never bound, once, at the first
    /// group declared directly under the root before any sibling exists.
    fn backfill_parameters(&mut self, parent: NodeId, kind: NodeKind) {
        if self.defaults_applied || kind != NodeKind::Group || parent != self.state.tree.root() {
            return;
        }
        let before_children = match (self.mode, self.state.phase) {
            (Mode::Declarative, Phase::Run) => self.state.frame().map_or(false, |f| f.next_child == 0),
            _ => self.state.tree.children(parent).is_empty(),
        };
        if !before_children {
            return;
        }
        self.defaults_applied = true;
        for (key, value) in &self.invocation {
            if !self.parameters.contains_key(key) {
                debug!(suite = %self.name, parameter = %key, "back-filled parameter");
                self.parameters.insert(key.clone(), value.clone());
            }
        }
    }

    // ------------------------------------------------------------------
    // Run
    // ------------------------------------------------------------------

    /// Replays `script` against the discovered tree.
    pub(crate) fn run(&mut self, script: &GroupBody) -> Result<()> {
        self.state.tree.plan(&self.filter);
        self.state.enter(Phase::Run);
        self.parameters = self.bound.clone();
        self.defaults_applied = false;
        debug!(suite = %self.name, "run started");
        let root = self.state.tree.root();
        self.run_group(root, script)
    }

    fn declare_run(&mut self, decl: &Declaration, body: DeclBody) -> Result<()> {
        if let Some(detail) = self.divergence.clone() {
            return Err(BrambleError::DiscoveryRunDivergence {
                suite: self.name.clone(),
                detail,
            });
        }
        let parent = self.state.current();
        self.backfill_parameters(parent, decl.kind);
        for instance in instances(decl) {
            let id = self.match_next(decl.kind, &instance)?;
            match &body {
                DeclBody::Group(group) => self.run_group(id, group)?,
                DeclBody::Test(_) => self.run_leaf(id),
            }
        }
        Ok(())
    }

    /// Identifies the stored node for the next declaration under the cursor.
    fn match_next(&mut self, kind: NodeKind, instance: &Instance) -> Result<NodeId> {
        let Some(frame) = self.state.frame().copied() else {
            return Err(self.diverge(format!("'{}' declared outside any block", instance.name)));
        };
        let parent_name = self.state.tree.node(frame.node).name.clone();
        let Some(id) = self.state.tree.children(frame.node).get(frame.next_child).copied() else {
            return Err(self.diverge(format!(
                "{} '{}' was not declared under '{}' during discovery",
                kind_label(kind),
                instance.name,
                parent_name
            )));
        };

        let node = self.state.tree.node(id);
        let stored = node.expansion.map(|e| e.count);
        let declared = instance.expansion.map(|e| e.count);
        let mismatch = if stored != declared {
            Some(format!(
                "'{}' under '{}' expanded to {} block(s) during discovery but {} during run",
                node.declared_name,
                parent_name,
                stored.unwrap_or(1),
                declared.unwrap_or(1)
            ))
        } else if node.kind != kind || node.name != instance.name {
            Some(format!(
                "expected {} '{}' at position {} under '{}', found {} '{}'",
                kind_label(node.kind),
                node.name,
                frame.next_child + 1,
                parent_name,
                kind_label(kind),
                instance.name
            ))
        } else {
            None
        };
        if let Some(detail) = mismatch {
            return Err(self.diverge(detail));
        }

        if let Some(frame) = self.state.frame_mut() {
            frame.next_child += 1;
        }
        Ok(id)
    }

    fn diverge(&mut self, detail: String) -> BrambleError {
        warn!(suite = %self.name, detail = %detail, "discovery/run divergence");
        if self.divergence.is_none() {
            self.divergence = Some(detail.clone());
        }
        BrambleError::DiscoveryRunDivergence {
            suite: self.name.clone(),
            detail,
        }
    }

    fn run_group(&mut self, id: NodeId, body: &GroupBody) -> Result<()> {
        if self.state.tree.node(id).selection != Selection::Run {
            self.report_unrun(id);
            return Ok(());
        }
        if id != self.state.tree.root() {
            self.reporter.block_started(self.state.tree.node(id));
        }
        self.state.push(id);
        let scope = self.scopes.open(&self.state.tree.node(id).full_name);

        let result = self.run_group_body(id, body);
        if let Err(e) = self.run_hooks(id, HookKind::AfterAll) {
            self.block_fault(id, &e);
        }

        self.scopes.close(scope);
        self.state.pop();
        result
    }

    fn run_group_body(&mut self, id: NodeId, body: &GroupBody) -> Result<()> {
        let name = self.state.tree.node(id).name.clone();
        if let Err(e) = self.run_hooks(id, HookKind::BeforeAll) {
            self.block_fault(id, &e);
            let leaves = self.state.tree.leaves(id);
            let failure = Failure::Setup(format!("before_all of '{}' failed: {}", name, e));
            self.fail_leaves(&leaves, failure);
            return Ok(());
        }

        let result = guarded(|| body(self));
        if let Some(detail) = self.divergence.clone() {
            return Err(BrambleError::DiscoveryRunDivergence {
                suite: self.name.clone(),
                detail,
            });
        }

        let matched = self.state.frame().map_or(0, |f| f.next_child);
        let children = self.state.tree.children(id).to_vec();
        match result {
            Err(e) => {
                // Invalid declarations were reported during Discovery.
                if e.category() != ErrorCategory::Authoring {
                    self.block_fault(id, &e);
                }
                let unreached: Vec<NodeId> = children
                    .iter()
                    .skip(matched)
                    .flat_map(|c| self.state.tree.leaves(*c))
                    .collect();
                let failure = Failure::Fault(format!("'{}' failed before declaring this test: {}", name, e));
                self.fail_leaves(&unreached, failure);
                Ok(())
            }
            Ok(()) if matched != children.len() => Err(self.diverge(format!(
                "'{}' declared {} block(s) during discovery but {} during run",
                name,
                children.len(),
                matched
            ))),
            Ok(()) => Ok(()),
        }
    }

    fn run_leaf(&mut self, id: NodeId) {
        match self.state.tree.node(id).selection {
            Selection::Skipped => return self.finish_leaf(id, TestOutcome::Skipped),
            Selection::Filtered => return self.finish_leaf(id, TestOutcome::NotRun),
            Selection::Run => {}
        }
        let Some(body) = self.state.tree.node(id).body.clone() else {
            let failure = Failure::Fault("test has no stored body".to_string());
            return self.finish_leaf(id, TestOutcome::Failed(failure));
        };

        self.reporter.block_started(self.state.tree.node(id));
        self.state.push(id);
        let scope = self.scopes.open(&self.state.tree.node(id).full_name);
        let (before, after) = self.each_hooks(id);

        let mut ctx = TestContext::new(
            &self.state.tree,
            id,
            &self.parameters,
            &self.registry,
            &mut self.scopes,
        );
        let mut fault = None;
        for hook in &before {
            if let Err(e) = guarded(|| hook(&mut ctx)) {
                fault = Some(e);
                break;
            }
        }
        if fault.is_none() {
            if let Err(e) = guarded(|| body(&mut ctx)) {
                fault = Some(e);
            }
        }
        for hook in &after {
            if let Err(e) = guarded(|| hook(&mut ctx)) {
                fault.get_or_insert(e);
            }
        }
        let results = ctx.into_results();

        self.scopes.close(scope);
        self.state.pop();

        let node = self.state.tree.node(id);
        for result in &results {
            self.reporter.assertion(node, result);
        }
        let outcome = leaf_outcome(fault, &results);
        self.finish_leaf(id, outcome);
    }

    /// `before_each` hooks outermost first and `after_each` innermost first.
    fn each_hooks(&self, id: NodeId) -> (Vec<TestBody>, Vec<TestBody>) {
        let mut chain: Vec<&BlockNode> = self.state.tree.ancestors(id).collect();
        chain.reverse();
        let before = chain
            .iter()
            .flat_map(|n| n.hooks.get(HookKind::BeforeEach).iter().cloned())
            .collect();
        let after = chain
            .iter()
            .rev()
            .flat_map(|n| n.hooks.get(HookKind::AfterEach).iter().cloned())
            .collect();
        (before, after)
    }

    fn run_hooks(&mut self, id: NodeId, kind: HookKind) -> Result<()> {
        let hooks = self.state.tree.node(id).hooks.get(kind).to_vec();
        self.run_hook_bodies(id, &hooks)
    }

    /// Runs hooks in the current scope, stopping at the first failure. Failed
    /// assertions inside a hook fail the hook.
    fn run_hook_bodies(&mut self, id: NodeId, hooks: &[TestBody]) -> Result<()> {
        if hooks.is_empty() {
            return Ok(());
        }
        let mut ctx = TestContext::new(
            &self.state.tree,
            id,
            &self.parameters,
            &self.registry,
            &mut self.scopes,
        );
        for hook in hooks {
            guarded(|| hook(&mut ctx))?;
        }
        failed_as_error(&ctx.into_results())
    }

    fn block_fault(&mut self, id: NodeId, error: &BrambleError) {
        let node = self.state.tree.node(id);
        warn!(suite = %self.name, path = %node.full_name, error = %error, "block failed");
        self.reporter.block_fault(node, error);
        self.summary.block_faults += 1;
    }

    fn fail_leaves(&mut self, leaves: &[NodeId], failure: Failure) {
        for &leaf in leaves {
            let outcome = match self.state.tree.node(leaf).selection {
                Selection::Run => TestOutcome::Failed(failure.clone()),
                Selection::Skipped => TestOutcome::Skipped,
                Selection::Filtered => TestOutcome::NotRun,
            };
            self.finish_leaf(leaf, outcome);
        }
    }

    /// Reports every Leaf under a group that does not run.
    fn report_unrun(&mut self, id: NodeId) {
        for leaf in self.state.tree.leaves(id) {
            let outcome = match self.state.tree.node(leaf).selection {
                Selection::Skipped => TestOutcome::Skipped,
                _ => TestOutcome::NotRun,
            };
            self.finish_leaf(leaf, outcome);
        }
    }

    fn finish_leaf(&mut self, id: NodeId, outcome: TestOutcome) {
        let node = self.state.tree.node(id);
        debug!(suite = %self.name, path = %node.full_name, outcome = outcome.label(), "test finished");
        self.reporter.test_finished(node, &outcome);
        self.summary.record(&outcome);
    }

    // ------------------------------------------------------------------
    // Interactive
    // ------------------------------------------------------------------

    fn declare_interactive(&mut self, decl: &Declaration, body: DeclBody) -> Result<()> {
        if self.state.depth() == 1 {
            self.state.tree.reset();
        }
        let parent = self.state.current();
        self.backfill_parameters(parent, decl.kind);
        for instance in instances(decl) {
            let spec = node_spec(decl, instance, &body);
            let id = self.state.tree.add_child(parent, spec)?;
            let tree = &self.state.tree;
            let selection = if tree.is_skipped(id) {
                Selection::Skipped
            } else if decl.kind == NodeKind::Leaf && !self.filter.allows(tree, id) {
                Selection::Filtered
            } else {
                Selection::Run
            };
            self.state.tree.node_mut(id).selection = selection;
            match &body {
                DeclBody::Group(group) => self.run_group_interactive(id, group),
                DeclBody::Test(_) => self.run_leaf(id),
            }
        }
        Ok(())
    }

    /// Groups always run their body so nested tests can report, even when
    /// skipped; hooks of a skipped group never run.
    fn run_group_interactive(&mut self, id: NodeId, body: &GroupBody) {
        self.reporter.block_started(self.state.tree.node(id));
        self.state.push(id);
        let scope = self.scopes.open(&self.state.tree.node(id).full_name);

        if let Err(e) = guarded(|| body(self)) {
            if e.category() != ErrorCategory::Authoring {
                self.block_fault(id, &e);
            }
        }
        if self.state.tree.node(id).selection != Selection::Skipped {
            if let Err(e) = self.run_hooks(id, HookKind::AfterAll) {
                self.block_fault(id, &e);
            }
        }

        self.scopes.close(scope);
        self.state.pop();
    }

    // ------------------------------------------------------------------
    // Runner access
    // ------------------------------------------------------------------

    /// Hands the discovered tree, invalid declarations and any setup failures
    /// to the reporter.
    pub(crate) fn report_discovery(&mut self) {
        self.reporter.discovery_finished(&self.name, &self.state.tree);
        for failure in &self.invalid_declarations {
            self.reporter.invalid_declaration(&self.name, failure);
        }
        for failure in &self.setup_failures {
            self.reporter.setup_failure(&self.name, failure);
        }
    }

    pub(crate) fn plan(&mut self) {
        self.state.tree.plan(&self.filter);
    }

    pub(crate) fn divergence(&self) -> Option<&str> {
        self.divergence.as_deref()
    }

    pub(crate) fn into_parts(self) -> (crate::tree::BlockTree, TestSummary) {
        (self.state.tree, self.summary)
    }
}
