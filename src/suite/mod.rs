//! # Suite declarations
//!
//! A suite is a Rust closure that declares groups and tests on a [`Suite`].
//! The same closure is used in two ways:
//!
//! - **Declarative** (built only by [`SuiteRunner`](crate::runner::SuiteRunner)):
//!   the script runs twice. In [`Phase::Discovery`] group bodies are invoked to
//!   build the [`BlockTree`] and test bodies are stored, not run. In
//!   [`Phase::Run`] the script is replayed, every declaration is matched by
//!   position against the stored tree, and the stored test bodies execute.
//! - **Interactive** ([`Suite::interactive`]): every declaration executes
//!   immediately and reports straight to the reporter. Nothing persists between
//!   top-level declarations.
//!
//! ```rust
//! use bramble::report::RecordingReporter;
//! use bramble::suite::Suite;
//!
//! let mut reporter = RecordingReporter::new();
//! let mut suite = Suite::interactive("adhoc", &mut reporter);
//! suite
//!     .it("adds", |t| {
//!         t.should_be(1 + 1, 2)?;
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(suite.summary().passed, 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::panic::Location;
use std::rc::Rc;

use crate::assertions::{global_registry, SharedRegistry};
use crate::config::Filter;
use crate::errors::{BrambleError, Result};
use crate::report::{Reporter, SetupFailure, TestSummary};
use crate::scope::ScopeManager;
use crate::tree::{BlockTree, NodeId, NodeKind};
use crate::value::Value;

mod context;
mod execute;
mod state;

pub use context::TestContext;
pub use state::{ExecutionState, Frame};

/// Body of a group, or of a whole suite script.
pub type GroupBody = Rc<dyn Fn(&mut Suite<'_>) -> Result<()>>;

/// Body of a test or a hook.
pub type TestBody = Rc<dyn Fn(&mut TestContext<'_>) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Declarative,
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

/// Hooks recorded on a group.
#[derive(Default, Clone)]
pub struct Hooks {
    before_all: Vec<TestBody>,
    after_all: Vec<TestBody>,
    before_each: Vec<TestBody>,
    after_each: Vec<TestBody>,
}

impl Hooks {
    pub fn get(&self, kind: HookKind) -> &[TestBody] {
        match kind {
            HookKind::BeforeAll => &self.before_all,
            HookKind::AfterAll => &self.after_all,
            HookKind::BeforeEach => &self.before_each,
            HookKind::AfterEach => &self.after_each,
        }
    }

    pub fn count(&self, kind: HookKind) -> usize {
        self.get(kind).len()
    }

    pub(crate) fn push(&mut self, kind: HookKind, body: TestBody) {
        match kind {
            HookKind::BeforeAll => self.before_all.push(body),
            HookKind::AfterAll => self.after_all.push(body),
            HookKind::BeforeEach => self.before_each.push(body),
            HookKind::AfterEach => self.after_each.push(body),
        }
    }
}

#[derive(Clone)]
pub(crate) enum DeclBody {
    Group(GroupBody),
    Test(TestBody),
}

/// A group or test declaration, built up before handing it to
/// [`Suite::declare`].
///
/// ```rust
/// use bramble::suite::Declaration;
/// use bramble::value::Value;
///
/// let decl = Declaration::test("doubles <x>")
///     .tag("math")
///     .with_data(vec![Value::map([("x", 1)]), Value::map([("x", 2)])])
///     .test_body(|t| {
///         let x = t.get("x").and_then(Value::as_number).unwrap_or_default();
///         t.should_be(x * 2.0, x + x)?;
///         Ok(())
///     });
/// ```
#[derive(Clone)]
pub struct Declaration {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) skip: bool,
    pub(crate) focus: bool,
    /// `Some` when data-driven; an empty set declares nothing.
    pub(crate) data: Option<Vec<Value>>,
    pub(crate) body: Option<DeclBody>,
    pub(crate) line: u32,
}

impl Declaration {
    #[track_caller]
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name.into(), NodeKind::Group, Location::caller().line())
    }

    #[track_caller]
    pub fn test(name: impl Into<String>) -> Self {
        Self::new(name.into(), NodeKind::Leaf, Location::caller().line())
    }

    fn new(name: String, kind: NodeKind, line: u32) -> Self {
        Self {
            name,
            kind,
            tags: BTreeSet::new(),
            skip: false,
            focus: false,
            data: None,
            body: None,
            line,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn focus(mut self, focus: bool) -> Self {
        self.focus = focus;
        self
    }

    /// Declares one sibling per item, in order.
    pub fn with_data(mut self, items: Vec<Value>) -> Self {
        self.data = Some(items);
        self
    }

    /// Like [`with_data`](Self::with_data); `None` declares nothing.
    pub fn with_optional_data(mut self, items: Option<Vec<Value>>) -> Self {
        self.data = Some(items.unwrap_or_default());
        self
    }

    pub fn group_body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Suite<'_>) -> Result<()> + 'static,
    {
        self.body = Some(DeclBody::Group(Rc::new(body)));
        self
    }

    pub fn test_body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut TestContext<'_>) -> Result<()> + 'static,
    {
        self.body = Some(DeclBody::Test(Rc::new(body)));
        self
    }

    /// Checks the authoring rules and returns the body.
    pub(crate) fn validate(&self) -> Result<DeclBody> {
        let body = match (&self.body, self.kind) {
            (Some(body @ DeclBody::Group(_)), NodeKind::Group)
            | (Some(body @ DeclBody::Test(_)), NodeKind::Leaf) => Some(body.clone()),
            _ => None,
        };
        let Some(body) = body else {
            if self.name.contains(['\n', '\r']) {
                return Err(BrambleError::MalformedName {
                    name: self.name.clone(),
                    line: self.line,
                });
            }
            return Err(BrambleError::MissingBody {
                name: self.name.clone(),
                line: self.line,
            });
        };
        if self.name.trim().is_empty() {
            return Err(BrambleError::EmptyName { line: self.line });
        }
        Ok(body)
    }
}

/// Tree-building API handed to suite scripts and group bodies.
pub struct Suite<'r> {
    name: String,
    mode: Mode,
    state: ExecutionState,
    scopes: ScopeManager,
    registry: SharedRegistry,
    reporter: &'r mut dyn Reporter,
    filter: Filter,
    /// Parameters visible to bodies.
    parameters: BTreeMap<String, Value>,
    /// Parameters the suite explicitly bound; restored between phases.
    bound: BTreeMap<String, Value>,
    /// Invocation parameters back-filled at the first root-level group.
    invocation: BTreeMap<String, Value>,
    defaults_applied: bool,
    setup_failures: Vec<SetupFailure>,
    invalid_declarations: Vec<SetupFailure>,
    divergence: Option<String>,
    summary: TestSummary,
}

impl<'r> Suite<'r> {
    /// A suite that executes each declaration as soon as it is made.
    pub fn interactive(name: &str, reporter: &'r mut dyn Reporter) -> Self {
        let mut suite = Self::with_mode(name, Mode::Interactive, global_registry(), reporter);
        suite.state.phase = Phase::Run;
        let root = suite.state.tree.root();
        suite.state.push(root);
        suite.scopes.open(name);
        suite
    }

    pub(crate) fn declarative(
        name: &str,
        registry: SharedRegistry,
        reporter: &'r mut dyn Reporter,
    ) -> Self {
        Self::with_mode(name, Mode::Declarative, registry, reporter)
    }

    fn with_mode(
        name: &str,
        mode: Mode,
        registry: SharedRegistry,
        reporter: &'r mut dyn Reporter,
    ) -> Self {
        Self {
            name: name.to_string(),
            mode,
            state: ExecutionState::new(name),
            scopes: ScopeManager::new(),
            registry,
            reporter,
            filter: Filter::default(),
            parameters: BTreeMap::new(),
            bound: BTreeMap::new(),
            invocation: BTreeMap::new(),
            defaults_applied: false,
            setup_failures: Vec::new(),
            invalid_declarations: Vec::new(),
            divergence: None,
            summary: TestSummary::default(),
        }
    }

    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Parameters the suite binds itself.
    pub fn with_bound_parameters(mut self, bound: BTreeMap<String, Value>) -> Self {
        self.parameters = bound.clone();
        self.bound = bound;
        self
    }

    /// Parameters the run was invoked with.
    pub fn with_invocation_parameters(mut self, invocation: BTreeMap<String, Value>) -> Self {
        self.invocation = invocation;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// The node whose body is currently executing (the root outside any block).
    pub fn current_node(&self) -> NodeId {
        self.state.current()
    }

    pub fn tree(&self) -> &BlockTree {
        &self.state.tree
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn summary(&self) -> TestSummary {
        self.summary
    }

    pub fn setup_failures(&self) -> &[SetupFailure] {
        &self.setup_failures
    }

    /// Malformed declarations. Each one failed on its own; the rest of the
    /// suite still ran.
    pub fn invalid_declarations(&self) -> &[SetupFailure] {
        &self.invalid_declarations
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    /// Declares a group.
    #[track_caller]
    pub fn describe<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: Fn(&mut Suite<'_>) -> Result<()> + 'static,
    {
        self.declare(Declaration::group(name).group_body(body))
    }

    /// Declares a test.
    #[track_caller]
    pub fn it<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: Fn(&mut TestContext<'_>) -> Result<()> + 'static,
    {
        self.declare(Declaration::test(name).test_body(body))
    }

    pub fn before_all<F>(&mut self, hook: F) -> Result<()>
    where
        F: Fn(&mut TestContext<'_>) -> Result<()> + 'static,
    {
        self.hook(HookKind::BeforeAll, Rc::new(hook))
    }

    pub fn after_all<F>(&mut self, hook: F) -> Result<()>
    where
        F: Fn(&mut TestContext<'_>) -> Result<()> + 'static,
    {
        self.hook(HookKind::AfterAll, Rc::new(hook))
    }

    pub fn before_each<F>(&mut self, hook: F) -> Result<()>
    where
        F: Fn(&mut TestContext<'_>) -> Result<()> + 'static,
    {
        self.hook(HookKind::BeforeEach, Rc::new(hook))
    }

    pub fn after_each<F>(&mut self, hook: F) -> Result<()>
    where
        F: Fn(&mut TestContext<'_>) -> Result<()> + 'static,
    {
        self.hook(HookKind::AfterEach, Rc::new(hook))
    }
}
