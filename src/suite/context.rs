use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::rc::Rc;

use crate::assertions::{self, AssertionInvocation, AssertionResult, SharedRegistry};
use crate::errors::{BrambleError, Result};
use crate::scope::{CleanupFn, ResourceHandle, ScopeManager, ScratchDir, Substitution};
use crate::tree::expand::DataBinding;
use crate::tree::{BlockNode, BlockTree, NodeId};
use crate::value::Value;

/// What a test body or hook sees while it runs.
///
/// Assertions made through [`should`](Self::should) are recorded and do not
/// stop the body; the test fails afterwards if any of them failed. Resources
/// acquired here are released when the enclosing scope closes.
pub struct TestContext<'a> {
    tree: &'a BlockTree,
    id: NodeId,
    parameters: &'a BTreeMap<String, Value>,
    registry: &'a SharedRegistry,
    scopes: &'a mut ScopeManager,
    results: Vec<AssertionResult>,
}

impl<'a> TestContext<'a> {
    pub(crate) fn new(
        tree: &'a BlockTree,
        id: NodeId,
        parameters: &'a BTreeMap<String, Value>,
        registry: &'a SharedRegistry,
        scopes: &'a mut ScopeManager,
    ) -> Self {
        Self {
            tree,
            id,
            parameters,
            registry,
            scopes,
            results: Vec::new(),
        }
    }

    fn node(&self) -> &BlockNode {
        self.tree.node(self.id)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.node().name
    }

    pub fn full_name(&self) -> &str {
        &self.node().full_name
    }

    /// Own tags plus inherited ones.
    pub fn tags(&self) -> BTreeSet<String> {
        self.tree.effective_tags(self.id)
    }

    /// Nearest data binding: this block's, or an enclosing data-driven group's.
    pub fn binding(&self) -> Option<&DataBinding> {
        self.tree.binding(self.id)
    }

    /// A value bound by data-driven expansion.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.binding()?.get(key)
    }

    /// The whole data-set item this test was generated from.
    pub fn item(&self) -> Option<&Value> {
        self.binding()?.item()
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Runs an operator and records the result.
    ///
    /// Only misuse (unknown operator, bad negation) is an `Err`; a failed
    /// assertion is returned and remembered.
    pub fn should(
        &mut self,
        operator: &str,
        invocation: AssertionInvocation,
    ) -> Result<AssertionResult> {
        let result = assertions::invoke(self.registry, operator, &invocation)?;
        self.results.push(result.clone());
        Ok(result)
    }

    pub fn should_be(
        &mut self,
        actual: impl Into<Value>,
        expected: impl Into<Value>,
    ) -> Result<AssertionResult> {
        self.should("Be", AssertionInvocation::new(actual, expected))
    }

    /// Negated form of [`should`](Self::should).
    pub fn should_not(
        &mut self,
        operator: &str,
        actual: impl Into<Value>,
        expected: impl Into<Value>,
    ) -> Result<AssertionResult> {
        self.should(operator, AssertionInvocation::new(actual, expected).negated())
    }

    pub fn results(&self) -> &[AssertionResult] {
        &self.results
    }

    pub fn failed_assertions(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded).count()
    }

    /// Puts `replacement` into `target` until the scope closes.
    pub fn substitute<T: 'static>(
        &mut self,
        target: &Rc<RefCell<T>>,
        replacement: T,
    ) -> Result<ResourceHandle> {
        // The owning scope is resolved before the swap so a failure leaves
        // `target` untouched.
        let scope = self
            .scopes
            .current()
            .ok_or_else(|| BrambleError::fault("no scope is open to own the substitution"))?;
        let substitution = Substitution::install(target, replacement)?;
        self.scopes.register_for_cleanup(scope, Box::new(substitution))
    }

    /// A fresh directory, removed when the scope closes.
    pub fn scratch_dir(&mut self) -> Result<PathBuf> {
        let dir = ScratchDir::create()?;
        let path = dir.path_buf();
        self.scopes.register(Box::new(dir))?;
        Ok(path)
    }

    /// Runs `action` when the scope closes.
    pub fn defer<F>(&mut self, label: &str, action: F) -> Result<ResourceHandle>
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.scopes.register(Box::new(CleanupFn::new(label, action)))
    }

    /// Releases a resource before its scope ends.
    pub fn release(&mut self, handle: ResourceHandle) -> Result<bool> {
        self.scopes.release(handle)
    }

    pub(crate) fn into_results(self) -> Vec<AssertionResult> {
        self.results
    }
}

/// Collapses failed assertion messages into one `AssertionFailed` error.
pub(crate) fn failed_as_error(results: &[AssertionResult]) -> Result<()> {
    let messages: Vec<&str> = results
        .iter()
        .filter(|r| !r.succeeded)
        .filter_map(|r| r.failure_message.as_deref())
        .collect();
    if messages.is_empty() {
        return Ok(());
    }
    Err(BrambleError::AssertionFailed {
        message: messages.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::OperatorRegistry;

    #[test]
    fn substitute_without_a_scope_leaves_the_target_alone() {
        let tree = BlockTree::new("s");
        let parameters = BTreeMap::new();
        let registry = OperatorRegistry::with_std().into_shared();
        let mut scopes = ScopeManager::new();
        let slot = Rc::new(RefCell::new("real"));

        let mut ctx = TestContext::new(&tree, tree.root(), &parameters, &registry, &mut scopes);
        assert!(ctx.substitute(&slot, "mock").is_err());
        assert_eq!(*slot.borrow(), "real");
    }

    #[test]
    fn substitute_is_undone_when_the_scope_closes() {
        let tree = BlockTree::new("s");
        let parameters = BTreeMap::new();
        let registry = OperatorRegistry::with_std().into_shared();
        let mut scopes = ScopeManager::new();
        let scope = scopes.open("test");
        let slot = Rc::new(RefCell::new("real"));

        let mut ctx = TestContext::new(&tree, tree.root(), &parameters, &registry, &mut scopes);
        ctx.substitute(&slot, "mock").unwrap();
        assert_eq!(*slot.borrow(), "mock");
        drop(ctx);
        scopes.close(scope);
        assert_eq!(*slot.borrow(), "real");
    }
}
