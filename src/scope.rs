//! Scoped resource cleanup.
//!
//! Every group or test body runs inside a scope opened by the runner. Mock
//! substitutions, scratch directories and ad-hoc cleanups registered while the
//! scope is active are released when it closes, innermost first, on every exit
//! path. A release failure, panics included, is logged and counted; it never
//! replaces the outcome of the body that owned the resource.

use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{trace, warn};

use crate::errors::{panic_to_fault, BrambleError, Result};

/// Something that must be undone when its scope ends.
///
/// `release` consumes the resource, so it runs at most once.
pub trait Resource {
    fn describe(&self) -> String;
    fn release(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    scope: ScopeId,
    id: u64,
}

impl ResourceHandle {
    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

struct Scope {
    id: ScopeId,
    label: String,
    resources: Vec<(u64, Box<dyn Resource>)>,
}

/// Totals from closing one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleaseReport {
    pub released: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct ScopeManager {
    stack: Vec<Scope>,
    next_scope: usize,
    next_resource: u64,
    totals: ReleaseReport,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, label: &str) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        trace!(scope = id.0, label, "open scope");
        self.stack.push(Scope {
            id,
            label: label.to_string(),
            resources: Vec::new(),
        });
        id
    }

    pub fn current(&self) -> Option<ScopeId> {
        self.stack.last().map(|s| s.id)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Resources still waiting for release across all open scopes.
    pub fn pending(&self) -> usize {
        self.stack.iter().map(|s| s.resources.len()).sum()
    }

    /// Totals over every scope closed so far.
    pub fn totals(&self) -> ReleaseReport {
        self.totals
    }

    /// Registers against the innermost open scope.
    pub fn register(&mut self, resource: Box<dyn Resource>) -> Result<ResourceHandle> {
        let scope = self
            .current()
            .ok_or_else(|| BrambleError::fault("no scope is open to own the resource"))?;
        self.register_for_cleanup(scope, resource)
    }

    pub fn register_for_cleanup(
        &mut self,
        scope: ScopeId,
        resource: Box<dyn Resource>,
    ) -> Result<ResourceHandle> {
        let id = self.next_resource;
        let target = self
            .stack
            .iter_mut()
            .find(|s| s.id == scope)
            .ok_or_else(|| BrambleError::fault(format!("scope {} is not open", scope.0)))?;
        trace!(scope = scope.0, resource = %resource.describe(), "register resource");
        target.resources.push((id, resource));
        self.next_resource += 1;
        Ok(ResourceHandle { scope, id })
    }

    /// Releases one resource early. Returns `false` if it was already released.
    pub fn release(&mut self, handle: ResourceHandle) -> Result<bool> {
        let Some(scope) = self.stack.iter_mut().find(|s| s.id == handle.scope) else {
            return Ok(false);
        };
        let Some(pos) = scope.resources.iter().position(|(id, _)| *id == handle.id) else {
            return Ok(false);
        };
        let (_, resource) = scope.resources.remove(pos);
        let description = resource.describe();
        if let Err(e) = release_contained(resource) {
            warn!(scope = %scope.label, resource = %description, error = %e, "early release failed");
            self.totals.failed += 1;
            return Err(e);
        }
        self.totals.released += 1;
        Ok(true)
    }

    /// Closes `scope` and any scope opened after it, innermost first.
    pub fn close(&mut self, scope: ScopeId) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        let Some(pos) = self.stack.iter().position(|s| s.id == scope) else {
            return report;
        };
        while self.stack.len() > pos {
            if let Some(inner) = self.stack.pop() {
                release_all(inner, &mut report);
            }
        }
        self.totals.released += report.released;
        self.totals.failed += report.failed;
        report
    }
}

fn release_all(scope: Scope, report: &mut ReleaseReport) {
    trace!(scope = scope.id.0, label = %scope.label, "close scope");
    for (_, resource) in scope.resources.into_iter().rev() {
        let description = resource.describe();
        match release_contained(resource) {
            Ok(()) => report.released += 1,
            Err(e) => {
                warn!(scope = %scope.label, resource = %description, error = %e, "resource release failed");
                report.failed += 1;
            }
        }
    }
}

/// A panicking release becomes a fault instead of unwinding through `close`.
fn release_contained(resource: Box<dyn Resource>) -> Result<()> {
    catch_unwind(AssertUnwindSafe(move || resource.release()))
        .unwrap_or_else(|payload| Err(panic_to_fault(payload)))
}

impl Drop for ScopeManager {
    fn drop(&mut self) {
        if let Some(outermost) = self.stack.first().map(|s| s.id) {
            self.close(outermost);
        }
    }
}

impl fmt::Debug for ScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeManager")
            .field("depth", &self.stack.len())
            .field("pending", &self.pending())
            .field("totals", &self.totals)
            .finish()
    }
}

// ============================================================================
// RESOURCES
// ============================================================================

/// Arbitrary cleanup closure.
pub struct CleanupFn {
    label: String,
    action: Box<dyn FnOnce() -> Result<()>>,
}

impl CleanupFn {
    pub fn new<F>(label: &str, action: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        Self {
            label: label.to_string(),
            action: Box::new(action),
        }
    }
}

impl Resource for CleanupFn {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn release(self: Box<Self>) -> Result<()> {
        (self.action)()
    }
}

/// Mock substitution: swaps a value into a shared slot and puts the original
/// back on release.
pub struct Substitution<T: 'static> {
    target: Rc<RefCell<T>>,
    original: T,
}

impl<T: 'static> Substitution<T> {
    pub fn install(target: &Rc<RefCell<T>>, replacement: T) -> Result<Self> {
        let original = target
            .try_borrow_mut()
            .map(|mut slot| std::mem::replace(&mut *slot, replacement))
            .map_err(|_| BrambleError::fault("substitution target is borrowed"))?;
        Ok(Self {
            target: Rc::clone(target),
            original,
        })
    }
}

impl<T: 'static> Resource for Substitution<T> {
    fn describe(&self) -> String {
        format!("substitution of {}", std::any::type_name::<T>())
    }

    fn release(self: Box<Self>) -> Result<()> {
        let Substitution { target, original } = *self;
        let mut slot = target
            .try_borrow_mut()
            .map_err(|_| BrambleError::fault("substitution target is borrowed at restore"))?;
        *slot = original;
        Ok(())
    }
}

/// Scratch directory removed on release.
pub struct ScratchDir {
    dir: tempfile::TempDir,
}

impl ScratchDir {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("bramble-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

impl Resource for ScratchDir {
    fn describe(&self) -> String {
        format!("scratch directory {}", self.dir.path().display())
    }

    fn release(self: Box<Self>) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(label: &str, log: &Rc<RefCell<Vec<String>>>) -> Box<dyn Resource> {
        let log = Rc::clone(log);
        let label = label.to_string();
        Box::new(CleanupFn::new(&label.clone(), move || {
            log.borrow_mut().push(label);
            Ok(())
        }))
    }

    #[test]
    fn release_order_is_innermost_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scopes = ScopeManager::new();
        let outer = scopes.open("outer");
        scopes.register(counting("a", &log)).unwrap();
        scopes.open("inner");
        scopes.register(counting("b", &log)).unwrap();
        scopes.register(counting("c", &log)).unwrap();
        let report = scopes.close(outer);
        assert_eq!(report.released, 3);
        assert_eq!(*log.borrow(), ["c", "b", "a"]);
        assert_eq!(scopes.depth(), 0);
    }

    #[test]
    fn failed_release_does_not_stop_the_others() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scopes = ScopeManager::new();
        let scope = scopes.open("s");
        scopes.register(counting("a", &log)).unwrap();
        scopes
            .register(Box::new(CleanupFn::new("broken", || {
                Err(BrambleError::fault("cannot restore"))
            })))
            .unwrap();
        let report = scopes.close(scope);
        assert_eq!(report, ReleaseReport { released: 1, failed: 1 });
        assert_eq!(*log.borrow(), ["a"]);
    }

    #[test]
    fn early_release_happens_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scopes = ScopeManager::new();
        let scope = scopes.open("s");
        let handle = scopes.register(counting("a", &log)).unwrap();
        assert!(scopes.release(handle).unwrap());
        assert!(!scopes.release(handle).unwrap());
        scopes.close(scope);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn panicking_release_is_counted_as_failed() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scopes = ScopeManager::new();
        let scope = scopes.open("s");
        scopes.register(counting("first", &log)).unwrap();
        scopes
            .register(Box::new(CleanupFn::new("explodes", || panic!("cleanup blew up"))))
            .unwrap();
        let report = scopes.close(scope);
        assert_eq!(report, ReleaseReport { released: 1, failed: 1 });
        assert_eq!(*log.borrow(), ["first"]);
        assert_eq!(scopes.depth(), 0);
    }

    #[test]
    fn panicking_early_release_is_an_error() {
        let mut scopes = ScopeManager::new();
        scopes.open("s");
        let handle = scopes
            .register(Box::new(CleanupFn::new("explodes", || panic!("cleanup blew up"))))
            .unwrap();
        let err = scopes.release(handle).unwrap_err();
        assert_eq!(err.to_string(), "panic: cleanup blew up");
        assert_eq!(scopes.totals().failed, 1);
        assert!(!scopes.release(handle).unwrap());
    }

    #[test]
    fn register_without_scope_is_an_error() {
        let mut scopes = ScopeManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        assert!(scopes.register(counting("a", &log)).is_err());
    }

    #[test]
    fn substitution_restores_original() {
        let slot = Rc::new(RefCell::new("real"));
        let mut scopes = ScopeManager::new();
        let scope = scopes.open("s");
        let sub = Substitution::install(&slot, "mock").unwrap();
        scopes.register(Box::new(sub)).unwrap();
        assert_eq!(*slot.borrow(), "mock");
        scopes.close(scope);
        assert_eq!(*slot.borrow(), "real");
    }

    #[test]
    fn scratch_dir_is_removed() {
        let mut scopes = ScopeManager::new();
        let scope = scopes.open("s");
        let dir = ScratchDir::create().unwrap();
        let path = dir.path_buf();
        std::fs::write(path.join("f.txt"), "x").unwrap();
        scopes.register(Box::new(dir)).unwrap();
        assert!(path.exists());
        scopes.close(scope);
        assert!(!path.exists());
    }

    #[test]
    fn dropping_the_manager_releases_open_scopes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut scopes = ScopeManager::new();
            scopes.open("s");
            scopes.register(counting("a", &log)).unwrap();
        }
        assert_eq!(*log.borrow(), ["a"]);
    }
}
