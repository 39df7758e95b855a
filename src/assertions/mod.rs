//! # Assertion operators
//!
//! Assertions are pluggable: an [`AssertionOperator`] is a named predicate over an
//! `(actual, expected)` pair. Operators live in an [`OperatorRegistry`], and
//! [`OperatorRegistry::invoke`] resolves one by name, applies negation and builds
//! the failure message.
//!
//! ## Module Structure
//!
//! - **`message`**: the single failure-message template shared by every operator
//! - **`builtin`**: the standard operators (`Be`, `BeLike`, `Match`, ...)
//!
//! ## Registry lifecycle
//!
//! A process-wide registry is available through [`global_registry`]. It is
//! populated with the standard operators on first use, accepts extension
//! operators through [`register_operator`], and is sealed by the runner before the
//! first suite runs. Registration after sealing fails with
//! [`BrambleError::RegistryLocked`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use tracing::debug;

use crate::errors::{BrambleError, Result};
use crate::value::Value;

pub mod message;
pub mod builtin;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Operator predicate: `(actual, expected) -> matched`.
pub type Predicate = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// A named, pluggable comparison used by assertions.
#[derive(Clone)]
pub struct AssertionOperator {
    pub name: String,
    pub predicate: Predicate,
    pub negatable: bool,
    /// Verb phrase used in failure messages, e.g. `"be like"`.
    pub verb: String,
    /// Unary operators ignore `expected`; messages leave it out.
    pub unary: bool,
}

impl AssertionOperator {
    pub fn new<F>(name: &str, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            predicate: Arc::new(predicate),
            negatable: true,
            verb: verb_from_name(name),
            unary: false,
        }
    }

    pub fn non_negatable(mut self) -> Self {
        self.negatable = false;
        self
    }

    pub fn unary(mut self) -> Self {
        self.unary = true;
        self
    }

    pub fn with_verb(mut self, verb: &str) -> Self {
        self.verb = verb.to_string();
        self
    }
}

impl fmt::Debug for AssertionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionOperator")
            .field("name", &self.name)
            .field("negatable", &self.negatable)
            .field("verb", &self.verb)
            .field("unary", &self.unary)
            .finish_non_exhaustive()
    }
}

/// One assertion call: consumed by [`OperatorRegistry::invoke`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionInvocation {
    pub actual: Value,
    pub expected: Value,
    pub negate: bool,
    pub because: Option<String>,
}

impl AssertionInvocation {
    pub fn new(actual: impl Into<Value>, expected: impl Into<Value>) -> Self {
        Self {
            actual: actual.into(),
            expected: expected.into(),
            negate: false,
            because: None,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.because = Some(reason.into());
        self
    }
}

/// Outcome of one assertion. `failure_message` is present exactly when
/// `succeeded` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionResult {
    pub succeeded: bool,
    pub failure_message: Option<String>,
    /// Rendered expected value, kept on failure for diff-capable reporters.
    pub expected: Option<String>,
    /// Rendered actual value, kept on failure for diff-capable reporters.
    pub actual: Option<String>,
}

impl AssertionResult {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            failure_message: None,
            expected: None,
            actual: None,
        }
    }

    pub fn failure(message: String, expected: &Value, actual: &Value) -> Self {
        Self {
            succeeded: false,
            failure_message: Some(message),
            expected: Some(expected.to_string()),
            actual: Some(actual.to_string()),
        }
    }

    /// Turns a failed result into `BrambleError::AssertionFailed`, for callers
    /// that want to stop at the first failure.
    pub fn into_result(self) -> Result<()> {
        match self.failure_message {
            None if self.succeeded => Ok(()),
            message => Err(BrambleError::AssertionFailed {
                message: message.unwrap_or_else(|| "assertion failed".to_string()),
            }),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Case-insensitive table of assertion operators.
#[derive(Default, Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, AssertionOperator>,
    sealed: bool,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the standard operators.
    pub fn with_std() -> Self {
        let mut registry = Self::new();
        builtin::register_builtin_operators(&mut registry);
        registry
    }

    /// Adds an operator. Names collide case-insensitively.
    pub fn register(&mut self, operator: AssertionOperator) -> Result<()> {
        if self.sealed {
            return Err(BrambleError::RegistryLocked {
                name: operator.name,
            });
        }
        let key = operator.name.to_lowercase();
        if self.operators.contains_key(&key) {
            return Err(BrambleError::DuplicateOperator {
                name: operator.name,
            });
        }
        debug!(operator = %operator.name, negatable = operator.negatable, "registered operator");
        self.operators.insert(key, operator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AssertionOperator> {
        self.operators.get(&name.to_lowercase())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered operator names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operators.values().map(|o| o.name.clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Ends the setup phase; further registration fails.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Wraps the registry for sharing with a runner.
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Resolves `name`, runs its predicate and applies negation.
    ///
    /// A failed assertion is returned as `Ok` with `succeeded == false`; only
    /// misuse (unknown operator, negating a non-negatable one) is an `Err`.
    pub fn invoke(&self, name: &str, invocation: &AssertionInvocation) -> Result<AssertionResult> {
        let operator = self
            .get(name)
            .ok_or_else(|| BrambleError::UnknownOperator {
                name: name.to_string(),
            })?;

        if invocation.negate && !operator.negatable {
            return Err(BrambleError::NonNegatableOperator {
                name: operator.name.clone(),
            });
        }

        let raw = (operator.predicate)(&invocation.actual, &invocation.expected);
        let succeeded = if invocation.negate { !raw } else { raw };
        if succeeded {
            return Ok(AssertionResult::success());
        }

        let message = message::failure_message(operator, invocation);
        Ok(AssertionResult::failure(
            message,
            &invocation.expected,
            &invocation.actual,
        ))
    }
}

/// Handle to a registry shared between the runner and test contexts.
pub type SharedRegistry = Arc<RwLock<OperatorRegistry>>;

lazy_static! {
    static ref GLOBAL_REGISTRY: SharedRegistry = OperatorRegistry::with_std().into_shared();
}

/// The process-wide registry.
pub fn global_registry() -> SharedRegistry {
    Arc::clone(&GLOBAL_REGISTRY)
}

/// Registers an extension operator in the process-wide registry.
pub fn register_operator(operator: AssertionOperator) -> Result<()> {
    write_registry(&GLOBAL_REGISTRY)?.register(operator)
}

/// Resolves and runs an operator against a shared registry.
pub fn invoke(
    registry: &SharedRegistry,
    name: &str,
    invocation: &AssertionInvocation,
) -> Result<AssertionResult> {
    read_registry(registry)?.invoke(name, invocation)
}

pub(crate) fn read_registry(
    registry: &SharedRegistry,
) -> Result<std::sync::RwLockReadGuard<'_, OperatorRegistry>> {
    registry
        .read()
        .map_err(|_| BrambleError::fault("operator registry lock poisoned"))
}

pub(crate) fn write_registry(
    registry: &SharedRegistry,
) -> Result<std::sync::RwLockWriteGuard<'_, OperatorRegistry>> {
    registry
        .write()
        .map_err(|_| BrambleError::fault("operator registry lock poisoned"))
}

/// `BeLikeExactly` -> `be like exactly`, `BeHTML` -> `be html`
fn verb_from_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for c in name.chars() {
        let starts_word = c.is_uppercase()
            && previous.map_or(false, |p| p.is_lowercase() || p.is_ascii_digit());
        if starts_word {
            out.push(' ');
        }
        out.extend(c.to_lowercase());
        previous = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wildcard::is_like;

    fn like_registry() -> OperatorRegistry {
        let mut registry = OperatorRegistry::new();
        registry
            .register(AssertionOperator::new("BeLike", |a, e| {
                match (a.as_str(), e.as_str()) {
                    (Some(a), Some(e)) => is_like(a, e),
                    _ => false,
                }
            }))
            .unwrap();
        registry
    }

    #[test]
    fn verb_is_derived_from_pascal_case() {
        assert_eq!(verb_from_name("BeLike"), "be like");
        assert_eq!(verb_from_name("Match"), "match");
    }

    #[test]
    fn acronyms_stay_one_word_in_the_verb() {
        assert_eq!(verb_from_name("BeHTML"), "be html");
        assert_eq!(verb_from_name("BeLikeExactly"), "be like exactly");
        assert_eq!(verb_from_name("BeNullOrEmpty"), "be null or empty");
        assert_eq!(verb_from_name("HaveCount2Items"), "have count2 items");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = like_registry();
        assert!(registry.has("belike"));
        assert!(registry.has("BELIKE"));
    }

    #[test]
    fn duplicate_names_collide_case_insensitively() {
        let mut registry = like_registry();
        let err = registry
            .register(AssertionOperator::new("belike", |_, _| true))
            .unwrap_err();
        assert!(matches!(err, BrambleError::DuplicateOperator { .. }));
    }

    #[test]
    fn sealed_registry_rejects_registration() {
        let mut registry = like_registry();
        registry.seal();
        let err = registry
            .register(AssertionOperator::new("Other", |_, _| true))
            .unwrap_err();
        assert!(matches!(err, BrambleError::RegistryLocked { .. }));
    }

    #[test]
    fn negation_flips_result() {
        let registry = like_registry();
        let plain = AssertionInvocation::new("Actual value", "actual *");
        let negated = plain.clone().negated();
        let a = registry.invoke("BeLike", &plain).unwrap();
        let b = registry.invoke("BeLike", &negated).unwrap();
        assert!(a.succeeded);
        assert!(!b.succeeded);
        assert!(a.failure_message.is_none());
        assert!(b.failure_message.unwrap().contains("NOT"));
    }

    #[test]
    fn non_negatable_operator_rejects_negation() {
        let mut registry = OperatorRegistry::new();
        registry
            .register(AssertionOperator::new("Throw", |_, _| true).non_negatable())
            .unwrap();
        let err = registry
            .invoke("Throw", &AssertionInvocation::new(1, 1).negated())
            .unwrap_err();
        assert!(matches!(err, BrambleError::NonNegatableOperator { .. }));
    }

    #[test]
    fn into_result_maps_failure_to_error() {
        let registry = like_registry();
        let result = registry
            .invoke("BeLike", &AssertionInvocation::new("abc", "x*"))
            .unwrap();
        assert!(matches!(
            result.into_result(),
            Err(BrambleError::AssertionFailed { .. })
        ));
    }
}
