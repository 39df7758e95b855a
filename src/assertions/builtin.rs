//! Standard assertion operators.
//!
//! ## Operators Provided
//!
//! - **Equality**: `Be`, `BeExactly`
//! - **Patterns**: `BeLike`, `BeLikeExactly`, `Match`, `MatchExactly`
//! - **Collections**: `Contain`, `BeNullOrEmpty`
//! - **Ordering**: `BeGreaterThan`, `BeLessThan`
//!
//! Extensions add their own operators the same way: build an
//! [`AssertionOperator`] and register it before any suite runs.

use regex::RegexBuilder;

use crate::assertions::{AssertionOperator, OperatorRegistry};
use crate::value::Value;
use crate::wildcard::Wildcard;

// ============================================================================
// EQUALITY
// ============================================================================

/// Equality with case-insensitive string comparison.
///
/// Usage: `t.should("Be", AssertionInvocation::new(actual, expected))`
///
/// Example:
///   "Hello" Be "hello"  ; => true
///   [1, 2]  Be [1, 2]   ; => true
pub fn be(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(e)) => a.to_lowercase() == e.to_lowercase(),
        (Value::List(a), Value::List(e)) => {
            a.len() == e.len() && a.iter().zip(e).all(|(x, y)| be(x, y))
        }
        _ => actual == expected,
    }
}

/// Strict equality, case-sensitive.
pub fn be_exactly(actual: &Value, expected: &Value) -> bool {
    actual == expected
}

// ============================================================================
// PATTERNS
// ============================================================================

pub fn be_like(actual: &Value, expected: &Value) -> bool {
    match expected.as_str() {
        Some(pattern) => Wildcard::new(pattern).is_match(&actual.to_string()),
        None => false,
    }
}

pub fn be_like_exactly(actual: &Value, expected: &Value) -> bool {
    match expected.as_str() {
        Some(pattern) => Wildcard::exact(pattern).is_match(&actual.to_string()),
        None => false,
    }
}

fn regex_match(actual: &Value, expected: &Value, case_sensitive: bool) -> bool {
    let Some(pattern) = expected.as_str() else {
        return false;
    };
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map(|re| re.is_match(&actual.to_string()))
        .unwrap_or(false)
}

/// Unanchored regex search, case-insensitive. An invalid pattern never matches.
pub fn match_regex(actual: &Value, expected: &Value) -> bool {
    regex_match(actual, expected, false)
}

pub fn match_exactly(actual: &Value, expected: &Value) -> bool {
    regex_match(actual, expected, true)
}

// ============================================================================
// COLLECTIONS
// ============================================================================

/// List membership (using `Be` semantics) or substring containment.
pub fn contain(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::List(items) => items.iter().any(|item| be(item, expected)),
        Value::String(s) => match expected {
            Value::String(needle) => s.contains(needle.as_str()),
            other => s.contains(&other.to_string()),
        },
        Value::Map(map) => expected.as_str().is_some_and(|k| map.contains_key(k)),
        _ => false,
    }
}

/// Ignores `expected`.
pub fn be_null_or_empty(actual: &Value, _expected: &Value) -> bool {
    actual.is_empty()
}

// ============================================================================
// ORDERING
// ============================================================================

fn compare(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(e)) => a.partial_cmp(e),
        (Value::String(a), Value::String(e)) => Some(a.to_lowercase().cmp(&e.to_lowercase())),
        _ => None,
    }
}

pub fn be_greater_than(actual: &Value, expected: &Value) -> bool {
    compare(actual, expected) == Some(std::cmp::Ordering::Greater)
}

pub fn be_less_than(actual: &Value, expected: &Value) -> bool {
    compare(actual, expected) == Some(std::cmp::Ordering::Less)
}

// ============================================================================
// REGISTRATION
// ============================================================================

/// Registers every standard operator. Called once when a registry is built.
pub fn register_builtin_operators(registry: &mut OperatorRegistry) {
    let operators = [
        AssertionOperator::new("Be", be),
        AssertionOperator::new("BeExactly", be_exactly),
        AssertionOperator::new("BeLike", be_like),
        AssertionOperator::new("BeLikeExactly", be_like_exactly),
        AssertionOperator::new("Match", match_regex),
        AssertionOperator::new("MatchExactly", match_exactly),
        AssertionOperator::new("Contain", contain),
        AssertionOperator::new("BeNullOrEmpty", be_null_or_empty).unary(),
        AssertionOperator::new("BeGreaterThan", be_greater_than),
        AssertionOperator::new("BeLessThan", be_less_than),
    ];
    for operator in operators {
        // A fresh registry never holds duplicates of these names.
        if let Err(e) = registry.register(operator) {
            tracing::warn!(error = %e, "skipped standard operator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::AssertionInvocation;

    #[test]
    fn be_ignores_string_case_but_be_exactly_does_not() {
        assert!(be(&"Hello".into(), &"hello".into()));
        assert!(!be_exactly(&"Hello".into(), &"hello".into()));
    }

    #[test]
    fn contain_handles_lists_and_strings() {
        let list = Value::from(vec![1, 2, 3]);
        assert!(contain(&list, &Value::from(2)));
        assert!(!contain(&list, &Value::from(4)));
        assert!(contain(&"haystack".into(), &"st".into()));
    }

    #[test]
    fn invalid_regex_never_matches() {
        assert!(!match_regex(&"abc".into(), &"(".into()));
        assert!(match_regex(&"ABC".into(), &"b".into()));
        assert!(!match_exactly(&"ABC".into(), &"b".into()));
    }

    #[test]
    fn ordering_requires_comparable_types() {
        assert!(be_greater_than(&Value::from(3), &Value::from(2)));
        assert!(!be_greater_than(&Value::from(3), &"2".into()));
        assert!(be_less_than(&"apple".into(), &"Banana".into()));
    }

    #[test]
    fn builtin_set_is_complete() {
        let registry = OperatorRegistry::with_std();
        assert_eq!(registry.len(), 10);
        let result = registry
            .invoke("BeLike", &AssertionInvocation::new("Actual value", "actual *"))
            .unwrap();
        assert!(result.succeeded);
    }
}
