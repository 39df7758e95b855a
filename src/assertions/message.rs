//! Failure-message template shared by all operators.
//!
//! Positive: `Expected 'a' to be like 'b', because <reason>, but it did not match.`
//! Negated:  `Expected 'a' to NOT be like 'b', because <reason>, but it did match.`
//! The because-clause is dropped entirely when no reason was given.

use super::{AssertionInvocation, AssertionOperator};

pub fn failure_message(operator: &AssertionOperator, invocation: &AssertionInvocation) -> String {
    let actual = invocation.actual.render();
    let expected = if operator.unary {
        String::new()
    } else {
        format!(" {}", invocation.expected.render())
    };
    let because = because_clause(invocation.because.as_deref());
    if invocation.negate {
        format!(
            "Expected {} to NOT {}{}{}, but it did match.",
            actual, operator.verb, expected, because
        )
    } else {
        format!(
            "Expected {} to {}{}{}, but it did not match.",
            actual, operator.verb, expected, because
        )
    }
}

fn because_clause(reason: Option<&str>) -> String {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => {
            let r = r.strip_prefix("because ").unwrap_or(r);
            format!(", because {}", r)
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op() -> AssertionOperator {
        AssertionOperator::new("BeLike", |_, _| false)
    }

    #[test]
    fn positive_message_names_both_values() {
        let inv = AssertionInvocation::new("Actual value", "not actual *");
        let msg = failure_message(&op(), &inv);
        assert_eq!(
            msg,
            "Expected 'Actual value' to be like 'not actual *', but it did not match."
        );
    }

    #[test]
    fn because_clause_is_rendered_once() {
        let inv = AssertionInvocation::new(1, 2).because("because it matters");
        let msg = failure_message(&op(), &inv);
        assert!(msg.contains(", because it matters, "));
        assert!(!msg.contains("because because"));
    }

    #[test]
    fn blank_reason_is_omitted() {
        let inv = AssertionInvocation::new(1, 2).because("  ");
        let msg = failure_message(&op(), &inv);
        assert!(!msg.contains("because"));
        assert!(!msg.contains("()"));
    }

    #[test]
    fn unary_operators_omit_expected() {
        let op = AssertionOperator::new("BeNullOrEmpty", |_, _| false).unary();
        let inv = AssertionInvocation::new("x", crate::value::Value::Nil);
        assert_eq!(
            failure_message(&op, &inv),
            "Expected 'x' to be null or empty, but it did not match."
        );
    }

    #[test]
    fn negated_message() {
        let inv = AssertionInvocation::new("a", "a").negated();
        assert_eq!(
            failure_message(&op(), &inv),
            "Expected 'a' to NOT be like 'a', but it did match."
        );
    }
}
