//! Wildcard patterns: `*` matches any run of characters, `?` exactly one,
//! `[abc]`/`[a-z]` one character from a set. Matching is anchored at both ends.
//! An unterminated `[` is taken literally, as is a class holding a reversed
//! range such as `[z-a]`.

use regex::{Regex, RegexBuilder};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Wildcard {
    pattern: String,
    regex: Regex,
}

impl Wildcard {
    /// Compiles a case-insensitive pattern.
    pub fn new(pattern: &str) -> Self {
        Self::build(pattern, false)
    }

    /// Compiles a case-sensitive pattern.
    pub fn exact(pattern: &str) -> Self {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, case_sensitive: bool) -> Self {
        let source = translate(pattern);
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
            .unwrap_or_else(|e| {
                debug!(pattern, error = %e, "wildcard pattern never matches");
                never_matches()
            });
        Self {
            pattern: pattern.to_string(),
            regex,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Case-insensitive one-shot match.
///
/// ```rust
/// use bramble::wildcard::is_like;
/// assert!(is_like("Actual value", "actual *"));
/// assert!(!is_like("Actual value", "not actual *"));
/// ```
pub fn is_like(text: &str, pattern: &str) -> bool {
    Wildcard::new(pattern).is_match(text)
}

fn never_matches() -> Regex {
    // An empty character class can never match.
    Regex::new(r"[^\s\S]").unwrap_or_else(|_| unreachable!("static regex"))
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str("(?s:.*)"),
            '?' => out.push_str("(?s:.)"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    let members = &chars[i + 1..end];
                    match translate_class(members) {
                        Some(class) => out.push_str(&class),
                        None => {
                            let literal: String = chars[i..=end].iter().collect();
                            debug!(class = %literal, "reversed range, matching the class literally");
                            out.push_str(&regex::escape(&literal));
                        }
                    }
                    i = end;
                }
                None => out.push_str(&regex::escape("[")),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Index of the `]` closing the class opened at `start`, requiring at least one
/// member.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let first = start + 1;
    chars
        .iter()
        .enumerate()
        .skip(first + 1)
        .find(|(_, c)| **c == ']')
        .map(|(idx, _)| idx)
        .filter(|_| first < chars.len() && chars[first] != ']')
}

/// `None` when a range runs backwards.
fn translate_class(members: &[char]) -> Option<String> {
    let mut out = String::from("[");
    for (idx, c) in members.iter().enumerate() {
        let is_range_dash = *c == '-' && idx > 0 && idx + 1 < members.len();
        if is_range_dash {
            if members[idx - 1] > members[idx + 1] {
                return None;
            }
            out.push('-');
        } else {
            out.push_str(&regex::escape(&c.to_string()));
        }
    }
    out.push(']');
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_and_question_mark() {
        assert!(is_like("Actual value", "actual *"));
        assert!(is_like("abc", "a?c"));
        assert!(!is_like("abbc", "a?c"));
        assert!(is_like("", "*"));
    }

    #[test]
    fn match_is_anchored() {
        assert!(!is_like("xabc", "abc"));
        assert!(!is_like("abcx", "abc"));
    }

    #[test]
    fn character_sets_and_ranges() {
        assert!(is_like("b1", "[abc][0-9]"));
        assert!(!is_like("d1", "[abc][0-9]"));
    }

    #[test]
    fn unterminated_bracket_is_literal() {
        assert!(is_like("a[b", "a[b"));
        assert!(is_like("[]", "[]"));
    }

    #[test]
    fn reversed_range_is_literal() {
        assert!(is_like("[z-a]", "[z-a]"));
        assert!(!is_like("b", "[z-a]"));
        assert!(is_like("x[z-a]y", "x[z-a]?"));
        assert!(is_like("c", "[a-c]"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(is_like("1+1=2", "1+1=2"));
        assert!(!is_like("11=2", "1+1=2"));
    }

    #[test]
    fn exact_is_case_sensitive() {
        assert!(!Wildcard::exact("actual *").is_match("Actual value"));
        assert!(Wildcard::exact("Actual *").is_match("Actual value"));
    }
}
