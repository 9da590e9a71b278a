//! Recipient handles and unit assignment.

use std::collections::HashSet;
use std::fmt;

/// A validated `@username` handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    /// Validate and normalize a handle.
    ///
    /// Accepts an optional leading `@` and 5 to 32 ASCII letters, digits or
    /// underscores.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let name = raw.strip_prefix('@').unwrap_or(raw);
        let valid = (5..=32).contains(&name.len())
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then(|| Self(format!("@{name}")))
    }

    /// The handle with its leading `@`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare username without `@`.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.0[1..]
    }

    /// Case-insensitive key used for de-duplication and rate limiting.
    #[must_use]
    pub fn key(&self) -> String {
        self.username().to_ascii_lowercase()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a buyer message into a list of handles.
///
/// Tokens are split on commas, semicolons and whitespace. Invalid tokens
/// are dropped; duplicates are removed case-insensitively keeping the first
/// spelling.
#[must_use]
pub fn parse_recipients(text: &str) -> Vec<Handle> {
    let mut seen = HashSet::new();
    text.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(Handle::parse)
        .filter(|handle| seen.insert(handle.key()))
        .collect()
}

/// Assign recipients to `qty` units.
///
/// A single recipient receives every unit; several recipients are assigned
/// round-robin by unit index.
#[must_use]
pub fn expand_assignment<T: Clone>(recipients: &[T], qty: usize) -> Vec<T> {
    if recipients.is_empty() {
        return Vec::new();
    }
    (0..qty)
        .map(|unit| recipients[unit % recipients.len()].clone())
        .collect()
}

/// Human-readable plan such as `@alice_x ×2, @bob_y ×1`.
///
/// Recipients appear in order of first assignment.
#[must_use]
pub fn plan_preview(assignment: &[Handle]) -> String {
    let mut counts: Vec<(&Handle, usize)> = Vec::new();
    for handle in assignment {
        match counts.iter_mut().find(|(seen, _)| *seen == handle) {
            Some((_, count)) => *count += 1,
            None => counts.push((handle, 1)),
        }
    }
    counts
        .iter()
        .map(|(handle, count)| format!("{handle} ×{count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parse_adds_prefix() {
        let handle = Handle::parse("alice_01").unwrap();
        assert_eq!(handle.as_str(), "@alice_01");
        assert_eq!(handle.username(), "alice_01");
    }

    #[test]
    fn test_handle_parse_rejects_bad_syntax() {
        assert!(Handle::parse("@abc").is_none());
        assert!(Handle::parse("").is_none());
        assert!(Handle::parse("@").is_none());
        assert!(Handle::parse("alice-01").is_none());
        assert!(Handle::parse(&"a".repeat(33)).is_none());
        assert!(Handle::parse(&"a".repeat(32)).is_some());
    }

    #[test]
    fn test_parse_recipients_splits_and_dedups() {
        let parsed = parse_recipients("@Alice_01, alice_01;\n@bob_smith  x @carol_99");
        let names: Vec<&str> = parsed.iter().map(Handle::as_str).collect();
        assert_eq!(names, vec!["@Alice_01", "@bob_smith", "@carol_99"]);
    }

    #[test]
    fn test_parse_recipients_empty_on_garbage() {
        assert!(parse_recipients("hi!").is_empty());
        assert!(parse_recipients("   ").is_empty());
    }

    #[test]
    fn test_expand_assignment_single_recipient_broadcasts() {
        assert_eq!(expand_assignment(&["@a"], 5), vec!["@a"; 5]);
    }

    #[test]
    fn test_expand_assignment_round_robin() {
        assert_eq!(
            expand_assignment(&["@a", "@b"], 5),
            vec!["@a", "@b", "@a", "@b", "@a"]
        );
        assert!(expand_assignment::<&str>(&[], 3).is_empty());
    }

    #[test]
    fn test_plan_preview_counts_in_first_seen_order() {
        let recipients = parse_recipients("@bob_smith @alice_01");
        let assignment = expand_assignment(&recipients, 3);
        assert_eq!(plan_preview(&assignment), "@bob_smith ×2, @alice_01 ×1");
    }
}
