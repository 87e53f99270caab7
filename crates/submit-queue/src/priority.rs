//! E2E queue ordering

use crate::labels;
use sq_github::PullRequest;

/// Priority of a pull request without a priority label
pub const DEFAULT_PRIORITY: i32 = 3;

/// Priority of `e2e-not-required` pull requests; they go first
pub const E2E_NOT_REQUIRED_PRIORITY: i32 = -1;

/// Sort key of a pull request (lower runs first)
///
/// The most urgent `priority/P<digit>` label wins; labels with anything other
/// than a single digit after the prefix are ignored.
pub fn priority_of(pr: &PullRequest) -> i32 {
    if pr.has_label(labels::E2E_NOT_REQUIRED) {
        return E2E_NOT_REQUIRED_PRIORITY;
    }

    pr.labels
        .iter()
        .filter_map(|label| parse_priority_label(label))
        .min()
        .unwrap_or(DEFAULT_PRIORITY)
}

fn parse_priority_label(label: &str) -> Option<i32> {
    let rest = label.strip_prefix(labels::PRIORITY_PREFIX)?;
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(10).map(|d| d as i32),
        _ => None,
    }
}

/// Pull request numbers in the order they get the E2E slot
///
/// Ascending priority, ties broken by ascending number.
pub fn ordered_queue<'a>(prs: impl IntoIterator<Item = &'a PullRequest>) -> Vec<u64> {
    let mut keyed: Vec<(i32, u64)> = prs
        .into_iter()
        .map(|pr| (priority_of(pr), pr.number))
        .collect();
    keyed.sort();
    keyed.into_iter().map(|(_, number)| number).collect()
}
