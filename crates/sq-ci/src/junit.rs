//! Failure counting for JUnit result files
//!
//! Only `<testsuite ... failures="N">` attributes are read; the rest of the
//! document is ignored.

use regex::Regex;
use std::sync::OnceLock;

fn failures_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<testsuite\b[^>]*\bfailures="(\d+)""#).expect("valid failures regex")
    })
}

/// Total failures declared by all test suites in the document
///
/// Returns None if the content is not UTF-8 or declares no suite.
pub fn count_failures(xml: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(xml).ok()?;
    let mut found = false;
    let mut total = 0u64;

    for caps in failures_regex().captures_iter(text) {
        found = true;
        total += caps[1].parse::<u64>().unwrap_or(0);
    }

    found.then_some(total)
}

/// Artifact file name of the n-th JUnit file (1-based)
pub fn junit_file_name(n: usize) -> String {
    format!("junit_{:02}.xml", n)
}
