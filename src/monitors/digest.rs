//! Status digest and alert texts.
//!
//! A digest groups probe results by status code. Groups are ordered with every
//! non-200 code first (ascending), and the 200 group last, so problems are at
//! the top of the message. Within a group, URLs keep their input order.

use super::{ProbeResult, STATUS_OK};
use std::collections::BTreeMap;
use std::fmt::Write;

pub const DIGEST_HEADER: &str = "📊 Site status report:";
const OK_MARKER: &str = "✅";
const PROBLEM_MARKER: &str = "⚠️";

/// Group results by status code, in display order.
pub fn group_by_status(results: &[ProbeResult]) -> Vec<(u16, Vec<&ProbeResult>)> {
    let mut groups: BTreeMap<u16, Vec<&ProbeResult>> = BTreeMap::new();
    for result in results {
        groups.entry(result.status_code).or_default().push(result);
    }

    let ok_group = groups.remove(&STATUS_OK);
    let mut ordered: Vec<(u16, Vec<&ProbeResult>)> = groups.into_iter().collect();
    if let Some(ok) = ok_group {
        ordered.push((STATUS_OK, ok));
    }
    ordered
}

/// Render a digest. Empty input yields just the header.
pub fn format_digest(results: &[ProbeResult]) -> String {
    let mut output = String::new();
    output.push_str(DIGEST_HEADER);
    output.push_str("\n\n");

    for (code, group) in group_by_status(results) {
        let marker = if code == STATUS_OK { OK_MARKER } else { PROBLEM_MARKER };
        let _ = writeln!(output, "{} Status {}:", marker, code);
        for result in group {
            let _ = writeln!(output, "  • {}", result.url);
        }
        output.push('\n');
    }
    output
}

/// Immediate alert for a transition away from 200.
pub fn format_alert(result: &ProbeResult) -> String {
    format!(
        "{} Alert! {} returned status {} ({})",
        PROBLEM_MARKER, result.url, result.status_code, result.status_line
    )
}

/// Alert for a transition back to 200.
pub fn format_recovery(result: &ProbeResult, previous_code: u16) -> String {
    format!(
        "{} Recovered: {} is back to status {} (was {})",
        OK_MARKER, result.url, result.status_code, previous_code
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(url: &str, code: u16) -> ProbeResult {
        ProbeResult::new(url, code, code.to_string())
    }

    #[test]
    fn test_groups_ok_last() {
        let results = vec![r("urlA", 200), r("urlB", 500), r("urlC", 200), r("urlD", 404)];
        let groups = group_by_status(&results);
        let shape: Vec<(u16, Vec<&str>)> = groups
            .iter()
            .map(|(code, g)| (*code, g.iter().map(|p| p.url.as_str()).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (404, vec!["urlD"]),
                (500, vec!["urlB"]),
                (200, vec!["urlA", "urlC"]),
            ]
        );
    }

    #[test]
    fn test_format_digest_text() {
        let results = vec![r("urlA", 200), r("urlB", 500), r("urlC", 200), r("urlD", 404)];
        let expected = "📊 Site status report:\n\n\
                        ⚠️ Status 404:\n  • urlD\n\n\
                        ⚠️ Status 500:\n  • urlB\n\n\
                        ✅ Status 200:\n  • urlA\n  • urlC\n\n";
        assert_eq!(format_digest(&results), expected);
    }

    #[test]
    fn test_format_digest_is_deterministic() {
        let results = vec![r("x", 503), r("y", 200), r("z", 301)];
        assert_eq!(format_digest(&results), format_digest(&results));
    }

    #[test]
    fn test_empty_digest_is_header_only() {
        assert_eq!(format_digest(&[]), "📊 Site status report:\n\n");
    }

    #[test]
    fn test_alert_texts() {
        let bad = ProbeResult::new("https://a.test", 503, "503 Service Unavailable");
        assert_eq!(
            format_alert(&bad),
            "⚠️ Alert! https://a.test returned status 503 (503 Service Unavailable)"
        );
        let good = r("https://a.test", 200);
        assert!(format_recovery(&good, 503).contains("was 503"));
    }
}
