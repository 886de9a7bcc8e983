//! Pure reduction of per-item outcomes into a batch report.

#![forbid(unsafe_code)]

use rostra_api::Severity;
use rostra_core::{BatchResult, BulkVerb, ItemFailure, ItemOutcome};

/// Reduce a batch of outcomes into counts and the failure list.
///
/// Order-independent by construction (count + filter), so completion order of
/// the underlying calls never changes the result.
pub fn aggregate(outcomes: &[ItemOutcome]) -> BatchResult {
    let success_count = outcomes.iter().filter(|o| o.succeeded).count();
    let failures: Vec<ItemFailure> = outcomes
        .iter()
        .filter(|o| !o.succeeded)
        .map(|o| ItemFailure {
            entity_id: o.entity_id.clone(),
            error_detail: o.error_detail.clone().unwrap_or_else(|| "unknown error".into()),
        })
        .collect();
    BatchResult { success_count, failure_count: outcomes.len() - success_count, failures }
}

fn students(n: usize) -> &'static str {
    if n == 1 {
        "student"
    } else {
        "students"
    }
}

/// Derive the single user-facing summary toast for a batch.
pub fn summary(result: &BatchResult, verb: BulkVerb) -> (String, Severity) {
    if result.total() == 0 {
        return ("No students selected".to_string(), Severity::Info);
    }
    if result.success_count == 0 {
        return (format!("Failed to {} any students.", verb.label()), Severity::Error);
    }
    let mut message = format!(
        "Successfully {} {} {}",
        verb.past_tense(),
        result.success_count,
        students(result.success_count)
    );
    if result.failure_count > 0 {
        message.push_str(&format!(", {} failed", result.failure_count));
        return (message, Severity::Warn);
    }
    (message, Severity::Success)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, detail: Option<&str>) -> ItemOutcome {
        match detail {
            None => ItemOutcome::success(id),
            Some(d) => ItemOutcome::failure(id, d),
        }
    }

    #[test]
    fn conservation_over_mixed_outcomes() {
        let outcomes = vec![
            outcome("s1", None),
            outcome("s2", Some("already enrolled")),
            outcome("s3", None),
        ];
        let result = aggregate(&outcomes);
        assert_eq!(result.success_count + result.failure_count, outcomes.len());
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].entity_id, "s2");
        assert_eq!(result.failures[0].error_detail, "already enrolled");
    }

    #[test]
    fn partial_success_message() {
        let outcomes = vec![
            outcome("s1", None),
            outcome("s2", Some("already enrolled")),
            outcome("s3", None),
        ];
        let (message, severity) = summary(&aggregate(&outcomes), BulkVerb::Enroll);
        assert_eq!(message, "Successfully enrolled 2 students, 1 failed");
        assert_eq!(severity, Severity::Warn);
    }

    #[test]
    fn all_success_message() {
        let outcomes = vec![outcome("s1", None), outcome("s2", None)];
        let (message, severity) = summary(&aggregate(&outcomes), BulkVerb::Remove);
        assert_eq!(message, "Successfully removed 2 students");
        assert_eq!(severity, Severity::Success);
    }

    #[test]
    fn single_success_uses_singular() {
        let outcomes = vec![outcome("s1", None)];
        let (message, _) = summary(&aggregate(&outcomes), BulkVerb::Enroll);
        assert_eq!(message, "Successfully enrolled 1 student");
    }

    #[test]
    fn total_failure_message() {
        let outcomes = vec![outcome("s1", Some("timed out"))];
        let (message, severity) = summary(&aggregate(&outcomes), BulkVerb::Delete);
        assert_eq!(message, "Failed to delete any students.");
        assert_eq!(severity, Severity::Error);
    }

    #[test]
    fn order_of_settlement_does_not_change_the_result() {
        let a = vec![
            outcome("s1", None),
            outcome("s2", Some("x")),
            outcome("s3", None),
            outcome("s4", Some("y")),
        ];
        let mut b = a.clone();
        b.reverse();
        let ra = aggregate(&a);
        let rb = aggregate(&b);
        assert_eq!(ra.success_count, rb.success_count);
        assert_eq!(ra.failure_count, rb.failure_count);
        let mut fa: Vec<_> = ra.failures.iter().map(|f| f.entity_id.clone()).collect();
        let mut fb: Vec<_> = rb.failures.iter().map(|f| f.entity_id.clone()).collect();
        fa.sort();
        fb.sort();
        assert_eq!(fa, fb);
    }

    #[test]
    fn empty_batch_is_informational() {
        let (message, severity) = summary(&aggregate(&[]), BulkVerb::Enroll);
        assert_eq!(message, "No students selected");
        assert_eq!(severity, Severity::Info);
    }
}
