//! Sample Evaluator - Client-Side Classification of Run Output
//!
//! **Core Responsibility:**
//! Turn the raw stdout/stderr the execution service returns for one sample
//! test case into an `ExecutionOutcome`.
//!
//! **Classification Order:**
//! 1. Non-empty compile output or stderr → RuntimeError (even if stdout matches)
//! 2. Normalized stdout differs from normalized expected → WrongAnswer
//! 3. Otherwise → Accepted
//!
//! **Normalization Rules:**
//! - CRLF converted to LF
//! - Leading and trailing whitespace trimmed
//! - Internal whitespace and case preserved

use arena_common::types::{ExecutionOutcome, ExecutionStatus, SampleTestCase};

use crate::error::ServiceError;
use crate::services::wire::RunResponse;

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim().to_string()
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Classify one execution service response against its sample case
pub fn classify(case: &SampleTestCase, response: &RunResponse) -> ExecutionOutcome {
    let actual = response.stdout.clone().unwrap_or_default();

    // Compiler output explains more than the runtime stderr that follows it
    let error_text = non_empty(&response.compile_output)
        .or_else(|| non_empty(&response.stderr))
        .map(str::to_string);

    let status = if error_text.is_some() {
        ExecutionStatus::RuntimeError
    } else if normalize_output(&actual) != normalize_output(&case.output) {
        ExecutionStatus::WrongAnswer
    } else {
        ExecutionStatus::Accepted
    };

    ExecutionOutcome {
        status,
        input: case.input.clone(),
        expected: case.output.clone(),
        actual,
        error_text,
    }
}

/// Outcome for a sample whose request never produced a usable response
pub fn failed_execution(case: &SampleTestCase, error: &ServiceError) -> ExecutionOutcome {
    ExecutionOutcome {
        status: ExecutionStatus::Error,
        input: case.input.clone(),
        expected: case.output.clone(),
        actual: String::new(),
        error_text: Some(error.to_string()),
    }
}

/// Pass count over a batch of sample outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub total: usize,
}

impl RunSummary {
    pub fn of(outcomes: &[ExecutionOutcome]) -> Self {
        Self {
            passed: outcomes
                .iter()
                .filter(|o| o.status == ExecutionStatus::Accepted)
                .count(),
            total: outcomes.len(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(input: &str, output: &str) -> SampleTestCase {
        SampleTestCase {
            input: input.to_string(),
            output: output.to_string(),
            explanation: None,
        }
    }

    fn response(stdout: &str, stderr: &str, compile: Option<&str>) -> RunResponse {
        RunResponse {
            stdout: Some(stdout.to_string()),
            stderr: Some(stderr.to_string()),
            compile_output: compile.map(str::to_string),
        }
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("hello"), "hello");
        assert_eq!(normalize_output("  hello  "), "hello");
        assert_eq!(normalize_output("hello\r\n"), "hello");
        assert_eq!(normalize_output("a\r\nb\r\nc\r\n"), "a\nb\nc");
        assert_eq!(normalize_output("   "), "");
    }

    #[test]
    fn test_exact_match_accepted() {
        let outcome = classify(&case("5", "120"), &response("120", "", None));
        assert_eq!(outcome.status, ExecutionStatus::Accepted);
        assert!(outcome.error_text.is_none());
    }

    #[test]
    fn test_crlf_and_whitespace_accepted() {
        let outcome = classify(&case("", "1\n2\n3"), &response("  1\r\n2\r\n3\r\n", "", None));
        assert_eq!(outcome.status, ExecutionStatus::Accepted);

        let outcome = classify(&case("", "1\r\n2"), &response("1\n2\n", "", None));
        assert_eq!(outcome.status, ExecutionStatus::Accepted);
    }

    #[test]
    fn test_mismatch_is_wrong_answer() {
        let outcome = classify(&case("1 2", "3"), &response("4", "", None));
        assert_eq!(outcome.status, ExecutionStatus::WrongAnswer);
        assert_eq!(outcome.actual, "4");
        assert_eq!(outcome.expected, "3");
    }

    #[test]
    fn test_case_sensitive() {
        let outcome = classify(&case("", "Hello"), &response("hello", "", None));
        assert_eq!(outcome.status, ExecutionStatus::WrongAnswer);
    }

    #[test]
    fn test_error_wins_over_matching_output() {
        let outcome = classify(
            &case("", "42"),
            &response("42", "Traceback: ZeroDivisionError", None),
        );
        assert_eq!(outcome.status, ExecutionStatus::RuntimeError);
        assert_eq!(outcome.error_text.as_deref(), Some("Traceback: ZeroDivisionError"));
    }

    #[test]
    fn test_compile_output_reported_first() {
        let outcome = classify(
            &case("", "x"),
            &response("", "exit status 1", Some("Main.java:3: error: ';' expected")),
        );
        assert_eq!(outcome.status, ExecutionStatus::RuntimeError);
        assert_eq!(
            outcome.error_text.as_deref(),
            Some("Main.java:3: error: ';' expected")
        );
    }

    #[test]
    fn test_whitespace_only_stderr_is_still_an_error() {
        let outcome = classify(&case("", "42"), &response("42", "\n", None));
        assert_eq!(outcome.status, ExecutionStatus::RuntimeError);
        assert_eq!(outcome.error_text.as_deref(), Some("\n"));

        let outcome = classify(&case("", "ok"), &response("ok", "", Some("")));
        assert_eq!(outcome.status, ExecutionStatus::Accepted);
    }

    #[test]
    fn test_missing_stdout_compares_as_empty() {
        let empty = RunResponse::default();
        assert_eq!(classify(&case("", ""), &empty).status, ExecutionStatus::Accepted);
        assert_eq!(classify(&case("", "1"), &empty).status, ExecutionStatus::WrongAnswer);
    }

    #[test]
    fn test_failed_execution_carries_reason() {
        let err = ServiceError::Validation("missing field `stdout`".into());
        let outcome = failed_execution(&case("7", "49"), &err);
        assert_eq!(outcome.status, ExecutionStatus::Error);
        assert_eq!(outcome.input, "7");
        assert!(outcome.error_text.unwrap().contains("missing field"));
    }

    #[test]
    fn test_summary() {
        let outcomes = vec![
            classify(&case("", "a"), &response("a", "", None)),
            classify(&case("", "b"), &response("c", "", None)),
        ];
        let summary = RunSummary::of(&outcomes);
        assert_eq!(summary, RunSummary { passed: 1, total: 2 });
        assert!(!summary.all_passed());
        assert!(!RunSummary::of(&[]).all_passed());
    }
}
