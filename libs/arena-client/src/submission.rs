//! Graded submission against the hidden test set.
//!
//! The grading service's verdict is authoritative; this module only converts
//! units for display and maps 403 markers onto `Restricted` / `LimitExceeded`.

use std::sync::Arc;

use arena_common::types::{
    round2, ActionKind, Language, Problem, SubmissionOutcome, Verdict,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::error::{LimitExceeded, ServiceError};
use crate::quota::QuotaGate;
use crate::services::wire::{SubmitRequest, SubmitResponse};
use crate::services::GradingService;

pub const RESTRICTED_DETAIL: &str = "This problem is available to Pro members only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    LimitExceeded(#[from] LimitExceeded),

    #[error("a submission is already in progress")]
    Busy,
}

/// Returns the controller to `Idle` however the submission ends,
/// including when the caller drops the future mid-flight
struct SubmittingGuard<'a> {
    state: &'a watch::Sender<SubmissionState>,
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(SubmissionState::Idle);
    }
}

pub struct SubmissionController {
    grading: Arc<dyn GradingService>,
    quota: Arc<QuotaGate>,
    user_id: Option<String>,
    state: watch::Sender<SubmissionState>,
}

impl SubmissionController {
    pub fn new(
        grading: Arc<dyn GradingService>,
        quota: Arc<QuotaGate>,
        user_id: Option<String>,
    ) -> Self {
        let (state, _rx) = watch::channel(SubmissionState::Idle);
        Self {
            grading,
            quota,
            user_id,
            state,
        }
    }

    pub fn state(&self) -> SubmissionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    #[instrument(skip(self, code, problem), fields(problem_id = %problem.id, language = %language))]
    pub async fn submit(
        &self,
        code: &str,
        language: Language,
        problem: &Problem,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let acquired = self.state.send_if_modified(|state| {
            if *state == SubmissionState::Idle {
                *state = SubmissionState::Submitting;
                true
            } else {
                false
            }
        });
        if !acquired {
            return Err(SubmitError::Busy);
        }
        let _guard = SubmittingGuard { state: &self.state };

        self.quota.admit(ActionKind::Submit)?;

        let request = SubmitRequest {
            code: code.to_string(),
            language,
            problem_id: problem.id.clone(),
            user_id: self.user_id.clone(),
        };

        let result = self.grading.submit(&request).await;
        self.quota.schedule_refresh();

        let outcome = match result {
            Ok(resp) => interpret(resp),
            Err(ServiceError::LimitExceeded { message }) => {
                info!("submission rejected by server limit check");
                return Err(LimitExceeded::from_server(ActionKind::Submit, message).into());
            }
            Err(ServiceError::Restricted { message }) => SubmissionOutcome::ungraded(
                Verdict::Restricted,
                message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| RESTRICTED_DETAIL.to_string()),
            ),
            Err(e) => {
                warn!(error = %e, "submission failed");
                SubmissionOutcome::ungraded(Verdict::Error, e.to_string())
            }
        };

        info!(
            verdict = %outcome.verdict,
            passed = outcome.passed_count,
            total = outcome.total_count,
            elapsed_ms = outcome.elapsed_ms,
            "Submission finished"
        );

        Ok(outcome)
    }
}

/// Convert the grader's response into display units
pub fn interpret(resp: SubmitResponse) -> SubmissionOutcome {
    let verdict = Verdict::from_label(&resp.verdict);
    let detail = resp.stderr.filter(|s| !s.trim().is_empty());

    SubmissionOutcome {
        verdict,
        elapsed_ms: round2(resp.time.unwrap_or(0.0) * 1000.0),
        memory_kb: resp.memory.unwrap_or(0.0),
        passed_count: resp.passed_test_cases,
        total_count: resp.total_test_cases,
        failed_case: if verdict == Verdict::Accepted {
            None
        } else {
            resp.failed_test_case
        },
        detail,
    }
}
