//! Execution Orchestrator - Sample Runs
//!
//! **Responsibility:**
//! Run the editor code against every sample test case of a problem and return
//! one classified outcome per sample, index-aligned with `Problem::examples`.
//!
//! **Fan-out:**
//! Each sample is a separate execution request on its own task. At most
//! `max_parallel` requests are in flight; the rest wait for a permit.
//!
//! **Failure policy:**
//! - transport failure, timeout or malformed response → that sample is `Error`
//! - any limit rejection → the whole run is `LimitExceeded`; requests already
//!   issued are left to finish on their own, queued ones are never sent

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arena_common::types::{ActionKind, ExecutionOutcome, Language, Problem};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{LimitExceeded, ServiceError};
use crate::evaluator::{self, RunSummary};
use crate::quota::QuotaGate;
use crate::services::wire::{RunRequest, RunResponse};
use crate::services::ExecutionService;

/// Result of one sample request as seen by the aggregator
enum SampleReply {
    Response(RunResponse),
    Failed(ServiceError),
    /// Run was aborted before this sample got a permit
    Skipped,
}

pub struct ExecutionOrchestrator {
    execution: Arc<dyn ExecutionService>,
    quota: Arc<QuotaGate>,
    permits: Arc<Semaphore>,
    user_id: Option<String>,
}

impl ExecutionOrchestrator {
    pub fn new(
        execution: Arc<dyn ExecutionService>,
        quota: Arc<QuotaGate>,
        max_parallel: usize,
        user_id: Option<String>,
    ) -> Self {
        Self {
            execution,
            quota,
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
            user_id,
        }
    }

    #[instrument(skip(self, code, problem), fields(slug = %problem.slug, language = %language))]
    pub async fn run(
        &self,
        code: &str,
        language: Language,
        problem: &Problem,
    ) -> Result<Vec<ExecutionOutcome>, LimitExceeded> {
        if problem.examples.is_empty() {
            debug!("problem has no samples; nothing to run");
            return Ok(Vec::new());
        }

        self.quota.admit(ActionKind::Run)?;

        let run_id = Uuid::new_v4();
        let aborted = Arc::new(AtomicBool::new(false));

        info!(
            run_id = %run_id,
            samples = problem.examples.len(),
            source_size = code.len(),
            "Starting sample run"
        );

        let mut pending: FuturesUnordered<_> = problem
            .examples
            .iter()
            .enumerate()
            .map(|(idx, example)| {
                let request = RunRequest {
                    code: code.to_string(),
                    language,
                    stdin: example.input.clone(),
                    user_id: self.user_id.clone(),
                };
                let execution = self.execution.clone();
                let permits = self.permits.clone();
                let aborted = aborted.clone();

                let handle = tokio::spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return SampleReply::Skipped;
                    };
                    if aborted.load(Ordering::SeqCst) {
                        return SampleReply::Skipped;
                    }
                    match execution.run(&request).await {
                        Ok(resp) => SampleReply::Response(resp),
                        Err(e) => SampleReply::Failed(e),
                    }
                });

                async move { (idx, handle.await) }
            })
            .collect();

        let mut slots: Vec<Option<ExecutionOutcome>> = vec![None; problem.examples.len()];

        while let Some((idx, joined)) = pending.next().await {
            let case = &problem.examples[idx];
            let outcome = match joined {
                Ok(SampleReply::Response(resp)) => evaluator::classify(case, &resp),
                Ok(SampleReply::Failed(ServiceError::LimitExceeded { message })) => {
                    aborted.store(true, Ordering::SeqCst);
                    warn!(run_id = %run_id, sample = idx, "run rejected by server limit check");
                    self.quota.schedule_refresh();
                    // Remaining handles are dropped here, which detaches them
                    return Err(LimitExceeded::from_server(ActionKind::Run, message));
                }
                Ok(SampleReply::Failed(e)) => {
                    warn!(run_id = %run_id, sample = idx, error = %e, "sample execution failed");
                    evaluator::failed_execution(case, &e)
                }
                Ok(SampleReply::Skipped) => continue,
                Err(join_err) => {
                    warn!(run_id = %run_id, sample = idx, error = %join_err, "sample task failed");
                    evaluator::failed_execution(
                        case,
                        &ServiceError::Validation(format!("execution task failed: {}", join_err)),
                    )
                }
            };

            debug!(run_id = %run_id, sample = idx, status = ?outcome.status, "sample classified");
            slots[idx] = Some(outcome);
        }

        self.quota.schedule_refresh();

        let outcomes: Vec<ExecutionOutcome> = slots
            .into_iter()
            .zip(&problem.examples)
            .map(|(slot, case)| {
                slot.unwrap_or_else(|| {
                    evaluator::failed_execution(
                        case,
                        &ServiceError::Validation("sample was never executed".into()),
                    )
                })
            })
            .collect();

        let summary = RunSummary::of(&outcomes);
        info!(
            run_id = %run_id,
            passed = summary.passed,
            total = summary.total,
            "Sample run completed"
        );

        Ok(outcomes)
    }
}
