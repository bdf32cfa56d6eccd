//! Problem workspace: everything the problem page owns for one open problem.
//!
//! Holds the loaded problem, the active language and the editor content, and
//! routes Run / Submit / Ask through the quota gate and the orchestration
//! components. The language preference is passed in at construction and only
//! written back when the user switches language.

use std::sync::Arc;

use arena_common::config::ClientConfig;
use arena_common::types::{
    ChatMessage, ExecutionOutcome, Language, Problem, SubmissionOutcome, UsageCredits,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::assistant::{AskContext, AskError, AssistantSession};
use crate::code_store::{resolve_code, CodeStore};
use crate::error::{LimitExceeded, ServiceError, StoreError};
use crate::generation::Generation;
use crate::quota::{CreditsSnapshot, QuotaGate};
use crate::runner::ExecutionOrchestrator;
use crate::services::{ProblemCatalog, Services};
use crate::submission::{SubmissionController, SubmissionState, SubmitError};
use crate::telemetry::{TelemetryBatcher, TelemetrySettings};

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("no problem is open")]
    NoProblem,

    #[error("failed to load problem: {0}")]
    Catalog(#[source] ServiceError),

    #[error("failed to save code: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    LimitExceeded(#[from] LimitExceeded),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Ask(#[from] AskError),
}

/// Outcome of a Run as the page should apply it
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Completed(Vec<ExecutionOutcome>),
    /// A newer Run started, or another problem was opened, while this one was
    /// in flight; its results were dropped
    Superseded,
}

struct Editor {
    problem: Option<Arc<Problem>>,
    language: Language,
    code: String,
}

pub struct ProblemWorkspace {
    catalog: Arc<dyn ProblemCatalog>,
    store: Arc<dyn CodeStore>,
    quota: Arc<QuotaGate>,
    runner: ExecutionOrchestrator,
    submissions: SubmissionController,
    assistant: AssistantSession,
    runs: Generation,
    editor: Mutex<Editor>,
}

impl ProblemWorkspace {
    /// `preferred_language` is the stored preference, read once by the caller
    pub fn new(
        services: &Services,
        store: Arc<dyn CodeStore>,
        config: &ClientConfig,
        preferred_language: Language,
        initial_credits: UsageCredits,
    ) -> Self {
        let quota = Arc::new(QuotaGate::new(
            services.accounts.clone(),
            config.user_id.clone(),
            config.ai_daily_limit,
            initial_credits,
        ));

        Self {
            catalog: services.catalog.clone(),
            store,
            runner: ExecutionOrchestrator::new(
                services.execution.clone(),
                quota.clone(),
                config.max_parallel_runs,
                config.user_id.clone(),
            ),
            submissions: SubmissionController::new(
                services.grading.clone(),
                quota.clone(),
                config.user_id.clone(),
            ),
            assistant: AssistantSession::new(
                services.ai.clone(),
                quota.clone(),
                config.user_id.clone(),
            ),
            quota,
            runs: Generation::new(),
            editor: Mutex::new(Editor {
                problem: None,
                language: preferred_language,
                code: String::new(),
            }),
        }
    }

    /// Start engagement telemetry for this workspace's lifetime
    pub fn start_telemetry(
        services: &Services,
        config: &ClientConfig,
        visibility: watch::Receiver<bool>,
    ) -> TelemetryBatcher {
        TelemetryBatcher::spawn(
            services.accounts.clone(),
            config.user_id.clone(),
            visibility,
            TelemetrySettings {
                tick: config.telemetry_tick(),
                flush_threshold: config.telemetry_flush_threshold,
                restore_on_failure: config.telemetry_restore_on_failure,
            },
        )
    }

    pub fn problem(&self) -> Option<Arc<Problem>> {
        self.editor.lock().problem.clone()
    }

    pub fn language(&self) -> Language {
        self.editor.lock().language
    }

    pub fn code(&self) -> String {
        self.editor.lock().code.clone()
    }

    pub fn quota(&self) -> &QuotaGate {
        &self.quota
    }

    pub fn credits(&self) -> watch::Receiver<CreditsSnapshot> {
        self.quota.subscribe()
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.submissions.state()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.assistant.transcript()
    }

    pub fn assistant(&self) -> &AssistantSession {
        &self.assistant
    }

    /// Load a problem. Opening the slug that is already open is a no-op.
    #[instrument(skip(self))]
    pub async fn open(&self, slug: &str) -> Result<Arc<Problem>, WorkspaceError> {
        let (current, language) = {
            let editor = self.editor.lock();
            (editor.problem.clone(), editor.language)
        };
        if let Some(problem) = current.filter(|p| p.slug == slug) {
            debug!("problem already loaded");
            return Ok(problem);
        }

        // Runs still in flight belong to the previous problem
        self.runs.issue();

        let problem = Arc::new(
            self.catalog
                .fetch_problem(slug)
                .await
                .map_err(WorkspaceError::Catalog)?,
        );
        let code = resolve_code(&*self.store, &problem, language).await;

        info!(
            title = %problem.title,
            samples = problem.examples.len(),
            language = %language,
            "Problem opened"
        );

        {
            let mut editor = self.editor.lock();
            editor.problem = Some(problem.clone());
            editor.code = code;
        }
        self.assistant.reset();

        Ok(problem)
    }

    /// Switch the editor language, loading that language's code.
    /// Other languages' cached code is left untouched.
    #[instrument(skip(self))]
    pub async fn switch_language(&self, language: Language) -> Result<String, WorkspaceError> {
        let problem = self.problem().ok_or(WorkspaceError::NoProblem)?;
        let code = resolve_code(&*self.store, &problem, language).await;

        {
            let mut editor = self.editor.lock();
            editor.language = language;
            editor.code = code.clone();
        }

        if let Err(e) = self.store.set_default_language(language).await {
            warn!(error = %e, "failed to persist language preference");
        }

        Ok(code)
    }

    /// Replace the editor content and write it through to the store
    pub async fn edit(&self, code: impl Into<String>) -> Result<(), WorkspaceError> {
        let code = code.into();
        let (slug, language) = {
            let mut editor = self.editor.lock();
            let slug = editor
                .problem
                .as_ref()
                .map(|p| p.slug.clone())
                .ok_or(WorkspaceError::NoProblem)?;
            editor.code = code.clone();
            (slug, editor.language)
        };

        self.store.put(&slug, language, &code).await?;
        Ok(())
    }

    fn snapshot(&self) -> Result<(Arc<Problem>, Language, String), WorkspaceError> {
        let editor = self.editor.lock();
        let problem = editor.problem.clone().ok_or(WorkspaceError::NoProblem)?;
        Ok((problem, editor.language, editor.code.clone()))
    }

    /// Run the samples. Results of a Run overtaken by a newer Run, or by
    /// opening another problem, are dropped.
    pub async fn run(&self) -> Result<RunReport, WorkspaceError> {
        let (problem, language, code) = self.snapshot()?;
        let ticket = self.runs.issue();

        let result = self.runner.run(&code, language, &problem).await;

        if !self.runs.is_current(ticket) {
            debug!(ticket = ticket.value(), "discarding superseded run");
            return Ok(RunReport::Superseded);
        }

        Ok(RunReport::Completed(result?))
    }

    pub async fn submit(&self) -> Result<SubmissionOutcome, WorkspaceError> {
        let (problem, language, code) = self.snapshot()?;
        Ok(self.submissions.submit(&code, language, &problem).await?)
    }

    pub async fn ask(&self, question: &str) -> Result<(), WorkspaceError> {
        let (problem, language, code) = self.snapshot()?;
        let context = AskContext {
            problem_title: problem.title.clone(),
            problem_description: problem.description.clone(),
            current_code: code,
            language,
        };
        Ok(self.assistant.ask(question, &context).await?)
    }
}
