//! Remote collaborators of the problem page.
//!
//! Each service is a trait so the orchestration components can be driven by
//! the HTTP implementation in production and by in-process fakes in tests.

pub mod http;
pub mod wire;

use std::sync::Arc;

use arena_common::types::{Problem, UsageCredits};
use async_trait::async_trait;

use crate::error::ServiceError;
use wire::{HelpRequest, HelpResponse, RunRequest, RunResponse, SubmitRequest, SubmitResponse};

pub use http::HttpServices;

/// Sandboxed execution of one program against one stdin
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn run(&self, request: &RunRequest) -> Result<RunResponse, ServiceError>;
}

/// Grading against the hidden test set
#[async_trait]
pub trait GradingService: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ServiceError>;
}

#[async_trait]
pub trait AiService: Send + Sync {
    async fn problem_help(&self, request: &HelpRequest) -> Result<HelpResponse, ServiceError>;
}

/// Account state: usage credits and engagement time
#[async_trait]
pub trait AccountsService: Send + Sync {
    async fn fetch_credits(&self, uid: &str) -> Result<UsageCredits, ServiceError>;

    async fn update_time(&self, uid: &str, minutes: u32) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    async fn fetch_problem(&self, slug: &str) -> Result<Problem, ServiceError>;
}

/// Every collaborator a workspace needs
#[derive(Clone)]
pub struct Services {
    pub execution: Arc<dyn ExecutionService>,
    pub grading: Arc<dyn GradingService>,
    pub ai: Arc<dyn AiService>,
    pub accounts: Arc<dyn AccountsService>,
    pub catalog: Arc<dyn ProblemCatalog>,
}

impl Services {
    /// All collaborators served by one HTTP backend
    pub fn from_http(http: HttpServices) -> Self {
        let http = Arc::new(http);
        Self {
            execution: http.clone(),
            grading: http.clone(),
            ai: http.clone(),
            accounts: http.clone(),
            catalog: http,
        }
    }
}
