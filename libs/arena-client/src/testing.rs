// In-process fakes of the remote services, shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use arena_common::types::{Problem, SampleTestCase, UsageCredits};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ServiceError;
use crate::services::wire::{
    HelpRequest, HelpResponse, RunRequest, RunResponse, SubmitRequest, SubmitResponse,
};
use crate::services::{AccountsService, AiService, ExecutionService, GradingService, ProblemCatalog};

pub fn credits(run: u32, submit: u32, ai: u32, pro: bool) -> UsageCredits {
    UsageCredits {
        run_credits: run,
        submission_credits: submit,
        ai_daily_usage: ai,
        is_pro: pro,
    }
}

pub fn problem(slug: &str, cases: &[(&str, &str)]) -> Problem {
    Problem {
        id: format!("id-{}", slug),
        slug: slug.to_string(),
        title: format!("Problem {}", slug),
        difficulty: "Medium".into(),
        tags: vec!["arrays".into()],
        description: "Read input, print output.".into(),
        constraints: vec![],
        examples: cases
            .iter()
            .map(|(input, output)| SampleTestCase {
                input: input.to_string(),
                output: output.to_string(),
                explanation: None,
            })
            .collect(),
        starter_code: HashMap::from([
            ("python".to_string(), "# write your solution".to_string()),
            ("java".to_string(), "class Main {}".to_string()),
        ]),
    }
}

pub fn stdout(out: &str) -> RunResponse {
    RunResponse {
        stdout: Some(out.to_string()),
        stderr: Some(String::new()),
        compile_output: None,
    }
}

type Responder = Box<dyn Fn(&RunRequest) -> Result<RunResponse, ServiceError> + Send + Sync>;

/// Execution service answering through a closure, with optional per-stdin latency
pub struct FakeExecution {
    responder: Responder,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeExecution {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&RunRequest) -> Result<RunResponse, ServiceError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Echo stdin back as stdout
    pub fn echo() -> Self {
        Self::new(|req| Ok(stdout(&req.stdin)))
    }

    pub fn with_delay(mut self, stdin: &str, delay: Duration) -> Self {
        self.delays.insert(stdin.to_string(), delay);
        self
    }

    pub fn with_uniform_delay(mut self, stdins: &[&str], delay: Duration) -> Self {
        for stdin in stdins {
            self.delays.insert(stdin.to_string(), delay);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionService for FakeExecution {
    async fn run(&self, request: &RunRequest) -> Result<RunResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&request.stdin) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(request)
    }
}

/// Grading service replaying queued responses in order
#[derive(Default)]
pub struct FakeGrading {
    responses: Mutex<VecDeque<Result<SubmitResponse, ServiceError>>>,
    requests: Mutex<Vec<SubmitRequest>>,
    delay: Option<Duration>,
}

impl FakeGrading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: Result<SubmitResponse, ServiceError>) {
        self.responses.lock().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<SubmitRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GradingService for FakeGrading {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ServiceError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Validation("no scripted response".into())))
    }
}

/// AI service replaying queued answers in order
#[derive(Default)]
pub struct FakeAi {
    responses: Mutex<VecDeque<Result<HelpResponse, ServiceError>>>,
    requests: Mutex<Vec<HelpRequest>>,
    delay: Option<Duration>,
}

impl FakeAi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn answer(&self, text: &str) {
        self.responses.lock().push_back(Ok(HelpResponse {
            answer: text.to_string(),
        }));
    }

    pub fn fail(&self, error: ServiceError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<HelpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AiService for FakeAi {
    async fn problem_help(&self, request: &HelpRequest) -> Result<HelpResponse, ServiceError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Validation("no scripted answer".into())))
    }
}

pub struct FakeAccounts {
    credits: Mutex<UsageCredits>,
    credit_fetches: AtomicUsize,
    fail_fetches: AtomicBool,
    time_updates: Mutex<Vec<(String, u32)>>,
    fail_updates: AtomicBool,
}

impl FakeAccounts {
    pub fn new(credits: UsageCredits) -> Self {
        Self {
            credits: Mutex::new(credits),
            credit_fetches: AtomicUsize::new(0),
            fail_fetches: AtomicBool::new(false),
            time_updates: Mutex::new(Vec::new()),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn set_credits(&self, credits: UsageCredits) {
        *self.credits.lock() = credits;
    }

    pub fn fail_credit_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_time_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn credit_fetches(&self) -> usize {
        self.credit_fetches.load(Ordering::SeqCst)
    }

    /// Every update attempt, including failed ones
    pub fn time_updates(&self) -> Vec<(String, u32)> {
        self.time_updates.lock().clone()
    }
}

#[async_trait]
impl AccountsService for FakeAccounts {
    async fn fetch_credits(&self, _uid: &str) -> Result<UsageCredits, ServiceError> {
        self.credit_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                status: 503,
                body: "accounts unavailable".into(),
            });
        }
        Ok(self.credits.lock().clone())
    }

    async fn update_time(&self, uid: &str, minutes: u32) -> Result<(), ServiceError> {
        self.time_updates.lock().push((uid.to_string(), minutes));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    problems: Mutex<HashMap<String, Problem>>,
    fetches: AtomicUsize,
}

impl FakeCatalog {
    pub fn with(problems: Vec<Problem>) -> Self {
        Self {
            problems: Mutex::new(problems.into_iter().map(|p| (p.slug.clone(), p)).collect()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProblemCatalog for FakeCatalog {
    async fn fetch_problem(&self, slug: &str) -> Result<Problem, ServiceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.problems
            .lock()
            .get(slug)
            .cloned()
            .ok_or_else(|| ServiceError::Status {
                status: 404,
                body: format!("no problem {}", slug),
            })
    }
}
