//! AI assistance chat for the open problem.
//!
//! The user's question is appended to the transcript before the AI call
//! resolves. A limit rejection removes it again; any other failure keeps it
//! and appends an error bubble. Only one question may be pending. Replies
//! arriving after the conversation was reset are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arena_common::types::{ActionKind, ChatMessage, Language};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::{LimitExceeded, ServiceError};
use crate::generation::Generation;
use crate::quota::QuotaGate;
use crate::services::wire::HelpRequest;
use crate::services::AiService;

pub const GENERIC_FAILURE: &str = "Sorry, something went wrong. Please try again.";

/// What the assistant sees about the problem and the editor
#[derive(Debug, Clone, PartialEq)]
pub struct AskContext {
    pub problem_title: String,
    pub problem_description: String,
    pub current_code: String,
    pub language: Language,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    #[error(transparent)]
    LimitExceeded(#[from] LimitExceeded),

    #[error("a question is already pending")]
    Busy,

    #[error("question is empty")]
    EmptyQuestion,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AssistantSession {
    ai: Arc<dyn AiService>,
    quota: Arc<QuotaGate>,
    user_id: Option<String>,
    transcript: Mutex<Vec<ChatMessage>>,
    draft: Mutex<String>,
    in_flight: AtomicBool,
    conversation: Generation,
}

impl AssistantSession {
    pub fn new(ai: Arc<dyn AiService>, quota: Arc<QuotaGate>, user_id: Option<String>) -> Self {
        Self {
            ai,
            quota,
            user_id,
            transcript: Mutex::new(Vec::new()),
            draft: Mutex::new(String::new()),
            in_flight: AtomicBool::new(false),
            conversation: Generation::new(),
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    pub fn draft(&self) -> String {
        self.draft.lock().clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        *self.draft.lock() = text.into();
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Drop the conversation, e.g. when another problem is opened
    pub fn reset(&self) {
        self.conversation.issue();
        self.transcript.lock().clear();
        self.draft.lock().clear();
    }

    /// Ask whatever is in the input box
    pub async fn submit_draft(&self, context: &AskContext) -> Result<(), AskError> {
        let question = self.draft();
        self.ask(&question, context).await
    }

    #[instrument(skip(self, question, context), fields(language = %context.language))]
    pub async fn ask(&self, question: &str, context: &AskContext) -> Result<(), AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AskError::Busy);
        }
        let _in_flight = InFlight(&self.in_flight);

        self.quota.admit(ActionKind::Ask)?;

        let conversation = self.conversation.current();
        let optimistic = ChatMessage::user(question);
        let position = {
            let mut transcript = self.transcript.lock();
            transcript.push(optimistic.clone());
            transcript.len() - 1
        };
        {
            let mut draft = self.draft.lock();
            if draft.trim() == question {
                draft.clear();
            }
        }

        let request = HelpRequest {
            problem_title: context.problem_title.clone(),
            problem_description: context.problem_description.clone(),
            user_code: context.current_code.clone(),
            language: context.language,
            user_question: question.to_string(),
            user_id: self.user_id.clone(),
        };

        let result = self.ai.problem_help(&request).await;
        self.quota.schedule_refresh();

        if !self.conversation.is_current(conversation) {
            debug!("conversation reset while the question was pending; reply dropped");
            return match result {
                Err(ServiceError::LimitExceeded { message }) => {
                    Err(LimitExceeded::from_server(ActionKind::Ask, message).into())
                }
                _ => Ok(()),
            };
        }

        match result {
            Ok(resp) => {
                debug!(answer_len = resp.answer.len(), "assistant answered");
                self.transcript.lock().push(ChatMessage::assistant(resp.answer));
                Ok(())
            }
            Err(ServiceError::LimitExceeded { message }) => {
                info!("question rejected by server limit check; rolling back");
                self.roll_back(position, &optimistic);
                Err(LimitExceeded::from_server(ActionKind::Ask, message).into())
            }
            Err(e) => {
                warn!(error = %e, "assistant request failed");
                self.transcript
                    .lock()
                    .push(ChatMessage::assistant_error(GENERIC_FAILURE));
                Ok(())
            }
        }
    }

    fn roll_back(&self, position: usize, optimistic: &ChatMessage) {
        let mut transcript = self.transcript.lock();
        if transcript.get(position) == Some(optimistic) {
            transcript.remove(position);
        }
    }
}
