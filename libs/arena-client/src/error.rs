use arena_common::types::ActionKind;
use thiserror::Error;

/// Failure talking to one of the remote services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 403 carrying the limit marker: the server's own quota check failed
    #[error("usage limit exceeded")]
    LimitExceeded { message: Option<String> },

    /// 403 carrying the restriction marker: feature gated behind a plan tier
    #[error("restricted")]
    Restricted { message: Option<String> },

    /// 403 without any marker
    #[error("forbidden")]
    Forbidden { message: Option<String> },

    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Validation(String),
}

impl ServiceError {
    pub fn is_limit(&self) -> bool {
        matches!(self, ServiceError::LimitExceeded { .. })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Quota exhausted, detected either locally or by the server.
/// Both paths produce the same value so callers present one modal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} limit exceeded: {message}")]
pub struct LimitExceeded {
    pub kind: ActionKind,
    pub message: String,
}

impl LimitExceeded {
    pub fn local(kind: ActionKind) -> Self {
        Self {
            kind,
            message: default_limit_message(kind).to_string(),
        }
    }

    /// Server message when it sent a usable one, the default text otherwise
    pub fn from_server(kind: ActionKind, message: Option<String>) -> Self {
        match message.filter(|m| !m.trim().is_empty()) {
            Some(message) => Self { kind, message },
            None => Self::local(kind),
        }
    }
}

pub fn default_limit_message(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Run => "Daily run limit reached. Upgrade to Pro for unlimited runs.",
        ActionKind::Submit => {
            "Daily submission limit reached. Upgrade to Pro for unlimited submissions."
        }
        ActionKind::Ask => {
            "Daily AI assistance limit reached. Upgrade to Pro for unlimited help."
        }
    }
}
