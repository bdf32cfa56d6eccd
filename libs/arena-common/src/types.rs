use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Languages the problem page can run and submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Java,
    Cpp,
    C,
    JavaScript,
    Rust,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::JavaScript,
        Language::Rust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
        }
    }

    /// Parse a language name, accepting a few common aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" | "python3" => Some(Language::Python),
            "java" => Some(Language::Java),
            "cpp" | "c++" => Some(Language::Cpp),
            "c" => Some(Language::C),
            "javascript" | "js" | "node" => Some(Language::JavaScript),
            "rust" | "rs" => Some(Language::Rust),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample test case shown on the problem page.
/// Its index in `Problem::examples` is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleTestCase {
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub examples: Vec<SampleTestCase>,
    /// Keyed by language wire name; unknown languages are kept but never looked up
    #[serde(default)]
    pub starter_code: HashMap<String, String>,
}

impl Problem {
    pub fn starter_code_for(&self, language: Language) -> Option<&str> {
        self.starter_code.get(language.as_str()).map(String::as_str)
    }
}

/// Client-side classification of a single sample run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Accepted,
    WrongAnswer,
    RuntimeError,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub input: String,
    pub expected: String,
    pub actual: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

/// Grading verdict. Set by the grading service, never derived locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    Restricted,
    Error,
}

impl Verdict {
    /// Map the grading service's verdict label.
    ///
    /// Labels arrive as "Accepted", "Wrong Answer", "TIME_LIMIT_EXCEEDED" and so on,
    /// so spacing, underscores and case are ignored. Unknown labels become `Error`.
    pub fn from_label(label: &str) -> Self {
        let key: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "accepted" | "ac" => Verdict::Accepted,
            "wronganswer" | "wa" => Verdict::WrongAnswer,
            "runtimeerror" | "re" | "compilationerror" | "compileerror" | "ce" => {
                Verdict::RuntimeError
            }
            "timelimitexceeded" | "tle" => Verdict::TimeLimitExceeded,
            "restricted" => Verdict::Restricted,
            _ => Verdict::Error,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::Restricted => "Restricted",
            Verdict::Error => "Error",
        };
        f.write_str(label)
    }
}

/// Hidden test case the submission failed on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedCase {
    #[serde(default)]
    pub input: String,
    #[serde(default, alias = "expected")]
    pub expected_output: String,
    #[serde(default, alias = "actual", alias = "output")]
    pub actual_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub verdict: Verdict,
    pub elapsed_ms: f64,
    pub memory_kb: f64,
    pub passed_count: u32,
    pub total_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_case: Option<FailedCase>,
    /// Human-readable detail for restricted or failed submissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SubmissionOutcome {
    /// An outcome carrying no grading data, e.g. a restricted problem
    pub fn ungraded(verdict: Verdict, detail: impl Into<String>) -> Self {
        Self {
            verdict,
            elapsed_ms: 0.0,
            memory_kb: 0.0,
            passed_count: 0,
            total_count: 0,
            failed_case: None,
            detail: Some(detail.into()),
        }
    }

    pub fn memory_mb(&self) -> f64 {
        round2(self.memory_kb / 1024.0)
    }

    /// Elapsed time as shown in the result panel, e.g. "23.00"
    pub fn elapsed_display(&self) -> String {
        format!("{:.2}", round2(self.elapsed_ms))
    }

    /// Memory in megabytes as shown in the result panel, e.g. "15.00"
    pub fn memory_display(&self) -> String {
        format!("{:.2}", self.memory_mb())
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Cached projection of the account's daily usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCredits {
    #[serde(default)]
    pub run_credits: u32,
    #[serde(default)]
    pub submission_credits: u32,
    #[serde(default)]
    pub ai_daily_usage: u32,
    #[serde(default)]
    pub is_pro: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Run,
    Submit,
    Ask,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Run => "run",
            ActionKind::Submit => "submit",
            ActionKind::Ask => "ask",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            is_error: true,
        }
    }
}
