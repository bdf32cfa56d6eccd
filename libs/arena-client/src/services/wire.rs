// Request/response bodies exchanged with the remote services

use arena_common::types::{FailedCase, Language};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub code: String,
    pub language: Language,
    pub stdin: String,
    pub user_id: Option<String>,
}

/// Raw sandbox output. Classification happens client-side.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default, alias = "compileOutput")]
    pub compile_output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub code: String,
    pub language: Language,
    pub problem_id: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub verdict: String,
    #[serde(default)]
    pub stderr: Option<String>,
    /// Seconds. The grader sends either a JSON number or a numeric string.
    #[serde(default, deserialize_with = "flexible_number")]
    pub time: Option<f64>,
    /// Kilobytes, same encoding as `time`
    #[serde(default, deserialize_with = "flexible_number")]
    pub memory: Option<f64>,
    #[serde(default)]
    pub passed_test_cases: u32,
    #[serde(default)]
    pub total_test_cases: u32,
    #[serde(default)]
    pub failed_test_case: Option<FailedCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequest {
    pub problem_title: String,
    pub problem_description: String,
    pub user_code: String,
    pub language: Language,
    pub user_question: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HelpResponse {
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeUpdate<'a> {
    pub uid: &'a str,
    pub minutes: u32,
}

/// Body of a 403 response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody {
    #[serde(default, alias = "limitReached", alias = "limit_exceeded")]
    pub limit_exceeded: bool,
    #[serde(default, alias = "isRestricted", alias = "proOnly")]
    pub restricted: bool,
    #[serde(default, alias = "error", alias = "detail")]
    pub message: Option<String>,
}

fn flexible_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("not a number: {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("not a number: {other}"))),
    }
}
