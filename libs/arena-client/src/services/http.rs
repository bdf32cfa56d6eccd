use std::time::Duration;

use arena_common::types::{Problem, UsageCredits};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::wire::{
    HelpRequest, HelpResponse, RejectionBody, RunRequest, RunResponse, SubmitRequest,
    SubmitResponse, TimeUpdate,
};
use super::{AccountsService, AiService, ExecutionService, GradingService, ProblemCatalog};
use crate::error::ServiceError;

/// HTTP client for the product backend.
///
/// One client serves every collaborator; the request timeout applies to each
/// call and its expiry surfaces as `ServiceError::Transport`.
#[derive(Clone, Debug)]
pub struct HttpServices {
    http: Client,
    base_url: Url,
}

impl HttpServices {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .map_err(|e| ServiceError::Validation(format!("invalid base url {}: {}", raw, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Validation(format!(
                "base url cannot carry a path: {}",
                raw
            )));
        }

        Ok(Self { http, base_url })
    }

    /// Base URL extended with percent-encoded path segments
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post_json<B, R>(&self, path: &[&str], body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        decode(resp).await
    }

    async fn get_json<R>(&self, path: &[&str]) -> Result<R, ServiceError>
    where
        R: DeserializeOwned,
    {
        let resp = self.http.get(self.url(path)).send().await?;
        decode(resp).await
    }
}

/// Map the response status and body onto the service error taxonomy
async fn decode<R: DeserializeOwned>(resp: Response) -> Result<R, ServiceError> {
    let status = resp.status();

    if status == StatusCode::FORBIDDEN {
        let text = resp.text().await.unwrap_or_default();
        let body: RejectionBody = serde_json::from_str(&text).unwrap_or_default();
        return Err(if body.limit_exceeded {
            ServiceError::LimitExceeded {
                message: body.message,
            }
        } else if body.restricted {
            ServiceError::Restricted {
                message: body.message,
            }
        } else {
            ServiceError::Forbidden {
                message: body.message,
            }
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "unexpected service status");
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Validation(e.to_string()))
}

#[async_trait]
impl ExecutionService for HttpServices {
    #[instrument(skip(self, request), fields(language = %request.language), level = "debug")]
    async fn run(&self, request: &RunRequest) -> Result<RunResponse, ServiceError> {
        self.post_json(&["execute", "run"], request).await
    }
}

#[async_trait]
impl GradingService for HttpServices {
    #[instrument(skip(self, request), fields(problem_id = %request.problem_id), level = "debug")]
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ServiceError> {
        self.post_json(&["execute", "submit"], request).await
    }
}

#[async_trait]
impl AiService for HttpServices {
    #[instrument(skip(self, request), level = "debug")]
    async fn problem_help(&self, request: &HelpRequest) -> Result<HelpResponse, ServiceError> {
        // Every 403 from this endpoint is a quota rejection
        match self.post_json(&["ai", "problem-help"], request).await {
            Err(ServiceError::Forbidden { message }) => {
                Err(ServiceError::LimitExceeded { message })
            }
            other => other,
        }
    }
}

#[async_trait]
impl AccountsService for HttpServices {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_credits(&self, uid: &str) -> Result<UsageCredits, ServiceError> {
        let credits: UsageCredits = self.get_json(&["users", uid, "credits"]).await?;
        debug!(
            run_credits = credits.run_credits,
            submission_credits = credits.submission_credits,
            ai_daily_usage = credits.ai_daily_usage,
            is_pro = credits.is_pro,
            "credits fetched"
        );
        Ok(credits)
    }

    #[instrument(skip(self), level = "debug")]
    async fn update_time(&self, uid: &str, minutes: u32) -> Result<(), ServiceError> {
        let resp = self
            .http
            .post(self.url(&["users", "update-time"]))
            .json(&TimeUpdate { uid, minutes })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProblemCatalog for HttpServices {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_problem(&self, slug: &str) -> Result<Problem, ServiceError> {
        self.get_json(&["problems", slug]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_common::types::Language;
    use axum::{
        extract::Path,
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use parking_lot::Mutex;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base: &str) -> HttpServices {
        HttpServices::new(base, Duration::from_secs(5)).unwrap()
    }

    fn run_request(stdin: &str) -> RunRequest {
        RunRequest {
            code: "print(input())".into(),
            language: Language::Python,
            stdin: stdin.into(),
            user_id: Some("u1".into()),
        }
    }

    #[tokio::test]
    async fn test_run_success_passes_body_through() {
        let app = Router::new().route(
            "/execute/run",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "stdout": body["stdin"],
                    "stderr": "",
                    "compile_output": null
                }))
            }),
        );
        let base = serve(app).await;

        let resp = client(&base).run(&run_request("42")).await.unwrap();
        assert_eq!(resp.stdout.as_deref(), Some("42"));
        assert_eq!(resp.stderr.as_deref(), Some(""));
        assert!(resp.compile_output.is_none());
    }

    #[tokio::test]
    async fn test_forbidden_with_limit_marker() {
        let app = Router::new().route(
            "/execute/run",
            post(|| async {
                (
                    AxumStatus::FORBIDDEN,
                    Json(json!({"limitExceeded": true, "message": "out of runs"})),
                )
                    .into_response()
            }),
        );
        let base = serve(app).await;

        let err = client(&base).run(&run_request("1")).await.unwrap_err();
        match err {
            ServiceError::LimitExceeded { message } => {
                assert_eq!(message.as_deref(), Some("out of runs"))
            }
            other => panic!("expected limit rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forbidden_with_restriction_marker() {
        let app = Router::new().route(
            "/execute/submit",
            post(|| async {
                (
                    AxumStatus::FORBIDDEN,
                    Json(json!({"restricted": true, "message": "Pro only"})),
                )
                    .into_response()
            }),
        );
        let base = serve(app).await;

        let request = SubmitRequest {
            code: String::new(),
            language: Language::Java,
            problem_id: "p1".into(),
            user_id: None,
        };
        let err = client(&base).submit(&request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Restricted { .. }));
    }

    #[tokio::test]
    async fn test_ai_forbidden_is_always_a_limit() {
        let app = Router::new().route(
            "/ai/problem-help",
            post(|| async { (AxumStatus::FORBIDDEN, Json(json!({}))).into_response() }),
        );
        let base = serve(app).await;

        let request = HelpRequest {
            problem_title: "Two Sum".into(),
            problem_description: String::new(),
            user_code: String::new(),
            language: Language::Python,
            user_question: "hint?".into(),
            user_id: Some("u1".into()),
        };
        let err = client(&base).problem_help(&request).await.unwrap_err();
        assert!(err.is_limit());
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_failure() {
        let app = Router::new().route("/problems/:slug", get(|| async { "not json" }));
        let base = serve(app).await;

        let err = client(&base).fetch_problem("two-sum").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let app = Router::new().route(
            "/users/:uid/credits",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        );
        let base = serve(app).await;

        let err = client(&base).fetch_credits("u1").await.unwrap_err();
        match err {
            ServiceError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_credits_and_time_update_paths() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let app = Router::new()
            .route(
                "/users/:uid/credits",
                get(|Path(uid): Path<String>| async move {
                    assert_eq!(uid, "u7");
                    Json(json!({"runCredits": 3, "submissionCredits": 1, "aiDailyUsage": 2, "isPro": false}))
                }),
            )
            .route(
                "/users/update-time",
                post(move |Json(body): Json<Value>| {
                    let recorder = recorder.clone();
                    async move {
                        recorder.lock().push(body);
                        AxumStatus::OK
                    }
                }),
            );
        let base = serve(app).await;
        let services = client(&base);

        let credits = services.fetch_credits("u7").await.unwrap();
        assert_eq!(credits.run_credits, 3);
        assert_eq!(credits.ai_daily_usage, 2);

        services.update_time("u7", 5).await.unwrap();
        let bodies = seen.lock().clone();
        assert_eq!(bodies, vec![json!({"uid": "u7", "minutes": 5})]);
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let app = Router::new().route(
            "/execute/run",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"stdout": "late"}))
            }),
        );
        let base = serve(app).await;
        let services = HttpServices::new(&base, Duration::from_millis(100)).unwrap();

        let err = services.run(&run_request("1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let services = client("http://localhost:5000/api/");
        assert_eq!(
            services.url(&["problems", "x"]).as_str(),
            "http://localhost:5000/api/problems/x"
        );

        let bare = client("http://localhost:5000");
        assert_eq!(bare.url(&["problems", "x"]).as_str(), "http://localhost:5000/problems/x");
    }

    #[test]
    fn test_path_segments_are_escaped() {
        let services = client("http://localhost:5000/api");
        assert_eq!(
            services.url(&["problems", "a/b?c#d"]).as_str(),
            "http://localhost:5000/api/problems/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = HttpServices::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_uid_with_reserved_characters_stays_one_segment() {
        let app = Router::new().route(
            "/users/:uid/credits",
            get(|Path(uid): Path<String>| async move {
                assert_eq!(uid, "team/u7?x");
                Json(json!({"runCredits": 1}))
            }),
        );
        let base = serve(app).await;

        let credits = client(&base).fetch_credits("team/u7?x").await.unwrap();
        assert_eq!(credits.run_credits, 1);
    }
}
