// Client configuration for the problem-page orchestrator
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL shared by the execution, grading, AI, accounts and catalog services
    pub api_base_url: String,

    /// Authenticated account id. `None` means anonymous: no telemetry is recorded.
    pub user_id: Option<String>,

    pub redis_url: String,

    /// Client-side timeout applied to every HTTP request
    pub request_timeout_ms: u64,

    /// Upper bound on concurrent sample-test executions per Run
    pub max_parallel_runs: usize,

    /// Length of one telemetry unit
    pub telemetry_tick_secs: u64,

    /// Buffered units that trigger a flush
    pub telemetry_flush_threshold: u32,

    /// Put units back into the buffer when a flush is confirmed failed
    pub telemetry_restore_on_failure: bool,

    /// Daily AI questions allowed for non-Pro accounts
    pub ai_daily_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000/api".to_string(),
            user_id: None,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            request_timeout_ms: 15_000,
            max_parallel_runs: 8,
            telemetry_tick_secs: 60,
            telemetry_flush_threshold: 5,
            telemetry_restore_on_failure: false,
            ai_daily_limit: 3,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `ARENA_*` / `REDIS_URL` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a JSON file, then apply environment overrides
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Client config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let mut config: ClientConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load config/client.json when present, environment only otherwise
    pub fn load_default() -> Result<Self> {
        let default_path = Path::new("config/client.json");
        if default_path.exists() {
            Self::load(default_path)
        } else {
            let config = Self::from_env()?;
            config.validate()?;
            Ok(config)
        }
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ARENA_API_URL") {
            self.api_base_url = url;
        }
        if let Some(uid) = lookup("ARENA_USER_ID") {
            self.user_id = Some(uid).filter(|u| !u.trim().is_empty());
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.redis_url = url;
        }
        if let Some(v) = lookup("ARENA_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = v.parse().context("ARENA_REQUEST_TIMEOUT_MS")?;
        }
        if let Some(v) = lookup("ARENA_MAX_PARALLEL_RUNS") {
            self.max_parallel_runs = v.parse().context("ARENA_MAX_PARALLEL_RUNS")?;
        }
        if let Some(v) = lookup("ARENA_TELEMETRY_TICK_SECS") {
            self.telemetry_tick_secs = v.parse().context("ARENA_TELEMETRY_TICK_SECS")?;
        }
        if let Some(v) = lookup("ARENA_TELEMETRY_THRESHOLD") {
            self.telemetry_flush_threshold = v.parse().context("ARENA_TELEMETRY_THRESHOLD")?;
        }
        if let Some(v) = lookup("ARENA_TELEMETRY_RESTORE") {
            self.telemetry_restore_on_failure = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = lookup("ARENA_AI_DAILY_LIMIT") {
            self.ai_daily_limit = v.parse().context("ARENA_AI_DAILY_LIMIT")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            bail!("api_base_url cannot be empty");
        }
        if self.max_parallel_runs == 0 {
            bail!("max_parallel_runs must be at least 1");
        }
        if self.telemetry_tick_secs == 0 {
            bail!("telemetry_tick_secs must be at least 1");
        }
        if self.telemetry_flush_threshold == 0 {
            bail!("telemetry_flush_threshold must be at least 1");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn telemetry_tick(&self) -> Duration {
        Duration::from_secs(self.telemetry_tick_secs)
    }
}
