// Command handlers: wire a workspace to the HTTP backend and print results
use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use arena_client::code_store::FALLBACK_LANGUAGE;
use arena_client::evaluator::RunSummary;
use arena_client::{
    CodeStore, HttpServices, MemoryCodeStore, ProblemWorkspace, RedisCodeStore, RunReport,
    Services,
};
use arena_common::config::ClientConfig;
use arena_common::types::{ExecutionOutcome, Language, UsageCredits};
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};

use crate::Target;

#[derive(Serialize)]
struct RunOutput<'a> {
    passed: usize,
    total: usize,
    outcomes: &'a [ExecutionOutcome],
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn services(config: &ClientConfig) -> Result<Services> {
    let http = HttpServices::new(&config.api_base_url, config.request_timeout())
        .context("Failed to build HTTP client")?;
    Ok(Services::from_http(http))
}

/// Redis when reachable; otherwise an in-memory store for this process only
async fn code_store(config: &ClientConfig) -> Arc<dyn CodeStore> {
    match RedisCodeStore::connect(&config.redis_url).await {
        Ok(store) => {
            info!(redis = %config.redis_url, "Connected to code cache");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "code cache unavailable; edits will not persist");
            Arc::new(MemoryCodeStore::new())
        }
    }
}

async fn initial_credits(services: &Services, config: &ClientConfig) -> UsageCredits {
    let Some(uid) = config.user_id.as_deref() else {
        warn!("no ARENA_USER_ID set; every action will be rejected");
        return UsageCredits::default();
    };
    match services.accounts.fetch_credits(uid).await {
        Ok(credits) => credits,
        Err(e) => {
            warn!(error = %e, "failed to fetch credits; starting from an empty snapshot");
            UsageCredits::default()
        }
    }
}

fn parse_language(name: &str) -> Result<Language> {
    Language::parse(name).ok_or_else(|| {
        let valid: Vec<&str> = Language::ALL.iter().map(|l| l.as_str()).collect();
        anyhow!("Invalid language: {} (valid options: {})", name, valid.join(", "))
    })
}

/// Open the target problem with the requested language and editor content
async fn open_workspace(config: &ClientConfig, target: &Target) -> Result<ProblemWorkspace> {
    let services = services(config)?;
    let store = code_store(config).await;

    let preferred = match store.default_language().await {
        Ok(language) => language,
        Err(e) => {
            warn!(error = %e, "failed to read language preference");
            FALLBACK_LANGUAGE
        }
    };
    let credits = initial_credits(&services, config).await;

    let workspace = ProblemWorkspace::new(&services, store, config, preferred, credits);
    let problem = workspace
        .open(&target.slug)
        .await
        .with_context(|| format!("Failed to open problem '{}'", target.slug))?;
    info!(title = %problem.title, "Opened problem");

    if let Some(name) = &target.language {
        let language = parse_language(name)?;
        if language != workspace.language() {
            workspace.switch_language(language).await?;
        }
    }

    if let Some(path) = &target.file {
        let code = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        workspace.edit(code).await?;
    }

    Ok(workspace)
}

pub async fn run(config: &ClientConfig, target: &Target, json: bool) -> Result<()> {
    let workspace = open_workspace(config, target).await?;

    let outcomes = match workspace.run().await? {
        RunReport::Completed(outcomes) => outcomes,
        RunReport::Superseded => bail!("Run was superseded by a newer run"),
    };
    let summary = RunSummary::of(&outcomes);

    if json {
        return print_json(&RunOutput {
            passed: summary.passed,
            total: summary.total,
            outcomes: &outcomes,
        });
    }

    if outcomes.is_empty() {
        println!("Problem has no sample test cases");
        return Ok(());
    }

    for (idx, outcome) in outcomes.iter().enumerate() {
        println!("Case {}: {:?}", idx + 1, outcome.status);
        println!("  input:    {}", outcome.input.trim_end());
        println!("  expected: {}", outcome.expected.trim_end());
        println!("  actual:   {}", outcome.actual.trim_end());
        if let Some(error) = &outcome.error_text {
            println!("  error:    {}", error.trim_end());
        }
    }
    println!("{}/{} sample cases passed", summary.passed, summary.total);
    Ok(())
}

pub async fn submit(config: &ClientConfig, target: &Target, json: bool) -> Result<()> {
    let workspace = open_workspace(config, target).await?;
    let outcome = workspace.submit().await?;

    if json {
        return print_json(&outcome);
    }

    println!("Verdict: {}", outcome.verdict);
    println!(
        "Passed {}/{} | {} ms | {} MB",
        outcome.passed_count,
        outcome.total_count,
        outcome.elapsed_display(),
        outcome.memory_display()
    );
    if let Some(case) = &outcome.failed_case {
        println!("Failed on input: {}", case.input.trim_end());
        println!("  expected: {}", case.expected_output.trim_end());
        println!("  actual:   {}", case.actual_output.trim_end());
    }
    if let Some(detail) = &outcome.detail {
        println!("{}", detail);
    }
    Ok(())
}

pub async fn ask(config: &ClientConfig, target: &Target, question: &str, json: bool) -> Result<()> {
    let workspace = open_workspace(config, target).await?;
    workspace.ask(question).await?;

    let transcript = workspace.transcript();
    let reply = transcript
        .last()
        .context("Assistant returned no reply")?;

    if json {
        return print_json(reply);
    }
    println!("{}", reply.content);
    Ok(())
}

pub async fn credits(config: &ClientConfig, json: bool) -> Result<()> {
    let uid = config
        .user_id
        .as_deref()
        .context("ARENA_USER_ID is required to look up credits")?;
    let services = services(config)?;
    let credits = services
        .accounts
        .fetch_credits(uid)
        .await
        .context("Failed to fetch credits")?;

    if json {
        return print_json(&credits);
    }

    if credits.is_pro {
        println!("Pro member: no daily limits");
    } else {
        println!("Run credits:        {}", credits.run_credits);
        println!("Submission credits: {}", credits.submission_credits);
        println!(
            "AI questions today: {}/{}",
            credits.ai_daily_usage, config.ai_daily_limit
        );
    }
    Ok(())
}

pub async fn watch(config: &ClientConfig) -> Result<()> {
    let services = services(config)?;
    let (_visible, visibility) = tokio::sync::watch::channel(true);

    let batcher = ProblemWorkspace::start_telemetry(&services, config, visibility);
    info!(
        tick_secs = config.telemetry_tick_secs,
        "Recording engagement time, press Ctrl-C to stop"
    );

    signal::ctrl_c()
        .await
        .context("Failed to install Ctrl-C handler")?;
    info!("Stopping, flushing buffered time");

    if let Some(flush) = batcher.shutdown().await {
        flush.await.context("Final time flush task failed")?;
    }
    Ok(())
}
