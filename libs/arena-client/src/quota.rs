//! Quota Gate - Two-Phase Admission Control
//!
//! **Phase 1 (local, optimistic):**
//! Every Run/Submit/Ask is checked against the cached `UsageCredits` snapshot
//! before any request goes out. A failed check returns `LimitExceeded` and no
//! network call is made.
//!
//! **Phase 2 (server, authoritative):**
//! The services run their own check. When they reject with a limit marker the
//! caller converts it with `LimitExceeded::from_server`, producing the same
//! value a local rejection would.
//!
//! **Reconciliation:**
//! After each completed action the gate refetches the whole snapshot from the
//! accounts service in the background. The fetched snapshot replaces the cached
//! one unconditionally; it is never merged or decremented locally.

use std::sync::Arc;

use arena_common::types::{ActionKind, UsageCredits};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{LimitExceeded, ServiceError};
use crate::services::AccountsService;

/// Cached credits plus when they were last fetched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreditsSnapshot {
    pub credits: UsageCredits,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Whether `credits` admit one more action of `kind`
pub fn admits(credits: &UsageCredits, kind: ActionKind, ai_daily_limit: u32) -> bool {
    if credits.is_pro {
        return true;
    }
    match kind {
        ActionKind::Run => credits.run_credits > 0,
        ActionKind::Submit => credits.submission_credits > 0,
        ActionKind::Ask => credits.ai_daily_usage < ai_daily_limit,
    }
}

pub struct QuotaGate {
    snapshot: Arc<watch::Sender<CreditsSnapshot>>,
    accounts: Arc<dyn AccountsService>,
    user_id: Option<String>,
    ai_daily_limit: u32,
}

impl QuotaGate {
    pub fn new(
        accounts: Arc<dyn AccountsService>,
        user_id: Option<String>,
        ai_daily_limit: u32,
        initial: UsageCredits,
    ) -> Self {
        let (tx, _rx) = watch::channel(CreditsSnapshot {
            credits: initial,
            refreshed_at: None,
        });
        Self {
            snapshot: Arc::new(tx),
            accounts,
            user_id,
            ai_daily_limit,
        }
    }

    pub fn credits(&self) -> UsageCredits {
        self.snapshot.borrow().credits.clone()
    }

    pub fn snapshot(&self) -> CreditsSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified whenever a refresh replaces the snapshot
    pub fn subscribe(&self) -> watch::Receiver<CreditsSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn can_run(&self) -> bool {
        self.allows(ActionKind::Run)
    }

    pub fn can_submit(&self) -> bool {
        self.allows(ActionKind::Submit)
    }

    pub fn can_ask(&self) -> bool {
        self.allows(ActionKind::Ask)
    }

    fn allows(&self, kind: ActionKind) -> bool {
        admits(&self.snapshot.borrow().credits, kind, self.ai_daily_limit)
    }

    /// Local admission check. Never touches the network.
    pub fn admit(&self, kind: ActionKind) -> Result<(), LimitExceeded> {
        if self.allows(kind) {
            Ok(())
        } else {
            info!(kind = %kind, "action rejected by cached credits");
            Err(LimitExceeded::local(kind))
        }
    }

    /// Fetch the snapshot now and replace the cache with it
    pub async fn refresh(&self) -> Result<(), ServiceError> {
        let Some(uid) = self.user_id.as_deref() else {
            debug!("anonymous session, credits refresh skipped");
            return Ok(());
        };
        refresh_into(&*self.accounts, uid, &self.snapshot).await
    }

    /// Reconcile in the background. Failures keep the previous snapshot.
    pub fn schedule_refresh(&self) -> Option<JoinHandle<()>> {
        let uid = self.user_id.clone()?;
        let accounts = self.accounts.clone();
        let snapshot = self.snapshot.clone();

        Some(tokio::spawn(async move {
            if let Err(e) = refresh_into(&*accounts, &uid, &snapshot).await {
                warn!(error = %e, "credits refresh failed; keeping cached snapshot");
            }
        }))
    }
}

async fn refresh_into(
    accounts: &dyn AccountsService,
    uid: &str,
    snapshot: &watch::Sender<CreditsSnapshot>,
) -> Result<(), ServiceError> {
    let credits = accounts.fetch_credits(uid).await?;
    debug!(
        run_credits = credits.run_credits,
        submission_credits = credits.submission_credits,
        ai_daily_usage = credits.ai_daily_usage,
        is_pro = credits.is_pro,
        "credits snapshot replaced"
    );
    snapshot.send_replace(CreditsSnapshot {
        credits,
        refreshed_at: Some(Utc::now()),
    });
    Ok(())
}
