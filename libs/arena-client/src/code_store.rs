//! Persistent editor cache, keyed per (problem slug, language).
//!
//! Writes are write-through on every edit. The language preference is a
//! separate single value, read once when a workspace is created.

use std::collections::HashMap;

use arena_common::redis as keys;
use arena_common::types::{Language, Problem};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::StoreError;

/// Language whose starter code is used when the requested language has none
pub const FALLBACK_LANGUAGE: Language = Language::Python;

#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn get(&self, slug: &str, language: Language) -> Result<Option<String>, StoreError>;

    async fn put(&self, slug: &str, language: Language, code: &str) -> Result<(), StoreError>;

    /// Last language the user picked, `FALLBACK_LANGUAGE` if none recorded
    async fn default_language(&self) -> Result<Language, StoreError>;

    async fn set_default_language(&self, language: Language) -> Result<(), StoreError>;
}

/// Redis-backed store; survives page reloads and process restarts
#[derive(Clone)]
pub struct RedisCodeStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisCodeStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CodeStore for RedisCodeStore {
    async fn get(&self, slug: &str, language: Language) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::load_code(&mut conn, slug, &language).await?)
    }

    async fn put(&self, slug: &str, language: Language, code: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::store_code(&mut conn, slug, &language, code).await?)
    }

    async fn default_language(&self) -> Result<Language, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::load_language_preference(&mut conn)
            .await?
            .unwrap_or(FALLBACK_LANGUAGE))
    }

    async fn set_default_language(&self, language: Language) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::store_language_preference(&mut conn, &language).await?)
    }
}

/// In-process store used by tests and offline sessions
#[derive(Default)]
pub struct MemoryCodeStore {
    entries: Mutex<HashMap<(String, Language), String>>,
    language: Mutex<Option<Language>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn get(&self, slug: &str, language: Language) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(&(slug.to_string(), language)).cloned())
    }

    async fn put(&self, slug: &str, language: Language, code: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert((slug.to_string(), language), code.to_string());
        Ok(())
    }

    async fn default_language(&self) -> Result<Language, StoreError> {
        Ok(self.language.lock().unwrap_or(FALLBACK_LANGUAGE))
    }

    async fn set_default_language(&self, language: Language) -> Result<(), StoreError> {
        *self.language.lock() = Some(language);
        Ok(())
    }
}

/// Editor content to show for `language` on `problem`.
///
/// Order: cached code → starter code for `language` → starter code for
/// `FALLBACK_LANGUAGE` → empty string. Store failures count as a cache miss,
/// so this always yields a value.
pub async fn resolve_code(store: &dyn CodeStore, problem: &Problem, language: Language) -> String {
    match store.get(&problem.slug, language).await {
        Ok(Some(code)) => return code,
        Ok(None) => {}
        Err(e) => {
            warn!(slug = %problem.slug, language = %language, error = %e, "code cache read failed");
        }
    }

    problem
        .starter_code_for(language)
        .or_else(|| problem.starter_code_for(FALLBACK_LANGUAGE))
        .unwrap_or_default()
        .to_string()
}
