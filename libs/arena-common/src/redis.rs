use crate::types::Language;
use redis::{AsyncCommands, RedisResult};

// Redis key layout for the persistent code store.
// Keys are deterministic so every process reading the editor cache agrees on them.

pub const CODE_PREFIX: &str = "arena:code";
pub const PREFERENCE_PREFIX: &str = "arena:pref";

/// Key holding the editor content for one (problem, language) pair
pub fn code_key(slug: &str, language: &Language) -> String {
    format!("{}:{}:{}", CODE_PREFIX, slug, language)
}

/// Key holding the last language the user picked
pub fn language_preference_key() -> String {
    format!("{}:language", PREFERENCE_PREFIX)
}

pub async fn load_code(
    conn: &mut redis::aio::ConnectionManager,
    slug: &str,
    language: &Language,
) -> RedisResult<Option<String>> {
    conn.get(code_key(slug, language)).await
}

/// Store editor content. No TTL: the cache must survive reloads.
pub async fn store_code(
    conn: &mut redis::aio::ConnectionManager,
    slug: &str,
    language: &Language,
    code: &str,
) -> RedisResult<()> {
    conn.set(code_key(slug, language), code).await
}

/// Read the stored language preference.
/// An unknown stored value reads as absent rather than failing.
pub async fn load_language_preference(
    conn: &mut redis::aio::ConnectionManager,
) -> RedisResult<Option<Language>> {
    let raw: Option<String> = conn.get(language_preference_key()).await?;
    Ok(raw.as_deref().and_then(Language::parse))
}

pub async fn store_language_preference(
    conn: &mut redis::aio::ConnectionManager,
    language: &Language,
) -> RedisResult<()> {
    conn.set(language_preference_key(), language.as_str()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_key_naming() {
        assert_eq!(code_key("two-sum", &Language::Python), "arena:code:two-sum:python");
        assert_eq!(code_key("two-sum", &Language::Cpp), "arena:code:two-sum:cpp");
    }

    #[test]
    fn test_code_keys_isolated_per_language() {
        let keys: Vec<String> = Language::ALL
            .iter()
            .map(|lang| code_key("lru-cache", lang))
            .collect();
        let mut deduped = keys.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
    }

    #[test]
    fn test_preference_key_format() {
        let key = language_preference_key();
        assert!(key.starts_with("arena:pref:"));
        assert!(!key.starts_with(CODE_PREFIX));
    }
}
