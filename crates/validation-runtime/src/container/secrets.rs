//! # Secret Injection
//!
//! Configuration strings may carry `$$Name$$` placeholders. They are replaced
//! with values from a [`SecretResolver`] after the file and environment are
//! loaded. Only the resolver knows where secrets live.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Placeholder delimiter.
const DELIMITER: &str = "$$";

/// Default lifetime of a cached secret.
pub const DEFAULT_SECRET_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("Secret store unavailable: {0}")]
    Unavailable(String),

    #[error("Unterminated secret placeholder in '{0}'")]
    Unterminated(String),
}

#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String, SecretError>;
}

/// Reads secret `Name` from `PV_SECRET_NAME`.
///
/// The name is uppercased and every character outside `[A-Z0-9]` becomes `_`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretResolver;

impl EnvSecretResolver {
    pub fn variable_name(name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("PV_SECRET_{}", normalized)
    }
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        std::env::var(Self::variable_name(name)).map_err(|_| SecretError::NotFound(name.to_string()))
    }
}

/// Caches each resolved secret for a fixed time.
pub struct CachingSecretResolver<R: SecretResolver> {
    inner: R,
    ttl: Duration,
    cache: Mutex<HashMap<String, (String, Instant)>>,
}

impl<R: SecretResolver> CachingSecretResolver<R> {
    pub fn new(inner: R) -> Self {
        Self::with_ttl(inner, DEFAULT_SECRET_CACHE_TTL)
    }

    pub fn with_ttl(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, name: &str) -> Option<String> {
        let cache = self.cache.lock();
        cache
            .get(name)
            .filter(|(_, cached_at)| cached_at.elapsed() < self.ttl)
            .map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl<R: SecretResolver> SecretResolver for CachingSecretResolver<R> {
    async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        if let Some(value) = self.cached(name) {
            return Ok(value);
        }
        let value = self.inner.resolve(name).await?;
        self.cache
            .lock()
            .insert(name.to_string(), (value.clone(), Instant::now()));
        debug!(secret = name, "Refreshed cached secret");
        Ok(value)
    }
}

/// Replace every `$$Name$$` in `value`.
pub async fn inject_secrets(
    value: &str,
    resolver: &dyn SecretResolver,
) -> Result<String, SecretError> {
    let mut output = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find(DELIMITER) {
        output.push_str(&rest[..start]);
        let after = &rest[start + DELIMITER.len()..];
        let end = after
            .find(DELIMITER)
            .ok_or_else(|| SecretError::Unterminated(value.to_string()))?;
        output.push_str(&resolver.resolve(&after[..end]).await?);
        rest = &after[end + DELIMITER.len()..];
    }
    output.push_str(rest);
    Ok(output)
}
