//! Bearer token verification against the identity provider's published keys.
//!
//! Keys are cached for a configurable TTL. Two requests that find the cache
//! stale may both refetch; the later write wins, which is harmless because a
//! published key never changes once issued.

use crate::auth::identity::CredentialVerifier;
use crate::shared::types::app::ApiError;
use crate::shared::util::config::AuthConfig;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, ApiError>;
}

pub struct HttpKeySource {
    client: reqwest::Client,
    url: String
}

impl HttpKeySource {
    pub fn new(url: impl Into<String>) -> HttpKeySource {
        HttpKeySource { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, ApiError> {
        let response = self.client.get(&self.url).send().await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Store(format!("fetching signing keys from {}: {e}", self.url)))?;
        response.json::<JwkSet>().await
            .map_err(|e| ApiError::Store(format!("decoding signing keys from {}: {e}", self.url)))
    }
}

struct CachedKeys {
    keys: Arc<JwkSet>,
    fetched_at: Instant
}

pub struct JwksCache {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    state: RwLock<Option<CachedKeys>>
}

impl JwksCache {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> JwksCache {
        JwksCache { source, ttl, state: RwLock::new(None) }
    }

    pub async fn keys(&self) -> Result<Arc<JwkSet>, ApiError> {
        if let Some(cached) = self.state.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.keys.clone());
            }
        }

        let keys = Arc::new(self.source.fetch().await?);
        log::debug!("refreshed signing keys ({} keys)", keys.keys.len());
        *self.state.write().await = Some(CachedKeys { keys: keys.clone(), fetched_at: Instant::now() });
        Ok(keys)
    }
}

#[derive(Deserialize)]
struct Claims {
    sub: String
}

pub struct JwksVerifier {
    cache: JwksCache,
    issuer: String,
    audience: Option<String>,
    algorithms: Vec<Algorithm>
}

impl JwksVerifier {
    pub fn new(cache: JwksCache, issuer: impl Into<String>, audience: Option<String>, algorithms: Vec<Algorithm>)
            -> JwksVerifier {
        JwksVerifier { cache, issuer: issuer.into(), audience, algorithms }
    }

    /// Verifier fetching keys over HTTP per the `[auth]` config section
    pub fn from_config(config: &AuthConfig) -> Result<JwksVerifier, String> {
        let algorithms = config.allowed_algorithms.iter()
            .map(|a| Algorithm::from_str(a).map_err(|_| format!("Unknown signing algorithm `{a}`")))
            .collect::<Result<Vec<_>, _>>()?;
        if algorithms.is_empty() {
            return Err("auth.allowed_algorithms must not be empty".to_string());
        }

        let cache = JwksCache::new(
            Arc::new(HttpKeySource::new(config.jwks_url.clone())),
            Duration::from_secs(config.key_cache_ttl_seconds));
        Ok(JwksVerifier::new(cache, config.issuer.clone(), config.audience.clone(), algorithms))
    }
}

#[async_trait]
impl CredentialVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<String, ApiError> {
        let rejected = |reason: String| {
            log::debug!("rejected bearer token: {reason}");
            ApiError::Unauthenticated("Missing or invalid credentials".to_string())
        };

        let header = decode_header(token).map_err(|e| rejected(e.to_string()))?;
        if !self.algorithms.contains(&header.alg) {
            return Err(rejected(format!("algorithm {:?} is not allowed", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| rejected("token has no kid".to_string()))?;

        let keys = self.cache.keys().await?;
        let jwk = keys.find(&kid).ok_or_else(|| rejected(format!("unknown kid {kid}")))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| rejected(e.to_string()))?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false
        }

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| rejected(e.to_string()))?;
        Ok(data.claims.sub)
    }
}
