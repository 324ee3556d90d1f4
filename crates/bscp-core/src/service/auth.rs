//! gRPC authentication
//!
//! Callers present a bearer token in the `accessToken` header. The token's
//! subject becomes the operator recorded on every row the request writes.
//! Decoded tokens are kept in a [`TokenCache`] owned by the service.

use std::collections::HashMap;
use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use bscp_api::remote::ACCESS_TOKEN_HEADER;

/// Token → subject cache with bounded size and a time-to-live. An entry
/// also stops answering once its token's `exp` has passed, the same instant
/// the decoder starts rejecting it.
#[derive(Clone)]
pub struct TokenCache {
    inner: Cache<String, CachedToken>,
}

#[derive(Clone)]
struct CachedToken {
    subject: String,
    /// Token expiry in seconds since the epoch.
    expires_at: i64,
}

impl TokenCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, token: &str) -> Option<String> {
        let cached = self.inner.get(token)?;
        if chrono::Utc::now().timestamp() > cached.expires_at {
            self.invalidate(token);
            return None;
        }
        Some(cached.subject)
    }

    pub fn insert(&self, token: String, subject: String, expires_at: i64) {
        self.inner.insert(
            token,
            CachedToken {
                subject,
                expires_at,
            },
        );
    }

    pub fn invalidate(&self, token: &str) {
        self.inner.invalidate(token);
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(300))
    }
}

/// Authentication outcome for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrpcAuthContext {
    /// Subject of the presented token.
    pub operator: String,
    pub auth_error: Option<String>,
    pub auth_enabled: bool,
}

impl GrpcAuthContext {
    pub fn authenticated(operator: String) -> Self {
        Self {
            operator,
            auth_error: None,
            auth_enabled: true,
        }
    }

    pub fn unauthenticated(error: String) -> Self {
        Self {
            auth_error: Some(error),
            auth_enabled: true,
            ..Default::default()
        }
    }

    pub fn auth_disabled() -> Self {
        Self {
            auth_enabled: false,
            ..Default::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.auth_enabled || (!self.operator.is_empty() && self.auth_error.is_none())
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

#[derive(Clone)]
pub struct GrpcAuthService {
    auth_enabled: bool,
    /// Base64-encoded HMAC secret used to verify tokens.
    token_secret_key: String,
    cache: TokenCache,
}

impl Default for GrpcAuthService {
    fn default() -> Self {
        Self::new(false, String::new(), TokenCache::default())
    }
}

impl GrpcAuthService {
    pub fn new(auth_enabled: bool, token_secret_key: String, cache: TokenCache) -> Self {
        Self {
            auth_enabled,
            token_secret_key,
            cache,
        }
    }

    pub fn is_auth_enabled(&self) -> bool {
        self.auth_enabled
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Authenticate a request from its payload headers.
    pub fn parse_identity(&self, headers: &HashMap<String, String>) -> GrpcAuthContext {
        if !self.auth_enabled {
            return GrpcAuthContext::auth_disabled();
        }

        let token = headers
            .get(ACCESS_TOKEN_HEADER)
            .map(|s| s.as_str())
            .unwrap_or("");
        if token.is_empty() {
            return GrpcAuthContext::unauthenticated("token invalid!".to_string());
        }

        if let Some(subject) = self.cache.get(token) {
            return GrpcAuthContext::authenticated(subject);
        }

        match self.decode_token(token) {
            Ok(claims) => {
                self.cache
                    .insert(token.to_string(), claims.sub.clone(), claims.exp);
                GrpcAuthContext::authenticated(claims.sub)
            }
            Err(e) => GrpcAuthContext::unauthenticated(e),
        }
    }

    fn decode_token(&self, token: &str) -> Result<Claims, String> {
        use jsonwebtoken::{DecodingKey, Validation, decode};

        let decoding_key = DecodingKey::from_base64_secret(&self.token_secret_key)
            .map_err(|e| format!("invalid secret key: {}", e))?;

        // No leeway, so a token the cache has expired is not decoded again.
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e
                .kind()
            {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => "token expired!".to_string(),
                _ => format!("token invalid: {}", e),
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    // base64 of "bscp-test-secret-key-0123456789ab"
    const SECRET: &str = "YnNjcC10ZXN0LXNlY3JldC1rZXktMDEyMzQ1Njc4OWFi";

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn token(sub: &str, exp: i64) -> String {
        let key = EncodingKey::from_base64_secret(SECRET).unwrap();
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.to_string(),
                exp,
            },
            &key,
        )
        .unwrap()
    }

    fn headers(token: &str) -> HashMap<String, String> {
        HashMap::from([(ACCESS_TOKEN_HEADER.to_string(), token.to_string())])
    }

    fn service() -> GrpcAuthService {
        GrpcAuthService::new(true, SECRET.to_string(), TokenCache::default())
    }

    #[test]
    fn test_disabled_is_always_authenticated() {
        let ctx = GrpcAuthService::default().parse_identity(&HashMap::new());
        assert!(!ctx.auth_enabled);
        assert!(ctx.is_authenticated());
    }

    #[test]
    fn test_missing_token() {
        let ctx = service().parse_identity(&HashMap::new());
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.auth_error, Some("token invalid!".to_string()));
    }

    #[test]
    fn test_valid_token_yields_operator_and_is_cached() {
        let svc = service();
        let exp = chrono::Utc::now().timestamp() + 3600;
        let t = token("alice", exp);

        let ctx = svc.parse_identity(&headers(&t));
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.operator, "alice");
        assert_eq!(svc.cache().get(&t), Some("alice".to_string()));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let ctx = service().parse_identity(&headers(&token("bob", exp)));
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.auth_error, Some("token expired!".to_string()));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let ctx = service().parse_identity(&headers("not-a-jwt"));
        assert!(!ctx.is_authenticated());
        assert!(ctx.auth_error.unwrap().starts_with("token invalid"));
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_token_cache_expiry() {
        let cache = TokenCache::new(16, Duration::from_millis(50));
        cache.insert("t".to_string(), "alice".to_string(), far_future());
        assert_eq!(cache.get("t"), Some("alice".to_string()));

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get("t"), None);
    }

    #[test]
    fn test_cached_entry_ends_at_token_exp() {
        let cache = TokenCache::default();
        cache.insert(
            "stale".to_string(),
            "alice".to_string(),
            chrono::Utc::now().timestamp() - 1,
        );
        assert_eq!(cache.get("stale"), None);
    }

    #[test]
    fn test_token_expiring_while_cached_is_rejected() {
        let svc = service();
        let exp = chrono::Utc::now().timestamp() + 1;
        let t = token("carol", exp);

        assert!(svc.parse_identity(&headers(&t)).is_authenticated());
        assert_eq!(svc.cache().get(&t), Some("carol".to_string()));

        while chrono::Utc::now().timestamp() <= exp {
            std::thread::sleep(Duration::from_millis(100));
        }

        let ctx = svc.parse_identity(&headers(&t));
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.auth_error, Some("token expired!".to_string()));
        assert_eq!(svc.cache().get(&t), None);
    }

    #[test]
    fn test_token_cache_invalidate() {
        let cache = TokenCache::default();
        cache.insert("t".to_string(), "alice".to_string(), far_future());
        cache.invalidate("t");
        assert_eq!(cache.get("t"), None);
    }

    #[test]
    fn test_caches_are_not_shared_between_services() {
        let a = service();
        let b = service();
        a.cache()
            .insert("shared".to_string(), "alice".to_string(), far_future());
        assert_eq!(b.cache().get("shared"), None);
    }
}
