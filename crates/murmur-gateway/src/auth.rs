// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the gateway.
//!
//! Tokens have the shape `<user_id>.<expires_unix>.<hex hmac-sha256>`, where
//! the MAC covers `<user_id>.<expires_unix>`. A request presents its token in
//! `Authorization: Bearer <token>` or, for browser WebSocket clients that
//! cannot set headers, the `token` query parameter.
//!
//! When no secret is configured every request is rejected (fail-closed).

use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Query},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use murmur_config::model::AuthConfig;
use murmur_core::{Authenticator, MurmurError, UserId};

use crate::handlers::error_response;
use crate::server::GatewayState;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies HMAC-signed bearer tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"[redacted]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenAuthority {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Build from the `[auth]` section. `None` when no secret is configured.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        config
            .token_secret
            .as_ref()
            .map(|secret| Self::new(secret.as_bytes(), Duration::from_secs(config.token_ttl_secs)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `user` valid for the configured lifetime.
    pub fn issue(&self, user: UserId) -> Result<String, MurmurError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| MurmurError::Internal(format!("token ttl out of range: {e}")))?;
        self.issue_until(user, Utc::now() + ttl)
    }

    /// Mint a token for `user` that expires at `expires_at`.
    pub fn issue_until(&self, user: UserId, expires_at: DateTime<Utc>) -> Result<String, MurmurError> {
        if !user.is_valid() {
            return Err(MurmurError::Validation("invalid user ID".into()));
        }
        let payload = format!("{}.{}", user.0, expires_at.timestamp());
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Verify `token` against the clock value `now` (unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<UserId, MurmurError> {
        let mut parts = token.splitn(3, '.');
        let (Some(user), Some(expires), Some(signature)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(MurmurError::Auth("malformed token".into()));
        };

        let signature =
            hex::decode(signature).map_err(|_| MurmurError::Auth("malformed token".into()))?;
        let mut mac = self.mac()?;
        mac.update(user.as_bytes());
        mac.update(b".");
        mac.update(expires.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| MurmurError::Auth("invalid token signature".into()))?;

        let expires: i64 = expires
            .parse()
            .map_err(|_| MurmurError::Auth("malformed token".into()))?;
        if expires <= now {
            return Err(MurmurError::Auth("token expired".into()));
        }

        let user = user
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| MurmurError::Auth("malformed token".into()))?;
        if !user.is_valid() {
            return Err(MurmurError::Auth("malformed token".into()));
        }
        Ok(user)
    }

    fn mac(&self) -> Result<HmacSha256, MurmurError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| MurmurError::Internal(format!("invalid token secret: {e}")))
    }
}

impl Authenticator for TokenAuthority {
    fn authenticate(&self, token: &str) -> Result<UserId, MurmurError> {
        self.verify_at(token, Utc::now().timestamp())
    }
}

/// Authenticator used when no token secret is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl Authenticator for DenyAll {
    fn authenticate(&self, _token: &str) -> Result<UserId, MurmurError> {
        Err(MurmurError::Auth("no token secret configured".into()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Pull the bearer token from the `Authorization` header, falling back to `?token=`.
pub fn extract_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = header {
        return Some(token.to_string());
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

/// 401 response for a missing or rejected token.
#[derive(Debug)]
pub struct AuthRejection(String);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        error_response(StatusCode::UNAUTHORIZED, self.0)
    }
}

impl FromRequestParts<GatewayState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_token(parts) else {
            return Err(AuthRejection("missing bearer token".into()));
        };
        match state.auth.authenticate(&token) {
            Ok(user) => Ok(AuthUser(user)),
            Err(e) => {
                tracing::debug!(error = %e, path = %parts.uri.path(), "request rejected");
                Err(AuthRejection(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn authority() -> TokenAuthority {
        TokenAuthority::new("0123456789abcdef0123", Duration::from_secs(3600))
    }

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn issued_token_verifies() {
        let auth = authority();
        let token = auth.issue(UserId(42)).unwrap();
        assert!(token.starts_with("42."));
        assert_eq!(auth.authenticate(&token).unwrap(), UserId(42));
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = authority();
        let expires = Utc::now();
        let token = auth.issue_until(UserId(7), expires).unwrap();
        let err = auth.verify_at(&token, expires.timestamp()).unwrap_err();
        assert!(err.to_string().contains("expired"));
        assert_eq!(
            auth.verify_at(&token, expires.timestamp() - 1).unwrap(),
            UserId(7)
        );
    }

    #[test]
    fn tampered_user_is_rejected() {
        let auth = authority();
        let token = auth.issue(UserId(1)).unwrap();
        let forged = token.replacen("1.", "2.", 1);
        let err = auth.authenticate(&forged).unwrap_err();
        assert!(matches!(err, MurmurError::Auth(_)));
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = authority().issue(UserId(1)).unwrap();
        let other = TokenAuthority::new("another-secret-value!", Duration::from_secs(60));
        assert!(other.authenticate(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = authority();
        for token in ["", "abc", "1.2", "1.2.zz", "x.9999999999.00"] {
            assert!(auth.authenticate(token).is_err(), "{token}");
        }
    }

    #[test]
    fn invalid_user_cannot_be_issued() {
        assert!(authority().issue(UserId(0)).is_err());
    }

    #[test]
    fn from_config_requires_secret() {
        assert!(TokenAuthority::from_config(&AuthConfig::default()).is_none());
        let config = AuthConfig {
            token_secret: Some("0123456789abcdef".into()),
            token_ttl_secs: 60,
        };
        let auth = TokenAuthority::from_config(&config).unwrap();
        assert_eq!(auth.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn debug_redacts_secret() {
        let debug = format!("{:?}", authority());
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("0123456789"));
    }

    #[test]
    fn deny_all_rejects() {
        assert!(DenyAll.authenticate("anything").is_err());
    }

    #[test]
    fn token_from_header_wins_over_query() {
        let p = parts("/api/chat/ws?token=from-query", Some("Bearer from-header"));
        assert_eq!(extract_token(&p).as_deref(), Some("from-header"));
    }

    #[test]
    fn token_from_query() {
        let p = parts("/api/chat/ws?token=abc.1.ff", None);
        assert_eq!(extract_token(&p).as_deref(), Some("abc.1.ff"));
        let p = parts("/api/chat/ws", Some("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&p), None);
    }
}
