//! # Authentication Middleware & Tenant Context
//!
//! Bearer-token middleware supplying the tenant context this core
//! consumes. Full authentication and RBAC live in an upstream gateway —
//! this layer only validates the shared service token and carries the
//! already-authenticated tenant/user identity into request extensions.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {tenant_id}:{user_id}:{secret}
//! ```
//!
//! When no token is configured (development mode), the identity is read
//! from the `X-Tenant-Id` / `X-Acting-User` headers instead.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use tcr_core::{TenantId, UserId};

use crate::error::AppError;

// ── Tenant context ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller: the tenant the request is scoped
/// to and the acting user. Supplied by the request-handling layer; opaque
/// to the lifecycle core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

/// Extracts the context that the auth middleware injected into
/// extensions. Returns 401 if no context is present (middleware didn't
/// run or failed).
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("no tenant context in request".into()))
    }
}

// ── Secret token ────────────────────────────────────────────────────────────

/// The shared service secret.
///
/// Custom `Debug` redacts the value to prevent credential leakage in logs;
/// comparison is constant-time.
#[derive(Clone)]
pub struct SecretToken(String);

impl SecretToken {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Constant-time comparison against a candidate.
    ///
    /// When lengths differ, a dummy comparison keeps timing flat so the
    /// secret's length is not observable either.
    pub fn verify(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let provided = candidate.as_bytes();
        if provided.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        provided.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretToken").field(&"[REDACTED]").finish()
    }
}

/// Auth configuration injected into request extensions.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// The expected service token. `None` disables token checking
    /// (development mode) — identity then comes from headers.
    pub token: Option<SecretToken>,
}

// ── Token parsing ───────────────────────────────────────────────────────────

/// Parse `{tenant_id}:{user_id}:{secret}` and validate the secret.
fn parse_bearer_token(provided: &str, expected: &SecretToken) -> Result<TenantContext, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    let &[tenant_str, user_str, secret] = parts.as_slice() else {
        return Err("invalid token format: expected {tenant_id}:{user_id}:{secret}".into());
    };

    if !expected.verify(secret) {
        return Err("invalid bearer token".into());
    }

    let tenant_id = tenant_str
        .parse::<Uuid>()
        .map_err(|e| format!("invalid tenant_id: {e}"))?;
    let user_id = user_str
        .parse::<Uuid>()
        .map_err(|e| format!("invalid user_id: {e}"))?;

    Ok(TenantContext {
        tenant_id: TenantId::from_uuid(tenant_id),
        user_id: UserId::from_uuid(user_id),
    })
}

/// Development-mode identity from `X-Tenant-Id` / `X-Acting-User` headers.
fn context_from_headers(headers: &HeaderMap) -> Result<TenantContext, String> {
    let parse = |name: &str| -> Result<Uuid, String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| format!("missing {name} header"))?
            .parse::<Uuid>()
            .map_err(|e| format!("invalid {name}: {e}"))
    };
    Ok(TenantContext {
        tenant_id: TenantId::from_uuid(parse("x-tenant-id")?),
        user_id: UserId::from_uuid(parse("x-acting-user")?),
    })
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Validate the caller and inject [`TenantContext`] into extensions.
///
/// The public verification surface is mounted outside this middleware —
/// it must stay reachable by anyone holding only a QR code.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    let context = match &config.token {
        Some(expected) => {
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "));
            match bearer {
                Some(provided) => parse_bearer_token(provided, expected),
                None => Err("missing bearer token".into()),
            }
        }
        None => context_from_headers(request.headers()),
    };

    match context {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(reason) => {
            tracing::debug!(%reason, "request rejected by auth middleware");
            AppError::Unauthorized(reason).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_token_verify() {
        let token = SecretToken::new("s3cret");
        assert!(token.verify("s3cret"));
        assert!(!token.verify("s3cret!"));
        assert!(!token.verify(""));
        assert!(!token.verify("S3CRET"));
    }

    #[test]
    fn test_secret_token_debug_redacts() {
        let token = SecretToken::new("s3cret");
        let shown = format!("{token:?}");
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("REDACTED"));
    }

    #[test]
    fn test_parse_bearer_token_happy_path() {
        let expected = SecretToken::new("s3cret");
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let ctx = parse_bearer_token(&format!("{tenant}:{user}:s3cret"), &expected).unwrap();
        assert_eq!(ctx.tenant_id.as_uuid(), &tenant);
        assert_eq!(ctx.user_id.as_uuid(), &user);
    }

    #[test]
    fn test_parse_bearer_token_wrong_secret() {
        let expected = SecretToken::new("s3cret");
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        assert!(parse_bearer_token(&format!("{tenant}:{user}:wrong"), &expected).is_err());
    }

    #[test]
    fn test_parse_bearer_token_malformed() {
        let expected = SecretToken::new("s3cret");
        assert!(parse_bearer_token("s3cret", &expected).is_err());
        assert!(parse_bearer_token("a:b", &expected).is_err());
        assert!(parse_bearer_token("not-a-uuid:also-not:s3cret", &expected).is_err());
    }

    #[test]
    fn test_context_from_headers() {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", tenant.to_string().parse().unwrap());
        headers.insert("x-acting-user", user.to_string().parse().unwrap());
        let ctx = context_from_headers(&headers).unwrap();
        assert_eq!(ctx.tenant_id.as_uuid(), &tenant);
        assert_eq!(ctx.user_id.as_uuid(), &user);
    }

    #[test]
    fn test_context_from_headers_missing() {
        assert!(context_from_headers(&HeaderMap::new()).is_err());
    }
}
