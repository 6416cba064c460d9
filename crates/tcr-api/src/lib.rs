//! # tcr-api — Axum API for the Trade Certificate Registry
//!
//! The service layer over the lifecycle core: tenant-scoped request and
//! correction routes, the asset generation endpoint, and the public
//! verification surface.
//!
//! ## API Surface
//!
//! | Prefix               | Module                  | Access        |
//! |----------------------|-------------------------|---------------|
//! | `/v1/requests/*`     | [`routes::requests`]    | tenant token  |
//! | `/v1/corrections/*`  | [`routes::corrections`] | tenant token  |
//! | `/v1/issued/*`       | [`routes::issued`]      | tenant token  |
//! | `/verify*`           | [`routes::verify`]      | public        |
//! | `/health/*`          | here                    | public        |
//!
//! ## Architecture
//!
//! No business logic in route handlers — they delegate to `tcr-store`,
//! `tcr-assets`, and `tcr-verify`, then mirror writes to Postgres when a
//! pool is configured. All errors map to structured HTTP responses via
//! [`AppError`]; the public surface renders HTML instead.

pub mod auth;
pub mod db;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use crate::error::AppError;
pub use crate::state::{AppConfig, AppState};

/// Assemble the full application router.
///
/// The public verification surface and health probes are mounted outside
/// the auth middleware — both must stay reachable without credentials
/// (the former by QR-scanning strangers, the latter by the orchestrator).
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::requests::router())
        .merge(routes::corrections::router())
        .merge(routes::issued::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let public = Router::new()
        .merge(routes::verify::router())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new()
        .merge(health)
        .merge(public)
        .merge(api)
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

// ---------------------------------------------------------------------------
// Shared test fixtures
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::auth::SecretToken;
    use crate::test_support::seeded_state;

    #[tokio::test]
    async fn test_health_probes_need_no_auth() {
        let (mut state, _t) = seeded_state();
        state.config.auth_token = Some(SecretToken::new("s3cret"));
        let app = crate::app(state);

        for uri in ["/health/liveness", "/health/readiness"] {
            let resp = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_tenant_routes_reject_missing_token() {
        let (mut state, _t) = seeded_state();
        state.config.auth_token = Some(SecretToken::new("s3cret"));
        let app = crate::app(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/requests")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_tenant_routes_accept_valid_token() {
        let (mut state, t) = seeded_state();
        state.config.auth_token = Some(SecretToken::new("s3cret"));
        let app = crate::app(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/requests")
                    .header(
                        "authorization",
                        format!("Bearer {}:{}:s3cret", t.tenant_id, t.user_id),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_public_verify_needs_no_auth() {
        let (mut state, _t) = seeded_state();
        state.config.auth_token = Some(SecretToken::new("s3cret"));
        let app = crate::app(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/verify?code=VC-UNKNOWNUNKNOWNUNKNOWN1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // 404 (unknown code), not 401 — the surface is public.
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_openapi_served_behind_auth() {
        let (state, t) = seeded_state();
        let app = crate::app(state);

        // Dev mode (no token): identity comes from headers.
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/openapi.json")
                    .header("x-tenant-id", t.tenant_id.to_string())
                    .header("x-acting-user", t.user_id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
