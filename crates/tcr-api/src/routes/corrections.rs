//! # Correction Workflow Routes
//!
//! Filing, reviewing, and approving corrections. Approval reuses the
//! store's issuance primitive: a new version is always cut, and a fresh
//! issued certificate supersedes the old document when the request had
//! already been issued.
//!
//! ## Endpoints
//!
//! - `POST /v1/corrections` — file against a request
//! - `POST /v1/corrections/:id/review` — pick up for review
//! - `POST /v1/corrections/:id/confirm-payment` — record fee payment
//! - `POST /v1/corrections/:id/approve` — cut version (+ reissue)
//! - `POST /v1/corrections/:id/reject`
//! - `POST /v1/corrections/:id/complete`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tcr_core::{CorrectionId, RequestId, Timestamp};
use tcr_store::{Correction, ErrorSource, IssuedCertificate};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /v1/corrections`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FileCorrectionBody {
    pub request_id: uuid::Uuid,
    #[schema(value_type = String)]
    pub error_source: ErrorSource,
    pub description: String,
    #[serde(default)]
    pub payment_required: bool,
}

/// Response from correction approval.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CorrectionApprovalResponse {
    #[schema(value_type = Object)]
    pub correction: Correction,
    /// The new version's number (always cut).
    pub version_number: u32,
    /// The superseding certificate, present when the request had already
    /// been issued.
    #[schema(value_type = Option<Object>)]
    pub new_issued: Option<IssuedCertificate>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the corrections router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/corrections", post(file_correction))
        .route("/v1/corrections/:id/review", post(begin_review))
        .route("/v1/corrections/:id/confirm-payment", post(confirm_payment))
        .route("/v1/corrections/:id/approve", post(approve))
        .route("/v1/corrections/:id/reject", post(reject))
        .route("/v1/corrections/:id/complete", post(complete))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/corrections — file a correction.
#[utoipa::path(
    post,
    path = "/v1/corrections",
    request_body = FileCorrectionBody,
    responses(
        (status = 201, description = "Correction filed"),
        (status = 409, description = "Request is not issued or in review",
            body = crate::error::ErrorBody),
    ),
    tag = "corrections"
)]
pub(crate) async fn file_correction(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<FileCorrectionBody>,
) -> Result<(StatusCode, Json<Correction>), AppError> {
    if body.description.trim().is_empty() {
        return Err(AppError::Validation("description must not be empty".into()));
    }
    let correction = state.store.file_correction(
        ctx.tenant_id,
        RequestId::from_uuid(body.request_id),
        ctx.user_id,
        body.error_source,
        body.description,
        body.payment_required,
        Timestamp::now(),
    )?;
    Ok((StatusCode::CREATED, Json(correction)))
}

/// POST /v1/corrections/:id/review — pick up for review.
async fn begin_review(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<CorrectionId>,
) -> Result<Json<Correction>, AppError> {
    Ok(Json(state.store.begin_correction_review(
        ctx.tenant_id,
        id,
        ctx.user_id,
    )?))
}

/// POST /v1/corrections/:id/confirm-payment — record fee payment.
async fn confirm_payment(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<CorrectionId>,
) -> Result<Json<Correction>, AppError> {
    Ok(Json(
        state.store.confirm_correction_payment(ctx.tenant_id, id)?,
    ))
}

/// POST /v1/corrections/:id/approve — approve and (when already issued)
/// supersede the old document with a fresh issuance.
///
/// The payment gate is enforced in the store: a correction with
/// `payment_required` and no confirmed payment is a 409 and creates no
/// version.
#[utoipa::path(
    post,
    path = "/v1/corrections/{id}/approve",
    params(("id" = uuid::Uuid, Path, description = "Correction ID")),
    responses(
        (status = 200, description = "Approved; new version cut", body = CorrectionApprovalResponse),
        (status = 409, description = "Payment outstanding or wrong status",
            body = crate::error::ErrorBody),
    ),
    tag = "corrections"
)]
pub(crate) async fn approve(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<CorrectionId>,
) -> Result<Json<CorrectionApprovalResponse>, AppError> {
    let outcome = state
        .store
        .approve_correction(ctx.tenant_id, id, ctx.user_id, Timestamp::now())?;

    super::persist_version(&state, &outcome.version).await?;
    if let Some(new_issued) = &outcome.new_issued {
        super::persist_issued_insert(&state, new_issued).await?;
        // The superseded document's clamped printability must be mirrored
        // too, or a restart would resurrect its printable window.
        let request = state
            .store
            .get_request(ctx.tenant_id, outcome.correction.request_id)?;
        super::persist_request(&state, &request).await?;
    }

    Ok(Json(CorrectionApprovalResponse {
        version_number: outcome.version.version_number,
        correction: outcome.correction,
        new_issued: outcome.new_issued,
    }))
}

/// POST /v1/corrections/:id/reject — refuse a correction.
async fn reject(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<CorrectionId>,
) -> Result<Json<Correction>, AppError> {
    Ok(Json(state.store.reject_correction(
        ctx.tenant_id,
        id,
        ctx.user_id,
        Timestamp::now(),
    )?))
}

/// POST /v1/corrections/:id/complete — mark the corrected document
/// produced.
async fn complete(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<CorrectionId>,
) -> Result<Json<Correction>, AppError> {
    Ok(Json(state.store.complete_correction(
        ctx.tenant_id,
        id,
        ctx.user_id,
        Timestamp::now(),
    )?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use tcr_store::CorrectionStatus;

    use crate::test_support::{issued_via_store, seeded_state, tenant_app};

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_unpaid_correction_approval_is_409() {
        let (state, t) = seeded_state();
        let (request_id, _issued) = issued_via_store(&state, &t);
        let app = tenant_app(state, &t);

        let resp = app
            .clone()
            .oneshot(post_json(
                "/v1/corrections",
                serde_json::json!({
                    "request_id": request_id.as_uuid(),
                    "error_source": "applicant",
                    "description": "importer name misspelled",
                    "payment_required": true
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let correction: Correction = body_json(resp).await;

        app.clone()
            .oneshot(post_empty(&format!("/v1/corrections/{}/review", correction.id)))
            .await
            .unwrap();

        let resp = app
            .oneshot(post_empty(&format!(
                "/v1/corrections/{}/approve",
                correction.id
            )))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_paid_correction_reissues_certificate() {
        let (state, t) = seeded_state();
        let (request_id, first) = issued_via_store(&state, &t);
        let app = tenant_app(state, &t);

        let resp = app
            .clone()
            .oneshot(post_json(
                "/v1/corrections",
                serde_json::json!({
                    "request_id": request_id.as_uuid(),
                    "error_source": "issuer",
                    "description": "wrong weight printed",
                    "payment_required": true
                }),
            ))
            .await
            .unwrap();
        let correction: Correction = body_json(resp).await;

        app.clone()
            .oneshot(post_empty(&format!("/v1/corrections/{}/review", correction.id)))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_empty(&format!(
                "/v1/corrections/{}/confirm-payment",
                correction.id
            )))
            .await
            .unwrap();

        let resp = app
            .clone()
            .oneshot(post_empty(&format!(
                "/v1/corrections/{}/approve",
                correction.id
            )))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let approval: CorrectionApprovalResponse = body_json(resp).await;
        assert_eq!(approval.version_number, 2);
        assert_eq!(approval.correction.status, CorrectionStatus::Approved);
        let new_issued = approval.new_issued.expect("must reissue");
        assert_ne!(new_issued.certificate_number, first.certificate_number);

        let resp = app
            .oneshot(post_empty(&format!(
                "/v1/corrections/{}/complete",
                correction.id
            )))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let completed: Correction = body_json(resp).await;
        assert_eq!(completed.status, CorrectionStatus::Completed);
    }

    #[tokio::test]
    async fn test_correction_on_draft_is_409() {
        let (state, t) = seeded_state();
        let app = tenant_app(state.clone(), &t);

        // A draft request, never submitted.
        let draft = crate::test_support::draft_via_store(&state, &t);
        let resp = app
            .oneshot(post_json(
                "/v1/corrections",
                serde_json::json!({
                    "request_id": draft.as_uuid(),
                    "error_source": "applicant",
                    "description": "still editable",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
