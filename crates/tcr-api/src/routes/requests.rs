//! # Request Lifecycle Routes
//!
//! Tenant-scoped CRUD-lite plus the guarded lifecycle actions. Handlers
//! hold no business logic: each delegates to the store and mirrors the
//! result to the database.
//!
//! ## Endpoints
//!
//! - `POST /v1/requests` — create a draft
//! - `GET  /v1/requests` — list (optional `status` filter)
//! - `GET  /v1/requests/:id` — fetch one
//! - `GET  /v1/requests/:id/versions` — immutable snapshots
//! - `GET  /v1/requests/:id/logs` — action log
//! - `POST /v1/requests/:id/items` / `DELETE …/items/:item_id`
//! - `POST /v1/requests/:id/{submit,request-payment,confirm-payment,approve,reject,cancel}`
//! - `POST /v1/requests/:id/audits` / `POST /v1/audits/:id/complete`
//! - `POST /v1/requests/:id/issue` — the atomic issuance transaction

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use tcr_core::{AuditId, ItemId, RequestId, Timestamp};
use tcr_store::{
    Audit, CertificateRequest, CertificateVersion, IssuedCertificate, ItemTranslation, LogEntry,
    NewItem, NewRequest, OperationType, RequestItem, RequestStatus,
};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /v1/requests`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRequestBody {
    pub exporter_name: String,
    pub importer_name: String,
    pub importer_country: String,
    pub certificate_type: String,
    #[schema(value_type = String)]
    pub operation_type: OperationType,
    #[serde(default)]
    pub shipment_condition: Option<String>,
    pub edition_id: uuid::Uuid,
    pub language_code: String,
}

/// Body for `POST /v1/requests/:id/items`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemBody {
    pub product_name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub origin_country: String,
    pub net_weight_kg: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub translations: HashMap<String, ItemTranslation>,
}

/// Body for `POST /v1/requests/:id/audits`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignAuditBody {
    pub auditor_user_id: uuid::Uuid,
}

/// Body for `POST /v1/audits/:id/complete`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteAuditBody {
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body carrying a free-form reason (reject/cancel).
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReasonBody {
    pub reason: String,
}

/// Query parameters for `GET /v1/requests`.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<RequestStatus>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request).get(list_requests))
        .route("/v1/requests/:id", get(get_request))
        .route("/v1/requests/:id/versions", get(list_versions))
        .route("/v1/requests/:id/logs", get(list_logs))
        .route(
            "/v1/requests/:id/items",
            post(add_item).get(list_items),
        )
        .route("/v1/requests/:id/items/:item_id", delete(remove_item))
        .route("/v1/requests/:id/submit", post(submit))
        .route("/v1/requests/:id/request-payment", post(request_payment))
        .route("/v1/requests/:id/confirm-payment", post(confirm_payment))
        .route("/v1/requests/:id/approve", post(approve))
        .route("/v1/requests/:id/reject", post(reject))
        .route("/v1/requests/:id/cancel", post(cancel))
        .route("/v1/requests/:id/audits", post(assign_audit))
        .route("/v1/audits/:id/complete", post(complete_audit))
        .route("/v1/requests/:id/issue", post(issue))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/requests — create a draft request.
#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = CreateRequestBody,
    responses(
        (status = 201, description = "Draft request created"),
        (status = 422, description = "Validation failure", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn create_request(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<CertificateRequest>), AppError> {
    for (field, value) in [
        ("exporter_name", &body.exporter_name),
        ("importer_name", &body.importer_name),
        ("importer_country", &body.importer_country),
        ("certificate_type", &body.certificate_type),
        ("language_code", &body.language_code),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} must not be empty")));
        }
    }

    let request = state.store.create_request(
        ctx.tenant_id,
        ctx.user_id,
        NewRequest {
            exporter_name: body.exporter_name,
            importer_name: body.importer_name,
            importer_country: body.importer_country,
            certificate_type: body.certificate_type,
            operation_type: body.operation_type,
            shipment_condition: body.shipment_condition,
            edition_id: tcr_core::EditionId::from_uuid(body.edition_id),
            language_code: body.language_code,
        },
        Timestamp::now(),
    )?;
    super::persist_request(&state, &request).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /v1/requests — list the tenant's requests.
#[utoipa::path(
    get,
    path = "/v1/requests",
    responses((status = 200, description = "Requests, newest first")),
    tag = "requests"
)]
pub(crate) async fn list_requests(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Json<Vec<CertificateRequest>> {
    Json(state.store.list_requests(ctx.tenant_id, params.status))
}

/// GET /v1/requests/:id — fetch one request.
async fn get_request(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<CertificateRequest>, AppError> {
    Ok(Json(state.store.get_request(ctx.tenant_id, id)?))
}

/// GET /v1/requests/:id/versions — the request's immutable snapshots.
async fn list_versions(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<Vec<CertificateVersion>>, AppError> {
    state.store.get_request(ctx.tenant_id, id)?;
    Ok(Json(state.store.versions_for(id)))
}

/// GET /v1/requests/:id/logs — the request's action log.
async fn list_logs(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    state.store.get_request(ctx.tenant_id, id)?;
    Ok(Json(state.store.logs_for(id)))
}

/// POST /v1/requests/:id/items — add a line item.
async fn add_item(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
    Json(body): Json<AddItemBody>,
) -> Result<(StatusCode, Json<RequestItem>), AppError> {
    if body.product_name.trim().is_empty() {
        return Err(AppError::Validation("product_name must not be empty".into()));
    }
    let item = state.store.add_item(
        ctx.tenant_id,
        id,
        NewItem {
            product_name: body.product_name,
            brand: body.brand,
            origin_country: body.origin_country,
            net_weight_kg: body.net_weight_kg,
            translations: body.translations,
        },
        ctx.user_id,
        Timestamp::now(),
    )?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /v1/requests/:id/items — list line items.
async fn list_items(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<Vec<RequestItem>>, AppError> {
    Ok(Json(state.store.list_items(ctx.tenant_id, id)?))
}

/// DELETE /v1/requests/:id/items/:item_id — remove a line item.
async fn remove_item(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((id, item_id)): Path<(RequestId, ItemId)>,
) -> Result<StatusCode, AppError> {
    state.store.remove_item(ctx.tenant_id, id, item_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/requests/:id/submit — DRAFT → UNDER_REVIEW.
async fn submit(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<CertificateRequest>, AppError> {
    let request = state
        .store
        .submit_request(ctx.tenant_id, id, ctx.user_id, Timestamp::now())?;
    super::persist_request(&state, &request).await?;
    Ok(Json(request))
}

/// POST /v1/requests/:id/request-payment — UNDER_REVIEW → PAYMENT_PENDING.
async fn request_payment(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<CertificateRequest>, AppError> {
    let request = state
        .store
        .request_payment(ctx.tenant_id, id, ctx.user_id, Timestamp::now())?;
    super::persist_request(&state, &request).await?;
    Ok(Json(request))
}

/// POST /v1/requests/:id/confirm-payment — record the payment
/// collaborator's confirmation.
async fn confirm_payment(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<CertificateRequest>, AppError> {
    let request = state
        .store
        .confirm_payment(ctx.tenant_id, id, ctx.user_id, Timestamp::now())?;
    super::persist_request(&state, &request).await?;
    Ok(Json(request))
}

/// POST /v1/requests/:id/approve — guarded approval.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/approve",
    params(("id" = uuid::Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Approved"),
        (status = 409, description = "Guard failed (audit or payment outstanding)",
            body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn approve(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<Json<CertificateRequest>, AppError> {
    let request = state
        .store
        .approve_request(ctx.tenant_id, id, ctx.user_id, Timestamp::now())?;
    super::persist_request(&state, &request).await?;
    Ok(Json(request))
}

/// POST /v1/requests/:id/reject — reject with a reason.
async fn reject(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<CertificateRequest>, AppError> {
    let request = state.store.reject_request(
        ctx.tenant_id,
        id,
        body.reason,
        ctx.user_id,
        Timestamp::now(),
    )?;
    super::persist_request(&state, &request).await?;
    Ok(Json(request))
}

/// POST /v1/requests/:id/cancel — withdraw before issuance.
async fn cancel(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
    Json(body): Json<ReasonBody>,
) -> Result<Json<CertificateRequest>, AppError> {
    let request = state.store.cancel_request(
        ctx.tenant_id,
        id,
        body.reason,
        ctx.user_id,
        Timestamp::now(),
    )?;
    super::persist_request(&state, &request).await?;
    Ok(Json(request))
}

/// POST /v1/requests/:id/audits — assign a reviewer.
async fn assign_audit(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
    Json(body): Json<AssignAuditBody>,
) -> Result<(StatusCode, Json<Audit>), AppError> {
    let audit = state.store.assign_audit(
        ctx.tenant_id,
        id,
        tcr_core::UserId::from_uuid(body.auditor_user_id),
        ctx.user_id,
        Timestamp::now(),
    )?;
    Ok((StatusCode::CREATED, Json(audit)))
}

/// POST /v1/audits/:id/complete — finish a review favourably.
async fn complete_audit(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<AuditId>,
    body: Option<Json<CompleteAuditBody>>,
) -> Result<Json<Audit>, AppError> {
    let notes = body.and_then(|Json(b)| b.notes);
    let audit = state
        .store
        .complete_audit(ctx.tenant_id, id, notes, ctx.user_id, Timestamp::now())?;
    Ok(Json(audit))
}

/// POST /v1/requests/:id/issue — the atomic issuance transaction.
///
/// Version creation, identifier assignment, and the issued-row insert
/// happen atomically in the store; this handler mirrors all three rows
/// afterwards. Asset generation is a separate, retryable call
/// (`POST /v1/issued/:id/assets`) — it must never gate issuance.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/issue",
    params(("id" = uuid::Uuid, Path, description = "Request ID")),
    responses(
        (status = 201, description = "Certificate issued"),
        (status = 409, description = "Not approved, or already issued",
            body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn issue(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<RequestId>,
) -> Result<(StatusCode, Json<IssuedCertificate>), AppError> {
    let issued = state
        .store
        .issue(ctx.tenant_id, id, ctx.user_id, Timestamp::now())?;

    if let Some(version) = state.store.get_version(issued.version_id) {
        super::persist_version(&state, &version).await?;
    }
    super::persist_issued_insert(&state, &issued).await?;
    let request = state.store.get_request(ctx.tenant_id, id)?;
    super::persist_request(&state, &request).await?;

    Ok((StatusCode::CREATED, Json(issued)))
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

    use crate::test_support::{seeded_state, tenant_app, TestTenant};

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

    async fn create_draft(app: &axum::Router, t: &TestTenant) -> CertificateRequest {
        let resp = app
            .clone()
            .oneshot(post_json(
                "/v1/requests",
                serde_json::json!({
                    "exporter_name": "Al Noor Trading",
                    "importer_name": "Berlin Imports GmbH",
                    "importer_country": "DE",
                    "certificate_type": "origin",
                    "operation_type": "export",
                    "edition_id": t.edition_id,
                    "language_code": "ar"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await
    }

    /// Drive a draft to APPROVED via the audit path, over HTTP.
    async fn approve_via_audit(app: &axum::Router, request: &CertificateRequest) {
        let resp = app
            .clone()
            .oneshot(post_empty(&format!("/v1/requests/{}/submit", request.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/requests/{}/audits", request.id),
                serde_json::json!({ "auditor_user_id": uuid::Uuid::new_v4() }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let audit: Audit = body_json(resp).await;

        let resp = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/audits/{}/complete", audit.id),
                serde_json::json!({ "notes": "all documents in order" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(post_empty(&format!("/v1/requests/{}/approve", request.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_fetch_request() {
        let (state, t) = seeded_state();
        let app = tenant_app(state, &t);
        let created = create_draft(&app, &t).await;
        assert_eq!(created.status, RequestStatus::Draft);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/requests/{}", created.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched: CertificateRequest = body_json(resp).await;
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_fields() {
        let (state, t) = seeded_state();
        let app = tenant_app(state, &t);
        let resp = app
            .oneshot(post_json(
                "/v1/requests",
                serde_json::json!({
                    "exporter_name": "  ",
                    "importer_name": "Berlin Imports GmbH",
                    "importer_country": "DE",
                    "certificate_type": "origin",
                    "operation_type": "export",
                    "edition_id": t.edition_id,
                    "language_code": "ar"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_full_flow_issue_over_http() {
        let (state, t) = seeded_state();
        let app = tenant_app(state, &t);
        let request = create_draft(&app, &t).await;
        approve_via_audit(&app, &request).await;

        let resp = app
            .clone()
            .oneshot(post_empty(&format!("/v1/requests/{}/issue", request.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let issued: IssuedCertificate = body_json(resp).await;
        assert!(issued.certificate_number.as_str().starts_with("GCC-"));

        // A second issue attempt is a 409, not a retry.
        let resp = app
            .clone()
            .oneshot(post_empty(&format!("/v1/requests/{}/issue", request.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_approve_without_audit_is_409() {
        let (state, t) = seeded_state();
        let app = tenant_app(state, &t);
        let request = create_draft(&app, &t).await;
        app.clone()
            .oneshot(post_empty(&format!("/v1/requests/{}/submit", request.id)))
            .await
            .unwrap();

        let resp = app
            .oneshot(post_empty(&format!("/v1/requests/{}/approve", request.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_request_is_404() {
        let (state, t) = seeded_state();
        let app = tenant_app(state, &t);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/requests/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_versions_listed_after_issue() {
        let (state, t) = seeded_state();
        let app = tenant_app(state, &t);
        let request = create_draft(&app, &t).await;
        approve_via_audit(&app, &request).await;
        app.clone()
            .oneshot(post_empty(&format!("/v1/requests/{}/issue", request.id)))
            .await
            .unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/requests/{}/versions", request.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let versions: Vec<CertificateVersion> = body_json(resp).await;
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version_number, 1);
    }
}
