//! # Issued Certificate Routes
//!
//! Tenant-facing operations on issued documents: listing, cancellation,
//! and on-demand asset generation/repair.
//!
//! ## Endpoints
//!
//! - `GET  /v1/issued` — the tenant's issued certificates
//! - `GET  /v1/issued/:id`
//! - `POST /v1/issued/:id/assets` — run the asset pipeline (idempotent)
//! - `POST /v1/issued/:id/cancel`

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use tcr_core::{IssuedId, Timestamp};
use tcr_store::IssuedCertificate;

use tcr_assets::EnsuredAssets;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

/// Body for `POST /v1/issued/:id/cancel`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelBody {
    pub reason: String,
}

/// Build the issued-certificates router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/issued", get(list_issued))
        .route("/v1/issued/:id", get(get_issued))
        .route("/v1/issued/:id/assets", post(ensure_assets))
        .route("/v1/issued/:id/cancel", post(cancel))
}

/// GET /v1/issued — list the tenant's issued certificates.
async fn list_issued(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Json<Vec<IssuedCertificate>> {
    Json(state.store.list_issued(ctx.tenant_id))
}

/// GET /v1/issued/:id — fetch one issued certificate.
async fn get_issued(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<IssuedId>,
) -> Result<Json<IssuedCertificate>, AppError> {
    Ok(Json(state.store.get_issued(ctx.tenant_id, id)?))
}

/// POST /v1/issued/:id/assets — produce or repair the QR and PDF.
///
/// Idempotent and always safe to retry; degraded steps appear in the
/// response's `warnings` with dynamic fallback references instead of
/// failing the call.
#[utoipa::path(
    post,
    path = "/v1/issued/{id}/assets",
    params(("id" = uuid::Uuid, Path, description = "Issued certificate ID")),
    responses(
        (status = 200, description = "Asset references (file-backed or dynamic) + warnings"),
        (status = 404, description = "Unknown issued certificate", body = crate::error::ErrorBody),
    ),
    tag = "issued"
)]
pub(crate) async fn ensure_assets(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<IssuedId>,
) -> Result<Json<EnsuredAssets>, AppError> {
    // Authorize through the tenant scope before the pipeline runs.
    state.store.get_issued(ctx.tenant_id, id)?;

    let ensured = state.pipeline.ensure_assets(id).await?;
    let updated = state.store.get_issued(ctx.tenant_id, id)?;
    super::persist_issued_update(&state, &updated).await?;
    Ok(Json(ensured))
}

/// POST /v1/issued/:id/cancel — cancel in place.
///
/// The row and its identifiers survive; the public verification surface
/// answers `Cancelled` from now on and never serves the document again.
async fn cancel(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<IssuedId>,
    Json(body): Json<CancelBody>,
) -> Result<Json<IssuedCertificate>, AppError> {
    let issued = state.store.cancel_issued(
        ctx.tenant_id,
        id,
        ctx.user_id,
        body.reason,
        Timestamp::now(),
    )?;
    super::persist_issued_update(&state, &issued).await?;
    Ok(Json(issued))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
