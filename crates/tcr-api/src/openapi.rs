//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into a single spec served at
//! `/openapi.json`. Only the JSON API surface is documented — the public
//! verification endpoints render HTML/PDF and are described in the
//! service README instead.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the tenant-facing API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trade Certificate Registry API",
        version = "0.3.7",
        description = "Issuance, versioning, correction, and asset generation for tenant trade/export certificates.",
        license(name = "BUSL-1.1")
    ),
    paths(
        crate::routes::requests::create_request,
        crate::routes::requests::list_requests,
        crate::routes::requests::approve,
        crate::routes::requests::issue,
        crate::routes::corrections::file_correction,
        crate::routes::corrections::approve,
        crate::routes::issued::ensure_assets,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::requests::CreateRequestBody,
        crate::routes::requests::AddItemBody,
        crate::routes::requests::AssignAuditBody,
        crate::routes::requests::CompleteAuditBody,
        crate::routes::requests::ReasonBody,
        crate::routes::corrections::FileCorrectionBody,
        crate::routes::corrections::CorrectionApprovalResponse,
        crate::routes::issued::CancelBody,
    )),
    tags(
        (name = "requests", description = "Certificate request lifecycle"),
        (name = "corrections", description = "Correction workflow"),
        (name = "issued", description = "Issued documents and derived assets"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — the generated specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
