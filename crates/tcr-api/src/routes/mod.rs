//! # Route Modules
//!
//! | Prefix            | Module          | Domain                       |
//! |-------------------|-----------------|------------------------------|
//! | `/v1/requests/*`  | [`requests`]    | Request lifecycle (tenant)   |
//! | `/v1/corrections/*` | [`corrections`] | Correction workflow (tenant) |
//! | `/v1/issued/*`    | [`issued`]      | Issued documents + assets    |
//! | `/verify*`        | [`verify`]      | Public verification surface  |
//!
//! Tenant routes sit behind the auth middleware; `/verify*` is mounted
//! outside it and stays reachable by anyone holding a QR code.

pub mod corrections;
pub mod issued;
pub mod requests;
pub mod verify;

use tcr_store::{CertificateRequest, CertificateVersion, IssuedCertificate};

use crate::error::AppError;
use crate::state::AppState;

// Write-through persistence helpers. Failure is surfaced to the client
// because an unmirrored in-memory record would be lost on restart,
// causing silent data loss.

pub(crate) async fn persist_request(
    state: &AppState,
    request: &CertificateRequest,
) -> Result<(), AppError> {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::requests::upsert(pool, request).await {
            tracing::error!(request = %request.id, error = %e, "failed to persist request");
            return Err(AppError::Internal(
                "request recorded in-memory but database persist failed".to_string(),
            ));
        }
    }
    Ok(())
}

pub(crate) async fn persist_version(
    state: &AppState,
    version: &CertificateVersion,
) -> Result<(), AppError> {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::versions::insert(pool, version).await {
            tracing::error!(version = %version.id, error = %e, "failed to persist version");
            return Err(AppError::Internal(
                "version recorded in-memory but database persist failed".to_string(),
            ));
        }
    }
    Ok(())
}

pub(crate) async fn persist_issued_insert(
    state: &AppState,
    issued: &IssuedCertificate,
) -> Result<(), AppError> {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::issued::insert(pool, issued).await {
            tracing::error!(issued = %issued.id, error = %e, "failed to persist issued certificate");
            return Err(AppError::Internal(
                "certificate recorded in-memory but database persist failed".to_string(),
            ));
        }
    }
    Ok(())
}

pub(crate) async fn persist_issued_update(
    state: &AppState,
    issued: &IssuedCertificate,
) -> Result<(), AppError> {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::issued::update(pool, issued).await {
            tracing::error!(issued = %issued.id, error = %e, "failed to persist issued update");
            return Err(AppError::Internal(
                "update recorded in-memory but database persist failed".to_string(),
            ));
        }
    }
    Ok(())
}
