//! Certificate request persistence.
//!
//! Requests mutate through their lifecycle, so the mirror upserts: the
//! `status` column tracks the state machine for operational queries, the
//! JSONB record carries the full entity for hydration.

use sqlx::PgPool;
use uuid::Uuid;

use tcr_store::CertificateRequest;

/// Insert or update a request row.
pub async fn upsert(pool: &PgPool, request: &CertificateRequest) -> Result<(), sqlx::Error> {
    let record = super::to_jsonb(request, "certificate request")?;

    sqlx::query(
        "INSERT INTO certificate_requests (id, tenant_id, status, record, created_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO UPDATE SET status = $3, record = $4",
    )
    .bind(request.id.as_uuid())
    .bind(request.tenant_id.as_uuid())
    .bind(request.status.to_string())
    .bind(&record)
    .bind(request.created_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all requests for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CertificateRequest>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RequestRow>(
        "SELECT id, record FROM certificate_requests ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| super::from_jsonb(row.record, "certificate request", &row.id))
        .collect())
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    record: serde_json::Value,
}
