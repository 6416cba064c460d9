//! Certificate version persistence.
//!
//! Versions are append-only: insert only, no update path. The
//! `(request_id, version_number)` UNIQUE constraint restates the store's
//! strictly-increasing-never-reused invariant at the durable layer.

use sqlx::PgPool;
use uuid::Uuid;

use tcr_store::CertificateVersion;

/// Insert a version row.
pub async fn insert(pool: &PgPool, version: &CertificateVersion) -> Result<(), sqlx::Error> {
    let record = super::to_jsonb(version, "certificate version")?;

    sqlx::query(
        "INSERT INTO certificate_versions (id, request_id, version_number, record)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(version.id.as_uuid())
    .bind(version.request_id.as_uuid())
    .bind(version.version_number as i32)
    .bind(&record)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all versions for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CertificateVersion>, sqlx::Error> {
    let rows = sqlx::query_as::<_, VersionRow>(
        "SELECT id, record FROM certificate_versions ORDER BY version_number",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| super::from_jsonb(row.record, "certificate version", &row.id))
        .collect())
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    record: serde_json::Value,
}
