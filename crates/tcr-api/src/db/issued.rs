//! Issued certificate persistence.
//!
//! The UNIQUE constraints on `certificate_number`, `verification_code`,
//! and `version_id` are the durable race-safety backstop behind the
//! store's in-memory indexes: if a concurrent deployment ever double-
//! issued, the second mirror write fails here and is surfaced to the
//! caller instead of leaving two documents with one identity.
//!
//! Updates only ever touch the cancellation flag and asset references —
//! identifiers are immutable for the lifetime of the row.

use sqlx::PgPool;
use uuid::Uuid;

use tcr_store::IssuedCertificate;

/// Insert a freshly issued certificate row.
pub async fn insert(pool: &PgPool, issued: &IssuedCertificate) -> Result<(), sqlx::Error> {
    let record = super::to_jsonb(issued, "issued certificate")?;

    sqlx::query(
        "INSERT INTO certificates_issued
             (id, version_id, certificate_number, verification_code, is_cancelled, issued_at, record)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(issued.id.as_uuid())
    .bind(issued.version_id.as_uuid())
    .bind(issued.certificate_number.as_str())
    .bind(issued.verification_code.as_str())
    .bind(issued.is_cancelled)
    .bind(issued.issued_at.as_datetime())
    .bind(&record)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a row in place after cancellation, printability clamping, or an
/// asset-reference refresh. Identifier columns are deliberately not in
/// the SET list.
pub async fn update(pool: &PgPool, issued: &IssuedCertificate) -> Result<bool, sqlx::Error> {
    let record = super::to_jsonb(issued, "issued certificate")?;

    let result = sqlx::query(
        "UPDATE certificates_issued SET is_cancelled = $1, record = $2 WHERE id = $3",
    )
    .bind(issued.is_cancelled)
    .bind(&record)
    .bind(issued.id.as_uuid())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all issued certificates for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<IssuedCertificate>, sqlx::Error> {
    let rows = sqlx::query_as::<_, IssuedRow>(
        "SELECT id, record FROM certificates_issued ORDER BY issued_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| super::from_jsonb(row.record, "issued certificate", &row.id))
        .collect())
}

#[derive(sqlx::FromRow)]
struct IssuedRow {
    id: Uuid,
    record: serde_json::Value,
}
