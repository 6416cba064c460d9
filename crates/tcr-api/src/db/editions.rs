//! Certificate edition persistence.
//!
//! Editions are reference data provisioned at bootstrap; the mirror
//! upserts them so a deployment's catalog survives restarts.

use sqlx::PgPool;
use uuid::Uuid;

use tcr_store::CertificateEdition;

/// Insert or update an edition row.
pub async fn upsert(pool: &PgPool, edition: &CertificateEdition) -> Result<(), sqlx::Error> {
    let record = super::to_jsonb(edition, "certificate edition")?;

    sqlx::query(
        "INSERT INTO certificate_editions (id, record)
         VALUES ($1, $2)
         ON CONFLICT (id) DO UPDATE SET record = $2",
    )
    .bind(edition.id.as_uuid())
    .bind(&record)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all editions for startup hydration.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CertificateEdition>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EditionRow>("SELECT id, record FROM certificate_editions")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| super::from_jsonb(row.record, "certificate edition", &row.id))
        .collect())
}

#[derive(sqlx::FromRow)]
struct EditionRow {
    id: Uuid,
    record: serde_json::Value,
}
