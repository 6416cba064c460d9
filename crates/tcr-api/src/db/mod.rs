//! # Persistence Mirror
//!
//! Write-through Postgres mirror of the in-memory store. The database is
//! the durable backstop: its UNIQUE constraints on `certificate_number`,
//! `verification_code`, and `version_id` (one issued row per version)
//! restate the store's in-memory indexes, and the store is hydrated from
//! here on startup.
//!
//! Running without `DATABASE_URL` is supported — the registry then runs
//! in-memory only, which is what tests and local development use.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod editions;
pub mod issued;
pub mod requests;
pub mod versions;

/// Connect to the database named by `DATABASE_URL`, creating the schema
/// when absent. Returns `None` when the variable is unset.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            tracing::info!("DATABASE_URL not set; running without persistence mirror");
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await?;
    ensure_schema(&pool).await?;
    Ok(Some(pool))
}

/// Create the mirror tables when they do not exist yet.
///
/// Each table carries the full record as JSONB plus the columns the
/// relational constraints live on.
async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS certificate_editions (
             id UUID PRIMARY KEY,
             record JSONB NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS certificate_requests (
             id UUID PRIMARY KEY,
             tenant_id UUID NOT NULL,
             status TEXT NOT NULL,
             record JSONB NOT NULL,
             created_at TIMESTAMPTZ NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS certificate_versions (
             id UUID PRIMARY KEY,
             request_id UUID NOT NULL,
             version_number INTEGER NOT NULL,
             record JSONB NOT NULL,
             UNIQUE (request_id, version_number)
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS certificates_issued (
             id UUID PRIMARY KEY,
             version_id UUID NOT NULL UNIQUE,
             certificate_number TEXT NOT NULL UNIQUE,
             verification_code TEXT NOT NULL UNIQUE,
             is_cancelled BOOLEAN NOT NULL DEFAULT FALSE,
             issued_at TIMESTAMPTZ NOT NULL,
             record JSONB NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Serialize a record to the JSONB column, failing loudly — a mirror row
/// that silently dropped fields would corrupt hydration after a restart.
pub(crate) fn to_jsonb<T: serde::Serialize>(
    record: &T,
    what: &'static str,
) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(record).map_err(|e| {
        tracing::error!(error = %e, what, "failed to serialize record for persistence");
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Deserialize a JSONB record on the read path. Undecodable rows are
/// skipped with an ERROR log — hydration prefers a partial mirror to a
/// startup crash, but the operator must investigate.
pub(crate) fn from_jsonb<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    what: &'static str,
    id: &uuid::Uuid,
) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::error!(
                %id,
                error = %e,
                what,
                "undecodable record in database mirror; skipping row — investigate"
            );
            None
        }
    }
}
