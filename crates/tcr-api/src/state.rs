//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! The in-memory [`CertificateStore`] is authoritative for reads and for
//! transition guards; when a database pool is configured, writes are
//! mirrored through the `db` module (write-through) and the store is
//! hydrated from the mirror on startup. Every collaborator is held
//! explicitly — no ambient globals.

use sqlx::PgPool;

use tcr_assets::{AssetConfig, AssetPipeline, InitError};
use tcr_store::CertificateStore;
use tcr_verify::VerificationService;

use crate::auth::SecretToken;

/// Service-level configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Listen port.
    pub port: u16,
    /// Shared service token; `None` disables token checking (dev mode).
    pub auth_token: Option<SecretToken>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: CertificateStore,
    pub pipeline: AssetPipeline,
    pub verifier: VerificationService,
    pub config: AppConfig,
    pub asset_config: AssetConfig,
    /// Optional persistence mirror. Absent means in-memory only.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Assemble the application state from configuration.
    pub fn build(
        config: AppConfig,
        asset_config: AssetConfig,
        db_pool: Option<PgPool>,
    ) -> Result<Self, InitError> {
        let store = CertificateStore::new();
        let pipeline = AssetPipeline::new(store.clone(), asset_config.clone())?;
        let verifier = VerificationService::new(store.clone());
        Ok(Self {
            store,
            pipeline,
            verifier,
            config,
            asset_config,
            db_pool,
        })
    }

    /// Hydrate the in-memory store from the database mirror.
    ///
    /// Called once on startup when a pool is available, so reads stay
    /// fast and synchronous afterwards.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let editions = crate::db::editions::load_all(pool)
            .await
            .map_err(|e| format!("failed to load editions: {e}"))?;
        let requests = crate::db::requests::load_all(pool)
            .await
            .map_err(|e| format!("failed to load requests: {e}"))?;
        let versions = crate::db::versions::load_all(pool)
            .await
            .map_err(|e| format!("failed to load versions: {e}"))?;
        let issued = crate::db::issued::load_all(pool)
            .await
            .map_err(|e| format!("failed to load issued certificates: {e}"))?;

        let counts = (editions.len(), requests.len(), versions.len(), issued.len());
        self.store.hydrate(editions, requests, versions, issued);

        tracing::info!(
            editions = counts.0,
            requests = counts.1,
            versions = counts.2,
            issued = counts.3,
            "hydrated in-memory store from database"
        );
        Ok(())
    }

    /// Seed the built-in edition catalog when the store has none.
    ///
    /// A fresh deployment (no mirror, or an empty one) gets the default
    /// GCC origin editions so requests can be authored immediately.
    /// Editions provisioned by an operator are left untouched.
    pub async fn seed_default_editions(&self) -> Result<(), String> {
        if !self.store.list_editions().is_empty() {
            return Ok(());
        }

        for (code, language, scope) in [("GCC", "ar", "gcc"), ("GCC", "en", "gcc")] {
            let edition = tcr_store::CertificateEdition {
                id: tcr_core::EditionId::new(),
                tenant_id: None,
                code: code.to_string(),
                certificate_type: "origin".to_string(),
                language_code: language.to_string(),
                scope: scope.to_string(),
                template_version: None,
                is_active: true,
            };
            if let Some(pool) = &self.db_pool {
                crate::db::editions::upsert(pool, &edition)
                    .await
                    .map_err(|e| format!("failed to persist edition: {e}"))?;
            }
            self.store.upsert_edition(edition);
        }
        tracing::info!("seeded default edition catalog");
        Ok(())
    }
}
