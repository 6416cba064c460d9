//! # Asset Generation Pipeline
//!
//! `ensure_assets(issued_id)` produces or repairs the two derived assets
//! of an issued certificate and persists their references in one store
//! update. Each step is independently fallback-capable:
//!
//! 1. Build the canonical verification URL from the verification code.
//! 2. QR image: reuse any file already recorded/present; otherwise fetch
//!    a PNG from the external QR service and store it at the
//!    deterministic path `qr/qr_{issued_id}.png`. On failure, reference
//!    the dynamic QR endpoint instead and record a warning.
//! 3. PDF: if the deterministic `pdf/cert_{request}_{issued}.pdf` already
//!    exists, skip rendering entirely. Otherwise resolve a template
//!    (edition candidates, then default), render with the QR reference
//!    embedded, and store the bytes. On renderer failure, reference the
//!    dynamic print endpoint instead and record a warning.
//! 4. Persist whatever references were obtained onto the issued row in
//!    one update; partial success is valid and visible via `warnings`.
//!
//! Concurrent calls for the same issued id may race on the file writes;
//! the skip-if-present checks are authoritative and the writes target the
//! same deterministic names, so a duplicate render overwrites an
//! equivalent file rather than corrupting state.

use std::sync::Arc;

use tcr_core::{IssuedId, RequestId, Timestamp, VerificationCode};
use tcr_store::{AssetContext, AssetRef, CertificateStore};

use crate::config::AssetConfig;
use crate::error::{AssetError, AssetWarning};
use crate::qr::{QrClient, QrError};
use crate::renderer::{HttpPdfRenderer, PdfRenderer, RenderContext, RenderItem};
use crate::template::{TemplateCatalog, TemplateError};

/// Failure to construct the pipeline's HTTP collaborators.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("QR client init failed: {0}")]
    Qr(#[from] QrError),
    #[error("renderer init failed: {0}")]
    Renderer(#[from] crate::renderer::RenderError),
}

/// Result of an `ensure_assets` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnsuredAssets {
    pub issued_id: IssuedId,
    pub qr: AssetRef,
    pub pdf: AssetRef,
    /// One entry per degraded step; empty means both assets are
    /// file-backed.
    pub warnings: Vec<AssetWarning>,
}

/// The asset generation pipeline.
///
/// Holds its storage handle and collaborator clients explicitly — no
/// ambient globals — so tests can swap the renderer and point the QR
/// client at a local mock.
#[derive(Clone)]
pub struct AssetPipeline {
    store: CertificateStore,
    qr: QrClient,
    renderer: Arc<dyn PdfRenderer>,
    templates: TemplateCatalog,
    config: AssetConfig,
}

impl AssetPipeline {
    /// Build the production pipeline from configuration.
    pub fn new(store: CertificateStore, config: AssetConfig) -> Result<Self, InitError> {
        let renderer = HttpPdfRenderer::new(
            config.renderer_url.clone(),
            config.renderer_token.clone(),
            config.timeout_secs,
        )?;
        Self::with_renderer(store, config, Arc::new(renderer))
    }

    /// Build a pipeline with an explicit renderer (the test seam).
    pub fn with_renderer(
        store: CertificateStore,
        config: AssetConfig,
        renderer: Arc<dyn PdfRenderer>,
    ) -> Result<Self, InitError> {
        let qr = QrClient::new(
            config.qr_service_url.clone(),
            config.qr_pixel_size,
            config.timeout_secs,
        )?;
        Ok(Self {
            store,
            qr,
            renderer,
            templates: TemplateCatalog::builtin(),
            config,
        })
    }

    /// Replace the template catalog (bootstrap-time configuration).
    pub fn with_templates(mut self, templates: TemplateCatalog) -> Self {
        self.templates = templates;
        self
    }

    /// Produce or repair the QR image and PDF for an issued certificate.
    ///
    /// Idempotent; never invoked from inside issuance. See the module
    /// docs for the step-by-step contract.
    pub async fn ensure_assets(&self, issued_id: IssuedId) -> Result<EnsuredAssets, AssetError> {
        let ctx = self.store.asset_context(issued_id)?;
        let code = ctx.issued.verification_code.clone();
        let verification_url = self.config.verification_url(&code);
        let mut warnings = Vec::new();

        let qr = self.ensure_qr(&ctx, &verification_url, &code, &mut warnings).await;
        let pdf = self
            .ensure_pdf(&ctx, &verification_url, &code, &qr, &mut warnings)
            .await;

        let updated = self
            .store
            .update_assets(issued_id, qr, pdf, Timestamp::now())?;

        tracing::info!(
            issued = %issued_id,
            warnings = warnings.len(),
            "assets ensured"
        );
        Ok(EnsuredAssets {
            issued_id,
            qr: updated.qr_code.unwrap_or(AssetRef::Dynamic(qr_fallback(&code))),
            pdf: updated.pdf.unwrap_or(AssetRef::Dynamic(print_fallback(&code))),
            warnings,
        })
    }

    /// Fetch QR PNG bytes for a code on demand — the backend of the
    /// dynamic QR fallback endpoint. No file is written; the caller
    /// streams the bytes straight through.
    pub async fn render_qr_live(&self, code: &VerificationCode) -> Result<Vec<u8>, QrError> {
        self.qr.fetch_png(&self.config.verification_url(code)).await
    }

    /// Step 2: the QR image.
    async fn ensure_qr(
        &self,
        ctx: &AssetContext,
        verification_url: &str,
        code: &VerificationCode,
        warnings: &mut Vec<AssetWarning>,
    ) -> AssetRef {
        // Reuse whatever file-backed reference is already good.
        if let Some(recorded @ AssetRef::File(rel)) = &ctx.issued.qr_code {
            if self.config.storage_root.join(rel).exists() {
                return recorded.clone();
            }
        }
        let rel = qr_relative(ctx.issued.id);
        if self.config.storage_root.join(&rel).exists() {
            return AssetRef::File(rel);
        }

        match self.qr.fetch_png(verification_url).await {
            Ok(bytes) => match self.write_asset(&rel, &bytes).await {
                Ok(()) => AssetRef::File(rel),
                Err(e) => {
                    tracing::warn!(issued = %ctx.issued.id, error = %e, "QR write failed");
                    warnings.push(AssetWarning::QrWriteFailed {
                        detail: e.to_string(),
                    });
                    AssetRef::Dynamic(qr_fallback(code))
                }
            },
            Err(e) => {
                tracing::warn!(issued = %ctx.issued.id, error = %e, "QR fetch failed");
                warnings.push(AssetWarning::QrFetchFailed {
                    detail: e.to_string(),
                });
                AssetRef::Dynamic(qr_fallback(code))
            }
        }
    }

    /// Step 3: the rendered PDF.
    async fn ensure_pdf(
        &self,
        ctx: &AssetContext,
        verification_url: &str,
        code: &VerificationCode,
        qr: &AssetRef,
        warnings: &mut Vec<AssetWarning>,
    ) -> AssetRef {
        let rel = pdf_relative(ctx.request_id, ctx.issued.id);
        // Never re-render an unchanged, already-rendered document.
        if self.config.storage_root.join(&rel).exists() {
            return AssetRef::File(rel);
        }

        let candidates = ctx
            .edition
            .as_ref()
            .map(|e| e.template_candidates())
            .unwrap_or_default();
        let template = match self.templates.resolve(&candidates) {
            Ok(spec) => spec,
            Err(TemplateError::NoUsableTemplate { tried }) => {
                tracing::error!(issued = %ctx.issued.id, ?tried, "no usable certificate template");
                warnings.push(AssetWarning::TemplateMissing { tried });
                return AssetRef::Dynamic(print_fallback(code));
            }
        };

        let context = self.render_context(ctx, verification_url, qr);
        match self.renderer.render(template, &context).await {
            Ok(bytes) => match self.write_asset(&rel, &bytes).await {
                Ok(()) => AssetRef::File(rel),
                Err(e) => {
                    tracing::warn!(issued = %ctx.issued.id, error = %e, "PDF write failed");
                    warnings.push(AssetWarning::PdfWriteFailed {
                        detail: e.to_string(),
                    });
                    AssetRef::Dynamic(print_fallback(code))
                }
            },
            Err(e) => {
                tracing::warn!(issued = %ctx.issued.id, error = %e, "PDF render failed");
                warnings.push(AssetWarning::PdfRenderFailed {
                    detail: e.to_string(),
                });
                AssetRef::Dynamic(print_fallback(code))
            }
        }
    }

    /// Assemble the renderer context from the version snapshot.
    fn render_context(
        &self,
        ctx: &AssetContext,
        verification_url: &str,
        qr: &AssetRef,
    ) -> RenderContext {
        let qr_reference = match qr {
            AssetRef::File(rel) => self.config.storage_root.join(rel).display().to_string(),
            AssetRef::Dynamic(endpoint) => format!(
                "{}{endpoint}",
                self.config.public_base_url.as_str().trim_end_matches('/')
            ),
        };
        RenderContext {
            certificate_number: ctx.issued.certificate_number.to_string(),
            issued_at: ctx.issued.issued_at.to_iso8601(),
            printable_until: ctx.issued.printable_until.to_iso8601(),
            exporter_name: ctx.snapshot.exporter_name.clone(),
            importer_name: ctx.snapshot.importer_name.clone(),
            importer_country: ctx.snapshot.importer_country.clone(),
            certificate_type: ctx.snapshot.certificate_type.clone(),
            language_code: ctx.snapshot.language_code.clone(),
            verification_url: verification_url.to_string(),
            qr_reference,
            items: ctx
                .snapshot
                .items
                .iter()
                .map(|i| RenderItem {
                    product_name: i.product_name.clone(),
                    brand: i.brand.clone(),
                    origin_country: i.origin_country.clone(),
                    net_weight_kg: i.net_weight_kg.clone(),
                })
                .collect(),
        }
    }

    /// Write bytes under the storage root, creating parent directories.
    async fn write_asset(&self, rel: &str, bytes: &[u8]) -> std::io::Result<()> {
        let abs = self.config.storage_root.join(rel);
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&abs, bytes).await
    }
}

/// Deterministic QR path for an issued certificate, relative to the
/// storage root.
pub fn qr_relative(issued_id: IssuedId) -> String {
    format!("qr/qr_{issued_id}.png")
}

/// Deterministic PDF path for an issued certificate, relative to the
/// storage root.
pub fn pdf_relative(request_id: RequestId, issued_id: IssuedId) -> String {
    format!("pdf/cert_{request_id}_{issued_id}.pdf")
}

/// Dynamic on-demand QR endpoint for a verification code.
pub fn qr_fallback(code: &VerificationCode) -> String {
    format!("/verify/qr?code={code}")
}

/// Dynamic on-demand print endpoint for a verification code.
pub fn print_fallback(code: &VerificationCode) -> String {
    format!("/verify/print?code={code}")
}

// ─── Tests ───────────────────────────────────────────────────────────
