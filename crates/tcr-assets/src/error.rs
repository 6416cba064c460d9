//! # Pipeline Errors and Warnings
//!
//! The split matters: [`AssetError`] aborts an `ensure_assets` call (the
//! issued certificate does not exist — nothing to derive assets for),
//! while [`AssetWarning`] reports a degraded step that fell back to a
//! dynamic reference. External-service failure is always a warning,
//! never an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tcr_store::StoreError;

/// Fatal errors from the asset pipeline.
#[derive(Error, Debug)]
pub enum AssetError {
    /// No issued certificate with that id.
    #[error("issued certificate not found: {0}")]
    NotFound(String),

    /// The store rejected a read or the final asset-path update.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AssetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// A degraded-but-recovered step in asset generation. Each warning
/// corresponds to one fallback decision visible in the returned asset
/// references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetWarning {
    /// The external QR service failed (timeout, non-2xx, malformed
    /// image); the QR reference fell back to the on-demand endpoint.
    #[error("QR fetch failed: {detail}")]
    QrFetchFailed { detail: String },

    /// The QR image downloaded but could not be written to storage.
    #[error("QR write failed: {detail}")]
    QrWriteFailed { detail: String },

    /// The PDF renderer failed; the PDF reference fell back to the
    /// on-demand print endpoint.
    #[error("PDF render failed: {detail}")]
    PdfRenderFailed { detail: String },

    /// The rendered PDF could not be written to storage.
    #[error("PDF write failed: {detail}")]
    PdfWriteFailed { detail: String },

    /// No usable template, including the configured default. This is a
    /// configuration error, reported distinctly from transient failures,
    /// but still does not fail the call — the certificate row is the
    /// source of truth.
    #[error("no usable template (tried {tried:?})")]
    TemplateMissing { tried: Vec<String> },
}

impl AssetWarning {
    /// Whether this warning indicates a configuration problem (as opposed
    /// to a transient external failure).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::TemplateMissing { .. })
    }
}
