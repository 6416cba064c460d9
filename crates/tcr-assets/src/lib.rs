//! # tcr-assets — Derived-Asset Pipeline
//!
//! Given an issued certificate, produces (or repairs) its two derived
//! assets: the QR image pointing at the public verification URL, and the
//! rendered PDF document.
//!
//! ## Contract
//!
//! [`AssetPipeline::ensure_assets`] is safe to call any number of times
//! for the same issued id — already-present files are reused, never
//! re-rendered — and it never blocks or fails issuance: the pipeline runs
//! *after* issuance succeeds and may be re-invoked later to repair
//! missing assets.
//!
//! ## Failure semantics
//!
//! External-service errors (QR fetch, PDF render) are recoverable: the
//! affected asset falls back to a dynamic on-demand endpoint reference
//! and the failure is reported in the returned `warnings` — surfaced to
//! the caller instead of only written to a log sink. A missing template
//! is a configuration problem and is reported distinctly from transient
//! fetch/render errors, but it too never fails the call: the certificate
//! row and its identifiers are the source of truth, assets are derived.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod qr;
pub mod renderer;
pub mod template;

pub use config::{AssetConfig, ConfigError};
pub use error::{AssetError, AssetWarning};
pub use pipeline::{AssetPipeline, EnsuredAssets, InitError};
pub use qr::{QrClient, QrError};
pub use renderer::{HttpPdfRenderer, PdfRenderer, RenderContext, RenderError, RenderItem};
pub use template::{TemplateCatalog, TemplateError, TemplateSpec};
