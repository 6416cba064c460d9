//! # PDF Renderer
//!
//! The rendering seam: [`PdfRenderer`] is the trait the pipeline calls,
//! [`HttpPdfRenderer`] is the production implementation posting a
//! template code plus a structured context to the rendering service and
//! expecting raw PDF bytes back. Tests swap in an in-process mock.
//!
//! The trait returns boxed futures so the pipeline can hold a
//! `dyn PdfRenderer` without committing the whole service stack to a
//! generic parameter.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::template::TemplateSpec;

/// PDF file signature (`%PDF`).
const PDF_MAGIC: [u8; 4] = [0x25, 0x50, 0x44, 0x46];

/// Minimum plausible size of a rendered document, in bytes.
const MIN_PDF_LEN: usize = 100;

/// Boxed future alias used by the renderer trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from PDF rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("render request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("renderer returned status {status}: {body}")]
    Status {
        status: u16,
        /// Response body, for operator diagnostics.
        body: String,
    },

    /// The body was not a plausible PDF document.
    #[error("renderer returned an invalid document ({0} bytes)")]
    InvalidDocument(usize),
}

/// One line item as rendered on the document.
#[derive(Debug, Clone, Serialize)]
pub struct RenderItem {
    pub product_name: String,
    pub brand: Option<String>,
    pub origin_country: String,
    pub net_weight_kg: String,
}

/// The structured data context handed to the renderer: the issued
/// metadata, the version snapshot's display fields, and the QR asset
/// reference to embed.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub certificate_number: String,
    pub issued_at: String,
    pub printable_until: String,
    pub exporter_name: String,
    pub importer_name: String,
    pub importer_country: String,
    pub certificate_type: String,
    pub language_code: String,
    /// The public verification URL (also encoded in the QR image).
    pub verification_url: String,
    /// Where the renderer finds the QR image: a produced file path or
    /// the on-demand endpoint URL.
    pub qr_reference: String,
    pub items: Vec<RenderItem>,
}

/// The rendering seam used by the pipeline.
pub trait PdfRenderer: Send + Sync {
    /// Render the document for `context` using `template`, returning raw
    /// PDF bytes.
    fn render<'a>(
        &'a self,
        template: &'a TemplateSpec,
        context: &'a RenderContext,
    ) -> BoxFuture<'a, Result<Vec<u8>, RenderError>>;
}

/// Production renderer: posts to the external rendering service.
#[derive(Debug, Clone)]
pub struct HttpPdfRenderer {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

/// Request body for `POST {base}/documents/render`.
#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    template: &'a str,
    page: &'a str,
    direction: &'a str,
    context: &'a RenderContext,
}

impl HttpPdfRenderer {
    /// Build a renderer client with a bounded timeout.
    pub fn new(base_url: Url, token: Option<String>, timeout_secs: u64) -> Result<Self, RenderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    async fn render_inner(
        &self,
        template: &TemplateSpec,
        context: &RenderContext,
    ) -> Result<Vec<u8>, RenderError> {
        let url = format!(
            "{}documents/render",
            ensure_trailing_slash(self.base_url.as_str())
        );
        let body = RenderRequest {
            template: &template.code,
            page: &template.page,
            direction: &template.direction,
            context,
        };

        let mut req = self.http.post(&url).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RenderError::Status { status, body });
        }

        let bytes = resp.bytes().await?.to_vec();
        if bytes.len() < MIN_PDF_LEN || bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
            return Err(RenderError::InvalidDocument(bytes.len()));
        }
        Ok(bytes)
    }
}

impl PdfRenderer for HttpPdfRenderer {
    fn render<'a>(
        &'a self,
        template: &'a TemplateSpec,
        context: &'a RenderContext,
    ) -> BoxFuture<'a, Result<Vec<u8>, RenderError>> {
        Box::pin(self.render_inner(template, context))
    }
}

fn ensure_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

/// A plausible minimal PDF body for tests.
#[cfg(test)]
pub(crate) fn fake_pdf() -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(256, b' ');
    bytes.extend_from_slice(b"\n%%EOF");
    bytes
}
