//! # Public Verification Surface
//!
//! The one unauthenticated corner of the API: anyone holding a
//! verification code (typically from a QR scan) can confirm a
//! certificate here. Mounted outside the auth middleware.
//!
//! ## Endpoints
//!
//! - `GET /verify?code=…` — the canonical URL encoded into every QR
//!   image. Streams the PDF for a valid, file-backed document; renders an
//!   HTML informational page otherwise.
//! - `GET /verify/qr?code=…` — renders the QR image on demand (the
//!   dynamic fallback reference recorded when the QR file could not be
//!   produced).
//! - `GET /verify/print?code=…` — on-demand print view (the dynamic
//!   fallback recorded when the PDF could not be rendered).
//!
//! ## Status codes
//!
//! Stable and cache-appropriate: 404 for unknown codes, 410 for
//! cancelled certificates, 200 for everything servable. Unknown and
//! cancelled must never be cached as success by scanners.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use tcr_core::Timestamp;
use tcr_store::AssetRef;
use tcr_verify::VerificationOutcome;

use crate::state::AppState;

/// Query parameter for all three endpoints.
#[derive(Debug, Deserialize)]
pub struct CodeParam {
    #[serde(default)]
    pub code: String,
}

/// Build the public verification router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify", get(verify_page))
        .route("/verify/qr", get(verify_qr))
        .route("/verify/print", get(verify_print))
}

/// GET /verify?code=… — verify and serve.
async fn verify_page(State(state): State<AppState>, Query(params): Query<CodeParam>) -> Response {
    let code = params.code.trim().to_string();
    if code.is_empty() {
        return html(StatusCode::BAD_REQUEST, pages::invalid_code());
    }

    match state.verifier.verify(&code, Timestamp::now()) {
        VerificationOutcome::NotFound => html(StatusCode::NOT_FOUND, pages::not_found(&code)),
        VerificationOutcome::Cancelled { certificate_number } => {
            html(StatusCode::GONE, pages::cancelled(&certificate_number))
        }
        VerificationOutcome::Expired { certificate } => {
            html(StatusCode::OK, pages::info(&certificate, true, None))
        }
        VerificationOutcome::Valid {
            certificate,
            document,
        } => {
            // Stream the file-backed PDF when it really is on disk.
            if let Some(AssetRef::File(rel)) = &document {
                let path = state.asset_config.storage_root.join(rel);
                match tokio::fs::read(&path).await {
                    Ok(bytes) => return pdf_attachment(&certificate.certificate_number, bytes),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "recorded PDF missing on disk; serving info page"
                        );
                    }
                }
            }
            let print_link = format!("/verify/print?code={code}");
            html(StatusCode::OK, pages::info(&certificate, false, Some(&print_link)))
        }
    }
}

/// GET /verify/qr?code=… — render the QR image on demand.
async fn verify_qr(State(state): State<AppState>, Query(params): Query<CodeParam>) -> Response {
    let code = params.code.trim();
    let record = match state.store.resolve_verification(code) {
        Some(record) => record,
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    match state
        .pipeline
        .render_qr_live(&record.issued.verification_code)
        .await
    {
        Ok(bytes) => {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, no-cache"),
            );
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "on-demand QR render failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// GET /verify/print?code=… — on-demand print view.
///
/// Keyed by verification code, never by request id, so the print path is
/// exactly as unguessable as the verification path itself.
async fn verify_print(State(state): State<AppState>, Query(params): Query<CodeParam>) -> Response {
    let code = params.code.trim().to_string();
    match state.verifier.verify(&code, Timestamp::now()) {
        VerificationOutcome::NotFound => html(StatusCode::NOT_FOUND, pages::not_found(&code)),
        VerificationOutcome::Cancelled { certificate_number } => {
            html(StatusCode::GONE, pages::cancelled(&certificate_number))
        }
        VerificationOutcome::Expired { certificate } => {
            html(StatusCode::OK, pages::info(&certificate, true, None))
        }
        VerificationOutcome::Valid { certificate, .. } => {
            let items = state
                .store
                .resolve_verification(&code)
                .and_then(|record| state.store.get_version(record.issued.version_id))
                .map(|version| version.snapshot.items)
                .unwrap_or_default();
            let qr_src = format!("/verify/qr?code={code}");
            html(StatusCode::OK, pages::print_view(&certificate, &items, &qr_src))
        }
    }
}

// ── Response helpers ────────────────────────────────────────────────────────

fn html(status: StatusCode, body: String) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    (status, headers, body).into_response()
}

/// Stream PDF bytes as a named attachment.
fn pdf_attachment(certificate_number: &str, bytes: Vec<u8>) -> Response {
    let filename = format!(
        "certificate_{}.pdf",
        certificate_number.replace(|c: char| !c.is_ascii_alphanumeric(), "_")
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, no-cache"),
    );
    (StatusCode::OK, headers, Body::from(bytes)).into_response()
}

// ── HTML pages ──────────────────────────────────────────────────────────────

mod pages {
    use tcr_store::RequestItem;
    use tcr_verify::CertificateSummary;

    const STYLE: &str = "body{font-family:Arial,sans-serif;max-width:640px;margin:40px auto;\
                         padding:0 16px;background:#f5f5f5;}\
                         .card{background:#fff;border-radius:8px;padding:32px;\
                         box-shadow:0 2px 8px rgba(0,0,0,.1);}\
                         .icon{font-size:56px;text-align:center;margin-bottom:16px;}\
                         h1{text-align:center;color:#333;font-size:22px;}\
                         .status{text-align:center;font-size:18px;font-weight:bold;margin:12px 0 24px;}\
                         table{width:100%;border-collapse:collapse;}\
                         td,th{padding:8px 12px;border-bottom:1px solid #eee;text-align:start;}\
                         td:first-child{color:#888;width:40%;}\
                         .btn{display:block;text-align:center;background:#2c7be5;color:#fff;\
                         padding:12px;border-radius:6px;text-decoration:none;font-size:15px;\
                         margin-top:24px;}";

    /// Minimal HTML escaping for text interpolated into pages.
    pub(super) fn escape(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    fn shell(title: &str, dir: &str, body: String) -> String {
        format!(
            "<!DOCTYPE html><html lang=\"en\" dir=\"{dir}\"><head><meta charset=\"UTF-8\">\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
             <title>{title}</title><style>{STYLE}</style></head><body>{body}</body></html>"
        )
    }

    pub(super) fn invalid_code() -> String {
        shell(
            "Invalid Verification Code",
            "ltr",
            "<div class=\"card\"><div class=\"icon\">&#10060;</div>\
             <h1>Invalid verification code</h1>\
             <p>The verification link is missing its code parameter.</p></div>"
                .to_string(),
        )
    }

    pub(super) fn not_found(code: &str) -> String {
        shell(
            "Certificate Not Found",
            "ltr",
            format!(
                "<div class=\"card\"><div class=\"icon\">&#10060;</div>\
                 <h1 style=\"color:#e74c3c\">Certificate Not Found</h1>\
                 <p>Verification code: <code>{}</code></p>\
                 <p>This certificate could not be verified in our system.</p></div>",
                escape(code)
            ),
        )
    }

    pub(super) fn cancelled(certificate_number: &str) -> String {
        shell(
            "Certificate Cancelled",
            "ltr",
            format!(
                "<div class=\"card\"><div class=\"icon\">&#9888;&#65039;</div>\
                 <h1 style=\"color:#e67e22\">Certificate Cancelled</h1>\
                 <p>Certificate No: <strong>{}</strong></p>\
                 <p>This certificate has been cancelled and is no longer valid.</p></div>",
                escape(certificate_number)
            ),
        )
    }

    /// The informational page for valid and expired certificates. A
    /// print link is offered only when the caller passes one — never for
    /// expired documents.
    pub(super) fn info(
        summary: &CertificateSummary,
        expired: bool,
        print_link: Option<&str>,
    ) -> String {
        let (label, color) = if expired {
            ("&#9888;&#65039; Expired", "#e67e22")
        } else {
            ("&#9989; Valid", "#27ae60")
        };
        let dir = if summary.language_code == "ar" { "rtl" } else { "ltr" };
        let mut body = format!(
            "<div class=\"card\"><div class=\"icon\">&#127941;</div>\
             <h1>Certificate Verification</h1>\
             <div class=\"status\" style=\"color:{color}\">{label}</div>\
             <table>\
             <tr><td>Certificate No.</td><td><strong>{}</strong></td></tr>\
             <tr><td>Issued At</td><td>{}</td></tr>\
             <tr><td>Printable Until</td><td>{}</td></tr>\
             <tr><td>Exporter</td><td>{}</td></tr>\
             <tr><td>Importer</td><td>{}</td></tr>\
             <tr><td>Importer Country</td><td>{}</td></tr>\
             <tr><td>Version</td><td>{}</td></tr>\
             </table>",
            escape(&summary.certificate_number),
            escape(&summary.issued_at),
            escape(&summary.printable_until),
            escape(&summary.exporter_name),
            escape(&summary.importer_name),
            escape(&summary.importer_country),
            summary.version_number,
        );
        if let Some(link) = print_link {
            body.push_str(&format!(
                "<a class=\"btn\" href=\"{}\" target=\"_blank\">&#128196; View / Print Certificate</a>",
                escape(link)
            ));
        }
        body.push_str("</div>");
        shell("Certificate Verification", dir, body)
    }

    /// The on-demand print view: the full document content as HTML, for
    /// the browser's print-to-PDF.
    pub(super) fn print_view(
        summary: &CertificateSummary,
        items: &[RequestItem],
        qr_src: &str,
    ) -> String {
        let dir = if summary.language_code == "ar" { "rtl" } else { "ltr" };
        let rows: String = items
            .iter()
            .map(|item| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape(&item.product_name),
                    escape(item.brand.as_deref().unwrap_or("—")),
                    escape(&item.origin_country),
                    escape(&item.net_weight_kg),
                )
            })
            .collect();
        let body = format!(
            "<div class=\"card\">\
             <h1>Certificate of Origin</h1>\
             <div class=\"status\">No. {}</div>\
             <table>\
             <tr><td>Exporter</td><td>{}</td></tr>\
             <tr><td>Importer</td><td>{}</td></tr>\
             <tr><td>Importer Country</td><td>{}</td></tr>\
             <tr><td>Issued At</td><td>{}</td></tr>\
             </table>\
             <h1 style=\"font-size:16px;margin-top:24px\">Goods</h1>\
             <table><tr><th>Product</th><th>Brand</th><th>Origin</th><th>Net&nbsp;kg</th></tr>{rows}</table>\
             <p style=\"text-align:center;margin-top:24px\">\
             <img src=\"{}\" alt=\"Verification QR\" width=\"160\" height=\"160\"></p>\
             </div>",
            escape(&summary.certificate_number),
            escape(&summary.exporter_name),
            escape(&summary.importer_name),
            escape(&summary.importer_country),
            escape(&summary.issued_at),
            escape(qr_src),
        );
        shell("Certificate of Origin", dir, body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
