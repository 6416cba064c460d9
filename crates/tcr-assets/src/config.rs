//! Asset pipeline configuration.
//!
//! Configures the public base URL (embedded in QR codes), the external
//! QR-rendering service, the PDF renderer endpoint, and the local storage
//! root for produced files. Defaults point at production endpoints;
//! override via environment variables or explicit construction for
//! staging/testing.

use std::path::PathBuf;

use url::Url;

use tcr_core::VerificationCode;

/// Configuration for the asset pipeline and its external collaborators.
///
/// Custom `Debug` implementation redacts the renderer token to prevent
/// credential leakage in log output.
#[derive(Clone)]
pub struct AssetConfig {
    /// Public base URL of this deployment; verification URLs embedded in
    /// QR codes are built from it.
    pub public_base_url: Url,
    /// Base URL of the external QR-image service.
    /// Default: <https://api.qrserver.com/v1/create-qr-code/>
    pub qr_service_url: Url,
    /// Pixel size (square) requested from the QR service.
    pub qr_pixel_size: u32,
    /// Base URL of the PDF rendering service.
    pub renderer_url: Url,
    /// Bearer token for the renderer, if it requires one.
    pub renderer_token: Option<String>,
    /// Local directory that produced assets are written under
    /// (`qr/…`, `pdf/…`).
    pub storage_root: PathBuf,
    /// Bounded timeout applied to every external call, in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AssetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetConfig")
            .field("public_base_url", &self.public_base_url)
            .field("qr_service_url", &self.qr_service_url)
            .field("qr_pixel_size", &self.qr_pixel_size)
            .field("renderer_url", &self.renderer_url)
            .field(
                "renderer_token",
                &self.renderer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("storage_root", &self.storage_root)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AssetConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `TCR_PUBLIC_BASE_URL` (default: `http://localhost:8080`)
    /// - `TCR_QR_SERVICE_URL` (default: `https://api.qrserver.com/v1/create-qr-code/`)
    /// - `TCR_QR_PIXEL_SIZE` (default: 200)
    /// - `TCR_RENDERER_URL` (default: `https://templating.tradecert.app`)
    /// - `TCR_RENDERER_TOKEN` (optional)
    /// - `TCR_ASSET_ROOT` (default: `./storage/certificates`)
    /// - `TCR_ASSET_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            public_base_url: env_url("TCR_PUBLIC_BASE_URL", "http://localhost:8080")?,
            qr_service_url: env_url(
                "TCR_QR_SERVICE_URL",
                "https://api.qrserver.com/v1/create-qr-code/",
            )?,
            qr_pixel_size: std::env::var("TCR_QR_PIXEL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200),
            renderer_url: env_url("TCR_RENDERER_URL", "https://templating.tradecert.app")?,
            renderer_token: std::env::var("TCR_RENDERER_TOKEN").ok(),
            storage_root: std::env::var("TCR_ASSET_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage/certificates")),
            timeout_secs: std::env::var("TCR_ASSET_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        })
    }

    /// The public verification URL for a code — the exact string encoded
    /// into the QR image.
    pub fn verification_url(&self, code: &VerificationCode) -> String {
        format!(
            "{}/verify?code={}",
            self.public_base_url.as_str().trim_end_matches('/'),
            code
        )
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcr_core::idgen::new_verification_code;

    fn config(base: &str) -> AssetConfig {
        AssetConfig {
            public_base_url: Url::parse(base).unwrap(),
            qr_service_url: Url::parse("https://api.qrserver.com/v1/create-qr-code/").unwrap(),
            qr_pixel_size: 200,
            renderer_url: Url::parse("http://127.0.0.1:9100").unwrap(),
            renderer_token: Some("secret-token".to_string()),
            storage_root: PathBuf::from("/tmp/assets"),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_verification_url_shape() {
        let code = new_verification_code();
        let cfg = config("https://certs.example.com");
        assert_eq!(
            cfg.verification_url(&code),
            format!("https://certs.example.com/verify?code={code}")
        );
    }

    #[test]
    fn test_verification_url_tolerates_trailing_slash() {
        let code = new_verification_code();
        let cfg = config("https://certs.example.com/");
        assert!(!cfg.verification_url(&code).contains("//verify"));
    }

    #[test]
    fn test_debug_redacts_renderer_token() {
        let shown = format!("{:?}", config("http://localhost:8080"));
        assert!(!shown.contains("secret-token"));
        assert!(shown.contains("REDACTED"));
    }
}
