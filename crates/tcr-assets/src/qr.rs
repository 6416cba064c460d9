//! Typed client for the external QR-image service.
//!
//! The service renders a PNG for an arbitrary payload URL via
//! `GET {base}?data={url}&size={n}x{n}&format=png`. Every call carries a
//! bounded timeout; a timeout is treated identically to any other fetch
//! failure by the pipeline (fallback + warning), so a slow QR service can
//! never stall a caller indefinitely.

use std::time::Duration;

use url::Url;

/// PNG file signature.
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Errors from the QR service client.
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("QR request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("QR service returned status {0}")]
    Status(u16),

    /// The body was not a plausible PNG image.
    #[error("QR service returned an invalid image ({0} bytes)")]
    InvalidImage(usize),
}

/// Client for the QR-image service.
#[derive(Debug, Clone)]
pub struct QrClient {
    http: reqwest::Client,
    base_url: Url,
    pixel_size: u32,
}

impl QrClient {
    /// Build a client with the given endpoint, image size, and timeout.
    pub fn new(base_url: Url, pixel_size: u32, timeout_secs: u64) -> Result<Self, QrError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url,
            pixel_size,
        })
    }

    /// Fetch a PNG encoding `payload_url`.
    ///
    /// Validates the PNG signature before returning — a 200 with an HTML
    /// error page must not end up stored as `qr_….png`.
    pub async fn fetch_png(&self, payload_url: &str) -> Result<Vec<u8>, QrError> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("data", payload_url)
            .append_pair("size", &format!("{0}x{0}", self.pixel_size))
            .append_pair("format", "png");

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(QrError::Status(resp.status().as_u16()));
        }

        let bytes = resp.bytes().await?.to_vec();
        if bytes.len() < PNG_MAGIC.len() || bytes[..PNG_MAGIC.len()] != PNG_MAGIC {
            return Err(QrError::InvalidImage(bytes.len()));
        }
        Ok(bytes)
    }
}

/// A minimal, valid-enough PNG byte prefix for tests and placeholders.
#[cfg(test)]
pub(crate) fn fake_png() -> Vec<u8> {
    let mut bytes = PNG_MAGIC.to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> QrClient {
        QrClient::new(Url::parse(&server.uri()).unwrap(), 200, 2).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_png_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("format", "png"))
            .and(query_param("size", "200x200"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fake_png()))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let bytes = client
            .fetch_png("https://certs.example.com/verify?code=VC-X")
            .await
            .unwrap();
        assert_eq!(&bytes[..8], &PNG_MAGIC);
    }

    #[tokio::test]
    async fn test_fetch_png_passes_payload_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("data", "https://x.test/verify?code=VC-ABC"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(fake_png()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .fetch_png("https://x.test/verify?code=VC-ABC")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_png("https://x.test/v").await.unwrap_err();
        assert!(matches!(err, QrError::Status(503)));
    }

    #[tokio::test]
    async fn test_html_error_page_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html>quota exceeded</html>"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_png("https://x.test/v").await.unwrap_err();
        assert!(matches!(err, QrError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_a_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(fake_png())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_png("https://x.test/v").await.unwrap_err();
        assert!(matches!(err, QrError::Request(_)));
    }
}
