//! # Issued Certificates
//!
//! The public document record. Created exactly once per version inside the
//! store's issuance transaction; cancelled in place (never deleted) so the
//! audit trail survives.
//!
//! ## Invariants
//!
//! - `certificate_number` and `verification_code` are immutable for the
//!   lifetime of the row — the struct offers no way to change them.
//! - `qr_code` / `pdf` asset references may be (re)computed idempotently
//!   by the asset pipeline, but the identifiers never move.

use serde::{Deserialize, Serialize};

use tcr_core::{CertificateNumber, IssuedId, Timestamp, UserId, VerificationCode, VersionId};

/// How long an issued certificate stays printable, in days.
pub const PRINTABLE_DAYS: i64 = 365;

/// Reference to a derived asset (QR image or rendered PDF).
///
/// A tagged union instead of a bare path string: callers branch on the
/// variant, never on string shape. `File` points at a produced artifact on
/// disk; `Dynamic` points at an endpoint that produces the asset on demand
/// (the fallback when the external QR or PDF service was unavailable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum AssetRef {
    /// A produced file, path relative to the asset storage root.
    File(String),
    /// An endpoint path that renders the asset on demand.
    Dynamic(String),
}

impl AssetRef {
    /// Whether this reference is file-backed.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// The file path, when file-backed.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::File(path) => Some(path),
            Self::Dynamic(_) => None,
        }
    }

    /// The inner reference string, whichever variant.
    pub fn as_str(&self) -> &str {
        match self {
            Self::File(s) | Self::Dynamic(s) => s,
        }
    }
}

/// Cancellation metadata recorded on an issued certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_by: UserId,
    pub cancelled_at: Timestamp,
    pub reason: String,
}

/// An issued certificate — the public, verifiable document record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCertificate {
    pub id: IssuedId,
    /// The version whose snapshot this document renders.
    pub version_id: VersionId,
    /// Globally unique, assigned exactly once.
    pub certificate_number: CertificateNumber,
    /// Globally unique, cryptographically unguessable, assigned exactly once.
    pub verification_code: VerificationCode,
    /// QR image reference; `None` until the asset pipeline has run.
    pub qr_code: Option<AssetRef>,
    /// Rendered PDF reference; `None` until the asset pipeline has run.
    pub pdf: Option<AssetRef>,
    pub issued_at: Timestamp,
    /// Expiry horizon: after this instant the document may no longer be
    /// downloaded, though its metadata stays verifiable.
    pub printable_until: Timestamp,
    pub issued_by: UserId,
    pub language_code: String,
    pub is_cancelled: bool,
    pub cancellation: Option<Cancellation>,
}

impl IssuedCertificate {
    /// Create a freshly issued certificate. Called only from the store's
    /// issuance transaction.
    pub(crate) fn new(
        version_id: VersionId,
        certificate_number: CertificateNumber,
        verification_code: VerificationCode,
        issued_by: UserId,
        language_code: String,
        now: Timestamp,
    ) -> Self {
        Self {
            id: IssuedId::new(),
            version_id,
            certificate_number,
            verification_code,
            qr_code: None,
            pdf: None,
            issued_at: now,
            printable_until: now.add_days(PRINTABLE_DAYS),
            issued_by,
            language_code,
            is_cancelled: false,
            cancellation: None,
        }
    }

    /// Whether the printability horizon has passed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.printable_until < now
    }

    /// Cancel in place. The row survives for audit purposes; the
    /// verification surface will answer `Cancelled` from now on.
    pub(crate) fn cancel(&mut self, by: UserId, reason: String, now: Timestamp) {
        self.is_cancelled = true;
        self.cancellation = Some(Cancellation {
            cancelled_by: by,
            cancelled_at: now,
            reason,
        });
    }

    /// Clamp printability to `at`. Used when a correction supersedes this
    /// document with a fresh issuance — the old document stays verifiable
    /// but immediately stops being printable.
    pub(crate) fn clamp_printable_until(&mut self, at: Timestamp) {
        if self.printable_until > at {
            self.printable_until = at;
        }
    }

    /// Record the asset references produced by the pipeline, in one update.
    pub(crate) fn set_assets(&mut self, qr: AssetRef, pdf: AssetRef) {
        self.qr_code = Some(qr);
        self.pdf = Some(pdf);
    }
}
