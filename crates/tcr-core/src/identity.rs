//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the registry.
//! Each identifier is a distinct type — you cannot pass a [`RequestId`]
//! where a [`VersionId`] is expected.
//!
//! ## Validation
//!
//! The two public-facing identifiers ([`CertificateNumber`],
//! [`VerificationCode`]) validate their format at construction time.
//! UUID-based identifiers are always valid by construction.
//!
//! ## Immutability
//!
//! Once assigned to an issued certificate, a number/code pair is never
//! reassigned or rotated — the uniqueness indexes in `tcr-store` treat
//! these values as permanent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// A tenant organization registered with the platform. Every request,
    /// audit, and issued certificate is scoped to exactly one tenant.
    TenantId
}

uuid_id! {
    /// An acting user (tenant member or reviewing official). Supplied by
    /// the authentication layer; opaque to this core.
    UserId
}

uuid_id! {
    /// A certificate request — the aggregate root of the lifecycle.
    RequestId
}

uuid_id! {
    /// A single line item on a certificate request.
    ItemId
}

uuid_id! {
    /// An immutable snapshot of a request, created at approval or correction.
    VersionId
}

uuid_id! {
    /// An issued certificate — the public document record.
    IssuedId
}

uuid_id! {
    /// A correction filed against an issued or in-review certificate.
    CorrectionId
}

uuid_id! {
    /// A reviewer assignment on a request.
    AuditId
}

uuid_id! {
    /// A certificate edition — a named, versioned rendering template
    /// keyed by scope and language.
    EditionId
}

// ---------------------------------------------------------------------------
// Public-facing identifiers (validated at construction)
// ---------------------------------------------------------------------------

/// The human-legible certificate number printed on the document itself,
/// e.g. `GCC-2026-00042`.
///
/// Globally unique, assigned exactly once at issuance, never reassigned —
/// not even after cancellation. Construction goes through
/// [`CertificateNumber::parse`] or the formatter in [`crate::idgen`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateNumber(String);

impl CertificateNumber {
    /// Maximum accepted length. Numbers are printed on the document and
    /// embedded in filenames; anything longer is a formatting bug.
    pub const MAX_LEN: usize = 64;

    /// Parse and validate a certificate number.
    ///
    /// Accepted shape: uppercase ASCII alphanumeric segments joined by
    /// single dashes, e.g. `GCC-2026-00042`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let valid = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && !s.starts_with('-')
            && !s.ends_with('-')
            && !s.contains("--")
            && s.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ValidationError::InvalidCertificateNumber(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A filesystem/attachment-safe rendition (dashes and alphanumerics
    /// only, which `parse` already guarantees).
    pub fn file_stem(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl std::fmt::Display for CertificateNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The unguessable public token embedded in the QR code, used to look up
/// an issued certificate without authentication.
///
/// Drawn from a CSPRNG at issuance (see [`crate::idgen::new_verification_code`]),
/// never derived from the certificate number or any other public field,
/// and never reassigned. URL-safe by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Prefix carried by every code; lets support staff recognize the
    /// token class in logs and URLs at a glance.
    pub const PREFIX: &'static str = "VC-";

    /// Minimum random suffix length accepted by [`VerificationCode::parse`].
    /// Generated codes use 32 characters (~190 bits); historical imports
    /// carried 16.
    pub const MIN_SUFFIX_LEN: usize = 16;

    /// Parse and validate a verification code.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let suffix = s
            .strip_prefix(Self::PREFIX)
            .ok_or(ValidationError::InvalidVerificationCode)?;
        if suffix.len() < Self::MIN_SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidVerificationCode);
        }
        Ok(Self(s.to_string()))
    }

    /// Construct from a generated suffix. Internal to the generator.
    pub(crate) fn from_suffix(suffix: String) -> Self {
        Self(format!("{}{suffix}", Self::PREFIX))
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
