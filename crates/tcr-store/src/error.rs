//! # Store Error Taxonomy
//!
//! The four failure classes a lifecycle operation can produce. External
//! service failures are deliberately absent — asset generation reports
//! those as warnings, never through this type.

use thiserror::Error;

use tcr_core::ValidationError;

use crate::audit::AuditError;
use crate::correction::CorrectionError;
use crate::request::RequestError;

/// Errors returned by [`crate::store::CertificateStore`] operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The referenced entity does not exist (or belongs to another tenant).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. "request", "issued certificate".
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Malformed or missing input. Rejected before any side effect.
    #[error("validation error: {0}")]
    Validation(String),

    /// The attempted transition is not legal from the current status.
    /// Never silently coerced; the caller sees exactly what was refused.
    #[error("state conflict on {entity}: {reason}")]
    StateConflict {
        /// Entity kind the conflict occurred on.
        entity: &'static str,
        /// What was attempted and why it was refused.
        reason: String,
    },

    /// A uniqueness index rejected a freshly generated identifier. The
    /// issuance transaction has been rolled back; for verification codes
    /// the store already retried once with a fresh code before surfacing
    /// this.
    #[error("identifier collision on {field}")]
    IdentifierCollision {
        /// Which identifier collided: "certificate_number" or
        /// "verification_code".
        field: &'static str,
    },
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RequestError> for StoreError {
    fn from(err: RequestError) -> Self {
        Self::StateConflict {
            entity: "request",
            reason: err.to_string(),
        }
    }
}

impl From<AuditError> for StoreError {
    fn from(err: AuditError) -> Self {
        Self::StateConflict {
            entity: "audit",
            reason: err.to_string(),
        }
    }
}

impl From<CorrectionError> for StoreError {
    fn from(err: CorrectionError) -> Self {
        Self::StateConflict {
            entity: "correction",
            reason: err.to_string(),
        }
    }
}
