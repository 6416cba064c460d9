//! # Error Types — Shared Validation Errors
//!
//! Defines the validation errors raised by `tcr-core` constructors. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! Lifecycle and storage errors live in `tcr-store`; this crate only knows
//! about malformed primitives.

use thiserror::Error;

/// Validation failure when constructing a core primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Certificate number does not match the expected shape.
    #[error("invalid certificate number {0:?}: expected uppercase segments joined by dashes")]
    InvalidCertificateNumber(String),

    /// Verification code does not match the expected shape.
    #[error("invalid verification code: expected VC- prefix followed by at least 16 alphanumeric characters")]
    InvalidVerificationCode,

    /// Timestamp string could not be parsed or is not UTC.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A template code used for number formatting is malformed.
    #[error("invalid template code {0:?}: expected 2-16 ASCII alphanumeric characters")]
    InvalidTemplateCode(String),
}
