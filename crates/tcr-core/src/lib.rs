//! # tcr-core — Foundational Types for the Trade Certificate Registry
//!
//! This crate is the bedrock of the registry. It defines the type-system
//! primitives every other crate builds on. Every other crate in the
//! workspace depends on `tcr-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `TenantId`, `RequestId`,
//!    `IssuedId`, `CertificateNumber`, `VerificationCode` — all newtypes
//!    with validated constructors. No bare strings or UUIDs for identifiers.
//!
//! 2. **The two public-facing identifiers are distinct types.** A
//!    `CertificateNumber` (human-legible, sequential) can never be passed
//!    where a `VerificationCode` (unguessable, CSPRNG-drawn) is expected,
//!    and neither is derivable from the other.
//!
//! 3. **UTC-only timestamps.** The `Timestamp` type enforces UTC with Z
//!    suffix and seconds precision everywhere a date crosses a boundary.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tcr-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod error;
pub mod identity;
pub mod idgen;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use error::ValidationError;
pub use identity::{
    AuditId, CertificateNumber, CorrectionId, EditionId, IssuedId, ItemId, RequestId, TenantId,
    UserId, VerificationCode, VersionId,
};
pub use idgen::CertificateNumberFormat;
pub use temporal::Timestamp;
