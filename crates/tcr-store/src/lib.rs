//! # tcr-store — Certificate Lifecycle Store
//!
//! Owns the certificate domain entities and their transition rules:
//!
//! - [`CertificateRequest`] — the aggregate root, with its guarded status
//!   state machine (`draft → under_review → payment_pending → approved →
//!   issued`, side exits to `rejected`/`cancelled`).
//! - [`CertificateVersion`] — immutable, monotonically numbered snapshots
//!   taken at approval and at each correction.
//! - [`IssuedCertificate`] — the public document record, bound to its
//!   certificate number and verification code for life.
//! - [`Correction`] and [`Audit`] — the amendment and review workflows.
//!
//! The [`CertificateStore`] is the single shared mutable resource. The
//! `approved → issued` transition runs as one atomic unit under its write
//! lock: version creation, sequence draw, identifier assignment, and the
//! issued-row insert either all happen or none do. Correction approval
//! reuses the same primitive, so original issuance and re-issuance share
//! one code path.
//!
//! ## Crate Policy
//!
//! - Versions and issued rows are append-only: corrections create new
//!   rows, cancellation is a flag. Nothing is physically deleted once
//!   issued.
//! - Locks are `parking_lot` and never held across `.await` points (the
//!   crate is fully synchronous; async callers wrap it).
//! - No `unwrap()`/`expect()` outside tests.

pub mod audit;
pub mod correction;
pub mod edition;
pub mod error;
pub mod issued;
pub mod log;
pub mod request;
pub mod store;
pub mod version;

pub use audit::{Audit, AuditStatus};
pub use correction::{Correction, CorrectionStatus, ErrorSource};
pub use edition::CertificateEdition;
pub use error::StoreError;
pub use issued::{AssetRef, Cancellation, IssuedCertificate};
pub use log::{LogAction, LogEntry};
pub use request::{
    CertificateRequest, ItemTranslation, NewRequest, OperationType, PaymentStatus, RequestItem,
    RequestStatus,
};
pub use store::{AssetContext, CertificateStore, CorrectionOutcome, NewItem, VerificationRecord};
pub use version::{CertificateVersion, VersionReason, VersionSnapshot};
