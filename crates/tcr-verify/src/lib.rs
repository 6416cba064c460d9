//! # tcr-verify — Public Verification Service
//!
//! The public, unauthenticated read path: anyone holding a verification
//! code (typically via a QR scan) can confirm a certificate's
//! authenticity and, policy permitting, retrieve the document.
//!
//! The service is read-only against the lifecycle store and must never
//! leak cancelled or expired documents while still proving legitimacy:
//!
//! - an unknown code answers uniformly `NotFound` — no signal beyond
//!   existence;
//! - a cancelled certificate answers `Cancelled` and **never** carries a
//!   document reference, even if a PDF file physically exists;
//! - an expired certificate answers `Expired` with informational
//!   metadata only;
//! - a valid certificate answers `Valid` with its metadata and whatever
//!   document reference the asset pipeline recorded.

pub mod service;

pub use service::{CertificateSummary, VerificationOutcome, VerificationService};
