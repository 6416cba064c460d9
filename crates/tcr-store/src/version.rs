//! # Certificate Versions
//!
//! An immutable, monotonically numbered snapshot of a request's content,
//! taken at approval and at each correction.
//!
//! ## Invariants
//!
//! - Version numbers for a given request are strictly increasing and
//!   never reused (the store assigns them while holding its write lock).
//! - Once created, a version's snapshot payload is never mutated. The
//!   struct exposes no mutating methods and the store never rewrites a
//!   stored version — corrections append new rows.

use serde::{Deserialize, Serialize};

use tcr_core::{RequestId, Timestamp, UserId, VersionId};

use crate::request::{CertificateRequest, OperationType, RequestItem};

/// Why a version was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionReason {
    /// First snapshot, taken when the request was approved for issuance.
    InitialIssue,
    /// Snapshot taken when an approved correction superseded the content.
    Correction,
}

impl std::fmt::Display for VersionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InitialIssue => "INITIAL_ISSUE",
            Self::Correction => "CORRECTION",
        };
        f.write_str(s)
    }
}

/// The frozen request content carried by a version. Everything the PDF
/// renderer and the public verification page need, denormalized so the
/// document survives later edits to reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub exporter_name: String,
    pub importer_name: String,
    pub importer_country: String,
    pub certificate_type: String,
    pub operation_type: OperationType,
    pub shipment_condition: Option<String>,
    pub language_code: String,
    pub items: Vec<RequestItem>,
}

impl VersionSnapshot {
    /// Freeze the current content of a request and its items.
    pub fn capture(request: &CertificateRequest, items: Vec<RequestItem>) -> Self {
        Self {
            exporter_name: request.exporter_name.clone(),
            importer_name: request.importer_name.clone(),
            importer_country: request.importer_country.clone(),
            certificate_type: request.certificate_type.clone(),
            operation_type: request.operation_type,
            shipment_condition: request.shipment_condition.clone(),
            language_code: request.language_code.clone(),
            items,
        }
    }
}

/// An immutable snapshot of a request at approval or correction time.
///
/// Referenced (not duplicated) by
/// [`crate::issued::IssuedCertificate::version_id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateVersion {
    pub id: VersionId,
    pub request_id: RequestId,
    /// Strictly increasing per request, starting at 1.
    pub version_number: u32,
    pub reason: VersionReason,
    pub snapshot: VersionSnapshot,
    pub approved_by: UserId,
    pub approved_at: Timestamp,
}

impl CertificateVersion {
    /// Create a version. Number assignment is the store's responsibility;
    /// this constructor just records it.
    pub fn new(
        request_id: RequestId,
        version_number: u32,
        reason: VersionReason,
        snapshot: VersionSnapshot,
        approved_by: UserId,
        approved_at: Timestamp,
    ) -> Self {
        Self {
            id: VersionId::new(),
            request_id,
            version_number,
            reason,
            snapshot,
            approved_by,
            approved_at,
        }
    }
}
