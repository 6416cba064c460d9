//! # Certificate Request Lifecycle State Machine
//!
//! Models the lifecycle of a certificate request from authoring through
//! issuance, with side exits for rejection and cancellation.
//!
//! ## States
//!
//! ```text
//! Draft ──▶ UnderReview ──▶ PaymentPending ──▶ Approved ──▶ Issued (terminal)
//!               │    │                │            ▲
//!               │    └────────────────┼────────────┘
//!               │                     │
//!               └──▶ Rejected         └──▶ Rejected (terminal)
//!
//! Cancelled is reachable from every non-terminal state.
//! ```
//!
//! ## Guards
//!
//! - `UnderReview → Approved` requires a completed audit.
//! - `PaymentPending → Approved` requires `payment_status = paid`.
//! - `Approved → Issued` happens only inside the store's issuance
//!   transaction; the entity method is crate-private.
//!
//! `Issued` is terminal for the request itself — further changes flow
//! through [`crate::correction::Correction`], never through the request's
//! own status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tcr_core::{EditionId, IssuedId, ItemId, RequestId, TenantId, Timestamp, UserId};

// ─── Status ──────────────────────────────────────────────────────────

/// The lifecycle status of a certificate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Being authored by the tenant; items are editable.
    Draft,
    /// Submitted and awaiting review/audit.
    UnderReview,
    /// Review passed; awaiting fee payment.
    PaymentPending,
    /// Cleared for issuance.
    Approved,
    /// Review or payment check failed (terminal).
    Rejected,
    /// Withdrawn before issuance (terminal).
    Cancelled,
    /// A certificate has been issued (terminal for the request).
    Issued,
}

impl RequestStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Issued)
    }

    /// Whether the request's content (fields and items) may still change.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::UnderReview)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "DRAFT",
            Self::UnderReview => "UNDER_REVIEW",
            Self::PaymentPending => "PAYMENT_PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Issued => "ISSUED",
        };
        f.write_str(s)
    }
}

/// Payment state of the request's issuance fee. Set by the payment
/// collaborator; this core only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment recorded.
    Unpaid,
    /// A payment was submitted but not yet confirmed.
    Pending,
    /// Payment confirmed by the payment collaborator.
    Paid,
}

/// Kind of trade operation the certificate covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Export,
    ReExport,
    Transit,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by request lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Attempted transition is not valid from the current status.
    #[error("invalid request transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// The request is in a terminal status.
    #[error("request is in terminal status {state}")]
    Terminal {
        /// The terminal status.
        state: String,
    },

    /// Approval from review requires a completed audit.
    #[error("cannot approve: no completed audit on record")]
    AuditIncomplete,

    /// Approval from payment-pending requires confirmed payment.
    #[error("cannot approve: payment not confirmed (status {status})")]
    PaymentOutstanding {
        /// Current payment status.
        status: String,
    },

    /// Items can only change while the request is editable.
    #[error("request is not editable in status {state}")]
    NotEditable {
        /// The current status.
        state: String,
    },
}

// ─── Transition log ──────────────────────────────────────────────────

/// Record of a request status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Status before the transition.
    pub from: RequestStatus,
    /// Status after the transition.
    pub to: RequestStatus,
    /// When the transition occurred.
    pub at: Timestamp,
    /// Free-form reason ("submitted", "audit failed: …").
    pub reason: String,
}

// ─── Line items ──────────────────────────────────────────────────────

/// Per-language display strings for one line item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemTranslation {
    pub product_name: String,
    pub brand: Option<String>,
    pub origin_country: Option<String>,
}

/// One line item of a certificate request — a product/brand/origin/weight
/// snapshot. Owned exclusively by its request and only mutable while the
/// request is editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestItem {
    pub id: ItemId,
    pub request_id: RequestId,
    pub product_name: String,
    pub brand: Option<String>,
    pub origin_country: String,
    /// Net weight as a display string (e.g. "120.5"); snapshots are
    /// rendered, never computed with.
    pub net_weight_kg: String,
    /// Translations keyed by language code ("ar", "en", …).
    #[serde(default)]
    pub translations: HashMap<String, ItemTranslation>,
}

// ─── Request ─────────────────────────────────────────────────────────

/// Validated input for creating a request, supplied by the request-handling
/// layer (already schema-checked before reaching this core).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    /// Display name of the requesting entity (the exporter).
    pub exporter_name: String,
    pub importer_name: String,
    pub importer_country: String,
    /// Certificate kind, e.g. "origin".
    pub certificate_type: String,
    pub operation_type: OperationType,
    pub shipment_condition: Option<String>,
    /// The chosen rendering edition.
    pub edition_id: EditionId,
    /// Document language code.
    pub language_code: String,
}

/// A tenant-scoped application for a certificate — the aggregate root.
///
/// Never physically deleted once issued; cancellation is a status, and an
/// issued request's document lives on as an [`crate::issued::IssuedCertificate`]
/// row with its own cancellation flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub id: RequestId,
    pub tenant_id: TenantId,
    pub exporter_name: String,
    pub importer_name: String,
    pub importer_country: String,
    pub certificate_type: String,
    pub operation_type: OperationType,
    pub shipment_condition: Option<String>,
    pub edition_id: EditionId,
    pub language_code: String,
    /// The reviewing official assigned to this request, if any.
    pub auditor: Option<UserId>,
    pub payment_status: PaymentStatus,
    pub status: RequestStatus,
    /// Set when the request reaches `Issued`.
    pub issue_date: Option<Timestamp>,
    /// The currently printable issued certificate, once issued. Updated
    /// when a correction supersedes the original document.
    pub issued_id: Option<IssuedId>,
    pub created_by: UserId,
    pub created_at: Timestamp,
    /// Ordered log of all status transitions.
    pub transitions: Vec<StatusTransition>,
}

impl CertificateRequest {
    /// Create a new draft request.
    pub fn new(tenant_id: TenantId, created_by: UserId, input: NewRequest, now: Timestamp) -> Self {
        Self {
            id: RequestId::new(),
            tenant_id,
            exporter_name: input.exporter_name,
            importer_name: input.importer_name,
            importer_country: input.importer_country,
            certificate_type: input.certificate_type,
            operation_type: input.operation_type,
            shipment_condition: input.shipment_condition,
            edition_id: input.edition_id,
            language_code: input.language_code,
            auditor: None,
            payment_status: PaymentStatus::Unpaid,
            status: RequestStatus::Draft,
            issue_date: None,
            issued_id: None,
            created_by,
            created_at: now,
            transitions: Vec::new(),
        }
    }

    /// Submit for review (DRAFT → UNDER_REVIEW).
    pub fn submit_for_review(&mut self, now: Timestamp) -> Result<(), RequestError> {
        self.require_status(RequestStatus::Draft, "UNDER_REVIEW")?;
        self.do_transition(RequestStatus::UnderReview, "submitted for review", now);
        Ok(())
    }

    /// Move to fee collection (UNDER_REVIEW → PAYMENT_PENDING).
    pub fn request_payment(&mut self, now: Timestamp) -> Result<(), RequestError> {
        self.require_status(RequestStatus::UnderReview, "PAYMENT_PENDING")?;
        self.do_transition(RequestStatus::PaymentPending, "payment requested", now);
        Ok(())
    }

    /// Approve for issuance.
    ///
    /// From `UnderReview` a completed audit is required; from
    /// `PaymentPending` a confirmed payment is required. The core never
    /// assumes payment success — `payment_status` must already read `Paid`.
    pub fn approve(&mut self, audit_completed: bool, now: Timestamp) -> Result<(), RequestError> {
        if self.status.is_terminal() {
            return Err(RequestError::Terminal {
                state: self.status.to_string(),
            });
        }
        match self.status {
            RequestStatus::UnderReview => {
                if !audit_completed {
                    return Err(RequestError::AuditIncomplete);
                }
            }
            RequestStatus::PaymentPending => {
                if self.payment_status != PaymentStatus::Paid {
                    return Err(RequestError::PaymentOutstanding {
                        status: format!("{:?}", self.payment_status).to_lowercase(),
                    });
                }
            }
            _ => {
                return Err(RequestError::InvalidTransition {
                    from: self.status.to_string(),
                    to: "APPROVED".to_string(),
                });
            }
        }
        self.do_transition(RequestStatus::Approved, "approved", now);
        Ok(())
    }

    /// Reject (UNDER_REVIEW or PAYMENT_PENDING → REJECTED).
    pub fn reject(&mut self, reason: &str, now: Timestamp) -> Result<(), RequestError> {
        if !matches!(
            self.status,
            RequestStatus::UnderReview | RequestStatus::PaymentPending
        ) {
            return Err(RequestError::InvalidTransition {
                from: self.status.to_string(),
                to: "REJECTED".to_string(),
            });
        }
        self.do_transition(RequestStatus::Rejected, reason, now);
        Ok(())
    }

    /// Cancel from any non-terminal status.
    pub fn cancel(&mut self, reason: &str, now: Timestamp) -> Result<(), RequestError> {
        if self.status.is_terminal() {
            return Err(RequestError::Terminal {
                state: self.status.to_string(),
            });
        }
        self.do_transition(RequestStatus::Cancelled, reason, now);
        Ok(())
    }

    /// Record confirmed payment. Allowed while under review or awaiting
    /// payment; the status itself does not move — approval reads the flag.
    pub fn confirm_payment(&mut self, now: Timestamp) -> Result<(), RequestError> {
        if !matches!(
            self.status,
            RequestStatus::UnderReview | RequestStatus::PaymentPending
        ) {
            return Err(RequestError::InvalidTransition {
                from: self.status.to_string(),
                to: self.status.to_string(),
            });
        }
        self.payment_status = PaymentStatus::Paid;
        let _ = now; // confirmation time is carried by the store's action log
        Ok(())
    }

    /// Mark issued (APPROVED → ISSUED). Called only from the store's
    /// issuance transaction, which has already created the version and
    /// issued rows.
    pub(crate) fn mark_issued(
        &mut self,
        issued_id: IssuedId,
        now: Timestamp,
    ) -> Result<(), RequestError> {
        self.require_status(RequestStatus::Approved, "ISSUED")?;
        self.issued_id = Some(issued_id);
        self.issue_date = Some(now);
        self.do_transition(RequestStatus::Issued, "certificate issued", now);
        Ok(())
    }

    /// Whether items and fields may currently change.
    pub fn is_editable(&self) -> bool {
        self.status.is_editable()
    }

    /// Validate that the request is in the expected status.
    fn require_status(&self, expected: RequestStatus, target: &str) -> Result<(), RequestError> {
        if self.status.is_terminal() {
            return Err(RequestError::Terminal {
                state: self.status.to_string(),
            });
        }
        if self.status != expected {
            return Err(RequestError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    /// Record a status transition.
    fn do_transition(&mut self, to: RequestStatus, reason: &str, now: Timestamp) {
        self.transitions.push(StatusTransition {
            from: self.status,
            to,
            at: now,
            reason: reason.to_string(),
        });
        self.status = to;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn new_request() -> CertificateRequest {
        CertificateRequest::new(
            TenantId::new(),
            UserId::new(),
            NewRequest {
                exporter_name: "Al Noor Trading".to_string(),
                importer_name: "Berlin Imports GmbH".to_string(),
                importer_country: "DE".to_string(),
                certificate_type: "origin".to_string(),
                operation_type: OperationType::Export,
                shipment_condition: Some("sea freight".to_string()),
                edition_id: EditionId::new(),
                language_code: "ar".to_string(),
            },
            Timestamp::now(),
        )
    }

    fn approved_request() -> CertificateRequest {
        let mut req = new_request();
        req.submit_for_review(Timestamp::now()).unwrap();
        req.approve(true, Timestamp::now()).unwrap();
        req
    }

    // ── Happy-path lifecycle ─────────────────────────────────────────

    #[test]
    fn test_new_request_is_draft() {
        let req = new_request();
        assert_eq!(req.status, RequestStatus::Draft);
        assert!(req.is_editable());
        assert_eq!(req.payment_status, PaymentStatus::Unpaid);
        assert!(req.issued_id.is_none());
    }

    #[test]
    fn test_draft_to_under_review() {
        let mut req = new_request();
        req.submit_for_review(Timestamp::now()).unwrap();
        assert_eq!(req.status, RequestStatus::UnderReview);
        assert_eq!(req.transitions.len(), 1);
    }

    #[test]
    fn test_under_review_to_approved_with_audit() {
        let mut req = new_request();
        req.submit_for_review(Timestamp::now()).unwrap();
        req.approve(true, Timestamp::now()).unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
    }

    #[test]
    fn test_payment_path_to_approved() {
        let mut req = new_request();
        req.submit_for_review(Timestamp::now()).unwrap();
        req.request_payment(Timestamp::now()).unwrap();
        req.confirm_payment(Timestamp::now()).unwrap();
        req.approve(false, Timestamp::now()).unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
    }

    #[test]
    fn test_approved_to_issued() {
        let mut req = approved_request();
        let issued = IssuedId::new();
        req.mark_issued(issued, Timestamp::now()).unwrap();
        assert_eq!(req.status, RequestStatus::Issued);
        assert_eq!(req.issued_id, Some(issued));
        assert!(req.issue_date.is_some());
        assert!(req.status.is_terminal());
    }

    // ── Guards ───────────────────────────────────────────────────────

    #[test]
    fn test_approve_without_audit_rejected() {
        let mut req = new_request();
        req.submit_for_review(Timestamp::now()).unwrap();
        let err = req.approve(false, Timestamp::now()).unwrap_err();
        assert_eq!(err, RequestError::AuditIncomplete);
        assert_eq!(req.status, RequestStatus::UnderReview);
    }

    #[test]
    fn test_approve_without_payment_rejected() {
        let mut req = new_request();
        req.submit_for_review(Timestamp::now()).unwrap();
        req.request_payment(Timestamp::now()).unwrap();
        let err = req.approve(true, Timestamp::now()).unwrap_err();
        assert!(matches!(err, RequestError::PaymentOutstanding { .. }));
        assert_eq!(req.status, RequestStatus::PaymentPending);
    }

    #[test]
    fn test_cannot_issue_twice() {
        let mut req = approved_request();
        req.mark_issued(IssuedId::new(), Timestamp::now()).unwrap();
        let err = req.mark_issued(IssuedId::new(), Timestamp::now()).unwrap_err();
        assert!(matches!(err, RequestError::Terminal { .. }));
    }

    #[test]
    fn test_cannot_approve_from_draft() {
        let mut req = new_request();
        assert!(req.approve(true, Timestamp::now()).is_err());
    }

    #[test]
    fn test_cannot_submit_twice() {
        let mut req = new_request();
        req.submit_for_review(Timestamp::now()).unwrap();
        assert!(req.submit_for_review(Timestamp::now()).is_err());
    }

    // ── Side exits ───────────────────────────────────────────────────

    #[test]
    fn test_reject_from_review_and_payment() {
        let mut a = new_request();
        a.submit_for_review(Timestamp::now()).unwrap();
        a.reject("incomplete documents", Timestamp::now()).unwrap();
        assert_eq!(a.status, RequestStatus::Rejected);

        let mut b = new_request();
        b.submit_for_review(Timestamp::now()).unwrap();
        b.request_payment(Timestamp::now()).unwrap();
        b.reject("payment window elapsed", Timestamp::now()).unwrap();
        assert_eq!(b.status, RequestStatus::Rejected);
    }

    #[test]
    fn test_cannot_reject_from_draft() {
        let mut req = new_request();
        assert!(req.reject("nope", Timestamp::now()).is_err());
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        for setup in [0, 1, 2, 3] {
            let mut req = new_request();
            let now = Timestamp::now();
            if setup >= 1 {
                req.submit_for_review(now).unwrap();
            }
            if setup >= 2 {
                req.request_payment(now).unwrap();
            }
            if setup >= 3 {
                req.confirm_payment(now).unwrap();
                req.approve(false, now).unwrap();
            }
            req.cancel("withdrawn", now).unwrap();
            assert_eq!(req.status, RequestStatus::Cancelled);
        }
    }

    #[test]
    fn test_cannot_cancel_terminal() {
        let mut req = approved_request();
        req.mark_issued(IssuedId::new(), Timestamp::now()).unwrap();
        assert!(req.cancel("too late", Timestamp::now()).is_err());
    }

    // ── Editability ──────────────────────────────────────────────────

    #[test]
    fn test_editable_only_while_draft_or_review() {
        let mut req = new_request();
        assert!(req.is_editable());
        req.submit_for_review(Timestamp::now()).unwrap();
        assert!(req.is_editable());
        req.approve(true, Timestamp::now()).unwrap();
        assert!(!req.is_editable());
    }

    // ── Serialization ────────────────────────────────────────────────

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::UnderReview).unwrap(),
            "\"under_review\""
        );
        assert_eq!(
            serde_json::to_string(&RequestStatus::PaymentPending).unwrap(),
            "\"payment_pending\""
        );
    }

    #[test]
    fn test_request_serde_roundtrip() {
        let req = approved_request();
        let json = serde_json::to_string(&req).unwrap();
        let parsed: CertificateRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, req.status);
        assert_eq!(parsed.id, req.id);
        assert_eq!(parsed.transitions.len(), req.transitions.len());
    }
}
