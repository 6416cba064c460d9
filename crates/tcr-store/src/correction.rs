//! # Corrections
//!
//! A request to amend an already-issued (or in-review) certificate.
//! Corrections never mutate existing versions: an approved, fully-paid
//! correction makes the store cut a fresh version (and, when the
//! certificate was already issued, a fresh issued row superseding the old
//! document's printability).
//!
//! ## Payment gate
//!
//! A correction with `payment_required = true` cannot be approved until
//! `payment_paid` is set by the payment collaborator. The core never
//! assumes payment success — an unpaid approval attempt is a state
//! conflict, not a deferred success.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tcr_core::{CorrectionId, RequestId, Timestamp, UserId};

/// Where the error being corrected originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// The applicant supplied wrong data.
    Applicant,
    /// The issuing authority made the mistake.
    Issuer,
    /// Data corruption or system fault.
    System,
}

/// Status of a correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    /// Filed, not yet picked up.
    Submitted,
    /// Being reviewed.
    UnderReview,
    /// Approved — a new version has been (or is being) cut.
    Approved,
    /// Refused (terminal).
    Rejected,
    /// The corrected document has been produced (terminal).
    Completed,
}

impl CorrectionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }
}

impl std::fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Errors raised by correction transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrectionError {
    /// Attempted transition is not valid from the current status.
    #[error("invalid correction transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// The correction fee has not been confirmed as paid.
    #[error("cannot approve correction: payment required but not confirmed")]
    PaymentOutstanding,
}

/// A correction filed against a certificate request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: CorrectionId,
    pub request_id: RequestId,
    pub requested_by: UserId,
    pub error_source: ErrorSource,
    /// What the applicant wants changed.
    pub description: String,
    pub status: CorrectionStatus,
    pub payment_required: bool,
    pub payment_paid: bool,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Correction {
    /// File a new correction.
    pub fn new(
        request_id: RequestId,
        requested_by: UserId,
        error_source: ErrorSource,
        description: String,
        payment_required: bool,
        now: Timestamp,
    ) -> Self {
        Self {
            id: CorrectionId::new(),
            request_id,
            requested_by,
            error_source,
            description,
            status: CorrectionStatus::Submitted,
            payment_required,
            payment_paid: false,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        }
    }

    /// Pick up for review (SUBMITTED → UNDER_REVIEW).
    pub fn begin_review(&mut self, reviewer: UserId) -> Result<(), CorrectionError> {
        self.require(CorrectionStatus::Submitted, "UNDER_REVIEW")?;
        self.status = CorrectionStatus::UnderReview;
        self.reviewed_by = Some(reviewer);
        Ok(())
    }

    /// Record confirmed payment of the correction fee.
    pub fn confirm_payment(&mut self) {
        self.payment_paid = true;
    }

    /// Approve (UNDER_REVIEW → APPROVED), enforcing the payment gate.
    pub fn approve(&mut self, reviewer: UserId, now: Timestamp) -> Result<(), CorrectionError> {
        self.require(CorrectionStatus::UnderReview, "APPROVED")?;
        if self.payment_required && !self.payment_paid {
            return Err(CorrectionError::PaymentOutstanding);
        }
        self.status = CorrectionStatus::Approved;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        Ok(())
    }

    /// Refuse (UNDER_REVIEW → REJECTED).
    pub fn reject(&mut self, reviewer: UserId, now: Timestamp) -> Result<(), CorrectionError> {
        self.require(CorrectionStatus::UnderReview, "REJECTED")?;
        self.status = CorrectionStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        Ok(())
    }

    /// Mark the corrected document produced (APPROVED → COMPLETED).
    pub fn complete(&mut self) -> Result<(), CorrectionError> {
        self.require(CorrectionStatus::Approved, "COMPLETED")?;
        self.status = CorrectionStatus::Completed;
        Ok(())
    }

    fn require(&self, expected: CorrectionStatus, target: &str) -> Result<(), CorrectionError> {
        if self.status != expected {
            return Err(CorrectionError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }
}
