//! # Certificate Action Log
//!
//! Append-only log of lifecycle actions, written by every store mutation.
//! Distinct from the per-request transition list: the log spans all
//! requests and also records non-transition actions (payment
//! confirmations, asset generation, corrections).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tcr_core::{RequestId, Timestamp, UserId};

/// The action a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Create,
    Submit,
    AuditAssigned,
    AuditCompleted,
    AuditRejected,
    PaymentRequested,
    PaymentConfirmed,
    Approve,
    Reject,
    Cancel,
    Issue,
    CorrectionSubmitted,
    CorrectionApproved,
    CorrectionRejected,
    CorrectionCompleted,
    AssetsGenerated,
    CertificateCancelled,
}

/// One action-log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub request_id: RequestId,
    pub action: LogAction,
    /// The acting user, when the action had one (asset regeneration may
    /// be system-triggered).
    pub actor: Option<UserId>,
    /// Free-form detail, e.g. the certificate number on `Issue`.
    pub detail: String,
    pub at: Timestamp,
}

impl LogEntry {
    /// Create an entry.
    pub fn new(
        request_id: RequestId,
        action: LogAction,
        actor: Option<UserId>,
        detail: impl Into<String>,
        at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            action,
            actor,
            detail: detail.into(),
            at,
        }
    }
}
