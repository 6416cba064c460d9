//! # Audit Assignments
//!
//! A reviewer assignment on a request, with its own small state machine.
//! A request may only move `UNDER_REVIEW → APPROVED` when at least one of
//! its audits reads `Completed` — the store enforces that guard, this
//! module only models the assignment itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tcr_core::{AuditId, RequestId, Timestamp, UserId};

/// Status of a reviewer assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Assigned, not yet started.
    Assigned,
    /// The reviewer is working through the request.
    InProgress,
    /// Review finished favourably (terminal).
    Completed,
    /// Review finished unfavourably (terminal).
    Rejected,
}

impl AuditStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Errors raised by audit transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Attempted transition is not valid from the current status.
    #[error("invalid audit transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },
}

/// Assignment of a reviewer to a certificate request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub id: AuditId,
    pub request_id: RequestId,
    /// The reviewing official.
    pub auditor: UserId,
    pub status: AuditStatus,
    pub assigned_at: Timestamp,
    /// Set when the audit reaches a terminal status.
    pub finished_at: Option<Timestamp>,
    pub notes: Option<String>,
}

impl Audit {
    /// Create a fresh assignment.
    pub fn new(request_id: RequestId, auditor: UserId, now: Timestamp) -> Self {
        Self {
            id: AuditId::new(),
            request_id,
            auditor,
            status: AuditStatus::Assigned,
            assigned_at: now,
            finished_at: None,
            notes: None,
        }
    }

    /// Begin the review (ASSIGNED → IN_PROGRESS).
    pub fn start(&mut self) -> Result<(), AuditError> {
        self.require(AuditStatus::Assigned, "IN_PROGRESS")?;
        self.status = AuditStatus::InProgress;
        Ok(())
    }

    /// Finish favourably (ASSIGNED or IN_PROGRESS → COMPLETED).
    pub fn complete(&mut self, notes: Option<String>, now: Timestamp) -> Result<(), AuditError> {
        self.require_active("COMPLETED")?;
        self.status = AuditStatus::Completed;
        self.finished_at = Some(now);
        self.notes = notes;
        Ok(())
    }

    /// Finish unfavourably (ASSIGNED or IN_PROGRESS → REJECTED).
    pub fn reject(&mut self, notes: Option<String>, now: Timestamp) -> Result<(), AuditError> {
        self.require_active("REJECTED")?;
        self.status = AuditStatus::Rejected;
        self.finished_at = Some(now);
        self.notes = notes;
        Ok(())
    }

    fn require(&self, expected: AuditStatus, target: &str) -> Result<(), AuditError> {
        if self.status != expected {
            return Err(AuditError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    fn require_active(&self, target: &str) -> Result<(), AuditError> {
        if self.status.is_terminal() {
            return Err(AuditError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }
}
