//! # Certificate Store
//!
//! The single shared mutable resource of the lifecycle core. All entities
//! live behind one `parking_lot::RwLock`; the `approved → issued`
//! transition (and its correction-approval twin) runs entirely under the
//! write lock so that version creation, sequence draw, identifier
//! assignment, and the issued-row insert are all-or-nothing.
//!
//! ## Uniqueness enforcement
//!
//! Three indexes are maintained inside the lock and act as the final
//! race-safety backstop, mirroring the relational UNIQUE constraints the
//! API layer's persistence mirror declares:
//!
//! - certificate number → issued id
//! - verification code → issued id
//! - version id → issued id (at most one issued row per version)
//!
//! A verification-code collision rolls the whole issuance back and is
//! retried exactly once with a fresh code. A certificate-number collision
//! is surfaced immediately — the sequence is never re-drawn blindly, so a
//! contention bug shows up as an error instead of a silent gap.
//!
//! ## Build-then-commit
//!
//! Fallible work (validation, formatting, code generation, collision
//! checks) happens against an immutable view first; the inner maps are
//! only touched once every check has passed. A mid-flight failure
//! therefore leaves no partial writes behind.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use tcr_core::idgen::new_verification_code;
use tcr_core::{
    AuditId, CertificateNumberFormat, CorrectionId, EditionId, IssuedId, ItemId, RequestId,
    TenantId, Timestamp, UserId, VersionId,
};

use crate::audit::{Audit, AuditStatus};
use crate::correction::{Correction, ErrorSource};
use crate::edition::CertificateEdition;
use crate::error::StoreError;
use crate::issued::{AssetRef, IssuedCertificate};
use crate::log::{LogAction, LogEntry};
use crate::request::{
    CertificateRequest, ItemTranslation, NewRequest, RequestItem, RequestStatus,
};
use crate::version::{CertificateVersion, VersionReason, VersionSnapshot};

// ─── Input / output types ────────────────────────────────────────────

/// Validated input for adding a line item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub product_name: String,
    pub brand: Option<String>,
    pub origin_country: String,
    pub net_weight_kg: String,
    pub translations: HashMap<String, ItemTranslation>,
}

/// Result of approving a correction: the new version, plus the fresh
/// issued certificate when the request had already been issued.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub correction: Correction,
    pub version: CertificateVersion,
    pub new_issued: Option<IssuedCertificate>,
}

/// Denormalized row served to the verification service: the issued
/// certificate joined with the display fields of its version snapshot.
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    pub issued: IssuedCertificate,
    pub request_id: RequestId,
    pub version_number: u32,
    pub exporter_name: String,
    pub importer_name: String,
    pub importer_country: String,
}

/// Everything the asset pipeline needs to render one certificate.
#[derive(Debug, Clone)]
pub struct AssetContext {
    pub issued: IssuedCertificate,
    pub request_id: RequestId,
    pub edition: Option<CertificateEdition>,
    pub snapshot: VersionSnapshot,
}

// ─── Store ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreInner {
    requests: HashMap<RequestId, CertificateRequest>,
    items: HashMap<RequestId, Vec<RequestItem>>,
    versions: HashMap<VersionId, CertificateVersion>,
    issued: HashMap<IssuedId, IssuedCertificate>,
    corrections: HashMap<CorrectionId, Correction>,
    audits: HashMap<AuditId, Audit>,
    editions: HashMap<EditionId, CertificateEdition>,
    logs: Vec<LogEntry>,
    /// certificate number (string form) → issued id.
    number_index: HashMap<String, IssuedId>,
    /// verification code (string form) → issued id.
    code_index: HashMap<String, IssuedId>,
    /// version id → issued id. At most one issued row per version.
    version_issued: HashMap<VersionId, IssuedId>,
    /// Per-(tenant, template) certificate number sequences.
    sequences: HashMap<(TenantId, String), u64>,
}

/// Thread-safe, cloneable certificate lifecycle store.
///
/// All operations are synchronous; the lock is never held across `.await`
/// points because there are none here. Async callers (the API layer, the
/// asset pipeline) call in and out between their awaits.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    inner: Arc<RwLock<StoreInner>>,
    number_format: CertificateNumberFormat,
}

impl CertificateStore {
    /// Create an empty store with the default number format.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            number_format: CertificateNumberFormat::new(),
        }
    }

    // ── Editions ─────────────────────────────────────────────────────

    /// Register an edition. Editions are reference data: provisioned at
    /// bootstrap, read by issuance and the asset pipeline.
    pub fn upsert_edition(&self, edition: CertificateEdition) {
        self.inner.write().editions.insert(edition.id, edition);
    }

    /// Fetch an edition.
    pub fn get_edition(&self, id: EditionId) -> Option<CertificateEdition> {
        self.inner.read().editions.get(&id).cloned()
    }

    /// All registered editions.
    pub fn list_editions(&self) -> Vec<CertificateEdition> {
        self.inner.read().editions.values().cloned().collect()
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Create a draft request. The referenced edition must exist and be
    /// active.
    pub fn create_request(
        &self,
        tenant: TenantId,
        created_by: UserId,
        input: NewRequest,
        now: Timestamp,
    ) -> Result<CertificateRequest, StoreError> {
        let mut inner = self.inner.write();
        match inner.editions.get(&input.edition_id) {
            Some(edition) if edition.is_active => {}
            Some(_) => {
                return Err(StoreError::Validation(format!(
                    "edition {} is not active",
                    input.edition_id
                )))
            }
            None => {
                return Err(StoreError::Validation(format!(
                    "unknown edition {}",
                    input.edition_id
                )))
            }
        }
        let request = CertificateRequest::new(tenant, created_by, input, now);
        inner.logs.push(LogEntry::new(
            request.id,
            LogAction::Create,
            Some(created_by),
            "request created",
            now,
        ));
        inner.requests.insert(request.id, request.clone());
        Ok(request)
    }

    /// Fetch a request, scoped to its tenant.
    pub fn get_request(
        &self,
        tenant: TenantId,
        id: RequestId,
    ) -> Result<CertificateRequest, StoreError> {
        let inner = self.inner.read();
        scoped_request(&inner, tenant, id).cloned()
    }

    /// List a tenant's requests, optionally filtered by status, newest
    /// first.
    pub fn list_requests(
        &self,
        tenant: TenantId,
        status: Option<RequestStatus>,
    ) -> Vec<CertificateRequest> {
        let inner = self.inner.read();
        let mut out: Vec<CertificateRequest> = inner
            .requests
            .values()
            .filter(|r| r.tenant_id == tenant)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    // ── Items ────────────────────────────────────────────────────────

    /// Add a line item. Only legal while the request is editable.
    pub fn add_item(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        item: NewItem,
        actor: UserId,
        now: Timestamp,
    ) -> Result<RequestItem, StoreError> {
        let mut inner = self.inner.write();
        let request = scoped_request(&inner, tenant, request_id)?;
        require_editable(request)?;
        let row = RequestItem {
            id: ItemId::new(),
            request_id,
            product_name: item.product_name,
            brand: item.brand,
            origin_country: item.origin_country,
            net_weight_kg: item.net_weight_kg,
            translations: item.translations,
        };
        inner.items.entry(request_id).or_default().push(row.clone());
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::Create,
            Some(actor),
            format!("item added: {}", row.product_name),
            now,
        ));
        Ok(row)
    }

    /// Remove a line item. Only legal while the request is editable.
    pub fn remove_item(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        item_id: ItemId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let request = scoped_request(&inner, tenant, request_id)?;
        require_editable(request)?;
        let items = inner.items.entry(request_id).or_default();
        let before = items.len();
        items.retain(|i| i.id != item_id);
        if items.len() == before {
            return Err(StoreError::NotFound {
                entity: "request item",
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    /// List a request's line items.
    pub fn list_items(
        &self,
        tenant: TenantId,
        request_id: RequestId,
    ) -> Result<Vec<RequestItem>, StoreError> {
        let inner = self.inner.read();
        scoped_request(&inner, tenant, request_id)?;
        Ok(inner.items.get(&request_id).cloned().unwrap_or_default())
    }

    // ── Lifecycle transitions ────────────────────────────────────────

    /// Submit a draft for review.
    pub fn submit_request(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        actor: UserId,
        now: Timestamp,
    ) -> Result<CertificateRequest, StoreError> {
        self.with_request(tenant, request_id, |req| {
            req.submit_for_review(now)?;
            Ok((LogAction::Submit, actor, "submitted".to_string()))
        })
    }

    /// Move a reviewed request to fee collection.
    pub fn request_payment(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        actor: UserId,
        now: Timestamp,
    ) -> Result<CertificateRequest, StoreError> {
        self.with_request(tenant, request_id, |req| {
            req.request_payment(now)?;
            Ok((LogAction::PaymentRequested, actor, "payment requested".to_string()))
        })
    }

    /// Record payment confirmation from the payment collaborator.
    pub fn confirm_payment(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        actor: UserId,
        now: Timestamp,
    ) -> Result<CertificateRequest, StoreError> {
        self.with_request(tenant, request_id, |req| {
            req.confirm_payment(now)?;
            Ok((LogAction::PaymentConfirmed, actor, "payment confirmed".to_string()))
        })
    }

    /// Approve a request for issuance. From review this requires a
    /// completed audit on record; from payment-pending it requires the
    /// payment flag.
    pub fn approve_request(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        actor: UserId,
        now: Timestamp,
    ) -> Result<CertificateRequest, StoreError> {
        let mut inner = self.inner.write();
        let audit_done = has_completed_audit(&inner, request_id);
        let request = scoped_request_mut(&mut inner, tenant, request_id)?;
        request.approve(audit_done, now)?;
        let snapshot = request.clone();
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::Approve,
            Some(actor),
            "approved",
            now,
        ));
        Ok(snapshot)
    }

    /// Reject a request under review or awaiting payment.
    pub fn reject_request(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        reason: String,
        actor: UserId,
        now: Timestamp,
    ) -> Result<CertificateRequest, StoreError> {
        self.with_request(tenant, request_id, |req| {
            req.reject(&reason, now)?;
            Ok((LogAction::Reject, actor, reason.clone()))
        })
    }

    /// Cancel a request from any non-terminal status.
    pub fn cancel_request(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        reason: String,
        actor: UserId,
        now: Timestamp,
    ) -> Result<CertificateRequest, StoreError> {
        self.with_request(tenant, request_id, |req| {
            req.cancel(&reason, now)?;
            Ok((LogAction::Cancel, actor, reason.clone()))
        })
    }

    // ── Audits ───────────────────────────────────────────────────────

    /// Assign a reviewer to a request under review.
    pub fn assign_audit(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        auditor: UserId,
        actor: UserId,
        now: Timestamp,
    ) -> Result<Audit, StoreError> {
        let mut inner = self.inner.write();
        let request = scoped_request_mut(&mut inner, tenant, request_id)?;
        if request.status != RequestStatus::UnderReview {
            return Err(StoreError::StateConflict {
                entity: "request",
                reason: format!(
                    "cannot assign audit while request is {}",
                    request.status
                ),
            });
        }
        request.auditor = Some(auditor);
        let audit = Audit::new(request_id, auditor, now);
        inner.audits.insert(audit.id, audit.clone());
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::AuditAssigned,
            Some(actor),
            format!("auditor {auditor} assigned"),
            now,
        ));
        Ok(audit)
    }

    /// Mark an audit completed.
    pub fn complete_audit(
        &self,
        tenant: TenantId,
        audit_id: AuditId,
        notes: Option<String>,
        actor: UserId,
        now: Timestamp,
    ) -> Result<Audit, StoreError> {
        let mut inner = self.inner.write();
        let request_id = {
            let audit = inner.audits.get(&audit_id).ok_or(StoreError::NotFound {
                entity: "audit",
                id: audit_id.to_string(),
            })?;
            audit.request_id
        };
        scoped_request(&inner, tenant, request_id)?;
        let audit = inner
            .audits
            .get_mut(&audit_id)
            .ok_or(StoreError::NotFound {
                entity: "audit",
                id: audit_id.to_string(),
            })?;
        audit.complete(notes, now)?;
        let snapshot = audit.clone();
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::AuditCompleted,
            Some(actor),
            "audit completed",
            now,
        ));
        Ok(snapshot)
    }

    // ── Issuance ─────────────────────────────────────────────────────

    /// Issue a certificate for an approved request.
    ///
    /// One atomic unit: version creation, sequence draw, identifier
    /// assignment, issued-row insert, and the request's `Issued` flip all
    /// happen under a single write lock, or not at all. Re-running on an
    /// already-issued request is rejected with a state conflict — asset
    /// regeneration is the only retryable post-issuance operation.
    pub fn issue(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        issued_by: UserId,
        now: Timestamp,
    ) -> Result<IssuedCertificate, StoreError> {
        let mut inner = self.inner.write();

        let request = scoped_request(&inner, tenant, request_id)?;
        if request.status != RequestStatus::Approved {
            return Err(StoreError::StateConflict {
                entity: "request",
                reason: format!("cannot issue from status {}", request.status),
            });
        }
        let edition = inner
            .editions
            .get(&request.edition_id)
            .ok_or_else(|| StoreError::Validation(format!(
                "unknown edition {}",
                request.edition_id
            )))?;
        let edition_code = edition.code.clone();
        let language = request.language_code.clone();
        let request_snapshot = request.clone();

        // Build everything fallibly before touching the maps.
        let items = inner.items.get(&request_id).cloned().unwrap_or_default();
        let version = CertificateVersion::new(
            request_id,
            next_version_number(&inner, request_id),
            VersionReason::InitialIssue,
            VersionSnapshot::capture(&request_snapshot, items),
            issued_by,
            now,
        );
        let prepared = prepare_issue(
            &self.number_format,
            &inner,
            tenant,
            &edition_code,
            version.id,
            issued_by,
            language,
            now,
        )?;

        // Commit.
        let issued = commit_issue(&mut inner, version, prepared);
        let request = scoped_request_mut(&mut inner, tenant, request_id)?;
        request.mark_issued(issued.id, now)?;
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::Issue,
            Some(issued_by),
            format!("issued as {}", issued.certificate_number),
            now,
        ));

        tracing::info!(
            request = %request_id,
            number = %issued.certificate_number,
            "certificate issued"
        );
        Ok(issued)
    }

    // ── Corrections ──────────────────────────────────────────────────

    /// File a correction against an issued or in-review request.
    pub fn file_correction(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        requested_by: UserId,
        error_source: ErrorSource,
        description: String,
        payment_required: bool,
        now: Timestamp,
    ) -> Result<Correction, StoreError> {
        let mut inner = self.inner.write();
        let request = scoped_request(&inner, tenant, request_id)?;
        if !matches!(
            request.status,
            RequestStatus::Issued | RequestStatus::UnderReview | RequestStatus::PaymentPending
        ) {
            return Err(StoreError::StateConflict {
                entity: "request",
                reason: format!(
                    "corrections only apply to issued or in-review requests (status is {})",
                    request.status
                ),
            });
        }
        let correction = Correction::new(
            request_id,
            requested_by,
            error_source,
            description,
            payment_required,
            now,
        );
        inner.corrections.insert(correction.id, correction.clone());
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::CorrectionSubmitted,
            Some(requested_by),
            "correction filed",
            now,
        ));
        Ok(correction)
    }

    /// Pick a correction up for review.
    pub fn begin_correction_review(
        &self,
        tenant: TenantId,
        correction_id: CorrectionId,
        reviewer: UserId,
    ) -> Result<Correction, StoreError> {
        let mut inner = self.inner.write();
        let request_id = correction_request(&inner, correction_id)?;
        scoped_request(&inner, tenant, request_id)?;
        let correction = inner
            .corrections
            .get_mut(&correction_id)
            .ok_or(StoreError::NotFound {
                entity: "correction",
                id: correction_id.to_string(),
            })?;
        correction.begin_review(reviewer)?;
        Ok(correction.clone())
    }

    /// Record confirmed payment of a correction fee.
    pub fn confirm_correction_payment(
        &self,
        tenant: TenantId,
        correction_id: CorrectionId,
    ) -> Result<Correction, StoreError> {
        let mut inner = self.inner.write();
        let request_id = correction_request(&inner, correction_id)?;
        scoped_request(&inner, tenant, request_id)?;
        let correction = inner
            .corrections
            .get_mut(&correction_id)
            .ok_or(StoreError::NotFound {
                entity: "correction",
                id: correction_id.to_string(),
            })?;
        correction.confirm_payment();
        Ok(correction.clone())
    }

    /// Approve a correction.
    ///
    /// Reuses the issuance primitive: a new version is always cut; when
    /// the request had already been issued, a fresh issued certificate is
    /// created and the superseded document's printability is clamped to
    /// `now`. All under one write lock, all-or-nothing.
    pub fn approve_correction(
        &self,
        tenant: TenantId,
        correction_id: CorrectionId,
        reviewer: UserId,
        now: Timestamp,
    ) -> Result<CorrectionOutcome, StoreError> {
        let mut inner = self.inner.write();

        let request_id = correction_request(&inner, correction_id)?;
        let request = scoped_request(&inner, tenant, request_id)?.clone();

        // Validate the correction transition on a copy first — the payment
        // gate must reject before any version is built.
        let mut correction = inner
            .corrections
            .get(&correction_id)
            .ok_or(StoreError::NotFound {
                entity: "correction",
                id: correction_id.to_string(),
            })?
            .clone();
        correction.approve(reviewer, now)?;

        let items = inner.items.get(&request_id).cloned().unwrap_or_default();
        let version = CertificateVersion::new(
            request_id,
            next_version_number(&inner, request_id),
            VersionReason::Correction,
            VersionSnapshot::capture(&request, items),
            reviewer,
            now,
        );

        let reissue = if request.status == RequestStatus::Issued {
            let edition_code = inner
                .editions
                .get(&request.edition_id)
                .map(|e| e.code.clone())
                .ok_or_else(|| StoreError::Validation(format!(
                    "unknown edition {}",
                    request.edition_id
                )))?;
            Some(prepare_issue(
                &self.number_format,
                &inner,
                tenant,
                &edition_code,
                version.id,
                reviewer,
                request.language_code.clone(),
                now,
            )?)
        } else {
            None
        };

        // Commit.
        let version_snapshot = version.clone();
        let new_issued = match reissue {
            Some(prepared) => {
                let issued = commit_issue(&mut inner, version, prepared);
                // Supersede the previous document's printability.
                if let Some(old_id) = request.issued_id {
                    if let Some(old) = inner.issued.get_mut(&old_id) {
                        old.clamp_printable_until(now);
                    }
                }
                if let Some(stored) = inner.requests.get_mut(&request_id) {
                    stored.issued_id = Some(issued.id);
                }
                Some(issued)
            }
            None => {
                inner.versions.insert(version.id, version);
                None
            }
        };
        inner.corrections.insert(correction_id, correction.clone());
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::CorrectionApproved,
            Some(reviewer),
            match &new_issued {
                Some(doc) => format!("correction approved; reissued as {}", doc.certificate_number),
                None => "correction approved".to_string(),
            },
            now,
        ));

        Ok(CorrectionOutcome {
            correction,
            version: version_snapshot,
            new_issued,
        })
    }

    /// Refuse a correction under review.
    pub fn reject_correction(
        &self,
        tenant: TenantId,
        correction_id: CorrectionId,
        reviewer: UserId,
        now: Timestamp,
    ) -> Result<Correction, StoreError> {
        let mut inner = self.inner.write();
        let request_id = correction_request(&inner, correction_id)?;
        scoped_request(&inner, tenant, request_id)?;
        let correction = inner
            .corrections
            .get_mut(&correction_id)
            .ok_or(StoreError::NotFound {
                entity: "correction",
                id: correction_id.to_string(),
            })?;
        correction.reject(reviewer, now)?;
        let snapshot = correction.clone();
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::CorrectionRejected,
            Some(reviewer),
            "correction rejected",
            now,
        ));
        Ok(snapshot)
    }

    /// Mark a correction's document produced.
    pub fn complete_correction(
        &self,
        tenant: TenantId,
        correction_id: CorrectionId,
        actor: UserId,
        now: Timestamp,
    ) -> Result<Correction, StoreError> {
        let mut inner = self.inner.write();
        let request_id = correction_request(&inner, correction_id)?;
        scoped_request(&inner, tenant, request_id)?;
        let correction = inner
            .corrections
            .get_mut(&correction_id)
            .ok_or(StoreError::NotFound {
                entity: "correction",
                id: correction_id.to_string(),
            })?;
        correction.complete()?;
        let snapshot = correction.clone();
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::CorrectionCompleted,
            Some(actor),
            "correction completed",
            now,
        ));
        Ok(snapshot)
    }

    // ── Issued certificates ──────────────────────────────────────────

    /// Fetch an issued certificate, tenant-scoped through its request.
    pub fn get_issued(
        &self,
        tenant: TenantId,
        issued_id: IssuedId,
    ) -> Result<IssuedCertificate, StoreError> {
        let inner = self.inner.read();
        let issued = inner.issued.get(&issued_id).ok_or(StoreError::NotFound {
            entity: "issued certificate",
            id: issued_id.to_string(),
        })?;
        let request_id = issued_request(&inner, issued)?;
        scoped_request(&inner, tenant, request_id)?;
        Ok(issued.clone())
    }

    /// List a tenant's issued certificates, newest first.
    pub fn list_issued(&self, tenant: TenantId) -> Vec<IssuedCertificate> {
        let inner = self.inner.read();
        let mut out: Vec<IssuedCertificate> = inner
            .issued
            .values()
            .filter(|doc| {
                issued_request(&inner, doc)
                    .ok()
                    .and_then(|rid| inner.requests.get(&rid))
                    .is_some_and(|r| r.tenant_id == tenant)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        out
    }

    /// Cancel an issued certificate in place. The row (and its
    /// identifiers) survive for audit purposes; verification answers
    /// `Cancelled` from now on.
    pub fn cancel_issued(
        &self,
        tenant: TenantId,
        issued_id: IssuedId,
        by: UserId,
        reason: String,
        now: Timestamp,
    ) -> Result<IssuedCertificate, StoreError> {
        let mut inner = self.inner.write();
        let request_id = {
            let issued = inner.issued.get(&issued_id).ok_or(StoreError::NotFound {
                entity: "issued certificate",
                id: issued_id.to_string(),
            })?;
            issued_request(&inner, issued)?
        };
        scoped_request(&inner, tenant, request_id)?;
        let issued = inner
            .issued
            .get_mut(&issued_id)
            .ok_or(StoreError::NotFound {
                entity: "issued certificate",
                id: issued_id.to_string(),
            })?;
        if issued.is_cancelled {
            return Err(StoreError::StateConflict {
                entity: "issued certificate",
                reason: "already cancelled".to_string(),
            });
        }
        issued.cancel(by, reason, now);
        let snapshot = issued.clone();
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::CertificateCancelled,
            Some(by),
            format!("certificate {} cancelled", snapshot.certificate_number),
            now,
        ));
        Ok(snapshot)
    }

    /// Persist the asset references produced by the pipeline in one
    /// update. Identifiers are untouched; calling this repeatedly with
    /// equivalent references is harmless (idempotent regeneration).
    pub fn update_assets(
        &self,
        issued_id: IssuedId,
        qr: AssetRef,
        pdf: AssetRef,
        now: Timestamp,
    ) -> Result<IssuedCertificate, StoreError> {
        let mut inner = self.inner.write();
        let issued = inner
            .issued
            .get_mut(&issued_id)
            .ok_or(StoreError::NotFound {
                entity: "issued certificate",
                id: issued_id.to_string(),
            })?;
        issued.set_assets(qr, pdf);
        let snapshot = issued.clone();
        let request_id = issued_request(&inner, &snapshot)?;
        inner.logs.push(LogEntry::new(
            request_id,
            LogAction::AssetsGenerated,
            None,
            "asset references updated",
            now,
        ));
        Ok(snapshot)
    }

    /// Read the full rendering context for an issued certificate. Used by
    /// the asset pipeline; not tenant-scoped (the pipeline acts on behalf
    /// of the system, keyed by issued id).
    pub fn asset_context(&self, issued_id: IssuedId) -> Result<AssetContext, StoreError> {
        let inner = self.inner.read();
        let issued = inner.issued.get(&issued_id).ok_or(StoreError::NotFound {
            entity: "issued certificate",
            id: issued_id.to_string(),
        })?;
        let version = inner
            .versions
            .get(&issued.version_id)
            .ok_or(StoreError::NotFound {
                entity: "version",
                id: issued.version_id.to_string(),
            })?;
        let request = inner.requests.get(&version.request_id);
        let edition = request.and_then(|r| inner.editions.get(&r.edition_id)).cloned();
        Ok(AssetContext {
            issued: issued.clone(),
            request_id: version.request_id,
            edition,
            snapshot: version.snapshot.clone(),
        })
    }

    // ── Verification (public read path) ──────────────────────────────

    /// Resolve a verification code to its denormalized record.
    ///
    /// Returns `None` for any code that does not resolve — malformed,
    /// unknown, or orphaned — so the public surface stays uniform and
    /// leaks no enumeration signal beyond existence.
    pub fn resolve_verification(&self, code: &str) -> Option<VerificationRecord> {
        let inner = self.inner.read();
        let issued_id = inner.code_index.get(code)?;
        let issued = inner.issued.get(issued_id)?;
        let version = inner.versions.get(&issued.version_id)?;
        Some(VerificationRecord {
            issued: issued.clone(),
            request_id: version.request_id,
            version_number: version.version_number,
            exporter_name: version.snapshot.exporter_name.clone(),
            importer_name: version.snapshot.importer_name.clone(),
            importer_country: version.snapshot.importer_country.clone(),
        })
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Fetch a version.
    pub fn get_version(&self, id: VersionId) -> Option<CertificateVersion> {
        self.inner.read().versions.get(&id).cloned()
    }

    /// All versions of a request, ordered by version number.
    pub fn versions_for(&self, request_id: RequestId) -> Vec<CertificateVersion> {
        let inner = self.inner.read();
        let mut out: Vec<CertificateVersion> = inner
            .versions
            .values()
            .filter(|v| v.request_id == request_id)
            .cloned()
            .collect();
        out.sort_by_key(|v| v.version_number);
        out
    }

    /// The action log of a request, in insertion order.
    pub fn logs_for(&self, request_id: RequestId) -> Vec<LogEntry> {
        self.inner
            .read()
            .logs
            .iter()
            .filter(|l| l.request_id == request_id)
            .cloned()
            .collect()
    }

    // ── Hydration ────────────────────────────────────────────────────

    /// Rebuild in-memory state from persisted rows at startup.
    ///
    /// Trusts the database's UNIQUE constraints for the rows themselves;
    /// the uniqueness indexes and per-(tenant, template) sequences are
    /// rebuilt here so issuance continues where the durable mirror left
    /// off. Only called once, before the store is shared.
    pub fn hydrate(
        &self,
        editions: Vec<CertificateEdition>,
        requests: Vec<CertificateRequest>,
        versions: Vec<CertificateVersion>,
        issued: Vec<IssuedCertificate>,
    ) {
        let mut inner = self.inner.write();
        for edition in editions {
            inner.editions.insert(edition.id, edition);
        }
        for request in requests {
            inner.requests.insert(request.id, request);
        }
        for version in versions {
            inner.versions.insert(version.id, version);
        }
        for doc in issued {
            // Recover the sequence high-water mark from the number's
            // trailing segment ({CODE}-{YEAR}-{SEQ}).
            let number = doc.certificate_number.as_str();
            let mut parts = number.split('-');
            let code = parts.next().unwrap_or_default().to_string();
            let seq: u64 = parts.next_back().and_then(|s| s.parse().ok()).unwrap_or(0);
            let tenant = inner
                .versions
                .get(&doc.version_id)
                .and_then(|v| inner.requests.get(&v.request_id))
                .map(|r| r.tenant_id);
            if let Some(tenant) = tenant {
                let entry = inner.sequences.entry((tenant, code)).or_insert(0);
                *entry = (*entry).max(seq);
            }

            inner.number_index.insert(number.to_string(), doc.id);
            inner
                .code_index
                .insert(doc.verification_code.as_str().to_string(), doc.id);
            inner.version_issued.insert(doc.version_id, doc.id);
            inner.issued.insert(doc.id, doc);
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────

    /// Run a guarded mutation on a tenant's request and append a log
    /// entry, all under one write lock.
    fn with_request(
        &self,
        tenant: TenantId,
        request_id: RequestId,
        f: impl FnOnce(&mut CertificateRequest) -> Result<(LogAction, UserId, String), StoreError>,
    ) -> Result<CertificateRequest, StoreError> {
        let mut inner = self.inner.write();
        let request = scoped_request_mut(&mut inner, tenant, request_id)?;
        let (action, actor, detail) = f(request)?;
        let at = request
            .transitions
            .last()
            .map(|t| t.at)
            .unwrap_or(request.created_at);
        let snapshot = request.clone();
        inner
            .logs
            .push(LogEntry::new(request_id, action, Some(actor), detail, at));
        Ok(snapshot)
    }
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Free helpers (operate on the locked inner state) ────────────────

fn scoped_request<'a>(
    inner: &'a StoreInner,
    tenant: TenantId,
    id: RequestId,
) -> Result<&'a CertificateRequest, StoreError> {
    inner
        .requests
        .get(&id)
        .filter(|r| r.tenant_id == tenant)
        .ok_or(StoreError::NotFound {
            entity: "request",
            id: id.to_string(),
        })
}

fn scoped_request_mut<'a>(
    inner: &'a mut StoreInner,
    tenant: TenantId,
    id: RequestId,
) -> Result<&'a mut CertificateRequest, StoreError> {
    inner
        .requests
        .get_mut(&id)
        .filter(|r| r.tenant_id == tenant)
        .ok_or(StoreError::NotFound {
            entity: "request",
            id: id.to_string(),
        })
}

fn require_editable(request: &CertificateRequest) -> Result<(), StoreError> {
    if !request.is_editable() {
        return Err(StoreError::StateConflict {
            entity: "request",
            reason: format!("request is not editable in status {}", request.status),
        });
    }
    Ok(())
}

fn has_completed_audit(inner: &StoreInner, request_id: RequestId) -> bool {
    inner
        .audits
        .values()
        .any(|a| a.request_id == request_id && a.status == AuditStatus::Completed)
}

fn next_version_number(inner: &StoreInner, request_id: RequestId) -> u32 {
    inner
        .versions
        .values()
        .filter(|v| v.request_id == request_id)
        .map(|v| v.version_number)
        .max()
        .unwrap_or(0)
        + 1
}

fn correction_request(
    inner: &StoreInner,
    correction_id: CorrectionId,
) -> Result<RequestId, StoreError> {
    inner
        .corrections
        .get(&correction_id)
        .map(|c| c.request_id)
        .ok_or(StoreError::NotFound {
            entity: "correction",
            id: correction_id.to_string(),
        })
}

fn issued_request(
    inner: &StoreInner,
    issued: &IssuedCertificate,
) -> Result<RequestId, StoreError> {
    inner
        .versions
        .get(&issued.version_id)
        .map(|v| v.request_id)
        .ok_or(StoreError::NotFound {
            entity: "version",
            id: issued.version_id.to_string(),
        })
}

/// A fully built issued row plus the sequence commit it will consume.
/// Produced by [`prepare_issue`] without mutating anything; applied by
/// [`commit_issue`].
struct PreparedIssue {
    issued: IssuedCertificate,
    seq_key: (TenantId, String),
    seq_value: u64,
}

/// Build an issued row against an immutable view of the store, checking
/// both uniqueness indexes. The verification code is retried exactly once
/// on collision; the number sequence is never re-drawn.
#[allow(clippy::too_many_arguments)]
fn prepare_issue(
    format: &CertificateNumberFormat,
    inner: &StoreInner,
    tenant: TenantId,
    edition_code: &str,
    version_id: VersionId,
    issued_by: UserId,
    language: String,
    now: Timestamp,
) -> Result<PreparedIssue, StoreError> {
    if inner.version_issued.contains_key(&version_id) {
        return Err(StoreError::StateConflict {
            entity: "version",
            reason: "an issued certificate already exists for this version".to_string(),
        });
    }

    let seq_key = (tenant, edition_code.to_ascii_uppercase());
    let seq_value = inner.sequences.get(&seq_key).copied().unwrap_or(0) + 1;
    let number = format.format(edition_code, now.year(), seq_value)?;
    if inner.number_index.contains_key(number.as_str()) {
        return Err(StoreError::IdentifierCollision {
            field: "certificate_number",
        });
    }

    let mut code = new_verification_code();
    if inner.code_index.contains_key(code.as_str()) {
        tracing::warn!("verification code collision; retrying with a fresh code");
        code = new_verification_code();
        if inner.code_index.contains_key(code.as_str()) {
            return Err(StoreError::IdentifierCollision {
                field: "verification_code",
            });
        }
    }

    Ok(PreparedIssue {
        issued: IssuedCertificate::new(version_id, number, code, issued_by, language, now),
        seq_key,
        seq_value,
    })
}

/// Apply a prepared issuance: insert the version and issued rows and
/// update every index. Infallible by construction — all checks happened
/// in [`prepare_issue`].
fn commit_issue(
    inner: &mut StoreInner,
    version: CertificateVersion,
    prepared: PreparedIssue,
) -> IssuedCertificate {
    let PreparedIssue {
        issued,
        seq_key,
        seq_value,
    } = prepared;
    inner.versions.insert(version.id, version);
    inner.sequences.insert(seq_key, seq_value);
    inner
        .number_index
        .insert(issued.certificate_number.as_str().to_string(), issued.id);
    inner
        .code_index
        .insert(issued.verification_code.as_str().to_string(), issued.id);
    inner.version_issued.insert(issued.version_id, issued.id);
    inner.issued.insert(issued.id, issued.clone());
    issued
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::OperationType;

    struct Fixture {
        store: CertificateStore,
        tenant: TenantId,
        user: UserId,
        edition: CertificateEdition,
    }

    fn fixture() -> Fixture {
        let store = CertificateStore::new();
        let edition = CertificateEdition {
            id: EditionId::new(),
            tenant_id: None,
            code: "GCC".to_string(),
            certificate_type: "origin".to_string(),
            language_code: "ar".to_string(),
            scope: "gcc".to_string(),
            template_version: None,
            is_active: true,
        };
        store.upsert_edition(edition.clone());
        Fixture {
            store,
            tenant: TenantId::new(),
            user: UserId::new(),
            edition,
        }
    }

    fn new_request_input(edition_id: EditionId) -> NewRequest {
        NewRequest {
            exporter_name: "Al Noor Trading".to_string(),
            importer_name: "Berlin Imports GmbH".to_string(),
            importer_country: "DE".to_string(),
            certificate_type: "origin".to_string(),
            operation_type: OperationType::Export,
            shipment_condition: Some("sea freight".to_string()),
            edition_id,
            language_code: "ar".to_string(),
        }
    }

    /// Walk a fresh request to Approved via the audit path.
    fn approved_request(f: &Fixture) -> RequestId {
        let now = Timestamp::now();
        let req = f
            .store
            .create_request(f.tenant, f.user, new_request_input(f.edition.id), now)
            .unwrap();
        f.store
            .add_item(
                f.tenant,
                req.id,
                NewItem {
                    product_name: "Dates, Khalas grade A".to_string(),
                    brand: Some("Oasis".to_string()),
                    origin_country: "AE".to_string(),
                    net_weight_kg: "1200".to_string(),
                    translations: HashMap::new(),
                },
                f.user,
                now,
            )
            .unwrap();
        f.store.submit_request(f.tenant, req.id, f.user, now).unwrap();
        let audit = f
            .store
            .assign_audit(f.tenant, req.id, UserId::new(), f.user, now)
            .unwrap();
        f.store
            .complete_audit(f.tenant, audit.id, None, f.user, now)
            .unwrap();
        f.store.approve_request(f.tenant, req.id, f.user, now).unwrap();
        req.id
    }

    // ── End-to-end issuance ──────────────────────────────────────────

    #[test]
    fn test_full_lifecycle_to_issuance() {
        let f = fixture();
        let request_id = approved_request(&f);

        let issued = f
            .store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();

        // Version #1 created, identifiers assigned, request terminal.
        let versions = f.store.versions_for(request_id);
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version_number, 1);
        assert_eq!(versions[0].reason, VersionReason::InitialIssue);
        assert_eq!(versions[0].snapshot.items.len(), 1);

        assert!(issued.certificate_number.as_str().starts_with("GCC-"));
        assert!(issued.verification_code.as_str().starts_with("VC-"));

        let request = f.store.get_request(f.tenant, request_id).unwrap();
        assert_eq!(request.status, RequestStatus::Issued);
        assert_eq!(request.issued_id, Some(issued.id));
        assert!(request.issue_date.is_some());
    }

    #[test]
    fn test_issue_twice_is_state_conflict() {
        let f = fixture();
        let request_id = approved_request(&f);
        f.store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();
        let err = f
            .store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::StateConflict { .. }), "got {err:?}");

        // Still exactly one issued row for the request's single version.
        assert_eq!(f.store.list_issued(f.tenant).len(), 1);
    }

    #[test]
    fn test_issue_unapproved_is_state_conflict() {
        let f = fixture();
        let req = f
            .store
            .create_request(f.tenant, f.user, new_request_input(f.edition.id), Timestamp::now())
            .unwrap();
        let err = f
            .store
            .issue(f.tenant, req.id, f.user, Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::StateConflict { .. }));
        assert!(f.store.versions_for(req.id).is_empty());
    }

    #[test]
    fn test_approve_requires_completed_audit() {
        let f = fixture();
        let now = Timestamp::now();
        let req = f
            .store
            .create_request(f.tenant, f.user, new_request_input(f.edition.id), now)
            .unwrap();
        f.store.submit_request(f.tenant, req.id, f.user, now).unwrap();
        let err = f
            .store
            .approve_request(f.tenant, req.id, f.user, now)
            .unwrap_err();
        assert!(matches!(err, StoreError::StateConflict { .. }));
    }

    #[test]
    fn test_payment_path_requires_paid_flag() {
        let f = fixture();
        let now = Timestamp::now();
        let req = f
            .store
            .create_request(f.tenant, f.user, new_request_input(f.edition.id), now)
            .unwrap();
        f.store.submit_request(f.tenant, req.id, f.user, now).unwrap();
        f.store.request_payment(f.tenant, req.id, f.user, now).unwrap();

        let err = f
            .store
            .approve_request(f.tenant, req.id, f.user, now)
            .unwrap_err();
        assert!(matches!(err, StoreError::StateConflict { .. }));

        f.store.confirm_payment(f.tenant, req.id, f.user, now).unwrap();
        let approved = f.store.approve_request(f.tenant, req.id, f.user, now).unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
    }

    // ── Identifier properties ────────────────────────────────────────

    #[test]
    fn test_numbers_and_codes_unique_across_store() {
        let f = fixture();
        let mut numbers = std::collections::HashSet::new();
        let mut codes = std::collections::HashSet::new();
        for _ in 0..20 {
            let request_id = approved_request(&f);
            let issued = f
                .store
                .issue(f.tenant, request_id, f.user, Timestamp::now())
                .unwrap();
            assert!(numbers.insert(issued.certificate_number.as_str().to_string()));
            assert!(codes.insert(issued.verification_code.as_str().to_string()));
        }
    }

    #[test]
    fn test_sequence_is_per_tenant_and_template() {
        let f = fixture();
        let a = approved_request(&f);
        let b = approved_request(&f);
        let now = Timestamp::now();
        let first = f.store.issue(f.tenant, a, f.user, now).unwrap();
        let second = f.store.issue(f.tenant, b, f.user, now).unwrap();
        let year = now.year();
        assert_eq!(
            first.certificate_number.as_str(),
            format!("GCC-{year}-00001")
        );
        assert_eq!(
            second.certificate_number.as_str(),
            format!("GCC-{year}-00002")
        );
    }

    #[test]
    fn test_identifiers_survive_cancellation() {
        let f = fixture();
        let request_id = approved_request(&f);
        let issued = f
            .store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();
        f.store
            .cancel_issued(f.tenant, issued.id, f.user, "test".to_string(), Timestamp::now())
            .unwrap();

        // The code still resolves (to a cancelled record) and the number
        // is never reused by later issuances.
        let record = f
            .store
            .resolve_verification(issued.verification_code.as_str())
            .unwrap();
        assert!(record.issued.is_cancelled);

        let other = approved_request(&f);
        let next = f.store.issue(f.tenant, other, f.user, Timestamp::now()).unwrap();
        assert_ne!(next.certificate_number, issued.certificate_number);
    }

    // ── Concurrency ──────────────────────────────────────────────────

    #[test]
    fn test_concurrent_double_issue_yields_exactly_one() {
        let f = fixture();
        let request_id = approved_request(&f);
        let store = f.store.clone();
        let tenant = f.tenant;
        let user = f.user;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.issue(tenant, request_id, user, Timestamp::now()).is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|&ok| ok)
            .count();

        assert_eq!(successes, 1, "exactly one concurrent issuance must win");
        assert_eq!(f.store.list_issued(f.tenant).len(), 1);
        assert_eq!(f.store.versions_for(request_id).len(), 1);
    }

    // ── Corrections ──────────────────────────────────────────────────

    #[test]
    fn test_unpaid_correction_approval_rejected_no_version() {
        let f = fixture();
        let request_id = approved_request(&f);
        f.store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();
        let versions_before = f.store.versions_for(request_id).len();

        let correction = f
            .store
            .file_correction(
                f.tenant,
                request_id,
                f.user,
                ErrorSource::Applicant,
                "importer name misspelled".to_string(),
                true,
                Timestamp::now(),
            )
            .unwrap();
        f.store
            .begin_correction_review(f.tenant, correction.id, f.user)
            .unwrap();

        let err = f
            .store
            .approve_correction(f.tenant, correction.id, f.user, Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::StateConflict { .. }), "got {err:?}");
        assert_eq!(f.store.versions_for(request_id).len(), versions_before);
    }

    #[test]
    fn test_correction_reissue_supersedes_old_document() {
        let f = fixture();
        let request_id = approved_request(&f);
        let first = f
            .store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();

        let correction = f
            .store
            .file_correction(
                f.tenant,
                request_id,
                f.user,
                ErrorSource::Issuer,
                "wrong weight printed".to_string(),
                false,
                Timestamp::now(),
            )
            .unwrap();
        f.store
            .begin_correction_review(f.tenant, correction.id, f.user)
            .unwrap();
        let later = Timestamp::now().add_days(1);
        let outcome = f
            .store
            .approve_correction(f.tenant, correction.id, f.user, later)
            .unwrap();

        // A second version and a fresh document.
        assert_eq!(outcome.version.version_number, 2);
        assert_eq!(outcome.version.reason, VersionReason::Correction);
        let new_issued = outcome.new_issued.expect("issued request must reissue");
        assert_ne!(new_issued.id, first.id);
        assert_ne!(new_issued.certificate_number, first.certificate_number);
        assert_ne!(new_issued.verification_code, first.verification_code);

        // The old document's printability is clamped to the supersession
        // instant; the request now points at the new document.
        let old = f.store.get_issued(f.tenant, first.id).unwrap();
        assert_eq!(old.printable_until, later);
        let request = f.store.get_request(f.tenant, request_id).unwrap();
        assert_eq!(request.issued_id, Some(new_issued.id));
    }

    #[test]
    fn test_correction_on_unissued_request_creates_version_only() {
        let f = fixture();
        let now = Timestamp::now();
        let req = f
            .store
            .create_request(f.tenant, f.user, new_request_input(f.edition.id), now)
            .unwrap();
        f.store.submit_request(f.tenant, req.id, f.user, now).unwrap();

        let correction = f
            .store
            .file_correction(
                f.tenant,
                req.id,
                f.user,
                ErrorSource::Applicant,
                "brand changed".to_string(),
                false,
                now,
            )
            .unwrap();
        f.store
            .begin_correction_review(f.tenant, correction.id, f.user)
            .unwrap();
        let outcome = f
            .store
            .approve_correction(f.tenant, correction.id, f.user, now)
            .unwrap();
        assert!(outcome.new_issued.is_none());
        assert_eq!(f.store.versions_for(req.id).len(), 1);
    }

    #[test]
    fn test_correction_rejected_on_draft() {
        let f = fixture();
        let req = f
            .store
            .create_request(f.tenant, f.user, new_request_input(f.edition.id), Timestamp::now())
            .unwrap();
        let err = f
            .store
            .file_correction(
                f.tenant,
                req.id,
                f.user,
                ErrorSource::Applicant,
                "draft edit should not need a correction".to_string(),
                false,
                Timestamp::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::StateConflict { .. }));
    }

    // ── Verification resolution ──────────────────────────────────────

    #[test]
    fn test_resolve_verification_joins_snapshot_fields() {
        let f = fixture();
        let request_id = approved_request(&f);
        let issued = f
            .store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();

        let record = f
            .store
            .resolve_verification(issued.verification_code.as_str())
            .unwrap();
        assert_eq!(record.issued.id, issued.id);
        assert_eq!(record.exporter_name, "Al Noor Trading");
        assert_eq!(record.importer_name, "Berlin Imports GmbH");
        assert_eq!(record.version_number, 1);
    }

    #[test]
    fn test_resolve_unknown_code_is_none() {
        let f = fixture();
        assert!(f.store.resolve_verification("VC-DOESNOTEXIST12345678").is_none());
        assert!(f.store.resolve_verification("").is_none());
        assert!(f.store.resolve_verification("garbage").is_none());
    }

    // ── Items & editability ──────────────────────────────────────────

    #[test]
    fn test_items_frozen_after_approval() {
        let f = fixture();
        let request_id = approved_request(&f);
        let err = f
            .store
            .add_item(
                f.tenant,
                request_id,
                NewItem {
                    product_name: "late addition".to_string(),
                    brand: None,
                    origin_country: "AE".to_string(),
                    net_weight_kg: "5".to_string(),
                    translations: HashMap::new(),
                },
                f.user,
                Timestamp::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::StateConflict { .. }));
    }

    // ── Tenant isolation ─────────────────────────────────────────────

    #[test]
    fn test_foreign_tenant_sees_not_found() {
        let f = fixture();
        let request_id = approved_request(&f);
        let issued = f
            .store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();

        let stranger = TenantId::new();
        assert!(matches!(
            f.store.get_request(stranger, request_id),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            f.store.get_issued(stranger, issued.id),
            Err(StoreError::NotFound { .. })
        ));
        assert!(f.store.list_issued(stranger).is_empty());
    }

    // ── Asset updates ────────────────────────────────────────────────

    #[test]
    fn test_update_assets_is_idempotent_and_preserves_identifiers() {
        let f = fixture();
        let request_id = approved_request(&f);
        let issued = f
            .store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();

        let qr = AssetRef::File(format!("qr/qr_{}.png", issued.id));
        let pdf = AssetRef::Dynamic(format!(
            "/verify/print?code={}",
            issued.verification_code
        ));
        let now = Timestamp::now();
        let first = f
            .store
            .update_assets(issued.id, qr.clone(), pdf.clone(), now)
            .unwrap();
        let second = f.store.update_assets(issued.id, qr, pdf, now).unwrap();

        assert_eq!(first.qr_code, second.qr_code);
        assert_eq!(first.pdf, second.pdf);
        assert_eq!(second.certificate_number, issued.certificate_number);
        assert_eq!(second.verification_code, issued.verification_code);
    }

    // ── Hydration ────────────────────────────────────────────────────

    #[test]
    fn test_hydrated_store_resolves_codes_and_continues_sequence() {
        let f = fixture();
        let a = approved_request(&f);
        let now = Timestamp::now();
        let first = f.store.issue(f.tenant, a, f.user, now).unwrap();

        // Simulate a restart: rebuild a fresh store from the mirror rows.
        let editions = vec![f.edition.clone()];
        let requests = vec![f.store.get_request(f.tenant, a).unwrap()];
        let versions = f.store.versions_for(a);
        let issued = f.store.list_issued(f.tenant);

        let restarted = CertificateStore::new();
        restarted.hydrate(editions, requests, versions, issued);

        // Codes resolve and the sequence does not restart at 1.
        assert!(restarted
            .resolve_verification(first.verification_code.as_str())
            .is_some());
        let g = Fixture {
            store: restarted,
            tenant: f.tenant,
            user: f.user,
            edition: f.edition.clone(),
        };
        let b = approved_request(&g);
        let second = g.store.issue(g.tenant, b, g.user, now).unwrap();
        assert_eq!(
            second.certificate_number.as_str(),
            format!("GCC-{}-00002", now.year())
        );
    }

    // ── Action log ───────────────────────────────────────────────────

    #[test]
    fn test_action_log_records_the_journey() {
        let f = fixture();
        let request_id = approved_request(&f);
        f.store
            .issue(f.tenant, request_id, f.user, Timestamp::now())
            .unwrap();
        let actions: Vec<LogAction> = f
            .store
            .logs_for(request_id)
            .into_iter()
            .map(|l| l.action)
            .collect();
        assert!(actions.contains(&LogAction::Create));
        assert!(actions.contains(&LogAction::Submit));
        assert!(actions.contains(&LogAction::AuditCompleted));
        assert!(actions.contains(&LogAction::Approve));
        assert!(actions.contains(&LogAction::Issue));
    }
}
