//! # Verification Service
//!
//! `verify(code) -> Outcome` with the policy applied in order:
//! unknown → `NotFound`; cancelled → `Cancelled`; past `printable_until`
//! → `Expired`; otherwise → `Valid`.
//!
//! The code is treated as opaque: it is looked up verbatim (after
//! trimming transport whitespace), and a malformed code is
//! indistinguishable from an unknown one.

use serde::{Deserialize, Serialize};

use tcr_core::Timestamp;
use tcr_store::{AssetRef, CertificateStore, VerificationRecord};

/// Denormalized display metadata for a verified certificate — what the
/// informational page shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub certificate_number: String,
    pub issued_at: String,
    pub printable_until: String,
    pub exporter_name: String,
    pub importer_name: String,
    pub importer_country: String,
    pub version_number: u32,
    pub language_code: String,
}

impl CertificateSummary {
    fn from_record(record: &VerificationRecord) -> Self {
        Self {
            certificate_number: record.issued.certificate_number.to_string(),
            issued_at: record.issued.issued_at.to_iso8601(),
            printable_until: record.issued.printable_until.to_iso8601(),
            exporter_name: record.exporter_name.clone(),
            importer_name: record.importer_name.clone(),
            importer_country: record.importer_country.clone(),
            version_number: record.version_number,
            language_code: record.issued.language_code.clone(),
        }
    }
}

/// The result of verifying a code.
///
/// `Cancelled` deliberately carries no document reference and `Expired`
/// carries metadata only — the type makes it impossible for a caller to
/// serve a document in either state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The code resolves to nothing. Uniform for unknown and malformed
    /// codes.
    NotFound,
    /// The certificate was cancelled; only the number is disclosed.
    Cancelled { certificate_number: String },
    /// The printability horizon has passed; metadata is shown, the
    /// document is not served.
    Expired { certificate: CertificateSummary },
    /// The certificate is authentic and printable.
    Valid {
        certificate: CertificateSummary,
        /// The recorded document reference: a file-backed PDF to stream,
        /// or a dynamic print endpoint to link. `None` when the asset
        /// pipeline has not run yet.
        document: Option<AssetRef>,
    },
}

impl VerificationOutcome {
    /// Whether this outcome permits serving document bytes.
    pub fn may_serve_document(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// The public verification read path. Holds its storage handle
/// explicitly; performs no writes.
#[derive(Debug, Clone)]
pub struct VerificationService {
    store: CertificateStore,
}

impl VerificationService {
    /// Create the service over a store handle.
    pub fn new(store: CertificateStore) -> Self {
        Self { store }
    }

    /// Verify a code as of `now`.
    pub fn verify(&self, code: &str, now: Timestamp) -> VerificationOutcome {
        let code = code.trim();
        if code.is_empty() {
            return VerificationOutcome::NotFound;
        }

        let record = match self.store.resolve_verification(code) {
            Some(record) => record,
            None => {
                tracing::debug!("verification code did not resolve");
                return VerificationOutcome::NotFound;
            }
        };

        if record.issued.is_cancelled {
            tracing::info!(
                number = %record.issued.certificate_number,
                "verification hit on cancelled certificate"
            );
            return VerificationOutcome::Cancelled {
                certificate_number: record.issued.certificate_number.to_string(),
            };
        }

        let summary = CertificateSummary::from_record(&record);
        if record.issued.is_expired(now) {
            return VerificationOutcome::Expired {
                certificate: summary,
            };
        }

        VerificationOutcome::Valid {
            document: record.issued.pdf.clone(),
            certificate: summary,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tcr_core::{EditionId, IssuedId, TenantId, UserId};
    use tcr_store::{
        CertificateEdition, NewItem, NewRequest, OperationType,
    };

    struct Fixture {
        store: CertificateStore,
        service: VerificationService,
        tenant: TenantId,
        user: UserId,
        issued: IssuedId,
        code: String,
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

        let tenant = TenantId::new();
        let user = UserId::new();
        let now = Timestamp::now();
        let req = store
            .create_request(
                tenant,
                user,
                NewRequest {
                    exporter_name: "Al Noor Trading".to_string(),
                    importer_name: "Berlin Imports GmbH".to_string(),
                    importer_country: "DE".to_string(),
                    certificate_type: "origin".to_string(),
                    operation_type: OperationType::Export,
                    shipment_condition: None,
                    edition_id: edition.id,
                    language_code: "ar".to_string(),
                },
                now,
            )
            .unwrap();
        store
            .add_item(
                tenant,
                req.id,
                NewItem {
                    product_name: "Dates".to_string(),
                    brand: None,
                    origin_country: "AE".to_string(),
                    net_weight_kg: "1200".to_string(),
                    translations: HashMap::new(),
                },
                user,
                now,
            )
            .unwrap();
        store.submit_request(tenant, req.id, user, now).unwrap();
        let audit = store
            .assign_audit(tenant, req.id, UserId::new(), user, now)
            .unwrap();
        store.complete_audit(tenant, audit.id, None, user, now).unwrap();
        store.approve_request(tenant, req.id, user, now).unwrap();
        let issued = store.issue(tenant, req.id, user, now).unwrap();

        Fixture {
            service: VerificationService::new(store.clone()),
            store,
            tenant,
            user,
            issued: issued.id,
            code: issued.verification_code.to_string(),
        }
    }

    #[test]
    fn test_unknown_code_not_found() {
        let f = fixture();
        let outcome = f.service.verify("VC-UNKNOWNUNKNOWNUNKNOWN1", Timestamp::now());
        assert!(matches!(outcome, VerificationOutcome::NotFound));
    }

    #[test]
    fn test_malformed_and_empty_codes_uniformly_not_found() {
        let f = fixture();
        for junk in ["", "   ", "garbage", "' OR 1=1 --"] {
            let outcome = f.service.verify(junk, Timestamp::now());
            assert!(
                matches!(outcome, VerificationOutcome::NotFound),
                "expected NotFound for {junk:?}"
            );
        }
    }

    #[test]
    fn test_valid_certificate_with_metadata() {
        let f = fixture();
        match f.service.verify(&f.code, Timestamp::now()) {
            VerificationOutcome::Valid {
                certificate,
                document,
            } => {
                assert_eq!(certificate.exporter_name, "Al Noor Trading");
                assert_eq!(certificate.importer_name, "Berlin Imports GmbH");
                assert_eq!(certificate.version_number, 1);
                // Asset pipeline has not run yet.
                assert!(document.is_none());
            }
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn test_code_whitespace_is_trimmed() {
        let f = fixture();
        let padded = format!("  {}\n", f.code);
        assert!(f
            .service
            .verify(&padded, Timestamp::now())
            .may_serve_document());
    }

    #[test]
    fn test_valid_carries_recorded_document_reference() {
        let f = fixture();
        f.store
            .update_assets(
                f.issued,
                AssetRef::File(format!("qr/qr_{}.png", f.issued)),
                AssetRef::File(format!("pdf/cert_x_{}.pdf", f.issued)),
                Timestamp::now(),
            )
            .unwrap();
        match f.service.verify(&f.code, Timestamp::now()) {
            VerificationOutcome::Valid { document, .. } => {
                assert!(document.unwrap().is_file());
            }
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_never_serves_document_even_with_pdf_recorded() {
        let f = fixture();
        // A PDF reference exists on the row…
        f.store
            .update_assets(
                f.issued,
                AssetRef::File(format!("qr/qr_{}.png", f.issued)),
                AssetRef::File(format!("pdf/cert_x_{}.pdf", f.issued)),
                Timestamp::now(),
            )
            .unwrap();
        // …and the certificate is then cancelled.
        f.store
            .cancel_issued(
                f.tenant,
                f.issued,
                f.user,
                "issued in error".to_string(),
                Timestamp::now(),
            )
            .unwrap();

        let outcome = f.service.verify(&f.code, Timestamp::now());
        match &outcome {
            VerificationOutcome::Cancelled { certificate_number } => {
                assert!(certificate_number.starts_with("GCC-"));
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert!(!outcome.may_serve_document());
    }

    #[test]
    fn test_expired_shows_metadata_but_no_document() {
        let f = fixture();
        f.store
            .update_assets(
                f.issued,
                AssetRef::File(format!("qr/qr_{}.png", f.issued)),
                AssetRef::File(format!("pdf/cert_x_{}.pdf", f.issued)),
                Timestamp::now(),
            )
            .unwrap();

        // Two years from now, well past printable_until.
        let later = Timestamp::now().add_days(2 * 366);
        match f.service.verify(&f.code, later) {
            VerificationOutcome::Expired { certificate } => {
                assert_eq!(certificate.exporter_name, "Al Noor Trading");
            }
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_and_unknown_are_distinguishable() {
        let f = fixture();
        let later = Timestamp::now().add_days(2 * 366);
        let expired = f.service.verify(&f.code, later);
        let unknown = f.service.verify("VC-UNKNOWNUNKNOWNUNKNOWN1", later);
        assert!(matches!(expired, VerificationOutcome::Expired { .. }));
        assert!(matches!(unknown, VerificationOutcome::NotFound));
        assert!(!expired.may_serve_document());
        assert!(!unknown.may_serve_document());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let f = fixture();
        let outcome = f.service.verify(&f.code, Timestamp::now());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "valid");
        assert!(json["certificate"]["certificate_number"]
            .as_str()
            .unwrap()
            .starts_with("GCC-"));
    }
}
