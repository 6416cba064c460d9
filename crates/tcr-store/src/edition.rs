//! # Certificate Editions
//!
//! A named, versioned rendering template keyed by scope and language,
//! selected at request time to choose how the PDF is laid out. Read-only
//! from the lifecycle's perspective — editions are provisioned by
//! configuration, never mutated by the issuance path.

use serde::{Deserialize, Serialize};

use tcr_core::{EditionId, TenantId};

/// A certificate edition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateEdition {
    pub id: EditionId,
    /// Owning tenant; `None` for platform-wide editions.
    pub tenant_id: Option<TenantId>,
    /// Short code used in certificate numbers, e.g. "GCC".
    pub code: String,
    /// Certificate kind this edition renders, e.g. "origin".
    pub certificate_type: String,
    /// Document language ("ar", "en", …).
    pub language_code: String,
    /// Geographic/regulatory scope, e.g. "gcc".
    pub scope: String,
    /// Explicit template version override. When absent, the template is
    /// resolved from `{language_code}_{scope}`.
    pub template_version: Option<String>,
    pub is_active: bool,
}

impl CertificateEdition {
    /// Candidate template codes in resolution order, most specific first.
    /// The asset pipeline appends its configured default as the last
    /// resort.
    pub fn template_candidates(&self) -> Vec<String> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(version) = &self.template_version {
            candidates.push(version.clone());
        }
        candidates.push(format!("{}_{}", self.language_code, self.scope));
        candidates
    }
}
