//! # Template Catalog
//!
//! Maps template codes (e.g. `ar_gcc`) to layout specifications. The
//! pipeline resolves the edition's candidates most-specific-first and
//! falls back to the configured default; only when *nothing* usable
//! exists does resolution fail — and that failure is a configuration
//! error, not a transient one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The hard-coded last-resort template code.
pub const DEFAULT_TEMPLATE_CODE: &str = "ar_gcc";

/// Layout specification handed to the PDF renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Resolution key, e.g. `ar_gcc`.
    pub code: String,
    /// Human-readable name shown in admin tooling.
    pub name: String,
    /// Page size identifier.
    pub page: String,
    /// Base font family.
    pub font_family: String,
    /// Text direction: `rtl` or `ltr`.
    pub direction: String,
}

impl TemplateSpec {
    fn builtin(code: &str, name: &str, direction: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            page: "A4".to_string(),
            font_family: "DejaVu Sans".to_string(),
            direction: direction.to_string(),
        }
    }
}

/// Resolution failure. A configuration problem, not a transient one.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Neither the candidates nor the default resolved.
    #[error("no usable template: tried {tried:?}")]
    NoUsableTemplate { tried: Vec<String> },
}

/// The set of available templates plus the default fallback code.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: HashMap<String, TemplateSpec>,
    default_code: String,
}

impl TemplateCatalog {
    /// An empty catalog with the given default code. Useful in tests to
    /// provoke the missing-template path.
    pub fn empty(default_code: &str) -> Self {
        Self {
            templates: HashMap::new(),
            default_code: default_code.to_string(),
        }
    }

    /// The built-in catalog: Arabic and English GCC layouts, defaulting
    /// to `ar_gcc`.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty(DEFAULT_TEMPLATE_CODE);
        catalog.insert(TemplateSpec::builtin(
            "ar_gcc",
            "GCC Certificate of Origin (Arabic)",
            "rtl",
        ));
        catalog.insert(TemplateSpec::builtin(
            "en_gcc",
            "GCC Certificate of Origin (English)",
            "ltr",
        ));
        catalog
    }

    /// Add or replace a template.
    pub fn insert(&mut self, spec: TemplateSpec) {
        self.templates.insert(spec.code.clone(), spec);
    }

    /// Resolve the first usable template: candidates in order, then the
    /// default.
    pub fn resolve(&self, candidates: &[String]) -> Result<&TemplateSpec, TemplateError> {
        for code in candidates {
            if let Some(spec) = self.templates.get(code) {
                return Ok(spec);
            }
        }
        self.templates
            .get(&self.default_code)
            .ok_or_else(|| TemplateError::NoUsableTemplate {
                tried: candidates
                    .iter()
                    .cloned()
                    .chain(std::iter::once(self.default_code.clone()))
                    .collect(),
            })
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_candidate_wins() {
        let catalog = TemplateCatalog::builtin();
        let spec = catalog
            .resolve(&["en_gcc".to_string(), "ar_gcc".to_string()])
            .unwrap();
        assert_eq!(spec.code, "en_gcc");
    }

    #[test]
    fn test_unknown_candidates_fall_back_to_default() {
        let catalog = TemplateCatalog::builtin();
        let spec = catalog.resolve(&["fr_eu".to_string()]).unwrap();
        assert_eq!(spec.code, DEFAULT_TEMPLATE_CODE);
    }

    #[test]
    fn test_no_candidates_resolves_default() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(catalog.resolve(&[]).unwrap().code, DEFAULT_TEMPLATE_CODE);
    }

    #[test]
    fn test_empty_catalog_is_configuration_error() {
        let catalog = TemplateCatalog::empty(DEFAULT_TEMPLATE_CODE);
        let err = catalog.resolve(&["ar_gcc_v2".to_string()]).unwrap_err();
        let TemplateError::NoUsableTemplate { tried } = err;
        assert!(tried.contains(&"ar_gcc_v2".to_string()));
        assert!(tried.contains(&DEFAULT_TEMPLATE_CODE.to_string()));
    }
}
