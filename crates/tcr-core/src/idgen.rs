//! # Identifier Generator
//!
//! Produces the two public-facing identifiers assigned at issuance:
//!
//! - [`CertificateNumberFormat::format`] — a human-legible, per-template
//!   sequential number (`{TEMPLATE}-{YEAR}-{SEQ}`). The sequence value is
//!   drawn by the store inside the issuance critical section, so numbers
//!   are collision-free without randomness.
//! - [`new_verification_code`] — an unguessable token drawn from the
//!   operating-system CSPRNG, URL-safe, unrelated to the number.
//!
//! Both values are persisted in the same transaction as the issued-row
//! insert; the store's uniqueness indexes are the final race-safety
//! backstop. On a (theoretical) verification-code collision the store
//! retries code generation exactly once — the number sequence is never
//! re-drawn blindly, so a real contention bug surfaces as an error instead
//! of a silent gap.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

use crate::error::ValidationError;
use crate::identity::{CertificateNumber, VerificationCode};

/// Number of CSPRNG-drawn characters in a generated verification code
/// suffix. 32 alphanumeric characters ≈ 190 bits of entropy.
const CODE_SUFFIX_LEN: usize = 32;

/// Formatter for human-legible certificate numbers.
///
/// Stateless and pure: the caller supplies the template code, the issuance
/// year, and the sequence value. Sequencing itself is owned by the store,
/// which draws the next value per `(tenant, template)` while holding the
/// issuance lock.
#[derive(Debug, Clone)]
pub struct CertificateNumberFormat {
    /// Zero-padded width of the sequence segment.
    seq_width: usize,
}

impl CertificateNumberFormat {
    /// The default format: five-digit zero-padded sequence.
    pub fn new() -> Self {
        Self { seq_width: 5 }
    }

    /// Override the sequence width (bounded to 4..=10).
    pub fn with_seq_width(mut self, width: usize) -> Self {
        self.seq_width = width.clamp(4, 10);
        self
    }

    /// Format a certificate number, e.g. `GCC-2026-00042`.
    ///
    /// The template code is upper-cased; it must be 2-16 ASCII
    /// alphanumeric characters.
    pub fn format(
        &self,
        template_code: &str,
        year: i32,
        seq: u64,
    ) -> Result<CertificateNumber, ValidationError> {
        let code_ok = (2..=16).contains(&template_code.len())
            && template_code.chars().all(|c| c.is_ascii_alphanumeric());
        if !code_ok {
            return Err(ValidationError::InvalidTemplateCode(
                template_code.to_string(),
            ));
        }
        let number = format!(
            "{}-{year}-{seq:0width$}",
            template_code.to_ascii_uppercase(),
            width = self.seq_width
        );
        CertificateNumber::parse(&number)
    }
}

impl Default for CertificateNumberFormat {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw a fresh verification code from the OS CSPRNG.
///
/// The code is deliberately unrelated to the certificate number: holding
/// one (or any quantity of issued numbers) gives no advantage in guessing
/// another certificate's code.
pub fn new_verification_code() -> VerificationCode {
    let suffix: String = (&mut OsRng)
        .sample_iter(&Alphanumeric)
        .take(CODE_SUFFIX_LEN)
        .map(char::from)
        .collect();
    VerificationCode::from_suffix(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_basic() {
        let fmt = CertificateNumberFormat::new();
        let n = fmt.format("gcc", 2026, 42).unwrap();
        assert_eq!(n.as_str(), "GCC-2026-00042");
    }

    #[test]
    fn test_format_custom_width() {
        let fmt = CertificateNumberFormat::new().with_seq_width(7);
        let n = fmt.format("EXP", 2026, 9).unwrap();
        assert_eq!(n.as_str(), "EXP-2026-0000009");
    }

    #[test]
    fn test_format_wide_sequence_not_truncated() {
        let fmt = CertificateNumberFormat::new();
        let n = fmt.format("GCC", 2026, 1_234_567).unwrap();
        assert_eq!(n.as_str(), "GCC-2026-1234567");
    }

    #[test]
    fn test_format_rejects_bad_template_code() {
        let fmt = CertificateNumberFormat::new();
        assert!(fmt.format("", 2026, 1).is_err());
        assert!(fmt.format("a", 2026, 1).is_err());
        assert!(fmt.format("has space", 2026, 1).is_err());
        assert!(fmt.format("seventeen-chars-x", 2026, 1).is_err());
    }

    #[test]
    fn test_sequential_numbers_are_distinct_and_ordered() {
        let fmt = CertificateNumberFormat::new();
        let a = fmt.format("GCC", 2026, 1).unwrap();
        let b = fmt.format("GCC", 2026, 2).unwrap();
        assert_ne!(a, b);
        assert!(a.as_str() < b.as_str());
    }

    #[test]
    fn test_generated_code_parses_and_is_long_enough() {
        let code = new_verification_code();
        let reparsed = VerificationCode::parse(code.as_str()).unwrap();
        assert_eq!(code, reparsed);
        assert_eq!(
            code.as_str().len(),
            VerificationCode::PREFIX.len() + CODE_SUFFIX_LEN
        );
    }

    #[test]
    fn test_generated_codes_do_not_repeat() {
        // Statistical smoke test: 190 bits of entropy never collides in 100 draws.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(new_verification_code()));
        }
    }
}
