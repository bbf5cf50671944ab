use crate::config::ValidationConfig;
use crate::error::{DccamError, InputField, Result, ValidationError};
use regex::Regex;

/// Format checks for operator-entered codes.
///
/// Patterns are anchored so that a partial match never passes. Codes end
/// up in the `X-Photo-Name` header, so only printable ASCII is accepted
/// whatever the configured pattern allows.
#[derive(Debug, Clone)]
pub struct InputValidator {
    store_code: Regex,
    reference_code: Regex,
}

impl InputValidator {
    pub fn new(store_code_pattern: &str, reference_code_pattern: &str) -> Result<Self> {
        Ok(Self {
            store_code: compile_full_match(store_code_pattern)?,
            reference_code: compile_full_match(reference_code_pattern)?,
        })
    }

    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        Self::new(&config.store_code_pattern, &config.reference_code_pattern)
    }

    /// Trim and check both codes, store code first.
    pub fn validate(
        &self,
        store_code: &str,
        reference_code: &str,
    ) -> std::result::Result<(String, String), ValidationError> {
        let store_code = store_code.trim();
        if !is_printable_ascii(store_code) || !self.store_code.is_match(store_code) {
            return Err(ValidationError {
                field: InputField::StoreCode,
                value: store_code.to_string(),
            });
        }

        let reference_code = reference_code.trim();
        if !is_printable_ascii(reference_code) || !self.reference_code.is_match(reference_code) {
            return Err(ValidationError {
                field: InputField::ReferenceCode,
                value: reference_code.to_string(),
            });
        }

        Ok((store_code.to_string(), reference_code.to_string()))
    }
}

fn is_printable_ascii(code: &str) -> bool {
    code.bytes().all(|b| b.is_ascii_graphic())
}

fn compile_full_match(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| DccamError::system(format!("Invalid pattern '{}': {}", pattern, e)))
}
