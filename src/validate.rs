//! Optional syntax checks for patched output.
//!
//! Matching never looks at Rust grammar, so a rule can produce a file that no
//! longer parses. These checks run on the in-memory result before it is
//! written.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("syn validation failed: {message}")]
    SynValidationFailed { message: String },
}

fn syn_error(e: syn::Error) -> ValidationError {
    ValidationError::SynValidationFailed {
        message: e.to_string(),
    }
}

/// Validate that a whole source file parses.
pub fn validate_file(source: &str) -> Result<(), ValidationError> {
    syn::parse_file(source).map_err(syn_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::QUANTITY_STEP_METHOD;

    #[test]
    fn test_validate_file() {
        assert!(validate_file("impl Foo { fn bar(&self) {} }").is_ok());
        assert!(validate_file("impl Foo { fn bar(&self) {} } }").is_err());
    }

    #[test]
    fn test_quantity_step_method_parses_inside_impl() {
        let source = format!("impl ExecutionBackend for MockBackend {{\n{QUANTITY_STEP_METHOD}\n}}\n");
        assert!(validate_file(&source).is_ok());
    }
}
