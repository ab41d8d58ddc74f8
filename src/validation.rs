//! Input checks shared by the four actions. Every check runs before any model call.

use crate::error::{Result, SuiteError};

pub const ANALYZE_TEXT_WARNING: &str = "Please enter some text to analyze.";
pub const IMAGE_PROMPT_WARNING: &str = "Please enter an image prompt.";

/// Trim `input` and reject it with `warning` when nothing is left.
pub fn require_text<'a>(input: &'a str, warning: &str) -> Result<&'a str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SuiteError::validation(warning));
    }
    Ok(trimmed)
}

/// Trim `input` and require it to contain `mask_token`.
pub fn require_masked_text<'a>(input: &'a str, mask_token: &str) -> Result<&'a str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SuiteError::validation(format!(
            "Please enter text with {mask_token} tokens."
        )));
    }
    if !trimmed.contains(mask_token) {
        return Err(SuiteError::validation(format!(
            "Please include {mask_token} in your text."
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text("  hello \n", "warn").unwrap(), "hello");
    }

    #[test]
    fn test_require_text_rejects_whitespace() {
        let err = require_text(" \t\n", "warn").unwrap_err();
        assert_eq!(err.to_string(), "warn");
    }

    #[test]
    fn test_require_masked_text() {
        assert_eq!(
            require_masked_text(" The earth is [MASK]. ", "[MASK]").unwrap(),
            "The earth is [MASK]."
        );
        let missing = require_masked_text("The earth is round.", "[MASK]").unwrap_err();
        assert_eq!(missing.to_string(), "Please include [MASK] in your text.");
        let empty = require_masked_text("   ", "[MASK]").unwrap_err();
        assert_eq!(empty.to_string(), "Please enter text with [MASK] tokens.");
    }

    #[test]
    fn test_mask_token_is_case_sensitive() {
        assert!(require_masked_text("The earth is [mask].", "[MASK]").is_err());
    }
}
