//! Engine-reply interpreter
//!
//! Turns a reasoning engine's free-text reply into a structured outcome.
//! Upstream text generation is not contractually structured, so parsing runs
//! in two explicit passes: a strict line-based parse of `Status:` / `Error:`
//! fields, then a whole-text keyword scan for replies that drifted from the
//! requested shape. An unrecognizable reply is rejected, never accepted.

use serde::{Deserialize, Serialize};

/// Normalized feasibility verdict from one engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Accepted,
    RejectedIrrelevant,
    RejectedInvalidEntity,
}

/// Structured outcome of one engine reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutcome {
    pub status: ValidationStatus,
    pub detail: Option<String>,
}

impl EngineOutcome {
    pub fn rejected(status: ValidationStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ValidationStatus::Accepted
    }
}

/// Error values that mean "no error" rather than a real message.
const ERROR_PLACEHOLDERS: [&str; 3] = ["none", "empty", "n/a"];

/// Interpret a raw engine reply.
pub fn interpret(raw: &str) -> EngineOutcome {
    // Pass 1: line-based field parse.
    let mut status_value: Option<String> = None;
    let mut detail: Option<String> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();

        if status_value.is_none() && lower.starts_with("status:") {
            let value = trimmed["status:".len()..].trim();
            if !value.is_empty() {
                status_value = Some(value.to_string());
            }
        }

        if detail.is_none() && lower.starts_with("error:") {
            let value = trimmed["error:".len()..].trim();
            let value_lower = value.to_lowercase();
            if !value.is_empty() && !ERROR_PLACEHOLDERS.contains(&value_lower.as_str()) {
                detail = Some(value.to_string());
            }
        }
    }

    if let Some(ref value) = status_value {
        if let Some(status) = normalize_status(value) {
            return EngineOutcome { status, detail };
        }
    }

    // Pass 2: keyword scan over the whole reply. The bare VALID fallback
    // only applies when no status line was captured at all, so a reply
    // whose only token is `invalid_entity` cannot be accepted through its
    // `valid` substring.
    let upper = raw.to_uppercase();
    let status = if upper.contains("INVALID_ENTITY") || upper.contains("INVALID ENTITY") {
        ValidationStatus::RejectedInvalidEntity
    } else if upper.contains("IRRELEVANT") {
        ValidationStatus::RejectedIrrelevant
    } else if status_value.is_none() && upper.contains("VALID") {
        ValidationStatus::Accepted
    } else {
        // Conservative default: never let an unparseable reply pass.
        ValidationStatus::RejectedIrrelevant
    };

    EngineOutcome { status, detail }
}

/// Map a captured status value onto the taxonomy.
///
/// INVALID is tested before VALID since the latter is a substring of the
/// former.
fn normalize_status(value: &str) -> Option<ValidationStatus> {
    let upper = value.to_uppercase();
    if upper.contains("INVALID") {
        Some(ValidationStatus::RejectedInvalidEntity)
    } else if upper.contains("IRRELEVANT") {
        Some(ValidationStatus::RejectedIrrelevant)
    } else if upper.contains("VALID") {
        Some(ValidationStatus::Accepted)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_any_case() {
        for raw in [
            "Status: VALID",
            "status: valid",
            "  STATUS:   Valid  ",
            "Reasoning: fine\nStatus: VALID\nError: none",
        ] {
            assert_eq!(interpret(raw).status, ValidationStatus::Accepted, "{raw}");
        }
    }

    #[test]
    fn test_invalid_entity_status_line() {
        let outcome = interpret("Status: INVALID_ENTITY\nError: column 'foo' missing");
        assert_eq!(outcome.status, ValidationStatus::RejectedInvalidEntity);
        assert_eq!(outcome.detail.as_deref(), Some("column 'foo' missing"));
    }

    #[test]
    fn test_invalid_status_never_accepted_via_valid_substring() {
        let outcome = interpret("Status: INVALID");
        assert_eq!(outcome.status, ValidationStatus::RejectedInvalidEntity);
    }

    #[test]
    fn test_irrelevant_status_line() {
        let outcome = interpret("Status: IRRELEVANT\nError: not about the database");
        assert_eq!(outcome.status, ValidationStatus::RejectedIrrelevant);
        assert_eq!(outcome.detail.as_deref(), Some("not about the database"));
    }

    #[test]
    fn test_placeholder_error_values_skipped() {
        for raw in [
            "Status: VALID\nError: none",
            "Status: VALID\nError: EMPTY",
            "Status: VALID\nError: N/A",
            "Status: VALID\nError:",
        ] {
            let outcome = interpret(raw);
            assert!(outcome.is_accepted());
            assert_eq!(outcome.detail, None, "{raw}");
        }
    }

    #[test]
    fn test_first_status_wins() {
        let outcome = interpret("Status: IRRELEVANT\nStatus: VALID");
        assert_eq!(outcome.status, ValidationStatus::RejectedIrrelevant);
    }

    #[test]
    fn test_fallback_scan_invalid_entity_token() {
        let outcome = interpret("the request references an INVALID ENTITY in the schema");
        assert_eq!(outcome.status, ValidationStatus::RejectedInvalidEntity);
    }

    #[test]
    fn test_fallback_scan_irrelevant_token() {
        let outcome = interpret("This question is irrelevant to the database at hand.");
        assert_eq!(outcome.status, ValidationStatus::RejectedIrrelevant);
    }

    #[test]
    fn test_fallback_valid_token_without_status_line() {
        let outcome = interpret("The request looks VALID to me.");
        assert_eq!(outcome.status, ValidationStatus::Accepted);
    }

    #[test]
    fn test_unrecognized_status_line_blocks_valid_fallback() {
        // A status line was present but junk; the reply also contains
        // "valid" in prose. Conservative default applies.
        let outcome = interpret("Status: MAYBE\nThis could be valid.");
        assert_eq!(outcome.status, ValidationStatus::RejectedIrrelevant);
    }

    #[test]
    fn test_unparseable_reply_is_rejected() {
        let outcome = interpret("I'm sorry, I cannot help with that request.");
        assert_eq!(outcome.status, ValidationStatus::RejectedIrrelevant);
    }

    #[test]
    fn test_empty_reply_is_rejected() {
        assert_eq!(interpret("").status, ValidationStatus::RejectedIrrelevant);
    }
}
