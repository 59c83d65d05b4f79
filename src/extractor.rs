//! Statement extractor
//!
//! Pulls a single SQL statement out of a noisy generated reply (commentary,
//! markdown fences, multiple candidate fragments). Shape matchers run in a
//! fixed priority order: outer value-producing statements (INSERT, CREATE
//! TABLE) are tested before SELECT so a nested retrieval sub-clause never
//! truncates the enclosing statement.

use crate::error::{QueryError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SQL_FENCE: Regex = Regex::new(r"(?s)```sql\s*\n(.*?)\n\s*```").unwrap();
    static ref BARE_FENCE: Regex = Regex::new(r"(?s)```\s*\n(.*?)\n\s*```").unwrap();

    /// Shape matchers in priority order. First match wins.
    static ref STATEMENT_SHAPES: Vec<Regex> = vec![
        Regex::new(r"(?is)\bWITH\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bINSERT\s+INTO\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bUPDATE\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bDELETE\s+FROM\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bCREATE\s+TABLE\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bCREATE\s+INDEX\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bALTER\s+TABLE\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bDROP\s+TABLE\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bDROP\s+INDEX\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bTRUNCATE\s+TABLE\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bCREATE\s+DATABASE\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bDROP\s+DATABASE\s+.*?;").unwrap(),
        Regex::new(r"(?is)\bSELECT\s+.*?;").unwrap(),
    ];
}

/// Statement keywords accepted by the sanity check.
const STATEMENT_KEYWORDS: [&str; 9] = [
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE", "WITH",
];

/// Extract one statement from raw generated text.
///
/// Fenced blocks are unwrapped first; then the shape matchers are tried in
/// priority order. If nothing matches, the stripped working text is
/// returned verbatim so the caller's sanity check can reject it with the
/// original content in hand.
pub fn extract(raw: &str) -> String {
    let stripped = strip_fences(raw);

    for shape in STATEMENT_SHAPES.iter() {
        if let Some(found) = shape.find(&stripped) {
            return found.as_str().trim().to_string();
        }
    }

    stripped.trim().to_string()
}

/// Unwrap ```sql fenced blocks (and bare ``` fences) to their contents.
fn strip_fences(raw: &str) -> String {
    let pass = SQL_FENCE.replace_all(raw, "$1");
    BARE_FENCE.replace_all(&pass, "$1").into_owned()
}

/// Syntax sanity check applied before a statement may leave the pipeline:
/// non-empty, terminated, and starting with a recognized statement keyword.
pub fn check_statement(statement: &str) -> Result<()> {
    let trimmed = statement.trim();
    if trimmed.is_empty() {
        return Err(QueryError::MalformedStatement(
            "generated statement is empty".to_string(),
        ));
    }
    if !trimmed.ends_with(';') {
        return Err(QueryError::MalformedStatement(format!(
            "statement does not end with ';': {}",
            truncate(trimmed, 80)
        )));
    }
    let upper = trimmed.to_uppercase();
    if !STATEMENT_KEYWORDS.iter().any(|kw| upper.starts_with(kw)) {
        return Err(QueryError::MalformedStatement(format!(
            "statement does not start with a recognized operation: {}",
            truncate(trimmed, 80)
        )));
    }
    Ok(())
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_sql_fence() {
        let raw = "Here is the query:\n```sql\nSELECT * FROM players;\n```\nHope that helps.";
        assert_eq!(extract(raw), "SELECT * FROM players;");
    }

    #[test]
    fn test_extracts_from_bare_fence() {
        let raw = "```\nSELECT name FROM teams;\n```";
        assert_eq!(extract(raw), "SELECT name FROM teams;");
    }

    #[test]
    fn test_outer_insert_wins_over_nested_select() {
        let raw = "INSERT INTO archive (id, name)\nSELECT id, name FROM players WHERE retired = 1;";
        let extracted = extract(raw);
        assert!(extracted.starts_with("INSERT INTO"));
        assert!(extracted.contains("SELECT id, name FROM players"));
        assert!(extracted.ends_with(';'));
    }

    #[test]
    fn test_create_table_as_select_captured_whole() {
        let raw = "Use this:\nCREATE TABLE top_scorers AS SELECT name, runs FROM players ORDER BY runs DESC;";
        let extracted = extract(raw);
        assert!(extracted.starts_with("CREATE TABLE"));
        assert!(extracted.ends_with(';'));
    }

    #[test]
    fn test_with_prefixed_statement_has_top_priority() {
        let raw = "WITH ranked AS (SELECT * FROM scores) SELECT * FROM ranked WHERE rank <= 3;";
        let extracted = extract(raw);
        assert!(extracted.starts_with("WITH"));
    }

    #[test]
    fn test_drop_database_shape() {
        let raw = "Sure — the statement below removes it.\n\nDROP DATABASE cricket_info;";
        assert_eq!(extract(raw), "DROP DATABASE cricket_info;");
    }

    #[test]
    fn test_no_match_returns_stripped_text() {
        let raw = "I could not produce a statement for this request.";
        assert_eq!(extract(raw), raw);
    }

    #[test]
    fn test_check_statement_accepts_terminated_statement() {
        assert!(check_statement("SELECT 1;").is_ok());
        assert!(check_statement("  DROP DATABASE cricket_info;  ").is_ok());
    }

    #[test]
    fn test_check_statement_rejects_untermined_or_alien_text() {
        assert!(check_statement("").is_err());
        assert!(check_statement("SELECT 1").is_err());
        assert!(check_statement("sorry, no statement here;").is_err());
    }
}
