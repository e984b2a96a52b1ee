//! SQL Extractor
//!
//! Pulls one SQL statement out of free-form model output.

use regex::Regex;
use std::sync::OnceLock;

fn sql_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)```sql\s*(.*?)\s*```").expect("valid SQL block pattern"))
}

/// Contents of the first ```sql fenced block, or the whole trimmed text when
/// there is none. Callers still have to validate the result at execution time.
pub fn extract_sql(text: &str) -> String {
    match sql_block_pattern().captures(text).and_then(|c| c.get(1)) {
        Some(block) => block.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_block_regardless_of_prose() {
        let reply = "Sure! Here is the query:\n```sql\n  SELECT age, AVG(G3) FROM student_demographic GROUP BY age;\n```\nLet me know.";
        assert_eq!(
            extract_sql(reply),
            "SELECT age, AVG(G3) FROM student_demographic GROUP BY age;"
        );
    }

    #[test]
    fn test_first_block_wins() {
        let reply = "```sql\nSELECT 1\n```\nor\n```sql\nSELECT 2\n```";
        assert_eq!(extract_sql(reply), "SELECT 1");
    }

    #[test]
    fn test_tag_is_case_insensitive() {
        assert_eq!(extract_sql("```SQL\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_untagged_block_falls_back_to_whole_text() {
        let reply = "```\nSELECT 1\n```";
        assert_eq!(extract_sql(reply), reply);
    }

    #[test]
    fn test_fallback_is_trimmed_and_idempotent() {
        let reply = "   SELECT COUNT(*) FROM student_demographic  \n";
        let once = extract_sql(reply);
        assert_eq!(once, "SELECT COUNT(*) FROM student_demographic");
        assert_eq!(extract_sql(&once), once);
    }

    #[test]
    fn test_empty_block_yields_empty_string() {
        assert_eq!(extract_sql("```sql\n\n```"), "");
    }
}
