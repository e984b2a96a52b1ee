//! SQL Synthesis Stage
//!
//! Turns a scoped question into one candidate SQL statement for a single
//! dataset. Correctness is only checked when the statement runs.

use crate::error::Result;
use crate::extract::extract_sql;
use crate::llm::LanguageModel;
use crate::execution::SqlDialect;
use crate::prompts;
use crate::registry::DatasetDescriptor;
use std::sync::Arc;
use tracing::debug;

/// SQL proposed by the model before execution
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub raw: String,
    pub sql: Option<String>,
}

impl CandidateQuery {
    pub fn from_reply(raw: String) -> Self {
        let extracted = extract_sql(&raw);
        let sql = if extracted.is_empty() { None } else { Some(extracted) };
        Self { raw, sql }
    }
}

/// Synthesis stage backed by the "junior" model
pub struct SqlSynthesizer {
    model: Arc<dyn LanguageModel>,
    dialect: SqlDialect,
    max_rows: usize,
}

impl SqlSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, dialect: SqlDialect, max_rows: usize) -> Self {
        Self {
            model,
            dialect,
            max_rows,
        }
    }

    pub async fn synthesize(&self, question: &str, dataset: &DatasetDescriptor) -> Result<CandidateQuery> {
        let prompt = prompts::sql_generation_prompt(question, dataset, self.dialect, self.max_rows);
        let reply = self.model.complete(&prompt).await?;
        let candidate = CandidateQuery::from_reply(reply);
        debug!(dataset = %dataset.name, extracted = candidate.sql.is_some(), "Synthesized candidate query");
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_from_fenced_reply() {
        let candidate = CandidateQuery::from_reply("```sql\nSELECT 1\n```".to_string());
        assert_eq!(candidate.sql.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_blank_reply_has_no_sql() {
        let candidate = CandidateQuery::from_reply("   \n".to_string());
        assert_eq!(candidate.sql, None);
        assert_eq!(candidate.raw, "   \n");
    }
}
