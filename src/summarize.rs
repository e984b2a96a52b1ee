//! Summarization Stage

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::prompts;
use std::sync::Arc;

pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
}

impl Summarizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Answer the original question strictly from the rendered result table
    pub async fn summarize(&self, original_question: &str, result_table: &str) -> Result<String> {
        let prompt = prompts::summary_prompt(original_question, result_table);
        let answer = self.model.complete(&prompt).await?;
        Ok(answer.trim().to_string())
    }
}
