//! Prompts - Templates for the router, SQL generator and summarizer
//!
//! The router plays a senior analyst who decides whether a question can be
//! answered and scopes it; the SQL generator plays a junior analyst who only
//! ever sees one dataset.

use crate::execution::SqlDialect;
use crate::registry::{DatasetDescriptor, DatasetRegistry};

/// First token of a router reply that declines the question
pub const REJECT_MARKER: &str = "REJECT";

/// First token of a router reply that hands the question on
pub const CONTINUE_MARKER: &str = "CONTINUE";

pub fn routing_prompt(question: &str, registry: &DatasetRegistry) -> String {
    format!(
        r#"# Role
You are a senior data analyst. A junior analyst will write one SQL query against exactly one of the datasets below. Your job is to decide whether the question can be answered from these datasets and, if so, to hand the junior analyst a precise, scoped version of it.

# Available datasets
{datasets}

# User question
"{question}"

# Instructions
- Judge the question using ONLY the datasets listed above. Do not assume any other data exists.
- If the question cannot be answered from these datasets, or is too vague to turn into a query, reply with:
  {reject} <short explanation for the user of why, and what they could ask instead>
- Otherwise reply with:
  {cont} <DATASET> <rephrased question>
  where <DATASET> is exactly one of the dataset markers listed above.
- The rephrased question must ask for grouped or aggregated results (counts, averages, distributions by category), never for raw individual rows.
- The rephrased question must never ask to insert, update, delete, create, drop or otherwise modify data.
- Reply on a single line, starting with {reject} or {cont}. No other text."#,
        datasets = registry.routing_overview(),
        question = question,
        reject = REJECT_MARKER,
        cont = CONTINUE_MARKER,
    )
}

pub fn sql_generation_prompt(
    question: &str,
    dataset: &DatasetDescriptor,
    dialect: SqlDialect,
    max_rows: usize,
) -> String {
    format!(
        r#"# Role
You are a junior data analyst writing {dialect} queries.

# Database schema
{schema}

# Preferred query shape
Aggregate in SQL so the result stays small. Follow this shape where it fits the question:
{preferred}

# Question
"{question}"

# Instructions
- Write one syntactically valid {dialect} query that answers the question using only the schema above.
- Do not include any data modification statements (INSERT, UPDATE, DELETE, DROP, ALTER, CREATE, REPLACE, TRUNCATE).
- The query must return fewer than {max_rows} rows; use GROUP BY, aggregates and LIMIT.
- Return only the SQL query, wrapped in ```sql``` tags. No additional text, explanation or formatting."#,
        dialect = dialect.label(),
        schema = dataset.schema_text(),
        preferred = dataset.preferred_query.replace("<max_rows>", &max_rows.saturating_sub(1).max(1).to_string()),
        question = question,
        max_rows = max_rows,
    )
}

pub fn summary_prompt(question: &str, result_table: &str) -> String {
    format!(
        r#"# Context
You are a helpful data analyst.

# Table
Use ONLY the data in the table below to answer the question. Do not make assumptions or use external knowledge.

{table}

# User Question
{question}

# Instructions
- Answer the question based only on the table above.
- Be concise and specific.
- If the answer is not clearly supported by the data, say so."#,
        table = result_table,
        question = question,
    )
}
