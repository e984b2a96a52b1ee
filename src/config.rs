//! Configuration
//!
//! Built once at startup from the environment (after `.env` has been
//! loaded) and passed explicitly to everything that needs it.

use crate::error::{Result, ScoutError};
use crate::execution::{BigQueryStore, DataStore, QueryExecutor, SqliteStore};
use crate::llm::{LlmClient, ModelSettings};
use crate::pipeline::{Pipeline, PipelineSettings, StageModels};
use crate::registry::DatasetRegistry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Prompts ask for fewer than `max_rows` rows
const MIN_MAX_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Sqlite { path: PathBuf },
    BigQuery { project_id: String, access_token: String },
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub signing_secret: String,
    pub bot_user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub router_model: String,
    pub sql_model: String,
    pub summary_model: String,
    pub temperature: f32,
    pub llm_timeout: Duration,
    pub store: StoreConfig,
    pub query_timeout: Duration,
    pub max_rows: usize,
    pub registry_path: Option<PathBuf>,
    pub read_only_guard: bool,
    pub slack: Option<SlackConfig>,
    pub bind_addr: String,
    pub vector_index_path: PathBuf,
    pub embedding_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build from an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ScoutError::Config(format!("{} is not set", key)));

        // The original deployment used OPENAI_KEY; accept it as a fallback
        let openai_api_key = get("OPENAI_API_KEY")
            .or_else(|| get("OPENAI_KEY"))
            .ok_or_else(|| ScoutError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let store = match get("SCOUT_STORE").as_deref().unwrap_or("sqlite") {
            "sqlite" => StoreConfig::Sqlite {
                path: PathBuf::from(get("SCOUT_SQLITE_PATH").unwrap_or_else(|| "student.db".to_string())),
            },
            "bigquery" => StoreConfig::BigQuery {
                project_id: require("BIGQUERY_PROJECT")?,
                access_token: require("BIGQUERY_ACCESS_TOKEN")?,
            },
            other => {
                return Err(ScoutError::Config(format!(
                    "SCOUT_STORE must be 'sqlite' or 'bigquery', got '{}'",
                    other
                )))
            }
        };

        let slack = match (get("SLACK_BOT_TOKEN"), get("SLACK_SIGNING_SECRET")) {
            (Some(bot_token), Some(signing_secret)) => Some(SlackConfig {
                bot_token,
                signing_secret,
                bot_user_id: get("SLACK_BOT_USER_ID"),
            }),
            _ => None,
        };

        let max_rows: usize = parse_or(&get("SCOUT_MAX_ROWS"), "SCOUT_MAX_ROWS", 50)?;
        if max_rows < MIN_MAX_ROWS {
            return Err(ScoutError::Config(format!(
                "SCOUT_MAX_ROWS must be at least {}, got {}",
                MIN_MAX_ROWS, max_rows
            )));
        }

        let router_model = get("SCOUT_ROUTER_MODEL").unwrap_or_else(|| "gpt-4o".to_string());

        Ok(Self {
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            sql_model: get("SCOUT_SQL_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            summary_model: get("SCOUT_SUMMARY_MODEL").unwrap_or_else(|| router_model.clone()),
            router_model,
            temperature: parse_or(&get("SCOUT_TEMPERATURE"), "SCOUT_TEMPERATURE", 0.0)?,
            llm_timeout: Duration::from_secs(parse_or(&get("SCOUT_LLM_TIMEOUT_SECS"), "SCOUT_LLM_TIMEOUT_SECS", 60)?),
            store,
            query_timeout: Duration::from_secs(parse_or(
                &get("SCOUT_QUERY_TIMEOUT_SECS"),
                "SCOUT_QUERY_TIMEOUT_SECS",
                30,
            )?),
            max_rows,
            registry_path: get("SCOUT_REGISTRY_PATH").map(PathBuf::from),
            read_only_guard: parse_or(&get("SCOUT_READ_ONLY_GUARD"), "SCOUT_READ_ONLY_GUARD", false)?,
            slack,
            bind_addr: get("SCOUT_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3345".to_string()),
            vector_index_path: PathBuf::from(get("VECTOR_INDEX_PATH").unwrap_or_else(|| "vector_index.json".to_string())),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string()),
        })
    }

    /// Registry file if configured, otherwise the built-in datasets for the store
    pub fn load_registry(&self) -> Result<DatasetRegistry> {
        match self.registry_path {
            Some(ref path) => DatasetRegistry::load(path),
            None => Ok(match self.store {
                StoreConfig::Sqlite { .. } => DatasetRegistry::student(),
                StoreConfig::BigQuery { .. } => DatasetRegistry::google_trends(),
            }),
        }
    }

    pub fn build_store(&self) -> Result<Arc<dyn DataStore>> {
        let store: Arc<dyn DataStore> = match self.store {
            StoreConfig::Sqlite { ref path } => Arc::new(SqliteStore::new(path).read_only(self.read_only_guard)),
            StoreConfig::BigQuery {
                ref project_id,
                ref access_token,
            } => Arc::new(
                BigQueryStore::new(project_id.clone(), access_token.clone())
                    .map_err(|e| ScoutError::Config(e.to_string()))?,
            ),
        };
        Ok(store)
    }

    pub fn llm_client(&self, model: &str) -> Result<LlmClient> {
        LlmClient::new(
            self.openai_api_key.clone(),
            self.openai_base_url.clone(),
            ModelSettings::new(model, self.temperature),
            self.llm_timeout,
        )
    }

    /// Wire the full pipeline from this configuration
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let registry = Arc::new(self.load_registry()?);
        let models = StageModels {
            router: Arc::new(self.llm_client(&self.router_model)?),
            sql: Arc::new(self.llm_client(&self.sql_model)?),
            summarizer: Arc::new(self.llm_client(&self.summary_model)?),
        };

        let mut executor = QueryExecutor::new(self.build_store()?);
        if self.read_only_guard {
            executor = executor.with_read_only_guard();
        }

        info!(
            datasets = registry.len(),
            router_model = %self.router_model,
            sql_model = %self.sql_model,
            read_only_guard = self.read_only_guard,
            "Pipeline configured"
        );

        Ok(Pipeline::new(
            models,
            executor,
            registry,
            PipelineSettings {
                query_timeout: self.query_timeout,
                max_rows: self.max_rows,
            },
        ))
    }
}

fn parse_or<T: std::str::FromStr>(value: &Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| ScoutError::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}
