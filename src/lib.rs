pub mod config;
pub mod documents;
pub mod error;
pub mod execution;
pub mod extract;
pub mod llm;
pub mod loader;
pub mod pipeline;
pub mod prompts;
pub mod registry;
pub mod routing;
pub mod slack;
pub mod summarize;
pub mod synthesis;

pub use config::Config;
pub use error::{Result, ScoutError};
pub use llm::{LanguageModel, LlmClient};
pub use pipeline::{Notifier, Outcome, Pipeline};
pub use registry::{DatasetDescriptor, DatasetRegistry};
