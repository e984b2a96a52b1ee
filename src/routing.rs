//! Routing Stage
//!
//! Asks the model whether a question is answerable and, if so, which
//! dataset it targets. Replies are parsed against a closed marker
//! vocabulary; anything else is a template violation.

use crate::llm::LanguageModel;
use crate::prompts::{self, CONTINUE_MARKER, REJECT_MARKER};
use crate::registry::{DatasetDescriptor, DatasetRegistry};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_REJECTION: &str = "I can't answer that question with the data I have access to.";

/// Parsed router reply
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingReply {
    Rejected { reason: String },
    Routed { dataset: Arc<DatasetDescriptor>, question: String },
    /// Marker-shaped dataset token that is not in the registry
    UnknownDataset { name: String },
    /// CONTINUE without a dataset while several datasets are registered
    MissingDataset,
    /// Reply does not start with a known marker
    Unparsed { reply: String },
}

/// Outcome of routing one question
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    Answerable {
        dataset: Arc<DatasetDescriptor>,
        rephrased_question: String,
    },
    Unanswerable {
        reason: String,
    },
}

/// Reasons the router could not produce a decision
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingError {
    TemplateViolation { reply: String },
    UnknownDataset { name: String },
    MissingDataset,
    /// The model call itself failed; the cause is logged, not shown
    ModelUnavailable,
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::TemplateViolation { reply } => {
                write!(f, "The router reply did not follow the expected template: {}", reply)
            }
            RoutingError::UnknownDataset { name } => {
                write!(f, "The router selected a dataset I don't know about: {}", name)
            }
            RoutingError::MissingDataset => {
                write!(f, "The router did not say which dataset to query.")
            }
            RoutingError::ModelUnavailable => {
                write!(f, "The router is unavailable right now. Please try again later.")
            }
        }
    }
}

/// Strip decoration models like to add around markers ("REJECT:", "**CONTINUE**")
fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_')
}

fn is_marker_shaped(token: &str) -> bool {
    let mut chars = token.chars();
    token.len() >= 2
        && chars.next().map_or(false, |c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Split off the first whitespace-delimited token
fn split_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    }
}

pub fn parse_routing_reply(text: &str, registry: &DatasetRegistry) -> RoutingReply {
    let (first, rest) = split_token(text);
    let marker = clean_token(first);

    if marker.eq_ignore_ascii_case(REJECT_MARKER) {
        let reason = if rest.is_empty() { DEFAULT_REJECTION.to_string() } else { rest.to_string() };
        return RoutingReply::Rejected { reason };
    }

    if !marker.eq_ignore_ascii_case(CONTINUE_MARKER) {
        return RoutingReply::Unparsed { reply: text.trim().to_string() };
    }

    let (candidate, remainder) = split_token(rest);
    let dataset_token = clean_token(candidate);

    if !dataset_token.is_empty() {
        if let Some(dataset) = registry.resolve(dataset_token) {
            return RoutingReply::Routed {
                dataset,
                question: remainder.to_string(),
            };
        }
        if is_marker_shaped(dataset_token) {
            return RoutingReply::UnknownDataset {
                name: dataset_token.to_string(),
            };
        }
    }

    match registry.single() {
        Some(dataset) => RoutingReply::Routed {
            dataset,
            question: rest.to_string(),
        },
        None => RoutingReply::MissingDataset,
    }
}

/// Routing stage backed by the "senior" model
pub struct Router {
    model: Arc<dyn LanguageModel>,
    registry: Arc<DatasetRegistry>,
}

impl Router {
    pub fn new(model: Arc<dyn LanguageModel>, registry: Arc<DatasetRegistry>) -> Self {
        Self { model, registry }
    }

    pub async fn route(&self, question: &str) -> std::result::Result<RoutingDecision, RoutingError> {
        let prompt = prompts::routing_prompt(question, &self.registry);
        let reply = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| {
                warn!(error = %e, "Router model call failed");
                RoutingError::ModelUnavailable
            })?;

        match parse_routing_reply(&reply, &self.registry) {
            RoutingReply::Rejected { reason } => {
                info!("Router rejected question");
                Ok(RoutingDecision::Unanswerable { reason })
            }
            RoutingReply::Routed { dataset, question: rephrased } => {
                let rephrased_question = if rephrased.is_empty() { question.to_string() } else { rephrased };
                info!(dataset = %dataset.name, "Router selected dataset");
                Ok(RoutingDecision::Answerable {
                    dataset,
                    rephrased_question,
                })
            }
            RoutingReply::UnknownDataset { name } => {
                warn!(dataset = %name, "Router named an unregistered dataset");
                Err(RoutingError::UnknownDataset { name })
            }
            RoutingReply::MissingDataset => {
                warn!("Router reply had no dataset marker");
                Err(RoutingError::MissingDataset)
            }
            RoutingReply::Unparsed { reply } => {
                warn!("Router reply violated the marker template");
                Err(RoutingError::TemplateViolation { reply })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_datasets() -> DatasetRegistry {
        let trends: DatasetDescriptor = DatasetRegistry::google_trends().datasets()[0].as_ref().clone();
        let student = DatasetRegistry::student().datasets()[0].as_ref().clone();
        DatasetRegistry::new(vec![student, trends]).unwrap()
    }

    #[test]
    fn test_reject_with_explanation() {
        let reply = parse_routing_reply("REJECT I only know about students.", &DatasetRegistry::student());
        assert_eq!(
            reply,
            RoutingReply::Rejected {
                reason: "I only know about students.".to_string()
            }
        );
    }

    #[test]
    fn test_decorated_reject_marker() {
        let reply = parse_routing_reply("**REJECT:** No weather data.", &DatasetRegistry::student());
        assert!(matches!(reply, RoutingReply::Rejected { reason } if reason == "No weather data."));
    }

    #[test]
    fn test_bare_reject_gets_default_reason() {
        let reply = parse_routing_reply("REJECT", &DatasetRegistry::student());
        assert!(matches!(reply, RoutingReply::Rejected { reason } if reason == DEFAULT_REJECTION));
    }

    #[test]
    fn test_continue_with_marker() {
        let reply = parse_routing_reply(
            "CONTINUE DEMOGRAPHIC What is the average final grade by weekly study time?",
            &two_datasets(),
        );
        match reply {
            RoutingReply::Routed { dataset, question } => {
                assert_eq!(dataset.name, "student_demographic");
                assert_eq!(question, "What is the average final grade by weekly study time?");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_dataset_is_not_guessed() {
        let reply = parse_routing_reply("CONTINUE WEATHER How hot was it?", &DatasetRegistry::student());
        assert_eq!(
            reply,
            RoutingReply::UnknownDataset {
                name: "WEATHER".to_string()
            }
        );
    }

    #[test]
    fn test_missing_marker_with_single_dataset() {
        let reply = parse_routing_reply("CONTINUE How do absences vary by age?", &DatasetRegistry::student());
        match reply {
            RoutingReply::Routed { dataset, question } => {
                assert_eq!(dataset.marker, "DEMOGRAPHIC");
                assert_eq!(question, "How do absences vary by age?");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_missing_marker_with_several_datasets() {
        let reply = parse_routing_reply("CONTINUE how do absences vary by age?", &two_datasets());
        assert_eq!(reply, RoutingReply::MissingDataset);
    }

    #[test]
    fn test_unparsed_reply() {
        let reply = parse_routing_reply("Sure, let me look into that.", &DatasetRegistry::student());
        assert_eq!(
            reply,
            RoutingReply::Unparsed {
                reply: "Sure, let me look into that.".to_string()
            }
        );
    }
}
