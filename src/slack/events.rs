//! Slack Events API payloads and mention handling

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

pub const INTRO_TEXT: &str = "Hi! I'm Scout. Mention me with a question about one of the datasets I can reach \
and I'll write a SQL query, run it and summarize what comes back. \
Ask me about `datasets` to see what I can answer, or start a question with `DEBUG` to watch each step.";

pub const THINKING_TEXT: &str = "Let me think about that...";

const DEBUG_PREFIX: &str = "DEBUG";

/// Outer envelope posted to the events endpoint
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: SlackEvent,
        #[serde(default)]
        event_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl SlackEvent {
    pub fn is_app_mention(&self) -> bool {
        self.kind == "app_mention"
    }

    /// Bots (including this one) never get answered
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some()
    }
}

/// What to do with a mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionAction {
    Intro,
    DescribeDatasets,
    Ask { question: String, debug: bool },
}

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<@[A-Z0-9]+>").expect("valid mention regex"))
}

/// Remove the bot mention, or every user mention when the bot id is unknown
pub fn strip_mention(text: &str, bot_user_id: Option<&str>) -> String {
    let stripped = match bot_user_id {
        Some(id) => text.replace(&format!("<@{}>", id), ""),
        None => mention_regex().replace_all(text, "").into_owned(),
    };
    stripped.trim().to_string()
}

pub fn classify_mention(text: &str, bot_user_id: Option<&str>) -> MentionAction {
    let text = strip_mention(text, bot_user_id);
    if text.is_empty() {
        return MentionAction::Intro;
    }

    let lower = text.to_lowercase();
    if lower.contains("intro") || lower.contains("hello") {
        return MentionAction::Intro;
    }
    if lower.contains("dataset") || lower.contains("access") {
        return MentionAction::DescribeDatasets;
    }

    let debug_question = text
        .get(..DEBUG_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(DEBUG_PREFIX))
        .map(|_| &text[DEBUG_PREFIX.len()..])
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        .map(|rest| rest.trim().to_string());

    match debug_question {
        Some(question) => MentionAction::Ask { question, debug: true },
        None => MentionAction::Ask {
            question: text,
            debug: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_verification() {
        let envelope: SlackEnvelope =
            serde_json::from_str(r#"{"type":"url_verification","token":"x","challenge":"c123"}"#).unwrap();
        assert!(matches!(envelope, SlackEnvelope::UrlVerification { challenge } if challenge == "c123"));
    }

    #[test]
    fn test_parse_app_mention() {
        let body = r#"{
            "type": "event_callback",
            "event_id": "Ev1",
            "event": {"type": "app_mention", "text": "<@U0BOT> avg grade?", "channel": "C1", "user": "U2", "ts": "1.0"}
        }"#;
        let SlackEnvelope::EventCallback { event, event_id } = serde_json::from_str::<SlackEnvelope>(body).unwrap() else {
            panic!("expected event callback");
        };
        assert_eq!(event_id.as_deref(), Some("Ev1"));
        assert!(event.is_app_mention());
        assert!(!event.is_from_bot());
        assert_eq!(event.thread_ts, None);
    }

    #[test]
    fn test_unknown_envelope_type() {
        let envelope: SlackEnvelope = serde_json::from_str(r#"{"type":"app_rate_limited"}"#).unwrap();
        assert!(matches!(envelope, SlackEnvelope::Other));
    }

    #[test]
    fn test_strip_mention() {
        assert_eq!(strip_mention("<@U0BOT> how many students?", Some("U0BOT")), "how many students?");
        assert_eq!(strip_mention("<@U0BOT> how many?", None), "how many?");
    }

    #[test]
    fn test_keyword_actions() {
        assert_eq!(classify_mention("<@U0BOT>", Some("U0BOT")), MentionAction::Intro);
        assert_eq!(classify_mention("<@U0BOT> hello there", Some("U0BOT")), MentionAction::Intro);
        assert_eq!(
            classify_mention("<@U0BOT> which datasets can you see?", Some("U0BOT")),
            MentionAction::DescribeDatasets
        );
    }

    #[test]
    fn test_debug_prefix() {
        assert_eq!(
            classify_mention("<@U0BOT> DEBUG average grade by age", Some("U0BOT")),
            MentionAction::Ask {
                question: "average grade by age".to_string(),
                debug: true
            }
        );
        assert_eq!(
            classify_mention("<@U0BOT> debug how many students?", Some("U0BOT")),
            MentionAction::Ask {
                question: "how many students?".to_string(),
                debug: true
            }
        );
        assert_eq!(
            classify_mention("<@U0BOT> DEBUGGING tips?", Some("U0BOT")),
            MentionAction::Ask {
                question: "DEBUGGING tips?".to_string(),
                debug: false
            }
        );
    }
}
