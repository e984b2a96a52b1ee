//! Slack Events API server
//!
//! Verifies every request, acknowledges immediately and answers mentions
//! from a spawned task so Slack never waits on the pipeline.

use crate::config::Config;
use crate::error::{Result, ScoutError};
use crate::pipeline::{NoopNotifier, Pipeline};
use crate::slack::client::{SlackClient, SlackNotifier};
use crate::slack::events::{classify_mention, MentionAction, SlackEnvelope, SlackEvent, INTRO_TEXT, THINKING_TEXT};
use crate::slack::signature::{SignatureError, SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Present when Slack redelivers an event it thinks we missed
const RETRY_HEADER: &str = "x-slack-retry-num";

/// Shared between handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub slack: SlackClient,
    pub verifier: Arc<SignatureVerifier>,
    pub bot_user_id: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub datasets: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        datasets: state.pipeline.registry().len(),
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn slack_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (Some(timestamp), Some(signature)) = (
        header_str(&headers, TIMESTAMP_HEADER),
        header_str(&headers, SIGNATURE_HEADER),
    ) else {
        warn!("Slack request without signature headers");
        return (StatusCode::FORBIDDEN, "Verification error").into_response();
    };

    match state
        .verifier
        .verify(timestamp, &body, signature, chrono::Utc::now().timestamp())
    {
        Ok(()) => {}
        Err(e @ (SignatureError::Stale { .. } | SignatureError::Mismatch)) => {
            warn!(error = %e, "Rejected Slack request");
            return (StatusCode::FORBIDDEN, "Invalid request").into_response();
        }
        Err(e) => {
            warn!(error = %e, "Slack signature verification failed");
            return (StatusCode::FORBIDDEN, "Verification error").into_response();
        }
    }

    let envelope: SlackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Unreadable Slack payload");
            return (StatusCode::BAD_REQUEST, "Invalid payload").into_response();
        }
    };

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            info!("Answering Slack URL verification");
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        SlackEnvelope::EventCallback { event, event_id } => {
            if headers.contains_key(RETRY_HEADER) {
                info!(event_id = ?event_id, "Ignoring Slack retry");
            } else if event.is_app_mention() && !event.is_from_bot() {
                info!(event_id = ?event_id, channel = ?event.channel, "Received mention");
                tokio::spawn(handle_mention(state, event));
            }
            StatusCode::OK.into_response()
        }
        SlackEnvelope::Other => StatusCode::OK.into_response(),
    }
}

async fn reply(state: &AppState, channel: &str, thread_ts: Option<&str>, text: &str) {
    if let Err(e) = state.slack.post_message(channel, text, thread_ts).await {
        error!(error = %e, channel, "Failed to post reply");
    }
}

async fn handle_mention(state: AppState, event: SlackEvent) {
    let Some(channel) = event.channel.as_deref() else {
        warn!("Mention without a channel");
        return;
    };
    let thread_ts = event.thread_ts.as_deref();
    let text = event.text.as_deref().unwrap_or_default();

    match classify_mention(text, state.bot_user_id.as_deref()) {
        MentionAction::Intro => reply(&state, channel, thread_ts, INTRO_TEXT).await,
        MentionAction::DescribeDatasets => {
            let description = format!("```\n{}\n```", state.pipeline.registry().describe());
            reply(&state, channel, thread_ts, &description).await;
        }
        MentionAction::Ask { question, .. } if question.is_empty() => {
            reply(&state, channel, thread_ts, INTRO_TEXT).await
        }
        MentionAction::Ask { question, debug } => {
            reply(&state, channel, thread_ts, THINKING_TEXT).await;
            let answer = if debug {
                let notifier = SlackNotifier::new(state.slack.clone(), channel, event.thread_ts.clone());
                state.pipeline.answer(&question, &notifier).await
            } else {
                state.pipeline.answer(&question, &NoopNotifier).await
            };
            reply(&state, channel, thread_ts, &answer).await;
        }
    }
}

/// Build the pipeline and serve the events endpoint until the process stops
pub async fn serve(config: &Config) -> Result<()> {
    let slack_config = config.slack.as_ref().ok_or_else(|| {
        ScoutError::Config("SLACK_BOT_TOKEN and SLACK_SIGNING_SECRET must be set to serve".to_string())
    })?;

    let pipeline = Arc::new(config.build_pipeline()?);
    let slack = SlackClient::new(slack_config.bot_token.clone())?;

    let bot_user_id = match slack_config.bot_user_id {
        Some(ref id) => Some(id.clone()),
        None => match slack.bot_user_id().await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Could not look up bot user id; stripping every mention instead");
                None
            }
        },
    };

    let state = AppState {
        pipeline,
        slack,
        verifier: Arc::new(SignatureVerifier::new(slack_config.signing_secret.clone())),
        bot_user_id,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Slack events server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
