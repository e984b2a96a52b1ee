//! Slack front end
//!
//! - signature: request verification with the signing secret
//! - events: Events API payloads and mention classification
//! - client: chat.postMessage and the diagnostic notifier
//! - server: axum routes for /slack/events and /health

pub mod client;
pub mod events;
pub mod server;
pub mod signature;

pub use client::{SlackClient, SlackNotifier};
pub use events::{classify_mention, MentionAction, SlackEnvelope, SlackEvent};
pub use server::{router, serve, AppState};
pub use signature::{SignatureError, SignatureVerifier};
