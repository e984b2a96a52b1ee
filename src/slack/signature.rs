//! Slack request signatures
//!
//! `X-Slack-Signature` is `v0=` followed by the hex HMAC-SHA256 of
//! `v0:{timestamp}:{body}` keyed with the app's signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Requests older than this are treated as replays
pub const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;

const VERSION: &str = "v0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    InvalidTimestamp,
    Stale { age_secs: i64 },
    Malformed,
    Mismatch,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::InvalidTimestamp => write!(f, "invalid request timestamp"),
            SignatureError::Stale { age_secs } => write!(f, "request is {}s old", age_secs),
            SignatureError::Malformed => write!(f, "malformed signature header"),
            SignatureError::Mismatch => write!(f, "signature mismatch"),
        }
    }
}

pub struct SignatureVerifier {
    signing_secret: String,
}

impl SignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
        }
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes()).expect("HMAC key of any size");
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        mac
    }

    /// Signature Slack would send for this body
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        format!("{}={}", VERSION, hex::encode(self.mac(timestamp, body).finalize().into_bytes()))
    }

    /// Check a request signed at `timestamp` against the current unix time `now`
    pub fn verify(&self, timestamp: &str, body: &[u8], signature: &str, now: i64) -> Result<(), SignatureError> {
        let sent_at: i64 = timestamp.trim().parse().map_err(|_| SignatureError::InvalidTimestamp)?;
        let age_secs = (now - sent_at).abs();
        if age_secs > MAX_REQUEST_AGE_SECS {
            return Err(SignatureError::Stale { age_secs });
        }

        let digest = signature
            .trim()
            .strip_prefix("v0=")
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(SignatureError::Malformed)?;

        // verify_slice compares in constant time
        self.mac(timestamp.trim(), body)
            .verify_slice(&digest)
            .map_err(|_| SignatureError::Mismatch)
    }
}
