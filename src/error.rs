//! Error types for the Outlook agent.

use thiserror::Error;

/// Everything that can abort a trigger.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid options, collected before any network call.
    #[error("configuration error: {}", .0.join("; "))]
    Configuration(Vec<String>),
    /// The token endpoint refused the refresh or returned no access token.
    #[error("token renewal failed: {0}")]
    AuthRenewal(String),
    /// A Graph call returned a non-success status.
    #[error("request failed with status {status}")]
    Fetch { status: u16, body: String },
    /// Transport-level failure (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// A success response whose body does not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("state store error: {0}")]
    State(String),
    #[error("credential store error: {0}")]
    Credential(String),
    #[error("event sink error: {0}")]
    Sink(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
