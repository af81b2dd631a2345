//! Error types for the Mattermost notifier.

use thiserror::Error;

pub use crate::payload::template::TemplateError;

/// Errors that can occur when delivering a post to Mattermost.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No bearer token was available at send time
    #[error("Mattermost credential missing (MATTERMOST_TOKEN not set)")]
    MissingCredential,

    /// HTTP request failed (connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Mattermost answered with a non-2xx status
    #[error("Mattermost returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Whether this failure was caused by a request timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

/// Errors surfaced by [`crate::Notifier`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Destination is missing its channel id or credential
    #[error("Destination not configured: {0}")]
    NotConfigured(String),

    /// Custom template could not be rendered
    #[error("Template render failed: {0}")]
    Template(#[from] TemplateError),

    /// Post could not be delivered
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
