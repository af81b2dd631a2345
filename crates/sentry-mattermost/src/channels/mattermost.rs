//! Mattermost REST API delivery channel.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::NotifyChannel;
use crate::config::{Credential, NotifierSettings};
use crate::error::DeliveryError;
use crate::payload::{Attachment, Payload};

/// Path of the create-post endpoint, relative to the server URL.
pub const POSTS_PATH: &str = "/api/v4/posts";

/// User agent sent with every request.
pub const CLIENT_USER_AGENT: &str = concat!("sentry-mattermost/", env!("CARGO_PKG_VERSION"));

/// Outcome of a single delivery attempt.
#[derive(Debug)]
pub struct DeliveryResult {
    /// Whether Mattermost accepted the post (2xx).
    pub success: bool,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Response body, when a response was received.
    pub body: Option<String>,
    /// Why the attempt failed.
    pub cause: Option<DeliveryError>,
}

impl DeliveryResult {
    fn delivered(status: u16, body: String) -> Self {
        Self {
            success: true,
            status: Some(status),
            body: Some(body),
            cause: None,
        }
    }

    fn failed(cause: DeliveryError) -> Self {
        let (status, body) = match &cause {
            DeliveryError::Status { status, body } => (Some(*status), Some(body.clone())),
            _ => (None, None),
        };
        Self {
            success: false,
            status,
            body,
            cause: Some(cause),
        }
    }

    /// Id of the created post, parsed from the response body.
    #[must_use]
    pub fn post_id(&self) -> Option<String> {
        let body = self.body.as_deref().filter(|_| self.success)?;
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value.get("id")?.as_str().map(ToString::to_string)
    }

    /// Convert into a `Result` for callers that want failures raised.
    ///
    /// # Errors
    ///
    /// Returns the failure cause when the delivery did not succeed.
    pub fn into_result(self) -> Result<Self, DeliveryError> {
        match self.cause {
            Some(cause) => Err(cause),
            None => Ok(self),
        }
    }
}

/// Mattermost channel posting through `POST /api/v4/posts`.
pub struct MattermostChannel {
    base_url: String,
    client: reqwest::Client,
}

impl MattermostChannel {
    /// Create a channel for a Mattermost server URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a channel from process-wide settings.
    #[must_use]
    pub fn from_settings(settings: &NotifierSettings) -> Self {
        Self::new(settings.base_url.clone())
    }

    /// Full URL of the create-post endpoint.
    #[must_use]
    pub fn posts_url(&self) -> String {
        format!("{}{POSTS_PATH}", self.base_url)
    }

    async fn try_send(
        &self,
        channel_id: &str,
        payload: &Payload,
        credential: Option<&Credential>,
        timeout: Duration,
    ) -> Result<DeliveryResult, DeliveryError> {
        let credential = credential.ok_or(DeliveryError::MissingCredential)?;

        let body = serde_json::to_vec(&CreatePost::new(channel_id, payload))?;

        debug!(
            channel = "mattermost",
            channel_id = %channel_id,
            url = %self.posts_url(),
            "Sending notification"
        );

        let response = self
            .client
            .post(self.posts_url())
            .bearer_auth(credential.expose())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .timeout(timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            debug!(channel = "mattermost", status = %status, "Notification sent successfully");
            Ok(DeliveryResult::delivered(status.as_u16(), body))
        } else {
            warn!(
                channel = "mattermost",
                status = %status,
                body = %body,
                "Mattermost API request failed"
            );
            Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl NotifyChannel for MattermostChannel {
    fn name(&self) -> &'static str {
        "mattermost"
    }

    async fn send(
        &self,
        channel_id: &str,
        payload: &Payload,
        credential: Option<&Credential>,
        timeout: Duration,
    ) -> DeliveryResult {
        match self.try_send(channel_id, payload, credential, timeout).await {
            Ok(result) => result,
            Err(cause) => {
                if cause.is_timeout() {
                    warn!(channel = "mattermost", timeout = ?timeout, "Mattermost request timed out");
                }
                DeliveryResult::failed(cause)
            }
        }
    }
}

// =============================================================================
// Mattermost API types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreatePost<'a> {
    channel_id: &'a str,
    message: &'a str,
    props: PostProps<'a>,
}

#[derive(Debug, Serialize)]
struct PostProps<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    override_username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    override_icon_url: Option<&'a str>,
    #[serde(skip_serializing_if = "no_attachments")]
    attachments: &'a [Attachment],
}

fn no_attachments(attachments: &&[Attachment]) -> bool {
    attachments.is_empty()
}

impl<'a> CreatePost<'a> {
    /// The destination argument wins over the channel recorded in the payload.
    fn new(channel_id: &'a str, payload: &'a Payload) -> Self {
        Self {
            channel_id,
            message: &payload.message,
            props: PostProps {
                override_username: payload.username.as_deref(),
                override_icon_url: payload.icon_url.as_deref(),
                attachments: payload.attachment.as_slice(),
            },
        }
    }
}
