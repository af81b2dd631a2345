//! Mattermost notifications for Sentry error events.
//!
//! This crate turns a host event into a Mattermost post and delivers it with
//! a single authenticated request to `POST /api/v4/posts`.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sentry_mattermost::{Event, MemoryOptions, NotifyMode, Notifier};
//!
//! # async fn run() {
//! let mut options = MemoryOptions::new();
//! options.set("backend", "channel", "4xp9fdt7pbgium38k5k6w95oha");
//!
//! // Server URL, timeout and token come from the environment
//! let notifier = Notifier::from_env(Arc::new(options));
//!
//! let event = Event::new("9fac2ceed9344f2bbfdd1fdacb0ed9b1", "ZeroDivisionError")
//!     .with_tag("level", "error");
//! let outcome = notifier.notify(&event, "backend", NotifyMode::FailSoft).await;
//! # let _ = outcome;
//! # }
//! ```
//!
//! # Configuration
//!
//! - `MATTERMOST_TOKEN`: bearer token (required, read on every notification)
//! - `MATTERMOST_URL`: server URL (default `http://localhost:8065`)
//! - `MATTERMOST_TIMEOUT_SECS`: per-request timeout (default 10)
//! - `NOTIFY_DISABLED`: set to "true" to disable all notifications
//!
//! Per-destination options (channel, bot name, template, tag filters) are
//! looked up through the host's [`OptionStore`].
//!
//! # Architecture
//!
//! - [`payload::build`] maps an [`EventSource`] and a [`NotifierConfig`] to a
//!   [`Payload`]. Pure, no I/O.
//! - [`NotifyChannel`] delivers a payload. [`MattermostChannel`] is the HTTP
//!   implementation.
//! - [`Notifier`] is the host entry point: it checks configuration, builds,
//!   sends, and applies the fail-soft or strict error policy.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod payload;

pub use channels::mattermost::MattermostChannel;
pub use channels::{DeliveryResult, NotifyChannel};
pub use config::{
    config_fields, ConfigField, Credential, CredentialProvider, EnvCredentials, Layout,
    MemoryOptions, NotifierConfig, NotifierSettings, OptionStore, StaticCredential,
};
pub use error::{DeliveryError, NotifyError, TemplateError};
pub use events::{Event, EventMetadata, EventSource, Level, ProjectInfo, RuntimeContext};
pub use payload::{Attachment, AttachmentField, Payload, RenderStrategy};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// What to do when building or delivering a notification fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyMode {
    /// Log the failure and report it as [`NotifyOutcome::Failed`].
    #[default]
    FailSoft,
    /// Return the failure as `Err`.
    Strict,
}

/// Why a notification was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `NOTIFY_DISABLED` is set.
    Disabled,
    /// The destination has no channel id.
    MissingChannel,
    /// No bearer token is available.
    MissingCredential,
}

/// Result of [`Notifier::notify`].
#[derive(Debug)]
pub enum NotifyOutcome {
    /// Destination not configured; nothing was sent.
    Skipped(SkipReason),
    /// Mattermost accepted the post.
    Delivered(DeliveryResult),
    /// Building or delivery failed and the failure was swallowed.
    Failed(NotifyError),
}

impl NotifyOutcome {
    /// Whether a post was created.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Host entry point for Mattermost notifications.
///
/// Holds only immutable settings and shared handles, so one instance can
/// serve concurrent notifications for any number of destinations.
pub struct Notifier {
    channel: Arc<dyn NotifyChannel>,
    options: Arc<dyn OptionStore>,
    credentials: Arc<dyn CredentialProvider>,
    settings: NotifierSettings,
}

impl Notifier {
    /// Create a notifier from environment variables.
    ///
    /// The token is read from `MATTERMOST_TOKEN` on every notification.
    #[must_use]
    pub fn from_env(options: Arc<dyn OptionStore>) -> Self {
        let settings = NotifierSettings::from_env();

        if settings.disabled {
            info!("Notifications disabled via NOTIFY_DISABLED");
        } else {
            info!(base_url = %settings.base_url, "Mattermost notifier initialized");
        }

        Self::new(settings, options)
    }

    /// Create a notifier posting to the server in `settings`.
    #[must_use]
    pub fn new(settings: NotifierSettings, options: Arc<dyn OptionStore>) -> Self {
        Self {
            channel: Arc::new(MattermostChannel::from_settings(&settings)),
            options,
            credentials: Arc::new(EnvCredentials),
            settings,
        }
    }

    /// Replace the credential source.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Replace the delivery channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn NotifyChannel>) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &NotifierSettings {
        &self.settings
    }

    /// Settings form description for the host UI.
    #[must_use]
    pub fn config_fields(&self) -> Vec<ConfigField> {
        config_fields(&self.settings)
    }

    /// Check if `destination` has both a channel id and a credential.
    #[must_use]
    pub fn is_configured(&self, destination: &str) -> bool {
        self.ensure_configured(destination).is_ok()
    }

    /// Like [`Notifier::is_configured`], but says what is missing.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::NotConfigured`] naming the missing setting.
    pub fn ensure_configured(&self, destination: &str) -> Result<(), NotifyError> {
        if !NotifierConfig::resolve(self.options.as_ref(), destination).has_channel() {
            return Err(NotifyError::NotConfigured(format!(
                "no channel set for destination {destination:?}"
            )));
        }
        if self.credentials.credential().is_none() {
            return Err(NotifyError::NotConfigured(format!(
                "{} not set",
                config::ENV_MATTERMOST_TOKEN
            )));
        }
        Ok(())
    }

    /// Build and deliver a notification for `event` to `destination`.
    ///
    /// An unconfigured destination is not an error: the call returns
    /// [`NotifyOutcome::Skipped`] without building or sending anything.
    /// Delivery is a single attempt with no retry.
    ///
    /// # Errors
    ///
    /// Only in [`NotifyMode::Strict`]: returns the template or delivery
    /// failure. In [`NotifyMode::FailSoft`] failures are logged and returned
    /// as [`NotifyOutcome::Failed`].
    pub async fn notify<E: EventSource + ?Sized>(
        &self,
        event: &E,
        destination: &str,
        mode: NotifyMode,
    ) -> Result<NotifyOutcome, NotifyError> {
        if self.settings.disabled {
            debug!("Notifications disabled, skipping event");
            return Ok(NotifyOutcome::Skipped(SkipReason::Disabled));
        }

        let config = NotifierConfig::resolve(self.options.as_ref(), destination);
        if !config.has_channel() {
            debug!(destination, "No channel configured, skipping event");
            return Ok(NotifyOutcome::Skipped(SkipReason::MissingChannel));
        }

        // Read once per notification.
        let Some(credential) = self.credentials.credential() else {
            debug!(destination, "No Mattermost credential, skipping event");
            return Ok(NotifyOutcome::Skipped(SkipReason::MissingCredential));
        };

        let result = match payload::build(event, &config) {
            Ok(payload) => self
                .channel
                .send(
                    &payload.channel_id,
                    &payload,
                    Some(&credential),
                    self.settings.timeout,
                )
                .await
                .into_result()
                .map_err(NotifyError::from),
            Err(e) => Err(NotifyError::from(e)),
        };

        match result {
            Ok(delivery) => {
                debug!(
                    channel = self.channel.name(),
                    destination,
                    event_id = event.event_id(),
                    "Notification sent"
                );
                Ok(NotifyOutcome::Delivered(delivery))
            }
            Err(e) if mode == NotifyMode::Strict => Err(e),
            Err(e) => {
                error!(
                    channel = self.channel.name(),
                    destination,
                    event_id = event.event_id(),
                    error = %e,
                    "Failed to send notification"
                );
                Ok(NotifyOutcome::Failed(e))
            }
        }
    }

    /// Send a notification in the background (fire-and-forget).
    ///
    /// Spawns onto the current Tokio runtime and returns immediately.
    /// Failures are logged, never propagated.
    pub fn notify_detached<E>(self: &Arc<Self>, event: E, destination: String) -> JoinHandle<()>
    where
        E: EventSource + 'static,
    {
        let notifier = Arc::clone(self);

        tokio::spawn(async move {
            // FailSoft never yields Err.
            let _ = notifier
                .notify(&event, &destination, NotifyMode::FailSoft)
                .await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Channel that records every call and answers with a fixed status.
    struct RecordingChannel {
        status: u16,
        calls: Mutex<Vec<(String, Payload, bool)>>,
    }

    impl RecordingChannel {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: Mutex::new(vec![]),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(
            &self,
            channel_id: &str,
            payload: &Payload,
            credential: Option<&Credential>,
            _timeout: Duration,
        ) -> DeliveryResult {
            self.calls.lock().unwrap().push((
                channel_id.to_string(),
                payload.clone(),
                credential.is_some(),
            ));

            if (200..300).contains(&self.status) {
                DeliveryResult {
                    success: true,
                    status: Some(self.status),
                    body: Some("{}".to_string()),
                    cause: None,
                }
            } else {
                DeliveryResult {
                    success: false,
                    status: Some(self.status),
                    body: Some("error".to_string()),
                    cause: Some(DeliveryError::Status {
                        status: self.status,
                        body: "error".to_string(),
                    }),
                }
            }
        }
    }

    fn options(channel: &str, template: Option<&str>) -> Arc<MemoryOptions> {
        let mut options = MemoryOptions::new();
        options.set("backend", config::options::CHANNEL, channel);
        if let Some(template) = template {
            options.set("backend", config::options::CUSTOM_FORMAT, template);
        }
        Arc::new(options)
    }

    fn notifier(
        channel: &Arc<RecordingChannel>,
        options: Arc<MemoryOptions>,
        token: Option<&str>,
    ) -> Notifier {
        let credentials = token.map_or_else(StaticCredential::none, StaticCredential::new);
        Notifier::new(NotifierSettings::default(), options)
            .with_credentials(Arc::new(credentials))
            .with_channel(channel.clone())
    }

    #[test]
    fn test_is_configured_truth_table() {
        let channel = RecordingChannel::new(201);
        let cases = [
            ("", None, false),
            ("", Some("tok"), false),
            ("chan", None, false),
            ("chan", Some("tok"), true),
        ];

        for (channel_id, token, expected) in cases {
            let notifier = notifier(&channel, options(channel_id, None), token);
            assert_eq!(
                notifier.is_configured("backend"),
                expected,
                "channel={channel_id:?} token={token:?}"
            );
        }
    }

    #[test]
    fn test_ensure_configured_names_missing_setting() {
        let channel = RecordingChannel::new(201);

        let err = notifier(&channel, options("", None), Some("tok"))
            .ensure_configured("backend")
            .unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured(ref msg) if msg.contains("backend")));

        let err = notifier(&channel, options("chan", None), None)
            .ensure_configured("backend")
            .unwrap_err();
        assert!(err.to_string().contains("MATTERMOST_TOKEN"));
    }

    #[tokio::test]
    async fn test_not_configured_is_skipped_without_send() {
        let channel = RecordingChannel::new(201);
        let event = Event::new("ev", "Boom");

        let outcome = notifier(&channel, options("chan", None), None)
            .notify(&event, "backend", NotifyMode::Strict)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            NotifyOutcome::Skipped(SkipReason::MissingCredential)
        ));

        let outcome = notifier(&channel, options("", None), Some("tok"))
            .notify(&event, "backend", NotifyMode::Strict)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            NotifyOutcome::Skipped(SkipReason::MissingChannel)
        ));

        assert_eq!(channel.call_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_notifier_skips() {
        let channel = RecordingChannel::new(201);
        let settings = NotifierSettings {
            disabled: true,
            ..NotifierSettings::default()
        };
        let notifier = Notifier::new(settings, options("chan", None))
            .with_credentials(Arc::new(StaticCredential::new("tok")))
            .with_channel(channel.clone());

        let outcome = notifier
            .notify(&Event::new("ev", "Boom"), "backend", NotifyMode::FailSoft)
            .await
            .unwrap();
        assert!(matches!(outcome, NotifyOutcome::Skipped(SkipReason::Disabled)));
        assert_eq!(channel.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delivered() {
        let channel = RecordingChannel::new(201);
        let notifier = notifier(&channel, options("chan", Some("{title}")), Some("tok"));

        let outcome = notifier
            .notify(&Event::new("ev", "Boom"), "backend", NotifyMode::FailSoft)
            .await
            .unwrap();
        assert!(outcome.is_delivered());

        let calls = channel.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (channel_id, payload, had_credential) = &calls[0];
        assert_eq!(channel_id, "chan");
        assert_eq!(payload.message, "Boom");
        assert!(*had_credential);
    }

    #[tokio::test]
    async fn test_fail_soft_swallows_delivery_error() {
        let channel = RecordingChannel::new(500);
        let notifier = notifier(&channel, options("chan", None), Some("tok"));

        let outcome = notifier
            .notify(&Event::new("ev", "Boom"), "backend", NotifyMode::FailSoft)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            NotifyOutcome::Failed(NotifyError::Delivery(DeliveryError::Status { status: 500, .. }))
        ));
    }

    #[tokio::test]
    async fn test_strict_raises_delivery_error() {
        let channel = RecordingChannel::new(500);
        let notifier = notifier(&channel, options("chan", None), Some("tok"));

        let err = notifier
            .notify(&Event::new("ev", "Boom"), "backend", NotifyMode::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Delivery(_)));
    }

    #[tokio::test]
    async fn test_template_error_never_sends() {
        let channel = RecordingChannel::new(201);
        let notifier = notifier(&channel, options("chan", Some("{nope}")), Some("tok"));
        let event = Event::new("ev", "Boom");

        let outcome = notifier
            .notify(&event, "backend", NotifyMode::FailSoft)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            NotifyOutcome::Failed(NotifyError::Template(TemplateError::UnknownPlaceholder(_)))
        ));

        let err = notifier
            .notify(&event, "backend", NotifyMode::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Template(_)));
        assert_eq!(channel.call_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_detached() {
        let channel = RecordingChannel::new(201);
        let notifier = Arc::new(notifier(&channel, options("chan", None), Some("tok")));

        notifier
            .notify_detached(Event::new("ev", "Boom"), "backend".to_string())
            .await
            .unwrap();
        assert_eq!(channel.call_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_notifications() {
        let channel = RecordingChannel::new(201);
        let notifier = Arc::new(notifier(&channel, options("chan", None), Some("tok")));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                notifier.notify_detached(Event::new(format!("ev-{i}"), "Boom"), "backend".to_string())
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(channel.call_count(), 16);
    }
}
