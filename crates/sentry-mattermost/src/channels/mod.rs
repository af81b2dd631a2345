//! Delivery channels.

pub mod mattermost;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::Credential;
use crate::payload::Payload;
pub use mattermost::DeliveryResult;

/// Trait for delivery channels.
///
/// A channel performs exactly one request per call and never retries.
/// Failures are reported inside the [`DeliveryResult`], not raised.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Deliver `payload` to `channel_id`.
    async fn send(
        &self,
        channel_id: &str,
        payload: &Payload,
        credential: Option<&Credential>,
        timeout: Duration,
    ) -> DeliveryResult;
}
