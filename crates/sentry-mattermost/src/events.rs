//! Event types consumed from the error-tracking host.
//!
//! The host owns its events. This crate only reads them through the
//! [`EventSource`] accessor trait, so any host SDK can be adapted without
//! converting into [`Event`] first. [`Event`] is the plain owned
//! implementation used by hosts that hand events over as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Level {
    /// Parse a level name as the host writes it in the `level` tag.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "fatal" | "critical" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Get the lowercase name for this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    /// Get the attachment sidebar color for this level.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Debug => "#95a5a6",   // Grey
            Self::Info => "#3498db",    // Blue
            Self::Warning => "#f39c12", // Orange
            Self::Error => "#e74c3c",   // Red
            Self::Fatal => "#8e44ad",   // Purple
        }
    }
}

/// Exception metadata attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMetadata {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub filename: Option<String>,
    pub function: Option<String>,
    pub value: Option<String>,
}

/// Runtime context (interpreter or VM) the event was captured in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeContext {
    pub name: Option<String>,
    pub build: Option<String>,
}

/// The project an event's group belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub name: String,
    pub slug: String,
}

/// Read-only view of a host event.
///
/// Every optional accessor returns `None` (or an empty string for
/// environment) when the host has no value; the payload builder fills in
/// placeholders.
pub trait EventSource: Send + Sync {
    /// Host-assigned event id.
    fn event_id(&self) -> &str;

    /// Short title of the event's group.
    fn title(&self) -> Option<&str>;

    /// Level recorded on the event itself, if any.
    fn level(&self) -> Option<Level>;

    /// Full event message.
    fn message(&self) -> Option<&str>;

    fn platform(&self) -> Option<&str>;

    fn release(&self) -> Option<&str>;

    /// Environment name. May be empty.
    fn environment(&self) -> &str;

    fn culprit(&self) -> Option<&str>;

    /// Tag label pairs in the order the host recorded them.
    fn tags(&self) -> &[(String, String)];

    fn metadata(&self) -> &EventMetadata;

    fn runtime(&self) -> &RuntimeContext;

    /// Absolute URL of the event's group in the host UI.
    fn absolute_url(&self) -> &str;

    fn project(&self) -> &ProjectInfo;

    fn timestamp(&self) -> Option<DateTime<Utc>>;

    /// Look up a single tag value by key.
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Owned event record, deserializable from the host's JSON export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: String,
    pub title: Option<String>,
    pub level: Option<Level>,
    pub message: Option<String>,
    pub platform: Option<String>,
    pub release: Option<String>,
    pub environment: Option<String>,
    pub culprit: Option<String>,
    pub tags: Vec<(String, String)>,
    pub metadata: EventMetadata,
    pub runtime: RuntimeContext,
    pub url: String,
    pub project: ProjectInfo,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    /// Create an event with an id and a title; everything else empty.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Append a tag, keeping insertion order.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}

impl EventSource for Event {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn level(&self) -> Option<Level> {
        self.level
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    fn environment(&self) -> &str {
        self.environment.as_deref().unwrap_or_default()
    }

    fn culprit(&self) -> Option<&str> {
        self.culprit.as_deref()
    }

    fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn runtime(&self) -> &RuntimeContext {
        &self.runtime
    }

    fn absolute_url(&self) -> &str {
        &self.url
    }

    fn project(&self) -> &ProjectInfo {
        &self.project
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}
