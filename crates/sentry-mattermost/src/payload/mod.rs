//! Payload construction.
//!
//! [`build`] turns a host event and a destination's options into a
//! [`Payload`]. It has no I/O. Every optional event field is replaced with a
//! placeholder (`"unknown"`, or `""` for tags) so rendered text never shows
//! an absent value.

pub mod tags;
pub mod template;

use serde::Serialize;

use crate::config::{Layout, NotifierConfig};
use crate::events::{EventSource, Level};
use template::{TemplateData, TemplateError};

/// Placeholder for any missing optional field.
pub const UNKNOWN: &str = "unknown";

/// Level used when the event carries none.
pub const DEFAULT_LEVEL: &str = "error";

/// Title used when the event has no short title.
pub const DEFAULT_TITLE: &str = "Unknown Error";

/// Template used by the plain text layout.
pub const PLAIN_TEMPLATE: &str = "#### {project_name} - {env}\n{tags}\n\n{culprit}\n[{title}]({link})";

const ICON_BASE_URL: &str = "https://xd3coder.github.io/image-host/sentry-mattermost/64/";

/// How the message body is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Markdown body from [`PLAIN_TEMPLATE`], no attachment.
    PlainText,
    /// Short markdown headline plus an attachment with field groups.
    RichAttachment,
    /// User template, no attachment.
    CustomTemplate(String),
}

impl RenderStrategy {
    /// Pick the strategy for a destination. A custom template always wins.
    #[must_use]
    pub fn from_config(config: &NotifierConfig) -> Self {
        match (&config.custom_template, config.layout) {
            (Some(template), _) => Self::CustomTemplate(template.clone()),
            (None, Layout::Plain) => Self::PlainText,
            (None, Layout::Rich) => Self::RichAttachment,
        }
    }
}

/// Outgoing message for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub channel_id: String,
    pub username: Option<String>,
    pub icon_url: Option<String>,
    pub message: String,
    pub attachment: Option<Attachment>,
}

/// Rich attachment shown below the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub title: String,
    pub title_link: String,
    pub fallback: String,
    pub color: String,
    pub text: String,
    pub fields: Vec<AttachmentField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

/// One heading/value group of an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl AttachmentField {
    /// Build a group from `key: value` lines.
    fn group(title: &str, lines: &[(&str, &str)]) -> Self {
        let value = lines
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            title: title.to_string(),
            value,
            short: false,
        }
    }
}

/// Level from the `level` tag, then the event itself, then `"error"`.
#[must_use]
pub fn resolve_level<E: EventSource + ?Sized>(event: &E) -> String {
    event
        .tag("level")
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_lowercase)
        .or_else(|| event.level().map(|l| l.as_str().to_string()))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn or_unknown(value: Option<&str>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// Collect every template value for an event.
#[must_use]
pub fn template_data<E: EventSource + ?Sized>(event: &E, config: &NotifierConfig) -> TemplateData {
    let project = event.project();

    TemplateData {
        project_name: or_unknown(Some(project.name.as_str())),
        project_slug: or_unknown(Some(project.slug.as_str())),
        env: or_unknown(Some(event.environment())),
        tags: tags::render_tags(event.tags(), config),
        culprit: or_unknown(event.culprit()),
        title: event
            .title()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string(),
        link: event.absolute_url().to_string(),
        id: or_unknown(Some(event.event_id())),
        level: resolve_level(event).to_uppercase(),
        message: or_unknown(event.message()),
        release: or_unknown(event.release()),
        platform: or_unknown(event.platform()),
    }
}

/// Build the payload for `event` using the destination's options.
///
/// # Errors
///
/// Returns a [`TemplateError`] when a custom template cannot be rendered.
pub fn build<E: EventSource + ?Sized>(
    event: &E,
    config: &NotifierConfig,
) -> Result<Payload, TemplateError> {
    let data = template_data(event, config);

    let (message, attachment) = match RenderStrategy::from_config(config) {
        RenderStrategy::CustomTemplate(custom) => (template::render(&custom, &data)?, None),
        RenderStrategy::PlainText => (template::render(PLAIN_TEMPLATE, &data)?, None),
        RenderStrategy::RichAttachment => {
            let headline = format!("#### {} - {}", data.project_name, data.env);
            (headline, Some(rich_attachment(event, &data)))
        }
    };

    Ok(Payload {
        channel_id: config.channel_id.trim().to_string(),
        username: Some(config.username.clone()),
        icon_url: Some(icon_url(&data.level, config.logo_match_level)),
        message,
        attachment,
    })
}

fn icon_url(level: &str, match_level: bool) -> String {
    if match_level {
        format!("{ICON_BASE_URL}{}.jpg", level.to_lowercase())
    } else {
        format!("{ICON_BASE_URL}warning.jpg")
    }
}

fn rich_attachment<E: EventSource + ?Sized>(event: &E, data: &TemplateData) -> Attachment {
    let metadata = event.metadata();
    let runtime = event.runtime();

    let color = Level::parse(&data.level)
        .unwrap_or(Level::Error)
        .color()
        .to_string();

    let kind = or_unknown(metadata.kind.as_deref());
    let filename = or_unknown(metadata.filename.as_deref());
    let function = or_unknown(metadata.function.as_deref());
    let value = or_unknown(metadata.value.as_deref());
    let runtime_name = or_unknown(runtime.name.as_deref());
    let runtime_build = or_unknown(runtime.build.as_deref());

    let fields = vec![
        AttachmentField::group(
            "Project Info",
            &[
                ("Project", data.project_name.as_str()),
                ("Environment", data.env.as_str()),
                ("Release", data.release.as_str()),
                ("Platform", data.platform.as_str()),
            ],
        ),
        AttachmentField::group(
            "Event Info",
            &[
                ("Level", data.level.as_str()),
                ("Event ID", data.id.as_str()),
                ("Culprit", data.culprit.as_str()),
                ("Message", data.message.as_str()),
            ],
        ),
        AttachmentField::group(
            "Event Metadata",
            &[
                ("Type", kind.as_str()),
                ("File", filename.as_str()),
                ("Function", function.as_str()),
                ("Value", value.as_str()),
                ("Runtime", runtime_name.as_str()),
                ("Runtime Build", runtime_build.as_str()),
            ],
        ),
    ];

    let timestamp = event.timestamp();

    Attachment {
        title: format!("[{}] {}", data.level, data.title),
        title_link: data.link.clone(),
        fallback: format!("[{}] {} - {}", data.level, data.title, data.project_name),
        color,
        text: data.tags.clone(),
        fields,
        footer: Some(match timestamp {
            Some(ts) => format!("Sentry | {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
            None => "Sentry".to_string(),
        }),
        ts: timestamp.map(|ts| ts.timestamp()),
    }
}
