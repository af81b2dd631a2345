//! Configuration for the Mattermost notifier.
//!
//! Two layers feed a notification:
//!
//! - [`NotifierSettings`]: process-wide settings read from the environment
//!   (`MATTERMOST_URL`, `MATTERMOST_TIMEOUT_SECS`, `NOTIFY_DISABLED`).
//! - [`NotifierConfig`]: per-destination options resolved through the host's
//!   [`OptionStore`] (channel, bot name, template, tag filters).
//!
//! The bearer token is loaded separately through a [`CredentialProvider`] on
//! every request, so rotating `MATTERMOST_TOKEN` takes effect without a
//! restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the Mattermost bearer token.
pub const ENV_MATTERMOST_TOKEN: &str = "MATTERMOST_TOKEN";

/// Environment variable holding the Mattermost server URL.
pub const ENV_MATTERMOST_URL: &str = "MATTERMOST_URL";

/// Environment variable overriding the per-request timeout.
pub const ENV_MATTERMOST_TIMEOUT_SECS: &str = "MATTERMOST_TIMEOUT_SECS";

/// Environment variable to disable all notifications.
pub const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Server URL used when `MATTERMOST_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8065";

/// Per-request timeout used when `MATTERMOST_TIMEOUT_SECS` is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot display name used when the `username` option is unset.
pub const DEFAULT_USERNAME: &str = "Sentry";

/// Option names, as stored by the host per destination.
pub mod options {
    pub const CHANNEL: &str = "channel";
    pub const USERNAME: &str = "username";
    pub const CUSTOM_FORMAT: &str = "custom_format";
    pub const LAYOUT: &str = "layout";
    pub const LOGO_MATCH_LEVEL: &str = "logo_match_level";
    pub const INCLUDE_KEYS_WITH_TAGS: &str = "include_keys_with_tags";
    pub const INCLUDED_TAG_KEYS: &str = "included_tag_keys";
    pub const EXCLUDED_TAG_KEYS: &str = "excluded_tag_keys";
    pub const BASE_URL: &str = "base_url";
}

// =============================================================================
// Credential
// =============================================================================

/// Bearer token for the Mattermost API.
///
/// `Debug` output is redacted so the token never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token. Returns `None` for blank input.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw token, for the `Authorization` header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Source of the bearer credential, consulted once per notification.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> Option<Credential>;
}

/// Reads `MATTERMOST_TOKEN` from the process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn credential(&self) -> Option<Credential> {
        env::var(ENV_MATTERMOST_TOKEN).ok().and_then(Credential::new)
    }
}

/// Fixed credential, for hosts that manage secrets themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<Credential>);

impl StaticCredential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Credential::new(token))
    }

    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Option<Credential> {
        self.0.clone()
    }
}

// =============================================================================
// Host option lookup
// =============================================================================

/// Host-side option storage keyed by option name and destination.
pub trait OptionStore: Send + Sync {
    fn get_option(&self, name: &str, destination: &str) -> Option<String>;
}

/// In-memory [`OptionStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryOptions {
    values: HashMap<(String, String), String>,
}

impl MemoryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option for a destination, replacing any previous value.
    pub fn set(
        &mut self,
        destination: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.values
            .insert((name.into(), destination.into()), value.into());
        self
    }
}

impl OptionStore for MemoryOptions {
    fn get_option(&self, name: &str, destination: &str) -> Option<String> {
        self.values
            .get(&(name.to_string(), destination.to_string()))
            .cloned()
    }
}

// =============================================================================
// Per-destination configuration
// =============================================================================

/// Message layout used when no custom template is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Plain markdown message body.
    Plain,
    /// Markdown body plus an attachment with field groups.
    #[default]
    Rich,
}

impl Layout {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Some(Self::Plain),
            "rich" | "attachments" => Some(Self::Rich),
            _ => None,
        }
    }
}

/// Options for one destination, resolved for a single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Mattermost channel id. Empty means not configured.
    pub channel_id: String,
    /// Bot display name.
    pub username: String,
    /// Custom message template, if any.
    pub custom_template: Option<String>,
    /// Layout used without a custom template.
    pub layout: Layout,
    /// Pick the bot icon by event level.
    pub logo_match_level: bool,
    /// Render `key:value` tags instead of bare values.
    pub include_keys_with_tags: bool,
    /// Lower-cased tag keys to keep. Empty keeps all.
    pub included_tag_keys: Vec<String>,
    /// Lower-cased tag keys to drop.
    pub excluded_tag_keys: Vec<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            username: DEFAULT_USERNAME.to_string(),
            custom_template: None,
            layout: Layout::default(),
            logo_match_level: false,
            include_keys_with_tags: true,
            included_tag_keys: Vec::new(),
            excluded_tag_keys: Vec::new(),
        }
    }
}

impl NotifierConfig {
    /// Create a configuration for a channel with every other option defaulted.
    #[must_use]
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Self::default()
        }
    }

    /// Resolve all options for `destination` from the host store.
    ///
    /// Blank values count as unset.
    #[must_use]
    pub fn resolve(store: &dyn OptionStore, destination: &str) -> Self {
        let get = |name: &str| {
            store
                .get_option(name, destination)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            channel_id: get(options::CHANNEL).unwrap_or_default(),
            username: get(options::USERNAME).unwrap_or(defaults.username),
            // Templates keep their own whitespace.
            custom_template: store
                .get_option(options::CUSTOM_FORMAT, destination)
                .filter(|v| !v.trim().is_empty()),
            layout: get(options::LAYOUT)
                .and_then(|v| Layout::parse(&v))
                .unwrap_or(defaults.layout),
            logo_match_level: get(options::LOGO_MATCH_LEVEL)
                .map_or(defaults.logo_match_level, |v| parse_bool(&v)),
            include_keys_with_tags: get(options::INCLUDE_KEYS_WITH_TAGS)
                .map_or(defaults.include_keys_with_tags, |v| parse_bool(&v)),
            included_tag_keys: get(options::INCLUDED_TAG_KEYS)
                .map(|v| parse_tag_list(&v))
                .unwrap_or_default(),
            excluded_tag_keys: get(options::EXCLUDED_TAG_KEYS)
                .map(|v| parse_tag_list(&v))
                .unwrap_or_default(),
        }
    }

    /// Whether a channel id is set.
    #[must_use]
    pub fn has_channel(&self) -> bool {
        !self.channel_id.trim().is_empty()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Split a comma separated tag key list into trimmed, lower-cased keys.
#[must_use]
pub fn parse_tag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

// =============================================================================
// Process-wide settings
// =============================================================================

/// Settings shared by every destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierSettings {
    /// Mattermost server URL, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Kill switch for all notifications.
    pub disabled: bool,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            disabled: false,
        }
    }
}

impl NotifierSettings {
    /// Create settings for a server URL with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Self::default()
        }
    }

    /// Load settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var(ENV_MATTERMOST_URL)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| DEFAULT_BASE_URL.to_string(), |s| normalize_base_url(&s));

        let timeout = env::var(ENV_MATTERMOST_TIMEOUT_SECS)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        let disabled = env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Self {
            base_url,
            timeout,
            disabled,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// =============================================================================
// Settings UI surface
// =============================================================================

/// Input widget for a settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Textarea,
    Bool,
    Select,
    Url,
}

/// One field of the host settings form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    #[serde(skip_serializing_if = "no_choices")]
    pub choices: &'static [&'static str],
    pub read_only: bool,
    pub help: &'static str,
}

fn no_choices(choices: &&[&str]) -> bool {
    choices.is_empty()
}

impl ConfigField {
    const fn new(
        name: &'static str,
        label: &'static str,
        kind: FieldKind,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            default: None,
            placeholder: None,
            choices: &[],
            read_only: false,
            help,
        }
    }
}

/// Describe every option for the host settings form.
///
/// `base_url` is shown read-only so operators can see where posts go.
#[must_use]
pub fn config_fields(settings: &NotifierSettings) -> Vec<ConfigField> {
    vec![
        ConfigField {
            required: true,
            ..ConfigField::new(
                options::CHANNEL,
                "Channel ID",
                FieldKind::String,
                "Mattermost channel id that receives notifications.",
            )
        },
        ConfigField {
            default: Some(DEFAULT_USERNAME.to_string()),
            placeholder: Some("e.g. Sentry"),
            ..ConfigField::new(
                options::USERNAME,
                "Bot Name",
                FieldKind::String,
                "The name used in channel when publishing notifications.",
            )
        },
        ConfigField::new(
            options::CUSTOM_FORMAT,
            "Formatted message",
            FieldKind::Textarea,
            "Customize the notification message with markdown and placeholders: \
             {project_name}, {project_slug}, {env}, {tags}, {culprit}, {title}, \
             {link}, {id}, {level}, {message}, {release}, {platform}.",
        ),
        ConfigField {
            default: Some("rich".to_string()),
            choices: &["rich", "plain"],
            ..ConfigField::new(
                options::LAYOUT,
                "Layout",
                FieldKind::Select,
                "Message layout used when no custom format is set.",
            )
        },
        ConfigField::new(
            options::LOGO_MATCH_LEVEL,
            "Icon matches notification level",
            FieldKind::Bool,
            "Bot avatar uses a color according to the event level.",
        ),
        ConfigField {
            default: Some("true".to_string()),
            ..ConfigField::new(
                options::INCLUDE_KEYS_WITH_TAGS,
                "Include tag keys in messages",
                FieldKind::Bool,
                "Write keys before tag values in rendered messages.",
            )
        },
        ConfigField::new(
            options::INCLUDED_TAG_KEYS,
            "Included Tags",
            FieldKind::String,
            "Only include these tags (comma separated list). Leave empty to include all.",
        ),
        ConfigField::new(
            options::EXCLUDED_TAG_KEYS,
            "Excluded Tags",
            FieldKind::String,
            "Exclude these tags (comma separated list).",
        ),
        ConfigField {
            default: Some(settings.base_url.clone()),
            read_only: true,
            ..ConfigField::new(
                options::BASE_URL,
                "Mattermost URL",
                FieldKind::Url,
                "Server that receives posts. Set with MATTERMOST_URL.",
            )
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn store() -> MemoryOptions {
        let mut store = MemoryOptions::new();
        store
            .set("backend", options::CHANNEL, " abc123 ")
            .set("backend", options::USERNAME, "")
            .set("backend", options::LAYOUT, "plain")
            .set("backend", options::LOGO_MATCH_LEVEL, "yes")
            .set("backend", options::INCLUDE_KEYS_WITH_TAGS, "false")
            .set("backend", options::INCLUDED_TAG_KEYS, "Server, level,,")
            .set("frontend", options::CHANNEL, "other");
        store
    }

    #[test]
    fn test_resolve_options() {
        let config = NotifierConfig::resolve(&store(), "backend");
        assert_eq!(config.channel_id, "abc123");
        assert_eq!(config.username, "Sentry");
        assert_eq!(config.layout, Layout::Plain);
        assert!(config.logo_match_level);
        assert!(!config.include_keys_with_tags);
        assert_eq!(config.included_tag_keys, vec!["server", "level"]);
        assert!(config.excluded_tag_keys.is_empty());
        assert!(config.custom_template.is_none());
    }

    #[test]
    fn test_resolve_is_per_destination() {
        let config = NotifierConfig::resolve(&store(), "frontend");
        assert_eq!(config.channel_id, "other");
        assert_eq!(config.layout, Layout::Rich);
        assert!(config.include_keys_with_tags);

        let missing = NotifierConfig::resolve(&store(), "mobile");
        assert!(!missing.has_channel());
    }

    #[test]
    fn test_blank_template_is_unset() {
        let mut store = MemoryOptions::new();
        store.set("d", options::CUSTOM_FORMAT, "   \n");
        assert!(NotifierConfig::resolve(&store, "d").custom_template.is_none());

        store.set("d", options::CUSTOM_FORMAT, "{title}\n");
        assert_eq!(
            NotifierConfig::resolve(&store, "d").custom_template.as_deref(),
            Some("{title}\n")
        );
    }

    #[test]
    fn test_credential_rejects_blank() {
        assert!(Credential::new("  ").is_none());
        let cred = Credential::new(" tok ").unwrap();
        assert_eq!(cred.expose(), "tok");
        assert_eq!(format!("{cred:?}"), "Credential(***)");
    }

    #[test]
    #[serial]
    fn test_env_credentials() {
        env::remove_var(ENV_MATTERMOST_TOKEN);
        assert!(EnvCredentials.credential().is_none());

        env::set_var(ENV_MATTERMOST_TOKEN, "");
        assert!(EnvCredentials.credential().is_none());

        env::set_var(ENV_MATTERMOST_TOKEN, "secret");
        assert_eq!(
            EnvCredentials.credential().map(|c| c.expose().to_string()),
            Some("secret".to_string())
        );
        env::remove_var(ENV_MATTERMOST_TOKEN);
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        env::set_var(ENV_MATTERMOST_URL, "https://chat.example.com/");
        env::set_var(ENV_MATTERMOST_TIMEOUT_SECS, "3");
        env::set_var(ENV_NOTIFY_DISABLED, "TRUE");

        let settings = NotifierSettings::from_env();
        assert_eq!(settings.base_url, "https://chat.example.com");
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert!(settings.disabled);

        env::remove_var(ENV_MATTERMOST_URL);
        env::remove_var(ENV_MATTERMOST_TIMEOUT_SECS);
        env::remove_var(ENV_NOTIFY_DISABLED);

        assert_eq!(NotifierSettings::from_env(), NotifierSettings::default());
    }

    #[test]
    fn test_config_fields_surface() {
        let fields = config_fields(&NotifierSettings::new("https://chat.example.com"));
        let channel = fields.iter().find(|f| f.name == options::CHANNEL).unwrap();
        assert!(channel.required);

        let base_url = fields.iter().find(|f| f.name == options::BASE_URL).unwrap();
        assert!(base_url.read_only);
        assert_eq!(base_url.default.as_deref(), Some("https://chat.example.com"));

        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json[0]["type"], "string");
    }
}
