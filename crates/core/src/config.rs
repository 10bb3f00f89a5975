use crate::error::{WidgetError, WidgetResult};
use crate::event_bus::{noop_sink, EventSink, WidgetEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Shortest accepted `apiKey`.
pub const MIN_API_KEY_LEN: usize = 10;
/// Absolute ceiling for `maxFileSize` (50 MiB).
pub const MAX_FILE_SIZE_CEILING: u64 = 50 * 1024 * 1024;
/// Absolute ceiling for `maxFilesPerMessage`.
pub const MAX_FILES_PER_MESSAGE_CEILING: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl WidgetPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetPosition::BottomRight => "bottom-right",
            WidgetPosition::BottomLeft => "bottom-left",
            WidgetPosition::TopRight => "top-right",
            WidgetPosition::TopLeft => "top-left",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bottom-right" => Some(WidgetPosition::BottomRight),
            "bottom-left" => Some(WidgetPosition::BottomLeft),
            "top-right" => Some(WidgetPosition::TopRight),
            "top-left" => Some(WidgetPosition::TopLeft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WidgetTheme {
    #[default]
    Light,
    Dark,
    Auto,
}

impl WidgetTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetTheme::Light => "light",
            WidgetTheme::Dark => "dark",
            WidgetTheme::Auto => "auto",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "light" => Some(WidgetTheme::Light),
            "dark" => Some(WidgetTheme::Dark),
            "auto" => Some(WidgetTheme::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShadowLevel {
    None,
    Small,
    #[default]
    Medium,
    Large,
}

impl ShadowLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ShadowLevel::None => "none",
            ShadowLevel::Small => "small",
            ShadowLevel::Medium => "medium",
            ShadowLevel::Large => "large",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ShadowLevel::None),
            "small" => Some(ShadowLevel::Small),
            "medium" => Some(ShadowLevel::Medium),
            "large" => Some(ShadowLevel::Large),
            _ => None,
        }
    }
}

/// Callback hooks carried inside a configuration. Not serializable.
#[derive(Clone)]
pub struct HookHandle(Arc<dyn EventSink>);

impl HookHandle {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self(sink)
    }

    pub fn emit(&self, event: WidgetEvent) {
        self.0.emit(event);
    }

    pub fn sink(&self) -> Arc<dyn EventSink> {
        self.0.clone()
    }
}

impl Default for HookHandle {
    fn default() -> Self {
        Self(noop_sink())
    }
}

impl fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookHandle(..)")
    }
}

/// Configuration as supplied by the host page (`FluentWidget.init({...})` or
/// the declarative `FluentWidgetConfig` object). Every field is optional here;
/// [`resolve`] enforces the required ones. A recognized field holding a value
/// of the wrong type is dropped with a warning, as if it were absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialWidgetConfig {
    #[serde(deserialize_with = "lenient")]
    pub api_key: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub api_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub websocket_url: Option<String>,

    // Appearance
    #[serde(deserialize_with = "lenient")]
    pub position: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub theme: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub primary_color: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub secondary_color: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub text_color: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub background_color: Option<String>,

    // Brand
    #[serde(deserialize_with = "lenient")]
    pub company_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub greeting: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub placeholder: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub logo_url: Option<String>,

    // Behavior
    #[serde(deserialize_with = "lenient")]
    pub auto_open: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub auto_open_delay: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub show_on_mobile: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub show_on_desktop: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub minimize_on_close: Option<bool>,

    // Feature toggles
    #[serde(deserialize_with = "lenient")]
    pub enable_file_upload: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_emojis: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_screenshot: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_satisfaction_survey: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_offline_message: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_typing_indicator: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_canned_responses: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_conversation_history: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub enable_sound_notifications: Option<bool>,

    // File upload
    #[serde(deserialize_with = "lenient")]
    pub max_file_size: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub max_files_per_message: Option<u32>,
    #[serde(deserialize_with = "lenient")]
    pub allowed_file_types: Option<Vec<String>>,

    // UI customization
    #[serde(rename = "customCSS", alias = "customCss", deserialize_with = "lenient")]
    pub custom_css: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub show_powered_by: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub border_radius: Option<u32>,
    #[serde(deserialize_with = "lenient")]
    pub shadow_level: Option<String>,

    // Localization
    #[serde(deserialize_with = "lenient")]
    pub language: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub translations: Option<HashMap<String, String>>,

    // Timing (milliseconds)
    #[serde(deserialize_with = "lenient")]
    pub typing_timeout: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub message_delay: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub reconnect_interval: Option<u64>,

    // Privacy
    #[serde(deserialize_with = "lenient")]
    pub enable_encryption: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub anonymize_visitors: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub respect_do_not_track: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub cookie_consent: Option<bool>,

    // Analytics
    #[serde(deserialize_with = "lenient")]
    pub enable_analytics: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub track_page_views: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub track_scroll_depth: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub custom_events: Option<Vec<String>>,

    // Advanced
    #[serde(deserialize_with = "lenient")]
    pub debug_mode: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub fallback_mode: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub offline_mode: Option<bool>,

    /// Caller extensions this crate does not know about.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    #[serde(skip)]
    pub hooks: Option<HookHandle>,
}

impl PartialWidgetConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Attach callback hooks.
    pub fn hooks(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.hooks = Some(HookHandle::new(sink));
        self
    }

    /// Parse a host configuration object.
    pub fn from_json(json: &str) -> WidgetResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> WidgetResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Field deserializer for [`PartialWidgetConfig`]: a value of the wrong type
/// becomes `None` instead of failing the whole object.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match T::deserialize(&value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!(value = %value, error = %e, "Invalid configuration value, using default");
            Ok(None)
        }
    }
}

/// Fully resolved widget configuration. Immutable once built; updates produce
/// a new value through [`WidgetConfig::merged`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub api_key: String,
    pub api_url: String,
    pub websocket_url: Option<String>,

    pub position: WidgetPosition,
    pub theme: WidgetTheme,
    pub primary_color: String,
    pub secondary_color: Option<String>,
    pub text_color: Option<String>,
    pub background_color: Option<String>,

    pub company_name: String,
    pub greeting: String,
    pub placeholder: String,
    pub avatar: Option<String>,
    pub logo_url: Option<String>,

    pub auto_open: bool,
    pub auto_open_delay: u64,
    pub show_on_mobile: bool,
    pub show_on_desktop: bool,
    pub minimize_on_close: bool,

    pub enable_file_upload: bool,
    pub enable_emojis: bool,
    pub enable_screenshot: bool,
    pub enable_satisfaction_survey: bool,
    pub enable_offline_message: bool,
    pub enable_typing_indicator: bool,
    pub enable_canned_responses: bool,
    pub enable_conversation_history: bool,
    pub enable_sound_notifications: bool,

    pub max_file_size: u64,
    pub max_files_per_message: u32,
    pub allowed_file_types: Vec<String>,

    #[serde(rename = "customCSS")]
    pub custom_css: Option<String>,
    pub show_powered_by: bool,
    pub border_radius: u32,
    pub shadow_level: ShadowLevel,

    pub language: String,
    pub translations: HashMap<String, String>,

    pub typing_timeout: u64,
    pub message_delay: u64,
    pub reconnect_interval: u64,

    pub enable_encryption: bool,
    pub anonymize_visitors: bool,
    pub respect_do_not_track: bool,
    pub cookie_consent: bool,

    pub enable_analytics: bool,
    pub track_page_views: bool,
    pub track_scroll_depth: bool,
    pub custom_events: Vec<String>,

    pub debug_mode: bool,
    pub fallback_mode: bool,
    pub offline_mode: bool,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    #[serde(skip)]
    pub hooks: HookHandle,
}

impl WidgetConfig {
    /// Documented defaults around an already validated key.
    fn with_defaults(api_key: String) -> Self {
        Self {
            api_key,
            api_url: "https://api.fluent.ai".to_string(),
            websocket_url: None,
            position: WidgetPosition::default(),
            theme: WidgetTheme::default(),
            primary_color: "#3B82F6".to_string(),
            secondary_color: None,
            text_color: None,
            background_color: None,
            company_name: "Our Team".to_string(),
            greeting: "Hi! How can we help you today?".to_string(),
            placeholder: "Type your message...".to_string(),
            avatar: None,
            logo_url: None,
            auto_open: false,
            auto_open_delay: 3000,
            show_on_mobile: true,
            show_on_desktop: true,
            minimize_on_close: false,
            enable_file_upload: true,
            enable_emojis: true,
            enable_screenshot: true,
            enable_satisfaction_survey: true,
            enable_offline_message: true,
            enable_typing_indicator: true,
            enable_canned_responses: true,
            enable_conversation_history: true,
            enable_sound_notifications: false,
            max_file_size: 10 * 1024 * 1024,
            max_files_per_message: 5,
            allowed_file_types: ["image/*", ".pdf", ".doc", ".docx", ".txt"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            custom_css: None,
            show_powered_by: true,
            border_radius: 12,
            shadow_level: ShadowLevel::default(),
            language: "en".to_string(),
            translations: HashMap::new(),
            typing_timeout: 3000,
            message_delay: 0,
            reconnect_interval: 5000,
            enable_encryption: false,
            anonymize_visitors: false,
            respect_do_not_track: false,
            cookie_consent: false,
            enable_analytics: true,
            track_page_views: true,
            track_scroll_depth: false,
            custom_events: Vec::new(),
            debug_mode: false,
            fallback_mode: false,
            offline_mode: false,
            extra: serde_json::Map::new(),
            hooks: HookHandle::default(),
        }
    }

    /// Shallow merge of `update` over this configuration, with the same
    /// normalization as [`resolve`]. An invalid replacement `apiKey` is
    /// ignored with a warning; the current key stays active.
    pub fn merged(&self, update: PartialWidgetConfig) -> WidgetConfig {
        let mut next = self.clone();
        if let Some(key) = update.api_key.as_deref() {
            match validate_api_key(Some(key)) {
                Ok(key) => next.api_key = key,
                Err(e) => warn!(error = %e, "Ignoring invalid apiKey in config update"),
            }
        }
        next.apply(update);
        next
    }

    /// Emit an event into the configured hooks.
    pub fn emit(&self, event: WidgetEvent) {
        self.hooks.emit(event);
    }

    fn apply(&mut self, p: PartialWidgetConfig) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = p.$field { self.$field = v; })*
            };
        }
        macro_rules! overlay_opt {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = p.$field { self.$field = Some(v); })*
            };
        }

        overlay!(
            api_url,
            primary_color,
            company_name,
            greeting,
            placeholder,
            auto_open,
            auto_open_delay,
            show_on_mobile,
            show_on_desktop,
            minimize_on_close,
            enable_file_upload,
            enable_emojis,
            enable_screenshot,
            enable_satisfaction_survey,
            enable_offline_message,
            enable_typing_indicator,
            enable_canned_responses,
            enable_conversation_history,
            enable_sound_notifications,
            allowed_file_types,
            show_powered_by,
            border_radius,
            language,
            translations,
            typing_timeout,
            message_delay,
            reconnect_interval,
            enable_encryption,
            anonymize_visitors,
            respect_do_not_track,
            cookie_consent,
            enable_analytics,
            track_page_views,
            track_scroll_depth,
            custom_events,
            debug_mode,
            fallback_mode,
            offline_mode,
        );
        overlay_opt!(
            websocket_url,
            secondary_color,
            text_color,
            background_color,
            avatar,
            logo_url,
            custom_css,
        );

        if let Some(name) = p.position {
            self.position = WidgetPosition::from_name(&name).unwrap_or_else(|| {
                let fallback = WidgetPosition::default();
                warn!(
                    position = %name,
                    fallback = fallback.as_str(),
                    "Invalid position, using default"
                );
                fallback
            });
        }

        if let Some(name) = p.theme {
            self.theme = WidgetTheme::from_name(&name).unwrap_or_else(|| {
                let fallback = WidgetTheme::default();
                warn!(theme = %name, fallback = fallback.as_str(), "Invalid theme, using default");
                fallback
            });
        }

        if let Some(name) = p.shadow_level {
            self.shadow_level = ShadowLevel::from_name(&name).unwrap_or_else(|| {
                let fallback = ShadowLevel::default();
                warn!(
                    shadow_level = %name,
                    fallback = fallback.as_str(),
                    "Invalid shadow level, using default"
                );
                fallback
            });
        }

        if let Some(size) = p.max_file_size {
            self.max_file_size = if size > MAX_FILE_SIZE_CEILING {
                warn!(
                    requested = size,
                    ceiling = MAX_FILE_SIZE_CEILING,
                    "Max file size cannot exceed 50MB, clamping"
                );
                MAX_FILE_SIZE_CEILING
            } else {
                size
            };
        }

        if let Some(count) = p.max_files_per_message {
            self.max_files_per_message = if count > MAX_FILES_PER_MESSAGE_CEILING {
                warn!(
                    requested = count,
                    ceiling = MAX_FILES_PER_MESSAGE_CEILING,
                    "Max files per message too large, clamping"
                );
                MAX_FILES_PER_MESSAGE_CEILING
            } else {
                count
            };
        }

        self.extra.extend(p.extra);

        if let Some(hooks) = p.hooks {
            self.hooks = hooks;
        }
    }
}

/// Merge the caller's configuration over the documented defaults.
///
/// Fails only when `apiKey` is missing or shorter than [`MIN_API_KEY_LEN`];
/// every other invalid value is replaced (with a warning) by its default or
/// clamped to its ceiling.
pub fn resolve(partial: PartialWidgetConfig) -> WidgetResult<WidgetConfig> {
    let api_key = validate_api_key(partial.api_key.as_deref())?;
    let mut config = WidgetConfig::with_defaults(api_key);
    config.apply(partial);
    Ok(config)
}

fn validate_api_key(key: Option<&str>) -> WidgetResult<String> {
    match key {
        None => Err(WidgetError::Configuration("API key is required".into())),
        Some(k) if k.chars().count() < MIN_API_KEY_LEN => Err(WidgetError::Configuration(
            format!("Invalid API key: must be at least {MIN_API_KEY_LEN} characters"),
        )),
        Some(k) => Ok(k.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{capture_sink, EventKind};
    use serde_json::json;
    use tracing_test::traced_test;

    fn partial(value: serde_json::Value) -> PartialWidgetConfig {
        PartialWidgetConfig::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = resolve(PartialWidgetConfig::with_api_key("1234567890")).unwrap();
        assert_eq!(config.api_url, "https://api.fluent.ai");
        assert_eq!(config.position, WidgetPosition::BottomRight);
        assert_eq!(config.theme, WidgetTheme::Light);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.company_name, "Our Team");
        assert_eq!(config.allowed_file_types[0], "image/*");
        assert_eq!(config.allowed_file_types.len(), 5);
        assert!(config.show_on_mobile);
        assert!(!config.auto_open);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = resolve(partial(json!({ "theme": "dark" }))).unwrap_err();
        assert!(matches!(err, WidgetError::Configuration(_)));
    }

    #[test]
    fn test_short_api_key_is_fatal_regardless_of_other_fields() {
        for extra in [
            json!({}),
            json!({ "position": "top-left", "theme": "dark" }),
            json!({ "maxFileSize": 1, "autoOpen": true }),
        ] {
            let mut value = extra;
            value["apiKey"] = json!("short");
            let err = resolve(partial(value)).unwrap_err();
            assert!(matches!(err, WidgetError::Configuration(_)));
        }
    }

    #[test]
    fn test_enumerations_parsed() {
        let config = resolve(partial(json!({
            "apiKey": "1234567890",
            "position": "top-left",
            "theme": "auto",
            "shadowLevel": "large"
        })))
        .unwrap();
        assert_eq!(config.position, WidgetPosition::TopLeft);
        assert_eq!(config.theme, WidgetTheme::Auto);
        assert_eq!(config.shadow_level, ShadowLevel::Large);
    }

    #[test]
    #[traced_test]
    fn test_invalid_enumerations_fall_back_with_warning() {
        let config = resolve(partial(json!({
            "apiKey": "1234567890",
            "position": "middle",
            "theme": "neon"
        })))
        .unwrap();
        assert_eq!(config.position, WidgetPosition::BottomRight);
        assert_eq!(config.theme, WidgetTheme::Light);
        assert!(logs_contain("Invalid position"));
        assert!(logs_contain("Invalid theme"));
    }

    #[test]
    #[traced_test]
    fn test_oversized_limits_are_clamped() {
        let config = resolve(partial(json!({
            "apiKey": "1234567890",
            "maxFileSize": 100 * 1024 * 1024,
            "maxFilesPerMessage": 99
        })))
        .unwrap();
        assert_eq!(config.max_file_size, MAX_FILE_SIZE_CEILING);
        assert_eq!(config.max_files_per_message, MAX_FILES_PER_MESSAGE_CEILING);
        assert!(logs_contain("clamping"));

        let exact = resolve(partial(json!({
            "apiKey": "1234567890",
            "maxFileSize": MAX_FILE_SIZE_CEILING
        })))
        .unwrap();
        assert_eq!(exact.max_file_size, MAX_FILE_SIZE_CEILING);
    }

    #[test]
    #[traced_test]
    fn test_wrong_typed_fields_fall_back_to_defaults() {
        let config = resolve(partial(json!({
            "apiKey": "1234567890",
            "position": 5,
            "maxFileSize": -1,
            "autoOpen": "yes",
            "allowedFileTypes": "image/*",
            "companyName": "Acme"
        })))
        .unwrap();
        assert_eq!(config.position, WidgetPosition::BottomRight);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert!(!config.auto_open);
        assert_eq!(config.allowed_file_types.len(), 5);
        assert_eq!(config.company_name, "Acme");
        assert!(logs_contain("Invalid configuration value, using default"));
    }

    #[test]
    fn test_wrong_typed_api_key_is_still_fatal() {
        let err = resolve(partial(json!({ "apiKey": 12345678901u64 }))).unwrap_err();
        assert!(matches!(err, WidgetError::Configuration(_)));

        let null_key = resolve(partial(json!({ "apiKey": null, "theme": "dark" }))).unwrap_err();
        assert!(matches!(null_key, WidgetError::Configuration(_)));
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let config = resolve(partial(json!({
            "apiKey": "1234567890",
            "crmSegment": "enterprise",
            "customCSS": ".x { color: red }"
        })))
        .unwrap();
        assert_eq!(config.extra.get("crmSegment"), Some(&json!("enterprise")));
        assert_eq!(config.custom_css.as_deref(), Some(".x { color: red }"));

        let out = serde_json::to_value(&config).unwrap();
        assert_eq!(out["crmSegment"], "enterprise");
        assert_eq!(out["position"], "bottom-right");
    }

    #[test]
    #[traced_test]
    fn test_merged_is_shallow_and_keeps_valid_key() {
        let base = resolve(partial(json!({
            "apiKey": "1234567890",
            "companyName": "Acme",
            "theme": "dark"
        })))
        .unwrap();

        let next = base.merged(partial(json!({ "greeting": "Yo", "apiKey": "bad" })));
        assert_eq!(next.api_key, "1234567890");
        assert_eq!(next.company_name, "Acme");
        assert_eq!(next.theme, WidgetTheme::Dark);
        assert_eq!(next.greeting, "Yo");
        assert!(logs_contain("Ignoring invalid apiKey"));

        // The base config is untouched
        assert_eq!(base.greeting, "Hi! How can we help you today?");
    }

    #[test]
    fn test_hooks_survive_merge_unless_replaced() {
        let first = capture_sink();
        let base = resolve(PartialWidgetConfig::with_api_key("1234567890").hooks(first.clone())).unwrap();
        let next = base.merged(partial(json!({ "language": "de" })));
        next.emit(WidgetEvent::Ready);
        assert_eq!(first.count_kind(EventKind::Ready), 1);

        let second = capture_sink();
        let replaced = next.merged(PartialWidgetConfig::default().hooks(second.clone()));
        replaced.emit(WidgetEvent::Opened);
        assert_eq!(first.count(), 1);
        assert_eq!(second.count_kind(EventKind::Opened), 1);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn known_or_arbitrary(known: &'static [&'static str]) -> impl Strategy<Value = String> {
            prop_oneof![
                proptest::sample::select(known).prop_map(str::to_string),
                ".*",
            ]
        }

        proptest! {
            #[test]
            fn resolved_values_stay_within_bounds(
                position in known_or_arbitrary(&["bottom-right", "bottom-left", "top-right", "top-left"]),
                theme in known_or_arbitrary(&["light", "dark", "auto"]),
                shadow in known_or_arbitrary(&["none", "small", "medium", "large"]),
                max_file_size in any::<u64>(),
                max_files in any::<u64>(),
            ) {
                let config = resolve(partial(json!({
                    "apiKey": "1234567890",
                    "position": position,
                    "theme": theme,
                    "shadowLevel": shadow,
                    "maxFileSize": max_file_size,
                    "maxFilesPerMessage": max_files,
                })))
                .unwrap();

                prop_assert_eq!(config.position, WidgetPosition::from_name(&position).unwrap_or_default());
                prop_assert_eq!(config.theme, WidgetTheme::from_name(&theme).unwrap_or_default());
                prop_assert_eq!(config.shadow_level, ShadowLevel::from_name(&shadow).unwrap_or_default());
                prop_assert_eq!(config.max_file_size, max_file_size.min(MAX_FILE_SIZE_CEILING));
                let expected_files = match u32::try_from(max_files) {
                    Ok(count) => count.min(MAX_FILES_PER_MESSAGE_CEILING),
                    Err(_) => 5,
                };
                prop_assert_eq!(config.max_files_per_message, expected_files);
            }

            #[test]
            fn short_api_key_always_fails(
                key in "\\PC{0,9}",
                position in ".*",
                auto_open in any::<bool>(),
                max_file_size in any::<u64>(),
                company in ".*",
            ) {
                let result = resolve(partial(json!({
                    "apiKey": key,
                    "position": position,
                    "autoOpen": auto_open,
                    "maxFileSize": max_file_size,
                    "companyName": company,
                })));
                prop_assert!(matches!(result, Err(WidgetError::Configuration(_))));
            }
        }
    }
}
