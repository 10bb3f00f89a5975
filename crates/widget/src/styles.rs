//! Container naming and the base stylesheet injected into the host page.

use fluent_core::config::WidgetConfig;

/// Id of the container element appended to `<body>`.
pub const ROOT_ID: &str = "fluent-widget-root";
/// Id of the `<style>` block appended to `<head>`.
pub const STYLES_ID: &str = "fluent-widget-styles";

const BASE_STYLES: &str = r#"
.fluent-widget-container {
  position: fixed !important;
  z-index: 2147483647 !important;
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif !important;
  font-size: 14px !important;
  line-height: 1.4 !important;
  color: initial !important;
  background: none !important;
  border: none !important;
  margin: 0 !important;
  padding: 0 !important;
  box-sizing: border-box !important;
}

.fluent-widget-container * {
  box-sizing: border-box !important;
}

.fluent-widget-bottom-right { bottom: 20px !important; right: 20px !important; }
.fluent-widget-bottom-left { bottom: 20px !important; left: 20px !important; }
.fluent-widget-top-right { top: 20px !important; right: 20px !important; }
.fluent-widget-top-left { top: 20px !important; left: 20px !important; }

@media (max-width: 768px) {
  .fluent-widget-no-mobile { display: none !important; }
}

@media (min-width: 769px) {
  .fluent-widget-no-desktop { display: none !important; }
}

.fluent-widget-container {
  all: initial !important;
  position: fixed !important;
  z-index: 2147483647 !important;
}
"#;

/// Class list for the container: base, position, theme, device visibility.
pub fn container_classes(config: &WidgetConfig) -> Vec<String> {
    let mut classes = vec![
        "fluent-widget-container".to_string(),
        format!("fluent-widget-{}", config.position.as_str()),
        format!("fluent-widget-{}", config.theme.as_str()),
        if config.show_on_mobile {
            "fluent-widget-mobile".to_string()
        } else {
            "fluent-widget-no-mobile".to_string()
        },
    ];
    if !config.show_on_desktop {
        classes.push("fluent-widget-no-desktop".to_string());
    }
    classes
}

/// Base stylesheet followed by the host's `customCSS`, if any.
pub fn stylesheet(config: &WidgetConfig) -> String {
    match config.custom_css.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => format!("{BASE_STYLES}\n{custom}\n"),
        _ => BASE_STYLES.to_string(),
    }
}
