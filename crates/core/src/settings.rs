use serde::Deserialize;
use std::path::Path;

/// Runtime settings for hosts embedding the widget outside a browser (the
/// demo binary, integration harnesses). Loaded from an optional TOML/JSON file
/// and environment variables with the prefix `FLUENT_WIDGET__`.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    /// File backing the durable visitor storage.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Lower bound of the simulated reply delay.
    #[serde(default = "default_reply_delay_min_ms")]
    pub reply_delay_min_ms: u64,
    /// Upper bound (exclusive) of the simulated reply delay.
    #[serde(default = "default_reply_delay_max_ms")]
    pub reply_delay_max_ms: u64,
    #[serde(default = "default_auto_init_delay_ms")]
    pub auto_init_delay_ms: u64,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_storage_path() -> String {
    "fluent-widget-storage.json".to_string()
}
fn default_reply_delay_min_ms() -> u64 {
    1000
}
fn default_reply_delay_max_ms() -> u64 {
    3000
}
fn default_auto_init_delay_ms() -> u64 {
    100
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            reply_delay_min_ms: default_reply_delay_min_ms(),
            reply_delay_max_ms: default_reply_delay_max_ms(),
            auto_init_delay_ms: default_auto_init_delay_ms(),
            json_logs: false,
        }
    }
}

impl RuntimeSettings {
    /// Load settings from environment variables and an optional config file.
    /// Environment variables take precedence over the file.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("FLUENT_WIDGET")
                .separator("__")
                .try_parsing(true),
        );

        let settings: RuntimeSettings = builder.build()?.try_deserialize()?;
        settings.validated()
    }

    fn validated(self) -> Result<Self, config::ConfigError> {
        if self.reply_delay_max_ms < self.reply_delay_min_ms {
            return Err(config::ConfigError::Message(format!(
                "reply_delay_max_ms ({}) must not be below reply_delay_min_ms ({})",
                self.reply_delay_max_ms, self.reply_delay_min_ms
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.reply_delay_min_ms, 1000);
        assert_eq!(settings.reply_delay_max_ms, 3000);
        assert_eq!(settings.auto_init_delay_ms, 100);
        assert!(!settings.json_logs);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "storage_path = \"/tmp/visitor.json\"").unwrap();
        writeln!(file, "reply_delay_min_ms = 10").unwrap();
        writeln!(file, "reply_delay_max_ms = 20").unwrap();

        let settings = RuntimeSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.storage_path, "/tmp/visitor.json");
        assert_eq!(settings.reply_delay_min_ms, 10);
        assert_eq!(settings.reply_delay_max_ms, 20);
        assert_eq!(settings.auto_init_delay_ms, 100);
    }

    #[test]
    fn test_inverted_delay_window_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "reply_delay_min_ms = 500").unwrap();
        writeln!(file, "reply_delay_max_ms = 100").unwrap();

        assert!(RuntimeSettings::load(Some(file.path())).is_err());
    }
}
