//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Configuration for tracing output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "application=debug,infrastructure=info");
    /// `RUST_LOG` takes precedence when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in each event
    #[serde(default)]
    pub with_file: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            format: LogFormat::default(),
            with_file: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.format, LogFormat::Text);
        assert!(!config.with_file);
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let parsed: TelemetryConfig = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(parsed.format, LogFormat::Json);
        assert_eq!(parsed.log_filter, "info");
    }
}
