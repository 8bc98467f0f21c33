//! Context configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or a
//! partial file is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::{Charset, ContentType};
use crate::status::{AuditLevel, FaultLevel};

/// Settings applied to every context a factory creates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Initial audit settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Initial fault reporting settings
    #[serde(default)]
    pub faults: FaultConfig,

    /// Message-backed variable settings
    #[serde(default)]
    pub messages: MessageConfig,

    /// Timing collection settings
    #[serde(default)]
    pub timing: TimingConfig,
}

impl ContextConfig {
    /// Loads configuration from `path`, returning defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "context config not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded context config");
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.audit.default_level == AuditLevel::Severe {
            return Err(Error::Config {
                message: "audit.default_level SEVERE is reserved for audit system events".into(),
            });
        }
        ContentType::parse(&self.messages.variable_content_type).map_err(|reason| {
            Error::Config {
                message: format!("messages.variable_content_type: {}", reason),
            }
        })?;
        if let Some(charset) = &self.messages.write_back_charset {
            Charset::from_label(charset).ok_or_else(|| Error::Config {
                message: format!("messages.write_back_charset: unsupported charset '{}'", charset),
            })?;
        }
        Ok(())
    }

    /// The explicit write-back charset, if one is configured.
    pub(crate) fn write_back_charset(&self) -> Option<Charset> {
        self.messages
            .write_back_charset
            .as_deref()
            .and_then(Charset::from_label)
    }
}

/// Audit settings of a new root context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Initial audit level; `SEVERE` is rejected
    #[serde(default)]
    pub default_level: AuditLevel,

    /// Initial value of the save-request flag
    #[serde(default)]
    pub save_request: bool,

    /// Initial value of the save-response flag
    #[serde(default)]
    pub save_response: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_level: AuditLevel::Info,
            save_request: false,
            save_response: false,
        }
    }
}

/// Fault reporting settings of a new root context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Initial fault level
    #[serde(default)]
    pub level: FaultLevel,
}

/// Settings for messages materialized from variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Content type given to messages synthesized from string variables
    #[serde(default = "default_variable_content_type")]
    pub variable_content_type: String,

    /// Charset used to write message bodies back to their variables,
    /// overriding the message's declared charset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_back_charset: Option<String>,
}

fn default_variable_content_type() -> String {
    "text/plain; charset=utf-8".into()
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            variable_content_type: default_variable_content_type(),
            write_back_charset: None,
        }
    }
}

/// Timing collection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Whether assertion latency reported by the execution engine is summed
    #[serde(default = "default_true")]
    pub record_assertion_latency: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            record_assertion_latency: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ContextConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audit.default_level, AuditLevel::Info);
        assert_eq!(config.faults.level, FaultLevel::GenericFault);
        assert!(config.timing.record_assertion_latency);
        assert!(config.write_back_charset().is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = ContextConfig::from_toml_str(
            r#"
[audit]
default_level = "WARNING"
save_request = true

[messages]
write_back_charset = "iso-8859-1"
"#,
        )
        .unwrap();
        assert_eq!(config.audit.default_level, AuditLevel::Warning);
        assert!(config.audit.save_request);
        assert!(!config.audit.save_response);
        assert_eq!(config.write_back_charset(), Some(Charset::Iso8859_1));
        assert_eq!(
            config.messages.variable_content_type,
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn severe_default_level_rejected() {
        let result = ContextConfig::from_toml_str("[audit]\ndefault_level = \"SEVERE\"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn unknown_write_back_charset_rejected() {
        let result = ContextConfig::from_toml_str("[messages]\nwrite_back_charset = \"ebcdic\"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn fault_level_uses_snake_case() {
        let config =
            ContextConfig::from_toml_str("[faults]\nlevel = \"full_trace_fault\"\n").unwrap();
        assert_eq!(config.faults.level, FaultLevel::FullTraceFault);
    }

    #[test]
    fn config_roundtrip_toml() {
        let mut config = ContextConfig::default();
        config.audit.save_response = true;
        let text = config.to_toml_string().unwrap();
        let parsed = ContextConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = ContextConfig::load_from(Path::new("/nonexistent/context.toml")).unwrap();
        assert_eq!(config, ContextConfig::default());
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.toml");
        std::fs::write(&path, "[timing]\nrecord_assertion_latency = false\n").unwrap();

        let config = ContextConfig::load_from(&path).unwrap();
        assert!(!config.timing.record_assertion_latency);
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.toml");
        std::fs::write(&path, "[audit\n").unwrap();

        assert!(matches!(
            ContextConfig::load_from(&path),
            Err(Error::Toml(_))
        ));
    }
}
