//! YAML configuration.
//!
//! The configuration file mirrors the three concerns of the reader: how the
//! UID is rendered (`nfc`), which alerts reach the desktop (`notifications`)
//! and how hard the engine tries before escalating (`advanced`). Every field
//! has a default, so an empty or missing file is a valid configuration.
//!
//! ```yaml
//! nfc:
//!   device: 1
//!   decimal: true
//!   decimal_padding: 10
//!   end_char: enter
//! advanced:
//!   retry_attempts: 3
//!   max_context_failures: 5
//! ```

use crate::constants::{
    DEFAULT_MAX_CONTEXT_FAILURES, DEFAULT_RECONNECT_DELAY_SECS, DEFAULT_RESTART_DELAY_SECS,
    DEFAULT_RETRY_ATTEMPTS,
};
use crate::error::{Error, Result};
use crate::types::{CharFlag, DeviceSelection, OutputFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Complete reader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub nfc: NfcConfig,
    pub notifications: NotificationConfig,
    pub advanced: AdvancedConfig,
}

/// Reader selection and UID output format.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NfcConfig {
    /// 1-based reader number, 0 to prompt.
    pub device: usize,
    pub caps_lock: bool,
    pub reverse: bool,
    pub decimal: bool,
    pub decimal_padding: usize,
    pub end_char: CharFlag,
    pub in_char: CharFlag,
}

/// Desktop notification switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub show_success: bool,
    pub show_errors: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_success: true,
            show_errors: true,
        }
    }
}

/// Retry, reconnect and self-restart policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdvancedConfig {
    /// Attempts per fallible hardware step (at least 1).
    pub retry_attempts: u32,

    /// Seconds; base of the linear back-off and service-loop pause.
    pub reconnect_delay: u64,

    /// Start a new service iteration after a recoverable error.
    pub auto_reconnect: bool,

    /// Restart the process after too many consecutive system failures.
    pub self_restart: bool,

    /// Consecutive system failures that trigger a restart (at least 1).
    pub max_context_failures: u32,

    /// Seconds to wait before spawning the replacement process.
    pub restart_delay: u64,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY_SECS,
            auto_reconnect: true,
            self_restart: true,
            max_context_failures: DEFAULT_MAX_CONTEXT_FAILURES,
            restart_delay: DEFAULT_RESTART_DELAY_SECS,
        }
    }
}

impl AdvancedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay)
    }
}

impl Config {
    /// Load the configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No configuration file found, using defaults");
            return Ok(Self::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate a YAML document.
    ///
    /// # Examples
    ///
    /// ```
    /// use nfcuid_core::{CharFlag, Config};
    ///
    /// let config = Config::from_yaml_str("nfc:\n  in_char: hyphen\n").unwrap();
    /// assert_eq!(config.nfc.in_char, CharFlag::Hyphen);
    /// assert_eq!(config.advanced.retry_attempts, 3);
    /// ```
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // An empty document deserializes to `()`, not to an empty mapping.
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants that the types alone cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.advanced.retry_attempts < 1 {
            return Err(Error::Config(format!(
                "retry attempts must be at least 1, got: {}",
                self.advanced.retry_attempts
            )));
        }

        if self.advanced.max_context_failures < 1 {
            return Err(Error::Config(format!(
                "max context failures must be at least 1, got: {}",
                self.advanced.max_context_failures
            )));
        }

        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat {
            caps_lock: self.nfc.caps_lock,
            reverse: self.nfc.reverse,
            decimal: self.nfc.decimal,
            decimal_padding: self.nfc.decimal_padding,
            end_char: self.nfc.end_char,
            in_char: self.nfc.in_char,
        }
    }

    pub fn device_selection(&self) -> DeviceSelection {
        DeviceSelection::from_number(self.nfc.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.nfc.device, 0);
        assert_eq!(config.nfc.end_char, CharFlag::None);
        assert!(config.notifications.enabled);
        assert_eq!(config.advanced.retry_attempts, 3);
        assert_eq!(config.advanced.reconnect_delay(), Duration::from_secs(2));
        assert!(config.advanced.auto_reconnect);
        assert!(config.advanced.self_restart);
        assert_eq!(config.advanced.max_context_failures, 5);
        assert_eq!(config.advanced.restart_delay(), Duration::from_secs(10));
        assert_eq!(config.device_selection(), DeviceSelection::Prompt);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml_str("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
nfc:
  device: 2
  caps_lock: true
  reverse: true
  decimal: true
  decimal_padding: 10
  end_char: enter
  in_char: colon
notifications:
  enabled: true
  show_success: false
  show_errors: true
advanced:
  retry_attempts: 5
  reconnect_delay: 1
  auto_reconnect: false
  self_restart: false
  max_context_failures: 7
  restart_delay: 0
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        let format = config.output_format();

        assert!(format.caps_lock && format.reverse && format.decimal);
        assert_eq!(format.decimal_padding, 10);
        assert_eq!(format.end_char, CharFlag::Enter);
        assert_eq!(format.in_char, CharFlag::Colon);
        assert_eq!(config.device_selection().number(), 2);
        assert!(!config.notifications.show_success);
        assert_eq!(config.advanced.retry_attempts, 5);
        assert!(!config.advanced.auto_reconnect);
        assert_eq!(config.advanced.max_context_failures, 7);
        assert_eq!(config.advanced.restart_delay(), Duration::ZERO);
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let err = Config::from_yaml_str("advanced:\n  retry_attempts: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_max_failures_rejected() {
        let err = Config::from_yaml_str("advanced:\n  max_context_failures: 0\n").unwrap_err();
        assert!(err.to_string().contains("max context failures"));
    }

    #[test]
    fn test_negative_values_rejected_by_type() {
        let err = Config::from_yaml_str("nfc:\n  decimal_padding: -1\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_invalid_char_flag_rejected() {
        let err = Config::from_yaml_str("nfc:\n  end_char: pipe\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_yaml_str("nfc:\n  colour: red\n").is_err());
    }
}
