//! Kiosk configuration

use kiosklock_controller::{ControllerConfig, ServiceActivity};
use kiosklock_core::constants::{
    DEFAULT_AUTO_RELOCK_SECS, DEFAULT_BAUD_RATE, DEFAULT_CREDENTIALS_FILE,
    DEFAULT_ERROR_DISPLAY_MS, DEFAULT_INITIAL_LOCK_DELAY_SECS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_RECONNECT_BACKOFF_MS, DEFAULT_SERIAL_PORT, DEFAULT_TRIGGER_MIN_INTERVAL_MS,
    MAX_ENTRY_LENGTH,
};
use kiosklock_core::{Error, Result};
use kiosklock_hardware::{SerialConfig, TriggerChannelConfig, TriggerPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "KIOSKLOCK_CONFIG";

/// Config file used when the environment variable is unset
pub const DEFAULT_CONFIG_FILE: &str = "kiosklock.json";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Credential source (one code per line)
    pub credentials_path: PathBuf,

    /// Trigger line
    pub serial: SerialSection,

    /// Lock behaviour
    pub lock: LockSection,
}

/// Serial trigger settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub reconnect_backoff_ms: u64,
    /// `{"token": "TRIGGER"}` or `"any_line"`
    pub policy: TriggerPolicy,
    /// Set to false on kiosks without a trigger board
    pub enabled: bool,
}

/// Lock controller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSection {
    /// Idle seconds before relocking (0 disables)
    pub auto_relock_secs: u64,
    pub trigger_min_interval_ms: u64,
    /// Start unlocked and lock after this many seconds (0 starts locked)
    pub initial_lock_delay_secs: u64,
    pub max_entry_length: usize,
    pub service_pin: Option<String>,
    pub service_activity: ServiceActivity,
    pub error_display_ms: u64,
    /// Match cards against decimal UID entries too
    pub match_decimal_uid: bool,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            serial: SerialSection::default(),
            lock: LockSection::default(),
        }
    }
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            reconnect_backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
            policy: TriggerPolicy::default(),
            enabled: true,
        }
    }
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            auto_relock_secs: DEFAULT_AUTO_RELOCK_SECS,
            trigger_min_interval_ms: DEFAULT_TRIGGER_MIN_INTERVAL_MS,
            initial_lock_delay_secs: DEFAULT_INITIAL_LOCK_DELAY_SECS,
            max_entry_length: MAX_ENTRY_LENGTH,
            service_pin: None,
            service_activity: ServiceActivity::default(),
            error_display_ms: DEFAULT_ERROR_DISPLAY_MS,
            match_decimal_uid: false,
        }
    }
}

impl KioskConfig {
    /// Config path from the environment, else the default file
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the file, writing defaults first if it does not exist.
    ///
    /// Returns the config and whether the file was created.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }

        let config = Self::default();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        config.save(path)?;
        Ok((config, true))
    }

    /// Reject settings the kiosk cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(Error::Config("serial.port must not be empty".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::Config("serial.baud_rate must be non-zero".into()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(Error::Config("serial.read_timeout_ms must be non-zero".into()));
        }
        if let TriggerPolicy::Token(token) = &self.serial.policy
            && token.trim().is_empty()
        {
            return Err(Error::Config("serial.policy token must not be empty".into()));
        }
        if self.lock.max_entry_length == 0 {
            return Err(Error::Config("lock.max_entry_length must be non-zero".into()));
        }
        if self
            .lock
            .service_pin
            .as_deref()
            .is_some_and(|pin| pin.trim().is_empty())
        {
            return Err(Error::Config("lock.service_pin must not be blank".into()));
        }
        Ok(())
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(self.serial.port.clone())
            .with_baud_rate(self.serial.baud_rate)
            .with_read_timeout(Duration::from_millis(self.serial.read_timeout_ms))
    }

    pub fn channel_config(&self) -> TriggerChannelConfig {
        TriggerChannelConfig {
            policy: self.serial.policy.clone(),
            reconnect_backoff: Duration::from_millis(self.serial.reconnect_backoff_ms),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            relock_after: Duration::from_secs(self.lock.auto_relock_secs),
            trigger_min_interval: Duration::from_millis(self.lock.trigger_min_interval_ms),
            initial_lock_delay: Duration::from_secs(self.lock.initial_lock_delay_secs),
            max_entry_length: self.lock.max_entry_length,
            service_pin: self.lock.service_pin.clone(),
            service_activity: self.lock.service_activity,
            error_display: Duration::from_millis(self.lock.error_display_ms),
            match_decimal_uid: self.lock.match_decimal_uid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("kiosklock.json");

        let (config, created) = KioskConfig::load_or_create(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config, KioskConfig::default());

        let (reloaded, created) = KioskConfig::load_or_create(&path).unwrap();
        assert!(!created);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiosklock.json");
        std::fs::write(
            &path,
            r#"{"serial": {"port": "COM7", "policy": "any_line"}, "lock": {"service_pin": "1423", "service_activity": "keystroke"}}"#,
        )
        .unwrap();

        let config = KioskConfig::load(&path).unwrap();
        assert_eq!(config.serial.port, "COM7");
        assert_eq!(config.serial.policy, TriggerPolicy::AnyLine);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.lock.auto_relock_secs, 90);
        assert_eq!(config.lock.service_activity, ServiceActivity::Keystroke);
        assert_eq!(config.credentials_path, PathBuf::from(DEFAULT_CREDENTIALS_FILE));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiosklock.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = KioskConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(KioskConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case::empty_port(|c: &mut KioskConfig| c.serial.port = String::new())]
    #[case::zero_baud(|c: &mut KioskConfig| c.serial.baud_rate = 0)]
    #[case::zero_timeout(|c: &mut KioskConfig| c.serial.read_timeout_ms = 0)]
    #[case::empty_token(|c: &mut KioskConfig| c.serial.policy = TriggerPolicy::Token(" ".into()))]
    #[case::zero_entry(|c: &mut KioskConfig| c.lock.max_entry_length = 0)]
    #[case::blank_pin(|c: &mut KioskConfig| c.lock.service_pin = Some(String::new()))]
    fn test_invalid_settings_rejected(#[case] mutate: fn(&mut KioskConfig)) {
        let mut config = KioskConfig::default();
        mutate(&mut config);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_controller_config_conversion() {
        let mut config = KioskConfig::default();
        config.lock.auto_relock_secs = 0;
        config.lock.initial_lock_delay_secs = 5;
        config.lock.service_pin = Some("1423".into());

        let controller = config.controller_config();
        assert!(controller.relock_after.is_zero());
        assert_eq!(controller.initial_lock_delay, Duration::from_secs(5));
        assert_eq!(controller.trigger_min_interval, Duration::from_secs(1));
        assert_eq!(controller.error_display, Duration::from_millis(900));
        assert_eq!(controller.service_pin.as_deref(), Some("1423"));

        let serial = config.serial_config();
        assert_eq!(serial.read_timeout, Duration::from_millis(200));
        assert_eq!(config.channel_config().reconnect_backoff, Duration::from_secs(1));
    }
}
