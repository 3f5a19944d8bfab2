use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration loaded from a TOML file
///
/// Every section falls back to its defaults when omitted, so an empty file is
/// a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub rules: RuleConfig,
    pub dashboard: DashboardConfig,
    pub ingest: IngestConfig,
}

/// How `RFID_ACCESS_DENIED` events are judged
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialPolicy {
    /// Only a denial count at or above the threshold is a violation
    #[default]
    Threshold,
    /// Below-threshold denials are also violations, as unauthorized access attempts
    AnyDenial,
}

/// How `CAMERA_TAMPER_DETECTED` events are judged
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TamperPolicy {
    /// Tampering is a violation only in the cash-handling zone (PCI DSS scope)
    #[default]
    CashHandlingOnly,
    /// Tampering is a violation in every zone
    AnyZone,
}

/// Business context the rule engine evaluates events against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleConfig {
    /// First hour (0-23) inside business hours
    pub business_hours_start: u32,
    /// First hour after business hours; `start <= hour < end` is inside
    pub business_hours_end: u32,
    /// Minimum consecutive denials that constitute suspicious access attempts
    pub denied_attempts_threshold: u32,
    /// Server room temperature that must be strictly exceeded to breach
    pub server_room_temp_threshold: f64,
    /// Zones where after-hours motion is a violation
    pub sensitive_zones: Vec<String>,
    pub server_room_zone: String,
    pub cash_handling_zone: String,
    pub denial_policy: DenialPolicy,
    pub tamper_policy: TamperPolicy,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            business_hours_start: 8,
            business_hours_end: 18,
            denied_attempts_threshold: 3,
            server_room_temp_threshold: 30.0,
            sensitive_zones: vec!["CASH_VAULT".to_string(), "SERVER_ROOM".to_string()],
            server_room_zone: "SERVER_ROOM".to_string(),
            cash_handling_zone: "CASH_VAULT".to_string(),
            denial_policy: DenialPolicy::default(),
            tamper_policy: TamperPolicy::default(),
        }
    }
}

/// Half-open window of business hours, `start <= hour < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub start: u32,
    pub end: u32,
}

impl BusinessHours {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Whether `hour` falls outside the window
    pub fn is_after_hours(&self, hour: u32) -> bool {
        hour < self.start || hour >= self.end
    }
}

impl RuleConfig {
    pub fn business_hours(&self) -> BusinessHours {
        BusinessHours::new(self.business_hours_start, self.business_hours_end)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.business_hours_end > 24 {
            return Err(ConfigError::ValidationError(format!(
                "rules.business_hours_end must be at most 24, got {}",
                self.business_hours_end
            )));
        }
        if self.business_hours_start >= self.business_hours_end {
            return Err(ConfigError::ValidationError(format!(
                "rules.business_hours_start ({}) must be before business_hours_end ({})",
                self.business_hours_start, self.business_hours_end
            )));
        }
        if self.denied_attempts_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "rules.denied_attempts_threshold must be at least 1".to_string(),
            ));
        }
        if !self.server_room_temp_threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "rules.server_room_temp_threshold must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Dashboard aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Zones below this compliance percentage are flagged NEEDS_ATTENTION
    pub zone_compliance_threshold: f64,
    /// Number of high/critical events shown as recent alerts
    pub recent_alerts_limit: usize,
    /// Number of entries in the top event types and top zones rankings
    pub top_n: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            zone_compliance_threshold: 90.0,
            recent_alerts_limit: 5,
            top_n: 5,
        }
    }
}

impl DashboardConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.zone_compliance_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "dashboard.zone_compliance_threshold must be within 0-100, got {}",
                self.zone_compliance_threshold
            )));
        }
        if self.recent_alerts_limit == 0 {
            return Err(ConfigError::ValidationError(
                "dashboard.recent_alerts_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// JSON array of events loaded at startup
    pub events_file: PathBuf,
    /// Subscriber command printing one JSON event per line, e.g.
    /// `["mosquitto_sub", "-t", "grsee/events"]`; empty disables streaming
    pub stream_command: Vec<String>,
    /// Upper bound for the subscriber restart backoff
    pub max_restart_delay_seconds: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            events_file: PathBuf::from("data/mock_events.json"),
            stream_command: Vec::new(),
            max_restart_delay_seconds: 60,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML for this schema, and
    /// `ConfigError::ValidationError` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rules.validate()?;
        self.dashboard.validate()?;
        Ok(())
    }
}
