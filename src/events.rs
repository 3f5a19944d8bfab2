//! Core event and verdict types for the GRSee compliance monitor
//!
//! This module defines the records that flow through the application: the raw
//! physical-security [`Event`] reported by a sensor, the [`Verdict`] the rule
//! engine derives from it, and the helpers for interpreting facility-local
//! timestamps and severity labels.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Timestamp type for records the application creates itself (incidents, reports)
pub type Timestamp = DateTime<Utc>;

pub const RFID_ACCESS_GRANTED: &str = "RFID_ACCESS_GRANTED";
pub const RFID_ACCESS_DENIED: &str = "RFID_ACCESS_DENIED";
pub const MOTION_DETECTED: &str = "MOTION_DETECTED";
pub const TEMP_THRESHOLD_EXCEEDED: &str = "TEMP_THRESHOLD_EXCEEDED";
pub const CAMERA_TAMPER_DETECTED: &str = "CAMERA_TAMPER_DETECTED";

/// Physical-security event reported by an RFID reader, PIR sensor, thermometer or camera
///
/// Every field deserializes leniently: a missing or `null` string becomes empty
/// and an optional numeric with the wrong type becomes `None`, so a partially
/// filled payload still evaluates (to a compliant verdict) instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Public identifier assigned by the producing device or gateway
    #[serde(default, deserialize_with = "lenient_string")]
    pub event_id: String,
    /// Facility-local wall-clock time, see [`parse_timestamp`]
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    /// Device family (RFID, PIR, TEMP, CAMERA, ...)
    #[serde(default, deserialize_with = "lenient_string")]
    pub device_type: String,
    /// Facility zone the device is installed in
    #[serde(default, deserialize_with = "lenient_string")]
    pub zone: String,
    /// Event classification, e.g. `RFID_ACCESS_DENIED`
    #[serde(default, deserialize_with = "lenient_string")]
    pub event_type: String,
    /// Free-text severity label, compared case-insensitively
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: String,
    /// Human-readable description
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    /// Consecutive denials reported with `RFID_ACCESS_DENIED`
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub denied_attempts: Option<u32>,
    /// Measured temperature reported with `TEMP_THRESHOLD_EXCEEDED`
    #[serde(
        default,
        deserialize_with = "lenient_float",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
}

impl Event {
    /// Parse an event from a single JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Build an event from an already parsed JSON value
    ///
    /// Only objects are accepted; arrays would otherwise bind positionally.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom("event must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Facility-local time of the event, `None` when the timestamp is unparseable
    pub fn local_time(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }

    /// Recognized severity bucket, `None` for labels outside low/medium/high/critical
    pub fn severity_level(&self) -> Option<SeverityLevel> {
        SeverityLevel::from_label(&self.severity)
    }

    /// Key identifying the reporting device in the store
    pub fn device_key(&self) -> String {
        format!("{}:{}", self.device_type, self.zone)
    }
}

/// Parse a facility-local timestamp
///
/// Accepts `YYYY-MM-DD HH:MM:SS` (optionally with fractional seconds) and
/// ISO-8601 `YYYY-MM-DDTHH:MM:SS` with an optional fraction and an optional
/// `Z`, `±HH:MM` or `±HHMM` suffix. The offset is dropped, not applied: the
/// returned value is the wall-clock time exactly as written.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Newest-first ordering on parsed timestamps
///
/// Unparseable timestamps sort after every parseable one and fall back to
/// descending string order among themselves.
pub fn newest_first(a: &Event, b: &Event) -> Ordering {
    match (a.local_time(), b.local_time()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.timestamp.cmp(&a.timestamp),
    }
}

/// Recognized severity buckets, ordered from least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    /// Map a free-text label onto a bucket, ignoring case and surrounding whitespace
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Whether events of this severity show up in the recent alerts panel
    pub fn is_alerting(&self) -> bool {
        *self >= Self::High
    }
}

/// ISO/IEC 27001 Annex A control cited by a violation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IsoControl {
    pub control_id: String,
    pub title: String,
}

impl IsoControl {
    pub fn new(control_id: &str, title: &str) -> Self {
        Self {
            control_id: control_id.to_string(),
            title: title.to_string(),
        }
    }
}

/// PCI DSS requirement cited by a violation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PciRequirement {
    pub requirement_id: String,
    pub title: String,
}

impl PciRequirement {
    pub fn new(requirement_id: &str, title: &str) -> Self {
        Self {
            requirement_id: requirement_id.to_string(),
            title: title.to_string(),
        }
    }
}

/// Outcome of the policy check for one event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyResult {
    /// Identifier of the matching policy, `None` when nothing matched
    pub policy_id: Option<String>,
    pub policy_name: String,
    pub is_violation: bool,
    pub reason: String,
}

/// Standards citations attached to a violation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceMapping {
    pub iso27001_controls: Vec<IsoControl>,
    pub pcidss_requirements: Vec<PciRequirement>,
}

impl ComplianceMapping {
    pub fn is_empty(&self) -> bool {
        self.iso27001_controls.is_empty() && self.pcidss_requirements.is_empty()
    }
}

/// Whether the event warrants a follow-up incident
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentDecision {
    pub create_incident: bool,
    pub incident_type: Option<String>,
}

/// Structured judgment about one event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub policy_result: PolicyResult,
    pub compliance_mapping: ComplianceMapping,
    pub incident: IncidentDecision,
}

impl Verdict {
    /// Verdict returned when no policy rule matches
    pub fn compliant() -> Self {
        Self {
            policy_result: PolicyResult {
                policy_id: None,
                policy_name: "NO_VIOLATION".to_string(),
                is_violation: false,
                reason: "Event is within defined policy conditions.".to_string(),
            },
            compliance_mapping: ComplianceMapping::default(),
            incident: IncidentDecision::default(),
        }
    }

    pub fn is_violation(&self) -> bool {
        self.policy_result.is_violation
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Self::compliant()
    }
}

/// An event paired with the verdict the rule engine produced for it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatedEvent {
    pub event: Event,
    pub verdict: Verdict,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => match n.as_u64() {
            Some(n) => u32::try_from(n).ok(),
            // Whole floats such as 3.0 count; fractional or negative ones don't
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u32),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|t| t.is_finite()),
        _ => None,
    }))
}
