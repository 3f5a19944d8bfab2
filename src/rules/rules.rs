//! Built-in policy rules for physical-security events
//!
//! Each rule pairs a predicate over a single event with the verdict it
//! produces when the predicate holds. Rules never look at other events and
//! never fail: a missing or malformed field simply makes the predicate false.

use crate::config::{BusinessHours, TamperPolicy};
use crate::events::{
    ComplianceMapping, Event, IncidentDecision, IsoControl, PciRequirement, PolicyResult,
    Verdict, CAMERA_TAMPER_DETECTED, MOTION_DETECTED, RFID_ACCESS_DENIED, RFID_ACCESS_GRANTED,
    TEMP_THRESHOLD_EXCEEDED,
};
use crate::rules::PolicyRule;
use chrono::Timelike;

/// Denial count assumed when a denied-access event carries none
const DEFAULT_DENIED_ATTEMPTS: u32 = 1;

fn violation(
    policy_id: &str,
    policy_name: &str,
    reason: String,
    compliance_mapping: ComplianceMapping,
    incident_type: &str,
) -> Verdict {
    Verdict {
        policy_result: PolicyResult {
            policy_id: Some(policy_id.to_string()),
            policy_name: policy_name.to_string(),
            is_violation: true,
            reason,
        },
        compliance_mapping,
        incident: IncidentDecision {
            create_incident: true,
            incident_type: Some(incident_type.to_string()),
        },
    }
}

fn iso_only(control_id: &str, title: &str) -> ComplianceMapping {
    ComplianceMapping {
        iso27001_controls: vec![IsoControl::new(control_id, title)],
        pcidss_requirements: Vec::new(),
    }
}

fn is_after_hours(event: &Event, hours: BusinessHours) -> bool {
    event
        .local_time()
        .map(|time| hours.is_after_hours(time.hour()))
        .unwrap_or(false)
}

/// RFID access granted outside business hours
pub struct AfterHoursAccessRule {
    pub hours: BusinessHours,
}

impl AfterHoursAccessRule {
    pub fn new(hours: BusinessHours) -> Self {
        Self { hours }
    }
}

impl PolicyRule for AfterHoursAccessRule {
    fn matches(&self, event: &Event) -> bool {
        event.event_type == RFID_ACCESS_GRANTED && is_after_hours(event, self.hours)
    }

    fn verdict(&self, _event: &Event) -> Verdict {
        violation(
            self.policy_id(),
            self.name(),
            "RFID access occurred outside approved business hours.".to_string(),
            iso_only("A.11.1.2", "Physical entry controls"),
            "UNAUTHORISED_PHYSICAL_ACCESS",
        )
    }

    fn policy_id(&self) -> &str {
        "POL-PA-001"
    }

    fn name(&self) -> &str {
        "AFTER_HOURS_PHYSICAL_ACCESS"
    }
}

/// Denied RFID access with a consecutive-denial count at or above the threshold
pub struct RepeatedDenialRule {
    pub threshold: u32,
}

impl RepeatedDenialRule {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }
}

impl PolicyRule for RepeatedDenialRule {
    fn matches(&self, event: &Event) -> bool {
        event.event_type == RFID_ACCESS_DENIED
            && event.denied_attempts.unwrap_or(DEFAULT_DENIED_ATTEMPTS) >= self.threshold
    }

    fn verdict(&self, event: &Event) -> Verdict {
        let count = event.denied_attempts.unwrap_or(DEFAULT_DENIED_ATTEMPTS);
        violation(
            self.policy_id(),
            self.name(),
            format!("{} consecutive RFID access denial attempts detected.", count),
            iso_only("A.11.1.3", "Securing offices, rooms and facilities"),
            "POTENTIAL_INTRUSION_ATTEMPT",
        )
    }

    fn policy_id(&self) -> &str {
        "POL-PA-002"
    }

    fn name(&self) -> &str {
        "SUSPICIOUS_ACCESS_ATTEMPTS"
    }
}

/// Motion detected after hours inside a sensitive zone
pub struct AfterHoursMotionRule {
    pub hours: BusinessHours,
    sensitive_zones: Vec<String>,
}

impl AfterHoursMotionRule {
    pub fn new(hours: BusinessHours, sensitive_zones: Vec<String>) -> Self {
        Self {
            hours,
            sensitive_zones,
        }
    }
}

impl PolicyRule for AfterHoursMotionRule {
    fn matches(&self, event: &Event) -> bool {
        event.event_type == MOTION_DETECTED
            && self.sensitive_zones.iter().any(|zone| *zone == event.zone)
            && is_after_hours(event, self.hours)
    }

    fn verdict(&self, event: &Event) -> Verdict {
        violation(
            self.policy_id(),
            self.name(),
            format!("After-hours motion in restricted zone {}.", event.zone),
            iso_only("A.11.1.5", "Working in secure areas"),
            "SUSPICIOUS_AFTER_HOURS_ACTIVITY",
        )
    }

    fn policy_id(&self) -> &str {
        "POL-PA-003"
    }

    fn name(&self) -> &str {
        "AFTER_HOURS_RESTRICTED_MOTION"
    }
}

/// Server room temperature strictly above the configured threshold
pub struct EnvironmentalThresholdRule {
    server_room_zone: String,
    pub threshold: f64,
}

impl EnvironmentalThresholdRule {
    pub fn new(server_room_zone: String, threshold: f64) -> Self {
        Self {
            server_room_zone,
            threshold,
        }
    }
}

impl PolicyRule for EnvironmentalThresholdRule {
    fn matches(&self, event: &Event) -> bool {
        event.event_type == TEMP_THRESHOLD_EXCEEDED
            && event.zone == self.server_room_zone
            && event
                .temperature
                .map(|temp| temp > self.threshold)
                .unwrap_or(false)
    }

    fn verdict(&self, event: &Event) -> Verdict {
        let reason = match event.temperature {
            Some(temp) => format!(
                "Environmental threshold breach: server room temperature exceeded safe threshold ({:?}°C).",
                temp
            ),
            None => "Environmental threshold breach in server room.".to_string(),
        };
        violation(
            self.policy_id(),
            self.name(),
            reason,
            iso_only("A.11.2.2", "Supporting utilities"),
            "ENVIRONMENTAL_RISK",
        )
    }

    fn policy_id(&self) -> &str {
        "POL-ENV-001"
    }

    fn name(&self) -> &str {
        "ENVIRONMENTAL_CONTROL_FAILURE"
    }
}

/// Camera tampering, scoped by [`TamperPolicy`]
pub struct SurveillanceTamperRule {
    pub policy: TamperPolicy,
    cash_handling_zone: String,
}

impl SurveillanceTamperRule {
    pub fn new(policy: TamperPolicy, cash_handling_zone: String) -> Self {
        Self {
            policy,
            cash_handling_zone,
        }
    }
}

impl PolicyRule for SurveillanceTamperRule {
    fn matches(&self, event: &Event) -> bool {
        if event.event_type != CAMERA_TAMPER_DETECTED {
            return false;
        }
        match self.policy {
            TamperPolicy::CashHandlingOnly => event.zone == self.cash_handling_zone,
            TamperPolicy::AnyZone => true,
        }
    }

    fn verdict(&self, event: &Event) -> Verdict {
        match self.policy {
            TamperPolicy::CashHandlingOnly => violation(
                self.policy_id(),
                self.name(),
                "Camera tampering detected in payment-sensitive area.".to_string(),
                ComplianceMapping {
                    iso27001_controls: Vec::new(),
                    pcidss_requirements: vec![PciRequirement::new(
                        "PCI DSS Req. 9",
                        "Restrict physical access to cardholder data",
                    )],
                },
                "SURVEILLANCE_COMPROMISE",
            ),
            TamperPolicy::AnyZone => violation(
                self.policy_id(),
                self.name(),
                format!("Camera tampering detected in zone {}.", event.zone),
                iso_only("A.11.2.1", "Equipment siting and protection"),
                "SURVEILLANCE_TAMPER",
            ),
        }
    }

    fn policy_id(&self) -> &str {
        "POL-SV-001"
    }

    fn name(&self) -> &str {
        "SURVEILLANCE_TAMPERING"
    }
}

/// Any denied RFID access; only installed under `DenialPolicy::AnyDenial`,
/// after [`RepeatedDenialRule`], so it catches below-threshold denials
pub struct UnauthorizedAccessAttemptRule;

impl PolicyRule for UnauthorizedAccessAttemptRule {
    fn matches(&self, event: &Event) -> bool {
        event.event_type == RFID_ACCESS_DENIED
    }

    fn verdict(&self, event: &Event) -> Verdict {
        let count = event.denied_attempts.unwrap_or(DEFAULT_DENIED_ATTEMPTS);
        violation(
            self.policy_id(),
            self.name(),
            format!(
                "Unauthorized physical access attempt ({} denied attempt(s)).",
                count
            ),
            iso_only("A.11.1.2", "Physical entry controls"),
            "UNAUTHORIZED_ACCESS_ATTEMPT",
        )
    }

    fn policy_id(&self) -> &str {
        "POL-PA-004"
    }

    fn name(&self) -> &str {
        "UNAUTHORIZED_ACCESS_ATTEMPT"
    }
}
