use crate::config::{DenialPolicy, RuleConfig};
use crate::events::{EvaluatedEvent, Event, Verdict};
use crate::rules::rules::{
    AfterHoursAccessRule, AfterHoursMotionRule, EnvironmentalThresholdRule, RepeatedDenialRule,
    SurveillanceTamperRule, UnauthorizedAccessAttemptRule,
};
use log::debug;

/// Ordered rule table that maps a single event to a verdict
///
/// Rules are evaluated in insertion order and the first match wins; an event
/// no rule matches gets [`Verdict::compliant`]. The engine holds no mutable
/// state, so one instance can be shared across threads.
pub struct RuleEngine {
    rules: Vec<Box<dyn PolicyRule>>,
}

/// A policy rule: a predicate over one event plus the verdict it produces
pub trait PolicyRule: Send + Sync {
    /// Whether this rule applies to the event
    fn matches(&self, event: &Event) -> bool;

    /// Verdict for an event this rule matches
    fn verdict(&self, event: &Event) -> Verdict;

    /// Stable policy identifier, e.g. `POL-PA-001`
    fn policy_id(&self) -> &str;

    /// Policy name reported in verdicts
    fn name(&self) -> &str;
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_builtin_rules(&RuleConfig::default())
    }
}

impl RuleEngine {
    /// Create a rule engine with no rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a rule engine with the built-in rule table in priority order:
    ///
    /// 1. after-hours RFID access
    /// 2. repeated RFID denial
    /// 3. after-hours motion in a sensitive zone
    /// 4. server room temperature breach
    /// 5. camera tampering
    /// 6. any RFID denial (only with [`DenialPolicy::AnyDenial`])
    pub fn with_builtin_rules(config: &RuleConfig) -> Self {
        let hours = config.business_hours();
        let mut engine = Self::new();

        engine.add_rule(Box::new(AfterHoursAccessRule::new(hours)));
        engine.add_rule(Box::new(RepeatedDenialRule::new(
            config.denied_attempts_threshold,
        )));
        engine.add_rule(Box::new(AfterHoursMotionRule::new(
            hours,
            config.sensitive_zones.clone(),
        )));
        engine.add_rule(Box::new(EnvironmentalThresholdRule::new(
            config.server_room_zone.clone(),
            config.server_room_temp_threshold,
        )));
        engine.add_rule(Box::new(SurveillanceTamperRule::new(
            config.tamper_policy,
            config.cash_handling_zone.clone(),
        )));
        if config.denial_policy == DenialPolicy::AnyDenial {
            engine.add_rule(Box::new(UnauthorizedAccessAttemptRule));
        }

        engine
    }

    /// Append a rule at the lowest priority
    pub fn add_rule(&mut self, rule: Box<dyn PolicyRule>) {
        self.rules.push(rule);
    }

    /// Evaluate one event; the first matching rule decides the verdict
    pub fn evaluate(&self, event: &Event) -> Verdict {
        for rule in &self.rules {
            if rule.matches(event) {
                debug!(
                    "Event {} matched policy {} ({})",
                    event.event_id,
                    rule.policy_id(),
                    rule.name()
                );
                return rule.verdict(event);
            }
        }

        Verdict::compliant()
    }

    /// Evaluate every event independently, preserving input order
    pub fn evaluate_batch(&self, events: &[Event]) -> Vec<EvaluatedEvent> {
        events
            .iter()
            .map(|event| EvaluatedEvent {
                event: event.clone(),
                verdict: self.evaluate(event),
            })
            .collect()
    }

    /// Get the number of configured rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Policy names in evaluation order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TamperPolicy;
    use crate::events::{
        CAMERA_TAMPER_DETECTED, MOTION_DETECTED, RFID_ACCESS_DENIED, RFID_ACCESS_GRANTED,
        TEMP_THRESHOLD_EXCEEDED,
    };

    fn create_test_event(event_type: &str, zone: &str, timestamp: &str) -> Event {
        Event {
            event_id: "evt_001".to_string(),
            timestamp: timestamp.to_string(),
            device_type: "TEST".to_string(),
            zone: zone.to_string(),
            event_type: event_type.to_string(),
            severity: "HIGH".to_string(),
            summary: "test".to_string(),
            denied_attempts: None,
            temperature: None,
        }
    }

    // Mock policy rule for testing
    struct MockPolicyRule {
        name: String,
        should_match: bool,
    }

    impl PolicyRule for MockPolicyRule {
        fn matches(&self, _event: &Event) -> bool {
            self.should_match
        }

        fn verdict(&self, _event: &Event) -> Verdict {
            let mut verdict = Verdict::compliant();
            verdict.policy_result.policy_name = self.name.clone();
            verdict.policy_result.is_violation = true;
            verdict
        }

        fn policy_id(&self) -> &str {
            "POL-MOCK"
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[test]
    fn test_rule_engine_creation() {
        let engine = RuleEngine::new();
        assert_eq!(engine.rule_count(), 0);

        let engine_default = RuleEngine::default();
        assert_eq!(engine_default.rule_count(), 5);
    }

    #[test]
    fn test_builtin_rule_order() {
        let engine = RuleEngine::default();
        assert_eq!(
            engine.rule_names(),
            vec![
                "AFTER_HOURS_PHYSICAL_ACCESS",
                "SUSPICIOUS_ACCESS_ATTEMPTS",
                "AFTER_HOURS_RESTRICTED_MOTION",
                "ENVIRONMENTAL_CONTROL_FAILURE",
                "SURVEILLANCE_TAMPERING",
            ]
        );

        let config = RuleConfig {
            denial_policy: DenialPolicy::AnyDenial,
            ..RuleConfig::default()
        };
        let engine = RuleEngine::with_builtin_rules(&config);
        assert_eq!(engine.rule_count(), 6);
        assert_eq!(engine.rule_names()[5], "UNAUTHORIZED_ACCESS_ATTEMPT");
    }

    #[test]
    fn test_first_match_wins() {
        let mut engine = RuleEngine::new();
        engine.add_rule(Box::new(MockPolicyRule {
            name: "skipped".to_string(),
            should_match: false,
        }));
        engine.add_rule(Box::new(MockPolicyRule {
            name: "first".to_string(),
            should_match: true,
        }));
        engine.add_rule(Box::new(MockPolicyRule {
            name: "second".to_string(),
            should_match: true,
        }));

        let verdict = engine.evaluate(&create_test_event("ANY", "LOBBY", ""));
        assert_eq!(verdict.policy_result.policy_name, "first");
    }

    #[test]
    fn test_empty_engine_is_compliant() {
        let engine = RuleEngine::new();
        let verdict = engine.evaluate(&create_test_event(
            CAMERA_TAMPER_DETECTED,
            "CASH_VAULT",
            "",
        ));
        assert_eq!(verdict, Verdict::compliant());
    }

    #[test]
    fn test_unrecognized_event_type_is_compliant() {
        let engine = RuleEngine::default();
        let verdict = engine.evaluate(&create_test_event(
            "DOOR_HELD_OPEN",
            "SERVER_ROOM",
            "2024-03-01 02:00:00",
        ));

        assert!(!verdict.is_violation());
        assert!(verdict.compliance_mapping.iso27001_controls.is_empty());
        assert!(verdict.compliance_mapping.pcidss_requirements.is_empty());
        assert!(!verdict.incident.create_incident);
    }

    #[test]
    fn test_after_hours_access_violation() {
        let engine = RuleEngine::default();
        let verdict = engine.evaluate(&create_test_event(
            RFID_ACCESS_GRANTED,
            "LOBBY",
            "2024-03-01 19:05:00",
        ));

        assert!(verdict.is_violation());
        assert_eq!(
            verdict.incident.incident_type.as_deref(),
            Some("UNAUTHORISED_PHYSICAL_ACCESS")
        );
    }

    #[test]
    fn test_business_hours_access_is_compliant() {
        let engine = RuleEngine::default();
        let verdict = engine.evaluate(&create_test_event(
            RFID_ACCESS_GRANTED,
            "LOBBY",
            "2024-03-01 09:30:00",
        ));
        assert!(!verdict.is_violation());
    }

    #[test]
    fn test_denial_threshold_policy() {
        let engine = RuleEngine::default();
        let mut event = create_test_event(RFID_ACCESS_DENIED, "LOBBY", "2024-03-01 10:00:00");

        event.denied_attempts = Some(3);
        let verdict = engine.evaluate(&event);
        assert!(verdict.is_violation());
        assert!(verdict.policy_result.reason.contains('3'));

        // Below threshold is compliant under the default threshold policy
        event.denied_attempts = Some(2);
        assert!(!engine.evaluate(&event).is_violation());
    }

    #[test]
    fn test_denial_any_denial_policy() {
        let config = RuleConfig {
            denial_policy: DenialPolicy::AnyDenial,
            ..RuleConfig::default()
        };
        let engine = RuleEngine::with_builtin_rules(&config);
        let mut event = create_test_event(RFID_ACCESS_DENIED, "LOBBY", "2024-03-01 10:00:00");

        event.denied_attempts = Some(2);
        let verdict = engine.evaluate(&event);
        assert!(verdict.is_violation());
        assert_eq!(
            verdict.incident.incident_type.as_deref(),
            Some("UNAUTHORIZED_ACCESS_ATTEMPT")
        );

        // The threshold rule keeps precedence at or above the threshold
        event.denied_attempts = Some(5);
        assert_eq!(
            engine.evaluate(&event).incident.incident_type.as_deref(),
            Some("POTENTIAL_INTRUSION_ATTEMPT")
        );
    }

    #[test]
    fn test_temperature_threshold_is_strict() {
        let engine = RuleEngine::default();
        let mut event =
            create_test_event(TEMP_THRESHOLD_EXCEEDED, "SERVER_ROOM", "2024-03-01 10:00:00");

        event.temperature = Some(30.0);
        assert!(!engine.evaluate(&event).is_violation());

        event.temperature = Some(30.1);
        let verdict = engine.evaluate(&event);
        assert!(verdict.is_violation());
        assert!(verdict.policy_result.reason.contains("30.1"));
        assert_eq!(
            verdict.incident.incident_type.as_deref(),
            Some("ENVIRONMENTAL_RISK")
        );
    }

    #[test]
    fn test_payload_numbers_reach_the_rules() {
        let engine = RuleEngine::default();

        let denial = Event::from_json(
            r#"{"event_id": "evt_d", "timestamp": "2024-03-01 10:00:00", "zone": "LOBBY",
                "event_type": "RFID_ACCESS_DENIED", "denied_attempts": 3.0}"#,
        )
        .unwrap();
        let verdict = engine.evaluate(&denial);
        assert!(verdict.is_violation());
        assert_eq!(verdict.policy_result.policy_name, "SUSPICIOUS_ACCESS_ATTEMPTS");

        let heat = Event::from_json(
            r#"{"event_id": "evt_t", "timestamp": "2024-03-01 10:00:00", "zone": "SERVER_ROOM",
                "event_type": "TEMP_THRESHOLD_EXCEEDED", "temperature": 31.0}"#,
        )
        .unwrap();
        let verdict = engine.evaluate(&heat);
        assert!(verdict.is_violation());
        assert!(verdict.policy_result.reason.contains("31.0"));
    }

    #[test]
    fn test_camera_tamper_in_cash_vault() {
        for policy in [TamperPolicy::CashHandlingOnly, TamperPolicy::AnyZone] {
            let config = RuleConfig {
                tamper_policy: policy,
                ..RuleConfig::default()
            };
            let engine = RuleEngine::with_builtin_rules(&config);
            let verdict =
                engine.evaluate(&create_test_event(CAMERA_TAMPER_DETECTED, "CASH_VAULT", ""));

            assert!(verdict.is_violation());
            let incident_type = verdict.incident.incident_type.unwrap();
            assert!(
                incident_type == "SURVEILLANCE_COMPROMISE" || incident_type == "SURVEILLANCE_TAMPER"
            );
        }
    }

    #[test]
    fn test_after_hours_motion_uses_configured_zones() {
        let config = RuleConfig {
            sensitive_zones: vec!["LOBBY".to_string()],
            ..RuleConfig::default()
        };
        let engine = RuleEngine::with_builtin_rules(&config);

        let lobby = create_test_event(MOTION_DETECTED, "LOBBY", "2024-03-01T23:30:00");
        let vault = create_test_event(MOTION_DETECTED, "CASH_VAULT", "2024-03-01T23:30:00");
        assert!(engine.evaluate(&lobby).is_violation());
        assert!(!engine.evaluate(&vault).is_violation());
    }

    #[test]
    fn test_custom_business_hours() {
        let config = RuleConfig {
            business_hours_start: 6,
            business_hours_end: 22,
            ..RuleConfig::default()
        };
        let engine = RuleEngine::with_builtin_rules(&config);
        let event = create_test_event(RFID_ACCESS_GRANTED, "LOBBY", "2024-03-01 20:00:00");
        assert!(!engine.evaluate(&event).is_violation());
    }

    #[test]
    fn test_evaluate_batch_preserves_order() {
        let engine = RuleEngine::default();
        let events = vec![
            create_test_event(RFID_ACCESS_GRANTED, "LOBBY", "2024-03-01 23:00:00"),
            create_test_event(MOTION_DETECTED, "LOBBY", "2024-03-01 23:00:00"),
            create_test_event(CAMERA_TAMPER_DETECTED, "CASH_VAULT", "2024-03-01 23:00:00"),
        ];

        let evaluated = engine.evaluate_batch(&events);
        assert_eq!(evaluated.len(), 3);
        assert!(evaluated[0].verdict.is_violation());
        assert!(!evaluated[1].verdict.is_violation());
        assert!(evaluated[2].verdict.is_violation());
        assert_eq!(evaluated[1].event, events[1]);
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        let engine = std::sync::Arc::new(RuleEngine::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = std::sync::Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine
                        .evaluate(&create_test_event(
                            RFID_ACCESS_GRANTED,
                            "LOBBY",
                            "2024-03-01 03:00:00",
                        ))
                        .is_violation()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}

// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::events::{
        CAMERA_TAMPER_DETECTED, MOTION_DETECTED, RFID_ACCESS_DENIED, RFID_ACCESS_GRANTED,
        TEMP_THRESHOLD_EXCEEDED,
    };
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    const KNOWN_TYPES: [&str; 5] = [
        RFID_ACCESS_GRANTED,
        RFID_ACCESS_DENIED,
        MOTION_DETECTED,
        TEMP_THRESHOLD_EXCEEDED,
        CAMERA_TAMPER_DETECTED,
    ];

    /// Generate events drawn from realistic field values, including malformed ones
    #[derive(Debug, Clone)]
    struct ArbitraryEvent(Event);

    impl Arbitrary for ArbitraryEvent {
        fn arbitrary(g: &mut Gen) -> Self {
            let event_types = [
                RFID_ACCESS_GRANTED,
                RFID_ACCESS_DENIED,
                MOTION_DETECTED,
                TEMP_THRESHOLD_EXCEEDED,
                CAMERA_TAMPER_DETECTED,
                "DOOR_FORCED",
                "",
            ];
            let zones = ["SERVER_ROOM", "CASH_VAULT", "LOBBY", ""];
            let hour = u8::arbitrary(g) % 24;
            let timestamps = [
                format!("2024-03-01 {:02}:15:00", hour),
                format!("2024-03-01T{:02}:15:00Z", hour),
                "not a time".to_string(),
                String::new(),
            ];

            ArbitraryEvent(Event {
                event_id: format!("evt_{}", u16::arbitrary(g)),
                timestamp: g.choose(&timestamps).cloned().unwrap_or_default(),
                device_type: "SIM".to_string(),
                zone: g.choose(&zones).copied().unwrap_or_default().to_string(),
                event_type: g
                    .choose(&event_types)
                    .copied()
                    .unwrap_or_default()
                    .to_string(),
                severity: String::arbitrary(g),
                summary: String::arbitrary(g),
                denied_attempts: Option::<u8>::arbitrary(g).map(u32::from),
                temperature: Option::<i8>::arbitrary(g).map(|t| f64::from(t) / 2.0),
            })
        }
    }

    #[quickcheck]
    fn prop_evaluation_is_deterministic(event: ArbitraryEvent) -> bool {
        let engine = RuleEngine::default();
        engine.evaluate(&event.0) == engine.evaluate(&event.0)
    }

    #[quickcheck]
    fn prop_compliant_verdicts_carry_no_citations(event: ArbitraryEvent) -> bool {
        let config = RuleConfig {
            denial_policy: DenialPolicy::AnyDenial,
            ..RuleConfig::default()
        };
        let verdict = RuleEngine::with_builtin_rules(&config).evaluate(&event.0);

        if verdict.is_violation() {
            verdict.incident.create_incident
                && verdict.incident.incident_type.is_some()
                && verdict.policy_result.policy_id.is_some()
                && !verdict.compliance_mapping.is_empty()
        } else {
            verdict.compliance_mapping.is_empty()
                && !verdict.incident.create_incident
                && verdict.incident.incident_type.is_none()
        }
    }

    #[quickcheck]
    fn prop_unknown_event_types_never_violate(event: ArbitraryEvent, suffix: String) -> bool {
        let mut event = event.0;
        event.event_type = format!("UNKNOWN_{}", suffix);
        if KNOWN_TYPES.contains(&event.event_type.as_str()) {
            return true;
        }
        !RuleEngine::default().evaluate(&event).is_violation()
    }
}
