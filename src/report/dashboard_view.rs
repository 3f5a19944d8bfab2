use crate::aggregator::{Dashboard, RankedCount};
use crate::events::EvaluatedEvent;
use std::fmt::Write;

const REASON_WIDTH: usize = 72;

/// Shorten `text` to at most `max_length` bytes, ending with "..." when cut
///
/// Truncation happens on a UTF-8 character boundary.
fn truncate_text(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }

    let mut truncate_at = max_length.saturating_sub(3);
    while truncate_at > 0 && !text.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    format!("{}...", &text[..truncate_at])
}

/// One-line compliance status of an evaluated event
///
/// ```
/// use grsee::events::{EvaluatedEvent, Event, Verdict};
/// use grsee::report::render_event_status;
///
/// let evaluated = EvaluatedEvent {
///     event: Event { event_id: "evt_1".to_string(), ..Event::default() },
///     verdict: Verdict::compliant(),
/// };
/// assert!(render_event_status(&evaluated).starts_with("[OK]"));
/// ```
pub fn render_event_status(evaluated: &EvaluatedEvent) -> String {
    let event = &evaluated.event;
    let result = &evaluated.verdict.policy_result;
    let marker = if result.is_violation {
        "[VIOLATION]"
    } else {
        "[OK]"
    };

    let mut line = format!(
        "{} {} {} {} {} ({}) -> {}",
        marker,
        event.event_id,
        event.timestamp,
        event.zone,
        event.event_type,
        event.severity,
        result.policy_name
    );
    if result.is_violation {
        let _ = write!(line, ": {}", truncate_text(&result.reason, REASON_WIDTH));
    }
    line
}

fn render_ranking(out: &mut String, title: &str, ranking: &[RankedCount]) {
    let _ = writeln!(out, "{}:", title);
    if ranking.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for entry in ranking {
        let _ = writeln!(out, "  {:<28} {:>6}", entry.key, entry.count);
    }
}

/// Multi-line terminal overview of a dashboard
pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    let summary = &dashboard.summary;
    let severity = &dashboard.severity;

    let _ = writeln!(out, "GRSee Compliance Dashboard");
    let _ = writeln!(out, "==========================");
    let _ = writeln!(
        out,
        "Events: {}  Compliant: {} ({:.1}%)  Violations: {} ({:.1}%)  Open incidents: {}",
        summary.total,
        summary.compliant,
        summary.compliance_percent,
        summary.violations,
        summary.violation_percent,
        dashboard.open_incidents
    );
    let _ = writeln!(
        out,
        "Severity: low {}  medium {}  high {}  critical {}",
        severity.low, severity.medium, severity.high, severity.critical
    );
    let _ = writeln!(out);

    render_ranking(&mut out, "Top event types", &dashboard.top_event_types);
    render_ranking(&mut out, "Top zones", &dashboard.top_zones);
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Zone compliance (threshold {:.1}%):",
        dashboard.zone_compliance_threshold
    );
    if dashboard.zone_compliance.is_empty() {
        let _ = writeln!(out, "  (no events)");
    }
    for row in &dashboard.zone_compliance {
        let _ = writeln!(
            out,
            "  {:<20} {:>6} events {:>4} violations {:>6.1}%  {}",
            row.zone,
            row.total,
            row.violations,
            row.compliance_percent,
            row.status.as_str()
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Recent alerts:");
    if dashboard.recent_alerts.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for alert in &dashboard.recent_alerts {
        let _ = writeln!(out, "  {}", render_event_status(alert));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ComplianceAggregator;
    use crate::events::{Event, Verdict};
    use crate::rules::RuleEngine;

    fn create_event(event_id: &str, timestamp: &str, zone: &str, severity: &str) -> Event {
        Event {
            event_id: event_id.to_string(),
            timestamp: timestamp.to_string(),
            device_type: "RFID".to_string(),
            zone: zone.to_string(),
            event_type: "RFID_ACCESS_GRANTED".to_string(),
            severity: severity.to_string(),
            ..Event::default()
        }
    }

    #[test]
    fn test_text_truncation() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_text("this is too long", 10), "this is...");
    }

    #[test]
    fn test_utf8_truncation_safety() {
        let text = "Temperature 31°C°C°C°C";
        let truncated = truncate_text(text, 16);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 16);
    }

    #[test]
    fn test_render_event_status() {
        let engine = RuleEngine::default();
        let event = create_event("evt_1", "2024-03-01 22:15:00", "SERVER_ROOM", "HIGH");
        let evaluated = EvaluatedEvent {
            verdict: engine.evaluate(&event),
            event,
        };

        let line = render_event_status(&evaluated);
        assert!(line.starts_with("[VIOLATION] evt_1 2024-03-01 22:15:00 SERVER_ROOM"));
        assert!(line.contains("-> AFTER_HOURS_PHYSICAL_ACCESS: RFID access occurred"));

        let compliant = EvaluatedEvent {
            event: create_event("evt_2", "2024-03-01 10:00:00", "LOBBY", "LOW"),
            verdict: Verdict::compliant(),
        };
        assert_eq!(
            render_event_status(&compliant),
            "[OK] evt_2 2024-03-01 10:00:00 LOBBY RFID_ACCESS_GRANTED (LOW) -> NO_VIOLATION"
        );
    }

    #[test]
    fn test_render_dashboard() {
        let engine = RuleEngine::default();
        let events = vec![
            create_event("evt_1", "2024-03-01 22:15:00", "SERVER_ROOM", "HIGH"),
            create_event("evt_2", "2024-03-01 10:00:00", "LOBBY", "LOW"),
        ];
        let mut aggregator = ComplianceAggregator::default();
        aggregator.extend(engine.evaluate_batch(&events));

        let text = render_dashboard(&aggregator.snapshot());
        assert!(text.contains("Events: 2  Compliant: 1 (50.0%)  Violations: 1 (50.0%)"));
        assert!(text.contains("Severity: low 1  medium 0  high 1  critical 0"));
        assert!(text.contains("NEEDS_ATTENTION"));
        assert!(text.contains("[VIOLATION] evt_1"));
    }

    #[test]
    fn test_render_empty_dashboard() {
        let text = render_dashboard(&ComplianceAggregator::default().snapshot());
        assert!(text.contains("Events: 0"));
        assert!(text.contains("(no events)"));
    }
}
