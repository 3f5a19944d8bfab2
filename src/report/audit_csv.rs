use crate::aggregator::{Dashboard, ViolationSort, ZoneStatus};
use crate::error::ReportError;
use crate::events::{EvaluatedEvent, Timestamp};
use std::borrow::Cow;
use std::io::Write;

pub const REPORT_TITLE: &str = "GRSee Physical Security Compliance Audit Report";

const VIOLATION_COLUMNS: [&str; 11] = [
    "Event ID",
    "Timestamp",
    "Zone",
    "Device",
    "Event Type",
    "Severity",
    "Policy",
    "Reason",
    "ISO 27001 Controls",
    "PCI DSS Requirements",
    "Incident Type",
];

/// Quote a field when it contains a delimiter, quote or line break
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_row<W, I, S>(writer: &mut W, fields: I) -> Result<(), ReportError>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = fields
        .into_iter()
        .map(|field| escape_field(field.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    write!(writer, "{}\r\n", line)?;
    Ok(())
}

fn violation_row(evaluated: &EvaluatedEvent) -> Vec<String> {
    let event = &evaluated.event;
    let verdict = &evaluated.verdict;

    let iso = verdict
        .compliance_mapping
        .iso27001_controls
        .iter()
        .map(|control| format!("{} {}", control.control_id, control.title))
        .collect::<Vec<_>>()
        .join("; ");
    let pci = verdict
        .compliance_mapping
        .pcidss_requirements
        .iter()
        .map(|requirement| format!("{} {}", requirement.requirement_id, requirement.title))
        .collect::<Vec<_>>()
        .join("; ");

    vec![
        event.event_id.clone(),
        event.timestamp.clone(),
        event.zone.clone(),
        event.device_type.clone(),
        event.event_type.clone(),
        event.severity.clone(),
        verdict.policy_result.policy_name.clone(),
        verdict.policy_result.reason.clone(),
        iso,
        pci,
        verdict.incident.incident_type.clone().unwrap_or_default(),
    ]
}

/// Write the audit report as CSV
///
/// The report has four blocks separated by blank lines: header, summary KPIs,
/// per-zone compliance and every violation (newest first). Zone status is
/// judged against `threshold`, which may differ from the threshold the
/// dashboard was built with.
///
/// # Errors
///
/// Returns `ReportError::IoError` if writing fails.
pub fn write_audit_csv<W: Write>(
    writer: &mut W,
    dashboard: &Dashboard,
    generated_at: Timestamp,
    threshold: f64,
) -> Result<(), ReportError> {
    let summary = &dashboard.summary;

    write_row(writer, [REPORT_TITLE])?;
    write_row(
        writer,
        [
            "Generated At".to_string(),
            generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ],
    )?;
    write_row(
        writer,
        [
            "Zone Compliance Threshold (%)".to_string(),
            format!("{:.1}", threshold),
        ],
    )?;
    writer.write_all(b"\r\n")?;

    write_row(writer, ["Summary"])?;
    for (label, value) in [
        ("Total Events", summary.total.to_string()),
        ("Compliant Events", summary.compliant.to_string()),
        ("Violations", summary.violations.to_string()),
        ("Compliance (%)", format!("{:.1}", summary.compliance_percent)),
        ("Violation (%)", format!("{:.1}", summary.violation_percent)),
        ("Open Incidents", dashboard.open_incidents.to_string()),
    ] {
        write_row(writer, [label.to_string(), value])?;
    }
    writer.write_all(b"\r\n")?;

    write_row(writer, ["Zone Compliance"])?;
    write_row(
        writer,
        ["Zone", "Total Events", "Violations", "Compliance (%)", "Status"],
    )?;
    for row in &dashboard.zone_compliance {
        let status = ZoneStatus::for_percent(row.compliance_percent, threshold);
        write_row(
            writer,
            [
                row.zone.clone(),
                row.total.to_string(),
                row.violations.to_string(),
                format!("{:.1}", row.compliance_percent),
                status.as_str().to_string(),
            ],
        )?;
    }
    writer.write_all(b"\r\n")?;

    write_row(writer, ["Violations"])?;
    write_row(writer, VIOLATION_COLUMNS)?;
    for evaluated in dashboard.sorted_violations(ViolationSort::Newest) {
        write_row(writer, violation_row(evaluated))?;
    }

    writer.flush()?;
    Ok(())
}
