//! Compliance aggregator for dashboard and report views
//!
//! This module provides the ComplianceAggregator which folds evaluated events
//! into severity buckets, categorical tallies, compliance percentages, per-zone
//! compliance rows and the recent alerts panel.

use crate::config::DashboardConfig;
use crate::events::{newest_first, EvaluatedEvent, SeverityLevel};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Round to one decimal place
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Share of `part` in `total` as a percentage rounded to one decimal, 0.0 for an empty total
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_one_decimal(part as f64 * 100.0 / total as f64)
}

/// Event counts per recognized severity bucket
///
/// Events with an unrecognized severity label count towards `total` only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    pub total: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: &str) {
        self.total += 1;
        match SeverityLevel::from_label(severity) {
            Some(SeverityLevel::Low) => self.low += 1,
            Some(SeverityLevel::Medium) => self.medium += 1,
            Some(SeverityLevel::High) => self.high += 1,
            Some(SeverityLevel::Critical) => self.critical += 1,
            None => {}
        }
    }

    /// Sum of the four recognized buckets
    pub fn bucketed(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// One entry of a top-N ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankedCount {
    pub key: String,
    pub count: usize,
}

/// Open-ended categorical tally that remembers first-encounter order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Tally {
    counts: IndexMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str) {
        *self.counts.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in first-encounter order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// The `n` largest counts, ties broken by first-encounter order
    pub fn top(&self, n: usize) -> Vec<RankedCount> {
        let mut ranked: Vec<RankedCount> = self
            .iter()
            .map(|(key, count)| RankedCount {
                key: key.to_string(),
                count,
            })
            .collect();
        // Stable sort keeps first-encounter order among equal counts
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(n);
        ranked
    }
}

/// Violation and compliance totals
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComplianceSummary {
    pub total: usize,
    pub violations: usize,
    pub compliant: usize,
    pub violation_percent: f64,
    pub compliance_percent: f64,
}

impl ComplianceSummary {
    pub fn from_counts(total: usize, violations: usize) -> Self {
        let compliant = total.saturating_sub(violations);
        Self {
            total,
            violations,
            compliant,
            violation_percent: percent(violations, total),
            compliance_percent: percent(compliant, total),
        }
    }
}

/// Compliance status label of a zone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneStatus {
    NeedsAttention,
    WithinThreshold,
}

impl ZoneStatus {
    /// Status for a compliance percentage; exactly at the threshold is within it
    pub fn for_percent(compliance_percent: f64, threshold: f64) -> Self {
        if compliance_percent < threshold {
            Self::NeedsAttention
        } else {
            Self::WithinThreshold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsAttention => "NEEDS_ATTENTION",
            Self::WithinThreshold => "WITHIN_THRESHOLD",
        }
    }
}

/// Per-zone compliance row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneCompliance {
    pub zone: String,
    pub total: usize,
    pub violations: usize,
    pub compliance_percent: f64,
    pub status: ZoneStatus,
}

/// Ordering applied to the violations list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationSort {
    /// Newest timestamp first
    Newest,
    /// Critical first, newest first within a severity
    Severity,
}

fn newest_alert_first(a: &EvaluatedEvent, b: &EvaluatedEvent) -> Ordering {
    newest_first(&a.event, &b.event)
}

fn most_severe_first(a: &EvaluatedEvent, b: &EvaluatedEvent) -> Ordering {
    b.event
        .severity_level()
        .cmp(&a.event.severity_level())
        .then_with(|| newest_alert_first(a, b))
}

/// Point-in-time aggregate view over a set of evaluated events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub summary: ComplianceSummary,
    pub severity: SeverityCounts,
    pub by_event_type: Tally,
    pub by_zone: Tally,
    pub top_event_types: Vec<RankedCount>,
    pub top_zones: Vec<RankedCount>,
    /// Sorted ascending by compliance percentage, worst zone first
    pub zone_compliance: Vec<ZoneCompliance>,
    /// High and critical events, newest first
    pub recent_alerts: Vec<EvaluatedEvent>,
    /// Every violating event in ingestion order
    pub violations: Vec<EvaluatedEvent>,
    pub zone_compliance_threshold: f64,
    /// Incidents still open in the store, filled in by the monitor
    #[serde(default)]
    pub open_incidents: usize,
}

impl Dashboard {
    /// Violations ordered for display
    pub fn sorted_violations(&self, sort: ViolationSort) -> Vec<&EvaluatedEvent> {
        let mut sorted: Vec<&EvaluatedEvent> = self.violations.iter().collect();
        match sort {
            ViolationSort::Newest => sorted.sort_by(|a, b| newest_alert_first(a, b)),
            ViolationSort::Severity => sorted.sort_by(|a, b| most_severe_first(a, b)),
        }
        sorted
    }

    /// Zones currently flagged NEEDS_ATTENTION
    pub fn zones_needing_attention(&self) -> impl Iterator<Item = &ZoneCompliance> {
        self.zone_compliance
            .iter()
            .filter(|row| row.status == ZoneStatus::NeedsAttention)
    }
}

/// Incrementally folds evaluated events into dashboard aggregates
///
/// Every aggregate is derived only from the events added, so the same events
/// always produce the same dashboard regardless of when it is requested.
#[derive(Debug, Clone)]
pub struct ComplianceAggregator {
    config: DashboardConfig,
    total: usize,
    violation_count: usize,
    severity: SeverityCounts,
    by_event_type: Tally,
    by_zone: Tally,
    /// Violations per zone, keyed in the order zones were first seen
    zone_violations: IndexMap<String, usize>,
    /// Newest high and critical events, at most `recent_alerts_limit` of them
    alerts: Vec<EvaluatedEvent>,
    violations: Vec<EvaluatedEvent>,
}

impl ComplianceAggregator {
    /// Create an empty aggregator
    ///
    /// # Examples
    ///
    /// ```
    /// use grsee::aggregator::ComplianceAggregator;
    /// use grsee::config::DashboardConfig;
    ///
    /// let aggregator = ComplianceAggregator::new(DashboardConfig::default());
    /// assert_eq!(aggregator.snapshot().summary.compliance_percent, 0.0);
    /// ```
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            total: 0,
            violation_count: 0,
            severity: SeverityCounts::default(),
            by_event_type: Tally::new(),
            by_zone: Tally::new(),
            zone_violations: IndexMap::new(),
            alerts: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// Fold one evaluated event into the aggregates
    pub fn add(&mut self, evaluated: EvaluatedEvent) {
        let event = &evaluated.event;

        self.total += 1;
        self.severity.record(&event.severity);
        self.by_event_type.record(&event.event_type);
        self.by_zone.record(&event.zone);

        let zone_violations = self.zone_violations.entry(event.zone.clone()).or_insert(0);
        if evaluated.verdict.is_violation() {
            *zone_violations += 1;
            self.violation_count += 1;
        }

        let alerting = event
            .severity_level()
            .map(|level| level.is_alerting())
            .unwrap_or(false);

        match (alerting, evaluated.verdict.is_violation()) {
            (true, true) => {
                self.push_alert(evaluated.clone());
                self.violations.push(evaluated);
            }
            (true, false) => self.push_alert(evaluated),
            (false, true) => self.violations.push(evaluated),
            (false, false) => {}
        }
    }

    fn push_alert(&mut self, evaluated: EvaluatedEvent) {
        self.alerts.push(evaluated);
        if self.alerts.len() > self.config.recent_alerts_limit {
            self.alerts.sort_by(newest_alert_first);
            self.alerts.truncate(self.config.recent_alerts_limit);
        }
    }

    /// Fold a sequence of evaluated events
    pub fn extend<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = EvaluatedEvent>,
    {
        for evaluated in events {
            self.add(evaluated);
        }
    }

    /// Number of events folded so far
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Build the dashboard view of everything added so far
    pub fn snapshot(&self) -> Dashboard {
        let threshold = self.config.zone_compliance_threshold;

        let mut zone_compliance: Vec<ZoneCompliance> = self
            .zone_violations
            .iter()
            .map(|(zone, violations)| {
                let total = self.by_zone.get(zone);
                let compliance_percent = percent(total.saturating_sub(*violations), total);
                ZoneCompliance {
                    zone: zone.clone(),
                    total,
                    violations: *violations,
                    compliance_percent,
                    status: ZoneStatus::for_percent(compliance_percent, threshold),
                }
            })
            .collect();
        zone_compliance.sort_by(|a, b| a.compliance_percent.total_cmp(&b.compliance_percent));

        let mut recent_alerts = self.alerts.clone();
        recent_alerts.sort_by(newest_alert_first);
        recent_alerts.truncate(self.config.recent_alerts_limit);

        Dashboard {
            summary: ComplianceSummary::from_counts(self.total, self.violation_count),
            severity: self.severity,
            top_event_types: self.by_event_type.top(self.config.top_n),
            top_zones: self.by_zone.top(self.config.top_n),
            by_event_type: self.by_event_type.clone(),
            by_zone: self.by_zone.clone(),
            zone_compliance,
            recent_alerts,
            violations: self.violations.clone(),
            zone_compliance_threshold: threshold,
            open_incidents: 0,
        }
    }
}

impl Default for ComplianceAggregator {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}
