/// Dashboard aggregation over evaluated events
pub mod compliance_aggregator;

pub use compliance_aggregator::{
    percent, ComplianceAggregator, ComplianceSummary, Dashboard, RankedCount,
    SeverityCounts, Tally, ViolationSort, ZoneCompliance, ZoneStatus,
};
